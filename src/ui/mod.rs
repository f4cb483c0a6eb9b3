mod compose;
mod details;
mod home;

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::app::App;
use crate::connectivity::NetworkStatus;
use crate::navigation::{Tab, View};

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);

    match app.navigator.current() {
        View::Home => home::render(frame, app, chunks[1]),
        View::Details { .. } => details::render(frame, app, chunks[1]),
        View::ComposeReview { .. } => compose::render(frame, app, chunks[1]),
    }

    render_status_bar(frame, app, chunks[2]);
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let title_style = Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD);

    let mut spans = match app.navigator.current() {
        View::Home => {
            let mut spans = vec![Span::styled("marquee ", title_style)];
            for tab in Tab::ALL {
                let style = if tab == app.navigator.active_tab() {
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::Gray)
                };
                spans.push(Span::raw(" "));
                spans.push(Span::styled(format!("[{}]", tab.title()), style));
            }
            spans
        }
        View::Details { movie_id } => {
            let title = app
                .details
                .as_ref()
                .and_then(|d| d.title())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Movie {}", movie_id));
            vec![Span::styled(format!("marquee - {}", title), title_style)]
        }
        View::ComposeReview { title, .. } => vec![Span::styled(
            format!("marquee - Review: {}", title),
            title_style,
        )],
    };

    if app.network == NetworkStatus::Offline {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            "OFFLINE",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }

    let header = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let status = if let Some(error) = &app.error {
        Line::from(vec![Span::styled(
            format!("Error: {}", error),
            Style::default().fg(Color::Red),
        )])
    } else if let Some(notice) = &app.notice {
        Line::from(vec![Span::styled(
            notice.as_str(),
            Style::default().fg(Color::Green),
        )])
    } else if is_loading(app) {
        Line::from(vec![Span::styled(
            "Loading...",
            Style::default().fg(Color::Yellow),
        )])
    } else {
        let help = match app.navigator.current() {
            View::Home if app.is_editing_search() => "Enter: search | Esc: cancel",
            View::Home => {
                "Tab: switch | /: search | j/k/g/G: nav | Ctrl+d/u: page | Enter: open | r/R: refresh/reload | q: back"
            }
            View::Details { .. } => {
                "j/k: scroll | n: more reviews | w: write review | o: open | y: copy url | r: reload | q: back"
            }
            View::ComposeReview { .. } => "Up/Down: rating | type to write | Ctrl+s: submit | Esc: cancel",
        };
        Line::from(vec![Span::styled(help, Style::default().fg(Color::Gray))])
    };

    let status_bar = Paragraph::new(status).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(status_bar, area);
}

fn is_loading(app: &App) -> bool {
    match app.navigator.current() {
        View::Home => match app.navigator.active_tab() {
            Tab::Primary => app.popular.status().is_loading(),
            Tab::Search => app
                .search
                .results
                .as_ref()
                .is_some_and(|r| r.status().is_loading()),
        },
        View::Details { .. } => app
            .details
            .as_ref()
            .is_some_and(|d| d.is_loading() || d.reviews.status().is_loading()),
        View::ComposeReview { .. } => app.compose.as_ref().is_some_and(|c| c.submitting),
    }
}

/// Greedy word wrap to `width` columns.
pub(crate) fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let needed = if current.is_empty() {
                word.chars().count()
            } else {
                current.chars().count() + 1 + word.chars().count()
            };
            if needed > width && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        lines.push(current);
    }
    lines
}

/// Cut `text` to at most `max` characters, marking the cut with "...".
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}
