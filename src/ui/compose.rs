use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use crate::app::App;
use crate::types::Rating;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let Some(compose) = &app.compose else {
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let filled = usize::from(compose.rating.value());
    let empty = usize::from(Rating::MAX) - filled;
    let stars = Line::from(vec![
        Span::styled("*".repeat(filled), Style::default().fg(Color::Yellow)),
        Span::styled(".".repeat(empty), Style::default().fg(Color::DarkGray)),
        Span::raw("  "),
        Span::styled(
            compose.rating.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
    ]);
    let rating = Paragraph::new(stars).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" Rating for {} ", compose.title)),
    );
    frame.render_widget(rating, chunks[0]);

    let border = if compose.submitting {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Yellow)
    };
    let mut text = Text::raw(compose.text.as_str());
    if !compose.submitting {
        text.push_span(Span::styled("_", Style::default().fg(Color::Yellow)));
    }
    let title = if compose.submitting {
        " Review (submitting...) "
    } else {
        " Review "
    };
    let body = Paragraph::new(text)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border)
                .title(title),
        );
    frame.render_widget(body, chunks[1]);
}
