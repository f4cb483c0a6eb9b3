use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use ratatui::Frame;

use crate::app::App;
use crate::navigation::Tab;
use crate::pagination::{ListStatus, PagedList};
use crate::types::Movie;

use super::truncate;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    match app.navigator.active_tab() {
        Tab::Primary => render_movies(
            frame,
            " Popular ",
            Some(&app.popular),
            app.popular_index,
            "No movies",
            area,
        ),
        Tab::Search => render_search(frame, app, area),
    }
}

fn render_search(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let editing = app.search.editing;
    let border = if editing {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let mut input = vec![Span::raw(app.search.input.as_str())];
    if editing {
        input.push(Span::styled("_", Style::default().fg(Color::Yellow)));
    }
    let query = Paragraph::new(Line::from(input)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(" Search "),
    );
    frame.render_widget(query, chunks[0]);

    let title = if app.search.query.is_empty() {
        " Results ".to_string()
    } else {
        format!(" Results for \"{}\" ", app.search.query)
    };
    render_movies(
        frame,
        &title,
        app.search.results.as_ref(),
        app.search.index,
        "Press / to search",
        chunks[1],
    );
}

fn render_movies(
    frame: &mut Frame,
    title: &str,
    list: Option<&PagedList<Movie>>,
    selected: usize,
    placeholder: &str,
    area: Rect,
) {
    let count = list.map_or(0, |l| l.len());
    let pages = list
        .filter(|l| l.page() > 0)
        .map(|l| format!(" {}/{} ", l.page(), l.total_pages()))
        .unwrap_or_default();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            format!("{}({}) ", title, count),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ))
        .title_bottom(Line::from(pages).right_aligned())
        .border_style(Style::default().fg(Color::Yellow));

    let Some(list) = list.filter(|l| !l.is_empty()) else {
        let message = match list.map(|l| (l.status(), l.error())) {
            Some((_, Some(error))) => format!("Could not load movies: {}", error),
            Some((status, _)) if status.is_loading() => "Loading...".to_string(),
            _ => placeholder.to_string(),
        };
        let empty = Paragraph::new(message)
            .block(block)
            .style(Style::default().fg(Color::Gray));
        frame.render_widget(empty, area);
        return;
    };

    let w = area.width.saturating_sub(2) as usize;
    let fixed = 18; // year(6) + rating(5) + votes(7)
    let flex = w.saturating_sub(fixed).max(10);

    let mut items: Vec<ListItem> = list
        .items()
        .iter()
        .enumerate()
        .map(|(i, movie)| {
            let style = if i == selected {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };

            let year = movie
                .year()
                .map(|y| y.to_string())
                .unwrap_or_else(|| "----".to_string());

            let line = Line::from(vec![
                Span::styled(format!("{:<6}", year), Style::default().fg(Color::Cyan)),
                Span::styled(format!("{:<flex$}", truncate(&movie.title, flex)), style),
                Span::styled(
                    format!("{:>5.1}", movie.vote_average),
                    Style::default().fg(rating_color(movie.vote_average)),
                ),
                Span::styled(
                    format!("{:>7}", format!("({})", movie.vote_count)),
                    Style::default().fg(Color::DarkGray),
                ),
            ]);

            ListItem::new(line)
        })
        .collect();

    match (list.status(), list.error()) {
        (ListStatus::LoadingMore, _) => items.push(ListItem::new(Span::styled(
            "Loading more...",
            Style::default().fg(Color::Yellow),
        ))),
        (_, Some(error)) => items.push(ListItem::new(Span::styled(
            format!("Error: {} (r to retry)", error),
            Style::default().fg(Color::Red),
        ))),
        _ => {}
    }

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(Color::DarkGray));

    let mut state = ListState::default();
    state.select(Some(selected));

    frame.render_stateful_widget(list, area, &mut state);
}

pub(super) fn rating_color(vote_average: f32) -> Color {
    if vote_average >= 7.0 {
        Color::Green
    } else if vote_average >= 5.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}
