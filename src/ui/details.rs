use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

use crate::app::{App, DetailsState};
use crate::pagination::ListStatus;
use crate::types::{MovieBundle, MovieDetails, UserReview};

use super::home::rating_color;
use super::wrap;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let Some(details) = &app.details else {
        return;
    };

    let Some(bundle) = &details.bundle else {
        let message = match &details.error {
            Some(error) => format!("Could not load movie: {} (r to retry)", error),
            None => "Loading...".to_string(),
        };
        let empty = Paragraph::new(message)
            .block(Block::default().borders(Borders::ALL).title("Movie"))
            .style(Style::default().fg(Color::Gray));
        frame.render_widget(empty, area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(0)])
        .split(area);

    render_header(frame, &bundle.details, chunks[0]);
    render_body(frame, app, details, bundle, chunks[1]);
}

fn render_header(frame: &mut Frame, movie: &MovieDetails, area: Rect) {
    let mut facts = vec![Span::styled(
        format!("{:.1}", movie.vote_average),
        Style::default()
            .fg(rating_color(movie.vote_average))
            .add_modifier(Modifier::BOLD),
    )];
    facts.push(Span::styled(
        format!(" ({} votes)", movie.vote_count),
        Style::default().fg(Color::Gray),
    ));
    if let Some(date) = movie.release_date {
        facts.push(Span::raw(" | "));
        facts.push(Span::raw(date.format("%Y-%m-%d").to_string()));
    }
    if let Some(runtime) = movie.runtime_label() {
        facts.push(Span::raw(" | "));
        facts.push(Span::raw(runtime));
    }
    if !movie.genres.is_empty() {
        facts.push(Span::raw(" | "));
        facts.push(Span::styled(
            movie.genres.join(", "),
            Style::default().fg(Color::Cyan),
        ));
    }

    let title = match movie.year() {
        Some(year) => format!("{} ({})", movie.title, year),
        None => movie.title.clone(),
    };

    let lines = vec![
        Line::from(Span::styled(
            title,
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(facts),
        Line::from(Span::styled(
            movie.tagline.clone().unwrap_or_default(),
            Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::ITALIC),
        )),
    ];

    let header =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Details"));
    frame.render_widget(header, area);
}

fn render_body(
    frame: &mut Frame,
    app: &App,
    details: &DetailsState,
    bundle: &MovieBundle,
    area: Rect,
) {
    let width = area.width.saturating_sub(2) as usize;
    let heading = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);
    let dim = Style::default().fg(Color::Gray);

    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::from(Span::styled("Overview", heading)));
    if bundle.details.overview.is_empty() {
        lines.push(Line::from(Span::styled("No overview available.", dim)));
    } else {
        lines.extend(wrap(&bundle.details.overview, width).into_iter().map(Line::from));
    }
    lines.push(Line::from(""));

    if !bundle.cast.is_empty() {
        lines.push(Line::from(Span::styled("Cast", heading)));
        for member in &bundle.cast {
            lines.push(Line::from(vec![
                Span::raw(format!("  {}", member.name)),
                Span::styled(format!("  as {}", member.character), dim),
            ]));
        }
        lines.push(Line::from(""));
    }

    if let Some(mine) = app.my_reviews.get(&details.movie_id) {
        push_user_review(&mut lines, mine, width);
    }

    let reviews = &details.reviews;
    lines.push(Line::from(Span::styled(
        format!("Reviews ({})", reviews.len()),
        heading,
    )));
    for review in reviews.items() {
        let mut byline = vec![Span::styled(
            review.author.clone(),
            Style::default().fg(Color::Cyan),
        )];
        if let Some(rating) = review.rating {
            byline.push(Span::styled(
                format!("  {:.0}/10", rating),
                Style::default().fg(rating_color(rating)),
            ));
        }
        if let Some(created) = review.created_at {
            byline.push(Span::styled(
                format!("  {}", created.format("%Y-%m-%d")),
                dim,
            ));
        }
        lines.push(Line::from(byline));
        lines.extend(
            wrap(&review.content, width.saturating_sub(2))
                .into_iter()
                .map(|l| Line::from(format!("  {}", l))),
        );
        lines.push(Line::from(""));
    }

    let footer = match (reviews.status(), reviews.error()) {
        (ListStatus::LoadingMore, _) => Some(Span::styled(
            "Loading more reviews...",
            Style::default().fg(Color::Yellow),
        )),
        (_, Some(error)) => Some(Span::styled(
            format!("Could not load reviews: {}", error),
            Style::default().fg(Color::Red),
        )),
        _ if reviews.has_more() => Some(Span::styled("n: more reviews", dim)),
        _ if reviews.is_empty() => Some(Span::styled("No reviews yet.", dim)),
        _ => None,
    };
    if let Some(footer) = footer {
        lines.push(Line::from(footer));
    }

    // Account for borders
    let inner_height = area.height.saturating_sub(2) as usize;
    let max_scroll = lines.len().saturating_sub(inner_height);
    let scroll_offset = details.scroll.min(max_scroll);

    let visible: Vec<Line> = lines
        .into_iter()
        .skip(scroll_offset)
        .take(inner_height)
        .collect();

    frame.render_widget(Clear, area);
    let body = Paragraph::new(Text::from(visible)).block(Block::default().borders(Borders::ALL));
    frame.render_widget(body, area);
}

fn push_user_review(lines: &mut Vec<Line>, review: &UserReview, width: usize) {
    lines.push(Line::from(vec![
        Span::styled(
            "Your review",
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("  {}", review.rating),
            Style::default().fg(Color::Green),
        ),
    ]));
    if !review.text.is_empty() {
        lines.extend(
            wrap(&review.text, width.saturating_sub(2))
                .into_iter()
                .map(|l| Line::from(format!("  {}", l))),
        );
    }
    lines.push(Line::from(""));
}
