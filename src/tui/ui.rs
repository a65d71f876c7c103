use chrono::{DateTime, Utc};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, ArticlesView, DetailView, FeedsView, Screen, SummaryState};

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),    // Active screen
            Constraint::Length(1), // Status line
        ])
        .split(frame.area());

    match &app.screen {
        Screen::Feeds(view) => render_feeds(frame, view, chunks[0]),
        Screen::Articles(view) => render_articles(frame, view, chunks[0]),
        Screen::Detail(view) => render_detail(frame, app, view, chunks[0]),
    }

    render_status_line(frame, app, chunks[1]);

    if let Screen::Feeds(view) = &app.screen {
        if view.adding {
            render_add_feed_input(frame, view);
        }
    }
}

fn render_feeds(frame: &mut Frame, view: &FeedsView, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Min(0),    // Feed list
        ])
        .split(area);

    let block = Block::default()
        .title(" Feeds ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(chunks[0]);
    frame.render_widget(block, chunks[0]);

    let stats = format!(" {} subscribed", view.feeds.len());
    frame.render_widget(
        Paragraph::new(stats).style(Style::default().fg(Color::White)),
        inner,
    );

    let items: Vec<ListItem> = view
        .feeds
        .iter()
        .map(|feed| {
            let synced = match feed.last_updated {
                Some(ts) => format!("synced {}", format_timestamp(ts)),
                None => "never synced".to_string(),
            };
            ListItem::new(vec![
                Line::from(Span::styled(
                    feed.title.clone(),
                    Style::default().fg(Color::White),
                )),
                Line::from(Span::styled(
                    format!("  {} | {synced}", feed.url),
                    Style::default().fg(Color::DarkGray),
                )),
            ])
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select((!view.feeds.is_empty()).then_some(view.selected));

    frame.render_stateful_widget(list, chunks[1], &mut state);
}

fn render_articles(frame: &mut Frame, view: &ArticlesView, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Min(0),    // Article list
        ])
        .split(area);

    let unread = view.articles.iter().filter(|a| !a.read).count();

    let block = Block::default()
        .title(format!(" {} ", view.feed.title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(chunks[0]);
    frame.render_widget(block, chunks[0]);

    let stats = format!(" {} articles | {} unread", view.articles.len(), unread);
    frame.render_widget(
        Paragraph::new(stats).style(Style::default().fg(Color::White)),
        inner,
    );

    let items: Vec<ListItem> = view
        .articles
        .iter()
        .map(|article| {
            let style = if article.read {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default().fg(Color::White)
            };
            let published = article
                .published
                .map(format_timestamp)
                .unwrap_or_else(|| "unknown".to_string());

            let line = Line::from(vec![
                Span::styled(format!("{published}  "), Style::default().fg(Color::Blue)),
                Span::styled(article.title.clone(), style),
            ]);
            ListItem::new(line)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select((!view.articles.is_empty()).then_some(view.selected));

    frame.render_stateful_widget(list, chunks[1], &mut state);
}

fn render_detail(frame: &mut Frame, app: &App, view: &DetailView, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // Title + byline
            Constraint::Min(0),    // Article body
            Constraint::Length(8), // Summary pane
        ])
        .split(area);

    let published = view
        .article
        .published
        .map(format_timestamp)
        .unwrap_or_else(|| "unknown".to_string());
    let byline = if view.article.author.is_empty() {
        format!("{} | {published}", view.feed_title)
    } else {
        format!("{} | {published} | {}", view.feed_title, view.article.author)
    };

    let header = Paragraph::new(vec![
        Line::from(Span::styled(
            view.article.title.clone(),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(byline, Style::default().fg(Color::DarkGray))),
    ])
    .block(
        Block::default()
            .title(" Article ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)),
    )
    .wrap(Wrap { trim: true });
    frame.render_widget(header, chunks[0]);

    let body = Paragraph::new(view.body.as_str())
        .block(Block::default().borders(Borders::ALL))
        .wrap(Wrap { trim: false })
        .scroll((view.scroll, 0));
    frame.render_widget(body, chunks[1]);

    let summary_text = match &view.summary {
        SummaryState::Loading => format!(
            "{} Generating summary...",
            SPINNER_FRAMES[app.spinner_frame % SPINNER_FRAMES.len()]
        ),
        SummaryState::Ready(text) => text.clone(),
    };
    let summary = Paragraph::new(summary_text)
        .block(
            Block::default()
                .title(" Summary ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Magenta)),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(summary, chunks[2]);
}

fn render_status_line(frame: &mut Frame, app: &App, area: Rect) {
    let hints = match &app.screen {
        Screen::Feeds(view) if view.adding => "enter:add  esc:cancel",
        Screen::Feeds(_) => "j/k:nav  enter:articles  a:add  d:delete  u:sync  r:sync all  q:quit",
        Screen::Articles(_) => "j/k:nav  enter:read  b:back  q:quit",
        Screen::Detail(_) => "j/k:scroll  o:open link  b:back  q:quit",
    };

    let mut text = match &app.status {
        Some(message) => message.clone(),
        None => hints.to_string(),
    };
    if app.is_syncing() {
        text = format!(
            "{} syncing...  {text}",
            SPINNER_FRAMES[app.spinner_frame % SPINNER_FRAMES.len()]
        );
    }

    let paragraph = Paragraph::new(text).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}

fn render_add_feed_input(frame: &mut Frame, view: &FeedsView) {
    let area = centered_rect(60, 20, frame.area());

    let block = Block::default()
        .title(" Add feed - enter its URL ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let inner = block.inner(area);

    // Clear the area first
    frame.render_widget(Clear, area);
    frame.render_widget(block, area);

    let input_text = format!("> {}_", view.input);
    let paragraph = Paragraph::new(input_text).style(Style::default().fg(Color::White));
    frame.render_widget(paragraph, inner);
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
