use std::io;
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::KeyEventKind;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;

mod app;
mod config;
mod db;
mod error;
mod feed;
mod models;
mod summary;
mod tui;

use app::{App, AppEvent};
use config::Config;
use db::Store;
use error::Result;
use feed::{DocumentFetcher, HttpFetcher, SyncEngine};
use tui::{draw, handle_key_event};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (only show warnings and errors by default)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    // Load configuration
    let config = Config::load()?;

    // A store that cannot open is the one startup failure worth a non-zero
    // exit; everything later is reported inside the session instead.
    let store = Store::open(&config.db_path).await?;
    let fetcher: Arc<dyn DocumentFetcher> =
        Arc::new(HttpFetcher::new(Duration::from_secs(config.http_timeout_secs)));

    // Headless flags: sync or inspect the store without entering the TUI
    match args.get(1).map(String::as_str) {
        Some("--refresh") => return refresh_all(store, fetcher).await,
        Some("--add") => {
            let Some(url) = args.get(2) else {
                eprintln!("usage: newsdeck --add <url>");
                return Ok(());
            };
            return add_feed(store, fetcher, url).await;
        }
        Some("--unread") => {
            let limit = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(20);
            return print_unread(store, limit).await;
        }
        _ => {}
    }

    // Initialize app
    let mut app = App::new(store, fetcher, &config).await?;
    if config.refresh_on_startup {
        app.start_sync_all();
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    Ok(())
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|frame| draw(frame, app))?;

        // Advance spinner animation
        app.tick_spinner();

        // Feed completed background work back into the reducer, in order
        while let Some(event) = app.poll_async_event() {
            if app.on_event(event).await {
                return Ok(());
            }
        }

        // Poll for events with timeout to allow async operations
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(action) = handle_key_event(key, app.screen.kind(), app.is_adding())
                    {
                        let should_quit = app.on_event(AppEvent::Action(action)).await;
                        if should_quit {
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

async fn refresh_all(store: Store, fetcher: Arc<dyn DocumentFetcher>) -> Result<()> {
    let engine = SyncEngine::new(store, fetcher);
    let results = engine.sync_all().await?;
    let added: usize = results.values().sum();
    println!("Synced {} feeds, {} new articles", results.len(), added);
    Ok(())
}

async fn add_feed(store: Store, fetcher: Arc<dyn DocumentFetcher>, url: &str) -> Result<()> {
    let feed = store.add_feed(url, url, "").await?;
    let engine = SyncEngine::new(store, fetcher);
    match engine.sync_feed(&feed).await {
        Ok(added) => println!("Added {} ({} articles)", feed.url, added),
        // The subscription stays either way; only this sync round failed
        Err(e) => println!("Added {} (sync failed: {})", feed.url, e),
    }
    Ok(())
}

async fn print_unread(store: Store, limit: usize) -> Result<()> {
    let articles = store.get_unread_articles(limit).await?;
    if articles.is_empty() {
        println!("No unread articles");
        return Ok(());
    }
    for article in &articles {
        let published = article
            .published
            .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!("{:>5}  {}  {}", article.id, published, article.title);
    }
    Ok(())
}
