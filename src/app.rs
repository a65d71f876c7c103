use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::Config;
use crate::db::Store;
use crate::error::{AppError, Result};
use crate::feed::{DocumentFetcher, SyncEngine};
use crate::models::{Article, Feed};
use crate::summary::Summarizer;
use crate::tui::AppAction;

/// A finished background sync, reported back to the event loop.
#[derive(Debug)]
pub enum SyncOutcome {
    /// One feed synced (sync-selected or the add-feed flow).
    Feed {
        feed_id: i64,
        result: std::result::Result<usize, String>,
    },
    /// A sync-all run finished; feeds that failed are absent from the map.
    All {
        result: std::result::Result<HashMap<i64, usize>, String>,
    },
}

/// A finished summary derivation. The generation ties it to one Detail
/// visit; anything else that arrives is stale and gets dropped.
#[derive(Debug)]
pub struct SummaryOutcome {
    pub generation: u64,
    pub digest: String,
}

/// Everything the reducer consumes, key presses and async completions alike,
/// in arrival order.
#[derive(Debug)]
pub enum AppEvent {
    Action(AppAction),
    SyncFinished(SyncOutcome),
    SummaryReady(SummaryOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenKind {
    Feeds,
    Articles,
    Detail,
}

/// The active screen owns its whole sub-model. Transitions replace the
/// value; nothing leaks from one screen into the next.
pub enum Screen {
    Feeds(FeedsView),
    Articles(ArticlesView),
    Detail(DetailView),
}

impl Screen {
    pub fn kind(&self) -> ScreenKind {
        match self {
            Screen::Feeds(_) => ScreenKind::Feeds,
            Screen::Articles(_) => ScreenKind::Articles,
            Screen::Detail(_) => ScreenKind::Detail,
        }
    }
}

pub struct FeedsView {
    pub feeds: Vec<Feed>,
    pub selected: usize,
    pub adding: bool,
    pub input: String,
}

pub struct ArticlesView {
    pub feed: Feed,
    pub articles: Vec<Article>,
    pub selected: usize,
}

pub struct DetailView {
    pub feed_title: String,
    pub article: Article,
    pub body: String,
    pub summary: SummaryState,
    pub scroll: u16,
    generation: u64,
}

pub enum SummaryState {
    Loading,
    Ready(String),
}

pub struct App {
    // UI state
    pub screen: Screen,
    pub status: Option<String>,
    pub spinner_frame: usize,

    page_size: usize,
    summary_generation: u64,
    active_syncs: usize,

    // Async plumbing
    sync_rx: mpsc::Receiver<SyncOutcome>,
    sync_tx: mpsc::Sender<SyncOutcome>,
    summary_rx: mpsc::Receiver<SummaryOutcome>,
    summary_tx: mpsc::Sender<SummaryOutcome>,

    // Services
    store: Store,
    engine: SyncEngine,
    summarizer: Arc<Summarizer>,
}

impl App {
    pub async fn new(store: Store, fetcher: Arc<dyn DocumentFetcher>, config: &Config) -> Result<Self> {
        let engine = SyncEngine::new(store.clone(), fetcher);
        let feeds = store.get_all_feeds().await?;

        let (sync_tx, sync_rx) = mpsc::channel(8);
        let (summary_tx, summary_rx) = mpsc::channel(8);

        Ok(Self {
            screen: Screen::Feeds(FeedsView {
                feeds,
                selected: 0,
                adding: false,
                input: String::new(),
            }),
            status: None,
            spinner_frame: 0,
            page_size: config.article_page_size,
            summary_generation: 0,
            active_syncs: 0,
            sync_rx,
            sync_tx,
            summary_rx,
            summary_tx,
            store,
            engine,
            summarizer: Arc::new(Summarizer::new()),
        })
    }

    pub fn tick_spinner(&mut self) {
        self.spinner_frame = self.spinner_frame.wrapping_add(1);
    }

    pub fn is_adding(&self) -> bool {
        matches!(&self.screen, Screen::Feeds(view) if view.adding)
    }

    pub fn is_syncing(&self) -> bool {
        self.active_syncs > 0
    }

    /// Drains one pending async completion, if any (non-blocking).
    pub fn poll_async_event(&mut self) -> Option<AppEvent> {
        if let Ok(outcome) = self.sync_rx.try_recv() {
            return Some(AppEvent::SyncFinished(outcome));
        }
        if let Ok(outcome) = self.summary_rx.try_recv() {
            return Some(AppEvent::SummaryReady(outcome));
        }
        None
    }

    /// Reduces one event. Returns true when the app should exit. Store
    /// failures mid-session land in the status line rather than tearing the
    /// session down.
    pub async fn on_event(&mut self, event: AppEvent) -> bool {
        match event {
            AppEvent::Action(action) => return self.on_action(action).await,
            AppEvent::SyncFinished(outcome) => self.on_sync_finished(outcome).await,
            AppEvent::SummaryReady(outcome) => self.on_summary_ready(outcome),
        }
        false
    }

    async fn on_action(&mut self, action: AppAction) -> bool {
        // Any keypress retires the previous status message
        self.status = None;

        match action {
            AppAction::Quit => return true,

            AppAction::MoveUp => self.move_selection(-1),
            AppAction::MoveDown => self.move_selection(1),

            AppAction::OpenSelected => self.open_selected().await,
            AppAction::Back => self.go_back().await,

            AppAction::StartAddFeed => {
                if let Screen::Feeds(view) = &mut self.screen {
                    view.adding = true;
                    view.input.clear();
                }
            }
            AppAction::InputChar(c) => {
                if let Screen::Feeds(view) = &mut self.screen {
                    view.input.push(c);
                }
            }
            AppAction::InputBackspace => {
                if let Screen::Feeds(view) = &mut self.screen {
                    view.input.pop();
                }
            }
            AppAction::InputCancel => {
                if let Screen::Feeds(view) = &mut self.screen {
                    view.adding = false;
                    view.input.clear();
                }
            }
            AppAction::InputConfirm => self.confirm_add_feed().await,

            AppAction::DeleteFeed => self.delete_selected_feed().await,
            AppAction::SyncSelected => self.sync_selected_feed(),
            AppAction::SyncAll => self.start_sync_all(),

            AppAction::OpenInBrowser => {
                if let Screen::Detail(view) = &self.screen {
                    let _ = open::that(&view.article.link);
                }
            }
        }

        false
    }

    fn move_selection(&mut self, delta: i64) {
        match &mut self.screen {
            Screen::Feeds(view) => move_cursor(&mut view.selected, view.feeds.len(), delta),
            Screen::Articles(view) => move_cursor(&mut view.selected, view.articles.len(), delta),
            Screen::Detail(view) => {
                view.scroll = if delta < 0 {
                    view.scroll.saturating_sub(1)
                } else {
                    view.scroll.saturating_add(1)
                };
            }
        }
    }

    async fn open_selected(&mut self) {
        match &self.screen {
            Screen::Feeds(view) => {
                let Some(feed) = view.feeds.get(view.selected).cloned() else {
                    return;
                };
                match self.build_articles_view(feed).await {
                    Ok(next) => self.screen = Screen::Articles(next),
                    Err(e) => self.report_error(e),
                }
            }
            Screen::Articles(view) => {
                let Some(article) = view.articles.get(view.selected).cloned() else {
                    return;
                };
                let feed_title = view.feed.title.clone();
                match self.build_detail_view(feed_title, article).await {
                    Ok(next) => self.screen = Screen::Detail(next),
                    Err(e) => self.report_error(e),
                }
            }
            Screen::Detail(_) => {}
        }
    }

    async fn go_back(&mut self) {
        match &self.screen {
            Screen::Feeds(_) => {}
            Screen::Articles(_) => self.reload_feeds().await,
            Screen::Detail(view) => {
                // Rebuild the article list so the read flag shows up
                let feed_id = view.article.feed_id;
                let rebuilt = match self.store.get_feed_by_id(feed_id).await {
                    Ok(feed) => self.build_articles_view(feed).await,
                    Err(e) => Err(e),
                };
                match rebuilt {
                    Ok(next) => self.screen = Screen::Articles(next),
                    Err(e) => self.report_error(e),
                }
            }
        }
    }

    async fn build_articles_view(&self, feed: Feed) -> Result<ArticlesView> {
        let articles = self.store.get_articles_by_feed(feed.id, self.page_size).await?;
        Ok(ArticlesView {
            feed,
            articles,
            selected: 0,
        })
    }

    async fn build_detail_view(&mut self, feed_title: String, article: Article) -> Result<DetailView> {
        // Opening counts as reading; re-fetch so the screen shows the row as
        // stored, flipped flag included.
        self.store.mark_article_read(article.id).await?;
        let article = self.store.get_article_by_id(article.id).await?;

        let body = article_body_text(&article);

        self.summary_generation += 1;
        let generation = self.summary_generation;
        let summarizer = Arc::clone(&self.summarizer);
        let snapshot = article.clone();
        let tx = self.summary_tx.clone();

        tokio::spawn(async move {
            let digest = summarizer.digest(&snapshot);
            let _ = tx.send(SummaryOutcome { generation, digest }).await;
        });

        Ok(DetailView {
            feed_title,
            article,
            body,
            summary: SummaryState::Loading,
            scroll: 0,
            generation,
        })
    }

    /// Rebuilds the Feeds screen from the store. Keeps the cursor clamped
    /// and, when the add prompt is open, the half-typed input.
    async fn reload_feeds(&mut self) {
        match self.store.get_all_feeds().await {
            Ok(feeds) => {
                let (selected, adding, input) = match &mut self.screen {
                    Screen::Feeds(view) => (
                        view.selected.min(feeds.len().saturating_sub(1)),
                        view.adding,
                        std::mem::take(&mut view.input),
                    ),
                    _ => (0, false, String::new()),
                };
                self.screen = Screen::Feeds(FeedsView {
                    feeds,
                    selected,
                    adding,
                    input,
                });
            }
            Err(e) => self.report_error(e),
        }
    }

    async fn confirm_add_feed(&mut self) {
        let url = match &mut self.screen {
            Screen::Feeds(view) if view.adding => {
                view.adding = false;
                std::mem::take(&mut view.input)
            }
            _ => return,
        };
        let url = url.trim().to_string();
        if url.is_empty() {
            return;
        }

        // No URL validation here: a bad URL stores fine with placeholder
        // metadata and simply fails to sync.
        match self.store.add_feed(&url, &url, "").await {
            Ok(feed) => {
                self.reload_feeds().await;
                self.start_sync_feed(feed);
            }
            Err(e) => self.report_error(e),
        }
    }

    async fn delete_selected_feed(&mut self) {
        if let Screen::Feeds(view) = &self.screen {
            let Some(feed) = view.feeds.get(view.selected).cloned() else {
                return;
            };
            match self.store.delete_feed(feed.id).await {
                Ok(()) => {
                    self.status = Some(format!("Deleted {}", feed.title));
                    self.reload_feeds().await;
                }
                Err(e) => self.report_error(e),
            }
        }
    }

    fn sync_selected_feed(&mut self) {
        if self.is_syncing() {
            self.status = Some("A sync is already running".to_string());
            return;
        }
        if let Screen::Feeds(view) = &self.screen {
            if let Some(feed) = view.feeds.get(view.selected).cloned() {
                self.start_sync_feed(feed);
            }
        }
    }

    /// Spawns a background sync of one feed; its outcome re-enters the
    /// reducer as a SyncFinished event. Unguarded: the add-feed flow syncs
    /// its new feed even while another sync is running, so the busy refusal
    /// lives with the sync keys instead.
    fn start_sync_feed(&mut self, feed: Feed) {
        self.active_syncs += 1;

        let engine = self.engine.clone();
        let tx = self.sync_tx.clone();
        tokio::spawn(async move {
            let result = engine.sync_feed(&feed).await.map_err(|e| e.to_string());
            let _ = tx
                .send(SyncOutcome::Feed {
                    feed_id: feed.id,
                    result,
                })
                .await;
        });
    }

    pub fn start_sync_all(&mut self) {
        if self.is_syncing() {
            self.status = Some("A sync is already running".to_string());
            return;
        }
        self.active_syncs += 1;

        let engine = self.engine.clone();
        let tx = self.sync_tx.clone();
        tokio::spawn(async move {
            let result = engine.sync_all().await.map_err(|e| e.to_string());
            let _ = tx.send(SyncOutcome::All { result }).await;
        });
    }

    async fn on_sync_finished(&mut self, outcome: SyncOutcome) {
        self.active_syncs = self.active_syncs.saturating_sub(1);

        match outcome {
            SyncOutcome::Feed { feed_id, result } => match result {
                Ok(added) => {
                    tracing::debug!("feed {feed_id}: sync added {added}");
                    self.status = Some(format!("Synced: {added} new article{}", plural(added)));
                }
                Err(e) => self.status = Some(format!("Sync failed: {e}")),
            },
            SyncOutcome::All { result } => match result {
                Ok(results) => {
                    let added: usize = results.values().sum();
                    self.status = Some(format!(
                        "Synced {} feed{}: {added} new article{}",
                        results.len(),
                        plural(results.len()),
                        plural(added)
                    ));
                }
                Err(e) => self.status = Some(format!("Sync failed: {e}")),
            },
        }

        // Fresh metadata and stamps should show up right away on the list
        if matches!(self.screen, Screen::Feeds(_)) {
            self.reload_feeds().await;
        }
    }

    fn on_summary_ready(&mut self, outcome: SummaryOutcome) {
        match &mut self.screen {
            Screen::Detail(view) if view.generation == outcome.generation => {
                view.summary = SummaryState::Ready(outcome.digest);
            }
            _ => {
                // A completion for a Detail visit the user already left
                tracing::debug!("dropping stale summary (generation {})", outcome.generation);
            }
        }
    }

    fn report_error(&mut self, err: AppError) {
        tracing::warn!("{err}");
        self.status = Some(format!("Error: {err}"));
    }
}

fn move_cursor(selected: &mut usize, len: usize, delta: i64) {
    if len == 0 {
        return;
    }
    if delta < 0 {
        *selected = selected.saturating_sub(1);
    } else if *selected + 1 < len {
        *selected += 1;
    }
}

fn article_body_text(article: &Article) -> String {
    if article.summary.trim().is_empty() {
        return "No content stored for this article.".to_string();
    }
    html2text::from_read(article.summary.as_bytes(), 80)
        .unwrap_or_else(|_| article.summary.clone())
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}
