use std::collections::HashMap;
use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::action::{Action, MovieList};
use crate::connectivity::NetworkStatus;
use crate::event::Event;
use crate::navigation::{Debouncer, NavCommand, Navigator, Tab, View};
use crate::pagination::{FetchTicket, PagedList};
use crate::retry::Outcome;
use crate::source::MovieSource;
use crate::types::{Movie, MovieBundle, Rating, Review, UserReview};

/// Rows from the end of a list at which the next page is requested.
const LOAD_MORE_THRESHOLD: usize = 5;
const PAGE_STEP: usize = 10;

#[derive(Default)]
pub struct SearchState {
    /// Query the current results belong to.
    pub query: String,
    /// Text being edited.
    pub input: String,
    pub editing: bool,
    pub results: Option<PagedList<Movie>>,
    pub index: usize,
}

pub struct DetailsState {
    pub movie_id: u64,
    pub bundle: Option<MovieBundle>,
    pub error: Option<String>,
    pub reviews: PagedList<Review>,
    pub scroll: usize,
    cancel: CancellationToken,
}

impl DetailsState {
    fn new(movie_id: u64) -> Self {
        Self {
            movie_id,
            bundle: None,
            error: None,
            reviews: PagedList::new(),
            scroll: 0,
            cancel: CancellationToken::new(),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.bundle.is_none() && self.error.is_none()
    }

    pub fn title(&self) -> Option<&str> {
        self.bundle.as_ref().map(|b| b.details.title.as_str())
    }

    fn teardown(&mut self) {
        self.cancel.cancel();
        self.reviews.cancel_all();
    }
}

pub struct ComposeState {
    pub movie_id: u64,
    pub title: String,
    pub rating: Rating,
    pub text: String,
    pub submitting: bool,
}

pub struct App {
    pub navigator: Navigator,

    // Home: popular tab
    pub popular: PagedList<Movie>,
    pub popular_index: usize,

    // Home: search tab
    pub search: SearchState,

    // Pushed views
    pub details: Option<DetailsState>,
    pub compose: Option<ComposeState>,

    /// Reviews written this session, by movie
    pub my_reviews: HashMap<u64, UserReview>,

    pub network: NetworkStatus,
    pub error: Option<String>,
    pub notice: Option<String>,
    pub should_quit: bool,

    network_rx: watch::Receiver<NetworkStatus>,
    nav_queue: Debouncer<Action>,
    source: Arc<dyn MovieSource>,
    action_tx: mpsc::UnboundedSender<Action>,
}

impl App {
    pub fn new(
        source: Arc<dyn MovieSource>,
        action_tx: mpsc::UnboundedSender<Action>,
        network_rx: watch::Receiver<NetworkStatus>,
        debounce: std::time::Duration,
    ) -> Self {
        let network = *network_rx.borrow();
        Self {
            navigator: Navigator::new(),
            popular: PagedList::new(),
            popular_index: 0,
            search: SearchState::default(),
            details: None,
            compose: None,
            my_reviews: HashMap::new(),
            network,
            error: None,
            notice: None,
            should_quit: false,
            network_rx,
            nav_queue: Debouncer::new(debounce, action_tx.clone()),
            source,
            action_tx,
        }
    }

    /// Mount the home screen. With `query`, start on the search tab.
    pub fn start(&mut self, query: Option<String>) {
        if let Some(ticket) = self.popular.reset_and_load() {
            self.spawn_movies(MovieList::Popular, ticket, None);
        }

        if let Some(query) = query.filter(|q| !q.trim().is_empty()) {
            self.navigator.set_tab(Tab::Search);
            self.search.input = query;
            self.submit_search();
        }
    }

    /// Unmount everything: no request or scheduled navigation survives this.
    pub fn teardown(&mut self) {
        self.nav_queue.cancel();
        self.popular.cancel_all();
        if let Some(results) = self.search.results.as_mut() {
            results.cancel_all();
        }
        if let Some(details) = self.details.as_mut() {
            details.teardown();
        }
    }

    /// Render-frame boundary.
    pub fn on_frame(&mut self) {
        self.navigator.on_frame();
        if self.network_rx.has_changed().unwrap_or(false) {
            self.network = *self.network_rx.borrow_and_update();
        }
    }

    pub fn handle_event(&self, event: Event) -> Action {
        match event {
            Event::Key(key) => self.handle_key(key),
            _ => Action::None,
        }
    }

    pub fn is_editing_search(&self) -> bool {
        self.navigator.at_home()
            && self.navigator.active_tab() == Tab::Search
            && self.search.editing
    }

    fn handle_key(&self, key: KeyEvent) -> Action {
        if self.is_editing_search() {
            return match key.code {
                KeyCode::Esc => Action::ExitSearchMode,
                KeyCode::Enter => Action::SearchConfirm,
                KeyCode::Backspace => Action::SearchBackspace,
                KeyCode::Char(c) => Action::SearchInput(c),
                _ => Action::None,
            };
        }

        if let View::ComposeReview { .. } = self.navigator.current() {
            return match (key.code, key.modifiers) {
                (KeyCode::Esc, _) => Action::Back,
                (KeyCode::Char('s'), KeyModifiers::CONTROL) => Action::SubmitReview,
                (KeyCode::Up, _) => Action::RatingUp,
                (KeyCode::Down, _) => Action::RatingDown,
                (KeyCode::Enter, _) => Action::ComposeNewline,
                (KeyCode::Backspace, _) => Action::ComposeBackspace,
                (KeyCode::Char(c), m) if !m.contains(KeyModifiers::CONTROL) => {
                    Action::ComposeInput(c)
                }
                _ => Action::None,
            };
        }

        let on_details = matches!(self.navigator.current(), View::Details { .. });

        match (key.code, key.modifiers) {
            (KeyCode::Char('q'), _) | (KeyCode::Esc, _) => Action::Back,
            (KeyCode::Char('d'), KeyModifiers::CONTROL) | (KeyCode::PageDown, _) => {
                Action::PageDown
            }
            (KeyCode::Char('u'), KeyModifiers::CONTROL) | (KeyCode::PageUp, _) => Action::PageUp,
            (KeyCode::Char('j'), _) | (KeyCode::Down, _) => Action::ScrollDown,
            (KeyCode::Char('k'), _) | (KeyCode::Up, _) => Action::ScrollUp,
            (KeyCode::Char('g'), _) | (KeyCode::Home, _) => Action::GoToTop,
            (KeyCode::Char('G'), _) | (KeyCode::End, _) => Action::GoToBottom,
            (KeyCode::Enter, _) => Action::Select,
            (KeyCode::Tab, _) if !on_details => Action::NextTab,
            (KeyCode::Char('/'), _) if !on_details => Action::EnterSearchMode,
            (KeyCode::Char('r'), _) => Action::Refresh,
            (KeyCode::Char('R'), _) => Action::Reload,
            (KeyCode::Char('n'), _) if on_details => Action::LoadMore,
            (KeyCode::Char('w'), _) if on_details => Action::WriteReview,
            (KeyCode::Char('o'), _) if on_details => Action::OpenInBrowser,
            (KeyCode::Char('y'), _) if on_details => Action::YankUrl,
            _ => Action::None,
        }
    }

    pub fn update(&mut self, action: Action) {
        if self.error.is_some() && !matches!(action, Action::None | Action::Navigate { .. }) {
            self.error = None;
        }
        if !matches!(action, Action::None) {
            self.notice = None;
        }

        match action {
            Action::Back => {
                // Back supersedes any navigation still waiting out the debounce.
                self.nav_queue.cancel();
                if self.navigator.handle_back() {
                    self.sync_views();
                } else {
                    self.should_quit = true;
                }
            }
            Action::ScrollUp => self.move_selection(-1),
            Action::ScrollDown => self.move_selection(1),
            Action::PageUp => self.move_selection(-(PAGE_STEP as isize)),
            Action::PageDown => self.move_selection(PAGE_STEP as isize),
            Action::GoToTop => self.move_selection(isize::MIN),
            Action::GoToBottom => self.move_selection(isize::MAX),
            Action::Select => {
                if let Some(movie_id) = self.selected_movie().map(|m| m.id) {
                    self.schedule_nav(NavCommand::OpenDetails { movie_id });
                }
            }
            Action::NextTab => {
                let next = self.navigator.active_tab().next();
                self.schedule_nav(NavCommand::SwitchTab(next));
            }

            Action::Refresh => self.refresh_current(false),
            Action::Reload => self.refresh_current(true),
            Action::LoadMore => self.load_more(),
            Action::MoviesLoaded {
                list,
                ticket,
                outcome,
            } => {
                let target = match list {
                    MovieList::Popular => Some(&mut self.popular),
                    MovieList::Search => self.search.results.as_mut(),
                };
                if let Some(target) = target {
                    target.complete(ticket, outcome);
                }
                self.clamp_selection();
            }

            Action::Navigate { seq, command } => {
                if !self.nav_queue.accept(seq) {
                    return;
                }
                if self.navigator.apply(command) {
                    self.sync_views();
                }
            }

            Action::BundleLoaded { movie_id, outcome } => {
                let Some(details) = self.details.as_mut().filter(|d| d.movie_id == movie_id) else {
                    debug!(movie_id, "details result for unmounted view");
                    return;
                };
                match outcome {
                    Outcome::Done(bundle) => {
                        // The first reviews page arrives with the bundle.
                        if let Some(ticket) = details.reviews.reset_and_load() {
                            details
                                .reviews
                                .complete(ticket.id, Outcome::Done(bundle.reviews.clone()));
                        }
                        details.bundle = Some(bundle);
                    }
                    Outcome::Failed(err) => details.error = Some(err.to_string()),
                    Outcome::Cancelled => {}
                }
            }
            Action::ReviewsLoaded {
                movie_id,
                ticket,
                outcome,
            } => {
                if let Some(details) = self.details.as_mut().filter(|d| d.movie_id == movie_id) {
                    details.reviews.complete(ticket, outcome);
                }
            }
            Action::OpenInBrowser => {
                if let Some(url) = self.current_url() {
                    match open::that(&url) {
                        Ok(()) => self.notice = Some(format!("Opened {}", url)),
                        Err(e) => self.error = Some(format!("Could not open browser: {}", e)),
                    }
                }
            }
            Action::YankUrl => {
                if let Some(url) = self.current_url() {
                    match arboard::Clipboard::new().and_then(|mut c| c.set_text(url.clone())) {
                        Ok(()) => self.notice = Some(format!("Copied {}", url)),
                        Err(e) => self.error = Some(format!("Clipboard unavailable: {}", e)),
                    }
                }
            }

            Action::EnterSearchMode => {
                if self.navigator.at_home() {
                    if self.navigator.active_tab() != Tab::Search {
                        self.schedule_nav(NavCommand::SwitchTab(Tab::Search));
                    }
                    self.search.editing = true;
                }
            }
            Action::ExitSearchMode => {
                self.search.editing = false;
                self.search.input = self.search.query.clone();
            }
            Action::SearchInput(c) => self.search.input.push(c),
            Action::SearchBackspace => {
                self.search.input.pop();
            }
            Action::SearchConfirm => self.submit_search(),

            Action::WriteReview => {
                let command = self.details.as_ref().and_then(|d| {
                    d.title().map(|title| NavCommand::OpenCompose {
                        movie_id: d.movie_id,
                        title: title.to_string(),
                    })
                });
                if let Some(command) = command {
                    self.schedule_nav(command);
                }
            }
            Action::ComposeInput(c) => {
                if let Some(compose) = self.compose.as_mut().filter(|c| !c.submitting) {
                    compose.text.push(c);
                }
            }
            Action::ComposeNewline => {
                if let Some(compose) = self.compose.as_mut().filter(|c| !c.submitting) {
                    compose.text.push('\n');
                }
            }
            Action::ComposeBackspace => {
                if let Some(compose) = self.compose.as_mut().filter(|c| !c.submitting) {
                    compose.text.pop();
                }
            }
            Action::RatingUp => {
                if let Some(compose) = self.compose.as_mut() {
                    compose.rating = compose.rating.increment();
                }
            }
            Action::RatingDown => {
                if let Some(compose) = self.compose.as_mut() {
                    compose.rating = compose.rating.decrement();
                }
            }
            Action::SubmitReview => self.submit_review(),
            Action::ReviewSubmitted { movie_id } => {
                if let Some(compose) = self.compose.as_mut().filter(|c| c.movie_id == movie_id) {
                    compose.submitting = false;
                    self.my_reviews.insert(
                        movie_id,
                        UserReview {
                            movie_id,
                            rating: compose.rating,
                            text: compose.text.trim().to_string(),
                        },
                    );
                    self.notice = Some(format!("Review for {} submitted", compose.title));
                    self.schedule_nav(NavCommand::Back);
                }
            }

            Action::Error(msg) => {
                if let Some(compose) = self.compose.as_mut() {
                    compose.submitting = false;
                }
                self.error = Some(msg);
            }
            Action::None => {}
        }
    }

    fn schedule_nav(&mut self, command: NavCommand) {
        debug!(?command, "schedule navigation");
        self.nav_queue
            .schedule(|seq| Action::Navigate { seq, command });
    }

    /// Bring mounted per-view state in line with the navigation stack:
    /// views that left the stack are torn down, new ones are mounted.
    fn sync_views(&mut self) {
        let wanted_details = self.navigator.stack().iter().rev().find_map(|view| match view {
            View::Details { movie_id } => Some(*movie_id),
            _ => None,
        });

        if self.details.as_ref().map(|d| d.movie_id) != wanted_details {
            if let Some(mut old) = self.details.take() {
                debug!(movie_id = old.movie_id, "unmount details");
                old.teardown();
            }
            if let Some(movie_id) = wanted_details {
                debug!(movie_id, "mount details");
                let details = DetailsState::new(movie_id);
                self.spawn_bundle(movie_id, details.cancel.clone());
                self.details = Some(details);
            }
        }

        match self.navigator.current() {
            View::ComposeReview { movie_id, title } => {
                if self.compose.as_ref().map(|c| c.movie_id) != Some(*movie_id) {
                    let rating = self
                        .my_reviews
                        .get(movie_id)
                        .map(|r| r.rating)
                        .unwrap_or_default();
                    self.compose = Some(ComposeState {
                        movie_id: *movie_id,
                        title: title.clone(),
                        rating,
                        text: String::new(),
                        submitting: false,
                    });
                }
            }
            _ => self.compose = None,
        }

        if self.navigator.at_home()
            && self.navigator.active_tab() == Tab::Search
            && self.search.results.is_none()
        {
            self.search.editing = true;
        }
    }

    pub fn selected_movie(&self) -> Option<&Movie> {
        if !self.navigator.at_home() {
            return None;
        }
        match self.navigator.active_tab() {
            Tab::Primary => self.popular.get(self.popular_index),
            Tab::Search => self
                .search
                .results
                .as_ref()
                .and_then(|r| r.get(self.search.index)),
        }
    }

    fn move_selection(&mut self, delta: isize) {
        match self.navigator.current() {
            View::Home => {
                let (index, len) = match self.navigator.active_tab() {
                    Tab::Primary => (&mut self.popular_index, self.popular.len()),
                    Tab::Search => (
                        &mut self.search.index,
                        self.search.results.as_ref().map_or(0, |r| r.len()),
                    ),
                };
                *index = step(*index, delta, len);
                if len > 0 && *index + LOAD_MORE_THRESHOLD >= len {
                    self.load_more();
                }
            }
            View::Details { .. } => {
                if let Some(details) = self.details.as_mut() {
                    details.scroll = step(details.scroll, delta, usize::MAX);
                }
            }
            View::ComposeReview { .. } => {}
        }
    }

    fn clamp_selection(&mut self) {
        self.popular_index = self.popular_index.min(self.popular.len().saturating_sub(1));
        let search_len = self.search.results.as_ref().map_or(0, |r| r.len());
        self.search.index = self.search.index.min(search_len.saturating_sub(1));
    }

    fn load_more(&mut self) {
        match self.navigator.current() {
            View::Home => match self.navigator.active_tab() {
                Tab::Primary => {
                    if let Some(ticket) = self.popular.load_next() {
                        self.spawn_movies(MovieList::Popular, ticket, None);
                    }
                }
                Tab::Search => {
                    let query = self.search.query.clone();
                    if let Some(ticket) = self.search.results.as_mut().and_then(|r| r.load_next()) {
                        self.spawn_movies(MovieList::Search, ticket, Some(query));
                    }
                }
            },
            View::Details { .. } => {
                if let Some(details) = self.details.as_mut() {
                    let movie_id = details.movie_id;
                    if let Some(ticket) = details.reviews.load_next() {
                        self.spawn_reviews(movie_id, ticket);
                    }
                }
            }
            View::ComposeReview { .. } => {}
        }
    }

    fn refresh_current(&mut self, from_scratch: bool) {
        match self.navigator.current() {
            View::Home => match self.navigator.active_tab() {
                Tab::Primary => {
                    let ticket = if from_scratch {
                        self.popular.reset_and_load()
                    } else {
                        self.popular.refresh()
                    };
                    if let Some(ticket) = ticket {
                        self.popular_index = 0;
                        self.spawn_movies(MovieList::Popular, ticket, None);
                    }
                }
                Tab::Search => {
                    let query = self.search.query.clone();
                    let ticket = self.search.results.as_mut().and_then(|r| {
                        if from_scratch {
                            r.reset_and_load()
                        } else {
                            r.refresh()
                        }
                    });
                    if let Some(ticket) = ticket {
                        self.search.index = 0;
                        self.spawn_movies(MovieList::Search, ticket, Some(query));
                    }
                }
            },
            View::Details { movie_id } => {
                let movie_id = *movie_id;
                if let Some(mut old) = self.details.take() {
                    old.teardown();
                }
                let details = DetailsState::new(movie_id);
                self.spawn_bundle(movie_id, details.cancel.clone());
                self.details = Some(details);
            }
            View::ComposeReview { .. } => {}
        }
    }

    /// Replace the search list with a fresh one for the edited query.
    fn submit_search(&mut self) {
        let query = self.search.input.trim().to_string();
        self.search.editing = false;
        if query.is_empty() {
            return;
        }

        if let Some(mut old) = self.search.results.take() {
            old.cancel_all();
        }
        let mut results = PagedList::new();
        let ticket = results.reset_and_load();
        self.search.query = query.clone();
        self.search.input = query.clone();
        self.search.index = 0;
        self.search.results = Some(results);

        if let Some(ticket) = ticket {
            self.spawn_movies(MovieList::Search, ticket, Some(query));
        }
    }

    fn submit_review(&mut self) {
        let Some(compose) = self.compose.as_mut() else {
            return;
        };
        if compose.submitting {
            return;
        }
        compose.submitting = true;

        let tx = self.action_tx.clone();
        let source = Arc::clone(&self.source);
        let movie_id = compose.movie_id;
        let rating = compose.rating;
        tokio::spawn(async move {
            match source.rate_movie(movie_id, rating).await {
                Ok(()) => {
                    tx.send(Action::ReviewSubmitted { movie_id }).ok();
                }
                Err(e) => {
                    tx.send(Action::from(e)).ok();
                }
            }
        });
    }

    fn current_url(&self) -> Option<String> {
        match self.navigator.current() {
            View::Details { movie_id } | View::ComposeReview { movie_id, .. } => {
                Some(self.source.web_url(*movie_id))
            }
            View::Home => self.selected_movie().map(|m| self.source.web_url(m.id)),
        }
    }

    fn spawn_movies(&self, list: MovieList, ticket: FetchTicket, query: Option<String>) {
        let tx = self.action_tx.clone();
        let source = Arc::clone(&self.source);
        tokio::spawn(async move {
            let outcome = match &query {
                Some(query) => source.search(query, ticket.page, &ticket.cancel).await,
                None => source.popular(ticket.page, &ticket.cancel).await,
            };
            tx.send(Action::MoviesLoaded {
                list,
                ticket: ticket.id,
                outcome,
            })
            .ok();
        });
    }

    fn spawn_bundle(&self, movie_id: u64, cancel: CancellationToken) {
        let tx = self.action_tx.clone();
        let source = Arc::clone(&self.source);
        tokio::spawn(async move {
            let outcome = source.movie_bundle(movie_id, &cancel).await;
            tx.send(Action::BundleLoaded { movie_id, outcome }).ok();
        });
    }

    fn spawn_reviews(&self, movie_id: u64, ticket: FetchTicket) {
        let tx = self.action_tx.clone();
        let source = Arc::clone(&self.source);
        tokio::spawn(async move {
            let outcome = source.reviews(movie_id, ticket.page, &ticket.cancel).await;
            tx.send(Action::ReviewsLoaded {
                movie_id,
                ticket: ticket.id,
                outcome,
            })
            .ok();
        });
    }
}

/// Move `index` by `delta` within `0..len`, saturating at both ends.
fn step(index: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let last = len - 1;
    if delta < 0 {
        index.saturating_sub(delta.unsigned_abs()).min(last)
    } else {
        index.saturating_add(delta as usize).min(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::connectivity::Connectivity;
    use crate::error::{MarqueeError, Result};
    use crate::types::{MovieDetails, PagedResult};

    /// Three pages of popular movies, overlapping by one id at each boundary.
    #[derive(Debug, Default)]
    struct FakeSource {
        popular_calls: AtomicU32,
        ratings: Mutex<Vec<(u64, u8)>>,
    }

    fn movie(id: u64) -> Movie {
        Movie {
            id,
            title: format!("Movie {}", id),
            overview: String::new(),
            release_date: None,
            vote_average: 7.0,
            vote_count: 10,
        }
    }

    #[async_trait]
    impl MovieSource for FakeSource {
        fn name(&self) -> &str {
            "fake"
        }

        fn web_url(&self, movie_id: u64) -> String {
            format!("https://example.test/movie/{}", movie_id)
        }

        async fn popular(
            &self,
            page: u32,
            cancel: &CancellationToken,
        ) -> Outcome<PagedResult<Movie>> {
            self.popular_calls.fetch_add(1, Ordering::SeqCst);
            if cancel.is_cancelled() {
                return Outcome::Cancelled;
            }
            let start = u64::from(page - 1) * 3;
            Outcome::Done(PagedResult {
                page,
                total_pages: 3,
                items: (start..=start + 3).map(movie).collect(),
            })
        }

        async fn search(
            &self,
            query: &str,
            page: u32,
            _cancel: &CancellationToken,
        ) -> Outcome<PagedResult<Movie>> {
            if query == "fail" {
                return Outcome::Failed(MarqueeError::Status {
                    status: 422,
                    message: "query must be provided".into(),
                });
            }
            Outcome::Done(PagedResult {
                page,
                total_pages: 1,
                items: vec![movie(100), movie(101)],
            })
        }

        async fn movie_bundle(
            &self,
            movie_id: u64,
            _cancel: &CancellationToken,
        ) -> Outcome<MovieBundle> {
            Outcome::Done(MovieBundle {
                details: MovieDetails {
                    id: movie_id,
                    title: format!("Movie {}", movie_id),
                    tagline: None,
                    overview: String::new(),
                    release_date: None,
                    runtime: Some(100),
                    genres: vec![],
                    vote_average: 7.0,
                    vote_count: 10,
                },
                cast: vec![],
                reviews: PagedResult {
                    page: 1,
                    total_pages: 2,
                    items: vec![],
                },
            })
        }

        async fn reviews(
            &self,
            _movie_id: u64,
            page: u32,
            _cancel: &CancellationToken,
        ) -> Outcome<PagedResult<Review>> {
            Outcome::Done(PagedResult {
                page,
                total_pages: 2,
                items: vec![],
            })
        }

        async fn rate_movie(&self, movie_id: u64, rating: Rating) -> Result<()> {
            self.ratings.lock().unwrap().push((movie_id, rating.value()));
            Ok(())
        }
    }

    struct Harness {
        app: App,
        rx: mpsc::UnboundedReceiver<Action>,
        source: Arc<FakeSource>,
    }

    impl Harness {
        fn new() -> Self {
            let (tx, rx) = mpsc::unbounded_channel();
            let source = Arc::new(FakeSource::default());
            let connectivity = Connectivity::new();
            let app = App::new(
                source.clone(),
                tx,
                connectivity.subscribe(),
                Duration::from_millis(100),
            );
            Self { app, rx, source }
        }

        /// Feed queued actions back into the app until the channel is quiet.
        async fn settle(&mut self) {
            loop {
                tokio::time::sleep(Duration::from_millis(150)).await;
                let mut any = false;
                while let Ok(action) = self.rx.try_recv() {
                    self.app.update(action);
                    any = true;
                }
                if !any {
                    break;
                }
            }
        }

        fn press(&mut self, code: KeyCode) {
            let action = self
                .app
                .handle_event(Event::Key(KeyEvent::new(code, KeyModifiers::NONE)));
            self.app.update(action);
        }

        fn frame(&mut self) {
            self.app.on_frame();
        }
    }

    #[test]
    fn step_saturates() {
        assert_eq!(step(0, -1, 5), 0);
        assert_eq!(step(3, 10, 5), 4);
        assert_eq!(step(2, isize::MIN, 5), 0);
        assert_eq!(step(2, isize::MAX, 5), 4);
        assert_eq!(step(2, 1, 0), 0);
    }

    #[tokio::test]
    async fn network_status_is_read_at_startup_and_on_frames() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let connectivity = Connectivity::new();
        connectivity.report(NetworkStatus::Offline);

        let mut app = App::new(
            Arc::new(FakeSource::default()),
            tx,
            connectivity.subscribe(),
            Duration::from_millis(100),
        );
        assert_eq!(app.network, NetworkStatus::Offline);

        connectivity.report(NetworkStatus::Online);
        assert_eq!(app.network, NetworkStatus::Offline);
        app.on_frame();
        assert_eq!(app.network, NetworkStatus::Online);
    }

    #[tokio::test(start_paused = true)]
    async fn popular_pages_merge_without_duplicates() {
        let mut h = Harness::new();
        h.app.start(None);
        h.settle().await;
        assert_eq!(h.app.popular.len(), 4);

        h.app.update(Action::LoadMore);
        h.settle().await;
        h.app.update(Action::LoadMore);
        h.settle().await;

        let ids: Vec<u64> = h.app.popular.items().iter().map(|m| m.id).collect();
        assert_eq!(ids, (0..=9).collect::<Vec<_>>());
        assert_eq!(h.app.popular.page(), 3);

        let calls = h.source.popular_calls.load(Ordering::SeqCst);
        h.app.update(Action::LoadMore);
        h.settle().await;
        assert_eq!(h.source.popular_calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_opens_pushes_one_view() {
        let mut h = Harness::new();
        h.app.start(None);
        h.settle().await;

        h.press(KeyCode::Enter);
        h.press(KeyCode::Down);
        h.press(KeyCode::Enter);
        h.settle().await;

        assert_eq!(h.app.navigator.stack().len(), 2);
        assert_eq!(
            h.app.navigator.current(),
            &View::Details { movie_id: 1 }
        );
        let details = h.app.details.as_ref().unwrap();
        assert_eq!(details.movie_id, 1);
        assert!(details.bundle.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn review_flow_returns_to_details() {
        let mut h = Harness::new();
        h.app.start(None);
        h.settle().await;

        h.press(KeyCode::Enter);
        h.settle().await;
        h.press(KeyCode::Char('w'));
        h.settle().await;
        assert!(matches!(
            h.app.navigator.current(),
            View::ComposeReview { movie_id: 0, .. }
        ));

        for c in "great".chars() {
            h.press(KeyCode::Char(c));
        }
        h.press(KeyCode::Up);
        h.app.update(Action::SubmitReview);
        h.settle().await;

        assert_eq!(h.app.navigator.current(), &View::Details { movie_id: 0 });
        assert!(h.app.compose.is_none());
        let review = &h.app.my_reviews[&0];
        assert_eq!(review.text, "great");
        assert_eq!(review.rating.value(), 8);
        assert_eq!(*h.source.ratings.lock().unwrap(), vec![(0, 8)]);
    }

    #[tokio::test(start_paused = true)]
    async fn back_unwinds_stack_then_tabs_then_quits() {
        let mut h = Harness::new();
        h.app.start(None);
        h.settle().await;

        h.press(KeyCode::Tab);
        h.settle().await;
        assert_eq!(h.app.navigator.active_tab(), Tab::Search);
        // Empty search tab opens the query editor; leave it.
        assert!(h.app.search.editing);
        h.press(KeyCode::Esc);

        h.press(KeyCode::Char('q'));
        assert_eq!(h.app.navigator.active_tab(), Tab::Primary);
        assert!(!h.app.should_quit);

        // Still inside the same frame: consumed without effect.
        h.press(KeyCode::Char('q'));
        assert!(!h.app.should_quit);

        h.frame();
        h.press(KeyCode::Char('q'));
        assert!(h.app.should_quit);
    }

    #[tokio::test(start_paused = true)]
    async fn back_cancels_scheduled_navigation() {
        let mut h = Harness::new();
        h.app.start(None);
        h.settle().await;

        h.press(KeyCode::Enter);
        h.settle().await;
        h.frame();
        assert_eq!(h.app.navigator.current(), &View::Details { movie_id: 0 });

        h.press(KeyCode::Char('w'));
        h.press(KeyCode::Esc);
        h.settle().await;

        assert_eq!(h.app.navigator.stack(), &[View::Home]);
        assert!(h.app.compose.is_none());
        assert!(h.app.details.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn leaving_details_tears_it_down() {
        let mut h = Harness::new();
        h.app.start(None);
        h.settle().await;

        h.press(KeyCode::Enter);
        h.settle().await;
        let cancel = h.app.details.as_ref().unwrap().cancel.clone();

        h.press(KeyCode::Esc);
        assert!(h.app.details.is_none());
        assert!(cancel.is_cancelled());

        // A late result for the closed view is ignored.
        h.app.update(Action::BundleLoaded {
            movie_id: 0,
            outcome: Outcome::Cancelled,
        });
        assert!(h.app.details.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn search_error_is_recorded_on_the_list() {
        let mut h = Harness::new();
        h.app.start(Some("fail".into()));
        h.settle().await;

        assert_eq!(h.app.navigator.active_tab(), Tab::Search);
        let results = h.app.search.results.as_ref().unwrap();
        assert!(results.error().unwrap().contains("422"));

        h.press(KeyCode::Char('/'));
        for _ in 0..4 {
            h.press(KeyCode::Backspace);
        }
        for c in "alien".chars() {
            h.press(KeyCode::Char(c));
        }
        h.press(KeyCode::Enter);
        h.settle().await;

        let results = h.app.search.results.as_ref().unwrap();
        assert!(results.error().is_none());
        assert_eq!(results.len(), 2);
        assert_eq!(h.app.search.query, "alien");
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_cancels_pending_navigation() {
        let mut h = Harness::new();
        h.app.start(None);
        h.settle().await;

        h.press(KeyCode::Enter);
        h.app.teardown();
        h.settle().await;

        assert_eq!(h.app.navigator.stack(), &[View::Home]);
    }
}
