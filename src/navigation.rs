//! View history and back-request arbitration.
//!
//! The [`Navigator`] owns the stack of open views. Structural changes reach
//! it in two ways:
//!
//! - the back key is arbitrated synchronously by [`Navigator::handle_back`],
//!   guarded by a lock that is only released at the next render frame;
//! - everything else is scheduled through a [`Debouncer`], which delivers
//!   the last command of a burst onto the app's action channel. That channel
//!   has a single consumer, so commands are applied strictly one at a time.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Home,
    Details { movie_id: u64 },
    ComposeReview { movie_id: u64, title: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Primary,
    Search,
}

impl Tab {
    pub const ALL: [Tab; 2] = [Tab::Primary, Tab::Search];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tab::Primary => "primary",
            Tab::Search => "search",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Primary => "Popular",
            Tab::Search => "Search",
        }
    }

    pub fn next(self) -> Tab {
        match self {
            Tab::Primary => Tab::Search,
            Tab::Search => Tab::Primary,
        }
    }
}

/// A navigation intent, applied by [`Navigator::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavCommand {
    Back,
    OpenDetails { movie_id: u64 },
    OpenCompose { movie_id: u64, title: String },
    SwitchTab(Tab),
}

#[derive(Debug, Clone)]
pub struct Navigator {
    stack: Vec<View>,
    tab_history: Vec<Tab>,
    active_tab: Tab,
    back_lock: bool,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator {
    pub fn new() -> Self {
        Self {
            stack: vec![View::Home],
            tab_history: Vec::new(),
            active_tab: Tab::default(),
            back_lock: false,
        }
    }

    pub fn current(&self) -> &View {
        static ROOT: View = View::Home;
        self.stack.last().unwrap_or(&ROOT)
    }

    pub fn stack(&self) -> &[View] {
        &self.stack
    }

    pub fn active_tab(&self) -> Tab {
        self.active_tab
    }

    #[cfg(test)]
    pub fn tab_history(&self) -> &[Tab] {
        &self.tab_history
    }

    #[cfg(test)]
    pub fn is_back_locked(&self) -> bool {
        self.back_lock
    }

    pub fn at_home(&self) -> bool {
        matches!(self.current(), View::Home)
    }

    pub fn push(&mut self, view: View) {
        debug!(?view, depth = self.stack.len() + 1, "push view");
        self.stack.push(view);
    }

    /// Remove the top view. The root `Home` view is never removed.
    pub fn pop(&mut self) -> Option<View> {
        if self.stack.len() <= 1 {
            return None;
        }
        let view = self.stack.pop();
        debug!(?view, depth = self.stack.len(), "pop view");
        view
    }

    /// Switch the home tab, remembering the previous one for back navigation.
    /// Only meaningful while `Home` is on top.
    pub fn set_tab(&mut self, tab: Tab) -> bool {
        if !self.at_home() || tab == self.active_tab {
            return false;
        }
        self.tab_history.push(self.active_tab);
        self.active_tab = tab;
        debug!(tab = tab.as_str(), history = self.tab_history.len(), "switch tab");
        true
    }

    /// Arbitrate a back request. `true` means it was consumed; `false` means
    /// nothing is left to go back to and the caller should apply its default
    /// (quitting).
    ///
    /// The lock taken here is released by [`on_frame`](Self::on_frame), so a
    /// burst of back presses within one frame mutates the stack at most once.
    pub fn handle_back(&mut self) -> bool {
        if self.back_lock {
            debug!("back request ignored: lock held");
            return true;
        }
        self.back_lock = true;

        if !self.at_home() {
            self.pop();
            return true;
        }

        if let Some(tab) = self.tab_history.pop() {
            debug!(tab = tab.as_str(), "restore previous tab");
            self.active_tab = tab;
            return true;
        }

        false
    }

    /// Render-frame boundary.
    pub fn on_frame(&mut self) {
        self.back_lock = false;
    }

    /// Apply a scheduled command. Returns whether the visible view changed.
    pub fn apply(&mut self, command: NavCommand) -> bool {
        match command {
            NavCommand::Back => self.pop().is_some(),
            NavCommand::OpenDetails { movie_id } => {
                self.push(View::Details { movie_id });
                true
            }
            NavCommand::OpenCompose { movie_id, title } => {
                self.push(View::ComposeReview { movie_id, title });
                true
            }
            NavCommand::SwitchTab(tab) => self.set_tab(tab),
        }
    }
}

/// Delays messages so that only the last of a rapid burst is delivered.
///
/// Each scheduled message is stamped with a sequence number. Scheduling
/// cancels the pending timer, and [`accept`](Self::accept) rejects anything
/// that is not the latest, so a message that was already queued when it got
/// superseded is still discarded by the consumer.
pub struct Debouncer<M: Send + 'static> {
    window: Duration,
    tx: mpsc::UnboundedSender<M>,
    seq: u64,
    pending: Option<CancellationToken>,
}

impl<M: Send + 'static> Debouncer<M> {
    pub fn new(window: Duration, tx: mpsc::UnboundedSender<M>) -> Self {
        Self {
            window,
            tx,
            seq: 0,
            pending: None,
        }
    }

    #[cfg(test)]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Schedule `make(seq)` to be sent after the debounce window, superseding
    /// whatever is pending.
    pub fn schedule(&mut self, make: impl FnOnce(u64) -> M) {
        self.cancel();
        self.seq += 1;

        let message = make(self.seq);
        let cancel = CancellationToken::new();
        self.pending = Some(cancel.clone());

        let tx = self.tx.clone();
        let window = self.window;
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(window) => {
                    tx.send(message).ok();
                }
            }
        });
    }

    /// Called by the consumer on delivery. Only the latest sequence number is
    /// accepted; accepting it clears the pending slot.
    pub fn accept(&mut self, seq: u64) -> bool {
        if seq != self.seq || self.pending.is_none() {
            debug!(seq, latest = self.seq, "dropping superseded message");
            return false;
        }
        self.pending = None;
        true
    }

    pub fn cancel(&mut self) {
        if let Some(cancel) = self.pending.take() {
            cancel.cancel();
        }
    }
}

impl<M: Send + 'static> Drop for Debouncer<M> {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_home_on_primary_tab() {
        let nav = Navigator::new();
        assert_eq!(nav.stack(), &[View::Home]);
        assert_eq!(nav.active_tab(), Tab::Primary);
        assert!(nav.tab_history().is_empty());
        assert!(!nav.is_back_locked());
    }

    #[test]
    fn pop_on_root_is_noop() {
        let mut nav = Navigator::new();
        assert!(nav.pop().is_none());
        assert_eq!(nav.stack(), &[View::Home]);
    }

    #[test]
    fn back_requests_within_one_frame_mutate_once() {
        let mut nav = Navigator::new();
        nav.push(View::Details { movie_id: 1 });
        nav.push(View::Details { movie_id: 2 });

        assert!(nav.handle_back());
        assert!(nav.handle_back());
        assert_eq!(nav.stack().len(), 2);

        nav.on_frame();
        assert!(nav.handle_back());
        assert_eq!(nav.stack(), &[View::Home]);
    }

    #[test]
    fn back_restores_previous_tab() {
        let mut nav = Navigator::new();
        assert!(nav.set_tab(Tab::Search));
        assert_eq!(nav.tab_history(), &[Tab::Primary]);

        assert!(nav.handle_back());
        assert_eq!(nav.active_tab(), Tab::Primary);
        assert!(nav.tab_history().is_empty());
    }

    #[test]
    fn back_from_compose_and_details_returns_home() {
        let mut nav = Navigator::new();
        nav.push(View::Details { movie_id: 42 });
        nav.push(View::ComposeReview {
            movie_id: 42,
            title: "Title".into(),
        });

        assert!(nav.handle_back());
        nav.on_frame();
        assert_eq!(nav.current(), &View::Details { movie_id: 42 });
        assert!(nav.handle_back());
        nav.on_frame();

        assert_eq!(nav.stack(), &[View::Home]);
    }

    #[test]
    fn back_at_root_with_no_history_propagates() {
        let mut nav = Navigator::new();
        assert!(!nav.handle_back());
        assert_eq!(nav.stack(), &[View::Home]);
    }

    #[test]
    fn set_tab_same_tab_is_noop() {
        let mut nav = Navigator::new();
        assert!(!nav.set_tab(Tab::Primary));
        assert!(nav.tab_history().is_empty());
    }

    #[test]
    fn set_tab_ignored_away_from_home() {
        let mut nav = Navigator::new();
        nav.push(View::Details { movie_id: 7 });
        assert!(!nav.set_tab(Tab::Search));
        assert_eq!(nav.active_tab(), Tab::Primary);
    }

    #[test]
    fn stack_back_takes_priority_over_tab_history() {
        let mut nav = Navigator::new();
        nav.set_tab(Tab::Search);
        nav.push(View::Details { movie_id: 3 });

        assert!(nav.handle_back());
        nav.on_frame();
        assert_eq!(nav.stack(), &[View::Home]);
        assert_eq!(nav.active_tab(), Tab::Search);

        assert!(nav.handle_back());
        assert_eq!(nav.active_tab(), Tab::Primary);
    }

    #[test]
    fn apply_commands() {
        let mut nav = Navigator::new();
        assert!(nav.apply(NavCommand::OpenDetails { movie_id: 5 }));
        assert!(nav.apply(NavCommand::OpenCompose {
            movie_id: 5,
            title: "Alien".into()
        }));
        assert_eq!(nav.stack().len(), 3);
        assert!(nav.apply(NavCommand::Back));
        assert!(nav.apply(NavCommand::Back));
        assert!(!nav.apply(NavCommand::Back));
        assert!(nav.apply(NavCommand::SwitchTab(Tab::Search)));
        assert_eq!(nav.active_tab(), Tab::Search);
    }

    #[tokio::test(start_paused = true)]
    async fn debouncer_delivers_only_the_last_of_a_burst() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut debouncer = Debouncer::new(Duration::from_millis(100), tx);

        debouncer.schedule(|seq| (seq, "details"));
        debouncer.schedule(|seq| (seq, "compose"));
        debouncer.schedule(|seq| (seq, "back"));

        tokio::time::sleep(Duration::from_millis(150)).await;

        let (seq, label) = rx.try_recv().unwrap();
        assert_eq!(label, "back");
        assert!(debouncer.accept(seq));
        assert!(rx.try_recv().is_err());
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn debouncer_waits_for_the_window() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut debouncer = Debouncer::new(Duration::from_millis(100), tx);

        debouncer.schedule(|seq| seq);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(rx.try_recv().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_message_already_queued_is_rejected() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut debouncer = Debouncer::new(Duration::from_millis(100), tx);

        debouncer.schedule(|seq| seq);
        tokio::time::sleep(Duration::from_millis(150)).await;
        // Delivered but not yet consumed when the next one is scheduled.
        debouncer.schedule(|seq| seq);

        let stale = rx.try_recv().unwrap();
        assert!(!debouncer.accept(stale));

        tokio::time::sleep(Duration::from_millis(150)).await;
        let latest = rx.try_recv().unwrap();
        assert!(debouncer.accept(latest));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_debouncer_delivers_nothing() {
        let (tx, mut rx) = mpsc::unbounded_channel::<u64>();
        let mut debouncer = Debouncer::new(Duration::from_millis(100), tx);

        debouncer.schedule(|seq| seq);
        debouncer.cancel();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(rx.try_recv().is_err());

        debouncer.schedule(|seq| seq);
        drop(debouncer);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(rx.try_recv().is_err());
    }
}
