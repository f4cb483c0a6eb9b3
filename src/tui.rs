use std::io::{self, Stdout};
use std::time::Duration;

use crossterm::{
    event::{Event as CrosstermEvent, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::event::Event;

pub type Tui = Terminal<CrosstermBackend<Stdout>>;

pub fn init() -> io::Result<Tui> {
    execute!(io::stdout(), EnterAlternateScreen)?;
    enable_raw_mode()?;
    Terminal::new(CrosstermBackend::new(io::stdout()))
}

pub fn restore() -> io::Result<()> {
    execute!(io::stdout(), LeaveAlternateScreen)?;
    disable_raw_mode()
}

/// Merges terminal input with tick and frame timers into one event stream.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl EventHandler {
    pub fn new(tick_rate: Duration, frame_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(Self::pump(tx, cancel.clone(), tick_rate, frame_rate));
        Self { rx, cancel, task }
    }

    async fn pump(
        tx: mpsc::UnboundedSender<Event>,
        cancel: CancellationToken,
        tick_rate: Duration,
        frame_rate: Duration,
    ) {
        let mut reader = EventStream::new();
        let mut ticks = interval(tick_rate);
        let mut frames = interval(frame_rate);
        // A slow draw should not be followed by a burst of catch-up frames.
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticks.tick() => Event::Tick,
                _ = frames.tick() => Event::Render,
                Some(Ok(input)) = reader.next() => match input {
                    CrosstermEvent::Key(key) if key.kind == KeyEventKind::Press => Event::Key(key),
                    CrosstermEvent::Resize(..) => Event::Resize,
                    _ => continue,
                },
            };
            if tx.send(event).is_err() {
                break;
            }
        }
    }

    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

impl Drop for EventHandler {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.task.abort();
    }
}
