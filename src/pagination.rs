//! Page state for one remote listing.
//!
//! `PagedList` does not perform I/O. Each operation either drops the request
//! or hands back a [`FetchTicket`]; the caller runs the request with the
//! ticket's cancellation token and reports the result through
//! [`PagedList::complete`]. Only one ticket is ever in flight per list.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::retry::Outcome;
use crate::types::PagedResult;

/// Records with a stable identity. Merging pages is keyed on it.
pub trait Keyed {
    type Key: Eq + Hash + Clone;

    fn key(&self) -> Self::Key;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListStatus {
    #[default]
    Idle,
    LoadingInitial,
    Refreshing,
    LoadingMore,
    Error,
}

impl ListStatus {
    pub fn is_loading(&self) -> bool {
        matches!(
            self,
            ListStatus::LoadingInitial | ListStatus::Refreshing | ListStatus::LoadingMore
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Replace everything with the result (fresh list).
    Initial,
    /// Replace everything with the result, keeping the page cursor.
    Refresh,
    /// Merge the result into the existing items.
    Append,
}

impl FetchMode {
    fn status(self) -> ListStatus {
        match self {
            FetchMode::Initial => ListStatus::LoadingInitial,
            FetchMode::Refresh => ListStatus::Refreshing,
            FetchMode::Append => ListStatus::LoadingMore,
        }
    }
}

/// Ticket ids are unique across every list in the process, so a late result
/// can never be mistaken for one issued by a newer list.
static NEXT_TICKET: AtomicU64 = AtomicU64::new(1);

/// Permission to run one page request.
#[derive(Debug, Clone)]
pub struct FetchTicket {
    pub id: u64,
    pub page: u32,
    pub cancel: CancellationToken,
}

#[derive(Debug)]
struct InFlight {
    id: u64,
    page: u32,
    mode: FetchMode,
    prior_status: ListStatus,
}

pub struct PagedList<T: Keyed> {
    items: Vec<T>,
    index: HashMap<T::Key, usize>,
    page: u32,
    total_pages: u32,
    fetched_pages: HashSet<u32>,
    status: ListStatus,
    error: Option<String>,
    in_flight: Option<InFlight>,
    handles: Vec<(u64, CancellationToken)>,
}

impl<T: Keyed> Default for PagedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Keyed> PagedList<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
            page: 0,
            total_pages: 1,
            fetched_pages: HashSet::new(),
            status: ListStatus::Idle,
            error: None,
            in_flight: None,
            handles: Vec::new(),
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn status(&self) -> ListStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    #[cfg(test)]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    #[cfg(test)]
    pub fn has_fetched(&self, page: u32) -> bool {
        self.fetched_pages.contains(&page)
    }

    pub fn has_more(&self) -> bool {
        self.page < self.total_pages
    }

    /// Forget everything and load page 1. The result replaces all items.
    pub fn reset_and_load(&mut self) -> Option<FetchTicket> {
        self.clear_error();
        self.fetched_pages.clear();
        self.page = 0;
        self.total_pages = 1;
        self.fetch(1, FetchMode::Initial)
    }

    /// Reload page 1 without touching the page cursor. The result replaces all items.
    pub fn refresh(&mut self) -> Option<FetchTicket> {
        self.clear_error();
        self.fetched_pages.clear();
        self.fetch(1, FetchMode::Refresh)
    }

    /// Load the page after the last loaded one, merging it into the items.
    pub fn load_next(&mut self) -> Option<FetchTicket> {
        self.clear_error();
        if self.page >= self.total_pages || self.in_flight.is_some() {
            return None;
        }
        self.fetch(self.page + 1, FetchMode::Append)
    }

    /// Request `page` in `mode`. Dropped when a fetch is already in flight or
    /// the page has already been retrieved.
    pub fn fetch(&mut self, page: u32, mode: FetchMode) -> Option<FetchTicket> {
        if let Some(current) = &self.in_flight {
            debug!(page, in_flight = current.page, "fetch dropped: request in flight");
            return None;
        }
        if self.fetched_pages.contains(&page) {
            debug!(page, "fetch dropped: page already retrieved");
            return None;
        }

        let id = NEXT_TICKET.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();

        self.in_flight = Some(InFlight {
            id,
            page,
            mode,
            prior_status: self.status,
        });
        self.handles.push((id, cancel.clone()));
        self.status = mode.status();
        debug!(id, page, ?mode, "fetch started");

        Some(FetchTicket { id, page, cancel })
    }

    /// Apply the outcome of ticket `id`. Returns whether it changed anything.
    ///
    /// Outcomes for tickets that are no longer in flight (cancelled by
    /// [`cancel_all`](Self::cancel_all), or otherwise stale) are discarded.
    pub fn complete(&mut self, id: u64, outcome: Outcome<PagedResult<T>>) -> bool {
        self.handles.retain(|(handle_id, _)| *handle_id != id);

        let flight = match self.in_flight.take() {
            Some(flight) if flight.id == id => flight,
            other => {
                self.in_flight = other;
                debug!(id, "discarding stale fetch result");
                return false;
            }
        };

        match outcome {
            Outcome::Cancelled => {
                debug!(id, page = flight.page, "fetch cancelled");
                self.status = flight.prior_status;
                false
            }
            Outcome::Failed(err) => {
                warn!(id, page = flight.page, error = %err, "fetch failed");
                self.status = ListStatus::Error;
                self.error = Some(err.to_string());
                true
            }
            Outcome::Done(result) => {
                if result.page != flight.page {
                    warn!(
                        id,
                        requested = flight.page,
                        returned = result.page,
                        "remote returned a different page"
                    );
                }
                match flight.mode {
                    FetchMode::Initial | FetchMode::Refresh => self.replace(result.items),
                    FetchMode::Append => self.merge(result.items),
                }
                self.page = flight.page;
                self.total_pages = result.total_pages.max(1);
                self.fetched_pages.insert(flight.page);
                self.status = ListStatus::Idle;
                debug!(
                    id,
                    page = self.page,
                    total_pages = self.total_pages,
                    items = self.items.len(),
                    "fetch applied"
                );
                true
            }
        }
    }

    /// Teardown: cancel every outstanding request. Nothing issued before this
    /// call can change the list afterwards.
    pub fn cancel_all(&mut self) {
        for (_, cancel) in self.handles.drain(..) {
            cancel.cancel();
        }
        if let Some(flight) = self.in_flight.take() {
            debug!(id = flight.id, page = flight.page, "in-flight fetch cancelled");
            self.status = flight.prior_status;
        }
    }

    fn clear_error(&mut self) {
        self.error = None;
        if self.status == ListStatus::Error {
            self.status = ListStatus::Idle;
        }
    }

    fn replace(&mut self, incoming: Vec<T>) {
        self.items.clear();
        self.index.clear();
        self.merge(incoming);
    }

    /// Union by key. An incoming record with a known key overwrites the
    /// existing one in place; new keys are appended.
    fn merge(&mut self, incoming: Vec<T>) {
        for item in incoming {
            let key = item.key();
            match self.index.get(&key) {
                Some(&position) => self.items[position] = item,
                None => {
                    self.index.insert(key, self.items.len());
                    self.items.push(item);
                }
            }
        }
    }
}

impl<T: Keyed> Drop for PagedList<T> {
    fn drop(&mut self) {
        for (_, cancel) in &self.handles {
            cancel.cancel();
        }
    }
}
