use crate::error::MarqueeError;
use crate::navigation::NavCommand;
use crate::retry::Outcome;
use crate::types::{Movie, MovieBundle, PagedResult, Review};

/// Which movie listing a page result belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovieList {
    Popular,
    Search,
}

#[derive(Debug)]
pub enum Action {
    /// Back key: arbitrated synchronously against the view stack.
    Back,
    ScrollUp,
    ScrollDown,
    PageUp,
    PageDown,
    GoToTop,
    GoToBottom,
    Select,
    NextTab,

    // Lists
    Refresh,
    Reload,
    LoadMore,
    MoviesLoaded {
        list: MovieList,
        ticket: u64,
        outcome: Outcome<PagedResult<Movie>>,
    },

    // Navigation, delivered by the debouncer
    Navigate {
        seq: u64,
        command: NavCommand,
    },

    // Details
    BundleLoaded {
        movie_id: u64,
        outcome: Outcome<MovieBundle>,
    },
    ReviewsLoaded {
        movie_id: u64,
        ticket: u64,
        outcome: Outcome<PagedResult<Review>>,
    },
    OpenInBrowser,
    YankUrl,

    // Search
    EnterSearchMode,
    ExitSearchMode,
    SearchInput(char),
    SearchBackspace,
    SearchConfirm,

    // Review composer
    WriteReview,
    ComposeInput(char),
    ComposeNewline,
    ComposeBackspace,
    RatingUp,
    RatingDown,
    SubmitReview,
    ReviewSubmitted {
        movie_id: u64,
    },

    Error(String),
    None,
}

impl From<MarqueeError> for Action {
    fn from(err: MarqueeError) -> Self {
        Action::Error(err.to_string())
    }
}
