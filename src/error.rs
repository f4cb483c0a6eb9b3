use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarqueeError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The request never produced a response (connect failure, timeout, reset).
    #[error("Network error: {0}")]
    Transport(String),

    #[error("TMDB API {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl MarqueeError {
    /// Whether the transport should try the request again.
    /// No response at all, or a server-side failure.
    pub fn is_retriable(&self) -> bool {
        match self {
            MarqueeError::Transport(_) => true,
            MarqueeError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, MarqueeError>;
