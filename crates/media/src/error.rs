use std::error::Error as StdError;

use crate::types::FailureReason;

/// Errors surfaced by the pipeline entry point.
///
/// Per-reference failures never show up here; they are carried as data in
/// the manifest.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("message not found: {message_id}")]
    NotFound { message_id: String },

    #[error(transparent)]
    Source(#[from] scrapbook_channels::Error),

    #[error("{message}")]
    InvalidInput { message: String },

    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn not_found(message_id: impl Into<String>) -> Self {
        Self::NotFound {
            message_id: message_id.into(),
        }
    }

    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn external<E>(context: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// A failed outbound call or an unusable response, inside the extractor
/// layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("malformed response: {message}")]
    Malformed { message: String },

    /// The response parsed but lacks data this strategy needs, e.g. a video
    /// without playable variants.
    #[error("incomplete metadata: {message}")]
    Incomplete { message: String },

    #[error("blocked: {message}")]
    Blocked { message: String },
}

impl FetchError {
    pub fn transport(message: impl std::fmt::Display) -> Self {
        Self::Transport {
            message: message.to_string(),
        }
    }

    pub fn malformed(message: impl std::fmt::Display) -> Self {
        Self::Malformed {
            message: message.to_string(),
        }
    }

    pub fn incomplete(message: impl std::fmt::Display) -> Self {
        Self::Incomplete {
            message: message.to_string(),
        }
    }

    pub fn blocked(message: impl std::fmt::Display) -> Self {
        Self::Blocked {
            message: message.to_string(),
        }
    }

    /// Whether a retry could plausibly succeed: transport errors, timeouts,
    /// 5xx and 429.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Transport { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Malformed { .. } | Self::Incomplete { .. } | Self::Blocked { .. } => false,
        }
    }

    /// Failure reason reported in the manifest.
    #[must_use]
    pub fn reason(&self) -> FailureReason {
        match self {
            Self::Timeout => FailureReason::Timeout,
            Self::Malformed { .. } | Self::Incomplete { .. } => FailureReason::MalformedResponse,
            Self::Transport { .. } | Self::Status { .. } | Self::Blocked { .. } => {
                FailureReason::FetchError
            },
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::malformed(err)
        } else {
            Self::transport(err)
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed(err)
    }
}
