/// Statuses worth another attempt: rate limiting and server-side failures.
pub const RETRYABLE_STATUSES: [u16; 6] = [403, 429, 500, 502, 503, 504];

/// Statuses whose rate-limit reset time can push the next attempt back.
pub const RATE_LIMIT_STATUSES: [u16; 2] = [403, 429];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP {status}: {message}")]
    Status {
        status: u16,
        message: String,
        /// Unix timestamp at which the quota window resets, when known.
        rate_limit_reset: Option<i64>,
    },
    #[error("transport error: {0}")]
    Transport(String),
    /// The response arrived but its body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
            rate_limit_reset: None,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(_) | Self::Decode(_) => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => RETRYABLE_STATUSES.contains(status),
            Self::Transport(_) => true,
            Self::Decode(_) => false,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status_code()
            .is_some_and(|status| RATE_LIMIT_STATUSES.contains(&status))
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    pub fn rate_limit_reset(&self) -> Option<i64> {
        match self {
            Self::Status {
                rate_limit_reset, ..
            } => *rate_limit_reset,
            Self::Transport(_) | Self::Decode(_) => None,
        }
    }

    pub fn with_rate_limit_reset(self, reset: Option<i64>) -> Self {
        match self {
            Self::Status {
                status, message, ..
            } => Self::Status {
                status,
                message,
                rate_limit_reset: reset,
            },
            other => other,
        }
    }
}

impl From<octocrab::Error> for ApiError {
    fn from(error: octocrab::Error) -> Self {
        match &error {
            octocrab::Error::GitHub { source, .. } => {
                Self::status(source.status_code.as_u16(), source.message.clone())
            }
            octocrab::Error::Serde { .. } | octocrab::Error::Json { .. } => {
                Self::Decode(error.to_string())
            }
            _ => Self::Transport(error.to_string()),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => Self::status(status.as_u16(), error.to_string()),
            None if error.is_decode() => Self::Decode(error.to_string()),
            None => Self::Transport(error.to_string()),
        }
    }
}
