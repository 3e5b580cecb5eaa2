use thiserror::Error;

/// Errors returned by the federation API client
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{endpoint} answered HTTP {status}")]
    Status { status: u16, endpoint: String },

    #[error("Request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        source: reqwest::Error,
    },

    #[error("Invalid response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        source: serde_json::Error,
    },

    #[error("Invalid API URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Failure reported as plain text by a collaborator that exposes no status
    #[error("{0}")]
    Other(String),
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// The HTTP status code behind this error, if one can be determined
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            Self::Other(message) => status_from_message(message),
            Self::Decode { .. } | Self::InvalidUrl(_) => None,
        }
    }
}

/// Extracts an HTTP status code from a textual error message
///
/// Looks for the first standalone three-digit number in `100..=599`,
/// starting after the first `:` when the message has one (so that a numeric
/// prefix such as a port or an account id does not win).
///
/// ```
/// use fedi_ripple::api::status_from_message;
///
/// assert_eq!(status_from_message("bad request: 429 Too Many Requests"), Some(429));
/// assert_eq!(status_from_message("connection reset"), None);
/// ```
pub fn status_from_message(message: &str) -> Option<u16> {
    let tail = message.split_once(':').map_or(message, |(_, rest)| rest);

    tail.split(|c: char| !c.is_ascii_digit())
        .filter(|run| run.len() == 3)
        .filter_map(|run| run.parse::<u16>().ok())
        .find(|code| (100..=599).contains(code))
}
