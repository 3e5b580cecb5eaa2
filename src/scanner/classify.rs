//! API failure classification
//!
//! The scan loop only distinguishes four outcomes of a failed fetch; the
//! HTTP status carried by the error decides which one applies.

use crate::api::ApiError;
use std::fmt;

/// Scan-relevant category of an API failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// HTTP 401: the service account is locked out or its token expired
    Unauthorized,
    /// HTTP 404: the account no longer exists
    NotFound,
    /// HTTP 429: the instance is throttling us
    RateLimited,
    /// Everything else, including failures without a status code
    Transient,
}

impl ErrorKind {
    /// Maps an HTTP status code to its category
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            404 => Self::NotFound,
            429 => Self::RateLimited,
            _ => Self::Transient,
        }
    }

    /// Whether this failure ends the current cycle for the whole instance
    pub fn abandons_cycle(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::RateLimited)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unauthorized => "unauthorized",
            Self::NotFound => "not found",
            Self::RateLimited => "rate limited",
            Self::Transient => "transient",
        };
        f.write_str(name)
    }
}

/// Classifies a failed API call
///
/// ```
/// use fedi_ripple::api::ApiError;
/// use fedi_ripple::scanner::{classify, ErrorKind};
///
/// let err = ApiError::Status { status: 429, endpoint: "/api/v1/accounts/1/followers".into() };
/// assert_eq!(classify(&err), ErrorKind::RateLimited);
/// ```
pub fn classify(err: &ApiError) -> ErrorKind {
    err.status()
        .map_or(ErrorKind::Transient, ErrorKind::from_status)
}
