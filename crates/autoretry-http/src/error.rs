//! Error type for a single HTTP attempt

use autoretry_core::retry::{AttemptInterrupted, HttpStatusError};
use thiserror::Error;

/// Failure of one HTTP attempt
#[derive(Error, Debug)]
pub enum HttpError {
    /// The server answered with a non-2xx status
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The attempt exceeded the client timeout
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    /// The connection could not be established
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The request URL could not be parsed
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Any other transport error
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The attempt's task was aborted or panicked
    #[error(transparent)]
    Interrupted(#[from] AttemptInterrupted),
}

impl HttpError {
    /// Classify a transport error for `url`
    pub fn from_reqwest(err: reqwest::Error, url: &str) -> Self {
        if err.is_timeout() {
            HttpError::Timeout {
                url: url.to_string(),
            }
        } else if err.is_connect() {
            HttpError::Connection(format!("{}: {}", url, err))
        } else {
            HttpError::Request(err)
        }
    }

    /// Response status, if the failure came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            HttpError::Request(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, HttpError::Timeout { .. })
    }
}

impl HttpStatusError for HttpError {
    fn status_code(&self) -> Option<u16> {
        self.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoretry_core::retry::{HttpStatusPredicate, RetryPredicate};

    #[test]
    fn test_status_classification() {
        let predicate = HttpStatusPredicate::default_http();

        let not_found = HttpError::Status {
            status: 404,
            url: "http://example.com".into(),
        };
        let unavailable = HttpError::Status {
            status: 503,
            url: "http://example.com".into(),
        };
        let timeout = HttpError::Timeout {
            url: "http://example.com".into(),
        };

        assert!(!predicate.should_retry(&not_found));
        assert!(predicate.should_retry(&unavailable));
        assert!(predicate.should_retry(&timeout));
        assert!(timeout.is_timeout());
        assert_eq!(not_found.status(), Some(404));
    }

    #[test]
    fn test_display() {
        let err = HttpError::Status {
            status: 500,
            url: "http://example.com/a".into(),
        };
        assert_eq!(err.to_string(), "HTTP 500 from http://example.com/a");

        let err = HttpError::from(AttemptInterrupted::Aborted);
        assert_eq!(err.to_string(), "attempt was aborted");
    }
}
