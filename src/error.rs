// Upstream fetch errors, classified so pollers can tell transient failures from shape mismatches.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Whether a failed fetch is worth retrying on the next tick unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorClass {
    /// Network, timeout, 5xx or 429: the same request may succeed later.
    Retryable,
    /// The response does not have the expected shape (or the request itself is wrong).
    Structural,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("connection to {url} failed: {message}")]
    Connection { url: String, message: String },

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("malformed response from {url}: {message}")]
    Malformed { url: String, message: String },

    #[error("missing field `{field}` in {context}")]
    MissingField { field: String, context: String },

    #[error("no child of type {kind} under {parent}")]
    NotFound { parent: String, kind: String },

    #[error("HTTP client: {0}")]
    Client(String),
}

impl FetchError {
    pub fn class(&self) -> ErrorClass {
        match self {
            FetchError::Timeout { .. } | FetchError::Connection { .. } => ErrorClass::Retryable,
            FetchError::Status { status, .. } if *status >= 500 || *status == 429 => {
                ErrorClass::Retryable
            }
            _ => ErrorClass::Structural,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }

    /// Maps a reqwest error for `url` onto the taxonomy. Timeouts, connects and bodies cut off
    /// mid-transfer are retryable. JSON is decoded by the caller, so reqwest decode errors only
    /// come from the body stream.
    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else if err.is_connect() || err.is_request() || err.is_body() || err.is_decode() {
            FetchError::Connection {
                url: url.to_string(),
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            FetchError::Malformed {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// Logs a poll failure at the level matching its class.
pub fn log_fetch_error(operation: &'static str, resource_id: &str, err: &FetchError) {
    match err.class() {
        ErrorClass::Retryable => tracing::warn!(
            error = %err,
            operation,
            resource_id,
            "fetch failed (retryable)"
        ),
        ErrorClass::Structural => tracing::error!(
            error = %err,
            operation,
            resource_id,
            "fetch failed (unexpected response shape)"
        ),
    }
}

/// Result of looking up children by type where exactly one match is expected.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    NotFound,
    Found(T),
    /// More than one match; `first` is the first in response order.
    Ambiguous { first: T, count: usize },
}

impl<T> Lookup<T> {
    pub fn from_matches(matches: impl IntoIterator<Item = T>) -> Self {
        let mut iter = matches.into_iter();
        let Some(first) = iter.next() else {
            return Lookup::NotFound;
        };
        let rest = iter.count();
        if rest == 0 {
            Lookup::Found(first)
        } else {
            Lookup::Ambiguous {
                first,
                count: rest + 1,
            }
        }
    }
}
