//! HTTP status and transport error classification shared by the reqwest adapters.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;

use crate::BackendError;

/// Reads a `Retry-After` header given in whole seconds.
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

pub(crate) fn status_error(
    status: StatusCode,
    message: String,
    retry_after: Option<Duration>,
) -> BackendError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let error = BackendError::rate_limited(message);
            match retry_after {
                Some(delay) => error.with_retry_after(delay),
                None => error,
            }
        }
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            BackendError::protocol(message)
        }
        _ => BackendError::unavailable(message),
    }
}

pub(crate) fn send_error(backend: &str, err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::unavailable(format!("{backend} request timed out: {err}"))
    } else if err.is_connect() {
        BackendError::unavailable(format!("could not connect to {backend}: {err}"))
    } else {
        BackendError::unavailable(format!("{backend} request failed: {err}"))
    }
}

pub(crate) fn decode_error(backend: &str, err: impl std::fmt::Display) -> BackendError {
    BackendError::protocol(format!("{backend} reply could not be parsed: {err}"))
}
