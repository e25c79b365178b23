//! HTTP responses for rejected requests.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;

/// A request the gatekeeping layer refused to dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRejection {
    /// Missing or wrong credentials (401)
    Unauthorized,
    /// Admission budget spent (429)
    RateLimited { retry_after: Duration },
}

#[derive(Debug, Serialize)]
struct RejectionBody {
    code: u16,
    message: &'static str,
}

impl GateRejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::RateLimited { .. } => "too many requests",
        }
    }
}

/// Whole seconds for a `Retry-After` header, rounded up and at least 1.
pub(crate) fn retry_after_secs(retry_after: Duration) -> u64 {
    let millis = u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX);
    millis.div_ceil(1000).max(1)
}

impl IntoResponse for GateRejection {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(RejectionBody {
            code: status.as_u16(),
            message: self.message(),
        });

        match self {
            Self::Unauthorized => (status, body).into_response(),
            Self::RateLimited { retry_after } => (
                status,
                [(header::RETRY_AFTER, retry_after_secs(retry_after).to_string())],
                body,
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::from_millis(1)), 1);
        assert_eq!(retry_after_secs(Duration::from_millis(1000)), 1);
        assert_eq!(retry_after_secs(Duration::from_millis(1001)), 2);
        assert_eq!(retry_after_secs(Duration::from_secs(7)), 7);
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
    }

    #[test]
    fn test_unauthorized_response() {
        let response = GateRejection::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }

    #[test]
    fn test_rate_limited_response_carries_retry_after() {
        let response = GateRejection::RateLimited {
            retry_after: Duration::from_millis(2500),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "3");
    }
}
