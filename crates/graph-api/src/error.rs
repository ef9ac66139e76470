use thiserror::Error;

/// Graph API error codes meaning the access token is invalid or expired.
const AUTH_ERROR_CODES: &[i64] = &[102, 190];

/// Graph API error codes used for application, user and page throttling.
const RATE_LIMIT_ERROR_CODES: &[i64] = &[4, 17, 32, 613];

/// Business use case throttling codes.
const BUC_RATE_LIMIT_RANGE: std::ops::RangeInclusive<i64> = 80001..=80014;

/// Failure classes of a live-video fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("access token rejected (code {code}): {message}")]
    Auth { code: i64, message: String },
    #[error("rate limited (code {code}): {message}")]
    RateLimited { code: i64, message: String },
    #[error("transient network error: {0}")]
    Transient(String),
    #[error("provider error (http {status}): {message}")]
    Unknown { status: u16, message: String },
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    /// More pages remained after the page cap.
    #[error("live video listing truncated after {pages} pages")]
    Truncated { pages: usize },
}

impl FetchError {
    /// Whether this failure should put the poller into its auth cool-down.
    pub fn is_auth(&self) -> bool {
        matches!(self, FetchError::Auth { .. })
    }

    /// Classify an error response from the status code and the decoded `error` object.
    pub fn from_response(status: u16, body: Option<&GraphErrorBody>) -> Self {
        let code = body.and_then(|b| b.code).unwrap_or_default();
        let message = body
            .and_then(|b| b.message.clone())
            .unwrap_or_else(|| format!("HTTP {status}"));

        if AUTH_ERROR_CODES.contains(&code) || status == 401 {
            return FetchError::Auth { code, message };
        }
        if status == 429
            || RATE_LIMIT_ERROR_CODES.contains(&code)
            || BUC_RATE_LIMIT_RANGE.contains(&code)
        {
            return FetchError::RateLimited { code, message };
        }
        if status >= 500 {
            return FetchError::Transient(format!("HTTP {status}: {message}"));
        }
        FetchError::Unknown { status, message }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            let status = err.status().map(|s| s.as_u16()).unwrap_or(200);
            return FetchError::Unknown {
                status,
                message: err.to_string(),
            };
        }
        FetchError::Transient(err.to_string())
    }
}

/// The `error` object of a Graph API error response.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct GraphErrorBody {
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub code: Option<i64>,
    pub error_subcode: Option<i64>,
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct GraphErrorEnvelope {
    pub error: Option<GraphErrorBody>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(code: i64) -> GraphErrorBody {
        GraphErrorBody {
            message: Some("boom".to_string()),
            kind: Some("OAuthException".to_string()),
            code: Some(code),
            error_subcode: None,
        }
    }

    #[test]
    fn test_expired_token_is_auth() {
        let err = FetchError::from_response(400, Some(&body(190)));
        assert!(err.is_auth());

        let err = FetchError::from_response(400, Some(&body(102)));
        assert!(err.is_auth());
    }

    #[test]
    fn test_unauthorized_without_body_is_auth() {
        assert!(FetchError::from_response(401, None).is_auth());
    }

    #[test]
    fn test_throttling_codes() {
        for code in [4, 17, 32, 613, 80001, 80014] {
            let err = FetchError::from_response(400, Some(&body(code)));
            assert!(
                matches!(err, FetchError::RateLimited { .. }),
                "code {code} should be rate limited"
            );
        }
        assert!(matches!(
            FetchError::from_response(429, None),
            FetchError::RateLimited { .. }
        ));
    }

    #[test]
    fn test_server_errors_are_transient() {
        assert!(matches!(
            FetchError::from_response(503, None),
            FetchError::Transient(_)
        ));
    }

    #[test]
    fn test_other_client_errors_are_unknown() {
        let err = FetchError::from_response(400, Some(&body(100)));
        match err {
            FetchError::Unknown { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }
}
