//! WordPress REST API呼び出しの失敗分類
//!
//! リトライ対象は `RateLimited` と `TransientServer` のみ。
//! それ以外は初回試行で確定する。

use thiserror::Error;

/// Result type alias for WordPress REST API operations
pub type WpResult<T> = std::result::Result<T, WordPressApiError>;

/// Classified failure of a WordPress REST API call.
///
/// `detail` 文字列は構築時点でサニタイズ済みであること。認証情報を
/// ここに入れてはならない。
#[derive(Debug, Error)]
pub enum WordPressApiError {
    /// 401/403 response, never retried
    #[error("authentication failed (HTTP {status}): {detail}")]
    Authentication { status: u16, detail: String },

    /// 404 response, never retried
    #[error("resource not found: {detail}")]
    NotFound { detail: String },

    /// 400/422 response with the server-side field messages when present
    #[error("request rejected by WordPress (HTTP {status}): {detail}")]
    Validation { status: u16, detail: String },

    /// 429 response, surfaced only after the retry budget is spent
    #[error("rate limited after {attempts} attempts: {detail}")]
    RateLimited {
        attempts: u32,
        /// Last `Retry-After` value (seconds) the server supplied, if any
        retry_after: Option<u64>,
        detail: String,
    },

    /// 5xx (plus 408/425) or a connection-level failure, after retries
    #[error("transient server failure after {attempts} attempts: {detail}")]
    TransientServer { attempts: u32, detail: String },

    /// Body that was not decodable as JSON, or a status outside the known ranges
    #[error("unexpected response (HTTP {status}): {detail}")]
    UnexpectedResponse { status: u16, detail: String },
}

impl WordPressApiError {
    /// 呼び出し側に提示する復旧ヒント
    pub fn hint(&self) -> &'static str {
        match self {
            Self::Authentication { status: 403, .. } => {
                "The WordPress user lacks the required permissions. \
                 Creating, editing and deleting content needs an adequate role."
            }
            Self::Authentication { .. } => {
                "Invalid credentials. Regenerate the application password from the \
                 WordPress admin profile screen and update the provider settings."
            }
            Self::NotFound { .. } => {
                "The requested resource (post ID etc.) was not found. \
                 Check the ID and the WordPress site URL."
            }
            Self::Validation { .. } => {
                "Check the request parameter formats (title, content, status, IDs)."
            }
            Self::RateLimited { .. } => {
                "Too many requests in a short period. Wait a few seconds and retry."
            }
            Self::TransientServer { .. } => {
                "The WordPress server had a temporary problem. \
                 Check the server logs if the failure persists."
            }
            Self::UnexpectedResponse { .. } => {
                "The site did not answer with REST API JSON. Verify the WordPress \
                 site URL and that the REST API is enabled."
            }
        }
    }

    /// リトライしてよい失敗かどうか
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::TransientServer { .. }
        )
    }

    /// HTTP status associated with the failure, when one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. }
            | Self::Validation { status, .. }
            | Self::UnexpectedResponse { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            Self::NotFound { .. } => Some(404),
            Self::TransientServer { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_hint_mentions_application_password() {
        let err = WordPressApiError::Authentication {
            status: 401,
            detail: "invalid credentials".to_string(),
        };
        assert!(err.hint().contains("Regenerate the application password"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_forbidden_gets_permission_hint() {
        let err = WordPressApiError::Authentication {
            status: 403,
            detail: "forbidden".to_string(),
        };
        assert!(err.hint().contains("permissions"));
    }

    #[test]
    fn test_only_rate_limit_and_transient_are_retryable() {
        let rate = WordPressApiError::RateLimited {
            attempts: 3,
            retry_after: Some(5),
            detail: "slow down".to_string(),
        };
        let transient = WordPressApiError::TransientServer {
            attempts: 3,
            detail: "bad gateway".to_string(),
        };
        let not_found = WordPressApiError::NotFound {
            detail: "no such post".to_string(),
        };
        assert!(rate.is_retryable());
        assert!(transient.is_retryable());
        assert!(!not_found.is_retryable());
    }

    #[test]
    fn test_status_mapping() {
        let err = WordPressApiError::Validation {
            status: 422,
            detail: "missing title".to_string(),
        };
        assert_eq!(err.status(), Some(422));

        let err = WordPressApiError::TransientServer {
            attempts: 1,
            detail: "connection reset".to_string(),
        };
        assert_eq!(err.status(), None);
    }
}
