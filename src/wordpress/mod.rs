//! WordPress REST API クライアント層
//!
//! 認証付きHTTP呼び出し・リトライ・失敗分類・サニタイズを提供する。
//! ハンドラー層はこのモジュール経由でのみWordPressと通信する。

pub mod backoff;
pub mod client;
pub mod error;
pub mod sanitize;
pub mod types;
pub mod validate;

pub use backoff::RetryPolicy;
pub use client::{ApiResponse, Credentials, FilePayload, RequestDescriptor, WordPressClient};
pub use error::{WordPressApiError, WpResult};
pub use sanitize::{LogSanitizer, REDACTION_MARKER};
