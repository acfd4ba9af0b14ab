//! WordPress REST API HTTPクライアント
//!
//! 1回の論理呼び出しにつき、認証ヘッダー注入・透過リトライ・
//! 失敗分類・診断出力のサニタイズまでを担当する。呼び出し間で
//! 共有する可変状態は持たない。

use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use reqwest::{multipart, Client, Method, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::wordpress::backoff::RetryPolicy;
use crate::wordpress::error::{WordPressApiError, WpResult};
use crate::wordpress::sanitize::LogSanitizer;
use crate::wordpress::types::{
    WordPressCategory, WordPressComment, WordPressMedia, WordPressPage, WordPressPluginInfo,
    WordPressPost, WordPressTag, WordPressUser,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// サイトURLと認証情報。クライアント生成後は不変。
#[derive(Debug, Clone)]
pub struct Credentials {
    pub site_url: String,
    pub username: String,
    /// Application Password。ログ・エラー文言には決して出さない。
    pub application_password: SecretString,
}

impl Credentials {
    pub fn new(
        site_url: impl Into<String>,
        username: impl Into<String>,
        application_password: impl Into<String>,
    ) -> Self {
        Self {
            site_url: site_url.into(),
            username: username.into(),
            application_password: SecretString::new(
                application_password.into().into_boxed_str(),
            ),
        }
    }

    /// `https://example.com/` → `https://example.com/wp-json/wp/v2`
    pub fn rest_base(&self) -> String {
        let trimmed = self.site_url.trim_end_matches('/');
        if trimmed.ends_with("/wp-json/wp/v2") {
            trimmed.to_string()
        } else {
            format!("{}/wp-json/wp/v2", trimmed)
        }
    }
}

/// アップロードするファイル本体
#[derive(Debug, Clone)]
pub struct FilePayload {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mime_type: String,
}

/// 1リクエスト分の記述子。呼び出しごとに新規構築する。
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    /// Path relative to the REST base, e.g. `/posts`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub file: Option<FilePayload>,
    /// Extra multipart form fields, only used together with `file`
    pub form: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            file: None,
            form: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn queries(mut self, pairs: Vec<(String, String)>) -> Self {
        self.query.extend(pairs);
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn file(mut self, file: FilePayload) -> Self {
        self.file = Some(file);
        self
    }

    pub fn form_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// 成功レスポンス。生成後は不変。
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    /// Decoded JSON body, `Null` for empty bodies
    pub body: Value,
    /// `X-RateLimit-Remaining` when the server reports it
    pub rate_limit_remaining: Option<u64>,
}

/// リトライ対象ステータスか (レート制限と一時的サーバー障害)
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 425 | 429) || (500..=599).contains(&status)
}

/// `Retry-After` ヘッダーの整数秒。HTTP-date形式は扱わず通常バックオフに任せる。
fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
}

#[derive(Debug)]
pub struct WordPressClient {
    http: Client,
    credentials: Credentials,
    retry: RetryPolicy,
    sanitizer: LogSanitizer,
    base_url: String,
}

impl WordPressClient {
    pub fn new(credentials: Credentials) -> Self {
        Self::with_policy(credentials, RetryPolicy::default(), DEFAULT_TIMEOUT)
    }

    pub fn with_policy(credentials: Credentials, retry: RetryPolicy, timeout: Duration) -> Self {
        // タイムアウト設定付きのHTTPクライアントを作成
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("wordpress-mcp/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("HTTP client build failed");

        let base_url = credentials.rest_base();
        debug!("WordPress client initialized with base_url: {}", base_url);

        Self {
            http,
            credentials,
            retry,
            sanitizer: LogSanitizer::new(),
            base_url,
        }
    }

    pub fn sanitizer(&self) -> &LogSanitizer {
        &self.sanitizer
    }

    /// 設定されたサイトURL (ベースパスなし)
    pub fn site_url(&self) -> &str {
        &self.credentials.site_url
    }

    /// 記述子からリクエストを1回分組み立てる。multipartは再送不能なので
    /// 試行ごとに作り直す。
    fn build_request(
        &self,
        descriptor: &RequestDescriptor,
        url: &str,
    ) -> WpResult<reqwest::RequestBuilder> {
        let mut request = self.http.request(descriptor.method.clone(), url);

        if !descriptor.query.is_empty() {
            request = request.query(&descriptor.query);
        }

        for (name, value) in &descriptor.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        if let Some(body) = &descriptor.body {
            request = request.json(body);
        }

        if let Some(file) = &descriptor.file {
            let part = multipart::Part::bytes(file.bytes.clone())
                .file_name(file.filename.clone())
                .mime_str(&file.mime_type)
                .map_err(|e| WordPressApiError::Validation {
                    status: 400,
                    detail: format!("invalid MIME type '{}': {}", file.mime_type, e),
                })?;
            let mut form = multipart::Form::new().part("file", part);
            for (key, value) in &descriptor.form {
                form = form.text(key.clone(), value.clone());
            }
            request = request.multipart(form);
        }

        // Basic認証 (ユーザー名 + Application Password)。全試行に付与。
        request = request.basic_auth(
            &self.credentials.username,
            Some(self.credentials.application_password.expose_secret()),
        );

        Ok(request)
    }

    /// リトライ付きで1リクエストを実行する
    pub async fn send(&self, descriptor: &RequestDescriptor) -> WpResult<ApiResponse> {
        let url = format!("{}{}", self.base_url, descriptor.path);
        debug!("request: {} {}", descriptor.method, url);

        let max_attempts = self.retry.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let request = self.build_request(descriptor, &url)?;

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    let detail = self.sanitizer.sanitize(&e.to_string());
                    if e.is_timeout() {
                        warn!("request timeout on attempt {}: {}", attempt, detail);
                    } else if e.is_connect() {
                        warn!("connection error on attempt {}: {}", attempt, detail);
                    } else {
                        warn!("request error on attempt {}: {}", attempt, detail);
                    }

                    if attempt == max_attempts {
                        return Err(WordPressApiError::TransientServer {
                            attempts: attempt,
                            detail,
                        });
                    }
                    sleep(self.retry.delay_for(attempt)).await;
                    continue;
                }
            };

            let status = response.status().as_u16();

            if response.status().is_success() {
                return self.decode_success(response).await;
            }

            if is_retryable_status(status) && attempt < max_attempts {
                let retry_after = if status == 429 {
                    parse_retry_after(response.headers())
                } else {
                    None
                };

                let delay = self.retry.delay_after(attempt, retry_after);
                match retry_after {
                    Some(seconds) => {
                        info!("rate limited, honoring Retry-After: {}s", seconds);
                    }
                    None => {
                        warn!(
                            "HTTP {} on attempt {}, retrying in {:?}",
                            status, attempt, delay
                        );
                    }
                }
                sleep(delay).await;
                continue;
            }

            return Err(self.classify_failure(response, attempt).await);
        }

        // ループは必ず成功かエラーで抜ける
        unreachable!("retry loop exited without a result")
    }

    /// 成功レスポンスのデコード。JSONでなければ `UnexpectedResponse`。
    async fn decode_success(&self, response: Response) -> WpResult<ApiResponse> {
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        let rate_limit_remaining = response
            .headers()
            .get("X-RateLimit-Remaining")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok());

        let text = response
            .text()
            .await
            .map_err(|e| WordPressApiError::UnexpectedResponse {
                status,
                detail: self.sanitizer.sanitize(&e.to_string()),
            })?;

        // DELETE系は空ボディを返すことがある
        if text.trim().is_empty() {
            return Ok(ApiResponse {
                status,
                body: Value::Null,
                rate_limit_remaining,
            });
        }

        if content_type.contains("text/html") {
            return Err(WordPressApiError::UnexpectedResponse {
                status,
                detail: self.describe_html_response(&text),
            });
        }

        match serde_json::from_str(&text) {
            Ok(body) => Ok(ApiResponse {
                status,
                body,
                rate_limit_remaining,
            }),
            Err(e) => Err(WordPressApiError::UnexpectedResponse {
                status,
                detail: format!(
                    "body is not valid JSON: {} ({})",
                    e,
                    self.sanitizer.sanitize(&text)
                ),
            }),
        }
    }

    /// HTMLが返ってきた場合の原因推定 (ログイン画面・REST無効など)
    fn describe_html_response(&self, body: &str) -> String {
        let lowered = body.to_ascii_lowercase();
        let hint = if lowered.contains("login") || lowered.contains("wp-login") {
            "the site answered with an HTML login page; the credentials are likely rejected"
        } else if lowered.contains("not found") || lowered.contains("404") {
            "the site answered with an HTML error page; the REST API endpoint was not found"
        } else if lowered.contains("forbidden") || lowered.contains("403") {
            "the site answered with an HTML error page; access was denied"
        } else {
            "the site answered with HTML instead of REST API JSON"
        };
        format!("{}: {}", hint, self.sanitizer.sanitize(body))
    }

    /// 失敗レスポンスをエラー種別へ分類する
    async fn classify_failure(&self, response: Response, attempts: u32) -> WordPressApiError {
        let status = response.status().as_u16();
        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();
        let detail = self.extract_error_detail(status, &body);

        warn!("WordPress API error (status={}): {}", status, detail);

        match status {
            401 | 403 => WordPressApiError::Authentication { status, detail },
            404 => WordPressApiError::NotFound { detail },
            400 | 422 => WordPressApiError::Validation { status, detail },
            429 => WordPressApiError::RateLimited {
                attempts,
                retry_after,
                detail,
            },
            408 | 425 => WordPressApiError::TransientServer { attempts, detail },
            500..=599 => WordPressApiError::TransientServer { attempts, detail },
            _ => WordPressApiError::UnexpectedResponse { status, detail },
        }
    }

    /// WordPress標準のエラーJSON (`code`/`message`/`data.params`) から
    /// 詳細メッセージを取り出す
    fn extract_error_detail(&self, status: u16, body: &str) -> String {
        if let Ok(value) = serde_json::from_str::<Value>(body) {
            if let Some(object) = value.as_object() {
                let code = object.get("code").and_then(Value::as_str).unwrap_or("");
                let message = object.get("message").and_then(Value::as_str).unwrap_or("");

                if !message.is_empty() {
                    let mut detail = if code.is_empty() {
                        message.to_string()
                    } else {
                        format!("[{}] {}", code, message)
                    };

                    // フィールド単位のパラメータエラーを展開する
                    if let Some(params) = object
                        .get("data")
                        .and_then(|data| data.get("params"))
                        .and_then(Value::as_object)
                    {
                        let fields: Vec<String> = params
                            .iter()
                            .map(|(name, msg)| {
                                format!("{}: {}", name, msg.as_str().unwrap_or("invalid"))
                            })
                            .collect();
                        if !fields.is_empty() {
                            detail.push_str(&format!(" ({})", fields.join("; ")));
                        }
                    }

                    return self.sanitizer.sanitize(&detail);
                }
            }
        }

        if body.is_empty() {
            format!("HTTP {}", status)
        } else {
            self.sanitizer.sanitize(body)
        }
    }

    /// 構造が期待と一致する成功レスポンスを型付きで取得する
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        descriptor: &RequestDescriptor,
    ) -> WpResult<T> {
        let response = self.send(descriptor).await?;
        let status = response.status;
        serde_json::from_value(response.body).map_err(|e| {
            WordPressApiError::UnexpectedResponse {
                status,
                detail: format!("response shape did not match: {}", e),
            }
        })
    }

    // ---- Posts -------------------------------------------------------------

    pub async fn get_posts(&self, query: Vec<(String, String)>) -> WpResult<Vec<WordPressPost>> {
        self.send_json(&RequestDescriptor::get("/posts").queries(query))
            .await
    }

    pub async fn get_post(&self, post_id: u64) -> WpResult<WordPressPost> {
        self.send_json(&RequestDescriptor::get(format!("/posts/{}", post_id)))
            .await
    }

    pub async fn create_post(&self, data: Value) -> WpResult<WordPressPost> {
        self.send_json(&RequestDescriptor::post("/posts").json(data))
            .await
    }

    /// WordPress REST API は更新も POST
    pub async fn update_post(&self, post_id: u64, data: Value) -> WpResult<WordPressPost> {
        self.send_json(&RequestDescriptor::post(format!("/posts/{}", post_id)).json(data))
            .await
    }

    pub async fn delete_post(&self, post_id: u64, force: bool) -> WpResult<Value> {
        let mut descriptor = RequestDescriptor::delete(format!("/posts/{}", post_id));
        if force {
            descriptor = descriptor.query("force", "true");
        }
        Ok(self.send(&descriptor).await?.body)
    }

    // ---- Pages -------------------------------------------------------------

    pub async fn get_pages(&self, query: Vec<(String, String)>) -> WpResult<Vec<WordPressPage>> {
        self.send_json(&RequestDescriptor::get("/pages").queries(query))
            .await
    }

    pub async fn create_page(&self, data: Value) -> WpResult<WordPressPage> {
        self.send_json(&RequestDescriptor::post("/pages").json(data))
            .await
    }

    pub async fn update_page(&self, page_id: u64, data: Value) -> WpResult<WordPressPage> {
        self.send_json(&RequestDescriptor::post(format!("/pages/{}", page_id)).json(data))
            .await
    }

    pub async fn delete_page(&self, page_id: u64, force: bool) -> WpResult<Value> {
        let mut descriptor = RequestDescriptor::delete(format!("/pages/{}", page_id));
        if force {
            descriptor = descriptor.query("force", "true");
        }
        Ok(self.send(&descriptor).await?.body)
    }

    // ---- Media -------------------------------------------------------------

    pub async fn get_media(&self, query: Vec<(String, String)>) -> WpResult<Vec<WordPressMedia>> {
        self.send_json(&RequestDescriptor::get("/media").queries(query))
            .await
    }

    /// multipart/form-data でファイルをアップロードする
    pub async fn upload_media(
        &self,
        file: FilePayload,
        fields: Vec<(String, String)>,
    ) -> WpResult<WordPressMedia> {
        info!(
            "uploading media file: {} ({})",
            file.filename, file.mime_type
        );
        let mut descriptor = RequestDescriptor::post("/media").file(file);
        for (key, value) in fields {
            descriptor = descriptor.form_field(key, value);
        }
        self.send_json(&descriptor).await
    }

    pub async fn update_media(&self, media_id: u64, data: Value) -> WpResult<WordPressMedia> {
        self.send_json(&RequestDescriptor::post(format!("/media/{}", media_id)).json(data))
            .await
    }

    pub async fn delete_media(&self, media_id: u64, force: bool) -> WpResult<Value> {
        let mut descriptor = RequestDescriptor::delete(format!("/media/{}", media_id));
        if force {
            descriptor = descriptor.query("force", "true");
        }
        Ok(self.send(&descriptor).await?.body)
    }

    // ---- Categories --------------------------------------------------------

    pub async fn get_categories(
        &self,
        query: Vec<(String, String)>,
    ) -> WpResult<Vec<WordPressCategory>> {
        self.send_json(&RequestDescriptor::get("/categories").queries(query))
            .await
    }

    pub async fn create_category(&self, data: Value) -> WpResult<WordPressCategory> {
        self.send_json(&RequestDescriptor::post("/categories").json(data))
            .await
    }

    pub async fn update_category(
        &self,
        category_id: u64,
        data: Value,
    ) -> WpResult<WordPressCategory> {
        self.send_json(
            &RequestDescriptor::post(format!("/categories/{}", category_id)).json(data),
        )
        .await
    }

    pub async fn delete_category(&self, category_id: u64, force: bool) -> WpResult<Value> {
        let mut descriptor = RequestDescriptor::delete(format!("/categories/{}", category_id));
        if force {
            descriptor = descriptor.query("force", "true");
        }
        Ok(self.send(&descriptor).await?.body)
    }

    // ---- Tags --------------------------------------------------------------

    pub async fn get_tags(&self, query: Vec<(String, String)>) -> WpResult<Vec<WordPressTag>> {
        self.send_json(&RequestDescriptor::get("/tags").queries(query))
            .await
    }

    pub async fn create_tag(&self, data: Value) -> WpResult<WordPressTag> {
        self.send_json(&RequestDescriptor::post("/tags").json(data))
            .await
    }

    pub async fn update_tag(&self, tag_id: u64, data: Value) -> WpResult<WordPressTag> {
        self.send_json(&RequestDescriptor::post(format!("/tags/{}", tag_id)).json(data))
            .await
    }

    pub async fn delete_tag(&self, tag_id: u64, force: bool) -> WpResult<Value> {
        let mut descriptor = RequestDescriptor::delete(format!("/tags/{}", tag_id));
        if force {
            descriptor = descriptor.query("force", "true");
        }
        Ok(self.send(&descriptor).await?.body)
    }

    // ---- Comments ----------------------------------------------------------

    pub async fn get_comments(
        &self,
        query: Vec<(String, String)>,
    ) -> WpResult<Vec<WordPressComment>> {
        self.send_json(&RequestDescriptor::get("/comments").queries(query))
            .await
    }

    pub async fn create_comment(&self, data: Value) -> WpResult<WordPressComment> {
        self.send_json(&RequestDescriptor::post("/comments").json(data))
            .await
    }

    pub async fn update_comment(
        &self,
        comment_id: u64,
        data: Value,
    ) -> WpResult<WordPressComment> {
        self.send_json(&RequestDescriptor::post(format!("/comments/{}", comment_id)).json(data))
            .await
    }

    pub async fn delete_comment(&self, comment_id: u64, force: bool) -> WpResult<Value> {
        let mut descriptor = RequestDescriptor::delete(format!("/comments/{}", comment_id));
        if force {
            descriptor = descriptor.query("force", "true");
        }
        Ok(self.send(&descriptor).await?.body)
    }

    // ---- Users -------------------------------------------------------------

    pub async fn get_users(&self, query: Vec<(String, String)>) -> WpResult<Vec<WordPressUser>> {
        self.send_json(&RequestDescriptor::get("/users").queries(query))
            .await
    }

    pub async fn get_user(&self, user_id: u64) -> WpResult<WordPressUser> {
        self.send_json(&RequestDescriptor::get(format!("/users/{}", user_id)))
            .await
    }

    pub async fn update_user(&self, user_id: u64, data: Value) -> WpResult<WordPressUser> {
        self.send_json(&RequestDescriptor::post(format!("/users/{}", user_id)).json(data))
            .await
    }

    // ---- Site --------------------------------------------------------------

    pub async fn get_site_settings(&self) -> WpResult<Value> {
        Ok(self.send(&RequestDescriptor::get("/settings")).await?.body)
    }

    pub async fn get_plugins(&self) -> WpResult<Vec<WordPressPluginInfo>> {
        self.send_json(&RequestDescriptor::get("/plugins")).await
    }

    /// WordPress.com系サイトのみ提供される統計エンドポイント。
    /// 通常のインストールでは 404 になるので呼び出し側でフォールバックする。
    pub async fn get_site_stats(&self) -> WpResult<Value> {
        Ok(self.send(&RequestDescriptor::get("/stats")).await?.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> WordPressClient {
        WordPressClient::new(Credentials::new(
            "https://example.com",
            "admin",
            "abcd efgh ijkl mnop qrst uvwx",
        ))
    }

    #[test]
    fn test_rest_base_normalization() {
        let creds = Credentials::new("https://example.com/", "admin", "secret pass word here");
        assert_eq!(creds.rest_base(), "https://example.com/wp-json/wp/v2");

        let creds = Credentials::new(
            "https://example.com/wp-json/wp/v2",
            "admin",
            "secret pass word here",
        );
        assert_eq!(creds.rest_base(), "https://example.com/wp-json/wp/v2");
    }

    #[test]
    fn test_retryable_statuses() {
        for status in [408, 425, 429, 500, 502, 503, 504] {
            assert!(is_retryable_status(status), "{} should retry", status);
        }
        for status in [400, 401, 403, 404, 422, 301] {
            assert!(!is_retryable_status(status), "{} should not retry", status);
        }
    }

    #[test]
    fn test_descriptor_builder() {
        let descriptor = RequestDescriptor::get("/posts")
            .query("per_page", 10)
            .query("page", 1);
        assert_eq!(descriptor.method, Method::GET);
        assert_eq!(descriptor.path, "/posts");
        assert_eq!(
            descriptor.query,
            vec![
                ("per_page".to_string(), "10".to_string()),
                ("page".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_extract_error_detail_wp_format() {
        let client = test_client();
        let body = r#"{"code":"rest_invalid_param","message":"Invalid parameter(s): title","data":{"status":400,"params":{"title":"title must be a string"}}}"#;
        let detail = client.extract_error_detail(400, body);
        assert!(detail.contains("[rest_invalid_param]"));
        assert!(detail.contains("title must be a string"));
    }

    #[test]
    fn test_extract_error_detail_plain_body() {
        let client = test_client();
        assert_eq!(client.extract_error_detail(502, ""), "HTTP 502");
        let detail = client.extract_error_detail(502, "Bad Gateway");
        assert_eq!(detail, "Bad Gateway");
    }

    #[test]
    fn test_secret_not_in_debug_output() {
        let creds = Credentials::new("https://example.com", "admin", "super secret app pass");
        let debugged = format!("{:?}", creds);
        assert!(!debugged.contains("super secret app pass"));
    }
}
