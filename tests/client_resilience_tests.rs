//! WordPress HTTPクライアントの耐障害性テスト
//!
//! モックサーバー相手にリトライ・バックオフ・失敗分類・認証ヘッダーの
//! 取り扱いを検証する。

use std::time::{Duration, Instant};

use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use wiremock::matchers::{basic_auth, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wordpress_mcp::wordpress::{
    Credentials, FilePayload, RequestDescriptor, RetryPolicy, WordPressApiError, WordPressClient,
};

const USERNAME: &str = "admin";
const APP_PASSWORD: &str = "abcd efgh ijkl mnop qrst uvwx";

fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(400),
    }
}

fn test_client(server: &MockServer, max_attempts: u32) -> WordPressClient {
    WordPressClient::with_policy(
        Credentials::new(server.uri(), USERNAME, APP_PASSWORD),
        fast_policy(max_attempts),
        Duration::from_secs(5),
    )
}

#[tokio::test]
async fn test_get_posts_round_trip_returns_body_unmodified() {
    let mock_server = MockServer::start().await;

    let posts = json!([
        { "id": 1, "status": "publish", "title": { "rendered": "First" } },
        { "id": 2, "status": "draft", "title": { "rendered": "Second" } }
    ]);

    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .and(query_param("per_page", "10"))
        .and(query_param("page", "1"))
        .and(basic_auth(USERNAME, APP_PASSWORD))
        .respond_with(ResponseTemplate::new(200).set_body_json(posts.clone()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, 3);
    let descriptor = RequestDescriptor::get("/posts")
        .query("per_page", 10)
        .query("page", 1);

    let response = client.send(&descriptor).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, posts);
}

#[tokio::test]
async fn test_auth_header_present_on_every_attempt() {
    let mock_server = MockServer::start().await;

    // Basic認証が一致する場合のみマッチする。3試行すべてで必要。
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .and(basic_auth(USERNAME, APP_PASSWORD))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, 3);
    let result = client.send(&RequestDescriptor::get("/posts")).await;

    match result {
        Err(WordPressApiError::TransientServer { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("expected TransientServer, got {:?}", other),
    }
}

#[tokio::test]
async fn test_secret_never_appears_in_error_output() {
    let mock_server = MockServer::start().await;

    // 本文に認証情報をエコーする意地悪なサーバー
    let credential_b64 =
        general_purpose::STANDARD.encode(format!("{}:{}", USERNAME, APP_PASSWORD));
    let body = json!({
        "code": "server_error",
        "message": format!("debug dump: Basic {}", credential_b64)
    });

    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .respond_with(ResponseTemplate::new(500).set_body_json(body))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, 2);
    let err = client
        .send(&RequestDescriptor::get("/posts"))
        .await
        .unwrap_err();

    let rendered = format!("{} {:?}", err, err);
    assert!(!rendered.contains(APP_PASSWORD), "password leaked: {}", rendered);
    assert!(
        !rendered.contains(&credential_b64),
        "encoded credentials leaked: {}",
        rendered
    );
}

#[tokio::test]
async fn test_429_honors_retry_after_header() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "1")
                .set_body_json(json!({ "code": "rest_rate_limited", "message": "slow down" })),
        )
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, 3);
    let started = Instant::now();
    let response = client
        .send(&RequestDescriptor::get("/posts"))
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(response.status, 200);
    // Retry-After: 1 が計算上のバックオフ (50ms台) を上書きする
    assert!(elapsed >= Duration::from_secs(1), "waited only {:?}", elapsed);
}

#[tokio::test]
async fn test_429_without_retry_after_uses_computed_backoff() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, 3);
    let started = Instant::now();
    client
        .send(&RequestDescriptor::get("/posts"))
        .await
        .unwrap();
    let elapsed = started.elapsed();

    // 1回目のバックオフは base 50ms + jitter (最大10%)
    assert!(elapsed >= Duration::from_millis(50), "waited only {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(1), "waited too long: {:?}", elapsed);
}

#[tokio::test]
async fn test_429_non_integer_retry_after_falls_back_to_backoff() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "tomorrow"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, 3);
    let started = Instant::now();
    client
        .send(&RequestDescriptor::get("/posts"))
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_429_exhaustion_surfaces_rate_limited() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, 2);
    let err = client
        .send(&RequestDescriptor::get("/posts"))
        .await
        .unwrap_err();

    match err {
        WordPressApiError::RateLimited {
            attempts,
            retry_after,
            ..
        } => {
            assert_eq!(attempts, 2);
            assert_eq!(retry_after, Some(1));
        }
        other => panic!("expected RateLimited, got {:?}", other),
    }
}

#[tokio::test]
async fn test_sustained_5xx_exhausts_to_transient_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, 3);
    let err = client
        .send(&RequestDescriptor::get("/posts"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WordPressApiError::TransientServer { attempts: 3, .. }
    ));
}

#[tokio::test]
async fn test_404_is_terminal_on_first_attempt() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts/999"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": "rest_post_invalid_id",
            "message": "Invalid post ID.",
            "data": { "status": 404 }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, 3);
    let err = client
        .send(&RequestDescriptor::get("/posts/999"))
        .await
        .unwrap_err();

    match err {
        WordPressApiError::NotFound { detail } => {
            assert!(detail.contains("rest_post_invalid_id"));
        }
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_401_yields_authentication_error_with_remediation_hint() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "code": "rest_cannot_access",
            "message": "Sorry, you are not allowed to do that."
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, 3);
    let err = client
        .send(&RequestDescriptor::get("/posts"))
        .await
        .unwrap_err();

    match &err {
        WordPressApiError::Authentication { status, .. } => assert_eq!(*status, 401),
        other => panic!("expected Authentication, got {:?}", other),
    }
    assert!(err.hint().contains("Regenerate the application password"));
}

#[tokio::test]
async fn test_400_yields_validation_error_with_field_detail() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/wp-json/wp/v2/posts"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": "rest_invalid_param",
            "message": "Invalid parameter(s): title",
            "data": {
                "status": 400,
                "params": { "title": "title must not be empty" }
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, 3);
    let err = client
        .send(&RequestDescriptor::post("/posts").json(json!({ "title": "" })))
        .await
        .unwrap_err();

    match err {
        WordPressApiError::Validation { status, detail } => {
            assert_eq!(status, 400);
            assert!(detail.contains("title must not be empty"), "{}", detail);
        }
        other => panic!("expected Validation, got {:?}", other),
    }
}

#[tokio::test]
async fn test_html_body_yields_unexpected_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "<html><head><title>Log In</title></head><body>wp-login form</body></html>",
            "text/html; charset=UTF-8",
        ))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, 3);
    let err = client
        .send(&RequestDescriptor::get("/posts"))
        .await
        .unwrap_err();

    match err {
        WordPressApiError::UnexpectedResponse { detail, .. } => {
            assert!(detail.contains("login"), "{}", detail);
        }
        other => panic!("expected UnexpectedResponse, got {:?}", other),
    }
}

#[tokio::test]
async fn test_delete_with_force_sends_query_flag_and_accepts_empty_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/wp-json/wp/v2/posts/9"))
        .and(query_param("force", "true"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, 3);
    let deleted = client.delete_post(9, true).await.unwrap();
    assert!(deleted.is_null());
}

#[tokio::test]
async fn test_multipart_upload_carries_file_and_fields() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/wp-json/wp/v2/media"))
        .and(basic_auth(USERNAME, APP_PASSWORD))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 77,
            "status": "inherit",
            "mime_type": "image/png",
            "source_url": "https://example.com/wp-content/uploads/demo.png"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, 3);
    let media = client
        .upload_media(
            FilePayload {
                bytes: b"demo png bytes".to_vec(),
                filename: "demo.png".to_string(),
                mime_type: "image/png".to_string(),
            },
            vec![("alt_text".to_string(), "a demo image".to_string())],
        )
        .await
        .unwrap();
    assert_eq!(media.id, Some(77));

    let requests = mock_server.received_requests().await.unwrap();
    let upload = &requests[0];
    let content_type = upload
        .headers
        .get("content-type")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    assert!(content_type.starts_with("multipart/form-data"), "{}", content_type);

    let body = String::from_utf8_lossy(&upload.body);
    assert!(body.contains("demo.png"));
    assert!(body.contains("demo png bytes"));
    assert!(body.contains("a demo image"));
}

#[tokio::test]
async fn test_typed_decode_mismatch_is_unexpected_response() {
    let mock_server = MockServer::start().await;

    // 配列を期待するところにオブジェクトを返す
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "odd": true })))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, 3);
    let err = client.get_posts(Vec::new()).await.unwrap_err();
    assert!(matches!(err, WordPressApiError::UnexpectedResponse { .. }));
}

#[tokio::test]
async fn test_connection_failure_is_transient_after_retries() {
    // 誰も聞いていないポートへ接続する
    let client = WordPressClient::with_policy(
        Credentials::new("http://127.0.0.1:9", USERNAME, APP_PASSWORD),
        fast_policy(2),
        Duration::from_millis(500),
    );

    let err = client
        .send(&RequestDescriptor::get("/posts"))
        .await
        .unwrap_err();

    match err {
        WordPressApiError::TransientServer { attempts, .. } => assert_eq!(attempts, 2),
        other => panic!("expected TransientServer, got {:?}", other),
    }
}
