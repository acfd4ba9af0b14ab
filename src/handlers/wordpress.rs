//! WordPress 向け MCP ハンドラー
//!
//! ツール定義とディスパッチのみを担当し、HTTP・リトライ・失敗分類は
//! `wordpress::client` に任せる。

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::WordPressConfig;
use crate::mcp::{
    InitializeParams, McpError, McpHandler, Resource, ResourceReadParams, Tool, ToolCallParams,
};
use crate::wordpress::backoff::RetryPolicy;
use crate::wordpress::types::{WordPressHealthCheck, WordPressSiteInfo};
use crate::wordpress::validate::{self, Args};
use crate::wordpress::{
    Credentials, FilePayload, RequestDescriptor, WordPressApiError, WordPressClient,
};

#[derive(Debug)]
pub struct WordPressHandler {
    client: WordPressClient,
}

/// 成功時のテキストレスポンス
fn text_result(text: impl Into<String>) -> Value {
    json!({
        "content": [{ "type": "text", "text": text.into() }],
        "isError": false
    })
}

/// 成功時のテキスト + 整形JSONレスポンス
fn data_result(summary: &str, payload: &impl Serialize) -> Value {
    let pretty = serde_json::to_string_pretty(payload)
        .unwrap_or_else(|_| "(failed to serialize payload)".to_string());
    json!({
        "content": [{ "type": "text", "text": format!("{}\n{}", summary, pretty) }],
        "isError": false
    })
}

/// API失敗時のレスポンス。復旧ヒントを添える。
fn failure_result(action: &str, err: &WordPressApiError) -> Value {
    warn!("failed to {}: {}", action, err);
    json!({
        "content": [{
            "type": "text",
            "text": format!("Failed to {}: {}\n\nHint: {}", action, err, err.hint())
        }],
        "isError": true
    })
}

impl WordPressHandler {
    pub fn new(config: WordPressConfig) -> Self {
        let retry = RetryPolicy {
            max_attempts: config.max_retries.unwrap_or(3).max(1),
            ..RetryPolicy::default()
        };
        let timeout = Duration::from_secs(config.timeout_seconds.unwrap_or(30));
        let credentials =
            Credentials::new(config.url, config.username, config.application_password);

        Self {
            client: WordPressClient::with_policy(credentials, retry, timeout),
        }
    }

    /// 一覧系ツール共通のクエリ構築 (per_page / page / search)
    fn list_query(&self, args: &Args) -> Result<Vec<(String, String)>, McpError> {
        let mut query = vec![
            ("per_page".to_string(), validate::per_page(args)?.to_string()),
            ("page".to_string(), validate::page(args)?.to_string()),
        ];
        if let Some(search) = validate::search(args)? {
            query.push(("search".to_string(), search));
        }
        Ok(query)
    }

    // ---- Health check ------------------------------------------------------

    /// WordPress環境の疎通・認証・権限をまとめて確認する
    pub async fn health_check(&self) -> WordPressHealthCheck {
        let mut health = WordPressHealthCheck {
            site_accessible: false,
            rest_api_available: false,
            authentication_valid: false,
            permissions_adequate: false,
            media_accessible: false,
            error_details: Vec::new(),
            site_info: None,
        };

        info!(
            "starting WordPress health check for: {}",
            self.client.site_url()
        );

        // 1. サイト設定の取得 (疎通 + 管理権限)
        match self.client.get_site_settings().await {
            Ok(settings) => {
                health.site_accessible = true;
                health.site_info = Some(self.site_info_from_settings(&settings));
                info!("✅ site accessibility: OK");
            }
            Err(e) => {
                health
                    .error_details
                    .push(format!("Site accessibility failed: {}", e));
                warn!("❌ site accessibility: FAILED - {}", e);
                return health; // 疎通しないなら以降のチェックは無意味
            }
        }

        // 2. REST API 名前空間の確認
        match self.check_rest_api().await {
            Ok(()) => {
                health.rest_api_available = true;
                info!("✅ REST API availability: OK");
            }
            Err(e) => {
                health
                    .error_details
                    .push(format!("REST API check failed: {}", e));
                warn!("❌ REST API availability: FAILED - {}", e);
                return health;
            }
        }

        // 3. 認証の確認
        match self.client.send(&RequestDescriptor::get("/users/me")).await {
            Ok(_) => {
                health.authentication_valid = true;
                info!("✅ authentication: OK");
            }
            Err(e) => {
                health
                    .error_details
                    .push(format!("Authentication failed: {}", e));
                warn!("❌ authentication: FAILED - {}", e);
                return health;
            }
        }

        // 4. 投稿の読み取り権限
        match self
            .client
            .get_posts(vec![("per_page".to_string(), "1".to_string())])
            .await
        {
            Ok(_) => {
                health.permissions_adequate = true;
                info!("✅ permissions: OK");
            }
            Err(e) => {
                health
                    .error_details
                    .push(format!("Permissions check failed: {}", e));
                warn!("❌ permissions: FAILED - {}", e);
            }
        }

        // 5. メディアへのアクセス
        match self
            .client
            .get_media(vec![("per_page".to_string(), "1".to_string())])
            .await
        {
            Ok(_) => {
                health.media_accessible = true;
                info!("✅ media access: OK");
            }
            Err(e) => {
                health
                    .error_details
                    .push(format!("Media access check failed: {}", e));
                warn!("❌ media access: FAILED - {}", e);
            }
        }

        if health.error_details.is_empty() {
            info!("🎉 WordPress health check completed successfully");
        } else {
            warn!(
                "⚠️ WordPress health check completed with {} issues",
                health.error_details.len()
            );
        }

        health
    }

    fn site_info_from_settings(&self, settings: &Value) -> WordPressSiteInfo {
        WordPressSiteInfo {
            name: settings
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or("Unknown")
                .to_string(),
            description: settings
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
            url: settings
                .get("url")
                .and_then(Value::as_str)
                .unwrap_or(self.client.site_url())
                .to_string(),
            timezone_string: settings
                .get("timezone_string")
                .and_then(Value::as_str)
                .map(str::to_string),
            date_format: settings
                .get("date_format")
                .and_then(Value::as_str)
                .map(str::to_string),
            time_format: settings
                .get("time_format")
                .and_then(Value::as_str)
                .map(str::to_string),
            start_of_week: settings
                .get("start_of_week")
                .and_then(Value::as_u64)
                .map(|n| n as u8),
        }
    }

    async fn check_rest_api(&self) -> Result<(), WordPressApiError> {
        let response = self.client.send(&RequestDescriptor::get("")).await?;

        let has_namespace = response
            .body
            .get("namespaces")
            .and_then(Value::as_array)
            .map(|namespaces| {
                namespaces
                    .iter()
                    .any(|ns| ns.as_str() == Some("wp/v2"))
            })
            .unwrap_or(false);

        if has_namespace {
            Ok(())
        } else {
            Err(WordPressApiError::UnexpectedResponse {
                status: response.status,
                detail: "WordPress REST API v2 namespace not advertised".to_string(),
            })
        }
    }

    fn render_health_report(&self, health: &WordPressHealthCheck) -> Value {
        let healthy = health.error_details.is_empty();
        let status_emoji = if healthy { "✅" } else { "⚠️" };
        let status_text = if healthy { "HEALTHY" } else { "ISSUES DETECTED" };

        let mut report = format!("{} WordPress Health Check: {}\n\n", status_emoji, status_text);

        if let Some(site_info) = &health.site_info {
            report.push_str(&format!("🌐 Site: {} ({})\n", site_info.name, site_info.url));
            report.push_str(&format!("📝 Description: {}\n\n", site_info.description));
        }

        let mark = |ok: bool| if ok { "✅" } else { "❌" };
        report.push_str("📊 Health Status:\n");
        report.push_str(&format!("  • Site Accessible: {}\n", mark(health.site_accessible)));
        report.push_str(&format!("  • REST API Available: {}\n", mark(health.rest_api_available)));
        report.push_str(&format!("  • Authentication Valid: {}\n", mark(health.authentication_valid)));
        report.push_str(&format!("  • Permissions Adequate: {}\n", mark(health.permissions_adequate)));
        report.push_str(&format!("  • Media Accessible: {}\n", mark(health.media_accessible)));

        if !health.error_details.is_empty() {
            report.push_str("\n🚨 Issues Found:\n");
            for (i, error) in health.error_details.iter().enumerate() {
                report.push_str(&format!("  {}. {}\n", i + 1, error));
            }
        }

        json!({
            "content": [{ "type": "text", "text": report }],
            "isError": !healthy
        })
    }

    // ---- Site statistics ---------------------------------------------------

    /// WordPress.com 専用の統計エンドポイントを試し、使えないサイトでは
    /// 基本情報へフォールバックする
    async fn site_statistics(&self) -> Value {
        match self.client.get_site_stats().await {
            Ok(statistics) => data_result("Retrieved site statistics", &statistics),
            Err(WordPressApiError::NotFound { .. })
            | Err(WordPressApiError::UnexpectedResponse { .. }) => {
                warn!("site statistics endpoint not available, falling back to basic info");

                let posts = self
                    .client
                    .get_posts(vec![("per_page".to_string(), "1".to_string())])
                    .await;
                let comments = self
                    .client
                    .get_comments(vec![("per_page".to_string(), "1".to_string())])
                    .await;

                match (posts, comments) {
                    (Ok(posts), Ok(comments)) => {
                        let fallback = json!({
                            "note": "The standard WordPress REST API has no statistics endpoint. \
                                     Full statistics need a WordPress.com-hosted site.",
                            "basic_info": {
                                "posts_available": !posts.is_empty(),
                                "comments_available": !comments.is_empty(),
                            }
                        });
                        data_result("Retrieved basic site information", &fallback)
                    }
                    (Err(e), _) | (_, Err(e)) => failure_result("fetch site statistics", &e),
                }
            }
            Err(e) => failure_result("fetch site statistics", &e),
        }
    }
}

#[async_trait]
impl McpHandler for WordPressHandler {
    async fn initialize(&self, _params: InitializeParams) -> Result<Value, McpError> {
        info!("WordPress MCP handler initialized");
        Ok(json!({
            "protocol_version": "2024-11-05",
            "capabilities": {
                "tools": { "list_changed": false },
                "resources": { "subscribe": false, "list_changed": false }
            },
            "server_info": {
                "name": "wordpress-mcp",
                "version": env!("CARGO_PKG_VERSION")
            }
        }))
    }

    async fn list_tools(&self) -> Result<Vec<Tool>, McpError> {
        Ok(vec![
            Tool {
                name: "wordpress_health_check".to_string(),
                description: "Perform comprehensive WordPress environment health check".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {},
                    "required": []
                }),
            },
            Tool {
                name: "get_posts".to_string(),
                description: "Retrieve WordPress posts with paging, search and filters".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "per_page": { "type": "integer", "description": "Posts per page (1-100)", "default": 10 },
                        "page": { "type": "integer", "description": "Page number", "default": 1 },
                        "search": { "type": "string", "description": "Search keyword" },
                        "status": { "type": "string", "description": "Post status filter (publish, draft, ...)" },
                        "categories": { "type": "string", "description": "Category IDs, comma separated" },
                        "tags": { "type": "string", "description": "Tag IDs, comma separated" }
                    },
                    "required": []
                }),
            },
            Tool {
                name: "get_post_details".to_string(),
                description: "Retrieve a single WordPress post by ID".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "post_id": { "type": "number", "description": "Post ID" }
                    },
                    "required": ["post_id"]
                }),
            },
            Tool {
                name: "create_post".to_string(),
                description: "Create a new WordPress post".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "title": { "type": "string", "description": "The post title" },
                        "content": { "type": "string", "description": "The post content (HTML allowed)" },
                        "status": { "type": "string", "description": "Post status", "default": "draft" },
                        "categories": { "type": "string", "description": "Category IDs, comma separated" },
                        "tags": { "type": "string", "description": "Tag IDs, comma separated" },
                        "excerpt": { "type": "string", "description": "Post excerpt" }
                    },
                    "required": ["title", "content"]
                }),
            },
            Tool {
                name: "update_post".to_string(),
                description: "Update an existing WordPress post".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "post_id": { "type": "number", "description": "Post ID to update" },
                        "title": { "type": "string", "description": "New title (optional)" },
                        "content": { "type": "string", "description": "New content (optional)" },
                        "status": { "type": "string", "description": "New status (optional)" },
                        "categories": { "type": "string", "description": "Category IDs, comma separated (optional)" },
                        "tags": { "type": "string", "description": "Tag IDs, comma separated (optional)" }
                    },
                    "required": ["post_id"]
                }),
            },
            Tool {
                name: "delete_post".to_string(),
                description: "Delete a WordPress post".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "post_id": { "type": "number", "description": "Post ID to delete" },
                        "force": { "type": "boolean", "description": "Force delete (bypass trash)" }
                    },
                    "required": ["post_id"]
                }),
            },
            Tool {
                name: "get_pages".to_string(),
                description: "Retrieve WordPress pages".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "per_page": { "type": "integer", "description": "Pages per page (1-100)", "default": 10 },
                        "page": { "type": "integer", "description": "Page number", "default": 1 },
                        "search": { "type": "string", "description": "Search keyword" }
                    },
                    "required": []
                }),
            },
            Tool {
                name: "create_page".to_string(),
                description: "Create a new WordPress page".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "title": { "type": "string", "description": "The page title" },
                        "content": { "type": "string", "description": "The page content" },
                        "status": { "type": "string", "description": "Page status", "default": "draft" },
                        "parent": { "type": "number", "description": "Parent page ID (optional)" }
                    },
                    "required": ["title", "content"]
                }),
            },
            Tool {
                name: "update_page".to_string(),
                description: "Update an existing WordPress page".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "page_id": { "type": "number", "description": "Page ID to update" },
                        "title": { "type": "string", "description": "New title (optional)" },
                        "content": { "type": "string", "description": "New content (optional)" },
                        "status": { "type": "string", "description": "New status (optional)" },
                        "parent": { "type": "number", "description": "New parent page ID (optional)" }
                    },
                    "required": ["page_id"]
                }),
            },
            Tool {
                name: "delete_page".to_string(),
                description: "Delete a WordPress page".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "page_id": { "type": "number", "description": "Page ID to delete" },
                        "force": { "type": "boolean", "description": "Force delete (bypass trash)" }
                    },
                    "required": ["page_id"]
                }),
            },
            Tool {
                name: "get_media".to_string(),
                description: "Retrieve WordPress media library items".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "per_page": { "type": "integer", "description": "Items per page (1-100)", "default": 10 },
                        "page": { "type": "integer", "description": "Page number", "default": 1 },
                        "search": { "type": "string", "description": "Search keyword" }
                    },
                    "required": []
                }),
            },
            Tool {
                name: "upload_media".to_string(),
                description: "Upload a media file to WordPress".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "file_data": { "type": "string", "description": "Base64 encoded file data" },
                        "filename": { "type": "string", "description": "Original filename" },
                        "mime_type": { "type": "string", "description": "MIME type of the file (e.g. 'image/jpeg')" },
                        "title": { "type": "string", "description": "Media title (optional)" },
                        "alt_text": { "type": "string", "description": "Alternative text (optional)" },
                        "caption": { "type": "string", "description": "Caption (optional)" }
                    },
                    "required": ["file_data", "filename", "mime_type"]
                }),
            },
            Tool {
                name: "update_media".to_string(),
                description: "Update metadata of an existing media item".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "media_id": { "type": "number", "description": "Media ID to update" },
                        "title": { "type": "string", "description": "New title (optional)" },
                        "alt_text": { "type": "string", "description": "New alternative text (optional)" },
                        "caption": { "type": "string", "description": "New caption (optional)" },
                        "description": { "type": "string", "description": "New description (optional)" }
                    },
                    "required": ["media_id"]
                }),
            },
            Tool {
                name: "delete_media".to_string(),
                description: "Delete a media item from WordPress".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "media_id": { "type": "number", "description": "Media ID to delete" },
                        "force": { "type": "boolean", "description": "Force delete (media cannot be trashed)" }
                    },
                    "required": ["media_id"]
                }),
            },
            Tool {
                name: "get_categories".to_string(),
                description: "Retrieve WordPress categories".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "per_page": { "type": "integer", "description": "Items per page (1-100)", "default": 10 },
                        "page": { "type": "integer", "description": "Page number", "default": 1 },
                        "search": { "type": "string", "description": "Search keyword" }
                    },
                    "required": []
                }),
            },
            Tool {
                name: "create_category".to_string(),
                description: "Create a new WordPress category".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "name": { "type": "string", "description": "Category name" },
                        "description": { "type": "string", "description": "Category description (optional)" },
                        "parent": { "type": "number", "description": "Parent category ID (optional)" }
                    },
                    "required": ["name"]
                }),
            },
            Tool {
                name: "update_category".to_string(),
                description: "Update an existing WordPress category".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "category_id": { "type": "number", "description": "Category ID to update" },
                        "name": { "type": "string", "description": "New category name (optional)" },
                        "description": { "type": "string", "description": "New category description (optional)" }
                    },
                    "required": ["category_id"]
                }),
            },
            Tool {
                name: "delete_category".to_string(),
                description: "Delete a WordPress category".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "category_id": { "type": "number", "description": "Category ID to delete" },
                        "force": { "type": "boolean", "description": "Force delete (bypass trash)" }
                    },
                    "required": ["category_id"]
                }),
            },
            Tool {
                name: "get_tags".to_string(),
                description: "Retrieve WordPress tags".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "per_page": { "type": "integer", "description": "Items per page (1-100)", "default": 10 },
                        "page": { "type": "integer", "description": "Page number", "default": 1 },
                        "search": { "type": "string", "description": "Search keyword" }
                    },
                    "required": []
                }),
            },
            Tool {
                name: "create_tag".to_string(),
                description: "Create a new WordPress tag".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "name": { "type": "string", "description": "Tag name" },
                        "description": { "type": "string", "description": "Tag description (optional)" }
                    },
                    "required": ["name"]
                }),
            },
            Tool {
                name: "update_tag".to_string(),
                description: "Update an existing WordPress tag".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "tag_id": { "type": "number", "description": "Tag ID to update" },
                        "name": { "type": "string", "description": "New tag name (optional)" },
                        "description": { "type": "string", "description": "New tag description (optional)" }
                    },
                    "required": ["tag_id"]
                }),
            },
            Tool {
                name: "delete_tag".to_string(),
                description: "Delete a WordPress tag".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "tag_id": { "type": "number", "description": "Tag ID to delete" },
                        "force": { "type": "boolean", "description": "Force delete (bypass trash)" }
                    },
                    "required": ["tag_id"]
                }),
            },
            Tool {
                name: "get_comments".to_string(),
                description: "Retrieve WordPress comments".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "post_id": { "type": "number", "description": "Filter comments by post ID (optional)" },
                        "per_page": { "type": "integer", "description": "Items per page (1-100)", "default": 10 },
                        "page": { "type": "integer", "description": "Page number", "default": 1 }
                    },
                    "required": []
                }),
            },
            Tool {
                name: "create_comment".to_string(),
                description: "Create a new comment on a WordPress post".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "post_id": { "type": "number", "description": "Post ID to comment on" },
                        "content": { "type": "string", "description": "Comment content" },
                        "author_name": { "type": "string", "description": "Comment author name (optional)" },
                        "author_email": { "type": "string", "description": "Comment author email (optional)" }
                    },
                    "required": ["post_id", "content"]
                }),
            },
            Tool {
                name: "update_comment".to_string(),
                description: "Update an existing WordPress comment".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "comment_id": { "type": "number", "description": "Comment ID to update" },
                        "content": { "type": "string", "description": "New content (optional)" },
                        "status": { "type": "string", "description": "New status: approved, hold, spam, trash (optional)" }
                    },
                    "required": ["comment_id"]
                }),
            },
            Tool {
                name: "delete_comment".to_string(),
                description: "Delete a WordPress comment".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "comment_id": { "type": "number", "description": "Comment ID to delete" },
                        "force": { "type": "boolean", "description": "Force delete (bypass trash)" }
                    },
                    "required": ["comment_id"]
                }),
            },
            Tool {
                name: "get_site_users".to_string(),
                description: "Retrieve WordPress site users".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "per_page": { "type": "integer", "description": "Items per page (1-100)", "default": 10 },
                        "page": { "type": "integer", "description": "Page number", "default": 1 }
                    },
                    "required": []
                }),
            },
            Tool {
                name: "update_user".to_string(),
                description: "Update a WordPress user profile".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "user_id": { "type": "number", "description": "User ID to update" },
                        "name": { "type": "string", "description": "New display name (optional)" },
                        "email": { "type": "string", "description": "New email address (optional)" },
                        "url": { "type": "string", "description": "New website URL (optional)" },
                        "description": { "type": "string", "description": "New biography (optional)" }
                    },
                    "required": ["user_id"]
                }),
            },
            Tool {
                name: "get_site_settings".to_string(),
                description: "Retrieve WordPress site settings (requires admin permissions)".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {},
                    "required": []
                }),
            },
            Tool {
                name: "get_plugins".to_string(),
                description: "Retrieve installed WordPress plugins (requires admin permissions)".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {},
                    "required": []
                }),
            },
            Tool {
                name: "get_site_statistics".to_string(),
                description: "Retrieve site statistics (WordPress.com hosted sites only, falls back to basic info)".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {},
                    "required": []
                }),
            },
        ])
    }

    async fn call_tool(&self, params: ToolCallParams) -> Result<Value, McpError> {
        let args = params.arguments.unwrap_or_default();

        match params.name.as_str() {
            "wordpress_health_check" => {
                info!("performing WordPress health check...");
                let health = self.health_check().await;
                Ok(self.render_health_report(&health))
            }

            // ---- Posts -----------------------------------------------------
            "get_posts" => {
                let mut query = self.list_query(&args)?;
                if let Some(status) = validate::post_status(&args)? {
                    query.push(("status".to_string(), status));
                }
                let categories = validate::id_list(&args, "categories")?;
                if !categories.is_empty() {
                    query.push(("categories".to_string(), validate::join_ids(&categories)));
                }
                let tags = validate::id_list(&args, "tags")?;
                if !tags.is_empty() {
                    query.push(("tags".to_string(), validate::join_ids(&tags)));
                }

                match self.client.get_posts(query).await {
                    Ok(posts) => Ok(data_result(
                        &format!("Retrieved {} posts", posts.len()),
                        &posts,
                    )),
                    Err(e) => Ok(failure_result("fetch posts", &e)),
                }
            }
            "get_post_details" => {
                let post_id = validate::required_id(&args, "post_id")?;
                match self.client.get_post(post_id).await {
                    Ok(post) => Ok(data_result(&format!("Retrieved post {}", post_id), &post)),
                    Err(e) => Ok(failure_result("fetch post details", &e)),
                }
            }
            "create_post" => {
                let title = validate::title(&args)?;
                let content = validate::required_str(&args, "content")?;
                let status = validate::post_status(&args)?.unwrap_or_else(|| "draft".to_string());

                let mut data = Map::new();
                data.insert("title".to_string(), json!(title));
                data.insert("content".to_string(), json!(content));
                data.insert("status".to_string(), json!(status));
                let categories = validate::id_list(&args, "categories")?;
                if !categories.is_empty() {
                    data.insert("categories".to_string(), json!(categories));
                }
                let tags = validate::id_list(&args, "tags")?;
                if !tags.is_empty() {
                    data.insert("tags".to_string(), json!(tags));
                }
                if let Some(excerpt) = validate::optional_str(&args, "excerpt") {
                    data.insert("excerpt".to_string(), json!(excerpt));
                }

                match self.client.create_post(Value::Object(data)).await {
                    Ok(post) => Ok(data_result(
                        &format!("Created post with ID: {:?}", post.id),
                        &post,
                    )),
                    Err(e) => Ok(failure_result("create post", &e)),
                }
            }
            "update_post" => {
                let post_id = validate::required_id(&args, "post_id")?;

                let mut data = Map::new();
                if let Some(title) = validate::optional_str(&args, "title") {
                    data.insert("title".to_string(), json!(title));
                }
                if let Some(content) = validate::optional_str(&args, "content") {
                    data.insert("content".to_string(), json!(content));
                }
                if let Some(status) = validate::post_status(&args)? {
                    data.insert("status".to_string(), json!(status));
                }
                let categories = validate::id_list(&args, "categories")?;
                if !categories.is_empty() {
                    data.insert("categories".to_string(), json!(categories));
                }
                let tags = validate::id_list(&args, "tags")?;
                if !tags.is_empty() {
                    data.insert("tags".to_string(), json!(tags));
                }
                if data.is_empty() {
                    return Err(McpError::InvalidParams(
                        "update_post needs at least one field to change".to_string(),
                    ));
                }

                match self.client.update_post(post_id, Value::Object(data)).await {
                    Ok(post) => Ok(data_result(&format!("Updated post {}", post_id), &post)),
                    Err(e) => Ok(failure_result("update post", &e)),
                }
            }
            "delete_post" => {
                let post_id = validate::required_id(&args, "post_id")?;
                let force = validate::optional_bool(&args, "force");
                match self.client.delete_post(post_id, force).await {
                    Ok(_) => Ok(text_result(format!(
                        "Deleted post ID {} (force: {})",
                        post_id, force
                    ))),
                    Err(e) => Ok(failure_result("delete post", &e)),
                }
            }

            // ---- Pages -----------------------------------------------------
            "get_pages" => {
                let query = self.list_query(&args)?;
                match self.client.get_pages(query).await {
                    Ok(pages) => Ok(data_result(
                        &format!("Retrieved {} pages", pages.len()),
                        &pages,
                    )),
                    Err(e) => Ok(failure_result("fetch pages", &e)),
                }
            }
            "create_page" => {
                let title = validate::title(&args)?;
                let content = validate::required_str(&args, "content")?;
                let status = validate::post_status(&args)?.unwrap_or_else(|| "draft".to_string());

                let mut data = Map::new();
                data.insert("title".to_string(), json!(title));
                data.insert("content".to_string(), json!(content));
                data.insert("status".to_string(), json!(status));
                if let Some(parent) = args.get("parent").and_then(Value::as_u64) {
                    data.insert("parent".to_string(), json!(parent));
                }

                match self.client.create_page(Value::Object(data)).await {
                    Ok(page) => Ok(data_result(
                        &format!("Created page with ID: {:?}", page.id),
                        &page,
                    )),
                    Err(e) => Ok(failure_result("create page", &e)),
                }
            }
            "update_page" => {
                let page_id = validate::required_id(&args, "page_id")?;

                let mut data = Map::new();
                if let Some(title) = validate::optional_str(&args, "title") {
                    data.insert("title".to_string(), json!(title));
                }
                if let Some(content) = validate::optional_str(&args, "content") {
                    data.insert("content".to_string(), json!(content));
                }
                if let Some(status) = validate::post_status(&args)? {
                    data.insert("status".to_string(), json!(status));
                }
                if let Some(parent) = args.get("parent").and_then(Value::as_u64) {
                    data.insert("parent".to_string(), json!(parent));
                }
                if data.is_empty() {
                    return Err(McpError::InvalidParams(
                        "update_page needs at least one field to change".to_string(),
                    ));
                }

                match self.client.update_page(page_id, Value::Object(data)).await {
                    Ok(page) => Ok(data_result(&format!("Updated page {}", page_id), &page)),
                    Err(e) => Ok(failure_result("update page", &e)),
                }
            }
            "delete_page" => {
                let page_id = validate::required_id(&args, "page_id")?;
                let force = validate::optional_bool(&args, "force");
                match self.client.delete_page(page_id, force).await {
                    Ok(_) => Ok(text_result(format!(
                        "Deleted page ID {} (force: {})",
                        page_id, force
                    ))),
                    Err(e) => Ok(failure_result("delete page", &e)),
                }
            }

            // ---- Media -----------------------------------------------------
            "get_media" => {
                let query = self.list_query(&args)?;
                match self.client.get_media(query).await {
                    Ok(media) => Ok(data_result(
                        &format!("Retrieved {} media items", media.len()),
                        &media,
                    )),
                    Err(e) => Ok(failure_result("fetch media", &e)),
                }
            }
            "upload_media" => {
                let file_data_b64 = validate::required_str(&args, "file_data")?;
                let filename = validate::required_str(&args, "filename")?;
                let mime_type = validate::required_str(&args, "mime_type")?;

                let bytes = general_purpose::STANDARD
                    .decode(file_data_b64)
                    .map_err(|e| McpError::InvalidParams(format!("invalid base64 data: {}", e)))?;

                let mut fields = Vec::new();
                for key in ["title", "alt_text", "caption"] {
                    if let Some(value) = validate::optional_str(&args, key) {
                        fields.push((key.to_string(), value.to_string()));
                    }
                }

                let payload = FilePayload {
                    bytes,
                    filename: filename.to_string(),
                    mime_type: mime_type.to_string(),
                };

                match self.client.upload_media(payload, fields).await {
                    Ok(media) => Ok(data_result(
                        &format!("Uploaded media with ID: {:?}", media.id),
                        &media,
                    )),
                    Err(e) => Ok(failure_result("upload media", &e)),
                }
            }
            "update_media" => {
                let media_id = validate::required_id(&args, "media_id")?;

                let mut data = Map::new();
                for key in ["title", "alt_text", "caption", "description"] {
                    if let Some(value) = validate::optional_str(&args, key) {
                        data.insert(key.to_string(), json!(value));
                    }
                }
                if data.is_empty() {
                    return Err(McpError::InvalidParams(
                        "update_media needs at least one field to change".to_string(),
                    ));
                }

                match self.client.update_media(media_id, Value::Object(data)).await {
                    Ok(media) => Ok(data_result(&format!("Updated media {}", media_id), &media)),
                    Err(e) => Ok(failure_result("update media", &e)),
                }
            }
            "delete_media" => {
                let media_id = validate::required_id(&args, "media_id")?;
                let force = validate::optional_bool(&args, "force");
                match self.client.delete_media(media_id, force).await {
                    Ok(_) => Ok(text_result(format!(
                        "Deleted media ID {} (force: {})",
                        media_id, force
                    ))),
                    Err(e) => Ok(failure_result("delete media", &e)),
                }
            }

            // ---- Categories ------------------------------------------------
            "get_categories" => {
                let query = self.list_query(&args)?;
                match self.client.get_categories(query).await {
                    Ok(categories) => Ok(data_result(
                        &format!("Found {} categories", categories.len()),
                        &categories,
                    )),
                    Err(e) => Ok(failure_result("fetch categories", &e)),
                }
            }
            "create_category" => {
                let name = validate::required_str(&args, "name")?;

                let mut data = Map::new();
                data.insert("name".to_string(), json!(name));
                if let Some(description) = validate::optional_str(&args, "description") {
                    data.insert("description".to_string(), json!(description));
                }
                if let Some(parent) = args.get("parent").and_then(Value::as_u64) {
                    data.insert("parent".to_string(), json!(parent));
                }

                match self.client.create_category(Value::Object(data)).await {
                    Ok(category) => Ok(data_result(
                        &format!("Created category '{}' with ID: {:?}", name, category.id),
                        &category,
                    )),
                    Err(e) => Ok(failure_result("create category", &e)),
                }
            }
            "update_category" => {
                let category_id = validate::required_id(&args, "category_id")?;

                let mut data = Map::new();
                if let Some(name) = validate::optional_str(&args, "name") {
                    data.insert("name".to_string(), json!(name));
                }
                if let Some(description) = validate::optional_str(&args, "description") {
                    data.insert("description".to_string(), json!(description));
                }
                if data.is_empty() {
                    return Err(McpError::InvalidParams(
                        "update_category needs at least one field to change".to_string(),
                    ));
                }

                match self
                    .client
                    .update_category(category_id, Value::Object(data))
                    .await
                {
                    Ok(category) => Ok(data_result(
                        &format!("Updated category ID {} to '{}'", category_id, category.name),
                        &category,
                    )),
                    Err(e) => Ok(failure_result("update category", &e)),
                }
            }
            "delete_category" => {
                let category_id = validate::required_id(&args, "category_id")?;
                let force = validate::optional_bool(&args, "force");
                match self.client.delete_category(category_id, force).await {
                    Ok(_) => Ok(text_result(format!(
                        "Deleted category ID {} (force: {})",
                        category_id, force
                    ))),
                    Err(e) => Ok(failure_result("delete category", &e)),
                }
            }

            // ---- Tags ------------------------------------------------------
            "get_tags" => {
                let query = self.list_query(&args)?;
                match self.client.get_tags(query).await {
                    Ok(tags) => Ok(data_result(&format!("Found {} tags", tags.len()), &tags)),
                    Err(e) => Ok(failure_result("fetch tags", &e)),
                }
            }
            "create_tag" => {
                let name = validate::required_str(&args, "name")?;

                let mut data = Map::new();
                data.insert("name".to_string(), json!(name));
                if let Some(description) = validate::optional_str(&args, "description") {
                    data.insert("description".to_string(), json!(description));
                }

                match self.client.create_tag(Value::Object(data)).await {
                    Ok(tag) => Ok(data_result(
                        &format!("Created tag '{}' with ID: {:?}", name, tag.id),
                        &tag,
                    )),
                    Err(e) => Ok(failure_result("create tag", &e)),
                }
            }
            "update_tag" => {
                let tag_id = validate::required_id(&args, "tag_id")?;

                let mut data = Map::new();
                if let Some(name) = validate::optional_str(&args, "name") {
                    data.insert("name".to_string(), json!(name));
                }
                if let Some(description) = validate::optional_str(&args, "description") {
                    data.insert("description".to_string(), json!(description));
                }
                if data.is_empty() {
                    return Err(McpError::InvalidParams(
                        "update_tag needs at least one field to change".to_string(),
                    ));
                }

                match self.client.update_tag(tag_id, Value::Object(data)).await {
                    Ok(tag) => Ok(data_result(
                        &format!("Updated tag ID {} to '{}'", tag_id, tag.name),
                        &tag,
                    )),
                    Err(e) => Ok(failure_result("update tag", &e)),
                }
            }
            "delete_tag" => {
                let tag_id = validate::required_id(&args, "tag_id")?;
                let force = validate::optional_bool(&args, "force");
                match self.client.delete_tag(tag_id, force).await {
                    Ok(_) => Ok(text_result(format!(
                        "Deleted tag ID {} (force: {})",
                        tag_id, force
                    ))),
                    Err(e) => Ok(failure_result("delete tag", &e)),
                }
            }

            // ---- Comments --------------------------------------------------
            "get_comments" => {
                let mut query = self.list_query(&args)?;
                if let Some(post_id) = args.get("post_id").and_then(Value::as_u64) {
                    query.push(("post".to_string(), post_id.to_string()));
                }
                match self.client.get_comments(query).await {
                    Ok(comments) => Ok(data_result(
                        &format!("Found {} comments", comments.len()),
                        &comments,
                    )),
                    Err(e) => Ok(failure_result("fetch comments", &e)),
                }
            }
            "create_comment" => {
                let post_id = validate::required_id(&args, "post_id")?;
                let content = validate::required_str(&args, "content")?;

                let mut data = Map::new();
                data.insert("post".to_string(), json!(post_id));
                data.insert("content".to_string(), json!(content));
                if let Some(author_name) = validate::optional_str(&args, "author_name") {
                    data.insert("author_name".to_string(), json!(author_name));
                }
                if let Some(author_email) = validate::optional_str(&args, "author_email") {
                    data.insert("author_email".to_string(), json!(author_email));
                }

                match self.client.create_comment(Value::Object(data)).await {
                    Ok(comment) => Ok(data_result(
                        &format!("Created comment with ID: {:?}", comment.id),
                        &comment,
                    )),
                    Err(e) => Ok(failure_result("create comment", &e)),
                }
            }
            "update_comment" => {
                let comment_id = validate::required_id(&args, "comment_id")?;

                let mut data = Map::new();
                if let Some(content) = validate::optional_str(&args, "content") {
                    data.insert("content".to_string(), json!(content));
                }
                if let Some(status) = validate::optional_str(&args, "status") {
                    data.insert("status".to_string(), json!(status));
                }
                if data.is_empty() {
                    return Err(McpError::InvalidParams(
                        "update_comment needs at least one field to change".to_string(),
                    ));
                }

                match self
                    .client
                    .update_comment(comment_id, Value::Object(data))
                    .await
                {
                    Ok(comment) => Ok(data_result(
                        &format!("Updated comment {}", comment_id),
                        &comment,
                    )),
                    Err(e) => Ok(failure_result("update comment", &e)),
                }
            }
            "delete_comment" => {
                let comment_id = validate::required_id(&args, "comment_id")?;
                let force = validate::optional_bool(&args, "force");
                match self.client.delete_comment(comment_id, force).await {
                    Ok(_) => Ok(text_result(format!(
                        "Deleted comment ID {} (force: {})",
                        comment_id, force
                    ))),
                    Err(e) => Ok(failure_result("delete comment", &e)),
                }
            }

            // ---- Users / site ----------------------------------------------
            "get_site_users" => {
                let query = self.list_query(&args)?;
                match self.client.get_users(query).await {
                    Ok(users) => Ok(data_result(
                        &format!("Found {} users", users.len()),
                        &users,
                    )),
                    Err(e) => Ok(failure_result("fetch users", &e)),
                }
            }
            "update_user" => {
                let user_id = validate::required_id(&args, "user_id")?;

                let mut data = Map::new();
                for key in ["name", "email", "url", "description"] {
                    if let Some(value) = validate::optional_str(&args, key) {
                        data.insert(key.to_string(), json!(value));
                    }
                }
                if data.is_empty() {
                    return Err(McpError::InvalidParams(
                        "update_user needs at least one field to change".to_string(),
                    ));
                }

                match self.client.update_user(user_id, Value::Object(data)).await {
                    Ok(user) => Ok(data_result(&format!("Updated user {}", user_id), &user)),
                    Err(e) => Ok(failure_result("update user", &e)),
                }
            }
            "get_site_settings" => match self.client.get_site_settings().await {
                Ok(settings) => Ok(data_result("Retrieved site settings", &settings)),
                Err(e) => Ok(failure_result("fetch site settings", &e)),
            },
            "get_plugins" => match self.client.get_plugins().await {
                Ok(plugins) => Ok(data_result(
                    &format!("Found {} plugins", plugins.len()),
                    &plugins,
                )),
                Err(e) => Ok(failure_result("fetch plugins", &e)),
            },
            "get_site_statistics" => Ok(self.site_statistics().await),

            _ => Err(McpError::ToolNotFound(params.name)),
        }
    }

    async fn list_resources(&self) -> Result<Vec<Resource>, McpError> {
        Ok(vec![
            Resource {
                uri: "wordpress://posts".to_string(),
                name: "WordPress Posts".to_string(),
                description: Some("All WordPress posts".to_string()),
                mime_type: Some("application/json".to_string()),
            },
            Resource {
                uri: "wordpress://comments".to_string(),
                name: "WordPress Comments".to_string(),
                description: Some("All WordPress comments".to_string()),
                mime_type: Some("application/json".to_string()),
            },
            Resource {
                uri: "wordpress://categories".to_string(),
                name: "WordPress Categories".to_string(),
                description: Some("All WordPress categories".to_string()),
                mime_type: Some("application/json".to_string()),
            },
            Resource {
                uri: "wordpress://tags".to_string(),
                name: "WordPress Tags".to_string(),
                description: Some("All WordPress tags".to_string()),
                mime_type: Some("application/json".to_string()),
            },
        ])
    }

    async fn read_resource(&self, params: ResourceReadParams) -> Result<Value, McpError> {
        match params.uri.as_str() {
            "wordpress://posts" => {
                let posts = self.client.get_posts(Vec::new()).await?;
                Ok(json!({
                    "contents": [{
                        "uri": params.uri,
                        "mimeType": "application/json",
                        "text": serde_json::to_string_pretty(&posts)?
                    }]
                }))
            }
            "wordpress://comments" => {
                let comments = self.client.get_comments(Vec::new()).await?;
                Ok(json!({
                    "contents": [{
                        "uri": params.uri,
                        "mimeType": "application/json",
                        "text": serde_json::to_string_pretty(&comments)?
                    }]
                }))
            }
            "wordpress://categories" => {
                let categories = self.client.get_categories(Vec::new()).await?;
                Ok(json!({
                    "contents": [{
                        "uri": params.uri,
                        "mimeType": "application/json",
                        "text": serde_json::to_string_pretty(&categories)?
                    }]
                }))
            }
            "wordpress://tags" => {
                let tags = self.client.get_tags(Vec::new()).await?;
                Ok(json!({
                    "contents": [{
                        "uri": params.uri,
                        "mimeType": "application/json",
                        "text": serde_json::to_string_pretty(&tags)?
                    }]
                }))
            }
            _ => Err(McpError::ResourceNotFound(params.uri)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_handler() -> WordPressHandler {
        WordPressHandler::new(WordPressConfig {
            url: "https://example.com".to_string(),
            username: "admin".to_string(),
            application_password: "abcd efgh ijkl mnop qrst uvwx".to_string(),
            enabled: Some(true),
            timeout_seconds: Some(5),
            max_retries: Some(1),
        })
    }

    #[tokio::test]
    async fn test_tool_list_covers_all_resources() {
        let handler = test_handler();
        let tools = handler.list_tools().await.unwrap();
        let names: Vec<&str> = tools.iter().map(|tool| tool.name.as_str()).collect();

        for expected in [
            "wordpress_health_check",
            "get_posts",
            "get_post_details",
            "create_post",
            "update_post",
            "delete_post",
            "get_pages",
            "create_page",
            "update_page",
            "delete_page",
            "get_media",
            "upload_media",
            "update_media",
            "delete_media",
            "get_categories",
            "create_category",
            "update_category",
            "delete_category",
            "get_tags",
            "create_tag",
            "update_tag",
            "delete_tag",
            "get_comments",
            "create_comment",
            "update_comment",
            "delete_comment",
            "get_site_users",
            "update_user",
            "get_site_settings",
            "get_plugins",
            "get_site_statistics",
        ] {
            assert!(names.contains(&expected), "missing tool {}", expected);
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_is_rejected() {
        let handler = test_handler();
        let result = handler
            .call_tool(ToolCallParams {
                name: "bogus_tool".to_string(),
                arguments: None,
            })
            .await;
        assert!(matches!(result, Err(McpError::ToolNotFound(_))));
    }

    #[tokio::test]
    async fn test_missing_required_parameter_is_invalid_params() {
        let handler = test_handler();
        // create_post without a title must fail before any network call
        let result = handler
            .call_tool(ToolCallParams {
                name: "create_post".to_string(),
                arguments: Some(Args::new()),
            })
            .await;
        assert!(matches!(result, Err(McpError::InvalidParams(_))));
    }

    #[tokio::test]
    async fn test_update_post_requires_some_change() {
        let handler = test_handler();
        let mut args = Args::new();
        args.insert("post_id".to_string(), json!(12));
        let result = handler
            .call_tool(ToolCallParams {
                name: "update_post".to_string(),
                arguments: Some(args),
            })
            .await;
        assert!(matches!(result, Err(McpError::InvalidParams(_))));
    }

    #[tokio::test]
    async fn test_upload_media_rejects_bad_base64() {
        let handler = test_handler();
        let mut args = Args::new();
        args.insert("file_data".to_string(), json!("%%%not-base64%%%"));
        args.insert("filename".to_string(), json!("image.png"));
        args.insert("mime_type".to_string(), json!("image/png"));
        let result = handler
            .call_tool(ToolCallParams {
                name: "upload_media".to_string(),
                arguments: Some(args),
            })
            .await;
        assert!(matches!(result, Err(McpError::InvalidParams(_))));
    }

    #[tokio::test]
    async fn test_resource_list() {
        let handler = test_handler();
        let resources = handler.list_resources().await.unwrap();
        let uris: Vec<&str> = resources.iter().map(|r| r.uri.as_str()).collect();
        assert!(uris.contains(&"wordpress://posts"));
        assert!(uris.contains(&"wordpress://comments"));
        assert!(uris.contains(&"wordpress://categories"));
        assert!(uris.contains(&"wordpress://tags"));
    }
}
