//! 設定の読み込みと検証
//!
//! デフォルト値 → TOMLファイル → 環境変数の順に上書きする。

use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::mcp::McpError;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct McpConfig {
    pub server: ServerConfig,
    pub handlers: HandlersConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub bind_addr: Option<String>,
    pub stdio: Option<bool>,
    pub log_level: Option<String>,
    pub log_dir: Option<String>,
    pub log_to_file: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HandlersConfig {
    pub wordpress: Option<WordPressConfig>,
    // 将来の拡張用
    // pub github: Option<GitHubConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WordPressConfig {
    /// WordPress サイトの URL
    pub url: String,
    /// WordPress ユーザー名
    pub username: String,
    /// Application Password (WordPress管理画面で生成)
    pub application_password: String,
    pub enabled: Option<bool>,
    pub timeout_seconds: Option<u64>,
    /// リトライを含めた最大試行回数
    pub max_retries: Option<u32>,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_addr: Some("127.0.0.1:8080".to_string()),
                stdio: Some(false),
                log_level: Some("info".to_string()),
                log_dir: None,
                log_to_file: Some(false),
            },
            handlers: HandlersConfig { wordpress: None },
        }
    }
}

impl WordPressConfig {
    /// 接続前に資格情報の形式を確認する。
    ///
    /// Application Password は通常24文字 (4文字×6グループ、スペース区切り)。
    /// スペースを除いた長さで検証する。
    pub fn validate(&self) -> Result<(), McpError> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(McpError::Config(
                "WordPress site URL is not set".to_string(),
            ));
        }

        let parsed = Url::parse(url).map_err(|e| {
            McpError::Config(format!("WordPress site URL is malformed: {}", e))
        })?;
        match parsed.scheme() {
            "https" => {}
            "http" => {
                warn!("WordPress site URL uses plain HTTP; HTTPS is strongly recommended");
            }
            other => {
                return Err(McpError::Config(format!(
                    "WordPress site URL must start with http:// or https:// (got {}://)",
                    other
                )));
            }
        }
        if parsed.host_str().is_none() {
            return Err(McpError::Config(
                "WordPress site URL has no host".to_string(),
            ));
        }

        let username = self.username.trim();
        if username.is_empty() {
            return Err(McpError::Config(
                "WordPress username is not set".to_string(),
            ));
        }
        if !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            warn!("WordPress username contains unusual characters; double-check the value");
        }

        let password_without_spaces: String = self
            .application_password
            .chars()
            .filter(|c| *c != ' ')
            .collect();
        if password_without_spaces.is_empty() {
            return Err(McpError::Config(
                "application password is not set".to_string(),
            ));
        }
        if password_without_spaces.len() < 20 {
            return Err(McpError::Config(
                "application password is too short; copy the full value from the \
                 WordPress admin screen"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

impl McpConfig {
    /// 設定ファイルから読み込み、環境変数で上書き
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let mut settings = config::Config::builder();

        // デフォルト値を設定
        let default_config = McpConfig::default();
        settings = settings.add_source(config::Config::try_from(&default_config)?);

        // 設定ファイルを読み込み (複数の場所を試行)
        let config_paths = ["mcp-config.toml", "config.toml", "config/mcp.toml"];
        for path in &config_paths {
            if std::path::Path::new(path).exists() {
                settings = settings.add_source(config::File::with_name(path));
                break;
            }
        }

        // 環境変数で上書き (MCP_で始まる変数)
        settings = settings.add_source(
            config::Environment::with_prefix("MCP")
                .separator("_")
                .try_parsing(true),
        );

        let mut final_config: McpConfig = settings.build()?.try_deserialize()?;

        // WordPress設定の環境変数上書き
        if let Ok(wp_url) = std::env::var("WORDPRESS_URL") {
            match final_config.handlers.wordpress.as_mut() {
                Some(wp_config) => {
                    wp_config.url = wp_url;
                    if let Ok(username) = std::env::var("WORDPRESS_USERNAME") {
                        wp_config.username = username;
                    }
                    if let Ok(password) = std::env::var("WORDPRESS_APP_PASSWORD") {
                        wp_config.application_password = password;
                    }
                }
                None => {
                    final_config.handlers.wordpress = Some(WordPressConfig {
                        url: wp_url,
                        username: std::env::var("WORDPRESS_USERNAME").unwrap_or_default(),
                        application_password: std::env::var("WORDPRESS_APP_PASSWORD")
                            .unwrap_or_default(),
                        enabled: Some(true),
                        timeout_seconds: Some(30),
                        max_retries: Some(3),
                    });
                }
            }
        }

        // サーバー設定の環境変数上書き
        if let Ok(bind_addr) = std::env::var("BIND_ADDR") {
            final_config.server.bind_addr = Some(bind_addr);
        }
        if std::env::var("MCP_STDIO").is_ok() {
            final_config.server.stdio = Some(true);
        }

        Ok(final_config)
    }

    /// サンプル設定ファイルを生成
    pub fn generate_sample_config() -> Result<(), Box<dyn std::error::Error>> {
        let sample_config = McpConfig {
            server: ServerConfig {
                bind_addr: Some("127.0.0.1:8080".to_string()),
                stdio: Some(false),
                log_level: Some("info".to_string()),
                log_dir: None,
                log_to_file: Some(false),
            },
            handlers: HandlersConfig {
                wordpress: Some(WordPressConfig {
                    url: "https://your-wordpress-site.com".to_string(),
                    username: "your_username".to_string(),
                    application_password: "xxxx xxxx xxxx xxxx xxxx xxxx".to_string(),
                    enabled: Some(true),
                    timeout_seconds: Some(30),
                    max_retries: Some(3),
                }),
            },
        };

        let toml_content = toml::to_string_pretty(&sample_config)?;

        let sample_content = format!(
            r#"# wordpress-mcp Configuration File
#
# このファイルは mcp-config.toml として保存してください
# 環境変数での上書きも可能です (例: WORDPRESS_URL=https://example.com)

{}

# 設定説明:
#
# [server]
# bind_addr = TCP サーバーのバインドアドレス (stdio=false の場合)
# stdio = true にすると標準入出力モードで動作 (MCP クライアント用)
# log_level = ログレベル (trace, debug, info, warn, error)
# log_to_file = true でファイルにもログを書き出す
#
# [handlers.wordpress]
# url = WordPress サイトの URL
# username = WordPress ユーザー名
# application_password = Application Password (WordPress管理画面で生成)
# timeout_seconds = HTTPタイムアウト秒数
# max_retries = リトライを含めた最大試行回数
#
# Application Password の生成方法:
# 1. WordPress管理画面 > ユーザー > プロフィール
# 2. 'アプリケーションパスワード' セクション
# 3. 新しいアプリケーション名を入力 (例: "wordpress-mcp")
# 4. 'Add New Application Password' をクリック
# 5. 生成されたパスワードをコピーして上記 application_password に設定
"#,
            toml_content
        );

        std::fs::write("mcp-config.toml.example", sample_content)?;
        println!("📝 サンプル設定ファイルを生成しました: mcp-config.toml.example");
        println!("💡 このファイルを mcp-config.toml にコピーして編集してください");

        Ok(())
    }
}
