//! ログシステムの初期化
//!
//! コンソール出力に加えて、設定により日次ローテーションのファイル出力を
//! 行う。ファイル出力は non-blocking writer 経由。

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// ログ設定
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// ログレベル (trace, debug, info, warn, error)
    pub level: String,
    /// ログディレクトリ (ファイル出力時のみ使用)
    pub log_dir: PathBuf,
    /// コンソール出力有効
    pub console_enabled: bool,
    /// ファイル出力有効
    pub file_enabled: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: get_default_log_dir(),
            console_enabled: true,
            file_enabled: false,
        }
    }
}

impl LogConfig {
    /// サーバー設定からログ設定を作成
    pub fn from_server_config(server_config: &crate::config::ServerConfig) -> Self {
        let mut config = Self::default();

        if let Some(ref level) = server_config.log_level {
            config.level = level.clone();
        }
        if let Some(ref dir) = server_config.log_dir {
            config.log_dir = PathBuf::from(dir);
        }
        if let Some(to_file) = server_config.log_to_file {
            config.file_enabled = to_file;
        }

        config
    }

    pub fn with_log_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.log_dir = dir.into();
        self
    }

    pub fn with_console(mut self, enabled: bool) -> Self {
        self.console_enabled = enabled;
        self
    }

    pub fn with_file(mut self, enabled: bool) -> Self {
        self.file_enabled = enabled;
        self
    }
}

/// デフォルトログディレクトリを取得
///
/// 優先順位: カレントディレクトリの logs → システムテンプディレクトリ
fn get_default_log_dir() -> PathBuf {
    let current_log_dir = PathBuf::from("logs");
    if ensure_log_dir(&current_log_dir).is_ok() {
        return current_log_dir;
    }

    let temp_log_dir = std::env::temp_dir().join("wordpress-mcp").join("logs");
    if ensure_log_dir(&temp_log_dir).is_ok() {
        return temp_log_dir;
    }

    PathBuf::from(".")
}

fn ensure_log_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// ログシステムを初期化する。
///
/// ファイル出力時は返される `WorkerGuard` をプロセス終了まで保持すること。
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let guard = match (config.console_enabled, config.file_enabled) {
        (true, true) => {
            ensure_log_dir(&config.log_dir)?;
            let file_appender = rolling::daily(&config.log_dir, "wordpress-mcp.log");
            let (writer, guard) = non_blocking(file_appender);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer())
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .init();
            Some(guard)
        }
        (true, false) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer())
                .init();
            None
        }
        (false, true) => {
            ensure_log_dir(&config.log_dir)?;
            let file_appender = rolling::daily(&config.log_dir, "wordpress-mcp.log");
            let (writer, guard) = non_blocking(file_appender);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .init();
            Some(guard)
        }
        (false, false) => {
            // 最低限のコンソール出力
            tracing_subscriber::fmt()
                .with_max_level(tracing::Level::WARN)
                .init();
            None
        }
    };

    tracing::info!("📝 logging initialized (level: {})", config.level);
    if config.file_enabled {
        tracing::info!("📂 log directory: {}", config.log_dir.display());
    }

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_config() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert!(config.console_enabled);
        assert!(!config.file_enabled);
    }

    #[test]
    fn test_builder_style_overrides() {
        let config = LogConfig::default()
            .with_log_dir("/tmp/wp-mcp-test-logs")
            .with_console(false)
            .with_file(true);
        assert_eq!(config.log_dir, PathBuf::from("/tmp/wp-mcp-test-logs"));
        assert!(!config.console_enabled);
        assert!(config.file_enabled);
    }

    #[test]
    fn test_from_server_config() {
        let server = crate::config::ServerConfig {
            bind_addr: None,
            stdio: None,
            log_level: Some("debug".to_string()),
            log_dir: Some("/tmp/wp-logs".to_string()),
            log_to_file: Some(true),
        };
        let config = LogConfig::from_server_config(&server);
        assert_eq!(config.level, "debug");
        assert_eq!(config.log_dir, PathBuf::from("/tmp/wp-logs"));
        assert!(config.file_enabled);
    }
}
