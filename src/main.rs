use std::sync::Arc;

use wordpress_mcp::config::McpConfig;
use wordpress_mcp::handlers::WordPressHandler;
use wordpress_mcp::logging::{init_logging, LogConfig};
use wordpress_mcp::mcp::McpServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // --generate-config でサンプル設定を書き出して終了
    if std::env::args().any(|arg| arg == "--generate-config") {
        McpConfig::generate_sample_config()?;
        return Ok(());
    }

    let config = McpConfig::load()?;

    let log_config = LogConfig::from_server_config(&config.server);
    let _log_guard = init_logging(&log_config)?;

    let wordpress = config.handlers.wordpress.clone().ok_or(
        "WordPress handler is not configured (set [handlers.wordpress] or WORDPRESS_URL)",
    )?;
    wordpress.validate()?;

    let mut server = McpServer::new();
    server.add_handler("wordpress".to_string(), Arc::new(WordPressHandler::new(wordpress)));

    if config.server.stdio.unwrap_or(false) {
        server.run_stdio().await?;
    } else {
        let addr = config
            .server
            .bind_addr
            .clone()
            .unwrap_or_else(|| "127.0.0.1:8080".to_string());
        server.run(&addr).await?;
    }

    Ok(())
}
