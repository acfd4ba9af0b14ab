//! # wordpress-mcp
//!
//! WordPress REST API tool plugin over the Model Context Protocol (MCP).
//!
//! Exposes posts, pages, media, categories, tags, comments, users and site
//! settings as callable tools for MCP hosts, backed by a resilient HTTP
//! client with retry, backoff and credential-safe logging.

pub mod config;
pub mod handlers;
pub mod logging;
pub mod mcp;
pub mod wordpress;

pub use mcp::{McpError, McpServer};
pub use wordpress::{WordPressApiError, WordPressClient};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = McpError::InvalidRequest("test".to_string());
        assert!(err.to_string().contains("test"));
    }
}
