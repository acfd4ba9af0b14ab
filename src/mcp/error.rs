use crate::mcp::JsonRpcError;
use crate::wordpress::WordPressApiError;
use thiserror::Error;

/// ツールディスパッチ層のエラー型
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid method: {0}")]
    InvalidMethod(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("WordPress API error: {0}")]
    WordPress(#[from] WordPressApiError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<McpError> for JsonRpcError {
    fn from(err: McpError) -> Self {
        match err {
            McpError::InvalidRequest(msg) => JsonRpcError {
                code: -32600,
                message: format!("Invalid request: {}", msg),
                data: None,
            },
            McpError::InvalidMethod(msg) => JsonRpcError {
                code: -32601,
                message: format!("Method not found: {}", msg),
                data: None,
            },
            McpError::InvalidParams(msg) => JsonRpcError {
                code: -32602,
                message: format!("Invalid params: {}", msg),
                data: None,
            },
            _ => JsonRpcError {
                code: -32603,
                message: err.to_string(),
                data: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_rpc_code_mapping() {
        let err: JsonRpcError = McpError::InvalidParams("missing title".to_string()).into();
        assert_eq!(err.code, -32602);
        assert!(err.message.contains("missing title"));

        let err: JsonRpcError = McpError::Internal("boom".to_string()).into();
        assert_eq!(err.code, -32603);
    }

    #[test]
    fn test_wordpress_error_converts() {
        let source = WordPressApiError::NotFound {
            detail: "no such post".to_string(),
        };
        let err: McpError = source.into();
        assert!(err.to_string().contains("no such post"));
    }
}
