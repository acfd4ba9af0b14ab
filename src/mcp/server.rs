//! JSON-RPC サーバーループ (stdio / TCP)
//!
//! ハンドラーは `McpHandler` トレイトを実装してプラガブルに登録する。

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

use crate::mcp::{
    InitializeParams, JsonRpcRequest, JsonRpcResponse, McpError, Resource, ResourceReadParams,
    Tool, ToolCallParams,
};

/// 対象システムごとのハンドラーが実装するインターフェース
#[async_trait]
pub trait McpHandler: Send + Sync {
    async fn initialize(&self, params: InitializeParams) -> Result<serde_json::Value, McpError>;
    async fn list_tools(&self) -> Result<Vec<Tool>, McpError>;
    async fn call_tool(&self, params: ToolCallParams) -> Result<serde_json::Value, McpError>;
    async fn list_resources(&self) -> Result<Vec<Resource>, McpError>;
    async fn read_resource(&self, params: ResourceReadParams)
        -> Result<serde_json::Value, McpError>;
}

pub struct McpServer {
    handlers: HashMap<String, Arc<dyn McpHandler>>,
}

impl Default for McpServer {
    fn default() -> Self {
        Self::new()
    }
}

impl McpServer {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn add_handler(&mut self, name: String, handler: Arc<dyn McpHandler>) {
        self.handlers.insert(name, handler);
    }

    /// TCP で待ち受ける (開発・テスト用)
    pub async fn run(&self, addr: &str) -> Result<(), Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        info!("MCP server listening on {}", addr);

        loop {
            let (stream, _) = listener.accept().await?;
            let handlers = self.handlers.clone();

            tokio::spawn(async move {
                if let Err(e) = Self::handle_connection(stream, handlers).await {
                    error!("error handling connection: {}", e);
                }
            });
        }
    }

    async fn handle_connection(
        mut stream: TcpStream,
        handlers: HashMap<String, Arc<dyn McpHandler>>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let (reader, mut writer) = stream.split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;

            if bytes_read == 0 {
                break; // Connection closed
            }

            let response = match Self::process_request(&line, &handlers).await {
                Ok(response) => response,
                Err(e) => {
                    warn!("error processing request: {}", e);
                    continue;
                }
            };

            let response_str = serde_json::to_string(&response)?;
            writer.write_all(response_str.as_bytes()).await?;
            writer.write_all(b"\n").await?;
        }

        Ok(())
    }

    async fn process_request(
        line: &str,
        handlers: &HashMap<String, Arc<dyn McpHandler>>,
    ) -> Result<JsonRpcResponse, McpError> {
        let request: JsonRpcRequest = serde_json::from_str(line.trim())?;

        let handler = handlers
            .values()
            .next()
            .ok_or_else(|| McpError::InvalidMethod("no handlers registered".to_string()));

        let result = match request.method.as_str() {
            "initialize" => match handler {
                Ok(handler) => {
                    let params: InitializeParams =
                        serde_json::from_value(request.params.unwrap_or_default())?;
                    handler.initialize(params).await
                }
                Err(e) => Err(e),
            },
            "tools/list" => match handler {
                Ok(handler) => {
                    let tools = handler.list_tools().await?;
                    Ok(serde_json::json!({ "tools": tools }))
                }
                Err(e) => Err(e),
            },
            "tools/call" => match handler {
                Ok(handler) => {
                    let params: ToolCallParams =
                        serde_json::from_value(request.params.unwrap_or_default())?;
                    handler.call_tool(params).await
                }
                Err(e) => Err(e),
            },
            "resources/list" => match handler {
                Ok(handler) => {
                    let resources = handler.list_resources().await?;
                    Ok(serde_json::json!({ "resources": resources }))
                }
                Err(e) => Err(e),
            },
            "resources/read" => match handler {
                Ok(handler) => {
                    let params: ResourceReadParams =
                        serde_json::from_value(request.params.unwrap_or_default())?;
                    handler.read_resource(params).await
                }
                Err(e) => Err(e),
            },
            _ => Err(McpError::InvalidMethod(request.method.clone())),
        };

        match result {
            Ok(result) => Ok(JsonRpcResponse {
                jsonrpc: "2.0".to_string(),
                result: Some(result),
                error: None,
                id: request.id,
            }),
            Err(e) => Ok(JsonRpcResponse {
                jsonrpc: "2.0".to_string(),
                result: None,
                error: Some(e.into()),
                id: request.id,
            }),
        }
    }

    /// 標準入出力で動く (MCPクライアント用)
    pub async fn run_stdio(&self) -> Result<(), Box<dyn std::error::Error>> {
        use tokio::io::{stdin, stdout};

        info!("MCP server running on stdio");

        let stdin = stdin();
        let mut stdout = stdout();
        let mut reader = BufReader::new(stdin);
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;

            if bytes_read == 0 {
                break; // EOF
            }

            let response = match Self::process_request(&line, &self.handlers).await {
                Ok(response) => response,
                Err(e) => {
                    error!("error processing request: {}", e);
                    continue;
                }
            };

            let response_str = serde_json::to_string(&response)?;
            stdout.write_all(response_str.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_method_yields_json_rpc_error() {
        let handlers: HashMap<String, Arc<dyn McpHandler>> = HashMap::new();
        let request = r#"{"jsonrpc":"2.0","method":"bogus/method","id":1}"#;
        let response = McpServer::process_request(request, &handlers)
            .await
            .unwrap();
        let error = response.error.expect("error expected");
        assert_eq!(error.code, -32601);
    }

    #[tokio::test]
    async fn test_tools_list_without_handler() {
        let handlers: HashMap<String, Arc<dyn McpHandler>> = HashMap::new();
        let request = r#"{"jsonrpc":"2.0","method":"tools/list","id":2}"#;
        let response = McpServer::process_request(request, &handlers)
            .await
            .unwrap();
        assert!(response.error.is_some());
    }
}
