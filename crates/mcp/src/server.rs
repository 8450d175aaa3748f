// MCP server: line-delimited JSON-RPC 2.0 over an async byte stream

use crate::protocol::{
    CallToolParams, InitializeParams, InitializeResult, JsonRpcError, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, ServerCapabilities, ServerInfo, ToolsCapability,
    JSONRPC_VERSION, PROTOCOL_VERSION,
};
use crate::tools::ToolRegistry;
use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};

pub struct McpServer {
    registry: ToolRegistry,
    server_info: ServerInfo,
}

impl McpServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            server_info: ServerInfo {
                name: "mercari-mcp".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Serve on stdin/stdout until the client closes the stream
    pub async fn start(&self) -> Result<()> {
        tracing::info!("MCP server listening on stdio");
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve requests read from `reader`, one JSON message per line.
    ///
    /// Messages are handled in arrival order; a response is written for
    /// every request but never for a notification.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = FramedRead::new(reader, LinesCodec::new());
        let mut sink = FramedWrite::new(writer, LinesCodec::new());

        while let Some(line) = lines.next().await {
            let line = line.context("Failed to read from transport")?;
            if line.trim().is_empty() {
                continue;
            }

            if let Some(response) = self.handle_message(&line).await {
                let encoded =
                    serde_json::to_string(&response).context("Failed to encode response")?;
                sink.send(encoded)
                    .await
                    .context("Failed to write to transport")?;
            }
        }

        tracing::info!("Transport closed, shutting down");
        Ok(())
    }

    /// Handle one raw message, returning the response to send (if any)
    pub async fn handle_message(&self, line: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Unparsable message");
                return Some(JsonRpcResponse::error(Value::Null, JsonRpcError::parse_error()));
            }
        };

        // Replies to requests we never send
        if value.get("method").is_none()
            && (value.get("result").is_some() || value.get("error").is_some())
        {
            tracing::debug!("Ignoring JSON-RPC response from client");
            return None;
        }

        let request: JsonRpcRequest = match serde_json::from_value(value.clone()) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed request");
                let id = value.get("id").cloned().unwrap_or(Value::Null);
                return Some(JsonRpcResponse::error(id, JsonRpcError::invalid_request()));
            }
        };

        if request.jsonrpc != JSONRPC_VERSION {
            let id = request.id.unwrap_or(Value::Null);
            return Some(JsonRpcResponse::error(id, JsonRpcError::invalid_request()));
        }

        match request.id.clone() {
            Some(id) => Some(self.dispatch(id, request).await),
            None => {
                tracing::debug!(method = %request.method, "Received notification");
                None
            }
        }
    }

    async fn dispatch(&self, id: Value, request: JsonRpcRequest) -> JsonRpcResponse {
        tracing::debug!(method = %request.method, id = %id, "Handling request");

        match request.method.as_str() {
            "initialize" => self.handle_initialize(id, request.params),
            "ping" => JsonRpcResponse::success(id, serde_json::json!({})),
            "tools/list" => JsonRpcResponse::from_result(
                id,
                &ListToolsResult {
                    tools: self.registry.list_schemas(),
                },
            ),
            "tools/call" => self.handle_call_tool(id, request.params).await,
            other => {
                tracing::warn!(method = other, "Unknown method");
                JsonRpcResponse::error(id, JsonRpcError::method_not_found(other))
            }
        }
    }

    fn handle_initialize(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        match params.map(serde_json::from_value::<InitializeParams>) {
            Some(Ok(params)) => tracing::info!(
                client = %params.client_info.name,
                client_version = %params.client_info.version,
                protocol_version = %params.protocol_version,
                "Client connected"
            ),
            Some(Err(e)) => tracing::warn!(error = %e, "Unrecognised initialize params"),
            None => tracing::info!("Client connected"),
        }

        JsonRpcResponse::from_result(
            id,
            &InitializeResult {
                protocol_version: PROTOCOL_VERSION.to_string(),
                capabilities: ServerCapabilities {
                    tools: Some(ToolsCapability {
                        list_changed: false,
                    }),
                },
                server_info: self.server_info.clone(),
            },
        )
    }

    async fn handle_call_tool(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let Some(params) = params else {
            return JsonRpcResponse::error(id, JsonRpcError::invalid_params("Missing params"));
        };

        let params: CallToolParams = match serde_json::from_value(params) {
            Ok(params) => params,
            Err(e) => {
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params(format!("Invalid tools/call params: {}", e)),
                );
            }
        };

        let Some(tool) = self.registry.get(&params.name) else {
            return JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_params(format!("Unknown tool: {}", params.name)),
            );
        };

        tracing::info!(tool = %params.name, "Calling tool");
        match tool.execute(params.arguments).await {
            Ok(result) => {
                if result.is_error() {
                    tracing::warn!(tool = %params.name, "Tool reported an error");
                }
                JsonRpcResponse::from_result(id, &result)
            }
            Err(e) => {
                tracing::error!(tool = %params.name, error = %e, "Tool execution failed");
                JsonRpcResponse::error(id, JsonRpcError::internal_error(format!("{:#}", e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{CallToolResult, ToolSchema};
    use crate::tools::{json_schema_object, Tool};
    use serde_json::json;
    use std::sync::Arc;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    struct EchoTool;

    #[async_trait::async_trait]
    impl Tool for EchoTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "echo".to_string(),
                description: "Echo arguments back".to_string(),
                input_schema: json_schema_object(json!({}), vec![]),
            }
        }

        async fn execute(&self, arguments: Value) -> Result<CallToolResult> {
            Ok(CallToolResult::text(arguments.to_string()))
        }
    }

    struct BrokenTool;

    #[async_trait::async_trait]
    impl Tool for BrokenTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "broken".to_string(),
                description: "Always fails".to_string(),
                input_schema: json_schema_object(json!({}), vec![]),
            }
        }

        async fn execute(&self, _arguments: Value) -> Result<CallToolResult> {
            anyhow::bail!("disk on fire")
        }
    }

    fn create_server() -> McpServer {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry.register(Arc::new(BrokenTool));
        McpServer::new(registry)
    }

    async fn call(server: &McpServer, message: Value) -> JsonRpcResponse {
        server
            .handle_message(&message.to_string())
            .await
            .expect("expected a response")
    }

    #[tokio::test]
    async fn test_initialize() {
        let server = create_server();
        let response = call(
            &server,
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "initialize",
                "params": {
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": { "name": "test", "version": "0.0.1" }
                }
            }),
        )
        .await;

        assert_eq!(response.id, json!(1));
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "mercari-mcp");
        assert_eq!(result["capabilities"]["tools"]["listChanged"], false);
    }

    #[tokio::test]
    async fn test_tools_list() {
        let server = create_server();
        let response = call(&server, json!({ "jsonrpc": "2.0", "id": "a", "method": "tools/list" })).await;

        let result = response.result.unwrap();
        let names: Vec<&str> = result["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["broken", "echo"]);
        assert!(result["tools"][0].get("inputSchema").is_some());
    }

    #[tokio::test]
    async fn test_tools_call() {
        let server = create_server();
        let response = call(
            &server,
            json!({
                "jsonrpc": "2.0",
                "id": 7,
                "method": "tools/call",
                "params": { "name": "echo", "arguments": { "x": 1 } }
            }),
        )
        .await;

        assert!(response.error.is_none());
        let result: CallToolResult = serde_json::from_value(response.result.unwrap()).unwrap();
        assert_eq!(result.first_text(), Some(r#"{"x":1}"#));
    }

    #[tokio::test]
    async fn test_tools_call_errors() {
        let server = create_server();

        let unknown = call(
            &server,
            json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/call", "params": { "name": "nope" } }),
        )
        .await;
        assert_eq!(unknown.error.unwrap().code, JsonRpcError::INVALID_PARAMS);

        let missing = call(&server, json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/call" })).await;
        assert_eq!(missing.error.unwrap().code, JsonRpcError::INVALID_PARAMS);

        let broken = call(
            &server,
            json!({ "jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": { "name": "broken" } }),
        )
        .await;
        let error = broken.error.unwrap();
        assert_eq!(error.code, JsonRpcError::INTERNAL_ERROR);
        assert!(error.message.contains("disk on fire"));
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let server = create_server();

        let parse = server.handle_message("{not json").await.unwrap();
        assert_eq!(parse.id, Value::Null);
        assert_eq!(parse.error.unwrap().code, JsonRpcError::PARSE_ERROR);

        let version = call(&server, json!({ "jsonrpc": "1.0", "id": 1, "method": "ping" })).await;
        assert_eq!(version.error.unwrap().code, JsonRpcError::INVALID_REQUEST);

        let no_method = call(&server, json!({ "jsonrpc": "2.0", "id": 4 })).await;
        assert_eq!(no_method.id, json!(4));
        assert_eq!(no_method.error.unwrap().code, JsonRpcError::INVALID_REQUEST);

        let unknown = call(&server, json!({ "jsonrpc": "2.0", "id": 5, "method": "resources/list" })).await;
        assert_eq!(unknown.error.unwrap().code, JsonRpcError::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let server = create_server();

        let initialized = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
        assert!(server.handle_message(&initialized.to_string()).await.is_none());

        let unknown = json!({ "jsonrpc": "2.0", "method": "notifications/whatever" });
        assert!(server.handle_message(&unknown.to_string()).await.is_none());

        let reply = json!({ "jsonrpc": "2.0", "id": 9, "result": {} });
        assert!(server.handle_message(&reply.to_string()).await.is_none());
    }

    #[tokio::test]
    async fn test_serve_over_stream() {
        let (mut client_in, server_in) = tokio::io::duplex(4096);
        let (server_out, client_out) = tokio::io::duplex(4096);

        let server = create_server();
        let handle = tokio::spawn(async move { server.serve(server_in, server_out).await });

        client_in
            .write_all(
                concat!(
                    r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
                    "\n\n",
                    r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
                    "\n",
                    r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
                    "\n"
                )
                .as_bytes(),
            )
            .await
            .unwrap();
        drop(client_in);

        let mut lines = BufReader::new(client_out).lines();
        let first: JsonRpcResponse =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        let second: JsonRpcResponse =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();

        assert_eq!(first.id, json!(1));
        assert_eq!(first.result, Some(json!({})));
        assert_eq!(second.id, json!(2));
        assert!(second.result.unwrap()["tools"].is_array());

        handle.await.unwrap().unwrap();
        assert!(lines.next_line().await.unwrap().is_none());
    }
}
