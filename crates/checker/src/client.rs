//! Minimal MCP client speaking line-delimited JSON-RPC.

use crate::error::{CheckError, CheckResult};
use futures::{SinkExt, StreamExt};
use mercari_mcp::protocol::{
    CallToolParams, CallToolResult, ClientCapabilities, ClientInfo, InitializeParams,
    InitializeResult, JsonRpcRequest, JsonRpcResponse, ListToolsResult, ServerInfo, ToolSchema,
    PROTOCOL_VERSION,
};
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, info, warn};

/// Upper bound for the `initialize` handshake
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound for a single request once connected
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Operations the checker needs from a tool host
#[async_trait::async_trait]
pub trait ToolHost: Send {
    async fn list_tools(&mut self) -> CheckResult<Vec<ToolSchema>>;

    async fn call_tool(&mut self, name: &str, arguments: Value) -> CheckResult<CallToolResult>;
}

/// MCP client over any pair of async byte streams
pub struct McpClient<R, W> {
    reader: FramedRead<R, LinesCodec>,
    writer: FramedWrite<W, LinesCodec>,
    next_id: u64,
    server_info: Option<ServerInfo>,
}

impl<R, W> McpClient<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Perform the `initialize` handshake and announce readiness
    pub async fn connect(reader: R, writer: W) -> CheckResult<Self> {
        let mut client = Self {
            reader: FramedRead::new(reader, LinesCodec::new()),
            writer: FramedWrite::new(writer, LinesCodec::new()),
            next_id: 1,
            server_info: None,
        };

        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info: ClientInfo {
                name: "mercari-check".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        let result = client
            .request_with_timeout("initialize", serde_json::to_value(params)?, CONNECT_TIMEOUT)
            .await?;
        let init: InitializeResult = serde_json::from_value(result)?;

        if init.protocol_version != PROTOCOL_VERSION {
            warn!(
                server_version = %init.protocol_version,
                supported = PROTOCOL_VERSION,
                "MCP protocol version mismatch"
            );
        }
        info!(
            server = %init.server_info.name,
            version = %init.server_info.version,
            "Connected to MCP server"
        );

        client
            .send(&JsonRpcRequest::notification("notifications/initialized", None))
            .await?;
        client.server_info = Some(init.server_info);

        Ok(client)
    }

    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    async fn send(&mut self, message: &JsonRpcRequest) -> CheckResult<()> {
        let encoded = serde_json::to_string(message)?;
        self.writer.send(encoded).await?;
        Ok(())
    }

    async fn request_with_timeout(
        &mut self,
        method: &str,
        params: Value,
        limit: Duration,
    ) -> CheckResult<Value> {
        tokio::time::timeout(limit, self.request(method, params))
            .await
            .map_err(|_| CheckError::Timeout(limit))?
    }

    async fn request(&mut self, method: &str, params: Value) -> CheckResult<Value> {
        let id = self.next_id;
        self.next_id += 1;

        debug!(method, id, "Sending request");
        self.send(&JsonRpcRequest::new(id, method, params)).await?;

        loop {
            let line = match self.reader.next().await {
                Some(line) => line?,
                None => return Err(CheckError::Closed),
            };
            if line.trim().is_empty() {
                continue;
            }

            let value: Value = serde_json::from_str(&line)?;

            // Server-initiated requests and notifications are not answered
            if value.get("method").is_some() {
                debug!(message = %line, "Ignoring server message");
                continue;
            }

            let response: JsonRpcResponse = serde_json::from_value(value)?;
            if response.id != Value::from(id) {
                warn!(expected = id, got = %response.id, "Discarding response with unexpected id");
                continue;
            }

            if let Some(error) = response.error {
                return Err(CheckError::Rpc {
                    code: error.code,
                    message: error.message,
                });
            }

            return response.result.ok_or_else(|| {
                CheckError::Protocol("response carries neither result nor error".to_string())
            });
        }
    }
}

#[async_trait::async_trait]
impl<R, W> ToolHost for McpClient<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn list_tools(&mut self) -> CheckResult<Vec<ToolSchema>> {
        let result = self
            .request_with_timeout("tools/list", serde_json::json!({}), REQUEST_TIMEOUT)
            .await?;
        let list: ListToolsResult = serde_json::from_value(result)?;
        Ok(list.tools)
    }

    async fn call_tool(&mut self, name: &str, arguments: Value) -> CheckResult<CallToolResult> {
        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };
        let result = self
            .request_with_timeout("tools/call", serde_json::to_value(params)?, REQUEST_TIMEOUT)
            .await?;
        Ok(serde_json::from_value(result)?)
    }
}

/// Server child process with a connected client
pub struct ServerProcess {
    child: Child,
    pub client: McpClient<ChildStdout, ChildStdin>,
}

impl ServerProcess {
    /// Close the server's stdin and wait for it to exit, killing it if it lingers
    pub async fn shutdown(self) {
        let Self { mut child, client } = self;
        drop(client);

        match tokio::time::timeout(Duration::from_secs(5), child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "Server exited"),
            Ok(Err(e)) => warn!(error = %e, "Failed to wait for server"),
            Err(_) => {
                warn!("Server did not exit, killing it");
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "Failed to kill server");
                }
            }
        }
    }
}

/// Start `program` with piped stdio and connect to it
pub async fn spawn_server(program: &str, args: &[String]) -> CheckResult<ServerProcess> {
    info!(program, ?args, "Starting MCP server");

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CheckError::ServerNotFound(program.to_string()),
            _ => CheckError::Spawn(e),
        })?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| CheckError::Protocol("server stdin unavailable".to_string()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| CheckError::Protocol("server stdout unavailable".to_string()))?;

    let client = McpClient::connect(stdout, stdin).await?;
    Ok(ServerProcess { child, client })
}
