//! MCP server over newline-delimited JSON-RPC
//!
//! Reads one request per line, dispatches it, and writes one response per
//! line. Notifications are handled silently. Request errors become JSON-RPC
//! error responses; only I/O failures on the stream end the loop.

use crate::backend::SheetsBackend;
use crate::protocol::{METHOD_NOT_FOUND, PROTOCOL_VERSION, Request, Response, RpcError, parse_line};
use crate::{resources, tools};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, trace, warn};

pub struct McpServer {
    backend: Arc<dyn SheetsBackend>,
    name: String,
    folder_id: Option<String>,
}

impl McpServer {
    pub fn new(
        backend: Arc<dyn SheetsBackend>,
        name: impl Into<String>,
        folder_id: Option<String>,
    ) -> Self {
        Self {
            backend,
            name: name.into(),
            folder_id,
        }
    }

    /// Handle one raw line. Returns the response to write, if any.
    pub async fn handle_line(&self, line: &str) -> Option<Response> {
        match parse_line(line) {
            Ok(request) => self.handle(request).await,
            Err(response) => {
                warn!(error = ?response.error, "rejected malformed message");
                Some(response)
            }
        }
    }

    /// Dispatch a parsed request. Notifications never produce a response.
    pub async fn handle(&self, request: Request) -> Option<Response> {
        if request.is_notification() {
            debug!(method = %request.method, "notification received");
            return None;
        }
        let id = request.id.unwrap_or(Value::Null);

        let params = request.params.unwrap_or(Value::Null);
        let result = match request.method.as_str() {
            "initialize" => Ok(self.initialize(&params)),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": tools::definitions() })),
            "tools/call" => self.call_tool(params).await,
            "resources/list" => Ok(json!({ "resources": resources::definitions() })),
            "resources/read" => self.read_resource(&params).await,
            other => Err(RpcError::new(
                METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            )),
        };

        Some(match result {
            Ok(value) => Response::success(id, value),
            Err(error) => Response::failure(id, error),
        })
    }

    fn initialize(&self, params: &Value) -> Value {
        let version = params["protocolVersion"]
            .as_str()
            .unwrap_or(PROTOCOL_VERSION);
        info!(
            protocol_version = version,
            client = params["clientInfo"]["name"].as_str().unwrap_or("unknown"),
            "client initialized"
        );
        json!({
            "protocolVersion": version,
            "capabilities": { "tools": {}, "resources": {} },
            "serverInfo": { "name": self.name, "version": env!("CARGO_PKG_VERSION") },
        })
    }

    async fn call_tool(&self, params: Value) -> Result<Value, RpcError> {
        let name = params["name"]
            .as_str()
            .ok_or_else(|| crate::error::Error::InvalidParams("missing tool name".into()))?
            .to_string();
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        debug!(tool = %name, "calling tool");
        Ok(tools::call(
            self.backend.as_ref(),
            self.folder_id.as_deref(),
            &name,
            arguments,
        )
        .await?)
    }

    async fn read_resource(&self, params: &Value) -> Result<Value, RpcError> {
        let uri = params["uri"]
            .as_str()
            .ok_or_else(|| crate::error::Error::InvalidParams("missing resource uri".into()))?;
        Ok(resources::read(self.backend.as_ref(), uri).await?)
    }

    /// Serve until the reader reaches EOF.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut reader = reader;
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                info!("stdin closed, stopping server");
                return Ok(());
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            trace!(raw = %trimmed, "client -> server");

            let Some(response) = self.handle_line(trimmed).await else {
                continue;
            };
            let mut payload = serde_json::to_string(&response)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            payload.push('\n');
            writer.write_all(payload.as_bytes()).await?;
            writer.flush().await?;
        }
    }
}
