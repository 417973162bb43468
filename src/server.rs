//! Line-delimited JSON-RPC loop
//!
//! Reads one request per line, answers with exactly one response line and
//! flushes before reading the next. Requests are handled strictly in order.

use std::future::Future;

use serde_json::{json, Value};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::core::Recommender;
use crate::models::{JsonRpcRequest, JsonRpcResponse, ToolCallParams};
use crate::routes::ToolRegistry;

pub const PARSE_ERROR: i32 = -32700;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INTERNAL_ERROR: i32 = -32603;
pub const TOOL_ERROR: i32 = -32001;
pub const STARTUP_ERROR: i32 = -32000;

/// Errors that end the request loop
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Encode a response as a single line, without the trailing newline
pub fn encode_response(response: &JsonRpcResponse) -> Result<String, ServerError> {
    Ok(serde_json::to_string(response)?)
}

/// Error line emitted once when the server cannot start
pub fn startup_error(message: &str) -> JsonRpcResponse {
    JsonRpcResponse::error(Value::Null, STARTUP_ERROR, message, None)
}

/// Why a serving session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// EOF on the input, with the number of requests answered
    InputClosed(usize),
    /// The shutdown signal fired first
    Interrupted,
}

/// Dispatches protocol requests to the tool registry
pub struct ToolServer<'a> {
    registry: &'a ToolRegistry,
    recommender: &'a Recommender,
}

impl<'a> ToolServer<'a> {
    pub fn new(registry: &'a ToolRegistry, recommender: &'a Recommender) -> Self {
        Self { registry, recommender }
    }

    /// Serve requests until the reader reaches EOF
    ///
    /// Blank lines are skipped. Returns the number of requests answered.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> Result<usize, ServerError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!(tools = self.registry.len(), "Waiting for JSON-RPC requests");

        let mut handled = 0;
        let mut buf = Vec::new();

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }

            let response = match std::str::from_utf8(&buf) {
                Ok(raw) => {
                    let line = raw.trim();
                    if line.is_empty() {
                        continue;
                    }
                    self.handle_line(line).await
                }
                Err(e) => {
                    let raw = String::from_utf8_lossy(&buf);
                    tracing::warn!(error = %e, "Request line is not valid UTF-8: {}", preview(raw.trim()));
                    parse_error(raw.trim())
                }
            };
            let encoded = encode_response(&response)?;

            writer.write_all(encoded.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
            handled += 1;
        }

        tracing::info!(handled, "Input closed, stopping");
        Ok(handled)
    }

    /// Serve until the reader reaches EOF or `shutdown` resolves
    ///
    /// A request already being handled when `shutdown` fires is abandoned
    /// without a response.
    pub async fn serve_until<R, W, S>(&self, reader: R, writer: W, shutdown: S) -> Result<Shutdown, ServerError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
        S: Future<Output = ()>,
    {
        tokio::select! {
            result = self.serve(reader, writer) => result.map(Shutdown::InputClosed),
            _ = shutdown => Ok(Shutdown::Interrupted),
        }
    }

    /// Turn one request line into its response
    pub async fn handle_line(&self, line: &str) -> JsonRpcResponse {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse JSON: {}", preview(line));
                return parse_error(line);
            }
        };

        let id = value.get("id").cloned().unwrap_or(Value::Null);
        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "Not a JSON-RPC request");
                return JsonRpcResponse::error(id, METHOD_NOT_FOUND, "Unknown method: None", None);
            }
        };

        self.dispatch(request).await
    }

    async fn dispatch(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let JsonRpcRequest { id, method, params, .. } = request;
        tracing::info!(id = %id, method = method.as_deref().unwrap_or("None"), "Received request");

        match method.as_deref() {
            Some("tools/list") => match serde_json::to_value(self.registry.descriptors()) {
                Ok(tools) => JsonRpcResponse::success(id, tools),
                Err(e) => internal_error(id, e),
            },
            Some("tools/call") => self.call_tool(id, params).await,
            other => {
                let method = other.unwrap_or("None");
                tracing::warn!(method, "Unknown method");
                JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("Unknown method: {}", method), None)
            }
        }
    }

    async fn call_tool(&self, id: Value, params: Value) -> JsonRpcResponse {
        let params: ToolCallParams = if params.is_null() {
            ToolCallParams::default()
        } else {
            match serde_json::from_value(params) {
                Ok(params) => params,
                Err(e) => {
                    return JsonRpcResponse::error(
                        id,
                        TOOL_ERROR,
                        "Tool error",
                        Some(json!({ "error": e.to_string() })),
                    );
                }
            }
        };

        let name = params.name.as_deref().unwrap_or("None");
        let Some(tool) = self.registry.get(name) else {
            tracing::warn!(tool = name, "Unknown tool requested");
            return JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("Unknown tool: {}", name), None);
        };

        tracing::info!(tool = tool.name, "Executing tool");
        tracing::debug!(tool = tool.name, arguments = %params.arguments, "Tool arguments");

        match (tool.handler)(self.recommender, params.arguments).await {
            Ok(result) => {
                tracing::info!(tool = tool.name, "Tool completed successfully");
                JsonRpcResponse::success(id, result)
            }
            Err(e) => {
                tracing::error!(tool = tool.name, error = %e, "Tool execution error");
                JsonRpcResponse::error(id, TOOL_ERROR, "Tool error", Some(json!({ "error": e.to_string() })))
            }
        }
    }
}

fn parse_error(line: &str) -> JsonRpcResponse {
    JsonRpcResponse::error(Value::Null, PARSE_ERROR, "Parse error", Some(json!({ "line": line })))
}

fn internal_error(id: Value, error: serde_json::Error) -> JsonRpcResponse {
    tracing::error!(error = %error, "Failed to encode result");
    JsonRpcResponse::error(id, INTERNAL_ERROR, "Internal error", Some(json!({ "error": error.to_string() })))
}

fn preview(line: &str) -> &str {
    match line.char_indices().nth(100) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::MemoryStore;
    use std::sync::Arc;
    use tokio::io::BufReader;

    fn create_recommender() -> Recommender {
        Recommender::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_parse_error_echoes_line() {
        let registry = ToolRegistry::standard();
        let recommender = create_recommender();
        let server = ToolServer::new(&registry, &recommender);

        let response = server.handle_line("{not json").await;
        let error = response.error.unwrap();
        assert_eq!(error.code, PARSE_ERROR);
        assert_eq!(error.data.unwrap()["line"], "{not json");
        assert_eq!(response.id, Value::Null);
    }

    #[tokio::test]
    async fn test_non_request_json_is_unknown_method() {
        let registry = ToolRegistry::standard();
        let recommender = create_recommender();
        let server = ToolServer::new(&registry, &recommender);

        let response = server.handle_line(r#"{"id": 3, "method": 42}"#).await;
        assert_eq!(response.id, json!(3));
        assert_eq!(response.error.unwrap().code, METHOD_NOT_FOUND);

        let response = server.handle_line("[1, 2]").await;
        assert_eq!(response.id, Value::Null);
        assert_eq!(response.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_tool_error_carries_message() {
        let registry = ToolRegistry::standard();
        let recommender = create_recommender();
        let server = ToolServer::new(&registry, &recommender);

        let response = server
            .handle_line(r#"{"jsonrpc":"2.0","id":"a","method":"tools/call","params":{"name":"get_game_profile","arguments":{}}}"#)
            .await;
        let error = response.error.unwrap();
        assert_eq!(error.code, TOOL_ERROR);
        assert_eq!(error.message, "Tool error");
        assert!(error.data.unwrap()["error"].as_str().unwrap().contains("g_id"));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_parse_error() {
        let registry = ToolRegistry::standard();
        let recommender = create_recommender();
        let server = ToolServer::new(&registry, &recommender);

        // Lossy decoding would turn the first line into a valid tools/list request
        let mut input = b"{\"jsonrpc\":\"2.0\",\"id\":\"\xff\",\"method\":\"tools/list\"}\n".to_vec();
        input.extend_from_slice(b"{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"tools/list\"}\n");

        let mut output = Vec::new();
        let handled = server.serve(&input[..], &mut output).await.unwrap();
        assert_eq!(handled, 2);

        let text = String::from_utf8(output).unwrap();
        let responses: Vec<Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();

        assert_eq!(responses[0]["id"], Value::Null);
        assert_eq!(responses[0]["error"]["code"], PARSE_ERROR);
        assert!(responses[0]["error"]["data"]["line"].as_str().unwrap().contains('\u{FFFD}'));
        assert!(responses[0].get("result").is_none());

        assert_eq!(responses[1]["id"], 2);
        assert!(responses[1]["result"].is_array());
    }

    #[tokio::test]
    async fn test_serve_until_stops_on_signal_while_reading() {
        let registry = ToolRegistry::standard();
        let recommender = create_recommender();
        let server = ToolServer::new(&registry, &recommender);

        // The writer half stays open, so the read never completes
        let (client, stream) = tokio::io::duplex(64);
        let mut output = Vec::new();
        let outcome = server
            .serve_until(BufReader::new(stream), &mut output, std::future::ready(()))
            .await
            .unwrap();

        assert_eq!(outcome, Shutdown::Interrupted);
        assert!(output.is_empty());
        drop(client);
    }

    #[tokio::test]
    async fn test_serve_until_reports_input_closed() {
        let registry = ToolRegistry::standard();
        let recommender = create_recommender();
        let server = ToolServer::new(&registry, &recommender);

        let input = b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"tools/list\"}\n";
        let mut output = Vec::new();
        let outcome = server
            .serve_until(&input[..], &mut output, std::future::pending())
            .await
            .unwrap();

        assert_eq!(outcome, Shutdown::InputClosed(1));
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let line = "é".repeat(150);
        assert_eq!(preview(&line).chars().count(), 100);
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn test_startup_error_line() {
        let encoded = encode_response(&startup_error("Database credentials not set")).unwrap();
        assert_eq!(
            encoded,
            r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32000,"message":"Database credentials not set"}}"#
        );
    }
}
