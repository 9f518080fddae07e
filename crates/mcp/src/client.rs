//! MCP client session (connect, initialize, list and call tools).

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcMessage,
    JsonRpcRequest, ListToolsParams, ListToolsResult, RequestId, Tool,
};
use crate::transport::{Endpoint, Transport};

/// Default timeout for a single MCP request.
///
/// Longer than the bridge's call window, so a slow tool surfaces as a
/// bridge timeout while the session keeps waiting for the late answer.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// An initialized session with an MCP server.
///
/// The client is driven through `&mut self`: one request is outstanding at
/// a time and responses are matched to it by id.
pub struct Client {
    transport: Transport,
    next_id: i64,
    timeout: Duration,
    server_info: Option<InitializeResult>,
}

impl Client {
    /// Open a transport to `endpoint` and perform the initialize handshake.
    ///
    /// `request_timeout` bounds every request, the handshake included.
    pub async fn connect(endpoint: &Endpoint, request_timeout: Duration) -> Result<Self> {
        let transport = Transport::open(endpoint).await?;
        Self::initialize(transport, request_timeout).await
    }

    /// Perform the initialize handshake over an already open transport.
    pub async fn initialize(transport: Transport, request_timeout: Duration) -> Result<Self> {
        let mut client = Self {
            transport,
            next_id: 1,
            timeout: request_timeout,
            server_info: None,
        };

        let result: InitializeResult = client
            .request("initialize", Some(InitializeParams::default()))
            .await?;
        client
            .notify(JsonRpcRequest::notification("notifications/initialized"))
            .await?;

        debug!(
            server = %result.server_info.name,
            protocol = %result.protocol_version,
            "MCP session initialized"
        );

        client.server_info = Some(result);
        Ok(client)
    }

    /// Server info returned by `initialize`.
    pub fn server_info(&self) -> Option<&InitializeResult> {
        self.server_info.as_ref()
    }

    /// Change the per-request timeout.
    pub fn set_timeout(&mut self, request_timeout: Duration) {
        self.timeout = request_timeout;
    }

    /// List available tools, following pagination cursors.
    ///
    /// Every call re-queries the server.
    pub async fn list_tools(&mut self) -> Result<Vec<Tool>> {
        self.ensure_initialized()?;

        let mut tools = Vec::new();
        let mut cursor = None;
        loop {
            let page: ListToolsResult = self
                .request("tools/list", Some(ListToolsParams { cursor }))
                .await?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }
        Ok(tools)
    }

    /// Call a tool by name.
    ///
    /// A result flagged `isError` is returned as [`Error::ToolCallFailed`].
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<CallToolResult> {
        self.ensure_initialized()?;

        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };

        let result: CallToolResult = self.request("tools/call", Some(params)).await?;

        if result.is_error {
            return Err(Error::ToolCallFailed(result.text()));
        }

        Ok(result)
    }

    /// Close the session, terminating a spawned server process.
    pub async fn shutdown(self) -> Result<()> {
        self.transport.close().await
    }

    // --- Internal methods ---

    fn ensure_initialized(&self) -> Result<()> {
        if self.server_info.is_none() {
            return Err(Error::NotInitialized);
        }
        Ok(())
    }

    fn next_request_id(&mut self) -> RequestId {
        let id = RequestId::Number(self.next_id);
        self.next_id += 1;
        id
    }

    async fn request<P, R>(&mut self, method: &str, params: Option<P>) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let id = self.next_request_id();
        let mut request = JsonRpcRequest::call(id.clone(), method);
        if let Some(p) = params {
            request = request.with_params(p)?;
        }

        let request_json = serde_json::to_string(&request)?;
        self.transport.send(&request_json).await?;

        let after = self.timeout;
        let response = timeout(after, self.read_response(&id))
            .await
            .map_err(|_| Error::Timeout {
                method: method.to_string(),
                after,
            })??;

        let result_value = response.into_result()?;
        let result: R = serde_json::from_value(result_value)
            .map_err(|e| Error::InvalidResponse(format!("{method}: {e}")))?;

        Ok(result)
    }

    async fn notify(&mut self, notification: JsonRpcRequest) -> Result<()> {
        let json = serde_json::to_string(&notification)?;
        self.transport.send(&json).await
    }

    async fn read_response(&mut self, id: &RequestId) -> Result<JsonRpcMessage> {
        loop {
            let line = self.transport.recv().await?;
            let response: JsonRpcMessage = serde_json::from_str(&line)?;

            if let Some(method) = &response.method {
                debug!(method = %method, "ignoring server-initiated message");
                continue;
            }

            match &response.id {
                Some(got) if got == id => return Ok(response),
                other => warn!(expected = ?id, got = ?other, "skipping response with unexpected id"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LineTransport;
    use serde_json::json;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf};

    /// Scripted server end of an in-memory line transport.
    struct Peer {
        lines: tokio::io::Lines<BufReader<ReadHalf<DuplexStream>>>,
        writer: WriteHalf<DuplexStream>,
    }

    impl Peer {
        async fn expect(&mut self, method: &str) -> Value {
            let line = self.lines.next_line().await.unwrap().unwrap();
            let message: Value = serde_json::from_str(&line).unwrap();
            assert_eq!(message["method"], method);
            message
        }

        async fn send(&mut self, message: Value) {
            let mut line = message.to_string();
            line.push('\n');
            self.send_raw(line.as_bytes()).await;
        }

        async fn send_raw(&mut self, bytes: &[u8]) {
            self.writer.write_all(bytes).await.unwrap();
            self.writer.flush().await.unwrap();
        }

        async fn handshake(&mut self) {
            let init = self.expect("initialize").await;
            self.send(json!({
                "jsonrpc": "2.0",
                "id": init["id"],
                "result": {
                    "protocolVersion": "2024-11-05",
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": "inventory", "version": "1.0"}
                }
            }))
            .await;
            self.expect("notifications/initialized").await;
        }
    }

    fn pair() -> (Transport, Peer) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (read_half, write_half) = tokio::io::split(client);
        let (server_read, server_write) = tokio::io::split(server);
        (
            LineTransport::new(read_half, write_half).into(),
            Peer {
                lines: BufReader::new(server_read).lines(),
                writer: server_write,
            },
        )
    }

    #[tokio::test]
    async fn initialize_and_list_tools_with_pagination() {
        let (transport, mut peer) = pair();
        let server = tokio::spawn(async move {
            peer.handshake().await;

            let first = peer.expect("tools/list").await;
            assert!(first["params"].get("cursor").is_none());
            peer.send(json!({
                "jsonrpc": "2.0",
                "id": first["id"],
                "result": {"tools": [{"name": "a"}], "nextCursor": "page-2"}
            }))
            .await;

            let second = peer.expect("tools/list").await;
            assert_eq!(second["params"]["cursor"], "page-2");
            peer.send(json!({
                "jsonrpc": "2.0",
                "id": second["id"],
                "result": {"tools": [{"name": "b", "inputSchema": {"type": "object"}}]}
            }))
            .await;
        });

        let mut client = Client::initialize(transport, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(client.server_info().unwrap().server_info.name, "inventory");

        let tools = client.list_tools().await.unwrap();
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn call_tool_skips_notifications_and_stale_ids() {
        let (transport, mut peer) = pair();
        let server = tokio::spawn(async move {
            peer.handshake().await;

            let call = peer.expect("tools/call").await;
            assert_eq!(call["params"]["name"], "calculate_inventory");
            assert_eq!(call["params"]["arguments"]["artikel_a"], 3);

            peer.send(json!({"jsonrpc": "2.0", "method": "notifications/message", "params": {}}))
                .await;
            peer.send(json!({"jsonrpc": "2.0", "id": 999, "result": {}})).await;
            peer.send(json!({
                "jsonrpc": "2.0",
                "id": call["id"],
                "result": {"content": [{"type": "text", "text": "{\"bestand\": 43.0}"}]}
            }))
            .await;
        });

        let mut client = Client::initialize(transport, Duration::from_secs(5))
            .await
            .unwrap();
        let mut arguments = Map::new();
        arguments.insert("artikel_a".into(), json!(3));
        arguments.insert("artikel_b".into(), json!(4));

        let result = client
            .call_tool("calculate_inventory", Some(arguments))
            .await
            .unwrap();
        assert_eq!(result.text(), "{\"bestand\": 43.0}");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn error_results_and_rpc_errors() {
        let (transport, mut peer) = pair();
        let server = tokio::spawn(async move {
            peer.handshake().await;

            let call = peer.expect("tools/call").await;
            peer.send(json!({
                "jsonrpc": "2.0",
                "id": call["id"],
                "result": {"content": [{"type": "text", "text": "division by zero"}], "isError": true}
            }))
            .await;

            let call = peer.expect("tools/call").await;
            peer.send(json!({
                "jsonrpc": "2.0",
                "id": call["id"],
                "error": {"code": -32602, "message": "Unknown tool: nope"}
            }))
            .await;
        });

        let mut client = Client::initialize(transport, Duration::from_secs(5))
            .await
            .unwrap();

        match client.call_tool("divide", None).await {
            Err(Error::ToolCallFailed(text)) => assert_eq!(text, "division by zero"),
            other => panic!("unexpected: {other:?}"),
        }
        match client.call_tool("nope", None).await {
            Err(Error::JsonRpc(e)) => assert_eq!(e.code, -32602),
            other => panic!("unexpected: {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn request_times_out_when_server_is_silent() {
        let (transport, mut peer) = pair();
        let server = tokio::spawn(async move {
            let _ = peer.expect("initialize").await;
            // Hold the peer open without answering.
            tokio::time::sleep(Duration::from_millis(500)).await;
        });

        let result = Client::initialize(transport, Duration::from_millis(50)).await;
        assert!(matches!(result, Err(Error::Timeout { method, .. }) if method == "initialize"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn late_answer_split_across_timeout_does_not_corrupt_stream() {
        let (transport, mut peer) = pair();
        let server = tokio::spawn(async move {
            peer.handshake().await;

            let call = peer.expect("tools/call").await;
            let late = json!({
                "jsonrpc": "2.0",
                "id": call["id"],
                "result": {"content": [{"type": "text", "text": "first"}]}
            })
            .to_string();
            let (head, tail) = late.as_bytes().split_at(20);
            peer.send_raw(head).await;
            tokio::time::sleep(Duration::from_millis(300)).await;
            peer.send_raw(tail).await;
            peer.send_raw(b"\n").await;

            let call = peer.expect("tools/call").await;
            peer.send(json!({
                "jsonrpc": "2.0",
                "id": call["id"],
                "result": {"content": [{"type": "text", "text": "second"}]}
            }))
            .await;
        });

        let mut client = Client::initialize(transport, Duration::from_secs(5))
            .await
            .unwrap();

        client.set_timeout(Duration::from_millis(100));
        let result = client.call_tool("slow", None).await;
        assert!(matches!(result, Err(Error::Timeout { method, .. }) if method == "tools/call"));

        // The late answer is read whole and skipped as a stale id.
        client.set_timeout(Duration::from_secs(5));
        let result = client.call_tool("echo", None).await.unwrap();
        assert_eq!(result.text(), "second");
        server.await.unwrap();
    }
}
