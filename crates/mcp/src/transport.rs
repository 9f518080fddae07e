//! Message transports: newline-delimited stdio and HTTP+SSE.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use eventsource_stream::{Event, EventStreamError, Eventsource};
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::Url;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::debug;

use crate::error::{Error, Result};

/// Maximum size of a single message (1MB).
/// Sized for large tool outputs (file reads, search results).
pub const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// Default SSE endpoint of a locally running tool server.
pub const DEFAULT_SSE_URL: &str = "http://127.0.0.1:8000/sse";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Where and how to reach an MCP server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum Endpoint {
    /// Spawn a server process and talk over its stdin/stdout.
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
    },
    /// Connect to a server's SSE stream.
    Sse { url: String },
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::Sse {
            url: DEFAULT_SSE_URL.to_string(),
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Stdio { command, args, .. } => {
                write!(f, "stdio:{command}")?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                Ok(())
            }
            Endpoint::Sse { url } => write!(f, "sse:{url}"),
        }
    }
}

/// An open, bidirectional message channel to a server.
pub enum Transport {
    Lines(LineTransport),
    Sse(SseTransport),
}

impl Transport {
    /// Open a transport to the given endpoint.
    pub async fn open(endpoint: &Endpoint) -> Result<Self> {
        match endpoint {
            Endpoint::Stdio { command, args, env } => {
                Ok(Self::Lines(LineTransport::spawn(command, args, env)?))
            }
            Endpoint::Sse { url } => Ok(Self::Sse(SseTransport::connect(url).await?)),
        }
    }

    /// Send one serialized JSON-RPC message.
    pub async fn send(&mut self, message: &str) -> Result<()> {
        match self {
            Transport::Lines(t) => t.send(message).await,
            Transport::Sse(t) => t.send(message).await,
        }
    }

    /// Receive the next serialized JSON-RPC message.
    pub async fn recv(&mut self) -> Result<String> {
        match self {
            Transport::Lines(t) => t.recv().await,
            Transport::Sse(t) => t.recv().await,
        }
    }

    /// Close the transport, terminating a spawned server.
    pub async fn close(self) -> Result<()> {
        match self {
            Transport::Lines(t) => t.close().await,
            Transport::Sse(_) => Ok(()),
        }
    }
}

impl From<LineTransport> for Transport {
    fn from(t: LineTransport) -> Self {
        Self::Lines(t)
    }
}

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// One JSON message per line over a byte stream pair.
///
/// Reads go through a line codec whose buffer lives in the transport, so a
/// `recv` abandoned by a timeout keeps any partially read line for the next
/// one.
pub struct LineTransport {
    lines: FramedRead<BoxedReader, LinesCodec>,
    writer: BoxedWriter,
    child: Option<Child>,
}

impl LineTransport {
    /// Build a transport over arbitrary streams (pipes, sockets, in-memory).
    pub fn new(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        let reader: BoxedReader = Box::new(reader);
        Self {
            lines: FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_OUTPUT_SIZE)),
            writer: Box::new(writer),
            child: None,
        }
    }

    /// Spawn a server process and wire its stdin/stdout.
    pub fn spawn(command: &str, args: &[String], env: &HashMap<String, String>) -> Result<Self> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Io(std::io::Error::other("failed to capture server stdin")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Io(std::io::Error::other("failed to capture server stdout")))?;

        debug!(command, "spawned MCP server process");

        let mut transport = Self::new(stdout, stdin);
        transport.child = Some(child);
        Ok(transport)
    }

    async fn send(&mut self, message: &str) -> Result<()> {
        self.writer.write_all(message.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<String> {
        loop {
            match self.lines.next().await {
                Some(Ok(line)) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        return Ok(line.to_string());
                    }
                }
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    return Err(Error::OutputTooLarge {
                        max: MAX_OUTPUT_SIZE,
                    });
                }
                Some(Err(LinesCodecError::Io(e))) => return Err(e.into()),
                None => return Err(Error::Closed),
            }
        }
    }

    async fn close(mut self) -> Result<()> {
        let _ = self.writer.shutdown().await;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill().await;
        }
        Ok(())
    }
}

type EventStream = BoxStream<'static, std::result::Result<Event, EventStreamError<reqwest::Error>>>;

/// MCP over HTTP: a long-lived `GET` event stream for server messages and
/// `POST` requests to the endpoint the server announces.
pub struct SseTransport {
    http: reqwest::Client,
    events: EventStream,
    post_url: Url,
}

impl SseTransport {
    /// Open the event stream and wait for the `endpoint` event.
    pub async fn connect(url: &str) -> Result<Self> {
        let base = Url::parse(url).map_err(|e| Error::Endpoint(format!("{url}: {e}")))?;
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        let response = http
            .get(base.clone())
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?
            .error_for_status()?;

        let mut transport = Self {
            http,
            events: response.bytes_stream().eventsource().boxed(),
            post_url: base.clone(),
        };

        loop {
            let event = transport.next_event().await?;
            if event.event == "endpoint" {
                transport.post_url = base.join(event.data.trim()).map_err(|e| {
                    Error::Endpoint(format!("bad endpoint event {:?}: {e}", event.data))
                })?;
                break;
            }
            debug!(event = %event.event, "skipping event before endpoint");
        }

        debug!(url = %transport.post_url, "SSE session established");
        Ok(transport)
    }

    async fn send(&mut self, message: &str) -> Result<()> {
        self.http
            .post(self.post_url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(message.to_string())
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<String> {
        loop {
            let event = self.next_event().await?;
            // An event without an `event:` field is a message.
            if event.event.is_empty() || event.event == "message" {
                return Ok(event.data);
            }
            debug!(event = %event.event, "skipping non-message event");
        }
    }

    async fn next_event(&mut self) -> Result<Event> {
        match self.events.next().await {
            Some(Ok(event)) if event.data.len() > MAX_OUTPUT_SIZE => Err(Error::OutputTooLarge {
                max: MAX_OUTPUT_SIZE,
            }),
            Some(Ok(event)) => Ok(event),
            Some(Err(EventStreamError::Transport(e))) => Err(Error::Http(e)),
            Some(Err(e)) => Err(Error::EventStream(e.to_string())),
            None => Err(Error::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
    use tokio::net::{TcpListener, TcpStream};

    #[test]
    fn endpoint_deserializes_sse() {
        let endpoint: Endpoint =
            parse_endpoint(r#"{"transport":"sse","url":"http://127.0.0.1:8000/sse"}"#);
        assert_eq!(endpoint, Endpoint::default());
    }

    #[test]
    fn endpoint_deserializes_stdio_with_defaults() {
        let endpoint: Endpoint = parse_endpoint(r#"{"transport":"stdio","command":"python"}"#);
        assert_eq!(
            endpoint,
            Endpoint::Stdio {
                command: "python".to_string(),
                args: Vec::new(),
                env: HashMap::new(),
            }
        );
        assert_eq!(endpoint.to_string(), "stdio:python");
    }

    fn parse_endpoint(json: &str) -> Endpoint {
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test]
    async fn line_transport_skips_blank_lines() {
        let (client, server) = tokio::io::duplex(1024);
        let (read_half, write_half) = tokio::io::split(client);
        let mut transport = LineTransport::new(read_half, write_half);

        let (server_read, mut server_write) = tokio::io::split(server);
        server_write.write_all(b"\n{\"id\":1}\n").await.unwrap();
        assert_eq!(transport.recv().await.unwrap(), "{\"id\":1}");

        transport.send("{\"id\":2}").await.unwrap();
        let mut lines = BufReader::new(server_read).lines();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "{\"id\":2}");
    }

    #[tokio::test]
    async fn line_transport_reports_exit_on_eof() {
        let (client, server) = tokio::io::duplex(64);
        drop(server);
        let (read_half, write_half) = tokio::io::split(client);
        let mut transport = LineTransport::new(read_half, write_half);
        assert!(matches!(transport.recv().await, Err(Error::Closed)));
    }

    #[tokio::test]
    async fn sse_rejects_malformed_url() {
        assert!(matches!(
            SseTransport::connect("not a url").await,
            Err(Error::Endpoint(_))
        ));
    }

    #[tokio::test]
    async fn line_transport_rejects_oversized_line() {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (read_half, write_half) = tokio::io::split(client);
        let mut transport = LineTransport::new(read_half, write_half);

        let (_server_read, mut server_write) = tokio::io::split(server);
        let writer = tokio::spawn(async move {
            let line = vec![b'x'; MAX_OUTPUT_SIZE + 1];
            let _ = server_write.write_all(&line).await;
            let _ = server_write.write_all(b"\n").await;
        });

        assert!(matches!(
            transport.recv().await,
            Err(Error::OutputTooLarge { max }) if max == MAX_OUTPUT_SIZE
        ));
        drop(transport);
        writer.await.unwrap();
    }

    async fn read_head(stream: &mut TcpStream) -> String {
        let mut head = Vec::new();
        let mut byte = [0u8; 1];
        while !head.ends_with(b"\r\n\r\n") {
            stream.read_exact(&mut byte).await.unwrap();
            head.push(byte[0]);
        }
        String::from_utf8(head).unwrap()
    }

    fn content_length(head: &str) -> usize {
        head.lines()
            .find_map(|line| {
                let line = line.to_ascii_lowercase();
                line.strip_prefix("content-length:")
                    .map(|value| value.trim().parse().unwrap())
            })
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn sse_session_posts_to_announced_endpoint() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/sse", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (mut events, _) = listener.accept().await.unwrap();
            let head = read_head(&mut events).await;
            assert!(head.starts_with("GET /sse "));
            events
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\n\r\n")
                .await
                .unwrap();
            events
                .write_all(b": ping\n\nevent: endpoint\ndata: /messages?session_id=7\n\n")
                .await
                .unwrap();

            let (mut post, _) = listener.accept().await.unwrap();
            let head = read_head(&mut post).await;
            assert!(head.starts_with("POST /messages?session_id=7 "));
            let mut body = vec![0; content_length(&head)];
            post.read_exact(&mut body).await.unwrap();
            post.write_all(b"HTTP/1.1 202 Accepted\r\ncontent-length: 0\r\n\r\n")
                .await
                .unwrap();

            // The answer arrives split across two writes.
            events
                .write_all(b"event: message\ndata: {\"jsonrpc\":\"2.0\",")
                .await
                .unwrap();
            events.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            events
                .write_all(b"\"id\":1,\"result\":{}}\n\n")
                .await
                .unwrap();
            String::from_utf8(body).unwrap()
        });

        let mut transport = SseTransport::connect(&url).await.unwrap();
        assert_eq!(transport.post_url.path(), "/messages");
        assert_eq!(transport.post_url.query(), Some("session_id=7"));

        let request = r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#;
        transport.send(request).await.unwrap();
        assert_eq!(
            transport.recv().await.unwrap(),
            r#"{"jsonrpc":"2.0","id":1,"result":{}}"#
        );
        assert_eq!(server.await.unwrap(), request);

        // The server task dropped the event stream.
        assert!(matches!(transport.recv().await, Err(Error::Closed)));
    }
}
