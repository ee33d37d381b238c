//! Transport seams for both feeds
//!
//! Feed clients only see these traits; production uses tokio-tungstenite for
//! the push socket and reqwest for the SSE body, tests plug in scripted fakes.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::{SinkExt, StreamExt};
use reqwest::header::ACCEPT;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use pricecheck_core::{FeedError, FeedResult};

fn transport<E: std::fmt::Display>(e: E) -> FeedError {
    FeedError::Transport(e.to_string())
}

/// Opens duplex sessions for the push feed
#[async_trait]
pub trait PushConnector: Send + Sync {
    async fn connect(&self, url: &str) -> FeedResult<Box<dyn PushSession>>;
}

/// One open push connection
#[async_trait]
pub trait PushSession: Send {
    async fn send_text(&mut self, text: String) -> FeedResult<()>;

    /// Next inbound text frame, `Ok(None)` once the peer has closed.
    async fn next_text(&mut self) -> FeedResult<Option<String>>;
}

/// Raw body chunks of one streaming response
pub type ChunkStream = BoxStream<'static, FeedResult<Vec<u8>>>;

/// Opens streaming HTTP bodies for the SSE feed
#[async_trait]
pub trait StreamConnector: Send + Sync {
    async fn open(&self, url: &str) -> FeedResult<ChunkStream>;
}

/// WebSocket connector
#[derive(Debug, Default, Clone)]
pub struct WsConnector;

#[async_trait]
impl PushConnector for WsConnector {
    async fn connect(&self, url: &str) -> FeedResult<Box<dyn PushSession>> {
        let (ws_stream, _) = connect_async(url).await.map_err(transport)?;
        Ok(Box::new(WsSession { inner: ws_stream }))
    }
}

pub struct WsSession {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl PushSession for WsSession {
    async fn send_text(&mut self, text: String) -> FeedResult<()> {
        self.inner.send(Message::Text(text)).await.map_err(transport)
    }

    async fn next_text(&mut self) -> FeedResult<Option<String>> {
        while let Some(msg) = self.inner.next().await {
            match msg.map_err(transport)? {
                Message::Text(text) => return Ok(Some(text)),
                Message::Ping(data) => {
                    self.inner.send(Message::Pong(data)).await.map_err(transport)?;
                }
                Message::Close(frame) => {
                    match frame {
                        Some(frame) => info!(
                            "WebSocket closed by server. Code: {}, Reason: {}",
                            u16::from(frame.code),
                            frame.reason
                        ),
                        None => info!("WebSocket closed by server"),
                    }
                    return Ok(None);
                }
                other => debug!("Ignoring non-text frame ({} bytes)", other.len()),
            }
        }
        Ok(None)
    }
}

/// HTTP streaming-body connector
#[derive(Debug, Clone)]
pub struct HttpStreamConnector {
    client: reqwest::Client,
}

impl HttpStreamConnector {
    pub fn new() -> FeedResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("pricecheck/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(transport)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl StreamConnector for HttpStreamConnector {
    async fn open(&self, url: &str) -> FeedResult<ChunkStream> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Transport(format!("HTTP {status}")));
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(transport))
            .boxed())
    }
}
