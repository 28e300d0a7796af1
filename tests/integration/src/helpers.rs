//! Test helpers for integration tests
//!
//! Provides a running gateway, WebSocket clients that speak envelopes, and config presets.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use futures_util::{SinkExt, StreamExt};
use reqwest::{Client, Response};
use socket_common::{AppConfig, Claims, JwtVerifier};
use socket_gateway::handlers::DirectMessageHandler;
use socket_gateway::hooks::HookSubscription;
use socket_gateway::pipeline::{BroadcastAction, NotifyAllTrigger};
use socket_gateway::{App, AppBuilder, Envelope, Pipeline};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// How long a test waits for a frame before failing
pub const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Secret used by [`secured_config`]
pub const TEST_SECRET: &str = "integration-secret";

/// Config suitable for tests: no idle deadline, small throttle
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.server.port = 0;
    config.session.attempts_allowed = 3;
    config.session.idle_timeout_secs = 0;
    config
}

/// Test config that requires bearer tokens
pub fn secured_config() -> AppConfig {
    let mut config = test_config();
    config.jwt.secret = Some(TEST_SECRET.to_string());
    config
}

/// Sign a token for the given owner with [`TEST_SECRET`]
pub fn token_for(owner_id: &str) -> Result<String> {
    Ok(JwtVerifier::new(TEST_SECRET).sign(&Claims::expiring(owner_id, 300))?)
}

/// The handlers the gateway binary ships with
pub fn sample_app(config: AppConfig) -> AppBuilder {
    App::builder(config)
        .handler("SEND_MESSAGE", DirectMessageHandler::default())
        .pipeline(
            Pipeline::new()
                .on_action(BroadcastAction::ACTION, BroadcastAction)
                .on_trigger(BroadcastAction::TRIGGER, NotifyAllTrigger::default()),
        )
}

/// Test server instance that manages lifecycle
pub struct TestServer {
    pub addr: SocketAddr,
    pub app: App,
    pub client: Client,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    /// Start a gateway with the sample handlers
    pub async fn start() -> Result<Self> {
        Self::start_with(sample_app(test_config()).build()).await
    }

    /// Start a gateway for a prepared app
    pub async fn start_with(app: App) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let served = app.clone();
        let handle = tokio::spawn(async move {
            let shutdown = async {
                shutdown_rx.await.ok();
            };
            socket_gateway::serve_with_shutdown(served, listener, shutdown)
                .await
                .ok();
        });

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            addr,
            app,
            client,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Get base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws/connect", self.addr)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.get(&url).send().await?)
    }

    /// Subscribe to the server's hooks
    pub fn hooks(&self) -> HookSubscription {
        self.app.hooks().subscribe()
    }

    /// Open an anonymous connection and consume its handshake
    pub async fn connect(&self) -> Result<WsClient> {
        WsClient::connect(&self.ws_url(), None).await
    }

    /// Open a connection authenticated as `owner_id`
    pub async fn connect_as(&self, owner_id: &str) -> Result<WsClient> {
        WsClient::connect(&self.ws_url(), Some(&token_for(owner_id)?)).await
    }

    /// Wait until the registry holds exactly `expected` sessions
    pub async fn wait_for_sessions(&self, expected: usize) -> Result<()> {
        let clients = self.app.clients().clone();
        tokio::time::timeout(FRAME_TIMEOUT, async move {
            while clients.session_count() != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .map_err(|_| {
            anyhow!(
                "expected {expected} sessions, found {}",
                self.app.clients().session_count()
            )
        })
    }

    /// Stop accepting and wait for the listener task
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            tx.send(()).ok();
        }
        if let Some(handle) = self.handle.take() {
            handle.await.ok();
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// A WebSocket peer that speaks envelopes
pub struct WsClient {
    pub owner_id: String,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    /// Connect, optionally with a bearer token, and read the `USER_ID` handshake
    pub async fn connect(url: &str, token: Option<&str>) -> Result<Self> {
        let mut request = url.into_client_request()?;
        if let Some(token) = token {
            request.headers_mut().insert(
                header::AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}"))?,
            );
        }

        let (stream, _response) = connect_async(request).await?;
        let mut client = Self {
            owner_id: String::new(),
            stream,
        };

        let handshake = client.recv().await?;
        if handshake.action != "USER_ID" {
            bail!("expected USER_ID handshake, got {}", handshake.action);
        }
        client.owner_id = handshake.payload;

        Ok(client)
    }

    /// Send an envelope
    pub async fn send(&mut self, action: &str, payload: &str) -> Result<()> {
        let json = Envelope::new(action, payload).to_json()?;
        self.send_raw(&json).await
    }

    /// Send a raw text frame
    pub async fn send_raw(&mut self, text: &str) -> Result<()> {
        self.stream.send(Message::Text(text.to_string())).await?;
        Ok(())
    }

    /// Receive the next envelope
    pub async fn recv(&mut self) -> Result<Envelope> {
        loop {
            let message = tokio::time::timeout(FRAME_TIMEOUT, self.stream.next())
                .await
                .map_err(|_| anyhow!("timed out waiting for a frame"))?
                .ok_or_else(|| anyhow!("connection ended"))??;

            match message {
                Message::Text(text) => return Ok(Envelope::from_json(&text)?),
                Message::Close(frame) => bail!("connection closed: {frame:?}"),
                _ => continue,
            }
        }
    }

    /// Wait for the server to end the connection
    pub async fn expect_closed(&mut self) -> Result<()> {
        tokio::time::timeout(FRAME_TIMEOUT, async {
            loop {
                match self.stream.next().await {
                    None | Some(Ok(Message::Close(_)) | Err(_)) => return,
                    Some(Ok(_)) => continue,
                }
            }
        })
        .await
        .map_err(|_| anyhow!("connection still open"))
    }

    /// Send a close frame and drain until the server acknowledges
    pub async fn close(mut self) -> Result<()> {
        self.stream.close(None).await?;
        while let Some(Ok(_)) = self.stream.next().await {}
        Ok(())
    }
}
