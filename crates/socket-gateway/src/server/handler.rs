//! WebSocket handler
//!
//! Upgrades `/ws/connect`, performs the handshake, and runs the receive loop of one session
//! until the peer leaves, the transport fails, the peer stays silent past the idle deadline,
//! or the throttle trips.

use super::auth::OwnerId;
use super::dispatch::{dispatch_frame, Flow};
use super::App;
use crate::connection::{Session, SessionError};
use crate::hooks::HookType;
use axum::{
    extract::{ws::Message, State, WebSocketUpgrade},
    response::IntoResponse,
};
use futures_util::{Sink, Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// WebSocket upgrade handler
pub async fn connect_handler(
    State(app): State<App>,
    OwnerId(owner_id): OwnerId,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let (sink, stream) = socket.split();
        if let Err(e) = app.start_session(owner_id, sink, stream).await {
            tracing::warn!(error = %e, "Connection dropped before registration");
        }
    })
}

/// What woke the receive loop
enum Wake {
    Frame(Option<Result<Message, axum::Error>>),
    Heartbeat,
}

/// Liveness tracking for one session
struct Heartbeat {
    limit: Duration,
    interval: Interval,
    last_seen: Instant,
}

impl Heartbeat {
    fn new(limit: Duration) -> Self {
        let period = (limit / 2).max(Duration::from_millis(1));
        let now = Instant::now();
        let mut interval = tokio::time::interval_at(now + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            limit,
            interval,
            last_seen: now,
        }
    }

    async fn tick(&mut self) {
        self.interval.tick().await;
    }

    fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    fn expired(&self) -> bool {
        self.last_seen.elapsed() >= self.limit
    }
}

/// How a receive loop ended
#[derive(Debug)]
pub(crate) enum SessionEnd {
    /// Close frame or end of stream
    PeerClosed,
    Transport(String),
    IdleTimeout(Duration),
    Throttled(u32),
}

impl App {
    /// Handshake and register a connection, then run its receive loop on its own task
    ///
    /// Returns as soon as the session is registered. The handle resolves after cleanup.
    ///
    /// # Errors
    /// Returns the handshake failure; the session is then never registered
    pub async fn start_session<Si, St>(
        &self,
        owner_id: String,
        sink: Si,
        stream: St,
    ) -> Result<JoinHandle<()>, SessionError>
    where
        Si: Sink<Message, Error = axum::Error> + Send + 'static,
        St: Stream<Item = Result<Message, axum::Error>> + Unpin + Send + 'static,
    {
        let session = self.open_session(owner_id, sink).await?;
        let app = self.clone();

        Ok(tokio::spawn(async move {
            let end = app.receive_loop(&session, stream).await;
            app.close_session(&session, end).await;
        }))
    }

    /// Handshake, then register and announce the session
    pub(crate) async fn open_session<Si>(
        &self,
        owner_id: String,
        sink: Si,
    ) -> Result<Arc<Session>, SessionError>
    where
        Si: Sink<Message, Error = axum::Error> + Send + 'static,
    {
        let session = Session::with_security(owner_id, sink, self.security());

        if let Err(e) = session.handshake().await {
            session.close().await;
            return Err(e);
        }

        self.clients().add(session.clone());
        self.hooks().emit(HookType::ClientAdded, session.owner_id());

        tracing::info!(
            owner_id = %session.owner_id(),
            session_id = %session.session_id(),
            "WebSocket session established"
        );

        Ok(session)
    }

    /// Read frames in order, each fully dispatched before the next read
    ///
    /// With an idle timeout configured the peer is pinged every half deadline; any inbound
    /// frame, pongs included, counts as activity.
    pub(crate) async fn receive_loop<St>(&self, session: &Arc<Session>, mut stream: St) -> SessionEnd
    where
        St: Stream<Item = Result<Message, axum::Error>> + Unpin,
    {
        let mut heartbeat = self.config().session.idle_timeout().map(Heartbeat::new);

        loop {
            let wake = match heartbeat.as_mut() {
                Some(heartbeat) => tokio::select! {
                    next = stream.next() => Wake::Frame(next),
                    () = heartbeat.tick() => Wake::Heartbeat,
                },
                None => Wake::Frame(stream.next().await),
            };

            let next = match (wake, heartbeat.as_mut()) {
                (Wake::Frame(next), heartbeat) => {
                    if let Some(heartbeat) = heartbeat {
                        heartbeat.touch();
                    }
                    next
                }
                (Wake::Heartbeat, Some(heartbeat)) => {
                    if heartbeat.expired() {
                        return SessionEnd::IdleTimeout(heartbeat.limit);
                    }
                    if let Err(e) = session.ping().await {
                        return SessionEnd::Transport(e.to_string());
                    }
                    continue;
                }
                (Wake::Heartbeat, None) => continue,
            };

            let flow = match next {
                Some(Ok(Message::Text(text))) => dispatch_frame(self, session, text.as_bytes()).await,
                Some(Ok(Message::Binary(bytes))) => dispatch_frame(self, session, &bytes).await,
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    tracing::trace!(session_id = %session.session_id(), "Keep-alive frame");
                    continue;
                }
                Some(Ok(Message::Close(_))) | None => return SessionEnd::PeerClosed,
                Some(Err(e)) => return SessionEnd::Transport(e.to_string()),
            };

            if flow == Flow::Throttled {
                return SessionEnd::Throttled(session.security().attempts_allowed());
            }
        }
    }

    /// Report how the session ended, close it, and deregister it
    pub(crate) async fn close_session(&self, session: &Arc<Session>, end: SessionEnd) {
        let owner_id = session.owner_id();
        let session_id = session.session_id();

        match &end {
            SessionEnd::PeerClosed => {
                tracing::info!(owner_id = %owner_id, session_id = %session_id, "Client closed connection");
                self.hooks().emit(
                    HookType::ClientClosedConnection,
                    format!("connection closed: {owner_id}/{session_id}"),
                );
            }
            SessionEnd::Transport(error) => {
                tracing::warn!(session_id = %session_id, error = %error, "WebSocket error");
                self.hooks().emit(HookType::Error, format!("error in client {session_id}: {error}"));
            }
            SessionEnd::IdleTimeout(limit) => {
                tracing::info!(
                    session_id = %session_id,
                    idle_secs = limit.as_secs(),
                    "Connection timed out"
                );
                self.hooks().emit(
                    HookType::Error,
                    format!("client {session_id} idle for {}s", limit.as_secs()),
                );
            }
            SessionEnd::Throttled(allowed) => {
                tracing::warn!(
                    owner_id = %owner_id,
                    session_id = %session_id,
                    attempts_allowed = allowed,
                    "Too many failed attempts, closing connection"
                );
                self.hooks().emit(
                    HookType::Error,
                    format!("client {session_id} exceeded {allowed} failed attempts"),
                );
            }
        }

        session.close().await;
        self.clients().remove(owner_id, session_id);

        tracing::debug!(
            session_id = %session_id,
            age = ?session.age(),
            "Session cleaned up"
        );
    }
}
