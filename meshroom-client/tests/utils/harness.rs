use crate::utils::{ScriptedIncoming, ScriptedTransport};
use anyhow::{Context, Result, bail};
use meshroom_client::media::{DryRunCapture, TransportEvent};
use meshroom_client::{
    MeshEngine, SessionConfig, SessionControl, SessionEvent, SessionHandle, SessionSnapshot,
    SignalingChannel, SignalingPeer,
};
use meshroom_core::{ClientMessage, ConnectionId, Participant, PeerAddress, RoomId, ServerMessage};
use meshroom_server::{AppState, router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Timeout for a single expected frame or event (ms).
pub const SIGNAL_TIMEOUT_MS: u64 = 5000;

/// How long a session must stay quiet to count as "did nothing" (ms).
pub const SILENCE_MS: u64 = 300;

/// Connection ids with a known order.
pub fn id(n: u128) -> ConnectionId {
    ConnectionId(Uuid::from_u128(n))
}

pub fn room(name: &str) -> RoomId {
    RoomId::parse(name).unwrap()
}

pub fn participant(n: u128, address: Option<&str>) -> Participant {
    let address = address.map(PeerAddress::ready).unwrap_or_default();
    Participant::new(id(n), format!("p{n}"), address)
}

/// A session driven by a fake signaling server and a scripted transport.
pub struct Harness {
    pub local_id: ConnectionId,
    pub handle: SessionHandle,
    pub control: SessionControl,
    pub server: SignalingPeer,
    pub transport: Arc<ScriptedTransport>,
    pub capture: Arc<DryRunCapture>,
    pub transport_events: mpsc::UnboundedSender<TransportEvent<ScriptedIncoming>>,
}

impl Harness {
    pub fn start(local: u128) -> Self {
        Self::start_with(local, DryRunCapture::new())
    }

    pub fn start_with(local: u128, capture: DryRunCapture) -> Self {
        let (channel, server) = SignalingChannel::in_memory();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(ScriptedTransport::new());
        let capture = Arc::new(capture);

        let mut config = SessionConfig::new("ws://unused", room("r1"), format!("p{local}"));
        config.link_timeout = Duration::from_secs(30);

        let handle = MeshEngine::start(
            config,
            transport.clone(),
            capture.clone(),
            channel,
            events_rx,
        );

        Self {
            local_id: id(local),
            control: handle.control(),
            handle,
            server,
            transport,
            capture,
            transport_events: events_tx,
        }
    }

    /// Runs the join handshake: welcome, optional address, snapshot.
    pub async fn joined(local: u128, address: Option<&str>, others: Vec<Participant>) -> Result<Self> {
        let mut harness = Self::start(local);
        harness.welcome().await?;

        if let Some(address) = address {
            harness.address_ready(address);
            harness
                .expect_frame(|m| matches!(m, ClientMessage::AnnounceAddress { .. }))
                .await?;
        }

        harness.server_send(ServerMessage::RoomSnapshot {
            room_id: room("r1"),
            participants: others,
        });
        harness
            .expect_event(|e| matches!(e, SessionEvent::Joined { .. }))
            .await?;
        Ok(harness)
    }

    /// Sends the welcome and returns the join frame it triggers.
    pub async fn welcome(&mut self) -> Result<ClientMessage> {
        self.server_send(ServerMessage::Welcome {
            connection_id: self.local_id,
        });
        self.expect_frame(|m| matches!(m, ClientMessage::JoinRoom { .. }))
            .await
    }

    pub fn address_ready(&self, address: &str) {
        let _ = self
            .transport_events
            .send(TransportEvent::AddressReady(address.to_string()));
    }

    pub fn incoming(&self, address: &str) {
        let _ = self
            .transport_events
            .send(TransportEvent::Incoming(ScriptedIncoming::from(address)));
    }

    pub fn server_send(&self, msg: ServerMessage) {
        let _ = self.server.outgoing.send(msg);
    }

    /// Next frame the session sent to the server, skipping ones that don't match.
    pub async fn expect_frame<F>(&mut self, matches: F) -> Result<ClientMessage>
    where
        F: Fn(&ClientMessage) -> bool,
    {
        let deadline = Duration::from_millis(SIGNAL_TIMEOUT_MS);
        tokio::time::timeout(deadline, async {
            while let Some(msg) = self.server.incoming.recv().await {
                if matches(&msg) {
                    return Ok(msg);
                }
            }
            bail!("Signaling channel closed")
        })
        .await
        .context("Timed out waiting for a client frame")?
    }

    /// Next session event, skipping ones that don't match.
    pub async fn expect_event<F>(&mut self, matches: F) -> Result<SessionEvent>
    where
        F: Fn(&SessionEvent) -> bool,
    {
        let deadline = Duration::from_millis(SIGNAL_TIMEOUT_MS);
        tokio::time::timeout(deadline, async {
            while let Some(event) = self.handle.next_event().await {
                if matches(&event) {
                    return Ok(event);
                }
            }
            bail!("Session event stream ended")
        })
        .await
        .context("Timed out waiting for a session event")?
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        Ok(self.control.snapshot().await?)
    }
}

/// Polls `check` until it holds or `timeout_ms` elapses.
pub async fn eventually<F, Fut>(timeout_ms: u64, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = std::time::Instant::now();
    let timeout = Duration::from_millis(timeout_ms);

    loop {
        if check().await {
            return true;
        }
        if start.elapsed() > timeout {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Starts a signaling server on an ephemeral port.
pub async fn start_server() -> Result<(SocketAddr, Arc<AppState>)> {
    let state = Arc::new(AppState::new(16));
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .context("Failed to bind test listener")?;
    let addr = listener.local_addr()?;

    let app = router(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok((addr, state))
}
