use crate::error::MediaError;
use crate::media::{LinkId, LocalMedia, MediaCapture, MediaTrack, MediaTransport, TransportEvent};
use crate::mesh::{LinkOrigin, LinkState, PeerLink, PeerMesh};
use crate::presence::{ChatMessage, Presence, RemoteParticipant};
use meshroom_core::{Capabilities, ClientMessage, ConnectionId, PeerAddress, RoomId, ServerMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

mod accept_link_impl;
mod handle_signal_impl;
mod handle_transport_impl;
mod init_link_impl;
mod session_handle;
mod teardown_impl;
mod ws_setup_impl;

pub use session_handle::*;
pub use ws_setup_impl::*;

pub const DEFAULT_LINK_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub server_url: String,
    pub room_id: RoomId,
    pub display_name: String,
    /// Upper bound for a single connection attempt.
    pub link_timeout: Duration,
}

impl SessionConfig {
    pub fn new(server_url: impl Into<String>, room_id: RoomId, display_name: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            room_id,
            display_name: display_name.into(),
            link_timeout: DEFAULT_LINK_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Joined,
    Left,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveReason {
    Requested,
    ServerClosed,
    /// Every handle to the session was dropped.
    Abandoned,
}

/// What the session reports to the application.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Joined {
        connection_id: ConnectionId,
        room_id: RoomId,
        participants: Vec<RemoteParticipant>,
    },
    ParticipantJoined(RemoteParticipant),
    ParticipantLeft {
        connection_id: ConnectionId,
    },
    ParticipantToggled {
        connection_id: ConnectionId,
        capabilities: Capabilities,
    },
    /// A participant that joined with a placeholder now has its address.
    ParticipantAddressReady {
        connection_id: ConnectionId,
        peer_address: String,
    },
    LinkEstablished {
        remote: ConnectionId,
        origin: LinkOrigin,
    },
    LinkFailed {
        remote: ConnectionId,
        error: MediaError,
    },
    LinkClosed {
        remote: ConnectionId,
    },
    RemoteStreamReady {
        remote: ConnectionId,
    },
    Chat(ChatMessage),
    /// Local capture failed; the session stays in the room without media.
    MediaUnavailable(MediaError),
    ServerError(String),
    Left(LeaveReason),
}

/// Point-in-time view of a running session.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub connection_id: Option<ConnectionId>,
    pub local_address: PeerAddress,
    pub capabilities: Capabilities,
    pub participants: Vec<RemoteParticipant>,
    pub links: Vec<(ConnectionId, LinkState)>,
    /// Inbound attempts waiting for their sender to become known.
    pub parked_attempts: usize,
}

impl SessionSnapshot {
    pub fn established_links(&self) -> usize {
        self.links
            .iter()
            .filter(|(_, state)| *state == LinkState::Established)
            .count()
    }

    pub fn link_state(&self, remote: &ConnectionId) -> LinkState {
        self.links
            .iter()
            .find(|(id, _)| id == remote)
            .map(|(_, state)| *state)
            .unwrap_or(LinkState::Idle)
    }
}

pub(crate) enum SessionCommand {
    ToggleVideo,
    ToggleAudio,
    SendChat(String),
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Leave,
}

struct AttemptOutcome<H> {
    remote: ConnectionId,
    link_id: LinkId,
    origin: LinkOrigin,
    result: Result<H, MediaError>,
}

/// One participant's session in one room.
///
/// The engine runs as a single task that owns all session state: presence,
/// links and local media. Signaling frames, transport events, finished
/// connection attempts and application commands are multiplexed into that
/// task, so no handler ever races another.
pub struct MeshEngine<T, C>
where
    T: MediaTransport,
    C: MediaCapture<Stream = T::Stream>,
{
    config: SessionConfig,
    state: SessionState,
    local_id: Option<ConnectionId>,
    local_address: PeerAddress,
    capabilities: Capabilities,
    transport: Arc<T>,
    capture: Arc<C>,
    media: Option<LocalMedia<T::Stream, C::Track>>,
    presence: Presence,
    mesh: PeerMesh<T::Handle, T::Incoming>,
    outgoing: mpsc::UnboundedSender<ClientMessage>,
    events: mpsc::UnboundedSender<SessionEvent>,
    attempts: mpsc::UnboundedSender<AttemptOutcome<T::Handle>>,
}

impl<T, C> MeshEngine<T, C>
where
    T: MediaTransport,
    C: MediaCapture<Stream = T::Stream>,
{
    /// Connects to the signaling server at `config.server_url` and starts
    /// the session.
    pub async fn connect(
        config: SessionConfig,
        transport: Arc<T>,
        capture: Arc<C>,
        transport_events: mpsc::UnboundedReceiver<TransportEvent<T::Incoming>>,
    ) -> Result<SessionHandle, crate::SessionError> {
        let signaling = SignalingChannel::connect(&config.server_url).await?;
        Ok(Self::start(config, transport, capture, signaling, transport_events))
    }

    /// Starts the session over an already open signaling channel.
    pub fn start(
        config: SessionConfig,
        transport: Arc<T>,
        capture: Arc<C>,
        signaling: SignalingChannel,
        transport_events: mpsc::UnboundedReceiver<TransportEvent<T::Incoming>>,
    ) -> SessionHandle {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (attempts_tx, attempts_rx) = mpsc::unbounded_channel();

        let engine = Self {
            config,
            state: SessionState::Connecting,
            local_id: None,
            local_address: PeerAddress::Pending,
            capabilities: Capabilities::default(),
            transport,
            capture,
            media: None,
            presence: Presence::new(),
            mesh: PeerMesh::new(),
            outgoing: signaling.outgoing,
            events: events_tx,
            attempts: attempts_tx,
        };

        let task = tokio::spawn(engine.run(
            signaling.incoming,
            transport_events,
            commands_rx,
            attempts_rx,
        ));
        SessionHandle::new(SessionControl::new(commands_tx), events_rx, task)
    }

    async fn run(
        mut self,
        mut signals: mpsc::UnboundedReceiver<ServerMessage>,
        mut transport_events: mpsc::UnboundedReceiver<TransportEvent<T::Incoming>>,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
        mut attempts: mpsc::UnboundedReceiver<AttemptOutcome<T::Handle>>,
    ) -> LeaveReason {
        info!(
            "Session for '{}' in room '{}' starting",
            self.config.display_name, self.config.room_id
        );
        self.acquire_media().await;

        let mut transport_open = true;
        let reason = loop {
            tokio::select! {
                signal = signals.recv() => match signal {
                    Some(msg) => self.handle_signal(msg),
                    None => {
                        warn!("Signaling connection lost");
                        break LeaveReason::ServerClosed;
                    }
                },

                event = transport_events.recv(), if transport_open => match event {
                    Some(event) => self.handle_transport_event(event),
                    None => {
                        warn!("Media transport stopped reporting events");
                        transport_open = false;
                    }
                },

                Some(outcome) = attempts.recv() => self.handle_attempt_outcome(outcome),

                command = commands.recv() => match command {
                    Some(SessionCommand::Leave) => {
                        self.send(ClientMessage::LeaveRoom { room_id: self.config.room_id.clone() });
                        break LeaveReason::Requested;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        self.send(ClientMessage::LeaveRoom { room_id: self.config.room_id.clone() });
                        break LeaveReason::Abandoned;
                    }
                },
            }
        };

        self.teardown(reason).await;
        reason
    }

    async fn acquire_media(&mut self) {
        match self.capture.acquire().await {
            Ok(media) => {
                media.video.set_enabled(self.capabilities.video_enabled);
                media.audio.set_enabled(self.capabilities.audio_enabled);
                self.media = Some(media);
            }
            Err(e) => {
                warn!("Local media unavailable, continuing without it: {}", e);
                self.emit(SessionEvent::MediaUnavailable(e));
            }
        }
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::ToggleVideo => {
                self.capabilities.video_enabled = !self.capabilities.video_enabled;
                if let Some(media) = &self.media {
                    media.video.set_enabled(self.capabilities.video_enabled);
                }
                self.announce_capabilities();
            }

            SessionCommand::ToggleAudio => {
                self.capabilities.audio_enabled = !self.capabilities.audio_enabled;
                if let Some(media) = &self.media {
                    media.audio.set_enabled(self.capabilities.audio_enabled);
                }
                self.announce_capabilities();
            }

            SessionCommand::SendChat(text) => {
                if text.trim().is_empty() {
                    debug!("Ignoring empty chat message");
                    return;
                }
                self.send(ClientMessage::SendMessage {
                    room_id: self.config.room_id.clone(),
                    text,
                });
            }

            SessionCommand::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }

            // Handled by the run loop.
            SessionCommand::Leave => {}
        }
    }

    fn announce_capabilities(&mut self) {
        // Before the join is sent the state rides along with it.
        if self.local_id.is_some() {
            self.send(ClientMessage::toggle(
                self.config.room_id.clone(),
                self.capabilities,
            ));
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            connection_id: self.local_id,
            local_address: self.local_address.clone(),
            capabilities: self.capabilities,
            participants: self.presence.iter().cloned().collect(),
            links: self
                .mesh
                .links()
                .map(|link| (link.remote, link.state))
                .collect(),
            parked_attempts: self.mesh.parked_count(),
        }
    }

    fn send(&self, msg: ClientMessage) {
        if self.outgoing.send(msg).is_err() {
            debug!("Signaling channel closed, frame dropped");
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    /// Tears a link down without waiting for the transport.
    fn close_link(&self, link: PeerLink<T::Handle>) {
        if let Some(handle) = link.cancel() {
            self.close_handle(handle);
        }
    }

    fn close_handle(&self, handle: T::Handle) {
        let transport = self.transport.clone();
        tokio::spawn(async move {
            transport.close(handle).await;
        });
    }

    fn decline(&self, incoming: T::Incoming) {
        let transport = self.transport.clone();
        tokio::spawn(async move {
            transport.decline(incoming).await;
        });
    }
}
