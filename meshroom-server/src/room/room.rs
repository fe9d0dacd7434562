use crate::room::room_command::{JoinReply, RoomClosed, RoomCommand};
use crate::room::room_registry::RoomMap;
use crate::signaling::SignalingOutput;
use meshroom_core::{Capabilities, ConnectionId, Participant, PeerAddress, RoomId, ServerMessage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// One room's state, owned by a dedicated task.
///
/// Every mutation and the notifications it causes are produced here, one
/// command at a time, so members observe the room's history in a single
/// order and a joiner's snapshot is always consistent with the join
/// notifications the other members get.
pub struct Room {
    id: RoomId,
    handle_id: u64,
    participants: Vec<Participant>,
    closed: bool,
    command_rx: mpsc::Receiver<RoomCommand>,
    signaling: Arc<dyn SignalingOutput>,
    rooms: RoomMap,
}

impl Room {
    pub(crate) fn new(
        id: RoomId,
        handle_id: u64,
        command_rx: mpsc::Receiver<RoomCommand>,
        signaling: Arc<dyn SignalingOutput>,
        rooms: RoomMap,
    ) -> Self {
        Self {
            id,
            handle_id,
            participants: Vec::new(),
            closed: false,
            command_rx,
            signaling,
            rooms,
        }
    }

    pub async fn run(mut self) {
        info!("Room '{}' event loop started", self.id);

        while let Some(cmd) = self.command_rx.recv().await {
            self.handle_command(cmd).await;

            if self.participants.is_empty() {
                self.shut_down();
                break;
            }
        }

        // Commands that raced into the inbox after the room emptied.
        while let Some(cmd) = self.command_rx.recv().await {
            Self::reject(cmd);
        }

        info!("Room '{}' event loop finished", self.id);
    }

    fn shut_down(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let id = self.handle_id;
        self.rooms.remove_if(&self.id, |_, handle| handle.id == id);
        self.command_rx.close();
        info!("Room '{}' is empty, removed from registry", self.id);
    }

    fn reject(cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join { reply, .. } => {
                let _ = reply.send(Err(RoomClosed));
            }
            RoomCommand::Leave { reply, .. } => {
                let _ = reply.send(false);
            }
            RoomCommand::Members { reply } => {
                let _ = reply.send(Vec::new());
            }
            RoomCommand::SetCapabilities { .. }
            | RoomCommand::SetPeerAddress { .. }
            | RoomCommand::Chat { .. } => {}
        }
    }

    async fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join { participant, reply } => {
                let snapshot = self.join(participant).await;
                let _ = reply.send(snapshot);
            }

            RoomCommand::Leave {
                connection_id,
                reply,
            } => {
                let removed = self.leave(connection_id).await;
                // Unregister before answering so the caller never sees a stale empty room.
                if self.participants.is_empty() {
                    self.shut_down();
                }
                let _ = reply.send(removed);
            }

            RoomCommand::SetCapabilities {
                connection_id,
                capabilities,
            } => self.set_capabilities(connection_id, capabilities).await,

            RoomCommand::SetPeerAddress {
                connection_id,
                peer_address,
            } => self.set_peer_address(connection_id, peer_address).await,

            RoomCommand::Chat {
                connection_id,
                text,
            } => self.relay_chat(connection_id, text).await,

            RoomCommand::Members { reply } => {
                let _ = reply.send(self.participants.clone());
            }
        }
    }

    fn position(&self, connection_id: &ConnectionId) -> Option<usize> {
        self.participants
            .iter()
            .position(|p| &p.connection_id == connection_id)
    }

    fn others(&self, connection_id: &ConnectionId) -> impl Iterator<Item = &Participant> {
        self.participants
            .iter()
            .filter(move |p| &p.connection_id != connection_id)
    }

    async fn join(&mut self, participant: Participant) -> JoinReply {
        let joiner = participant.connection_id;
        let snapshot: Vec<Participant> = self.others(&joiner).cloned().collect();

        if self.position(&joiner).is_some() {
            debug!("{} re-joined room '{}', membership unchanged", joiner, self.id);
        } else {
            info!(
                "{} ('{}') joined room '{}' with {} other member(s)",
                joiner,
                participant.display_name,
                self.id,
                snapshot.len()
            );

            for member in &snapshot {
                let msg = ServerMessage::ParticipantJoined {
                    room_id: self.id.clone(),
                    participant: participant.clone(),
                };
                self.signaling.deliver(member.connection_id, msg).await;
            }

            self.participants.push(participant);
        }

        let msg = ServerMessage::RoomSnapshot {
            room_id: self.id.clone(),
            participants: snapshot.clone(),
        };
        self.signaling.deliver(joiner, msg).await;

        Ok(snapshot)
    }

    async fn leave(&mut self, connection_id: ConnectionId) -> bool {
        let Some(index) = self.position(&connection_id) else {
            return false;
        };
        let left = self.participants.remove(index);
        info!("{} ('{}') left room '{}'", connection_id, left.display_name, self.id);

        for member in &self.participants {
            let msg = ServerMessage::ParticipantLeft {
                room_id: self.id.clone(),
                connection_id,
            };
            self.signaling.deliver(member.connection_id, msg).await;
        }
        true
    }

    async fn set_capabilities(&mut self, connection_id: ConnectionId, capabilities: Capabilities) {
        let Some(index) = self.position(&connection_id) else {
            self.reject_non_member(connection_id, "Toggle").await;
            return;
        };
        if let Some(participant) = self.participants.get_mut(index) {
            participant.capabilities = capabilities;
        }

        for member in self.others(&connection_id) {
            let msg = ServerMessage::ParticipantToggled {
                room_id: self.id.clone(),
                connection_id,
                video_enabled: capabilities.video_enabled,
                audio_enabled: capabilities.audio_enabled,
            };
            self.signaling.deliver(member.connection_id, msg).await;
        }
    }

    async fn set_peer_address(&mut self, connection_id: ConnectionId, peer_address: PeerAddress) {
        if !peer_address.is_ready() {
            debug!("Placeholder address announcement from {} ignored", connection_id);
            return;
        }
        let Some(index) = self.position(&connection_id) else {
            self.reject_non_member(connection_id, "Address").await;
            return;
        };
        if let Some(participant) = self.participants.get_mut(index) {
            participant.peer_address = peer_address.clone();
        }

        for member in self.others(&connection_id) {
            let msg = ServerMessage::PeerAddressReady {
                room_id: self.id.clone(),
                connection_id,
                peer_address: peer_address.clone(),
            };
            self.signaling.deliver(member.connection_id, msg).await;
        }
    }

    async fn relay_chat(&mut self, connection_id: ConnectionId, text: String) {
        let Some(sender_name) = self
            .position(&connection_id)
            .and_then(|i| self.participants.get(i))
            .map(|p| p.display_name.clone())
        else {
            self.reject_non_member(connection_id, "Chat").await;
            return;
        };

        for member in &self.participants {
            let msg = ServerMessage::ChatMessage {
                room_id: self.id.clone(),
                sender_id: connection_id,
                sender_name: sender_name.clone(),
                text: text.clone(),
            };
            self.signaling.deliver(member.connection_id, msg).await;
        }
    }

    async fn reject_non_member(&self, connection_id: ConnectionId, what: &str) {
        warn!("{} from non-member {} in room '{}' dropped", what, connection_id, self.id);
        let msg = ServerMessage::Error {
            reason: not_a_member(&self.id),
        };
        self.signaling.deliver(connection_id, msg).await;
    }
}

pub(crate) fn not_a_member(room_id: &RoomId) -> String {
    format!("not a member of room '{room_id}'")
}
