use crate::room::{Room, RoomCommand};
use crate::signaling::SignalingOutput;
use dashmap::DashMap;
use meshroom_core::{Capabilities, ConnectionId, Participant, PeerAddress, RoomId};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

pub const DEFAULT_ROOM_INBOX: usize = 100;

/// A room whose task keeps shutting down under a joiner is treated as broken.
const JOIN_ATTEMPTS: usize = 8;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("room '{0}' could not accept the join")]
    RoomUnavailable(RoomId),
}

#[derive(Clone)]
pub(crate) struct RoomHandle {
    pub(crate) id: u64,
    pub(crate) tx: mpsc::Sender<RoomCommand>,
}

pub(crate) type RoomMap = Arc<DashMap<RoomId, RoomHandle>>;

/// Map from room id to the task that owns the room.
///
/// Rooms are created on first join and drop out of the map on their own once
/// the last member is gone. Lookups for absent rooms are no-ops.
#[derive(Clone)]
pub struct RoomRegistry {
    rooms: RoomMap,
    signaling: Arc<dyn SignalingOutput>,
    inbox_capacity: usize,
    next_handle: Arc<AtomicU64>,
}

impl RoomRegistry {
    pub fn new(signaling: Arc<dyn SignalingOutput>) -> Self {
        Self::with_inbox_capacity(signaling, DEFAULT_ROOM_INBOX)
    }

    pub fn with_inbox_capacity(signaling: Arc<dyn SignalingOutput>, inbox_capacity: usize) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            signaling,
            inbox_capacity: inbox_capacity.max(1),
            next_handle: Arc::new(AtomicU64::new(0)),
        }
    }

    fn room_sender(&self, room_id: &RoomId) -> Option<mpsc::Sender<RoomCommand>> {
        self.rooms.get(room_id).map(|handle| handle.tx.clone())
    }

    fn get_or_create_room(&self, room_id: &RoomId) -> mpsc::Sender<RoomCommand> {
        if let Some(sender) = self.room_sender(room_id) {
            return sender;
        }

        self.rooms
            .entry(room_id.clone())
            .or_insert_with(|| {
                info!("Creating new room: {}", room_id);
                let (tx, rx) = mpsc::channel(self.inbox_capacity);
                let id = self.next_handle.fetch_add(1, Ordering::Relaxed);

                let room = Room::new(
                    room_id.clone(),
                    id,
                    rx,
                    self.signaling.clone(),
                    self.rooms.clone(),
                );
                tokio::spawn(room.run());

                RoomHandle { id, tx }
            })
            .tx
            .clone()
    }

    /// Registers `participant` in `room_id` and returns the other members.
    ///
    /// Joining twice with the same connection id keeps a single entry.
    pub async fn join(
        &self,
        room_id: &RoomId,
        participant: Participant,
    ) -> Result<Vec<Participant>, RegistryError> {
        for _ in 0..JOIN_ATTEMPTS {
            let sender = self.get_or_create_room(room_id);
            let (reply, reply_rx) = oneshot::channel();
            let cmd = RoomCommand::Join {
                participant: participant.clone(),
                reply,
            };

            if sender.send(cmd).await.is_err() {
                continue;
            }
            match reply_rx.await {
                Ok(Ok(snapshot)) => return Ok(snapshot),
                Ok(Err(_)) | Err(_) => continue,
            }
        }

        warn!("Giving up joining {} to room '{}'", participant.connection_id, room_id);
        Err(RegistryError::RoomUnavailable(room_id.clone()))
    }

    /// Removes the participant; returns whether it was a member.
    pub async fn leave(&self, room_id: &RoomId, connection_id: ConnectionId) -> bool {
        let Some(sender) = self.room_sender(room_id) else {
            return false;
        };
        let (reply, reply_rx) = oneshot::channel();
        let cmd = RoomCommand::Leave {
            connection_id,
            reply,
        };
        if sender.send(cmd).await.is_err() {
            return false;
        }
        reply_rx.await.unwrap_or(false)
    }

    /// Removes `connection_id` from every room and returns the rooms it left.
    pub async fn disconnect_all(&self, connection_id: ConnectionId) -> Vec<RoomId> {
        let room_ids: Vec<RoomId> = self.rooms.iter().map(|e| e.key().clone()).collect();

        let mut affected = Vec::new();
        for room_id in room_ids {
            if self.leave(&room_id, connection_id).await {
                affected.push(room_id);
            }
        }
        affected
    }

    /// The operations below return false when `room_id` does not exist.
    /// A room that exists answers non-members itself.
    pub async fn set_capabilities(
        &self,
        room_id: &RoomId,
        connection_id: ConnectionId,
        capabilities: Capabilities,
    ) -> bool {
        self.send(
            room_id,
            RoomCommand::SetCapabilities {
                connection_id,
                capabilities,
            },
        )
        .await
    }

    pub async fn set_peer_address(
        &self,
        room_id: &RoomId,
        connection_id: ConnectionId,
        peer_address: PeerAddress,
    ) -> bool {
        self.send(
            room_id,
            RoomCommand::SetPeerAddress {
                connection_id,
                peer_address,
            },
        )
        .await
    }

    pub async fn relay_chat(&self, room_id: &RoomId, connection_id: ConnectionId, text: String) -> bool {
        self.send(
            room_id,
            RoomCommand::Chat {
                connection_id,
                text,
            },
        )
        .await
    }

    /// Current members in arrival order; empty for an unknown room.
    pub async fn members(&self, room_id: &RoomId) -> Vec<Participant> {
        let Some(sender) = self.room_sender(room_id) else {
            return Vec::new();
        };
        let (reply, reply_rx) = oneshot::channel();
        if sender.send(RoomCommand::Members { reply }).await.is_err() {
            return Vec::new();
        }
        reply_rx.await.unwrap_or_default()
    }

    pub async fn broadcast_targets(
        &self,
        room_id: &RoomId,
        exclude: Option<ConnectionId>,
    ) -> Vec<ConnectionId> {
        self.members(room_id)
            .await
            .into_iter()
            .map(|p| p.connection_id)
            .filter(|id| Some(*id) != exclude)
            .collect()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn contains_room(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    async fn send(&self, room_id: &RoomId, cmd: RoomCommand) -> bool {
        let Some(sender) = self.room_sender(room_id) else {
            return false;
        };
        sender.send(cmd).await.is_ok()
    }
}
