use meshroom_core::{Capabilities, ConnectionId, Participant, PeerAddress, RoomId};
use std::time::SystemTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteParticipant {
    pub connection_id: ConnectionId,
    pub display_name: String,
    pub peer_address: PeerAddress,
    pub capabilities: Capabilities,
    /// Media from this participant is being received.
    pub has_stream: bool,
}

impl From<Participant> for RemoteParticipant {
    fn from(p: Participant) -> Self {
        Self {
            connection_id: p.connection_id,
            display_name: p.display_name,
            peer_address: p.peer_address,
            capabilities: p.capabilities,
            has_stream: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub room_id: RoomId,
    pub sender_id: ConnectionId,
    pub sender_name: String,
    pub text: String,
    pub received_at: SystemTime,
}

/// The local view of who else is in the room, in arrival order.
#[derive(Debug, Default)]
pub struct Presence {
    members: Vec<RemoteParticipant>,
}

impl Presence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the view with a join snapshot.
    pub fn seed(&mut self, participants: Vec<Participant>) {
        self.members = participants.into_iter().map(RemoteParticipant::from).collect();
    }

    /// Adds a participant, or refreshes the entry of one already present.
    /// Returns true when the participant is new.
    pub fn upsert(&mut self, participant: Participant) -> bool {
        match self.get_mut(&participant.connection_id) {
            Some(existing) => {
                existing.display_name = participant.display_name;
                existing.peer_address = participant.peer_address;
                existing.capabilities = participant.capabilities;
                false
            }
            None => {
                self.members.push(participant.into());
                true
            }
        }
    }

    pub fn remove(&mut self, connection_id: &ConnectionId) -> Option<RemoteParticipant> {
        let index = self
            .members
            .iter()
            .position(|m| &m.connection_id == connection_id)?;
        Some(self.members.remove(index))
    }

    pub fn set_capabilities(&mut self, connection_id: &ConnectionId, capabilities: Capabilities) -> bool {
        self.get_mut(connection_id)
            .map(|m| m.capabilities = capabilities)
            .is_some()
    }

    pub fn set_address(&mut self, connection_id: &ConnectionId, address: PeerAddress) -> bool {
        self.get_mut(connection_id)
            .map(|m| m.peer_address = address)
            .is_some()
    }

    pub fn set_stream(&mut self, connection_id: &ConnectionId, has_stream: bool) -> bool {
        self.get_mut(connection_id)
            .map(|m| m.has_stream = has_stream)
            .is_some()
    }

    pub fn get(&self, connection_id: &ConnectionId) -> Option<&RemoteParticipant> {
        self.members.iter().find(|m| &m.connection_id == connection_id)
    }

    fn get_mut(&mut self, connection_id: &ConnectionId) -> Option<&mut RemoteParticipant> {
        self.members
            .iter_mut()
            .find(|m| &m.connection_id == connection_id)
    }

    /// Finds the participant that owns a ready transport address.
    pub fn by_address(&self, address: &str) -> Option<&RemoteParticipant> {
        self.members
            .iter()
            .find(|m| m.peer_address.as_ready() == Some(address))
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemoteParticipant> {
        self.members.iter()
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        self.members.iter().map(|m| m.connection_id).collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn clear(&mut self) {
        self.members.clear();
    }
}
