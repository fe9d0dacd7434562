use crate::engine::{MeshEngine, SessionEvent, SessionState};
use crate::media::{MediaCapture, MediaTransport};
use crate::presence::ChatMessage;
use meshroom_core::{Capabilities, ClientMessage, ServerMessage};
use std::time::SystemTime;
use tracing::{debug, info, warn};

impl<T, C> MeshEngine<T, C>
where
    T: MediaTransport,
    C: MediaCapture<Stream = T::Stream>,
{
    pub(super) fn handle_signal(&mut self, msg: ServerMessage) {
        if let Some(room_id) = msg.room_id()
            && room_id != &self.config.room_id
        {
            debug!("Ignoring frame for room '{}'", room_id);
            return;
        }

        match msg {
            ServerMessage::Welcome { connection_id } => {
                if self.local_id.is_some() {
                    warn!("Duplicate welcome ({}) ignored", connection_id);
                    return;
                }
                info!("Received Welcome as {}. Joining room '{}'", connection_id, self.config.room_id);
                self.local_id = Some(connection_id);

                self.send(ClientMessage::JoinRoom {
                    room_id: self.config.room_id.clone(),
                    display_name: self.config.display_name.clone(),
                    peer_address: self.local_address.clone(),
                    video_enabled: self.capabilities.video_enabled,
                    audio_enabled: self.capabilities.audio_enabled,
                });
            }

            ServerMessage::RoomSnapshot {
                room_id,
                participants,
            } => {
                let Some(local_id) = self.local_id else {
                    warn!("Room snapshot before welcome ignored");
                    return;
                };
                self.presence.seed(
                    participants
                        .into_iter()
                        .filter(|p| p.connection_id != local_id)
                        .collect(),
                );
                self.state = SessionState::Joined;
                info!(
                    "Joined room '{}' with {} other participant(s)",
                    room_id,
                    self.presence.len()
                );

                self.emit(SessionEvent::Joined {
                    connection_id: local_id,
                    room_id,
                    participants: self.presence.iter().cloned().collect(),
                });

                for remote in self.presence.ids() {
                    self.adopt_parked(remote);
                    self.maybe_initiate(remote);
                }
            }

            ServerMessage::ParticipantJoined { participant, .. } => {
                let remote = participant.connection_id;
                if Some(remote) == self.local_id {
                    return;
                }

                if self.presence.upsert(participant)
                    && let Some(joined) = self.presence.get(&remote)
                {
                    info!("{} ('{}') joined", remote, joined.display_name);
                    self.emit(SessionEvent::ParticipantJoined(joined.clone()));
                }
                self.adopt_parked(remote);
                self.maybe_initiate(remote);
            }

            ServerMessage::ParticipantToggled {
                connection_id,
                video_enabled,
                audio_enabled,
                ..
            } => {
                let capabilities = Capabilities::new(video_enabled, audio_enabled);
                if self.presence.set_capabilities(&connection_id, capabilities) {
                    self.emit(SessionEvent::ParticipantToggled {
                        connection_id,
                        capabilities,
                    });
                }
            }

            ServerMessage::PeerAddressReady {
                connection_id,
                peer_address,
                ..
            } => {
                let ready = peer_address.as_ready().map(str::to_owned);
                if !self.presence.set_address(&connection_id, peer_address) {
                    debug!("Address for unknown participant {} ignored", connection_id);
                    return;
                }
                if let Some(peer_address) = ready {
                    self.emit(SessionEvent::ParticipantAddressReady {
                        connection_id,
                        peer_address,
                    });
                }
                self.adopt_parked(connection_id);
                self.maybe_initiate(connection_id);
            }

            ServerMessage::ChatMessage {
                room_id,
                sender_id,
                sender_name,
                text,
            } => {
                self.emit(SessionEvent::Chat(ChatMessage {
                    room_id,
                    sender_id,
                    sender_name,
                    text,
                    received_at: SystemTime::now(),
                }));
            }

            ServerMessage::ParticipantLeft { connection_id, .. } => {
                if let Some(link) = self.mesh.remove(&connection_id) {
                    debug!("Closing link {} to departed {}", link.link_id, connection_id);
                    self.close_link(link);
                }
                if self.presence.remove(&connection_id).is_some() {
                    info!("{} left", connection_id);
                    self.emit(SessionEvent::ParticipantLeft { connection_id });
                }
            }

            ServerMessage::Error { reason } => {
                warn!("Server rejected a frame: {}", reason);
                self.emit(SessionEvent::ServerError(reason));
            }
        }
    }
}
