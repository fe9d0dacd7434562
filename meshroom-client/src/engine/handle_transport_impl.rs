use crate::engine::{MeshEngine, SessionEvent};
use crate::media::{MediaCapture, MediaTransport, TransportEvent};
use crate::mesh::LinkState;
use meshroom_core::{ClientMessage, PeerAddress};
use tracing::{debug, info};

impl<T, C> MeshEngine<T, C>
where
    T: MediaTransport,
    C: MediaCapture<Stream = T::Stream>,
{
    pub(super) fn handle_transport_event(&mut self, event: TransportEvent<T::Incoming>) {
        match event {
            TransportEvent::AddressReady(address) => {
                let address = PeerAddress::ready(address);
                if address == self.local_address {
                    return;
                }
                info!("Local peer address ready: {:?}", address);
                self.local_address = address;

                // Once the join is out, the server learns the address separately.
                if self.local_id.is_some() {
                    self.send(ClientMessage::AnnounceAddress {
                        room_id: self.config.room_id.clone(),
                        peer_address: self.local_address.clone(),
                    });
                }
                self.initiate_all();
            }

            TransportEvent::Incoming(incoming) => self.handle_incoming(incoming),

            TransportEvent::RemoteStream(link_id) => {
                let Some(remote) = self.mesh.remote_for_link(link_id) else {
                    debug!("Stream on unknown link {} ignored", link_id);
                    return;
                };
                self.presence.set_stream(&remote, true);
                self.emit(SessionEvent::RemoteStreamReady { remote });
            }

            TransportEvent::Closed(link_id) => {
                let Some(link) = self.mesh.closed(link_id) else {
                    return;
                };
                let remote = link.remote;
                self.close_link(link);
                if self.mesh.state(&remote) == LinkState::Established {
                    debug!("Replacement link {} to {} closed before completing", link_id, remote);
                    return;
                }
                self.presence.set_stream(&remote, false);
                info!("Link {} to {} closed by the transport", link_id, remote);
                self.emit(SessionEvent::LinkClosed { remote });
            }
        }
    }
}
