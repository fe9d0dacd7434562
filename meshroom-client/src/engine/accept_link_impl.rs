use crate::engine::{AttemptOutcome, MeshEngine};
use crate::error::MediaError;
use crate::media::{IncomingAttempt, MediaCapture, MediaTransport};
use crate::mesh::LinkOrigin;
use meshroom_core::ConnectionId;
use tracing::{debug, info, warn};

impl<T, C> MeshEngine<T, C>
where
    T: MediaTransport,
    C: MediaCapture<Stream = T::Stream>,
{
    /// Routes an inbound attempt to the participant that owns its address,
    /// or parks it until that participant becomes known.
    pub(super) fn handle_incoming(&mut self, incoming: T::Incoming) {
        let address = incoming.remote_address().to_string();

        match self.presence.by_address(&address).map(|p| p.connection_id) {
            Some(remote) => self.accept(remote, incoming),
            None => {
                debug!("Parking inbound attempt from unknown address '{}'", address);
                if let Some(older) = self.mesh.park(address, incoming) {
                    debug!("Older parked attempt from the same address declined");
                    self.decline(older);
                }
            }
        }
    }

    /// Accepts a parked attempt from `remote`, if one is waiting.
    pub(super) fn adopt_parked(&mut self, remote: ConnectionId) {
        let Some(address) = self
            .presence
            .get(&remote)
            .and_then(|p| p.peer_address.as_ready())
            .map(str::to_owned)
        else {
            return;
        };

        if let Some(incoming) = self.mesh.unpark(&address) {
            debug!("Adopting parked attempt from {} at '{}'", remote, address);
            self.accept(remote, incoming);
        }
    }

    /// Answers an attempt from `remote`. A newer attempt from the same
    /// participant supersedes one still connecting at once, and replaces an
    /// established link only when it succeeds.
    fn accept(&mut self, remote: ConnectionId, incoming: T::Incoming) {
        let Some(stream) = self.media.as_ref().map(|m| m.stream.clone()) else {
            warn!("Declining link from {}: no local media", remote);
            self.decline(incoming);
            return;
        };

        let (link_id, replaced) = self.mesh.begin(remote, LinkOrigin::Inbound);
        if let Some(old) = replaced {
            info!("Attempt {} to {} superseded by inbound link {}", old.link_id, remote, link_id);
            self.close_link(old);
        } else {
            info!("Accepting link {} from {}", link_id, remote);
        }

        let transport = self.transport.clone();
        let outcomes = self.attempts.clone();
        let timeout = self.config.link_timeout;
        let attempt = tokio::spawn(async move {
            let result = tokio::time::timeout(timeout, transport.accept(link_id, incoming, &stream))
                .await
                .unwrap_or(Err(MediaError::Timeout));
            let _ = outcomes.send(AttemptOutcome {
                remote,
                link_id,
                origin: LinkOrigin::Inbound,
                result,
            });
        });
        self.mesh.attach_attempt(remote, link_id, attempt.abort_handle());
    }
}
