use crate::engine::{AttemptOutcome, MeshEngine, SessionEvent, SessionState};
use crate::error::MediaError;
use crate::media::{MediaCapture, MediaTransport};
use crate::mesh::{Completion, LinkOrigin, LinkState, is_initiator};
use meshroom_core::ConnectionId;
use tracing::{debug, info, warn};

impl<T, C> MeshEngine<T, C>
where
    T: MediaTransport,
    C: MediaCapture<Stream = T::Stream>,
{
    /// Opens a link to `remote` when this side is the designated initiator
    /// and both addresses are known. Safe to call repeatedly.
    pub(super) fn maybe_initiate(&mut self, remote: ConnectionId) {
        if self.state != SessionState::Joined {
            return;
        }
        let Some(local_id) = self.local_id else {
            return;
        };
        if !is_initiator(local_id, remote) || self.mesh.has_link(&remote) {
            return;
        }
        if !self.local_address.is_ready() {
            debug!("Link to {} waits for the local address", remote);
            return;
        }
        let Some(address) = self
            .presence
            .get(&remote)
            .and_then(|p| p.peer_address.as_ready())
            .map(str::to_owned)
        else {
            debug!("Link to {} waits for its address", remote);
            return;
        };
        let Some(stream) = self.media.as_ref().map(|m| m.stream.clone()) else {
            debug!("No local media, not opening a link to {}", remote);
            return;
        };

        let (link_id, _) = self.mesh.begin(remote, LinkOrigin::Outbound);
        info!("Opening link {} to {} at '{}'", link_id, remote, address);

        let transport = self.transport.clone();
        let outcomes = self.attempts.clone();
        let timeout = self.config.link_timeout;
        let attempt = tokio::spawn(async move {
            let result = tokio::time::timeout(timeout, transport.initiate(link_id, &address, &stream))
                .await
                .unwrap_or(Err(MediaError::Timeout));
            let _ = outcomes.send(AttemptOutcome {
                remote,
                link_id,
                origin: LinkOrigin::Outbound,
                result,
            });
        });
        self.mesh.attach_attempt(remote, link_id, attempt.abort_handle());
    }

    /// Re-checks every known participant, used once the local address resolves.
    pub(super) fn initiate_all(&mut self) {
        for remote in self.presence.ids() {
            self.maybe_initiate(remote);
        }
    }

    pub(super) fn handle_attempt_outcome(&mut self, outcome: AttemptOutcome<T::Handle>) {
        let AttemptOutcome {
            remote,
            link_id,
            origin,
            result,
        } = outcome;

        match result {
            Ok(handle) => match self.mesh.complete(remote, link_id, handle) {
                Completion::Established { replaced } => {
                    info!("Link {} to {} established ({:?})", link_id, remote, origin);
                    if let Some(old) = replaced {
                        debug!("Closing the link replaced by {}", link_id);
                        self.close_handle(old);
                    }
                    self.emit(SessionEvent::LinkEstablished { remote, origin });
                }
                Completion::Stale(handle) => {
                    debug!("Link {} to {} is no longer wanted, closing", link_id, remote);
                    self.close_handle(handle);
                }
            },

            Err(error) => {
                if !self.mesh.fail(remote, link_id) {
                    debug!("Superseded link {} to {} failed: {}", link_id, remote, error);
                } else if self.mesh.state(&remote) == LinkState::Established {
                    warn!(
                        "Replacement link {} to {} failed, keeping the current one: {}",
                        link_id, remote, error
                    );
                } else {
                    warn!("Link {} to {} failed: {}", link_id, remote, error);
                    self.emit(SessionEvent::LinkFailed { remote, error });
                }
            }
        }
    }
}
