use crate::engine::{LeaveReason, MeshEngine, SessionEvent, SessionState};
use crate::media::{MediaCapture, MediaTransport};
use tracing::{debug, info};

impl<T, C> MeshEngine<T, C>
where
    T: MediaTransport,
    C: MediaCapture<Stream = T::Stream>,
{
    /// Final step on every exit path: cancel attempts, close links, decline
    /// parked attempts, release local media. Nothing is processed afterwards.
    pub(super) async fn teardown(&mut self, reason: LeaveReason) {
        self.state = SessionState::Left;

        let (links, parked) = self.mesh.drain();
        let link_count = links.len();
        for link in links {
            let remote = link.remote;
            if let Some(handle) = link.cancel() {
                debug!("Closing link to {}", remote);
                self.transport.close(handle).await;
            }
        }
        if !parked.is_empty() {
            debug!("Declining {} parked inbound attempt(s)", parked.len());
        }
        for incoming in parked {
            self.transport.decline(incoming).await;
        }
        self.presence.clear();

        if let Some(media) = self.media.take() {
            self.capture.release(media.stream).await;
        }

        info!(
            "Left room '{}' ({:?}), {} link(s) closed",
            self.config.room_id, reason, link_count
        );
        self.emit(SessionEvent::Left(reason));
    }
}
