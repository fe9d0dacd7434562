use crate::media::LinkId;
use meshroom_core::ConnectionId;
use tokio::task::AbortHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    Connecting,
    Established,
    Closed,
}

/// Which side started the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOrigin {
    Outbound,
    Inbound,
}

/// The local side of a media connection to one remote participant.
#[derive(Debug)]
pub struct PeerLink<H> {
    pub remote: ConnectionId,
    pub link_id: LinkId,
    pub origin: LinkOrigin,
    pub state: LinkState,
    handle: Option<H>,
    attempt: Option<AbortHandle>,
}

impl<H> PeerLink<H> {
    pub(crate) fn connecting(remote: ConnectionId, link_id: LinkId, origin: LinkOrigin) -> Self {
        Self {
            remote,
            link_id,
            origin,
            state: LinkState::Connecting,
            handle: None,
            attempt: None,
        }
    }

    pub(crate) fn set_attempt(&mut self, attempt: AbortHandle) {
        self.attempt = Some(attempt);
    }

    pub(crate) fn establish(&mut self, handle: H) {
        self.state = LinkState::Established;
        self.handle = Some(handle);
        self.attempt = None;
    }

    pub fn is_established(&self) -> bool {
        self.state == LinkState::Established
    }

    /// Aborts a pending attempt and hands back the transport handle, if any,
    /// for the caller to close.
    pub fn cancel(mut self) -> Option<H> {
        self.state = LinkState::Closed;
        if let Some(attempt) = self.attempt.take() {
            attempt.abort();
        }
        self.handle.take()
    }
}

impl<H> Drop for PeerLink<H> {
    fn drop(&mut self) {
        if let Some(attempt) = self.attempt.take() {
            attempt.abort();
        }
    }
}
