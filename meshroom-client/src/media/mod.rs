//! Collaborators the session drives but does not implement: local capture
//! and the peer-to-peer media transport.

use crate::error::MediaError;
use async_trait::async_trait;

mod dry_run;

pub use dry_run::*;

/// Identifies one connection attempt for the life of a session.
pub type LinkId = u64;

/// An inbound connection attempt that has not been answered yet.
pub trait IncomingAttempt: Send + Sync + 'static {
    /// The transport address of the remote side.
    fn remote_address(&self) -> &str;
}

/// Events the transport pushes to the session.
#[derive(Debug)]
pub enum TransportEvent<I> {
    /// The local endpoint obtained its own address.
    AddressReady(String),
    Incoming(I),
    /// Media from the remote side of `LinkId` started flowing.
    RemoteStream(LinkId),
    Closed(LinkId),
}

#[async_trait]
pub trait MediaTransport: Send + Sync + 'static {
    type Stream: Clone + Send + Sync + 'static;
    type Handle: Send + Sync + 'static;
    type Incoming: IncomingAttempt;

    /// Opens an outbound connection to `address` sending `local`.
    async fn initiate(
        &self,
        link: LinkId,
        address: &str,
        local: &Self::Stream,
    ) -> Result<Self::Handle, MediaError>;

    /// Answers an inbound attempt with `local`.
    async fn accept(
        &self,
        link: LinkId,
        incoming: Self::Incoming,
        local: &Self::Stream,
    ) -> Result<Self::Handle, MediaError>;

    async fn close(&self, handle: Self::Handle);

    /// Turns down an inbound attempt that will not be answered.
    async fn decline(&self, incoming: Self::Incoming);
}

pub trait MediaTrack: Send + Sync + 'static {
    fn set_enabled(&self, enabled: bool);
    fn is_enabled(&self) -> bool;
}

/// A captured stream and its two tracks.
pub struct LocalMedia<S, T> {
    pub stream: S,
    pub video: T,
    pub audio: T,
}

#[async_trait]
pub trait MediaCapture: Send + Sync + 'static {
    type Stream: Clone + Send + Sync + 'static;
    type Track: MediaTrack;

    async fn acquire(&self) -> Result<LocalMedia<Self::Stream, Self::Track>, MediaError>;

    /// Stops every track of `stream`.
    async fn release(&self, stream: Self::Stream);
}
