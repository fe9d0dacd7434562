//! In-process media stack with no audio or video: endpoints registered on
//! the same [`DryRunNetwork`] reach each other by address, which is enough to
//! drive the mesh end to end from the CLI and from tests.
//!
//! A [`DryRunNetwork::standalone`] network stands in for remotes living in
//! other processes: dialing an address it does not know succeeds, and
//! [`DryRunTransport::simulate_dial_in`] plays the remote's side of a link
//! the remote would open.

use crate::error::MediaError;
use crate::media::{
    IncomingAttempt, LinkId, LocalMedia, MediaCapture, MediaTrack, MediaTransport, TransportEvent,
};
use crate::mesh::is_initiator;
use async_trait::async_trait;
use dashmap::DashMap;
use meshroom_core::ConnectionId;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::debug;

pub type DryRunEvents = mpsc::UnboundedReceiver<TransportEvent<DryRunIncoming>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DryRunStream {
    pub label: String,
}

#[derive(Debug)]
pub struct DryRunIncoming {
    remote_address: String,
    pub stream: DryRunStream,
}

impl IncomingAttempt for DryRunIncoming {
    fn remote_address(&self) -> &str {
        &self.remote_address
    }
}

#[derive(Debug)]
pub struct DryRunHandle {
    pub link: LinkId,
    pub remote_address: String,
}

#[derive(Clone, Default)]
pub struct DryRunNetwork {
    endpoints: Arc<DashMap<String, mpsc::UnboundedSender<TransportEvent<DryRunIncoming>>>>,
    standalone: bool,
}

impl DryRunNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// A network whose remotes are not registered here.
    pub fn standalone() -> Self {
        Self {
            standalone: true,
            ..Self::default()
        }
    }

    /// Registers an endpoint under `address`. Its address is reported ready
    /// straight away.
    pub fn endpoint(&self, address: impl Into<String>) -> (DryRunTransport, DryRunEvents) {
        let address = address.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(TransportEvent::AddressReady(address.clone()));
        self.endpoints.insert(address.clone(), tx.clone());

        let transport = DryRunTransport {
            address,
            network: self.clone(),
            events: tx,
        };
        (transport, rx)
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }
}

pub struct DryRunTransport {
    address: String,
    network: DryRunNetwork,
    events: mpsc::UnboundedSender<TransportEvent<DryRunIncoming>>,
}

impl DryRunTransport {
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Delivers the inbound attempt `remote` at `address` would open, when
    /// `remote` is the side that dials and lives outside this network.
    /// Returns whether an attempt was delivered.
    pub fn simulate_dial_in(
        &self,
        local: ConnectionId,
        remote: ConnectionId,
        address: &str,
    ) -> bool {
        if !self.network.standalone
            || !is_initiator(remote, local)
            || self.network.endpoints.contains_key(address)
        {
            return false;
        }

        let incoming = DryRunIncoming {
            remote_address: address.to_string(),
            stream: DryRunStream {
                label: address.to_string(),
            },
        };
        debug!("Simulating a dial-in from '{}'", address);
        self.events.send(TransportEvent::Incoming(incoming)).is_ok()
    }
}

impl Drop for DryRunTransport {
    fn drop(&mut self) {
        let events = &self.events;
        self.network
            .endpoints
            .remove_if(&self.address, |_, tx| tx.same_channel(events));
    }
}

#[async_trait]
impl MediaTransport for DryRunTransport {
    type Stream = DryRunStream;
    type Handle = DryRunHandle;
    type Incoming = DryRunIncoming;

    async fn initiate(
        &self,
        link: LinkId,
        address: &str,
        local: &DryRunStream,
    ) -> Result<DryRunHandle, MediaError> {
        let Some(peer) = self.network.endpoints.get(address).map(|e| e.clone()) else {
            if self.network.standalone {
                let _ = self.events.send(TransportEvent::RemoteStream(link));
                debug!("Dry-run link {} opened to remote '{}'", link, address);
                return Ok(DryRunHandle {
                    link,
                    remote_address: address.to_string(),
                });
            }
            return Err(MediaError::Connect {
                address: address.to_string(),
                reason: "no endpoint with this address".to_string(),
            });
        };

        let incoming = DryRunIncoming {
            remote_address: self.address.clone(),
            stream: local.clone(),
        };
        peer.send(TransportEvent::Incoming(incoming))
            .map_err(|_| MediaError::Connect {
                address: address.to_string(),
                reason: "endpoint went away".to_string(),
            })?;

        let _ = self.events.send(TransportEvent::RemoteStream(link));
        debug!("Dry-run link {} opened to '{}'", link, address);
        Ok(DryRunHandle {
            link,
            remote_address: address.to_string(),
        })
    }

    async fn accept(
        &self,
        link: LinkId,
        incoming: DryRunIncoming,
        _local: &DryRunStream,
    ) -> Result<DryRunHandle, MediaError> {
        let _ = self.events.send(TransportEvent::RemoteStream(link));
        debug!("Dry-run link {} accepted from '{}'", link, incoming.remote_address);
        Ok(DryRunHandle {
            link,
            remote_address: incoming.remote_address,
        })
    }

    async fn close(&self, handle: DryRunHandle) {
        debug!(
            "Dry-run link {} to '{}' closed",
            handle.link, handle.remote_address
        );
    }

    async fn decline(&self, incoming: DryRunIncoming) {
        debug!("Dry-run attempt from '{}' declined", incoming.remote_address);
    }
}

/// A track whose state is shared between clones.
#[derive(Debug, Clone)]
pub struct DryRunTrack {
    enabled: Arc<AtomicBool>,
}

impl DryRunTrack {
    fn new() -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl MediaTrack for DryRunTrack {
    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
pub struct DryRunCapture {
    unavailable: bool,
    released: AtomicUsize,
    tracks: Mutex<Option<(DryRunTrack, DryRunTrack)>>,
}

impl DryRunCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// A capture device that always refuses access.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn released_count(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// The video and audio tracks handed out by the last `acquire`.
    pub fn tracks(&self) -> Option<(DryRunTrack, DryRunTrack)> {
        self.tracks.lock().ok().and_then(|t| t.clone())
    }
}

#[async_trait]
impl MediaCapture for DryRunCapture {
    type Stream = DryRunStream;
    type Track = DryRunTrack;

    async fn acquire(&self) -> Result<LocalMedia<DryRunStream, DryRunTrack>, MediaError> {
        if self.unavailable {
            return Err(MediaError::Capture("permission denied".to_string()));
        }

        let (video, audio) = (DryRunTrack::new(), DryRunTrack::new());
        if let Ok(mut tracks) = self.tracks.lock() {
            *tracks = Some((video.clone(), audio.clone()));
        }
        Ok(LocalMedia {
            stream: DryRunStream {
                label: "dry-run".to_string(),
            },
            video,
            audio,
        })
    }

    async fn release(&self, stream: DryRunStream) {
        if let Ok(tracks) = self.tracks.lock()
            && let Some((video, audio)) = tracks.as_ref()
        {
            video.set_enabled(false);
            audio.set_enabled(false);
        }
        self.released.fetch_add(1, Ordering::SeqCst);
        debug!("Released local stream '{}'", stream.label);
    }
}
