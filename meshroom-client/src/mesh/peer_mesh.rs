use crate::media::LinkId;
use crate::mesh::{LinkOrigin, LinkState, PeerLink};
use meshroom_core::ConnectionId;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tokio::task::AbortHandle;
use tracing::debug;

/// Decides which side of a pair opens the link: the participant whose
/// connection id sorts first. Both sides compute the same answer, so a pair
/// never produces two links.
pub fn is_initiator(local: ConnectionId, remote: ConnectionId) -> bool {
    local < remote
}

/// Result of handing a finished attempt back to the mesh.
#[derive(Debug)]
pub enum Completion<H> {
    /// The attempt is now the link; `replaced` is the prior link's handle,
    /// which the caller closes.
    Established { replaced: Option<H> },
    /// The attempt was superseded or cancelled; the handle must be closed.
    Stale(H),
}

/// Per-remote link bookkeeping, at most one link per remote participant.
///
/// An attempt toward a remote that already has an established link runs as
/// its replacement: the established link stays current until the attempt
/// succeeds, and survives if it fails.
///
/// Inbound attempts from addresses no known participant owns are parked by
/// address until that participant shows up.
#[derive(Debug)]
pub struct PeerMesh<H, I> {
    links: HashMap<ConnectionId, PeerLink<H>>,
    replacing: HashMap<ConnectionId, PeerLink<H>>,
    parked: HashMap<String, I>,
    next_link: LinkId,
}

impl<H, I> Default for PeerMesh<H, I> {
    fn default() -> Self {
        Self {
            links: HashMap::new(),
            replacing: HashMap::new(),
            parked: HashMap::new(),
            next_link: 1,
        }
    }
}

impl<H, I> PeerMesh<H, I> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new link to `remote`. An attempt that is still connecting is
    /// superseded at once and returned so the caller can tear it down; an
    /// established link is kept until the new attempt completes.
    pub fn begin(&mut self, remote: ConnectionId, origin: LinkOrigin) -> (LinkId, Option<PeerLink<H>>) {
        let link_id = self.next_link;
        self.next_link += 1;
        let link = PeerLink::connecting(remote, link_id, origin);

        let replaced = if self.state(&remote) == LinkState::Established {
            debug!("Link {} to {} pending as replacement", link_id, remote);
            self.replacing.insert(remote, link)
        } else {
            self.links.insert(remote, link)
        };
        if let Some(old) = &replaced {
            debug!(
                "Attempt {} to {} superseded by {:?} link {}",
                old.link_id, remote, origin, link_id
            );
        }
        (link_id, replaced)
    }

    pub fn attach_attempt(&mut self, remote: ConnectionId, link_id: LinkId, attempt: AbortHandle) {
        let link = self
            .links
            .get_mut(&remote)
            .filter(|link| link.link_id == link_id)
            .or_else(|| {
                self.replacing
                    .get_mut(&remote)
                    .filter(|link| link.link_id == link_id)
            });
        match link {
            Some(link) => link.set_attempt(attempt),
            // The link is already gone; nobody will collect the result.
            None => attempt.abort(),
        }
    }

    /// Records a successful attempt if it is still the current one for `remote`.
    pub fn complete(&mut self, remote: ConnectionId, link_id: LinkId, handle: H) -> Completion<H> {
        if let Some(link) = self.links.get_mut(&remote) {
            if link.link_id == link_id && link.state == LinkState::Connecting {
                link.establish(handle);
                return Completion::Established { replaced: None };
            }
        }

        match self.replacing.entry(remote) {
            Entry::Occupied(entry) if entry.get().link_id == link_id => {
                let mut link = entry.remove();
                link.establish(handle);
                let replaced = self
                    .links
                    .insert(remote, link)
                    .and_then(PeerLink::cancel);
                Completion::Established { replaced }
            }
            _ => Completion::Stale(handle),
        }
    }

    /// Drops a failed attempt. Returns false when it was already superseded.
    /// A failed replacement leaves the established link in place.
    pub fn fail(&mut self, remote: ConnectionId, link_id: LinkId) -> bool {
        if let Entry::Occupied(entry) = self.replacing.entry(remote) {
            if entry.get().link_id == link_id {
                entry.remove();
                return true;
            }
        }
        match self.links.entry(remote) {
            Entry::Occupied(entry) if entry.get().link_id == link_id => {
                entry.remove();
                true
            }
            _ => false,
        }
    }

    /// Removes everything held for `remote`. A pending replacement is
    /// aborted; the current link is returned for the caller to close.
    pub fn remove(&mut self, remote: &ConnectionId) -> Option<PeerLink<H>> {
        self.replacing.remove(remote);
        self.links.remove(remote)
    }

    /// Removes the link the transport reported closed. When the current link
    /// goes, a pending replacement takes its place.
    pub fn closed(&mut self, link_id: LinkId) -> Option<PeerLink<H>> {
        let remote = self.remote_for_link(link_id)?;
        if self
            .replacing
            .get(&remote)
            .is_some_and(|link| link.link_id == link_id)
        {
            return self.replacing.remove(&remote);
        }

        let closed = self.links.remove(&remote);
        if let Some(next) = self.replacing.remove(&remote) {
            self.links.insert(remote, next);
        }
        closed
    }

    pub fn remote_for_link(&self, link_id: LinkId) -> Option<ConnectionId> {
        self.links
            .values()
            .chain(self.replacing.values())
            .find(|link| link.link_id == link_id)
            .map(|link| link.remote)
    }

    pub fn has_link(&self, remote: &ConnectionId) -> bool {
        self.links.contains_key(remote)
    }

    pub fn state(&self, remote: &ConnectionId) -> LinkState {
        self.links
            .get(remote)
            .map(|link| link.state)
            .unwrap_or(LinkState::Idle)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn links(&self) -> impl Iterator<Item = &PeerLink<H>> {
        self.links.values()
    }

    /// Holds an inbound attempt until its sender is known. A newer attempt
    /// from the same address replaces the older one.
    pub fn park(&mut self, address: impl Into<String>, incoming: I) -> Option<I> {
        self.parked.insert(address.into(), incoming)
    }

    pub fn unpark(&mut self, address: &str) -> Option<I> {
        self.parked.remove(address)
    }

    pub fn parked_count(&self) -> usize {
        self.parked.len()
    }

    /// Removes every link, pending replacement and parked attempt.
    pub fn drain(&mut self) -> (Vec<PeerLink<H>>, Vec<I>) {
        let links = self
            .links
            .drain()
            .chain(self.replacing.drain())
            .map(|(_, link)| link)
            .collect();
        let parked = self.parked.drain().map(|(_, incoming)| incoming).collect();
        (links, parked)
    }
}
