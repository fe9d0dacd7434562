use meshroom_client::media::{DryRunCapture, DryRunNetwork, DryRunTransport};
use meshroom_client::mesh::LinkState;
use meshroom_client::{MeshEngine, SessionConfig, SessionControl, SessionEvent, SessionHandle};
use meshroom_core::ConnectionId;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::task::JoinHandle;

use crate::integration::init_tracing;
use crate::utils::{SIGNAL_TIMEOUT_MS, eventually, room, start_server};

/// Consumes the session's events, dialing in for remotes whose transports
/// cannot reach this one, and counts reported link failures.
fn pump(
    mut handle: SessionHandle,
    transport: Arc<DryRunTransport>,
    failures: Arc<AtomicUsize>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut local: Option<ConnectionId> = None;
        while let Some(event) = handle.next_event().await {
            let remotes: Vec<(ConnectionId, String)> = match &event {
                SessionEvent::Joined {
                    connection_id,
                    participants,
                    ..
                } => {
                    local = Some(*connection_id);
                    participants
                        .iter()
                        .filter_map(|p| {
                            p.peer_address
                                .as_ready()
                                .map(|a| (p.connection_id, a.to_string()))
                        })
                        .collect()
                }
                SessionEvent::ParticipantJoined(p) => p
                    .peer_address
                    .as_ready()
                    .map(|a| (p.connection_id, a.to_string()))
                    .into_iter()
                    .collect(),
                SessionEvent::ParticipantAddressReady {
                    connection_id,
                    peer_address,
                } => vec![(*connection_id, peer_address.clone())],
                SessionEvent::LinkFailed { .. } => {
                    failures.fetch_add(1, Ordering::SeqCst);
                    vec![]
                }
                _ => vec![],
            };
            if let Some(local) = local {
                for (remote, address) in remotes {
                    transport.simulate_dial_in(local, remote, &address);
                }
            }
        }
    })
}

async fn start_peer(url: &str, name: &str, failures: Arc<AtomicUsize>) -> (SessionControl, JoinHandle<()>) {
    let network = DryRunNetwork::standalone();
    let (transport, events) = network.endpoint(format!("addr-{name}"));
    let transport = Arc::new(transport);
    let config = SessionConfig::new(url, room("apart"), name);
    let handle = MeshEngine::connect(config, transport.clone(), Arc::new(DryRunCapture::new()), events)
        .await
        .expect("session connects");
    (handle.control(), pump(handle, transport, failures))
}

async fn established(control: &SessionControl) -> usize {
    control
        .snapshot()
        .await
        .map(|s| s.established_links())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_peers_on_separate_networks_link() {
    init_tracing();
    let (addr, _state) = start_server().await.expect("Failed to start server");
    let url = format!("ws://{addr}/ws");
    let failures = Arc::new(AtomicUsize::new(0));

    let (a, a_events) = start_peer(&url, "a", failures.clone()).await;
    let (b, b_events) = start_peer(&url, "b", failures.clone()).await;

    for control in [&a, &b] {
        let control = control.clone();
        assert!(
            eventually(SIGNAL_TIMEOUT_MS, || {
                let control = control.clone();
                async move { established(&control).await == 1 }
            })
            .await,
            "link did not form"
        );
    }
    assert_eq!(failures.load(Ordering::SeqCst), 0);

    let a_id = a.snapshot().await.unwrap().connection_id.unwrap();
    assert_eq!(b.snapshot().await.unwrap().link_state(&a_id), LinkState::Established);

    a.leave().expect("a leaves");
    b.leave().expect("b leaves");
    a_events.await.expect("a events");
    b_events.await.expect("b events");
}
