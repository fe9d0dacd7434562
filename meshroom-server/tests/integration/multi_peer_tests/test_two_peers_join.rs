use meshroom_core::ServerMessage;

use crate::integration::init_tracing;
use crate::utils::{TestClient, start_server};

#[tokio::test]
async fn test_two_peers_join() {
    init_tracing();
    let (addr, _state) = start_server().await.expect("Failed to start server");

    let mut a = TestClient::connect(addr).await.expect("connect a");
    let mut b = TestClient::connect(addr).await.expect("connect b");

    assert!(a.join("r1", "a").await.expect("a joins").is_empty());
    let snapshot = b.join("r1", "b").await.expect("b joins");

    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].connection_id, a.connection_id);
    assert_eq!(snapshot[0].display_name, "a");

    match a.recv().await.expect("join notice") {
        ServerMessage::ParticipantJoined { participant, .. } => {
            assert_eq!(participant.connection_id, b.connection_id);
            assert_eq!(participant.peer_address.as_ready(), Some("addr-b"));
        }
        other => panic!("Expected participant-joined, got {:?}", other),
    }

    // Re-joining is idempotent: same snapshot, no second notice for a.
    let again = b.join("r1", "b").await.expect("b re-joins");
    assert_eq!(again.len(), 1);
    assert!(a.is_silent().await);

    a.close().await.expect("close a");
    b.close().await.expect("close b");
}
