use meshroom_client::mesh::LinkState;
use meshroom_client::{MediaError, SessionEvent};

use crate::integration::init_tracing;
use crate::utils::{Harness, Script, id, participant};

#[tokio::test]
async fn test_failed_attempt_is_reported() {
    init_tracing();
    let mut h = Harness::start(1);
    h.transport.script("addr-2", Script::Fail);
    h.welcome().await.expect("join");
    h.address_ready("addr-1");
    h.server_send(meshroom_core::ServerMessage::RoomSnapshot {
        room_id: crate::utils::room("r1"),
        participants: vec![participant(2, Some("addr-2"))],
    });

    let event = h
        .expect_event(|e| matches!(e, SessionEvent::LinkFailed { .. }))
        .await
        .expect("failure");
    let SessionEvent::LinkFailed { remote, error } = event else {
        unreachable!();
    };
    assert_eq!(remote, id(2));
    assert!(matches!(error, MediaError::Connect { .. }));

    // The failure is not fatal: the participant stays, without a link.
    let snapshot = h.snapshot().await.unwrap();
    assert_eq!(snapshot.participants.len(), 1);
    assert_eq!(snapshot.link_state(&id(2)), LinkState::Idle);
}
