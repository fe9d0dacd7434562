use meshroom_client::SessionEvent;
use meshroom_client::mesh::{LinkOrigin, LinkState};
use meshroom_core::ServerMessage;
use std::time::Duration;

use crate::integration::init_tracing;
use crate::utils::{
    Harness, SIGNAL_TIMEOUT_MS, SILENCE_MS, Script, eventually, id, participant, room,
};

#[tokio::test]
async fn test_unknown_inbound_attempt_is_parked() {
    init_tracing();
    let mut h = Harness::joined(1, Some("addr-1"), vec![]).await.expect("joined");

    // Arrives before the server tells us who owns the address.
    h.incoming("addr-9");
    let control = h.control.clone();
    assert!(eventually(SIGNAL_TIMEOUT_MS, || {
        let control = control.clone();
        async move { control.snapshot().await.is_ok_and(|s| s.parked_attempts == 1) }
    })
    .await);
    assert!(h.snapshot().await.unwrap().links.is_empty());

    h.server_send(ServerMessage::ParticipantJoined {
        room_id: room("r1"),
        participant: participant(9, Some("addr-9")),
    });
    let event = h
        .expect_event(|e| matches!(e, SessionEvent::LinkEstablished { .. }))
        .await
        .expect("parked attempt adopted");
    assert_eq!(
        event,
        SessionEvent::LinkEstablished {
            remote: id(9),
            origin: LinkOrigin::Inbound,
        }
    );

    // Adopting the parked attempt means no outbound one is opened.
    assert!(h.transport.initiated().is_empty());
    let snapshot = h.snapshot().await.unwrap();
    assert_eq!(snapshot.links.len(), 1);
    assert_eq!(snapshot.parked_attempts, 0);
}

#[tokio::test]
async fn test_repeated_inbound_attempt_replaces_link() {
    init_tracing();
    let mut h = Harness::joined(2, Some("addr-2"), vec![participant(1, Some("addr-1"))])
        .await
        .expect("joined");

    h.incoming("addr-1");
    h.expect_event(|e| matches!(e, SessionEvent::LinkEstablished { .. }))
        .await
        .expect("first link");
    h.incoming("addr-1");
    h.expect_event(|e| matches!(e, SessionEvent::LinkEstablished { .. }))
        .await
        .expect("second link");

    let accepted = h.transport.accepted();
    assert_eq!(accepted.len(), 2);
    let first_link = accepted[0].0;

    let transport = h.transport.clone();
    assert!(eventually(SIGNAL_TIMEOUT_MS, || {
        let transport = transport.clone();
        async move { transport.closed() == vec![first_link] }
    })
    .await);

    let snapshot = h.snapshot().await.unwrap();
    assert_eq!(snapshot.links.len(), 1);
    assert_eq!(snapshot.link_state(&id(1)), LinkState::Established);
}

#[tokio::test]
async fn test_established_link_survives_failed_reattempt() {
    init_tracing();
    let mut h = Harness::joined(2, Some("addr-2"), vec![participant(1, Some("addr-1"))])
        .await
        .expect("joined");

    h.incoming("addr-1");
    h.expect_event(|e| matches!(e, SessionEvent::LinkEstablished { .. }))
        .await
        .expect("first link");

    h.transport.script("addr-1", Script::Fail);
    h.incoming("addr-1");
    let transport = h.transport.clone();
    assert!(eventually(SIGNAL_TIMEOUT_MS, || {
        let transport = transport.clone();
        async move { transport.accepted().len() == 2 }
    })
    .await);
    tokio::time::sleep(Duration::from_millis(SILENCE_MS)).await;

    let snapshot = h.snapshot().await.unwrap();
    assert_eq!(snapshot.links.len(), 1);
    assert_eq!(snapshot.link_state(&id(1)), LinkState::Established);
    assert!(h.transport.closed().is_empty());
}

#[tokio::test]
async fn test_inbound_attempt_supersedes_pending_outbound() {
    init_tracing();
    let mut h = Harness::start(1);
    h.transport.script("addr-2", Script::Hang);
    h.welcome().await.expect("join");
    h.address_ready("addr-1");
    h.server_send(ServerMessage::RoomSnapshot {
        room_id: room("r1"),
        participants: vec![participant(2, Some("addr-2"))],
    });

    let transport = h.transport.clone();
    assert!(eventually(SIGNAL_TIMEOUT_MS, || {
        let transport = transport.clone();
        async move { transport.initiated().len() == 1 }
    })
    .await);

    // The remote dials as well, and its attempt goes through.
    h.transport.script("addr-2", Script::Succeed);
    h.incoming("addr-2");
    let event = h
        .expect_event(|e| matches!(e, SessionEvent::LinkEstablished { .. }))
        .await
        .expect("inbound link");
    assert_eq!(
        event,
        SessionEvent::LinkEstablished {
            remote: id(2),
            origin: LinkOrigin::Inbound,
        }
    );

    let transport = h.transport.clone();
    assert!(eventually(SIGNAL_TIMEOUT_MS, || {
        let transport = transport.clone();
        async move { transport.abandoned() == 1 }
    })
    .await);

    tokio::time::sleep(Duration::from_millis(SILENCE_MS)).await;
    let snapshot = h.snapshot().await.unwrap();
    assert_eq!(snapshot.links.len(), 1);
    assert_eq!(snapshot.link_state(&id(2)), LinkState::Established);
    assert!(h.transport.closed().is_empty());
    assert_eq!(h.transport.initiated().len(), 1);
}

#[tokio::test]
async fn test_parked_attempt_declined_on_leave() {
    init_tracing();
    let h = Harness::joined(1, Some("addr-1"), vec![]).await.expect("joined");

    h.incoming("addr-9");
    let control = h.control.clone();
    assert!(eventually(SIGNAL_TIMEOUT_MS, || {
        let control = control.clone();
        async move { control.snapshot().await.is_ok_and(|s| s.parked_attempts == 1) }
    })
    .await);

    h.control.leave().expect("leave");
    let transport = h.transport.clone();
    h.handle.wait().await.expect("session task");
    assert_eq!(transport.declined(), vec!["addr-9".to_string()]);
    assert!(transport.accepted().is_empty());
}
