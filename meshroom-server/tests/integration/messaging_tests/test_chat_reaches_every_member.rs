use meshroom_core::{ClientMessage, ServerMessage};

use crate::integration::{init_tracing, room};
use crate::utils::{SIGNAL_TIMEOUT_MS, TestClient, eventually, start_server};

#[tokio::test]
async fn test_chat_reaches_every_member() {
    init_tracing();
    let (addr, state) = start_server().await.expect("Failed to start server");

    let mut a = TestClient::connect(addr).await.expect("connect a");
    let mut b = TestClient::connect(addr).await.expect("connect b");
    let mut c = TestClient::connect(addr).await.expect("connect c");
    a.join("r1", "a").await.expect("a joins");
    b.join("r1", "b").await.expect("b joins");
    c.join("r1", "c").await.expect("c joins");

    a.send(&ClientMessage::SendMessage {
        room_id: room("r1"),
        text: "hi".to_string(),
    })
    .await
    .expect("send chat");

    let expected = ServerMessage::ChatMessage {
        room_id: room("r1"),
        sender_id: a.connection_id,
        sender_name: "a".to_string(),
        text: "hi".to_string(),
    };
    for client in [&mut a, &mut b, &mut c] {
        let msg = client
            .recv_matching(|m| matches!(m, ServerMessage::ChatMessage { .. }))
            .await
            .expect("chat message");
        assert_eq!(msg, expected);
        assert!(client.is_silent().await, "exactly one copy");
    }

    for client in [&mut a, &mut b, &mut c] {
        client
            .send(&ClientMessage::LeaveRoom { room_id: room("r1") })
            .await
            .expect("leave");
    }
    let registry = state.registry.clone();
    assert!(eventually(SIGNAL_TIMEOUT_MS, || {
        let registry = registry.clone();
        async move { !registry.contains_room(&room("r1")) }
    })
    .await);

    // Nothing is replayed to a newcomer after everyone left.
    let mut late = TestClient::connect(addr).await.expect("connect late");
    assert!(late.join("r1", "late").await.expect("late joins").is_empty());
    assert!(late.is_silent().await);
}
