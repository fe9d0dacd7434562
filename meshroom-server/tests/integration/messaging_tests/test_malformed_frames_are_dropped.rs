use meshroom_core::{ClientMessage, ServerMessage};

use crate::integration::{init_tracing, room};
use crate::utils::{TestClient, start_server};

#[tokio::test]
async fn test_malformed_frames_are_dropped() {
    init_tracing();
    let (addr, state) = start_server().await.expect("Failed to start server");

    let mut a = TestClient::connect(addr).await.expect("connect a");

    for raw in [
        "not json",
        r#"{"op":"join-room","d":{"room_id":"","display_name":"x"}}"#,
        r#"{"op":"dance","d":{}}"#,
    ] {
        a.send_raw(raw).await.expect("send raw");
        let msg = a.recv().await.expect("rejection");
        assert!(matches!(msg, ServerMessage::Error { .. }), "{raw}");
    }
    assert_eq!(state.registry.room_count(), 0);

    // Chat into a room the sender never joined is refused, not relayed.
    let mut b = TestClient::connect(addr).await.expect("connect b");
    b.join("r1", "b").await.expect("b joins");
    a.send(&ClientMessage::SendMessage {
        room_id: room("r1"),
        text: "spam".to_string(),
    })
    .await
    .expect("send chat");
    assert!(matches!(a.recv().await.expect("rejection"), ServerMessage::Error { .. }));
    assert!(b.is_silent().await);

    // The connection survives protocol errors.
    assert!(a.join("r1", "a").await.expect("a joins").len() == 1);
}
