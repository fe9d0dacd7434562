use anyhow::{Context, Result, bail};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use meshroom_core::{ClientMessage, ConnectionId, Participant, PeerAddress, RoomId, ServerMessage};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::signal_helpers::{SIGNAL_TIMEOUT_MS, SILENCE_MS};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Raw signaling client speaking the wire protocol over a real socket.
pub struct TestClient {
    /// Id the server assigned in its welcome frame.
    pub connection_id: ConnectionId,
    write: SplitSink<Socket, Message>,
    read: SplitStream<Socket>,
}

impl TestClient {
    /// Connects and consumes the welcome frame.
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let (socket, _) = connect_async(format!("ws://{addr}/ws"))
            .await
            .context("Failed to open WebSocket")?;
        let (write, read) = socket.split();

        let mut client = Self {
            connection_id: ConnectionId::new(),
            write,
            read,
        };

        match client.recv().await? {
            ServerMessage::Welcome { connection_id } => client.connection_id = connection_id,
            other => bail!("Expected welcome, got {:?}", other),
        }
        Ok(client)
    }

    pub async fn send(&mut self, msg: &ClientMessage) -> Result<()> {
        let json = serde_json::to_string(msg)?;
        self.send_raw(&json).await
    }

    pub async fn send_raw(&mut self, text: &str) -> Result<()> {
        self.write
            .send(Message::Text(text.to_string().into()))
            .await
            .context("Failed to send frame")
    }

    /// Next server frame, failing after [`SIGNAL_TIMEOUT_MS`].
    pub async fn recv(&mut self) -> Result<ServerMessage> {
        let timeout = std::time::Duration::from_millis(SIGNAL_TIMEOUT_MS);

        loop {
            let frame = tokio::time::timeout(timeout, self.read.next())
                .await
                .context("Timeout waiting for server frame")?;

            match frame {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(text.as_str()).context("Undecodable frame");
                }
                Some(Ok(Message::Close(_))) | None => bail!("Socket closed"),
                Some(Ok(_)) => continue,
                Some(Err(e)) => bail!("Socket error: {e}"),
            }
        }
    }

    /// Skips frames until one satisfies `pred`.
    pub async fn recv_matching<F>(&mut self, pred: F) -> Result<ServerMessage>
    where
        F: Fn(&ServerMessage) -> bool,
    {
        loop {
            let msg = self.recv().await?;
            if pred(&msg) {
                return Ok(msg);
            }
            tracing::debug!("[TestClient] skipping {:?}", msg);
        }
    }

    /// Returns `true` if nothing arrives within [`SILENCE_MS`].
    pub async fn is_silent(&mut self) -> bool {
        let window = std::time::Duration::from_millis(SILENCE_MS);
        tokio::time::timeout(window, self.read.next()).await.is_err()
    }

    /// Joins `room` and returns the snapshot of members already there.
    pub async fn join(&mut self, room: &str, name: &str) -> Result<Vec<Participant>> {
        let room_id = RoomId::parse(room)?;
        self.send(&ClientMessage::JoinRoom {
            room_id: room_id.clone(),
            display_name: name.to_string(),
            peer_address: PeerAddress::ready(format!("addr-{name}")),
            video_enabled: true,
            audio_enabled: true,
        })
        .await?;

        match self
            .recv_matching(|m| matches!(m, ServerMessage::RoomSnapshot { room_id: r, .. } if *r == room_id))
            .await?
        {
            ServerMessage::RoomSnapshot { participants, .. } => Ok(participants),
            _ => unreachable!(),
        }
    }

    pub async fn close(mut self) -> Result<()> {
        self.write.send(Message::Close(None)).await?;
        Ok(())
    }
}
