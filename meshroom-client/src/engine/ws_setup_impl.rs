use crate::error::SessionError;
use futures::{SinkExt, StreamExt};
use meshroom_core::{ClientMessage, ServerMessage};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// Typed, ordered frames to and from the signaling server.
pub struct SignalingChannel {
    pub outgoing: mpsc::UnboundedSender<ClientMessage>,
    pub incoming: mpsc::UnboundedReceiver<ServerMessage>,
}

/// The server's end of an in-memory [`SignalingChannel`].
pub struct SignalingPeer {
    pub incoming: mpsc::UnboundedReceiver<ClientMessage>,
    pub outgoing: mpsc::UnboundedSender<ServerMessage>,
}

impl SignalingChannel {
    pub fn in_memory() -> (SignalingChannel, SignalingPeer) {
        let (client_tx, client_rx) = mpsc::unbounded_channel();
        let (server_tx, server_rx) = mpsc::unbounded_channel();

        let channel = SignalingChannel {
            outgoing: client_tx,
            incoming: server_rx,
        };
        let peer = SignalingPeer {
            incoming: client_rx,
            outgoing: server_tx,
        };
        (channel, peer)
    }

    /// Opens a WebSocket to `url` and pumps JSON frames both ways.
    ///
    /// The incoming side closes when the server does; dropping the outgoing
    /// side closes the socket.
    pub async fn connect(url: &str) -> Result<Self, SessionError> {
        let (ws_stream, _) = connect_async(url).await?;
        info!("Connected to signaling server at {}", url);

        let (mut sink, mut stream) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ClientMessage>();
        let (in_tx, in_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let json = match serde_json::to_string(&msg) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to encode {:?}: {}", msg, e);
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(json.into())).await {
                    warn!("Signaling send failed: {}", e);
                    return;
                }
            }
            let _ = sink.close().await;
            debug!("Signaling writer finished");
        });

        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(msg) => {
                            if in_tx.send(msg).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Dropping malformed server frame: {}", e),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Signaling receive failed: {}", e);
                        break;
                    }
                }
            }
            debug!("Signaling reader finished");
        });

        Ok(Self {
            outgoing: out_tx,
            incoming: in_rx,
        })
    }
}
