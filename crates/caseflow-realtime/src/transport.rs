//! Socket connectors
//!
//! The realtime client talks to a [`Connection`]: a pair of channels carrying
//! text frames and a close code. [`WsConnector`] backs it with a real
//! WebSocket; tests back it with in-memory channels.

use crate::error::TransportError;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::fmt::Debug;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// Close code for a deliberate, clean shutdown
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code reported when the socket dropped without a close frame
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Close code reported when a close frame carried no status
pub const NO_STATUS: u16 = 1005;

/// A socket frame as seen by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Text payload
    Text(String),
    /// Close with an optional code
    Close(Option<u16>),
}

/// An open socket
#[derive(Debug)]
pub struct Connection {
    /// Frames to the server
    pub sink: mpsc::UnboundedSender<Frame>,
    /// Frames from the server; ends with a `Close`
    pub stream: mpsc::UnboundedReceiver<Frame>,
}

/// Opens sockets
#[async_trait]
pub trait Connector: Send + Sync + Debug {
    /// Open a socket to `url`
    ///
    /// # Errors
    /// `TransportError::Connect` if the socket cannot be opened.
    async fn connect(&self, url: &str) -> Result<Connection, TransportError>;
}

/// WebSocket connector backed by tokio-tungstenite
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Connection, TransportError> {
        let (socket, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let (mut write, mut read) = socket.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Frame>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<Frame>();

        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                let message = match frame {
                    Frame::Text(text) => Message::Text(text),
                    Frame::Close(code) => Message::Close(Some(CloseFrame {
                        code: CloseCode::from(code.unwrap_or(NORMAL_CLOSURE)),
                        reason: "".into(),
                    })),
                };
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = write.send(message).await {
                    tracing::warn!("websocket write failed: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = write.close().await;
        });

        tokio::spawn(async move {
            let mut code = ABNORMAL_CLOSURE;
            while let Some(item) = read.next().await {
                match item {
                    Ok(Message::Text(text)) => {
                        if in_tx.send(Frame::Text(text)).is_err() {
                            return;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        code = frame.map_or(NO_STATUS, |f| u16::from(f.code));
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("websocket read failed: {}", e);
                        break;
                    }
                }
            }
            let _ = in_tx.send(Frame::Close(Some(code)));
        });

        Ok(Connection {
            sink: out_tx,
            stream: in_rx,
        })
    }
}
