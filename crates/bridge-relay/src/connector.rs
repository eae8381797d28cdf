//! Transport for the persistent bridge channel.

use crate::{RelayError, RelayResult};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

const CHANNEL_CAPACITY: usize = 100;

/// How long `close` waits for the close frame to be flushed.
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// One open channel to the bridge.
///
/// `inbound` yields text frames; it ends when the bridge closes the channel
/// and yields an error when the transport fails. Dropping the channel stops
/// its background tasks.
pub struct BridgeChannel {
    pub inbound: mpsc::Receiver<RelayResult<String>>,
    outbound: Option<mpsc::Sender<String>>,
    writer: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
}

impl BridgeChannel {
    /// Wrap a pair of queues with no background tasks.
    pub fn new(
        inbound: mpsc::Receiver<RelayResult<String>>,
        outbound: mpsc::Sender<String>,
    ) -> Self {
        Self {
            inbound,
            outbound: Some(outbound),
            writer: None,
            reader: None,
        }
    }

    fn with_tasks(mut self, writer: JoinHandle<()>, reader: JoinHandle<()>) -> Self {
        self.writer = Some(writer);
        self.reader = Some(reader);
        self
    }

    /// Queue a text frame for the bridge.
    pub async fn send(&self, text: String) -> RelayResult<()> {
        let outbound = self.outbound.as_ref().ok_or(RelayError::NotConnected)?;
        outbound
            .send(text)
            .await
            .map_err(|e| RelayError::Send(e.to_string()))
    }

    /// Close the channel and wait briefly for the close frame to go out.
    pub async fn close(mut self) {
        self.outbound.take();
        if let Some(writer) = self.writer.take() {
            if timeout(CLOSE_FLUSH_TIMEOUT, writer).await.is_err() {
                debug!("Channel writer did not finish in time");
            }
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

impl Drop for BridgeChannel {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

impl std::fmt::Debug for BridgeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeChannel")
            .field("open", &self.outbound.is_some())
            .finish_non_exhaustive()
    }
}

/// Opens channels to the bridge.
#[async_trait]
pub trait BridgeConnector: Send + Sync {
    async fn connect(&self, endpoint: &str) -> RelayResult<BridgeChannel>;
}

/// WebSocket transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl BridgeConnector for WebSocketConnector {
    async fn connect(&self, endpoint: &str) -> RelayResult<BridgeChannel> {
        info!(url = %endpoint, "Connecting to bridge");
        let (ws_stream, _) = connect_async(endpoint).await?;
        let (mut write, mut read) = ws_stream.split();

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel::<RelayResult<String>>(CHANNEL_CAPACITY);
        let (pong_tx, mut pong_rx) = mpsc::channel::<Vec<u8>>(8);

        let writer = tokio::spawn(async move {
            loop {
                tokio::select! {
                    text = outbound_rx.recv() => match text {
                        Some(text) => {
                            if write.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        None => {
                            let _ = write.send(Message::Close(None)).await;
                            let _ = write.close().await;
                            break;
                        }
                    },
                    Some(data) = pong_rx.recv() => {
                        if write.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!("Channel writer stopped");
        });

        let reader = tokio::spawn(async move {
            while let Some(msg_result) = read.next().await {
                match msg_result {
                    Ok(Message::Text(text)) => {
                        if inbound_tx.send(Ok(text.to_string())).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Ping(data)) => {
                        let _ = pong_tx.send(data).await;
                    }
                    Ok(Message::Close(frame)) => {
                        info!(?frame, "Bridge closed the channel");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "Bridge channel error");
                        let _ = inbound_tx.send(Err(e.into())).await;
                        break;
                    }
                }
            }
            debug!("Channel reader stopped");
        });

        info!("Connected to bridge");
        Ok(BridgeChannel::new(inbound_rx, outbound_tx).with_tasks(writer, reader))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_send_and_close() {
        let (_inbound_tx, inbound_rx) = mpsc::channel(4);
        let (outbound_tx, mut outbound_rx) = mpsc::channel(4);
        let channel = BridgeChannel::new(inbound_rx, outbound_tx);

        channel.send("hello".to_string()).await.unwrap();
        assert_eq!(outbound_rx.recv().await.as_deref(), Some("hello"));

        channel.close().await;
        assert_eq!(outbound_rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails() {
        let result = WebSocketConnector.connect("ws://127.0.0.1:9/ws").await;
        assert!(result.is_err());
    }
}
