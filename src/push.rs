use crate::errors::AppError;
use crate::models::Transaction;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

const EVENTS_CAPACITY: usize = 256;
const COMMANDS_CAPACITY: usize = 32;

/// Topics every asset view asks for.
pub const DEFAULT_TOPICS: [&str; 3] = ["blocks", "stats", "mempool-blocks"];

#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// A transaction of the tracked asset entered the mempool.
    MempoolTransaction(Transaction),
    /// A transaction of the tracked asset was included in a new block.
    BlockTransaction(Transaction),
}

impl PushEvent {
    pub fn txid(&self) -> &str {
        match self {
            PushEvent::MempoolTransaction(tx) | PushEvent::BlockTransaction(tx) => &tx.txid,
        }
    }
}

/// Live subscription lifecycle towards the push backend.
#[async_trait]
pub trait PushService: Send + Sync + 'static {
    async fn want(&self, topics: &[&str]) -> Result<(), AppError>;

    async fn start_track_asset(&self, asset_id: &str) -> Result<(), AppError>;

    async fn stop_tracking_asset(&self) -> Result<(), AppError>;

    /// A fresh receiver; events sent before the call are not replayed.
    fn events(&self) -> broadcast::Receiver<PushEvent>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushCommand {
    Want(Vec<String>),
    TrackAsset(String),
    StopTracking,
}

impl PushCommand {
    pub fn encode(&self) -> String {
        let value = match self {
            PushCommand::Want(topics) => json!({ "action": "want", "data": topics }),
            PushCommand::TrackAsset(asset_id) => json!({ "track-asset": asset_id }),
            PushCommand::StopTracking => json!({ "track-asset": "stop" }),
        };

        value.to_string()
    }
}

#[derive(Deserialize)]
struct ServerMessage {
    #[serde(rename = "address-transactions", default)]
    address_transactions: Vec<Transaction>,
    #[serde(rename = "block-transactions", default)]
    block_transactions: Vec<Transaction>,
}

/// Events carried by one text frame, mempool ones first. Keys the feed does
/// not consume (`blocks`, `mempoolInfo`, ...) are ignored.
pub fn decode_events(text: &str) -> Result<Vec<PushEvent>, serde_json::Error> {
    let message: ServerMessage = serde_json::from_str(text)?;

    let events = message
        .address_transactions
        .into_iter()
        .map(PushEvent::MempoolTransaction)
        .chain(
            message
                .block_transactions
                .into_iter()
                .map(PushEvent::BlockTransaction),
        )
        .collect();

    Ok(events)
}

/// A command plus the signal that it went out on the socket.
struct Outgoing {
    command: PushCommand,
    sent: oneshot::Sender<()>,
}

/// WebSocket client of the explorer's push endpoint.
///
/// Commands resolve only once their frame is written to the socket, so a
/// caller that returns from `stop_tracking_asset` can shut the runtime down.
/// Dropping the client closes the command channel; the connection task
/// flushes what is still queued, sends a close frame and exits.
pub struct WebsocketPush {
    commands: mpsc::Sender<Outgoing>,
    events: broadcast::Sender<PushEvent>,
}

impl WebsocketPush {
    pub async fn connect(ws_url: &str) -> Result<Self, AppError> {
        let (ws_stream, _response) = tokio_tungstenite::connect_async(ws_url).await?;

        info!("push: connected to {}", ws_url);

        let (commands, commands_rx) = mpsc::channel(COMMANDS_CAPACITY);
        let (events, _) = broadcast::channel(EVENTS_CAPACITY);
        tokio::spawn(run_ws_loop(ws_stream, commands_rx, events.clone()));

        Ok(Self { commands, events })
    }

    async fn send(&self, command: PushCommand) -> Result<(), AppError> {
        let closed = || AppError::Push("connection closed".to_string());
        let (sent, delivered) = oneshot::channel();

        self.commands
            .send(Outgoing { command, sent })
            .await
            .map_err(|_| closed())?;

        delivered.await.map_err(|_| closed())
    }
}

#[async_trait]
impl PushService for WebsocketPush {
    async fn want(&self, topics: &[&str]) -> Result<(), AppError> {
        let topics = topics.iter().map(|t| t.to_string()).collect();

        self.send(PushCommand::Want(topics)).await
    }

    async fn start_track_asset(&self, asset_id: &str) -> Result<(), AppError> {
        self.send(PushCommand::TrackAsset(asset_id.to_string())).await
    }

    async fn stop_tracking_asset(&self) -> Result<(), AppError> {
        self.send(PushCommand::StopTracking).await
    }

    fn events(&self) -> broadcast::Receiver<PushEvent> {
        self.events.subscribe()
    }
}

async fn run_ws_loop(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut commands: mpsc::Receiver<Outgoing>,
    events: broadcast::Sender<PushEvent>,
) {
    let (mut sink, mut stream) = ws_stream.split();

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(Outgoing { command, sent }) = command else {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                };

                debug!(?command, "push: sending command");

                if let Err(err) = sink.send(Message::Text(command.encode().into())).await {
                    error!("push: failed to send command: {}", err);
                    break;
                }

                // The caller may have given up waiting.
                let _ = sent.send(());
            },

            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => match decode_events(text.as_str()) {
                    Ok(decoded) => {
                        for event in decoded {
                            // Nobody listening is fine.
                            let _ = events.send(event);
                        }
                    },
                    Err(err) => warn!("push: skipping undecodable frame: {}", err),
                },
                Some(Ok(Message::Close(reason))) => {
                    info!(?reason, "push: server closed the connection");
                    break;
                },
                Some(Ok(_)) => (),
                Some(Err(err)) => {
                    error!("push: connection error: {}", err);
                    break;
                },
                None => break,
            },
        }
    }

    info!("push: event loop finished");
}
