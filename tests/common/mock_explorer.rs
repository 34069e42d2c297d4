use axum::{
    Json, Router,
    extract::{
        Path, RawQuery, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

/// Canned explorer responses, stored as raw JSON so the wire format is
/// what the client really parses.
#[derive(Default)]
pub struct MockData {
    pub assets: HashMap<String, Value>,
    pub failing_assets: HashSet<String>,
    pub first_pages: HashMap<String, Value>,
    pub chain_pages: HashMap<(String, String), Value>,
    pub times: HashMap<String, u64>,
    pub contracts: Value,
}

#[derive(Clone)]
struct MockState {
    data: Arc<MockData>,
    queries: Arc<Mutex<Vec<Vec<String>>>>,
    commands: mpsc::UnboundedSender<String>,
    frames: broadcast::Sender<String>,
}

/// Esplora-style REST API plus push websocket on a random local port.
pub struct MockExplorer {
    pub api_url: String,
    pub assets_url: String,
    pub ws_url: String,
    queries: Arc<Mutex<Vec<Vec<String>>>>,
    commands: mpsc::UnboundedReceiver<String>,
    frames: broadcast::Sender<String>,
}

impl MockExplorer {
    pub async fn start(data: MockData) -> Self {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (frames, _) = broadcast::channel(16);
        let queries = Arc::new(Mutex::new(vec![]));

        let state = MockState {
            data: Arc::new(data),
            queries: queries.clone(),
            commands: commands_tx,
            frames: frames.clone(),
        };

        let mock_app = Router::new()
            .route("/api/asset/{asset_id}", get(asset))
            .route("/api/asset/{asset_id}/txs", get(first_page))
            .route("/api/asset/{asset_id}/txs/chain/{anchor}", get(chain_page))
            .route("/api/v1/transaction-times", get(transaction_times))
            .route("/api/v1/ws", get(push))
            .route("/resources/assets.minimal.json", get(contracts))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, mock_app).await.unwrap();
        });

        Self {
            api_url: format!("http://{addr}/api"),
            assets_url: format!("http://{addr}/resources/assets.minimal.json"),
            ws_url: format!("ws://{addr}/api/v1/ws"),
            queries,
            commands,
            frames,
        }
    }

    /// Txid lists of every `transaction-times` request, in arrival order.
    pub fn transaction_time_queries(&self) -> Vec<Vec<String>> {
        self.queries.lock().unwrap().clone()
    }

    /// Next text frame a push client sent, parsed.
    pub async fn next_command(&mut self) -> Value {
        let raw = tokio::time::timeout(Duration::from_secs(5), self.commands.recv())
            .await
            .expect("no push command arrived")
            .expect("push endpoint is gone");

        serde_json::from_str(&raw).expect("push command is not JSON")
    }

    /// Sends `frame` to every connected push client.
    pub fn push_frame(&self, frame: Value) {
        self.frames
            .send(frame.to_string())
            .expect("no push client connected");
    }
}

fn json_or_404(value: Option<&Value>) -> Response {
    match value {
        Some(value) => Json(value.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

async fn asset(State(state): State<MockState>, Path(asset_id): Path<String>) -> Response {
    if state.data.failing_assets.contains(&asset_id) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "database unavailable").into_response();
    }

    json_or_404(state.data.assets.get(&asset_id))
}

async fn first_page(State(state): State<MockState>, Path(asset_id): Path<String>) -> Response {
    json_or_404(state.data.first_pages.get(&asset_id))
}

async fn chain_page(
    State(state): State<MockState>,
    Path((asset_id, anchor)): Path<(String, String)>,
) -> Response {
    match state.data.chain_pages.get(&(asset_id, anchor)) {
        Some(page) => Json(page.clone()).into_response(),
        None => Json(Value::Array(vec![])).into_response(),
    }
}

async fn transaction_times(State(state): State<MockState>, RawQuery(query): RawQuery) -> Json<Vec<u64>> {
    let query = query.unwrap_or_default();
    let txids: Vec<String> = url::form_urlencoded::parse(query.as_bytes())
        .filter(|(key, _)| key == "txId[]")
        .map(|(_, txid)| txid.into_owned())
        .collect();

    let times = txids
        .iter()
        .map(|txid| state.data.times.get(txid).copied().unwrap_or(0))
        .collect();

    state.queries.lock().unwrap().push(txids);

    Json(times)
}

async fn contracts(State(state): State<MockState>) -> Json<Value> {
    Json(state.data.contracts.clone())
}

async fn push(ws: WebSocketUpgrade, State(state): State<MockState>) -> Response {
    ws.on_upgrade(move |socket| serve_push(socket, state))
}

async fn serve_push(mut socket: WebSocket, state: MockState) {
    let mut frames = state.frames.subscribe();

    loop {
        tokio::select! {
            message = socket.recv() => match message {
                Some(Ok(Message::Text(text))) => {
                    let _ = state.commands.send(text.to_string());
                },
                Some(Ok(_)) => (),
                _ => break,
            },
            frame = frames.recv() => match frame {
                Ok(frame) => {
                    if socket.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                },
                Err(_) => break,
            },
        }
    }
}
