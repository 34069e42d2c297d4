#![allow(dead_code)]

pub mod mock_explorer;

use asset_feed::{
    FeedServices, FeedSession, FeedSettings, FeedState,
    api::{ApiResult, ExplorerApi},
    assets::AssetRegistry,
    errors::{AppError, FeedError},
    models::{Asset, AssetContract, AssetStats, Transaction, TxStatus},
    notifications::{Notification, Notifier},
    push::{PushCommand, PushEvent, PushService},
};
use async_trait::async_trait;
use serde_json::Map;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};

pub const ASSET_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
pub const ASSET_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

static INIT_LOGGING: LazyLock<()> = LazyLock::new(|| {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
});

pub fn initialize_logging() {
    LazyLock::force(&INIT_LOGGING);
}

pub fn confirmed(txid: &str, block_time: u64) -> Transaction {
    Transaction::new(txid, TxStatus::confirmed_at(block_time))
}

pub fn mempool(txid: &str) -> Transaction {
    Transaction::new(txid, TxStatus::unconfirmed())
}

pub fn asset(asset_id: &str, chain: u64, mempool: u64) -> Asset {
    Asset {
        asset_id: asset_id.to_string(),
        chain_stats: AssetStats {
            tx_count: chain,
            extra: Map::new(),
        },
        mempool_stats: AssetStats {
            tx_count: mempool,
            extra: Map::new(),
        },
        extra: Map::new(),
    }
}

pub fn txids(state: &FeedState) -> Vec<String> {
    state
        .transactions
        .as_ref()
        .map(|txs| txs.iter().map(|tx| tx.txid.clone()).collect())
        .unwrap_or_default()
}

/// In-memory explorer. Calls can be held back until the test releases them.
#[derive(Default)]
pub struct FakeExplorer {
    assets: Mutex<HashMap<String, ApiResult<Asset>>>,
    first_pages: Mutex<HashMap<String, ApiResult<Vec<Transaction>>>>,
    next_pages: Mutex<HashMap<(String, String), ApiResult<Vec<Transaction>>>>,
    times: Mutex<HashMap<String, u64>>,
    times_error: Mutex<Option<FeedError>>,
    holds: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeExplorer {
    pub fn with_asset(self, asset: Asset) -> Self {
        self.assets
            .lock()
            .unwrap()
            .insert(asset.asset_id.clone(), Ok(asset));
        self
    }

    pub fn with_asset_error(self, asset_id: &str, err: FeedError) -> Self {
        self.assets
            .lock()
            .unwrap()
            .insert(asset_id.to_string(), Err(err));
        self
    }

    pub fn with_first_page(self, asset_id: &str, page: Vec<Transaction>) -> Self {
        self.first_pages
            .lock()
            .unwrap()
            .insert(asset_id.to_string(), Ok(page));
        self
    }

    pub fn with_next_page(self, asset_id: &str, anchor: &str, page: ApiResult<Vec<Transaction>>) -> Self {
        self.set_next_page(asset_id, anchor, page);
        self
    }

    pub fn set_next_page(&self, asset_id: &str, anchor: &str, page: ApiResult<Vec<Transaction>>) {
        self.next_pages
            .lock()
            .unwrap()
            .insert((asset_id.to_string(), anchor.to_string()), page);
    }

    pub fn with_times(self, times: &[(&str, u64)]) -> Self {
        self.times
            .lock()
            .unwrap()
            .extend(times.iter().map(|(txid, t)| (txid.to_string(), *t)));
        self
    }

    pub fn with_times_error(self, err: FeedError) -> Self {
        *self.times_error.lock().unwrap() = Some(err);
        self
    }

    /// Blocks the next call named `call` (e.g. `asset_transactions:<id>`)
    /// until the returned sender fires or is dropped.
    pub fn hold(&self, call: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.holds.lock().unwrap().insert(call.to_string(), rx);
        tx
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    async fn enter(&self, call: String) {
        self.calls.lock().unwrap().push(call.clone());
        let hold = self.holds.lock().unwrap().remove(&call);
        if let Some(hold) = hold {
            let _ = hold.await;
        }
    }
}

#[async_trait]
impl ExplorerApi for FakeExplorer {
    async fn asset(&self, asset_id: &str) -> ApiResult<Asset> {
        self.enter(format!("asset:{asset_id}")).await;
        self.assets
            .lock()
            .unwrap()
            .get(asset_id)
            .cloned()
            .unwrap_or_else(|| Err(FeedError::not_found()))
    }

    async fn asset_transactions(&self, asset_id: &str) -> ApiResult<Vec<Transaction>> {
        self.enter(format!("asset_transactions:{asset_id}")).await;
        self.first_pages
            .lock()
            .unwrap()
            .get(asset_id)
            .cloned()
            .unwrap_or_else(|| Ok(vec![]))
    }

    async fn asset_transactions_from_hash(
        &self,
        asset_id: &str,
        anchor_txid: &str,
    ) -> ApiResult<Vec<Transaction>> {
        self.enter(format!("asset_transactions_from_hash:{asset_id}:{anchor_txid}"))
            .await;
        self.next_pages
            .lock()
            .unwrap()
            .get(&(asset_id.to_string(), anchor_txid.to_string()))
            .cloned()
            .unwrap_or_else(|| Ok(vec![]))
    }

    async fn transaction_times(&self, txids: &[String]) -> ApiResult<Vec<u64>> {
        self.enter(format!("transaction_times:{}", txids.join(","))).await;
        if let Some(err) = self.times_error.lock().unwrap().clone() {
            return Err(err);
        }
        let times = self.times.lock().unwrap();
        Ok(txids
            .iter()
            .map(|txid| times.get(txid).copied().unwrap_or(0))
            .collect())
    }
}

/// Push backend that records commands and lets the test emit events.
pub struct FakePush {
    commands: Mutex<Vec<PushCommand>>,
    events: broadcast::Sender<PushEvent>,
}

impl Default for FakePush {
    fn default() -> Self {
        let (events, _) = broadcast::channel(64);

        Self {
            commands: Mutex::new(vec![]),
            events,
        }
    }
}

impl FakePush {
    pub fn emit(&self, event: PushEvent) {
        self.events.send(event).expect("live merge is not listening");
    }

    pub fn commands(&self) -> Vec<PushCommand> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushService for FakePush {
    async fn want(&self, topics: &[&str]) -> Result<(), AppError> {
        let topics = topics.iter().map(|t| t.to_string()).collect();
        self.commands.lock().unwrap().push(PushCommand::Want(topics));
        Ok(())
    }

    async fn start_track_asset(&self, asset_id: &str) -> Result<(), AppError> {
        self.commands
            .lock()
            .unwrap()
            .push(PushCommand::TrackAsset(asset_id.to_string()));
        Ok(())
    }

    async fn stop_tracking_asset(&self) -> Result<(), AppError> {
        self.commands.lock().unwrap().push(PushCommand::StopTracking);
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<PushEvent> {
        self.events.subscribe()
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<(Notification, String)>>,
}

impl RecordingNotifier {
    pub fn seen(&self) -> Vec<(Notification, String)> {
        self.seen.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification, _asset_id: &str, txid: &str) {
        self.seen
            .lock()
            .unwrap()
            .push((notification, txid.to_string()));
    }
}

pub struct Harness {
    pub session: FeedSession,
    pub explorer: Arc<FakeExplorer>,
    pub push: Arc<FakePush>,
    pub notifier: Arc<RecordingNotifier>,
}

pub async fn open_session(explorer: FakeExplorer) -> Harness {
    open_session_with(explorer, HashMap::new(), None).await
}

pub async fn open_session_with(
    explorer: FakeExplorer,
    contracts: HashMap<String, AssetContract>,
    native_asset_id: Option<&str>,
) -> Harness {
    initialize_logging();

    let explorer = Arc::new(explorer);
    let push = Arc::new(FakePush::default());
    let notifier = Arc::new(RecordingNotifier::default());

    let services = FeedServices {
        api: explorer.clone(),
        registry: Arc::new(AssetRegistry::from_entries(contracts)),
        push: push.clone(),
        notifier: notifier.clone(),
    };
    let settings = FeedSettings {
        native_asset_id: native_asset_id.map(str::to_string),
    };

    let session = FeedSession::open(services, settings)
        .await
        .expect("session opens");

    Harness {
        session,
        explorer,
        push,
        notifier,
    }
}

/// Waits until the session state satisfies `predicate`.
pub async fn wait_for(session: &FeedSession, predicate: impl FnMut(&FeedState) -> bool) -> FeedState {
    let mut updates = session.subscribe();

    let state = tokio::time::timeout(Duration::from_secs(5), updates.wait_for(predicate))
        .await
        .expect("timed out waiting for the feed")
        .expect("feed state channel closed")
        .clone();
    state
}
