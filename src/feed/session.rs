use super::state::{Confirmation, EnrichmentRequest, FeedState, LoadMore};
use crate::api::ExplorerApi;
use crate::assets::{AssetRegistry, parse_asset_id};
use crate::errors::{AppError, FeedError};
use crate::notifications::{Notification, Notifier};
use crate::push::{DEFAULT_TOPICS, PushEvent, PushService};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Default)]
pub struct FeedSettings {
    /// Asset id of the chain's native coin, flagged in the asset view.
    pub native_asset_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Ready,
    /// Another navigation started before this one finished; its results
    /// were dropped.
    Superseded,
}

/// Collaborators a session talks to.
#[derive(Clone)]
pub struct FeedServices {
    pub api: Arc<dyn ExplorerApi>,
    pub registry: Arc<AssetRegistry>,
    pub push: Arc<dyn PushService>,
    pub notifier: Arc<dyn Notifier>,
}

struct Shared {
    services: FeedServices,
    settings: FeedSettings,
    state: watch::Sender<FeedState>,
    /// Asset the push backend is tracking for us.
    tracking: Mutex<Option<String>>,
}

/// The transaction feed of whichever asset is being viewed.
///
/// Every navigation starts a new generation. Results of older generations
/// that arrive late are discarded, so only the current asset's data ever
/// reaches the state.
pub struct FeedSession {
    shared: Arc<Shared>,
    live: JoinHandle<()>,
}

impl FeedSession {
    pub async fn open(services: FeedServices, settings: FeedSettings) -> Result<Self, AppError> {
        services.push.want(&DEFAULT_TOPICS).await?;

        let events = services.push.events();
        let (state, _) = watch::channel(FeedState::default());

        let shared = Arc::new(Shared {
            services,
            settings,
            state,
            tracking: Mutex::new(None),
        });

        let live = tokio::spawn(run_live_merge(shared.clone(), events));

        Ok(Self { shared, live })
    }

    pub fn snapshot(&self) -> FeedState {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.shared.state.subscribe()
    }

    /// Switches the feed to `asset_id` and loads it: asset metadata, then
    /// the first page of history with first-seen times for its mempool
    /// entries. A failure ends the cycle and is stored in the state.
    pub async fn navigate(&self, asset_id: &str) -> Result<Navigation, FeedError> {
        let asset_id = asset_id.trim().to_ascii_lowercase();
        let generation = self.shared.begin(asset_id.clone());

        info!(%asset_id, generation, "Loading asset feed");

        self.shared.release_tracking().await;

        match self.shared.load(generation, &asset_id).await {
            Ok(Navigation::Ready) => {
                let state = self.snapshot();
                info!(
                    %asset_id,
                    generation,
                    transactions = state.transaction_count(),
                    loaded = state.loaded_confirmed_count,
                    total = state.total_confirmed_count,
                    "Asset feed ready"
                );
                Ok(Navigation::Ready)
            },
            Ok(Navigation::Superseded) => {
                debug!(%asset_id, generation, "Dropped results of a superseded load");
                Ok(Navigation::Superseded)
            },
            Err(err) => {
                if self.shared.update(generation, |s| s.fail(err.clone())).is_some() {
                    error!(%asset_id, generation, "Asset feed failed to load: {}", err);
                } else {
                    debug!(%asset_id, generation, "Superseded load failed: {}", err);
                }
                Err(err)
            },
        }
    }

    /// Runs the current asset's load cycle again from scratch.
    pub async fn reload(&self) -> Result<Navigation, FeedError> {
        let asset_id = self.shared.state.borrow().asset_id.clone();

        match asset_id {
            Some(asset_id) => self.navigate(&asset_id).await,
            None => Err(FeedError::custom_400("No asset is being viewed.".to_string())),
        }
    }

    /// Appends the next page of confirmed history. At most one request is
    /// in flight; calls made meanwhile are dropped.
    pub async fn load_more(&self) -> Result<LoadMore, FeedError> {
        let mut claim = None;
        self.shared.state.send_if_modified(|s| match s.begin_load_more() {
            Some((asset_id, anchor)) => {
                claim = Some((s.generation, asset_id, anchor));
                true
            },
            None => false,
        });

        let Some((generation, asset_id, anchor)) = claim else {
            return Ok(LoadMore::Skipped);
        };

        debug!(%asset_id, %anchor, generation, "Loading more transactions");

        let page = self
            .shared
            .services
            .api
            .asset_transactions_from_hash(&asset_id, &anchor)
            .await;

        match page {
            Ok(page) => {
                let received = page.len();
                let outcome = self
                    .shared
                    .update(generation, |s| s.apply_next_page(page))
                    .unwrap_or(LoadMore::Superseded);

                debug!(%asset_id, received, ?outcome, "Page applied");
                Ok(outcome)
            },
            Err(err) => {
                self.shared.update(generation, |s| s.abort_load_more());
                warn!(%asset_id, %anchor, "Failed to load more transactions: {}", err);
                Err(err)
            },
        }
    }

    /// Stops live updates and releases the push subscription.
    pub async fn close(self) {
        self.shared.state.send_modify(|s| s.generation += 1);
        self.live.abort();
        self.shared.release_tracking().await;

        info!("Asset feed closed");
    }
}

impl Drop for FeedSession {
    fn drop(&mut self) {
        self.live.abort();
    }
}

impl Shared {
    /// Resets the state for a new asset and returns the new generation.
    fn begin(&self, asset_id: String) -> u64 {
        let mut generation = 0;

        self.state.send_modify(|s| {
            generation = s.generation + 1;
            *s = FeedState::loading(generation, asset_id);
        });

        generation
    }

    fn is_current(&self, generation: u64) -> bool {
        self.state.borrow().generation == generation
    }

    /// Applies `f` only while `generation` is still the current one.
    fn update<R>(&self, generation: u64, f: impl FnOnce(&mut FeedState) -> R) -> Option<R> {
        let mut out = None;

        self.state.send_if_modified(|s| {
            if s.generation != generation {
                return false;
            }
            out = Some(f(s));
            true
        });

        out
    }

    async fn load(&self, generation: u64, asset_id: &str) -> Result<Navigation, FeedError> {
        let asset_id = parse_asset_id(asset_id)?;
        let api = &self.services.api;

        let (asset, contracts) = tokio::join!(api.asset(&asset_id), self.services.registry.contracts());

        if !self.is_current(generation) {
            return Ok(Navigation::Superseded);
        }

        let asset = asset?;
        let contract = contracts?.get(&asset.asset_id).cloned();
        let native = self.settings.native_asset_id.as_deref();

        if self
            .update(generation, |s| s.apply_asset(asset, contract, native))
            .is_none()
        {
            return Ok(Navigation::Superseded);
        }

        self.track(generation, &asset_id).await;

        let page = api.asset_transactions(&asset_id).await;
        if !self.is_current(generation) {
            return Ok(Navigation::Superseded);
        }
        let page = page?;

        let request = EnrichmentRequest::from_page(&page);
        let times = if request.is_empty() {
            Vec::new()
        } else {
            debug!(%asset_id, pending = request.txids.len(), "Fetching first-seen times");

            let times = api.transaction_times(&request.txids).await;
            if !self.is_current(generation) {
                return Ok(Navigation::Superseded);
            }
            times?
        };

        match self.update(generation, |s| s.apply_first_page(page, &request, &times)) {
            Some(result) => result.map(|()| Navigation::Ready),
            None => Ok(Navigation::Superseded),
        }
    }

    async fn track(&self, generation: u64, asset_id: &str) {
        let mut tracking = self.tracking.lock().await;

        if !self.is_current(generation) {
            return;
        }

        match self.services.push.start_track_asset(asset_id).await {
            Ok(()) => *tracking = Some(asset_id.to_string()),
            Err(err) => warn!(asset_id, "Could not start live tracking: {}", err),
        }
    }

    async fn release_tracking(&self) {
        let mut tracking = self.tracking.lock().await;

        if let Some(asset_id) = tracking.take() {
            if let Err(err) = self.services.push.stop_tracking_asset().await {
                warn!(%asset_id, "Could not stop live tracking: {}", err);
            }
        }
    }

    fn apply_push_event(&self, event: PushEvent) {
        let txid = event.txid().to_string();
        let mut notification = None;
        let mut asset_id = None;

        self.state.send_if_modified(|s| {
            asset_id = s.asset_id.clone();

            match event {
                PushEvent::MempoolTransaction(tx) => {
                    let added = s.apply_mempool_transaction(tx);
                    if added {
                        notification = Some(Notification::NewTransaction);
                    }
                    added
                },
                PushEvent::BlockTransaction(tx) => match s.apply_confirmation(tx) {
                    Confirmation::Updated => {
                        notification = Some(Notification::Confirmed);
                        true
                    },
                    Confirmation::Absent => true,
                    Confirmation::Ignored => false,
                },
            }
        });

        if let (Some(notification), Some(asset_id)) = (notification, asset_id) {
            self.services.notifier.notify(notification, &asset_id, &txid);
        }
    }
}

async fn run_live_merge(shared: Arc<Shared>, mut events: broadcast::Receiver<PushEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => shared.apply_push_event(event),
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Live merge fell behind, push events were dropped");
            },
            Err(RecvError::Closed) => break,
        }
    }

    debug!("Live merge stopped");
}
