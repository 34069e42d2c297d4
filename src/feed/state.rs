use crate::errors::FeedError;
use crate::models::{Asset, AssetContract, Transaction};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

/// Asset metadata as shown above the transaction list.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetView {
    pub asset: Asset,
    pub contract: Option<AssetContract>,
    pub is_native: bool,
}

/// Everything known about the viewed asset's transaction feed.
///
/// Published whole on every change. `transactions` is swapped for a new
/// allocation rather than edited, so `Arc::ptr_eq` tells observers whether
/// the list moved.
#[derive(Debug, Clone, Default)]
pub struct FeedState {
    pub(crate) generation: u64,
    pub asset_id: Option<String>,
    pub view: Option<AssetView>,
    pub transactions: Option<Arc<Vec<Transaction>>>,
    /// Confirmed plus mempool transactions, display only.
    pub tx_count: u64,
    pub loaded_confirmed_count: u64,
    pub total_confirmed_count: u64,
    pub last_seen_txid: Option<String>,
    pub is_loading_asset: bool,
    pub is_loading_transactions: bool,
    pub error: Option<FeedError>,
}

/// Outcome of a pagination request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMore {
    /// Already loading, nothing loaded yet, or history fully loaded.
    Skipped,
    Appended(usize),
    /// The server had nothing past the cursor.
    Exhausted,
    /// The viewed asset changed while the page was in flight.
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Updated,
    /// Not in the loaded window; only the counters moved.
    Absent,
    /// No list yet.
    Ignored,
}

/// Mempool transactions of a page that need a first-seen time, with their
/// positions in the page. The two vectors are parallel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentRequest {
    pub txids: Vec<String>,
    pub positions: Vec<usize>,
}

impl EnrichmentRequest {
    pub fn from_page(page: &[Transaction]) -> Self {
        let (positions, txids) = page
            .iter()
            .enumerate()
            .filter(|(_, tx)| !tx.is_confirmed())
            .map(|(i, tx)| (i, tx.txid.clone()))
            .unzip();

        Self { txids, positions }
    }

    pub fn is_empty(&self) -> bool {
        self.txids.is_empty()
    }

    /// Writes `times[i]` into the transaction at `positions[i]`.
    pub fn apply(&self, page: &mut [Transaction], times: &[u64]) -> Result<(), FeedError> {
        if times.len() != self.positions.len() {
            return Err(FeedError::times_mismatch(self.positions.len(), times.len()));
        }

        for (&position, &time) in self.positions.iter().zip(times) {
            if let Some(tx) = page.get_mut(position) {
                tx.first_seen = Some(time);
            }
        }

        Ok(())
    }
}

/// Mempool transactions ahead of mined ones. Mempool transactions are
/// newest first by first-seen time (unknown last), mined ones newest first
/// by block time. Stable.
pub fn compare_transactions(a: &Transaction, b: &Transaction) -> Ordering {
    a.is_confirmed()
        .cmp(&b.is_confirmed())
        .then_with(|| match a.is_confirmed() {
            true => b.status.block_time.cmp(&a.status.block_time),
            false => b.first_seen.cmp(&a.first_seen),
        })
}

pub fn sort_transactions(transactions: &mut [Transaction]) {
    transactions.sort_by(compare_transactions);
}

/// Cursor candidate of a page in server order: the last element, or the
/// last confirmed one when the tail is still in the mempool.
pub fn page_cursor(page: &[Transaction]) -> Option<&str> {
    page.iter()
        .rev()
        .find(|tx| tx.is_confirmed())
        .map(|tx| tx.txid.as_str())
}

impl FeedState {
    pub(crate) fn loading(generation: u64, asset_id: String) -> Self {
        Self {
            generation,
            asset_id: Some(asset_id),
            is_loading_asset: true,
            is_loading_transactions: true,
            ..Self::default()
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.as_ref().map_or(0, |txs| txs.len())
    }

    pub fn is_exhausted(&self) -> bool {
        self.loaded_confirmed_count >= self.total_confirmed_count
    }

    pub(crate) fn fail(&mut self, error: FeedError) {
        self.error = Some(error);
        self.is_loading_asset = false;
        self.is_loading_transactions = false;
        self.transactions = None;
    }

    pub(crate) fn apply_asset(
        &mut self,
        asset: Asset,
        contract: Option<AssetContract>,
        native_asset_id: Option<&str>,
    ) {
        self.total_confirmed_count = asset.chain_stats.tx_count;
        self.tx_count = asset.tx_count();
        self.is_loading_asset = false;
        self.is_loading_transactions = true;
        self.view = Some(AssetView {
            is_native: native_asset_id == Some(asset.asset_id.as_str()),
            asset,
            contract,
        });
    }

    /// Publishes the first page once its mempool entries carry their
    /// first-seen times.
    pub(crate) fn apply_first_page(
        &mut self,
        mut page: Vec<Transaction>,
        request: &EnrichmentRequest,
        times: &[u64],
    ) -> Result<(), FeedError> {
        request.apply(&mut page, times)?;

        if let Some(cursor) = page_cursor(&page) {
            self.last_seen_txid = Some(cursor.to_string());
        }

        let confirmed = page.iter().filter(|tx| tx.is_confirmed()).count() as u64;
        self.add_loaded(confirmed);

        sort_transactions(&mut page);

        self.transactions = Some(Arc::new(page));
        self.is_loading_transactions = false;

        Ok(())
    }

    /// Claims the pagination slot. Returns the anchor to fetch from, or
    /// `None` when the request has to be dropped.
    pub(crate) fn begin_load_more(&mut self) -> Option<(String, String)> {
        if self.is_loading_transactions || self.total_confirmed_count == 0 || self.is_exhausted() {
            return None;
        }

        self.transactions.as_ref()?;
        let asset_id = self.asset_id.clone()?;
        let anchor = self.last_seen_txid.clone()?;

        self.is_loading_transactions = true;

        Some((asset_id, anchor))
    }

    pub(crate) fn abort_load_more(&mut self) {
        self.is_loading_transactions = false;
    }

    pub(crate) fn apply_next_page(&mut self, page: Vec<Transaction>) -> LoadMore {
        self.is_loading_transactions = false;

        if page.is_empty() {
            self.loaded_confirmed_count = self.total_confirmed_count;
            return LoadMore::Exhausted;
        }

        if let Some(last) = page.last() {
            self.last_seen_txid = Some(last.txid.clone());
        }
        self.add_loaded(page.len() as u64);

        let current = self.transactions.as_deref().map(Vec::as_slice).unwrap_or_default();
        let mut seen: HashSet<String> = current.iter().map(|tx| tx.txid.clone()).collect();

        let mut merged = Vec::with_capacity(current.len() + page.len());
        merged.extend_from_slice(current);

        let mut appended = 0;
        for tx in page {
            if seen.insert(tx.txid.clone()) {
                merged.push(tx);
                appended += 1;
            }
        }

        self.transactions = Some(Arc::new(merged));

        LoadMore::Appended(appended)
    }

    /// New mempool transaction from the push channel. Returns whether the
    /// list changed.
    pub(crate) fn apply_mempool_transaction(&mut self, tx: Transaction) -> bool {
        let Some(current) = &self.transactions else {
            return false;
        };

        if current.iter().any(|t| t.txid == tx.txid) {
            return false;
        }

        let mut next = Vec::with_capacity(current.len() + 1);
        next.push(tx);
        next.extend_from_slice(current);

        self.transactions = Some(Arc::new(next));
        self.tx_count += 1;

        true
    }

    /// A tracked transaction was mined. Counters advance even when it is
    /// outside the loaded window.
    pub(crate) fn apply_confirmation(&mut self, tx: Transaction) -> Confirmation {
        let Some(current) = &self.transactions else {
            return Confirmation::Ignored;
        };

        let outcome = match current.iter().position(|t| t.txid == tx.txid) {
            Some(index) => {
                let mut next = current.to_vec();
                next[index].status = tx.status;
                self.transactions = Some(Arc::new(next));
                Confirmation::Updated
            },
            None => Confirmation::Absent,
        };

        self.total_confirmed_count += 1;
        self.loaded_confirmed_count += 1;

        outcome
    }

    fn add_loaded(&mut self, count: u64) {
        self.loaded_confirmed_count = self
            .loaded_confirmed_count
            .saturating_add(count)
            .min(self.total_confirmed_count);
    }
}
