use crate::errors::{AppError, FeedError};
use crate::json_client::JsonClient;
use crate::models::{Asset, Transaction};
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

pub type ApiResult<T> = Result<T, FeedError>;

/// Data-fetch operations the feed needs from an explorer backend.
#[async_trait]
pub trait ExplorerApi: Send + Sync + 'static {
    async fn asset(&self, asset_id: &str) -> ApiResult<Asset>;

    /// First page of the asset's history: mempool transactions first, then
    /// confirmed ones, newest first.
    async fn asset_transactions(&self, asset_id: &str) -> ApiResult<Vec<Transaction>>;

    /// Confirmed history strictly older than `anchor_txid`.
    async fn asset_transactions_from_hash(
        &self,
        asset_id: &str,
        anchor_txid: &str,
    ) -> ApiResult<Vec<Transaction>>;

    /// First-seen times, positionally matching `txids`.
    async fn transaction_times(&self, txids: &[String]) -> ApiResult<Vec<u64>>;
}

/// Esplora-style REST backend with the mempool `transaction-times` extension.
#[derive(Clone, Debug)]
pub struct ElectrsApi {
    client: JsonClient,
}

impl ElectrsApi {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, AppError> {
        let client = JsonClient::new(base_url, timeout)?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ExplorerApi for ElectrsApi {
    async fn asset(&self, asset_id: &str) -> ApiResult<Asset> {
        self.client.get(&format!("asset/{asset_id}")).await
    }

    async fn asset_transactions(&self, asset_id: &str) -> ApiResult<Vec<Transaction>> {
        self.client.get(&format!("asset/{asset_id}/txs")).await
    }

    async fn asset_transactions_from_hash(
        &self,
        asset_id: &str,
        anchor_txid: &str,
    ) -> ApiResult<Vec<Transaction>> {
        self.client
            .get(&format!("asset/{asset_id}/txs/chain/{anchor_txid}"))
            .await
    }

    async fn transaction_times(&self, txids: &[String]) -> ApiResult<Vec<u64>> {
        let query: Vec<(&str, &str)> = txids.iter().map(|txid| ("txId[]", txid.as_str())).collect();

        self.client
            .get_with_query("v1/transaction-times", &query)
            .await
    }
}
