use crate::errors::{AppError, FeedError};
use crate::json_client::JsonClient;
use crate::models::AssetContract;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::info;
use url::Url;

const ASSET_ID_SIZE: usize = 64;

pub type Contracts = Arc<HashMap<String, AssetContract>>;

/// Asset ids are 32-byte hashes written as hex.
pub fn validate_asset_id(asset_id: &str) -> bool {
    asset_id.len() == ASSET_ID_SIZE && hex::decode(asset_id).is_ok()
}

pub fn parse_asset_id(asset_id: &str) -> Result<String, FeedError> {
    let asset_id = asset_id.trim();

    if !validate_asset_id(asset_id) {
        return Err(FeedError::invalid_asset_id());
    }

    Ok(asset_id.to_ascii_lowercase())
}

enum RegistrySource {
    Remote(JsonClient),
    File(PathBuf),
    Fixed(Contracts),
}

/// The asset contract directory, keyed by asset id.
///
/// Loaded on first use and kept for the lifetime of the registry. A failed
/// load is not cached, the next lookup tries again.
pub struct AssetRegistry {
    source: RegistrySource,
    contracts: OnceCell<Contracts>,
}

impl AssetRegistry {
    pub fn remote(url: Url, timeout: Duration) -> Result<Self, AppError> {
        let client = JsonClient::new(url, timeout)?;

        Ok(Self::with_source(RegistrySource::Remote(client)))
    }

    pub fn from_file(path: PathBuf) -> Self {
        Self::with_source(RegistrySource::File(path))
    }

    pub fn from_entries(entries: HashMap<String, AssetContract>) -> Self {
        Self::with_source(RegistrySource::Fixed(Arc::new(entries)))
    }

    fn with_source(source: RegistrySource) -> Self {
        Self {
            source,
            contracts: OnceCell::new(),
        }
    }

    pub async fn contracts(&self) -> Result<Contracts, FeedError> {
        self.contracts
            .get_or_try_init(|| self.load())
            .await
            .cloned()
    }

    pub async fn contract(&self, asset_id: &str) -> Result<Option<AssetContract>, FeedError> {
        Ok(self.contracts().await?.get(asset_id).cloned())
    }

    async fn load(&self) -> Result<Contracts, FeedError> {
        let contracts: HashMap<String, AssetContract> = match &self.source {
            RegistrySource::Fixed(contracts) => return Ok(contracts.clone()),
            RegistrySource::Remote(client) => client.get("").await?,
            RegistrySource::File(path) => {
                let data = tokio::fs::read_to_string(path).await.map_err(|e| {
                    FeedError::from(AppError::Registry(format!(
                        "Failed to read asset registry {}: {e}",
                        path.display()
                    )))
                })?;

                serde_json::from_str(&data)?
            },
        };

        info!(entries = contracts.len(), "Asset registry loaded");

        Ok(Arc::new(contracts))
    }
}
