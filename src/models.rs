use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxStatus {
    pub confirmed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_height: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_time: Option<u64>,
}

impl TxStatus {
    pub fn unconfirmed() -> Self {
        Self::default()
    }

    pub fn confirmed_at(block_time: u64) -> Self {
        Self {
            confirmed: true,
            block_time: Some(block_time),
            ..Self::default()
        }
    }
}

/// A transaction as the explorer API and the push channel deliver it.
///
/// Only `txid`, `status` and `firstSeen` are interpreted, everything else
/// (inputs, outputs, fee, size, ...) rides along in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub txid: String,
    #[serde(default)]
    pub status: TxStatus,
    #[serde(rename = "firstSeen", default, skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Transaction {
    pub fn new(txid: impl Into<String>, status: TxStatus) -> Self {
        Self {
            txid: txid.into(),
            status,
            first_seen: None,
            extra: Map::new(),
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.status.confirmed
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetStats {
    #[serde(default)]
    pub tx_count: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub asset_id: String,
    #[serde(default)]
    pub chain_stats: AssetStats,
    #[serde(default)]
    pub mempool_stats: AssetStats,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Asset {
    /// Confirmed plus mempool transactions, for display only.
    pub fn tx_count(&self) -> u64 {
        self.chain_stats.tx_count + self.mempool_stats.tx_count
    }
}

/// Issuer metadata from the asset directory.
///
/// The directory stores each entry as a positional array:
/// `[domain, ticker, name, precision]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Value>", into = "Vec<Value>")]
pub struct AssetContract {
    pub domain: Option<String>,
    pub ticker: Option<String>,
    pub name: Option<String>,
    pub precision: Option<u8>,
}

impl From<Vec<Value>> for AssetContract {
    fn from(raw: Vec<Value>) -> Self {
        let text = |i: usize| raw.get(i).and_then(Value::as_str).map(str::to_string);

        Self {
            domain: text(0),
            ticker: text(1),
            name: text(2),
            precision: raw
                .get(3)
                .and_then(Value::as_u64)
                .and_then(|p| u8::try_from(p).ok()),
        }
    }
}

impl From<AssetContract> for Vec<Value> {
    fn from(contract: AssetContract) -> Self {
        let text = |s: Option<String>| s.map(Value::String).unwrap_or(Value::Null);

        vec![
            text(contract.domain),
            text(contract.ticker),
            text(contract.name),
            contract.precision.map(Value::from).unwrap_or(Value::Null),
        ]
    }
}
