use serde::{Deserialize, Serialize};
use std::env::VarError;
use std::{fmt, io};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug, Clone)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Explorer API error: {0}")]
    Api(String),

    #[error("Push channel error: {0}")]
    Push(String),

    #[error("Asset registry error: {0}")]
    Registry(String),
}

/// Error of a single load cycle.
/// Contains the following fields:
/// - status_code: the HTTP-like status of the failure
/// - error: a short description of the error
/// - message: a longer description of the error
///
/// It is stored in the feed state as-is and shown to whoever observes the
/// feed, so it has to stay `Clone`.
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl FeedError {
    pub fn not_found() -> Self {
        Self {
            error: "Not Found".to_string(),
            message: "The requested component has not been found.".to_string(),
            status_code: 404,
        }
    }

    pub fn custom_400(message: String) -> Self {
        Self {
            error: "Bad Request".to_string(),
            message,
            status_code: 400,
        }
    }

    /// error for malformed asset ids
    pub fn invalid_asset_id() -> Self {
        Self::custom_400("Invalid or malformed asset id format.".to_string())
    }

    /// The enrichment answer does not line up with the request.
    pub fn times_mismatch(requested: usize, received: usize) -> Self {
        Self::internal_server_error(format!(
            "Requested first-seen times for {requested} transactions, received {received}"
        ))
    }

    pub fn internal_server_error(error: String) -> Self {
        Self {
            error: "Internal Server Error".to_string(),
            message: error,
            status_code: 500,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code == 404
    }
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FeedError: {}", self.message)
    }
}

impl std::error::Error for FeedError {}

impl From<AppError> for FeedError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Config(e) => Self::internal_server_error(e),
            AppError::Api(e) => Self::internal_server_error(e),
            AppError::Push(e) => Self::internal_server_error(e),
            AppError::Registry(e) => Self::internal_server_error(e),
        }
    }
}

impl From<FeedError> for AppError {
    fn from(err: FeedError) -> Self {
        AppError::Api(err.message)
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(e: reqwest::Error) -> Self {
        FeedError::internal_server_error(format!("HTTP error: {e}"))
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(e: serde_json::Error) -> Self {
        FeedError::internal_server_error(format!("JSON error: {e}"))
    }
}

impl From<url::ParseError> for FeedError {
    fn from(e: url::ParseError) -> Self {
        FeedError::internal_server_error(format!("URL error: {e}"))
    }
}

impl From<VarError> for AppError {
    fn from(err: VarError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        error!("I/O Error occurred: {}", err);
        AppError::Config(err.to_string())
    }
}

impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        AppError::Config(format!("Invalid URL: {err}"))
    }
}

impl From<tungstenite::Error> for AppError {
    fn from(err: tungstenite::Error) -> Self {
        AppError::Push(err.to_string())
    }
}
