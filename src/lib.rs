pub mod api;
pub mod assets;
pub mod cli;
pub mod config;
pub mod errors;
pub mod feed;
pub mod json_client;
pub mod logging;
pub mod models;
pub mod notifications;
pub mod push;
pub mod types;

pub use errors::{AppError, FeedError};
pub use feed::{FeedServices, FeedSession, FeedSettings, FeedState, LoadMore, Navigation};
