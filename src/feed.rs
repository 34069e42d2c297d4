pub mod session;
pub mod state;

pub use session::{FeedServices, FeedSession, FeedSettings, Navigation};
pub use state::{AssetView, Confirmation, FeedState, LoadMore};
