use std::fmt;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Notification {
    /// A transaction of the viewed asset entered the mempool.
    NewTransaction,
    /// A loaded transaction of the viewed asset was mined.
    Confirmed,
}

impl Notification {
    /// Name of the sound a browser front end would play.
    pub fn sound(&self) -> &'static str {
        match self {
            Notification::NewTransaction => "chime",
            Notification::Confirmed => "magic",
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::NewTransaction => write!(f, "new transaction"),
            Notification::Confirmed => write!(f, "transaction confirmed"),
        }
    }
}

pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, notification: Notification, asset_id: &str, txid: &str);
}

/// Reports notifications through the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification, asset_id: &str, txid: &str) {
        info!(asset_id, txid, sound = notification.sound(), "{notification}");
    }
}
