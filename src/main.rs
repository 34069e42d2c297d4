use asset_feed::{
    FeedServices, FeedSession, FeedSettings, FeedState, LoadMore,
    api::ElectrsApi,
    assets::AssetRegistry,
    cli::Args,
    config::RegistryConfig,
    errors::AppError,
    logging::setup_tracing,
    models::Transaction,
    notifications::LogNotifier,
    push::WebsocketPush,
};
use dotenvy::dotenv;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenv().ok();
    let config = Args::init().unwrap_or_else(|e| {
        eprintln!("\n{e}");
        std::process::exit(1);
    });

    // Logging
    setup_tracing(config.log_level);

    info!(
        "Starting {} {} ({})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        env!("GIT_REVISION")
    );

    let api = ElectrsApi::new(config.api_url.clone(), config.request_timeout)?;
    let registry = match &config.registry {
        RegistryConfig::Remote(url) => AssetRegistry::remote(url.clone(), config.request_timeout)?,
        RegistryConfig::File(path) => AssetRegistry::from_file(path.clone()),
    };
    let push = WebsocketPush::connect(config.ws_url.as_str()).await?;

    let services = FeedServices {
        api: Arc::new(api),
        registry: Arc::new(registry),
        push: Arc::new(push),
        notifier: Arc::new(LogNotifier),
    };
    let settings = FeedSettings {
        native_asset_id: config.native_asset_id.clone(),
    };

    let session = FeedSession::open(services, settings).await?;
    let mut updates = session.subscribe();

    if let Err(err) = session.navigate(&config.asset).await {
        session.close().await;
        return Err(err.into());
    }

    for _ in 0..config.pages {
        match session.load_more().await {
            Ok(LoadMore::Appended(_)) => (),
            Ok(_) => break,
            Err(err) => {
                error!("Stopped paging: {}", err);
                break;
            },
        }
    }

    print_feed(&updates.borrow_and_update());

    let shutdown = signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Received shutdown signal");
                break;
            },
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                print_summary(&updates.borrow_and_update());
            },
        }
    }

    session.close().await;

    Ok(())
}

fn print_summary(state: &FeedState) {
    info!(
        asset_id = state.asset_id.as_deref().unwrap_or_default(),
        transactions = state.transaction_count(),
        tx_count = state.tx_count,
        loaded = state.loaded_confirmed_count,
        total = state.total_confirmed_count,
        "Feed updated"
    );
}

fn print_feed(state: &FeedState) {
    if let Some(view) = &state.view {
        let name = view
            .contract
            .as_ref()
            .and_then(|c| c.name.clone())
            .unwrap_or_else(|| view.asset.asset_id.clone());
        info!(native = view.is_native, "Asset: {}", name);
    }

    print_summary(state);

    for tx in state.transactions.iter().flat_map(|txs| txs.iter()) {
        info!("  {} {}", tx.txid, describe(tx));
    }
}

fn describe(tx: &Transaction) -> String {
    let when = |secs: u64| {
        i64::try_from(secs)
            .ok()
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "?".to_string())
    };

    match (tx.status.confirmed, tx.status.block_time, tx.first_seen) {
        (true, Some(block_time), _) => format!("confirmed {}", when(block_time)),
        (true, None, _) => "confirmed".to_string(),
        (false, _, Some(first_seen)) => format!("unconfirmed, first seen {}", when(first_seen)),
        (false, _, None) => "unconfirmed".to_string(),
    }
}
