use crate::{config::Config, errors::AppError, types::LogLevel};
use anyhow::Result;
use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use twelf::{Layer, config};

pub const L_BTC_ASSET_ID: &str = "6f0279e9ed041c3d710a9f57d0c02928416460c4b722ae3457a11eec381c526d";

static SHOULD_SKIP_SERIALIZNG_FIELDS: AtomicBool = AtomicBool::new(false);

fn should_skip_serializng_fields<T>(_: &T) -> bool {
    SHOULD_SKIP_SERIALIZNG_FIELDS.load(Ordering::SeqCst)
}

#[derive(Parser, Debug, Serialize, Clone)]
#[command(author,
          name = "asset-feed",
          bin_name = "asset-feed",
          version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_REVISION"), ")"),
          about,
          long_about = None)]
#[config]
pub struct Args {
    /// Explorer REST API base URL
    #[arg(long, default_value = "https://liquid.network/api/")]
    pub api_url: String,

    /// Explorer push (WebSocket) endpoint
    #[arg(long, default_value = "wss://liquid.network/api/v1/ws")]
    pub ws_url: String,

    /// Asset contract directory
    #[arg(long, default_value = "https://liquid.network/resources/assets.minimal.json")]
    pub assets_url: String,

    /// Read the asset contract directory from a local file instead of `assets_url`
    #[arg(long)]
    pub assets_file: Option<PathBuf>,

    #[arg(
        long,
        default_value = "6f0279e9ed041c3d710a9f57d0c02928416460c4b722ae3457a11eec381c526d"
    )]
    pub native_asset_id: String,

    #[arg(long = "request-timeout-sec", default_value = "30")]
    pub request_timeout: u64,

    #[arg(long, default_value = "info")]
    pub log_level: LogLevel,

    /// Asset id whose transactions to follow
    #[arg(long)]
    pub asset: Option<String>,

    /// Extra pages of confirmed history to load on start
    #[arg(long, default_value = "0")]
    pub pages: u32,

    #[arg(long, help = "Initialize a new configuration file")]
    #[serde(skip_serializing_if = "should_skip_serializng_fields")]
    #[serde(default)]
    init: bool,

    #[arg(long, help = "Path to an existing configuration file")]
    #[serde(skip_serializing_if = "should_skip_serializng_fields")]
    config: Option<PathBuf>,
}

fn get_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("asset-feed")
        .join("config.toml")
}

impl Args {
    fn parse_args(config_path: &Path) -> Result<Args, AppError> {
        const ENV_PREFIX: &str = "ASSET_FEED_";

        let matches = Self::command().get_matches();

        let mut config_layers = vec![
            Layer::Env(Some(String::from(ENV_PREFIX))),
            Layer::Clap(matches),
        ];
        if config_path.exists() {
            config_layers.insert(0, Layer::Toml(config_path.to_path_buf()));
        }

        Self::with_layers(&config_layers).map_err(|e| match e {
            twelf::Error::Toml(_) => AppError::Config(format!(
                "Failed to parse config file '{}'",
                config_path.to_string_lossy()
            )),
            _ => AppError::Config(e.to_string()),
        })
    }

    pub fn init() -> Result<Config, AppError> {
        let initial_args = Args::parse();
        let config_path = initial_args.config.unwrap_or_else(get_config_path);

        let arguments = Args::parse_args(&config_path)?;

        SHOULD_SKIP_SERIALIZNG_FIELDS.store(true, Ordering::SeqCst);

        if arguments.init {
            arguments
                .generate_config(&config_path)
                .map_err(|e| AppError::Config(e.to_string()))?;
        }

        Config::from_args(arguments)
    }

    /// Writes the effective arguments as a TOML config file.
    fn generate_config(&self, path: &Path) -> Result<()> {
        let toml_string = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(path)?;
        file.write_all(toml_string.as_bytes())?;

        println!("Config has been written to {}", path.display());

        Ok(())
    }
}
