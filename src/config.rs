use crate::assets::parse_asset_id;
use crate::cli::Args;
use crate::errors::AppError;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use url::Url;

#[derive(Clone, Debug)]
pub struct Config {
    pub api_url: Url,
    pub ws_url: Url,
    pub registry: RegistryConfig,
    pub native_asset_id: Option<String>,
    pub request_timeout: Duration,
    pub log_level: Level,
    pub asset: String,
    pub pages: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryConfig {
    Remote(Url),
    File(PathBuf),
}

impl Config {
    pub fn from_args(args: Args) -> Result<Self, AppError> {
        let asset = args
            .asset
            .as_deref()
            .ok_or(AppError::Config("--asset must be set".into()))?;
        let asset = parse_asset_id(asset).map_err(|e| AppError::Config(e.message))?;

        let native_asset_id = match args.native_asset_id.trim() {
            "" => None,
            id => Some(parse_asset_id(id).map_err(|e| {
                AppError::Config(format!("--native-asset-id: {}", e.message))
            })?),
        };

        if args.request_timeout == 0 {
            return Err(AppError::Config(
                "--request-timeout-sec must be greater than 0".into(),
            ));
        }

        let registry = match args.assets_file {
            Some(path) => RegistryConfig::File(path),
            None => RegistryConfig::Remote(Url::parse(args.assets_url.trim())?),
        };

        Ok(Config {
            api_url: base_url(&args.api_url)?,
            ws_url: Url::parse(args.ws_url.trim())?,
            registry,
            native_asset_id,
            request_timeout: Duration::from_secs(args.request_timeout),
            log_level: args.log_level.into(),
            asset,
            pages: args.pages,
        })
    }
}

/// Relative API paths are joined onto this, so it has to end with `/`.
pub fn base_url(raw: &str) -> Result<Url, AppError> {
    let mut raw = raw.trim().to_string();

    if !raw.ends_with('/') {
        raw.push('/');
    }

    Ok(Url::parse(&raw)?)
}
