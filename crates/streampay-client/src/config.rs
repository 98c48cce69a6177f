use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use streampay_core::{AssetInfo, StreamContract, DEFAULT_FETCH_WINDOW, DEFAULT_REFRESH_SECS};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("cannot encode config: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("invalid value for {var}: {value}")]
    Env { var: &'static str, value: String },
    #[error("{0}")]
    Invalid(String),
}

/// Client configuration: which ledger endpoint, which contracts, and how hard
/// to scan it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub network: String,
    pub rpc_url: String,
    /// Streaming contract principal (`ADDR.name`).
    pub streaming_contract: String,
    /// Token contract principal (`ADDR.name`).
    pub token_contract: String,
    /// Fungible asset name declared inside the token contract.
    pub token_asset: String,
    /// Caller address; the portfolio is computed relative to it.
    pub address: Option<String>,
    pub fetch_window: usize,
    pub refresh_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            network: "testnet".to_string(),
            rpc_url: "http://localhost:3999".to_string(),
            streaming_contract: "ST30J9EZKY44SS1EBT8XNKJFA77Z4TSDBEMZ55MEJ.precious-white-sparrow"
                .to_string(),
            token_contract: "ST30J9EZKY44SS1EBT8XNKJFA77Z4TSDBEMZ55MEJ.charming-amethyst-pinniped"
                .to_string(),
            token_asset: "usdcx-token".to_string(),
            address: None,
            fetch_window: DEFAULT_FETCH_WINDOW,
            refresh_secs: DEFAULT_REFRESH_SECS,
            request_timeout_secs: 15,
        }
    }
}

impl ClientConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// File if present, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Overlay `STREAMPAY_*` environment variables onto `self`.
    pub fn apply_env(mut self) -> Result<Self, ConfigError> {
        if let Ok(v) = std::env::var("STREAMPAY_NETWORK") {
            self.network = v;
        }
        if let Ok(v) = std::env::var("STREAMPAY_RPC_URL") {
            self.rpc_url = v;
        }
        if let Ok(v) = std::env::var("STREAMPAY_CONTRACT") {
            self.streaming_contract = v;
        }
        if let Ok(v) = std::env::var("STREAMPAY_TOKEN") {
            self.token_contract = v;
        }
        if let Ok(v) = std::env::var("STREAMPAY_ADDRESS") {
            if !v.is_empty() {
                self.address = Some(v);
            }
        }
        if let Ok(v) = std::env::var("STREAMPAY_FETCH_WINDOW") {
            self.fetch_window = v.parse().map_err(|_| ConfigError::Env {
                var: "STREAMPAY_FETCH_WINDOW",
                value: v.clone(),
            })?;
        }
        if let Ok(v) = std::env::var("STREAMPAY_REFRESH_SECS") {
            self.refresh_secs = v.parse().map_err(|_| ConfigError::Env {
                var: "STREAMPAY_REFRESH_SECS",
                value: v.clone(),
            })?;
        }
        Ok(self)
    }

    /// Defaults overlaid with the environment.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env()
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.rpc_url.starts_with("http://") && !self.rpc_url.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "rpc_url must be an http(s) URL, got {}",
                self.rpc_url
            )));
        }
        for (name, principal) in [
            ("streaming_contract", &self.streaming_contract),
            ("token_contract", &self.token_contract),
        ] {
            match principal.split_once('.') {
                Some((addr, contract)) if !addr.is_empty() && !contract.is_empty() => {}
                _ => {
                    return Err(ConfigError::Invalid(format!(
                        "{} must look like ADDRESS.contract-name, got {}",
                        name, principal
                    )))
                }
            }
        }
        if self.token_asset.is_empty() {
            return Err(ConfigError::Invalid("token_asset cannot be empty".into()));
        }
        if self.fetch_window == 0 {
            return Err(ConfigError::Invalid("fetch_window must be at least 1".into()));
        }
        if self.refresh_secs == 0 {
            return Err(ConfigError::Invalid("refresh_secs must be at least 1".into()));
        }
        Ok(())
    }

    pub fn stream_contract(&self) -> StreamContract {
        StreamContract {
            contract: self.streaming_contract.clone(),
            token: AssetInfo::new(self.token_contract.clone(), self.token_asset.clone()),
        }
    }

    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
