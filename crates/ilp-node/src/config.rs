//! TOML configuration for the connector binary.

use std::path::Path;

use anyhow::Context;
use ilp_core::{ConnectorConfig, PeerInfo};
use ilp_pipeline::FixedRates;
use ilp_settlement::AccountSettings;
use serde::{Deserialize, Serialize};

/// Everything `ilp-node` reads from its TOML file. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Address, expiry windows, queue sizes.
    pub connector: ConnectorConfig,
    pub http: HttpConfig,
    pub log: LogConfig,
    /// Prices per asset code used for cross-asset packets.
    pub rates: FixedRates,
    pub settlement_engines: Vec<EngineConfig>,
    pub peers: Vec<PeerConfig>,
}

/// Where ILP-over-HTTP, CCP and the status endpoints are served.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// `host:port`; port 0 picks a free port.
    pub bind_address: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:7768".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive, e.g. `info` or `ilp_routing=debug,info`.
    pub filter: String,
    /// One JSON object per line instead of human-readable text.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".into(),
            json: false,
        }
    }
}

/// A settlement engine. Engines without a URL run in-process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// A peer plus its ledger account and statically configured routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    #[serde(flatten)]
    pub info: PeerInfo,
    /// Base URL of the peer's CCP endpoints.
    #[serde(default)]
    pub ccp_url: Option<String>,
    /// Prefixes routed to this peer regardless of CCP.
    #[serde(default)]
    pub routes: Vec<String>,
    #[serde(default)]
    pub account: AccountConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    #[serde(default)]
    pub maximum_payable: Option<u64>,
    #[serde(default)]
    pub maximum_receivable: Option<u64>,
    #[serde(default)]
    pub settlement_engine: Option<String>,
    #[serde(default)]
    pub settlement_threshold: Option<u64>,
    #[serde(default)]
    pub settle_to: Option<u64>,
}

impl PeerConfig {
    pub fn account_settings(&self) -> AccountSettings {
        let mut settings = AccountSettings::new(
            self.info.id.clone(),
            self.info.asset.code.clone(),
            self.info.asset.scale,
        );
        settings.maximum_payable = self.account.maximum_payable;
        settings.maximum_receivable = self.account.maximum_receivable;
        settings.settlement_engine = self.account.settlement_engine.clone();
        settings.settlement_threshold = self.account.settlement_threshold;
        settings.settle_to = self.account.settle_to;
        settings
    }
}

impl NodeConfig {
    /// Read `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) => toml::from_str(&raw).with_context(|| format!("invalid config file {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("cannot read config file {}", path.display())),
        }
    }

    /// Write this config to `path` as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)
            .with_context(|| format!("cannot write config file {}", path.display()))
    }
}
