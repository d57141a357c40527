use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::address::Address;

/// Global allocation prefix used when none is configured.
pub const DEFAULT_GLOBAL_PREFIX: &str = "test";

/// Connector-wide policy knobs shared by routing and the packet pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// This connector's own ILP address. Routing refuses to forward until it is set.
    #[serde(default)]
    pub ilp_address: Option<Address>,
    /// Routes outside this prefix are never re-advertised.
    #[serde(default = "default_global_prefix")]
    pub global_prefix: String,
    /// Margin subtracted from the incoming expiry before forwarding.
    #[serde(default = "default_min_expiration_window_ms")]
    pub min_expiration_window_ms: u64,
    /// Upper bound on how long a forwarded packet may be held.
    #[serde(default = "default_max_hold_window_ms")]
    pub max_hold_window_ms: u64,
    #[serde(default = "default_refill_period_ms")]
    pub default_refill_period_ms: u64,
    /// Capacity of the balance-update channel feeding the settlement worker.
    #[serde(default = "default_settlement_queue_capacity")]
    pub settlement_queue_capacity: usize,
    #[serde(default = "default_ccp_broadcast_interval_ms")]
    pub ccp_broadcast_interval_ms: u64,
}

fn default_global_prefix() -> String {
    DEFAULT_GLOBAL_PREFIX.into()
}

fn default_min_expiration_window_ms() -> u64 {
    1_000
}

fn default_max_hold_window_ms() -> u64 {
    30_000
}

fn default_refill_period_ms() -> u64 {
    1_000
}

fn default_settlement_queue_capacity() -> usize {
    1_024
}

fn default_ccp_broadcast_interval_ms() -> u64 {
    10_000
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            ilp_address: None,
            global_prefix: default_global_prefix(),
            min_expiration_window_ms: default_min_expiration_window_ms(),
            max_hold_window_ms: default_max_hold_window_ms(),
            default_refill_period_ms: default_refill_period_ms(),
            settlement_queue_capacity: default_settlement_queue_capacity(),
            ccp_broadcast_interval_ms: default_ccp_broadcast_interval_ms(),
        }
    }
}

impl ConnectorConfig {
    pub fn min_expiration_window(&self) -> Duration {
        Duration::from_millis(self.min_expiration_window_ms)
    }

    pub fn max_hold_window(&self) -> Duration {
        Duration::from_millis(self.max_hold_window_ms)
    }

    pub fn default_refill_period(&self) -> Duration {
        Duration::from_millis(self.default_refill_period_ms)
    }

    pub fn ccp_broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.ccp_broadcast_interval_ms)
    }
}
