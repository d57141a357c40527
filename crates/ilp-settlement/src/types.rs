use serde::{Deserialize, Serialize};

/// Static configuration of a ledger account. Account ids equal peer ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSettings {
    pub id: String,
    pub asset_code: String,
    pub asset_scale: u8,
    /// Reservations that would push the payable balance above this fail.
    #[serde(default)]
    pub maximum_payable: Option<u64>,
    #[serde(default)]
    pub maximum_receivable: Option<u64>,
    /// Id of the settlement engine that settles this account.
    #[serde(default)]
    pub settlement_engine: Option<String>,
    /// Settlement is attempted once the payable balance exceeds this.
    #[serde(default)]
    pub settlement_threshold: Option<u64>,
    /// Payable balance to settle down to. Defaults to zero.
    #[serde(default)]
    pub settle_to: Option<u64>,
}

impl AccountSettings {
    pub fn new(id: impl Into<String>, asset_code: impl Into<String>, asset_scale: u8) -> Self {
        Self {
            id: id.into(),
            asset_code: asset_code.into(),
            asset_scale,
            maximum_payable: None,
            maximum_receivable: None,
            settlement_engine: None,
            settlement_threshold: None,
            settle_to: None,
        }
    }
}

/// Point-in-time view of an account and its committed balances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    #[serde(flatten)]
    pub settings: AccountSettings,
    /// What we owe the peer.
    pub balance_payable: i128,
    /// What the peer owes us.
    pub balance_receivable: i128,
}

impl AccountSnapshot {
    pub fn id(&self) -> &str {
        &self.settings.id
    }

    pub fn asset_scale(&self) -> u8 {
        self.settings.asset_scale
    }

    /// True if the payable balance is past the configured settlement threshold.
    pub fn exceeds_settlement_threshold(&self) -> bool {
        self.settings
            .settlement_threshold
            .is_some_and(|threshold| self.balance_payable > i128::from(threshold))
    }
}

/// A two-phase intent moving value from the incoming to the outgoing account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub source_account_id: String,
    pub destination_account_id: String,
    /// Credited to the source account's receivable balance.
    pub source_amount: u64,
    /// Credited to the destination account's payable balance.
    pub destination_amount: u64,
}

/// What a settlement engine reports it actually settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementResponse {
    #[serde(with = "amount_string")]
    pub amount: u64,
    pub scale: u8,
}

/// Re-express `amount` from scale `from` at scale `to`. Scaling down floors.
/// Returns `None` on overflow.
pub fn rescale(amount: u64, from: u8, to: u8) -> Option<u64> {
    match to.cmp(&from) {
        std::cmp::Ordering::Equal => Some(amount),
        std::cmp::Ordering::Greater => 10u64
            .checked_pow(u32::from(to - from))
            .and_then(|factor| amount.checked_mul(factor)),
        std::cmp::Ordering::Less => Some(
            10u64
                .checked_pow(u32::from(from - to))
                .map_or(0, |factor| amount / factor),
        ),
    }
}

/// Amounts travel as decimal strings to survive JSON number precision limits.
pub(crate) mod amount_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(amount: &u64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&amount.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
