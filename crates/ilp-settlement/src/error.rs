/// Ledger errors.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("account already exists: {0}")]
    AccountExists(String),

    #[error("exceeded maximum balance: account {0}")]
    ExceedsMaximumBalance(String),

    #[error("balance overflow on account {0}")]
    Overflow(String),
}

/// Settlement-layer errors.
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("no settlement engine defined for account {0}")]
    NoEngineForAccount(String),

    #[error("settlement engine not registered: {0}")]
    EngineNotFound(String),

    #[error("cannot process scale {response_scale} with greater precision than account scale {account_scale}")]
    ScaleTooPrecise { response_scale: u8, account_scale: u8 },

    #[error("settlement amount overflow: {amount} at scale {from} to scale {to}")]
    AmountOverflow { amount: u64, from: u8, to: u8 },

    #[error("settlement engine unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    #[error("settlement engine returned status {status}: {body}")]
    EngineStatus { status: u16, body: String },

    #[error("invalid settlement engine response: {0}")]
    InvalidResponse(String),
}
