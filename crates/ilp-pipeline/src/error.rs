use ilp_core::{Address, ErrorCode, Reject};
use ilp_routing::RoutingError;
use ilp_settlement::{LedgerError, SettlementError};

use crate::rates::RatesError;

/// Message used on the wire for errors whose details must stay local.
pub const INTERNAL_ERROR_MESSAGE: &str = "unexpected internal error";

/// Errors raised by pipeline stages. Each maps onto an ILP wire error code.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no route found for destination {0}")]
    NoRoute(String),

    #[error("{0}")]
    InsufficientLiquidity(String),

    #[error("{0}")]
    InsufficientTimeout(String),

    #[error("transfer timed out")]
    TransferTimedOut,

    #[error("fulfillment did not match expected value")]
    WrongCondition,

    #[error("invalid packet: {0}")]
    InvalidPacket(String),

    #[error("peer not found: {0}")]
    PeerNotFound(String),

    #[error("peer unreachable: {0}")]
    PeerUnreachable(String),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Settlement(#[from] SettlementError),

    #[error(transparent)]
    Rates(#[from] RatesError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            PipelineError::NoRoute(_) | PipelineError::PeerNotFound(_) => ErrorCode::F02_UNREACHABLE,
            PipelineError::Routing(RoutingError::NoRoute { .. }) => ErrorCode::F02_UNREACHABLE,
            PipelineError::InsufficientLiquidity(_) => ErrorCode::T04_INSUFFICIENT_LIQUIDITY,
            PipelineError::Ledger(LedgerError::ExceedsMaximumBalance(_)) => {
                ErrorCode::T04_INSUFFICIENT_LIQUIDITY
            }
            PipelineError::InsufficientTimeout(_) => ErrorCode::R02_INSUFFICIENT_TIMEOUT,
            PipelineError::TransferTimedOut => ErrorCode::R00_TRANSFER_TIMED_OUT,
            PipelineError::WrongCondition => ErrorCode::F05_WRONG_CONDITION,
            PipelineError::InvalidPacket(_) => ErrorCode::F01_INVALID_PACKET,
            PipelineError::PeerUnreachable(_) => ErrorCode::T01_PEER_UNREACHABLE,
            _ => ErrorCode::T00_INTERNAL_ERROR,
        }
    }

    /// The message carried on the wire. Internal errors never leak their details.
    pub fn wire_message(&self) -> String {
        match self {
            PipelineError::Ledger(LedgerError::ExceedsMaximumBalance(_)) => {
                "exceeded maximum balance".to_string()
            }
            PipelineError::PeerUnreachable(_) => "peer unreachable".to_string(),
            _ if self.code() == ErrorCode::T00_INTERNAL_ERROR => INTERNAL_ERROR_MESSAGE.to_string(),
            _ => self.to_string(),
        }
    }

    pub fn to_reject(&self, triggered_by: &Address) -> Reject {
        Reject::new(self.code(), Some(triggered_by.clone()), self.wire_message())
    }
}
