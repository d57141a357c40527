/// Core protocol errors: packet codec and address validation.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid ILP address: {0}")]
    InvalidAddress(String),

    #[error("unexpected packet type: expected {expected}, got {actual}")]
    UnexpectedPacketType { expected: u8, actual: u8 },

    #[error("unknown packet type: {0}")]
    UnknownPacketType(u8),

    #[error("packet truncated while reading {0}")]
    Truncated(&'static str),

    #[error("trailing bytes after packet envelope: {0}")]
    TrailingBytes(usize),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("invalid error code: {0}")]
    InvalidErrorCode(String),

    #[error("invalid utf-8 in {0}")]
    InvalidUtf8(&'static str),

    #[error("length prefix too large: {0} bytes")]
    LengthTooLarge(usize),
}
