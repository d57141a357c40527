use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// Class of an ILP error, derived from the first character of its code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// `F`: the sender should not retry.
    Final,
    /// `T`: the sender may retry later.
    Temporary,
    /// `R`: the sender may retry with adjusted parameters.
    Relative,
    Unknown,
}

/// A three-character ILP wire error code (e.g. `F02`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ErrorCode([u8; 3]);

impl ErrorCode {
    pub const F00_BAD_REQUEST: Self = Self(*b"F00");
    pub const F01_INVALID_PACKET: Self = Self(*b"F01");
    pub const F02_UNREACHABLE: Self = Self(*b"F02");
    pub const F03_INVALID_AMOUNT: Self = Self(*b"F03");
    pub const F05_WRONG_CONDITION: Self = Self(*b"F05");
    pub const F06_UNEXPECTED_PAYMENT: Self = Self(*b"F06");
    pub const F99_APPLICATION_ERROR: Self = Self(*b"F99");
    pub const T00_INTERNAL_ERROR: Self = Self(*b"T00");
    pub const T01_PEER_UNREACHABLE: Self = Self(*b"T01");
    pub const T02_PEER_BUSY: Self = Self(*b"T02");
    pub const T04_INSUFFICIENT_LIQUIDITY: Self = Self(*b"T04");
    pub const T05_RATE_LIMITED: Self = Self(*b"T05");
    pub const R00_TRANSFER_TIMED_OUT: Self = Self(*b"R00");
    pub const R02_INSUFFICIENT_TIMEOUT: Self = Self(*b"R02");

    /// Build a code from raw bytes, requiring three ASCII alphanumerics.
    pub fn new(bytes: [u8; 3]) -> Result<Self, CoreError> {
        if bytes.iter().all(u8::is_ascii_alphanumeric) {
            Ok(Self(bytes))
        } else {
            Err(CoreError::InvalidErrorCode(
                String::from_utf8_lossy(&bytes).into_owned(),
            ))
        }
    }

    pub fn as_bytes(&self) -> &[u8; 3] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        // Constructors only admit ASCII.
        std::str::from_utf8(&self.0).unwrap_or("T00")
    }

    pub fn class(&self) -> ErrorClass {
        match self.0[0] {
            b'F' => ErrorClass::Final,
            b'T' => ErrorClass::Temporary,
            b'R' => ErrorClass::Relative,
            _ => ErrorClass::Unknown,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for ErrorCode {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let bytes: [u8; 3] = value
            .as_bytes()
            .try_into()
            .map_err(|_| CoreError::InvalidErrorCode(value.clone()))?;
        Self::new(bytes)
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        code.as_str().to_string()
    }
}
