use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Maximum length of an ILP address in bytes.
pub const MAX_ADDRESS_LENGTH: usize = 1023;

/// Allocation schemes accepted as the first address segment.
const SCHEMES: &[&str] = &[
    "g", "private", "example", "peer", "self", "test", "test1", "test2", "test3", "local",
];

/// A validated, dot-separated ILP address such as `g.bank.alice`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Parse and validate an address.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        if s.is_empty() || s.len() > MAX_ADDRESS_LENGTH {
            return Err(CoreError::InvalidAddress(s.to_string()));
        }
        let mut segments = s.split('.');
        let scheme = segments.next().unwrap_or_default();
        if !SCHEMES.contains(&scheme) {
            return Err(CoreError::InvalidAddress(s.to_string()));
        }
        for segment in segments {
            if segment.is_empty() || !segment.bytes().all(is_segment_byte) {
                return Err(CoreError::InvalidAddress(s.to_string()));
            }
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The allocation scheme (first segment).
    pub fn scheme(&self) -> &str {
        self.0.split('.').next().unwrap_or_default()
    }

    /// Iterate over the dot-separated segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// Append a segment, producing a child address.
    pub fn with_suffix(&self, suffix: &str) -> Result<Self, CoreError> {
        Self::parse(&format!("{}.{}", self.0, suffix))
    }
}

/// Segment-aware prefix test: `key == prefix` or `key` starts with `prefix + "."`.
pub fn matches_prefix(key: &str, prefix: &str) -> bool {
    key == prefix
        || (key.len() > prefix.len()
            && key.starts_with(prefix)
            && key.as_bytes()[prefix.len()] == b'.')
}

fn is_segment_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'~' || b == b'-'
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
