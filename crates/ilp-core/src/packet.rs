//! ILP Prepare / Fulfill / Reject packets and their binary (OER) encoding.
//!
//! Every packet is a one-byte type tag followed by a variable-length octet
//! string holding the packet body. Variable-length fields inside the body use
//! the same length-prefix rules.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike, Utc};
use sha2::{Digest, Sha256};

use crate::address::Address;
use crate::error::CoreError;
use crate::error_code::ErrorCode;

const TYPE_PREPARE: u8 = 12;
const TYPE_FULFILL: u8 = 13;
const TYPE_REJECT: u8 = 14;

/// Length of the fixed-width `YYYYMMDDHHmmssSSS` timestamp.
const TIMESTAMP_LEN: usize = 17;

/// An ILP Prepare packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prepare {
    /// Amount in the sending account's smallest unit.
    pub amount: u64,
    pub expires_at: DateTime<Utc>,
    /// SHA-256 hash the fulfillment must preimage.
    pub execution_condition: [u8; 32],
    pub destination: Address,
    pub data: Bytes,
}

/// An ILP Fulfill packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fulfill {
    pub fulfillment: [u8; 32],
    pub data: Bytes,
}

/// An ILP Reject packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reject {
    pub code: ErrorCode,
    /// Address of the node that produced the reject; empty on the wire when unknown.
    pub triggered_by: Option<Address>,
    pub message: String,
    pub data: Bytes,
}

/// The response to a Prepare: exactly one of fulfill or reject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Fulfill(Fulfill),
    Reject(Reject),
}

/// Compute the execution condition matching a fulfillment.
pub fn condition_for(fulfillment: &[u8; 32]) -> [u8; 32] {
    Sha256::digest(fulfillment).into()
}

impl Prepare {
    /// Encode to OER. Fails when the expiry does not fit the four-digit year
    /// of the wire timestamp.
    pub fn to_bytes(&self) -> Result<Bytes, CoreError> {
        let mut body = BytesMut::with_capacity(64 + self.destination.as_str().len() + self.data.len());
        body.put_u64(self.amount);
        body.put_slice(format_timestamp(&self.expires_at)?.as_bytes());
        body.put_slice(&self.execution_condition);
        put_var_octets(&mut body, self.destination.as_str().as_bytes());
        put_var_octets(&mut body, &self.data);
        Ok(envelope(TYPE_PREPARE, &body))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let mut body = open_envelope(bytes, TYPE_PREPARE)?;
        if body.remaining() < 8 {
            return Err(CoreError::Truncated("amount"));
        }
        let amount = body.get_u64();
        let expires_at = parse_timestamp(take(&mut body, TIMESTAMP_LEN, "expires_at")?)?;
        let mut execution_condition = [0u8; 32];
        execution_condition.copy_from_slice(take(&mut body, 32, "execution_condition")?);
        let destination = utf8(get_var_octets(&mut body, "destination")?, "destination")?;
        let destination = Address::parse(destination)?;
        let data = Bytes::copy_from_slice(get_var_octets(&mut body, "data")?);
        ensure_consumed(body)?;
        Ok(Self {
            amount,
            expires_at,
            execution_condition,
            destination,
            data,
        })
    }
}

impl Fulfill {
    pub fn to_bytes(&self) -> Bytes {
        let mut body = BytesMut::with_capacity(33 + self.data.len());
        body.put_slice(&self.fulfillment);
        put_var_octets(&mut body, &self.data);
        envelope(TYPE_FULFILL, &body)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let mut body = open_envelope(bytes, TYPE_FULFILL)?;
        let mut fulfillment = [0u8; 32];
        fulfillment.copy_from_slice(take(&mut body, 32, "fulfillment")?);
        let data = Bytes::copy_from_slice(get_var_octets(&mut body, "data")?);
        ensure_consumed(body)?;
        Ok(Self { fulfillment, data })
    }

    /// True if this fulfillment hashes to `condition`.
    pub fn matches(&self, condition: &[u8; 32]) -> bool {
        condition_for(&self.fulfillment) == *condition
    }
}

impl Reject {
    /// Build a reject with an empty data field.
    pub fn new(code: ErrorCode, triggered_by: Option<Address>, message: impl Into<String>) -> Self {
        Self {
            code,
            triggered_by,
            message: message.into(),
            data: Bytes::new(),
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        let triggered_by = self
            .triggered_by
            .as_ref()
            .map(|a| a.as_str().as_bytes())
            .unwrap_or_default();
        let mut body = BytesMut::with_capacity(8 + triggered_by.len() + self.message.len() + self.data.len());
        body.put_slice(self.code.as_bytes());
        put_var_octets(&mut body, triggered_by);
        put_var_octets(&mut body, self.message.as_bytes());
        put_var_octets(&mut body, &self.data);
        envelope(TYPE_REJECT, &body)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let mut body = open_envelope(bytes, TYPE_REJECT)?;
        let mut code = [0u8; 3];
        code.copy_from_slice(take(&mut body, 3, "code")?);
        let code = ErrorCode::new(code)?;
        let triggered_by = utf8(get_var_octets(&mut body, "triggered_by")?, "triggered_by")?;
        let triggered_by = if triggered_by.is_empty() {
            None
        } else {
            Some(Address::parse(triggered_by)?)
        };
        let message = utf8(get_var_octets(&mut body, "message")?, "message")?.to_string();
        let data = Bytes::copy_from_slice(get_var_octets(&mut body, "data")?);
        ensure_consumed(body)?;
        Ok(Self {
            code,
            triggered_by,
            message,
            data,
        })
    }
}

impl Reply {
    pub fn is_fulfill(&self) -> bool {
        matches!(self, Reply::Fulfill(_))
    }

    pub fn to_bytes(&self) -> Bytes {
        match self {
            Reply::Fulfill(f) => f.to_bytes(),
            Reply::Reject(r) => r.to_bytes(),
        }
    }

    /// Decode either a fulfill or a reject, based on the type tag.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        match bytes.first() {
            Some(&TYPE_FULFILL) => Fulfill::from_bytes(bytes).map(Reply::Fulfill),
            Some(&TYPE_REJECT) => Reject::from_bytes(bytes).map(Reply::Reject),
            Some(&other) => Err(CoreError::UnknownPacketType(other)),
            None => Err(CoreError::Truncated("packet type")),
        }
    }
}

impl From<Fulfill> for Reply {
    fn from(fulfill: Fulfill) -> Self {
        Reply::Fulfill(fulfill)
    }
}

impl From<Reject> for Reply {
    fn from(reject: Reject) -> Self {
        Reply::Reject(reject)
    }
}

fn envelope(packet_type: u8, body: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(body.len() + 6);
    out.put_u8(packet_type);
    put_var_octets(&mut out, body);
    out.freeze()
}

fn open_envelope(bytes: &[u8], expected: u8) -> Result<&[u8], CoreError> {
    let mut buf = bytes;
    if !buf.has_remaining() {
        return Err(CoreError::Truncated("packet type"));
    }
    let actual = buf.get_u8();
    if actual != expected {
        return Err(CoreError::UnexpectedPacketType { expected, actual });
    }
    let body = get_var_octets(&mut buf, "envelope")?;
    ensure_consumed(buf)?;
    Ok(body)
}

fn put_var_octets(buf: &mut BytesMut, data: &[u8]) {
    let len = data.len();
    if len < 128 {
        buf.put_u8(len as u8);
    } else {
        let len_bytes = (len as u64).to_be_bytes();
        let skip = len_bytes.iter().take_while(|b| **b == 0).count();
        buf.put_u8(0x80 | (8 - skip) as u8);
        buf.put_slice(&len_bytes[skip..]);
    }
    buf.put_slice(data);
}

fn get_var_octets<'a>(buf: &mut &'a [u8], what: &'static str) -> Result<&'a [u8], CoreError> {
    if !buf.has_remaining() {
        return Err(CoreError::Truncated(what));
    }
    let first = buf.get_u8();
    let len = if first & 0x80 == 0 {
        first as usize
    } else {
        let n = (first & 0x7f) as usize;
        if n == 0 || n > 8 {
            return Err(CoreError::LengthTooLarge(n));
        }
        let len_bytes = take(buf, n, what)?;
        let len = len_bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
        usize::try_from(len).map_err(|_| CoreError::LengthTooLarge(n))?
    };
    take(buf, len, what)
}

fn take<'a>(buf: &mut &'a [u8], n: usize, what: &'static str) -> Result<&'a [u8], CoreError> {
    if buf.len() < n {
        return Err(CoreError::Truncated(what));
    }
    let (head, tail) = buf.split_at(n);
    *buf = tail;
    Ok(head)
}

fn ensure_consumed(buf: &[u8]) -> Result<(), CoreError> {
    if buf.is_empty() {
        Ok(())
    } else {
        Err(CoreError::TrailingBytes(buf.len()))
    }
}

fn utf8<'a>(bytes: &'a [u8], what: &'static str) -> Result<&'a str, CoreError> {
    std::str::from_utf8(bytes).map_err(|_| CoreError::InvalidUtf8(what))
}

/// Format as the 17-character ILP timestamp `YYYYMMDDHHmmssSSS` (UTC).
pub fn format_timestamp(ts: &DateTime<Utc>) -> Result<String, CoreError> {
    if !(0..=9999).contains(&ts.year()) {
        return Err(CoreError::InvalidTimestamp(ts.to_rfc3339()));
    }
    Ok(format!(
        "{:04}{:02}{:02}{:02}{:02}{:02}{:03}",
        ts.year(),
        ts.month(),
        ts.day(),
        ts.hour(),
        ts.minute(),
        ts.second(),
        ts.timestamp_subsec_millis().min(999)
    ))
}

/// Parse the 17-character ILP timestamp.
pub fn parse_timestamp(raw: &[u8]) -> Result<DateTime<Utc>, CoreError> {
    let invalid = || CoreError::InvalidTimestamp(String::from_utf8_lossy(raw).into_owned());
    if raw.len() != TIMESTAMP_LEN || !raw.iter().all(u8::is_ascii_digit) {
        return Err(invalid());
    }
    let num = |range: std::ops::Range<usize>| {
        raw[range]
            .iter()
            .fold(0u32, |acc, d| acc * 10 + u32::from(d - b'0'))
    };
    let date = NaiveDate::from_ymd_opt(num(0..4) as i32, num(4..6), num(6..8)).ok_or_else(invalid)?;
    let naive = date
        .and_hms_milli_opt(num(8..10), num(10..12), num(12..14), num(14..17))
        .ok_or_else(invalid)?;
    Ok(Utc.from_utc_datetime(&naive))
}
