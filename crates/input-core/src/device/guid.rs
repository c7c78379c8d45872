//! 16-byte stable device identity.
//!
//! A [`DeviceGuid`] identifies a *model* of device, not a particular session:
//! two identical pads plugged in at the same time share one GUID but receive
//! distinct [`InstanceId`](super::InstanceId)s.  The GUID is what controller
//! mapping records are keyed on.
//!
//! # Layout
//!
//! When the producer knows the bus identity, the GUID is eight little-endian
//! 16-bit words:
//!
//! ```text
//! [bus, 0, vendor, 0, product, 0, version, 0]
//! ```
//!
//! Otherwise the first word is the bus tag, the second is zero and the display
//! name fills the remaining twelve bytes (truncated or zero-padded).  Either way
//! re-enumerating the same physical device yields the same bytes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Length of the hex string form of a GUID.
pub const GUID_HEX_LEN: usize = 32;

/// Error returned when a GUID string cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuidParseError {
    #[error("GUID string must be {GUID_HEX_LEN} hex digits, got {0} characters")]
    InvalidLength(usize),
    #[error("invalid hex digit {0:?} in GUID string")]
    InvalidDigit(char),
}

/// Bus-level identity reported by a device producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BusIdentity {
    pub bus: u16,
    pub vendor: u16,
    pub product: u16,
    pub version: u16,
}

impl BusIdentity {
    /// All of vendor, product and version must be known for the bus layout to apply.
    pub fn is_complete(&self) -> bool {
        self.vendor != 0 && self.product != 0 && self.version != 0
    }
}

/// 16-byte device identity, hex-encoded on the wire and in mapping records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct DeviceGuid(pub [u8; 16]);

impl DeviceGuid {
    /// The all-zero GUID, used for devices with no identity at all.
    pub const ZERO: DeviceGuid = DeviceGuid([0; 16]);

    /// Builds a GUID from a complete bus identity.
    pub fn from_bus(identity: BusIdentity) -> Self {
        let words = [
            identity.bus,
            0,
            identity.vendor,
            0,
            identity.product,
            0,
            identity.version,
            0,
        ];
        let mut bytes = [0u8; 16];
        for (chunk, word) in bytes.chunks_exact_mut(2).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        DeviceGuid(bytes)
    }

    /// Builds a GUID from a bus tag and the device's display name.
    pub fn from_name(bus: u16, name: &str) -> Self {
        let mut bytes = [0u8; 16];
        bytes[..2].copy_from_slice(&bus.to_le_bytes());
        let name = name.as_bytes();
        let n = name.len().min(12);
        bytes[4..4 + n].copy_from_slice(&name[..n]);
        DeviceGuid(bytes)
    }

    /// Picks the bus layout when the identity is complete, the name layout otherwise.
    pub fn derive(bus: Option<BusIdentity>, name: &str) -> Self {
        match bus {
            Some(id) if id.is_complete() => Self::from_bus(id),
            Some(id) => Self::from_name(id.bus, name),
            None => Self::from_name(0, name),
        }
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 16]
    }

    /// Lowercase 32-character hex encoding.
    pub fn to_hex(&self) -> String {
        const DIGITS: &[u8; 16] = b"0123456789abcdef";
        let mut out = String::with_capacity(GUID_HEX_LEN);
        for byte in self.0 {
            out.push(DIGITS[(byte >> 4) as usize] as char);
            out.push(DIGITS[(byte & 0x0F) as usize] as char);
        }
        out
    }
}

impl fmt::Display for DeviceGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for DeviceGuid {
    type Err = GuidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != GUID_HEX_LEN {
            return Err(GuidParseError::InvalidLength(s.chars().count()));
        }
        let mut bytes = [0u8; 16];
        let digits: Vec<char> = s.chars().collect();
        for (byte, pair) in bytes.iter_mut().zip(digits.chunks_exact(2)) {
            let hi = pair[0].to_digit(16).ok_or(GuidParseError::InvalidDigit(pair[0]))?;
            let lo = pair[1].to_digit(16).ok_or(GuidParseError::InvalidDigit(pair[1]))?;
            *byte = (hi << 4 | lo) as u8;
        }
        Ok(DeviceGuid(bytes))
    }
}

impl Serialize for DeviceGuid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for DeviceGuid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
