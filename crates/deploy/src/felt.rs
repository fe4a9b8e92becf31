//! Starknet field elements and the typed values built on top of them.

use std::{fmt, str::FromStr};

use anyhow::Context;
use derive_more::{Deref, Display, From};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Big-endian bytes of the STARK prime `2^251 + 17 * 2^192 + 1`.
const STARK_PRIME: [u8; 32] = [
    0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x11, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
];

/// A Starknet field element, stored as 32 big-endian bytes.
///
/// Values are always strictly below the STARK prime. The textual form is the
/// `0x`-prefixed lowercase hex used by Starknet tooling, without leading zeros.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Felt([u8; 32]);

impl Felt {
    pub const ZERO: Self = Self([0; 32]);

    /// Build a felt from big-endian bytes, rejecting values outside the field.
    pub fn from_bytes_be(bytes: [u8; 32]) -> anyhow::Result<Self> {
        if bytes >= STARK_PRIME {
            anyhow::bail!("Value 0x{} is not a valid field element", hex::encode(bytes));
        }
        Ok(Self(bytes))
    }

    /// Encode a Cairo short string (at most 31 ASCII characters) as a felt.
    pub fn from_short_string(s: &str) -> anyhow::Result<Self> {
        if !s.is_ascii() || s.len() > 31 {
            anyhow::bail!("'{}' is not a valid Cairo short string", s);
        }
        let mut bytes = [0u8; 32];
        bytes[32 - s.len()..].copy_from_slice(s.as_bytes());
        Ok(Self(bytes))
    }

    /// Draw a uniformly random felt below `2^251` from the thread-local CSPRNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        rand::rng().fill(&mut bytes);
        bytes[0] &= 0x07;
        Self(bytes)
    }

    pub fn to_bytes_be(&self) -> [u8; 32] {
        self.0
    }
}

impl From<u64> for Felt {
    fn from(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }
}

impl FromStr for Felt {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim();
        let digits = digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
            .unwrap_or(digits);

        if digits.is_empty() || digits.len() > 64 {
            anyhow::bail!("'{}' is not a hex field element", s);
        }

        let padded = format!("{:0>64}", digits);
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(&padded, &mut bytes)
            .with_context(|| format!("'{}' is not a hex field element", s))?;

        Self::from_bytes_be(bytes)
    }
}

impl TryFrom<String> for Felt {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Felt> for String {
    fn from(value: Felt) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Felt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = hex::encode(self.0);
        let trimmed = encoded.trim_start_matches('0');
        if trimmed.is_empty() {
            f.write_str("0x0")
        } else {
            write!(f, "0x{}", trimmed)
        }
    }
}

impl fmt::Debug for Felt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Address of a deployed contract.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deref, Display, From, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct ContractAddress(Felt);

impl FromStr for ContractAddress {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self).context("Invalid contract address")
    }
}

/// Hash of a declared contract class.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deref, Display, From, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct ClassHash(Felt);

impl FromStr for ClassHash {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self).context("Invalid class hash")
    }
}

/// Salt mixed into contract address derivation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deref, Display, From, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct Salt(Felt);

impl Salt {
    /// A fresh cryptographically random salt.
    pub fn random() -> Self {
        Self(Felt::random())
    }
}
