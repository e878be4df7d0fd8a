use std::{
    fmt::{Display, Formatter, Write},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const HASH_BYTE_WIDTH: usize = 16;

/// 128 bit digest of a baked node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentHash(pub [u8; HASH_BYTE_WIDTH]);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashError {
    #[error("bad hex length: expected {expected} characters, got {actual}")]
    BadHexLength { expected: usize, actual: usize },
    #[error("invalid hex digit {0:?}")]
    BadHexDigit(char),
}

impl ContentHash {
    pub fn from_hasher(hasher: &blake3::Hasher) -> Self {
        let digest = hasher.finalize();
        let mut bytes = [0; HASH_BYTE_WIDTH];
        bytes.copy_from_slice(&digest.as_bytes()[..HASH_BYTE_WIDTH]);
        Self(bytes)
    }

    /// Lowercase, two characters per byte.
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(HASH_BYTE_WIDTH * 2);
        for byte in self.0 {
            // Writing into a String cannot fail
            let _ = write!(out, "{:02x}", byte);
        }
        out
    }

    pub fn from_hex(hex: &str) -> Result<Self, HashError> {
        let actual = hex.chars().count();
        if actual != HASH_BYTE_WIDTH * 2 {
            return Err(HashError::BadHexLength {
                expected: HASH_BYTE_WIDTH * 2,
                actual,
            });
        }
        let mut bytes = [0; HASH_BYTE_WIDTH];
        let digits = hex.as_bytes();
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = (hex_digit(digits[i * 2])? << 4) | hex_digit(digits[i * 2 + 1])?;
        }
        Ok(Self(bytes))
    }
}

fn hex_digit(c: u8) -> Result<u8, HashError> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(HashError::BadHexDigit(c as char)),
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for ContentHash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Order dependent reduction, `seed ^= value + golden + (seed << 6) + (seed >> 2)`.
pub fn hash_combine(seed: u64, value: u64) -> u64 {
    seed ^ value
        .wrapping_add(0x9e37_79b9)
        .wrapping_add(seed << 6)
        .wrapping_add(seed >> 2)
}

/// Stable 64 bit hash of a string, for use with [`hash_combine`].
pub fn hash_str(value: &str) -> u64 {
    let digest = blake3::hash(value.as_bytes());
    let mut bytes = [0; 8];
    bytes.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let hash = ContentHash([
            0x00, 0x01, 0x0a, 0xff, 0x10, 0x20, 0x30, 0x40, 0x50, 0x60, 0x70, 0x80, 0x90, 0xa0,
            0xb0, 0xc0,
        ]);
        let hex = hash.to_hex();
        assert_eq!(hex, "00010aff102030405060708090a0b0c0");
        assert_eq!(ContentHash::from_hex(&hex).unwrap(), hash);
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(
            ContentHash::from_hex("abcd"),
            Err(HashError::BadHexLength {
                expected: 32,
                actual: 4
            })
        );
    }

    #[test]
    fn rejects_non_hex() {
        let bad = "zz".repeat(HASH_BYTE_WIDTH);
        assert_eq!(ContentHash::from_hex(&bad), Err(HashError::BadHexDigit('z')));
    }

    #[test]
    fn combine_is_order_dependent() {
        let a = hash_combine(hash_combine(0, 1), 2);
        let b = hash_combine(hash_combine(0, 2), 1);
        assert_ne!(a, b);
        assert_eq!(a, hash_combine(hash_combine(0, 1), 2));
    }
}
