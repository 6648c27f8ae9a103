//! Byte buffer that renders as lowercase hexadecimal.
//!
//! Bytecode is read and written as hex everywhere outside this crate (compiler output, RPC
//! traces, test fixtures), so `HexBytes` serializes to and from a hex string and prints as one in
//! `Debug`. It derefs to `[u8]` so the matching code can work on plain slices.

use crate::normalize_hex_string;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Deref;

/// Wrapper around `Vec<u8>` that renders as contiguous lowercase hex for debug and serialization.
///
/// # Examples
///
/// ```
/// use sleuth_core::HexBytes;
///
/// let code = HexBytes::from_hex("0x6001").unwrap();
/// assert_eq!(format!("{code:?}"), "6001");
/// assert_eq!(&code[..], &[0x60, 0x01]);
/// ```
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct HexBytes(pub Vec<u8>);

impl HexBytes {
    /// Parses a hex string, with or without `0x` prefix, in any letter case.
    pub fn from_hex(input: &str) -> Result<Self, hex::FromHexError> {
        let normalized = normalize_hex_string(input)?;
        Ok(Self(hex::decode(normalized)?))
    }

    /// Lowercase hex encoding without prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for HexBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for HexBytes {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<HexBytes> for Vec<u8> {
    fn from(bytes: HexBytes) -> Self {
        bytes.0
    }
}

impl AsRef<[u8]> for HexBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Deref for HexBytes {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.0.as_slice()
    }
}

impl fmt::Debug for HexBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for HexBytes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for HexBytes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct HexBytesVisitor;

        impl Visitor<'_> for HexBytesVisitor {
            type Value = HexBytes;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a hex string, optionally 0x-prefixed")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                HexBytes::from_hex(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(HexBytesVisitor)
    }
}

impl PartialEq<[u8]> for HexBytes {
    fn eq(&self, other: &[u8]) -> bool {
        self.0 == other
    }
}

impl PartialEq<Vec<u8>> for HexBytes {
    fn eq(&self, other: &Vec<u8>) -> bool {
        &self.0 == other
    }
}
