//! Transaction identifier.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// A 32-byte transaction id.
///
/// Bytes are held in internal (hash output) order. The textual form is the
/// conventional byte-reversed hex used by explorers and wallets.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxId([u8; 32]);

impl TxId {
    pub const ZERO: Self = Self([0u8; 32]);

    /// Wrap raw bytes in internal order.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse the display (reversed) hex form.
    pub fn from_hex(s: &str) -> Result<Self, TypesError> {
        let bytes = hex::decode(s).map_err(|e| TypesError::InvalidTxId(e.to_string()))?;
        let mut arr: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| TypesError::InvalidTxId(format!("expected 32 bytes, got {}", v.len())))?;
        arr.reverse();
        Ok(Self(arr))
    }

    /// Display (reversed) hex form.
    pub fn to_hex(&self) -> String {
        let mut rev = self.0;
        rev.reverse();
        hex::encode(rev)
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxId({})", &self.to_hex()[..8])
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for TxId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for TxId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for TxId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Self::from_hex(&s).map_err(serde::de::Error::custom)
        } else {
            <[u8; 32]>::deserialize(deserializer).map(Self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_byte_reversed() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xab;
        let txid = TxId::new(bytes);
        let text = txid.to_hex();
        assert!(text.ends_with("ab"));
        assert_eq!(TxId::from_hex(&text).unwrap(), txid);
    }

    #[test]
    fn rejects_short_hex() {
        assert!(TxId::from_hex("abcd").is_err());
        assert!(TxId::from_hex("zz").is_err());
    }

    #[test]
    fn json_uses_hex_string() {
        let txid = TxId::new([7u8; 32]);
        let json = serde_json::to_string(&txid).unwrap();
        assert_eq!(json, format!("\"{}\"", "07".repeat(32)));
        let back: TxId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, txid);
    }
}
