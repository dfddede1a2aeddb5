//! KVStore token format.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use overlay_codec::{CodecError, PushDropToken, Script};
use thiserror::Error;

/// Number of PushDrop fields a KVStore token carries.
pub const FIELD_COUNT: usize = 2;
/// Length of the protected key in field 0.
pub const PROTECTED_KEY_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error(transparent)]
    Decode(#[from] CodecError),

    #[error("KVStore tokens have 2 fields, this one has {0}")]
    FieldCount(usize),

    #[error("KVStore protected keys are 32 bytes, this one is {0}")]
    KeyLength(usize),
}

/// A decoded and validated KVStore token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KvStoreToken {
    pub protected_key: [u8; PROTECTED_KEY_LEN],
    pub value: Vec<u8>,
}

impl KvStoreToken {
    /// Decode a locking script and apply the exact field-count and key-size
    /// checks.
    pub fn from_script(locking_script: &[u8]) -> Result<Self, TokenError> {
        let token = PushDropToken::decode(&Script::new(locking_script.to_vec()))?;
        let [key, value]: [Vec<u8>; FIELD_COUNT] = token
            .fields
            .try_into()
            .map_err(|fields: Vec<Vec<u8>>| TokenError::FieldCount(fields.len()))?;
        let protected_key = key
            .as_slice()
            .try_into()
            .map_err(|_| TokenError::KeyLength(key.len()))?;
        Ok(Self {
            protected_key,
            value,
        })
    }

    /// Index key: base64 of the protected key.
    pub fn lookup_key(&self) -> String {
        STANDARD.encode(self.protected_key)
    }

    /// The value as text; invalid UTF-8 sequences are replaced.
    pub fn value_text(&self) -> String {
        String::from_utf8_lossy(&self.value).into_owned()
    }

    /// Locking script carrying this token, locked to `public_key`.
    pub fn to_script(&self, public_key: &[u8]) -> Script {
        PushDropToken::new(
            public_key.to_vec(),
            vec![self.protected_key.to_vec(), self.value.clone()],
        )
        .encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> Vec<u8> {
        let mut k = vec![0x03];
        k.extend_from_slice(&[0x44; 32]);
        k
    }

    fn script(fields: Vec<Vec<u8>>) -> Vec<u8> {
        PushDropToken::new(key(), fields).encode().into_bytes()
    }

    #[test]
    fn valid_token() {
        let token = KvStoreToken::from_script(&script(vec![vec![7; 32], b"hello".to_vec()])).unwrap();
        assert_eq!(token.value_text(), "hello");
        assert_eq!(token.lookup_key(), STANDARD.encode([7u8; 32]));
        assert_eq!(token.to_script(&key()).into_bytes(), script(vec![vec![7; 32], b"hello".to_vec()]));
    }

    #[test]
    fn field_count_is_exact() {
        assert!(matches!(
            KvStoreToken::from_script(&script(vec![vec![7; 32]])),
            Err(TokenError::FieldCount(1))
        ));
        assert!(matches!(
            KvStoreToken::from_script(&script(vec![vec![7; 32], b"v".to_vec(), b"x".to_vec()])),
            Err(TokenError::FieldCount(3))
        ));
    }

    #[test]
    fn key_length_is_exact() {
        assert!(matches!(
            KvStoreToken::from_script(&script(vec![vec![7; 31], b"v".to_vec()])),
            Err(TokenError::KeyLength(31))
        ));
        assert!(matches!(
            KvStoreToken::from_script(&script(vec![vec![7; 33], b"v".to_vec()])),
            Err(TokenError::KeyLength(33))
        ));
    }

    #[test]
    fn non_pushdrop_is_a_decode_error() {
        assert!(matches!(
            KvStoreToken::from_script(&[0x6a, 0x01, 0x00]),
            Err(TokenError::Decode(_))
        ));
    }
}
