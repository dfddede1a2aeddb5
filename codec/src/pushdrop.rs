//! PushDrop tokens: data fields pushed and then dropped, guarded by a
//! single-key CHECKSIG lock.
//!
//! Two layouts are recognised:
//!
//! ```text
//! before: <pubkey> OP_CHECKSIG <field>... <OP_2DROP|OP_DROP>...
//! after:  <field>... <OP_2DROP|OP_DROP>... <pubkey> OP_CHECKSIG
//! ```
//!
//! The drop opcodes must remove exactly the pushed fields, and a token
//! carries at least one field.

use crate::script::opcodes::{OP_2DROP, OP_CHECKSIG, OP_DROP};
use crate::script::{push_data, Script, ScriptChunk};
use crate::CodecError;

/// Where the CHECKSIG lock sits relative to the fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockPosition {
    Before,
    After,
}

/// A decoded PushDrop token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushDropToken {
    pub locking_public_key: Vec<u8>,
    pub fields: Vec<Vec<u8>>,
    pub position: LockPosition,
}

impl PushDropToken {
    pub fn new(locking_public_key: Vec<u8>, fields: Vec<Vec<u8>>) -> Self {
        Self {
            locking_public_key,
            fields,
            position: LockPosition::Before,
        }
    }

    /// Decode a locking script. Anything not of the token shape is
    /// rejected with [`CodecError::NotPushDrop`] or [`CodecError::Script`].
    pub fn decode(script: &Script) -> Result<Self, CodecError> {
        let chunks = script.chunks()?;
        if chunks.len() < 4 {
            return Err(not_pushdrop("script too short"));
        }

        if chunks[1].is_op(OP_CHECKSIG) {
            if let Some(key) = public_key(&chunks[0]) {
                let fields = fields_then_drops(&chunks[2..])?;
                return Ok(Self {
                    locking_public_key: key,
                    fields,
                    position: LockPosition::Before,
                });
            }
        }

        let n = chunks.len();
        if chunks[n - 1].is_op(OP_CHECKSIG) {
            if let Some(key) = public_key(&chunks[n - 2]) {
                let fields = fields_then_drops(&chunks[..n - 2])?;
                return Ok(Self {
                    locking_public_key: key,
                    fields,
                    position: LockPosition::After,
                });
            }
        }

        Err(not_pushdrop("no single-key CHECKSIG lock"))
    }

    /// Encode with minimal pushes and the shortest drop sequence.
    pub fn encode(&self) -> Script {
        let mut lock = Vec::with_capacity(self.locking_public_key.len() + 2);
        push_data(&mut lock, &self.locking_public_key);
        lock.push(OP_CHECKSIG);

        let mut body = Vec::new();
        for field in &self.fields {
            push_data(&mut body, field);
        }
        for _ in 0..self.fields.len() / 2 {
            body.push(OP_2DROP);
        }
        if self.fields.len() % 2 == 1 {
            body.push(OP_DROP);
        }

        let bytes = match self.position {
            LockPosition::Before => [lock, body].concat(),
            LockPosition::After => [body, lock].concat(),
        };
        Script::new(bytes)
    }
}

fn not_pushdrop(msg: &str) -> CodecError {
    CodecError::NotPushDrop(msg.to_string())
}

fn public_key(chunk: &ScriptChunk) -> Option<Vec<u8>> {
    match chunk {
        ScriptChunk::Push { data, .. } => match (data.len(), data.first()) {
            (33, Some(0x02 | 0x03)) | (65, Some(0x04)) => Some(data.clone()),
            _ => None,
        },
        ScriptChunk::Op(_) => None,
    }
}

/// Leading pushes followed only by drops that remove exactly those pushes.
fn fields_then_drops(chunks: &[ScriptChunk]) -> Result<Vec<Vec<u8>>, CodecError> {
    let mut fields = Vec::new();
    let mut rest = chunks;
    while let Some((chunk, tail)) = rest.split_first() {
        match chunk.data() {
            Some(data) => fields.push(data),
            None => break,
        }
        rest = tail;
    }
    if fields.is_empty() {
        return Err(not_pushdrop("no data fields"));
    }

    let mut dropped = 0usize;
    for chunk in rest {
        dropped += match chunk {
            c if c.is_op(OP_2DROP) => 2,
            c if c.is_op(OP_DROP) => 1,
            _ => return Err(not_pushdrop("unexpected opcode after fields")),
        };
    }
    if dropped != fields.len() {
        return Err(not_pushdrop(&format!(
            "drops remove {dropped} items but {} fields were pushed",
            fields.len()
        )));
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> Vec<u8> {
        let mut k = vec![0x02];
        k.extend_from_slice(&[0x11; 32]);
        k
    }

    #[test]
    fn decodes_lock_before_layout() {
        let token = PushDropToken::new(key(), vec![vec![0xaa; 32], b"value".to_vec()]);
        let script = token.encode();
        let decoded = PushDropToken::decode(&script).unwrap();
        assert_eq!(decoded, token);
        assert_eq!(*script.as_bytes().last().unwrap(), OP_2DROP);
    }

    #[test]
    fn decodes_lock_after_layout() {
        let token = PushDropToken {
            locking_public_key: key(),
            fields: vec![b"a".to_vec(), b"bc".to_vec(), b"def".to_vec()],
            position: LockPosition::After,
        };
        let decoded = PushDropToken::decode(&token.encode()).unwrap();
        assert_eq!(decoded.position, LockPosition::After);
        assert_eq!(decoded.fields, token.fields);
    }

    #[test]
    fn small_integer_fields_decode_as_bytes() {
        let token = PushDropToken::new(key(), vec![vec![], vec![7], vec![0x81]]);
        let bytes = token.encode().into_bytes();
        assert_eq!(&bytes[35..38], &[0x00, 0x57, 0x4f]);
        let decoded = PushDropToken::decode(&Script::new(bytes)).unwrap();
        assert_eq!(decoded.fields, vec![vec![], vec![7], vec![0x81]]);
    }

    #[test]
    fn rejects_wrong_drop_count() {
        let mut bytes = PushDropToken::new(key(), vec![b"x".to_vec(), b"y".to_vec()])
            .encode()
            .into_bytes();
        // OP_2DROP -> OP_DROP leaves one field on the stack
        *bytes.last_mut().unwrap() = OP_DROP;
        assert!(matches!(
            PushDropToken::decode(&Script::new(bytes)),
            Err(CodecError::NotPushDrop(_))
        ));
    }

    #[test]
    fn rejects_zero_fields_and_bad_keys() {
        let mut no_fields = Vec::new();
        push_data(&mut no_fields, &key());
        no_fields.extend_from_slice(&[OP_CHECKSIG, OP_DROP, OP_DROP]);
        assert!(PushDropToken::decode(&Script::new(no_fields)).is_err());

        let mut bad_key = key();
        bad_key[0] = 0x05;
        let script = PushDropToken::new(bad_key, vec![b"x".to_vec()]).encode();
        assert!(PushDropToken::decode(&script).is_err());
    }

    #[test]
    fn rejects_plain_p2pkh() {
        let mut p2pkh = vec![0x76, 0xa9, 0x14];
        p2pkh.extend_from_slice(&[0u8; 20]);
        p2pkh.extend_from_slice(&[0x88, 0xac]);
        assert!(PushDropToken::decode(&Script::new(p2pkh)).is_err());
    }
}
