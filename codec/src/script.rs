//! Script chunking and minimal data pushes.

use crate::CodecError;

pub mod opcodes {
    pub const OP_0: u8 = 0x00;
    pub const OP_PUSHDATA1: u8 = 0x4c;
    pub const OP_PUSHDATA2: u8 = 0x4d;
    pub const OP_PUSHDATA4: u8 = 0x4e;
    pub const OP_1NEGATE: u8 = 0x4f;
    pub const OP_1: u8 = 0x51;
    pub const OP_16: u8 = 0x60;
    pub const OP_RETURN: u8 = 0x6a;
    pub const OP_2DROP: u8 = 0x6d;
    pub const OP_DROP: u8 = 0x75;
    pub const OP_CHECKSIG: u8 = 0xac;
}

use opcodes::*;

/// One parsed element of a script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptChunk {
    /// A data push, with the opcode that introduced it.
    Push { opcode: u8, data: Vec<u8> },
    /// Any non-push opcode.
    Op(u8),
}

impl ScriptChunk {
    /// The pushed value, treating the small-integer opcodes as pushes of
    /// their numeric value.
    pub fn data(&self) -> Option<Vec<u8>> {
        match self {
            ScriptChunk::Push { data, .. } => Some(data.clone()),
            ScriptChunk::Op(OP_1NEGATE) => Some(vec![0x81]),
            ScriptChunk::Op(op) if (OP_1..=OP_16).contains(op) => Some(vec![op - OP_1 + 1]),
            ScriptChunk::Op(_) => None,
        }
    }

    pub fn is_op(&self, opcode: u8) -> bool {
        matches!(self, ScriptChunk::Op(op) if *op == opcode)
    }
}

/// A locking or unlocking script.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Script(Vec<u8>);

impl Script {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, CodecError> {
        Ok(Self(hex::decode(s)?))
    }

    /// Split into chunks. Truncated pushes are an error.
    pub fn chunks(&self) -> Result<Vec<ScriptChunk>, CodecError> {
        let bytes = &self.0;
        let mut out = Vec::new();
        let mut i = 0usize;
        while i < bytes.len() {
            let op = bytes[i];
            i += 1;
            let len = match op {
                0x01..=0x4b => op as usize,
                OP_PUSHDATA1 => {
                    let n = read_le(bytes, i, 1)?;
                    i += 1;
                    n
                }
                OP_PUSHDATA2 => {
                    let n = read_le(bytes, i, 2)?;
                    i += 2;
                    n
                }
                OP_PUSHDATA4 => {
                    let n = read_le(bytes, i, 4)?;
                    i += 4;
                    n
                }
                OP_0 => {
                    out.push(ScriptChunk::Push { opcode: op, data: Vec::new() });
                    continue;
                }
                _ => {
                    out.push(ScriptChunk::Op(op));
                    continue;
                }
            };
            let end = i
                .checked_add(len)
                .filter(|end| *end <= bytes.len())
                .ok_or_else(|| {
                    CodecError::Script(format!("push of {len} bytes at offset {i} runs past end"))
                })?;
            out.push(ScriptChunk::Push { opcode: op, data: bytes[i..end].to_vec() });
            i = end;
        }
        Ok(out)
    }
}

impl From<Vec<u8>> for Script {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

fn read_le(bytes: &[u8], at: usize, width: usize) -> Result<usize, CodecError> {
    let slice = bytes
        .get(at..at + width)
        .ok_or_else(|| CodecError::Script(format!("truncated push length at offset {at}")))?;
    Ok(slice
        .iter()
        .rev()
        .fold(0usize, |acc, b| (acc << 8) | *b as usize))
}

/// Append `data` using the smallest push encoding.
pub fn push_data(buf: &mut Vec<u8>, data: &[u8]) {
    match data {
        [] => buf.push(OP_0),
        [n @ 1..=16] => buf.push(OP_1 + n - 1),
        [0x81] => buf.push(OP_1NEGATE),
        _ => {
            let len = data.len();
            if len <= 0x4b {
                buf.push(len as u8);
            } else if len <= 0xff {
                buf.push(OP_PUSHDATA1);
                buf.push(len as u8);
            } else if len <= 0xffff {
                buf.push(OP_PUSHDATA2);
                buf.extend_from_slice(&(len as u16).to_le_bytes());
            } else {
                buf.push(OP_PUSHDATA4);
                buf.extend_from_slice(&(len as u32).to_le_bytes());
            }
            buf.extend_from_slice(data);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_values_use_number_opcodes() {
        let mut buf = Vec::new();
        push_data(&mut buf, &[]);
        push_data(&mut buf, &[5]);
        push_data(&mut buf, &[0x81]);
        assert_eq!(buf, vec![OP_0, 0x55, OP_1NEGATE]);

        let chunks = Script::new(buf).chunks().unwrap();
        let values: Vec<_> = chunks.iter().map(|c| c.data().unwrap()).collect();
        assert_eq!(values, vec![vec![], vec![5], vec![0x81]]);
    }

    #[test]
    fn push_width_thresholds() {
        for (len, prefix) in [(75usize, 1usize), (76, 2), (255, 2), (256, 3), (65_536, 5)] {
            let data = vec![0xaa; len];
            let mut buf = Vec::new();
            push_data(&mut buf, &data);
            assert_eq!(buf.len(), len + prefix, "len {len}");
            let chunks = Script::new(buf).chunks().unwrap();
            assert_eq!(chunks.len(), 1);
            assert_eq!(chunks[0].data().unwrap(), data);
        }
    }

    #[test]
    fn truncated_push_is_rejected() {
        assert!(Script::new(vec![0x05, 1, 2]).chunks().is_err());
        assert!(Script::new(vec![OP_PUSHDATA2, 0x01]).chunks().is_err());
    }

    #[test]
    fn plain_opcodes_are_ops() {
        let chunks = Script::new(vec![OP_DROP, OP_CHECKSIG]).chunks().unwrap();
        assert!(chunks[0].is_op(OP_DROP));
        assert!(chunks[1].is_op(OP_CHECKSIG));
        assert_eq!(chunks[0].data(), None);
    }
}
