//! Bounds-checked cursor over a byte slice, plus the Bitcoin varint.

use crate::CodecError;

/// Forward-only reader. Every read checks the remaining length first.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Fail unless the whole input was consumed.
    pub fn finish(&self) -> Result<(), CodecError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(CodecError::TrailingBytes(n)),
        }
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if len > self.remaining() {
            return Err(CodecError::UnexpectedEof {
                offset: self.pos,
                needed: len - self.remaining(),
            });
        }
        let out = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16, CodecError> {
        let mut arr = [0u8; 2];
        arr.copy_from_slice(self.read_bytes(2)?);
        Ok(u16::from_le_bytes(arr))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, CodecError> {
        let mut arr = [0u8; 4];
        arr.copy_from_slice(self.read_bytes(4)?);
        Ok(u32::from_le_bytes(arr))
    }

    pub fn read_u64_le(&mut self) -> Result<u64, CodecError> {
        let mut arr = [0u8; 8];
        arr.copy_from_slice(self.read_bytes(8)?);
        Ok(u64::from_le_bytes(arr))
    }

    pub fn read_array32(&mut self) -> Result<[u8; 32], CodecError> {
        let mut arr = [0u8; 32];
        arr.copy_from_slice(self.read_bytes(32)?);
        Ok(arr)
    }

    /// Bitcoin CompactSize integer.
    pub fn read_varint(&mut self) -> Result<u64, CodecError> {
        match self.read_u8()? {
            0xfd => Ok(u64::from(self.read_u16_le()?)),
            0xfe => Ok(u64::from(self.read_u32_le()?)),
            0xff => self.read_u64_le(),
            n => Ok(u64::from(n)),
        }
    }

    /// A varint used as an element count or byte length.
    ///
    /// Counts larger than the remaining input are rejected up front so a
    /// hostile length never drives a large allocation.
    pub fn read_len(&mut self) -> Result<usize, CodecError> {
        let offset = self.pos;
        let n = self.read_varint()?;
        if n > self.remaining() as u64 {
            return Err(CodecError::UnexpectedEof {
                offset,
                needed: usize::try_from(n).unwrap_or(usize::MAX) - self.remaining(),
            });
        }
        Ok(n as usize)
    }

    /// A varint-prefixed byte string.
    pub fn read_var_bytes(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.read_len()?;
        self.read_bytes(len)
    }
}

/// Append a Bitcoin CompactSize integer.
pub fn write_varint(buf: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => buf.push(n as u8),
        0xfd..=0xffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            buf.push(0xfe);
            buf.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xff);
            buf.extend_from_slice(&n.to_le_bytes());
        }
    }
}

/// Append a varint-prefixed byte string.
pub fn write_var_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    write_varint(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_boundaries() {
        for n in [0u64, 0xfc, 0xfd, 0xffff, 0x1_0000, 0xffff_ffff, 0x1_0000_0000] {
            let mut buf = Vec::new();
            write_varint(&mut buf, n);
            let mut reader = Reader::new(&buf);
            assert_eq!(reader.read_varint().unwrap(), n);
            assert!(reader.finish().is_ok());
        }
    }

    #[test]
    fn read_len_rejects_lengths_past_end() {
        let buf = [0xfe, 0xff, 0xff, 0xff, 0x7f, 0x00];
        let mut reader = Reader::new(&buf);
        assert!(matches!(
            reader.read_len(),
            Err(CodecError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn short_read_reports_offset() {
        let mut reader = Reader::new(&[1, 2, 3]);
        reader.read_u8().unwrap();
        match reader.read_u32_le() {
            Err(CodecError::UnexpectedEof { offset, needed }) => {
                assert_eq!(offset, 1);
                assert_eq!(needed, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
