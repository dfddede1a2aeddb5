//! Bitcoin transaction serialization.

use overlay_types::{OutputRef, TxId};

use crate::reader::{write_var_bytes, write_varint, Reader};
use crate::{sha256d, CodecError, Script};

/// Smallest possible serialized input: 32 + 4 + 1 + 4.
const MIN_INPUT_SIZE: usize = 41;
/// Smallest possible serialized output: 8 + 1.
const MIN_OUTPUT_SIZE: usize = 9;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxInput {
    /// Outpoint being spent; the txid is in internal byte order.
    pub previous_output: OutputRef,
    pub unlocking_script: Script,
    pub sequence: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxOutput {
    pub satoshis: u64,
    pub locking_script: Script,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub lock_time: u32,
}

impl Default for Transaction {
    fn default() -> Self {
        Self {
            version: 1,
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: 0,
        }
    }
}

impl Transaction {
    /// Parse a complete raw transaction, rejecting trailing bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut reader = Reader::new(bytes);
        let tx = Self::read(&mut reader)?;
        reader.finish()?;
        Ok(tx)
    }

    pub fn from_hex(s: &str) -> Result<Self, CodecError> {
        Self::from_bytes(&hex::decode(s)?)
    }

    /// Read one transaction from a stream, leaving the cursor after it.
    pub fn read(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        let version = reader.read_u32_le()?;

        let input_count = reader.read_len()?;
        let mut inputs = Vec::with_capacity(input_count.min(reader.remaining() / MIN_INPUT_SIZE));
        for _ in 0..input_count {
            let txid = TxId::new(reader.read_array32()?);
            let output_index = reader.read_u32_le()?;
            let unlocking_script = Script::new(reader.read_var_bytes()?.to_vec());
            let sequence = reader.read_u32_le()?;
            inputs.push(TxInput {
                previous_output: OutputRef::new(txid, output_index),
                unlocking_script,
                sequence,
            });
        }

        let output_count = reader.read_len()?;
        let mut outputs =
            Vec::with_capacity(output_count.min(reader.remaining() / MIN_OUTPUT_SIZE));
        for _ in 0..output_count {
            let satoshis = reader.read_u64_le()?;
            let locking_script = Script::new(reader.read_var_bytes()?.to_vec());
            outputs.push(TxOutput {
                satoshis,
                locking_script,
            });
        }

        let lock_time = reader.read_u32_le()?;
        Ok(Self {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }

    pub fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.version.to_le_bytes());
        write_varint(buf, self.inputs.len() as u64);
        for input in &self.inputs {
            buf.extend_from_slice(input.previous_output.txid.as_bytes());
            buf.extend_from_slice(&input.previous_output.output_index.to_le_bytes());
            write_var_bytes(buf, input.unlocking_script.as_bytes());
            buf.extend_from_slice(&input.sequence.to_le_bytes());
        }
        write_varint(buf, self.outputs.len() as u64);
        for output in &self.outputs {
            buf.extend_from_slice(&output.satoshis.to_le_bytes());
            write_var_bytes(buf, output.locking_script.as_bytes());
        }
        buf.extend_from_slice(&self.lock_time.to_le_bytes());
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write(&mut buf);
        buf
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn txid(&self) -> TxId {
        TxId::new(sha256d(&self.to_bytes()))
    }

    /// Reference to one of this transaction's outputs.
    pub fn output_ref(&self, output_index: u32) -> OutputRef {
        OutputRef::new(self.txid(), output_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // First transaction of block 170: 10 BTC from Satoshi to Hal Finney.
    const BLOCK_170_TX: &str = "0100000001c997a5e56e104102fa209c6a852dd90660a20b2d9c352423edce25857fcd3704000000004847304402204e45e16932b8af514961a1d3a1a25fdf3f4f7732e9d624c6c61548ab5fb8cd410220181522ec8eca07de4860a4acdd12909d831cc56cbbac4622082221a8768d1d0901ffffffff0200ca9a3b00000000434104ae1a62fe09c5f51b13905f07f06b99a2f7159b2225f374cd378d71302fa28414e7aab37397f554a7df5f142c21c1b7303b8a0626f1baded5c72a704f7e6cd84cac00286bee0000000043410411db93e1dcdb8a016b49840f8c53bc1eb68a382e97b1482ecad7b148a6909a5cb2e0eaddfb84ccf9744464f82e160bfa9b8b64f9d4c03f999b8643f656b412a3ac00000000";

    #[test]
    fn parses_known_transaction_and_txid() {
        let tx = Transaction::from_hex(BLOCK_170_TX).unwrap();
        assert_eq!(tx.inputs.len(), 1);
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.outputs[0].satoshis, 1_000_000_000);
        assert_eq!(
            tx.txid().to_hex(),
            "f4184fc596403b9d638783cf57adfe4c75c605f6356fbc91338530e9831e9e16"
        );
        assert_eq!(
            tx.inputs[0].previous_output.txid.to_hex(),
            "0437cd7f8525ceed2324359c2d0ba26006d92d856a9c20fa0241106ee5a597c9"
        );
        assert_eq!(tx.to_hex(), BLOCK_170_TX);
    }

    #[test]
    fn rejects_trailing_bytes_and_truncation() {
        let mut bytes = hex::decode(BLOCK_170_TX).unwrap();
        bytes.push(0);
        assert!(matches!(
            Transaction::from_bytes(&bytes),
            Err(CodecError::TrailingBytes(1))
        ));
        bytes.truncate(bytes.len() - 10);
        assert!(Transaction::from_bytes(&bytes).is_err());
    }

    #[test]
    fn huge_counts_do_not_allocate() {
        // version, then an input count of 2^32-1 with nothing behind it
        let bytes = [1, 0, 0, 0, 0xfe, 0xff, 0xff, 0xff, 0xff];
        assert!(Transaction::from_bytes(&bytes).is_err());
    }
}
