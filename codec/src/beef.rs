//! BEEF transaction container (version 1).
//!
//! ```text
//! 01 00 BE EF
//! varint n_bumps, n_bumps x merkle path
//! varint n_txs,   n_txs x ( raw tx | u8 has_bump | [varint bump_index] )
//! ```
//!
//! Transactions are ordered parents first; the last one is the subject of
//! the container. A bare raw transaction is accepted as a container with a
//! single transaction and no proofs.

use overlay_types::TxId;

use crate::reader::{write_varint, Reader};
use crate::{CodecError, MerklePath, Transaction, MAX_CONTAINER_SIZE};

pub const BEEF_V1_MARKER: [u8; 4] = [0x01, 0x00, 0xbe, 0xef];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BeefTx {
    pub tx: Transaction,
    pub bump_index: Option<usize>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Beef {
    pub bumps: Vec<MerklePath>,
    pub txs: Vec<BeefTx>,
}

impl Beef {
    /// Container holding one unproven transaction.
    pub fn from_transaction(tx: Transaction) -> Self {
        Self {
            bumps: Vec::new(),
            txs: vec![BeefTx { tx, bump_index: None }],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() > MAX_CONTAINER_SIZE {
            return Err(CodecError::TooLarge {
                size: bytes.len(),
                max: MAX_CONTAINER_SIZE,
            });
        }
        if !bytes.starts_with(&BEEF_V1_MARKER) {
            let tx = Transaction::from_bytes(bytes)
                .map_err(|e| CodecError::Beef(format!("neither BEEF nor a raw transaction: {e}")))?;
            return Ok(Self::from_transaction(tx));
        }

        let mut reader = Reader::new(&bytes[BEEF_V1_MARKER.len()..]);
        let n_bumps = reader.read_len()?;
        let mut bumps = Vec::with_capacity(n_bumps.min(reader.remaining() / 4));
        for _ in 0..n_bumps {
            bumps.push(MerklePath::read(&mut reader)?);
        }

        let n_txs = reader.read_len()?;
        let mut txs = Vec::with_capacity(n_txs.min(reader.remaining() / 10));
        for _ in 0..n_txs {
            let tx = Transaction::read(&mut reader)?;
            let bump_index = match reader.read_u8()? {
                0 => None,
                1 => {
                    let index = reader.read_varint()?;
                    if index >= bumps.len() as u64 {
                        return Err(CodecError::Beef(format!(
                            "bump index {index} out of range ({} bumps)",
                            bumps.len()
                        )));
                    }
                    Some(index as usize)
                }
                other => {
                    return Err(CodecError::Beef(format!("invalid has_bump flag {other}")));
                }
            };
            txs.push(BeefTx { tx, bump_index });
        }
        reader.finish()?;

        if txs.is_empty() {
            return Err(CodecError::Beef("container holds no transactions".into()));
        }
        Ok(Self { bumps, txs })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BEEF_V1_MARKER.to_vec();
        write_varint(&mut buf, self.bumps.len() as u64);
        for bump in &self.bumps {
            bump.write(&mut buf);
        }
        write_varint(&mut buf, self.txs.len() as u64);
        for entry in &self.txs {
            entry.tx.write(&mut buf);
            match entry.bump_index {
                Some(index) => {
                    buf.push(1);
                    write_varint(&mut buf, index as u64);
                }
                None => buf.push(0),
            }
        }
        buf
    }

    /// The transaction this container was built for.
    pub fn subject(&self) -> Result<&Transaction, CodecError> {
        self.txs
            .last()
            .map(|entry| &entry.tx)
            .ok_or_else(|| CodecError::Beef("container holds no transactions".into()))
    }

    /// Merkle proof attached to the subject transaction, if any.
    pub fn subject_proof(&self) -> Option<&MerklePath> {
        let index = self.txs.last()?.bump_index?;
        self.bumps.get(index)
    }

    pub fn find_transaction(&self, txid: &TxId) -> Option<&Transaction> {
        self.txs
            .iter()
            .map(|entry| &entry.tx)
            .find(|tx| tx.txid() == *txid)
    }

    /// Attach `proof` to the transaction `txid`, reusing an existing slot.
    pub fn attach_proof(&mut self, txid: &TxId, proof: MerklePath) -> Result<(), CodecError> {
        let position = self
            .txs
            .iter()
            .position(|entry| entry.tx.txid() == *txid)
            .ok_or_else(|| CodecError::Beef(format!("transaction {txid} not in container")))?;
        let bump_index = match self.txs[position].bump_index {
            Some(index) => {
                self.bumps[index] = proof;
                index
            }
            None => {
                self.bumps.push(proof);
                self.bumps.len() - 1
            }
        };
        self.txs[position].bump_index = Some(bump_index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle_path::PathLeaf;
    use crate::{Script, TxInput, TxOutput};
    use overlay_types::OutputRef;

    fn tx(tag: u8) -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxInput {
                previous_output: OutputRef::new(TxId::new([tag; 32]), 0),
                unlocking_script: Script::default(),
                sequence: u32::MAX,
            }],
            outputs: vec![TxOutput {
                satoshis: 1,
                locking_script: Script::new(vec![0x51]),
            }],
            lock_time: 0,
        }
    }

    #[test]
    fn bare_raw_transaction_is_a_container() {
        let subject = tx(1);
        let beef = Beef::from_bytes(&subject.to_bytes()).unwrap();
        assert_eq!(beef.subject().unwrap(), &subject);
        assert!(beef.subject_proof().is_none());
    }

    #[test]
    fn subject_is_last_and_keeps_its_proof() {
        let parent = tx(1);
        let child = tx(2);
        let mut beef = Beef::default();
        beef.txs.push(BeefTx { tx: parent.clone(), bump_index: None });
        beef.txs.push(BeefTx { tx: child.clone(), bump_index: None });
        let proof = MerklePath::new(5, vec![vec![PathLeaf::client_txid(0, child.txid())]]);
        beef.attach_proof(&child.txid(), proof.clone()).unwrap();

        let decoded = Beef::from_bytes(&beef.to_bytes()).unwrap();
        assert_eq!(decoded.subject().unwrap(), &child);
        assert_eq!(decoded.subject_proof(), Some(&proof));
        assert!(decoded.find_transaction(&parent.txid()).is_some());
    }

    #[test]
    fn rejects_out_of_range_bump_index() {
        let mut bytes = BEEF_V1_MARKER.to_vec();
        bytes.push(0); // no bumps
        bytes.push(1);
        tx(1).write(&mut bytes);
        bytes.extend_from_slice(&[1, 0]); // has_bump with index 0
        assert!(matches!(Beef::from_bytes(&bytes), Err(CodecError::Beef(_))));
    }

    #[test]
    fn rejects_empty_and_garbage() {
        let mut empty = BEEF_V1_MARKER.to_vec();
        empty.extend_from_slice(&[0, 0]);
        assert!(Beef::from_bytes(&empty).is_err());
        assert!(Beef::from_bytes(b"definitely not a transaction").is_err());
        assert!(Beef::from_bytes(&[]).is_err());
    }
}
