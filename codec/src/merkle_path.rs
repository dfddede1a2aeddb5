//! Compact merkle paths (BUMP).
//!
//! ```text
//! varint block_height
//! u8     tree_height
//! per level: varint n_leaves, then n_leaves x
//!     varint offset | u8 flags | [32-byte hash unless duplicate]
//! ```
//!
//! Hashes are stored in internal byte order.

use std::collections::BTreeMap;

use overlay_types::TxId;

use crate::hash::hash_pair;
use crate::reader::{write_varint, Reader};
use crate::CodecError;

const FLAG_DUPLICATE: u8 = 0x01;
const FLAG_TXID: u8 = 0x02;

/// Deeper than any block could be; keeps `offset >> height` well defined.
const MAX_TREE_HEIGHT: usize = 64;

/// Smallest serialized leaf: offset + flags.
const MIN_LEAF_SIZE: usize = 2;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathLeaf {
    pub offset: u64,
    /// `None` when the leaf duplicates its sibling.
    pub hash: Option<[u8; 32]>,
    /// Marks a level-0 leaf as a transaction the path was issued for.
    pub txid: bool,
}

impl PathLeaf {
    pub fn hash(offset: u64, hash: [u8; 32]) -> Self {
        Self { offset, hash: Some(hash), txid: false }
    }

    pub fn client_txid(offset: u64, txid: TxId) -> Self {
        Self { offset, hash: Some(*txid.as_bytes()), txid: true }
    }

    pub fn duplicate(offset: u64) -> Self {
        Self { offset, hash: None, txid: false }
    }

    fn is_duplicate(&self) -> bool {
        self.hash.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerklePath {
    pub block_height: u32,
    pub path: Vec<Vec<PathLeaf>>,
}

/// A resolved tree node: either a hash or "same as my left sibling".
enum Node {
    Hash([u8; 32]),
    Duplicate,
}

impl MerklePath {
    pub fn new(block_height: u32, path: Vec<Vec<PathLeaf>>) -> Self {
        Self { block_height, path }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut reader = Reader::new(bytes);
        let path = Self::read(&mut reader)?;
        reader.finish()?;
        Ok(path)
    }

    pub fn from_hex(s: &str) -> Result<Self, CodecError> {
        Self::from_bytes(&hex::decode(s)?)
    }

    pub fn read(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        let height = reader.read_varint()?;
        let block_height = u32::try_from(height)
            .map_err(|_| CodecError::MerklePath(format!("block height {height} out of range")))?;
        let tree_height = reader.read_u8()? as usize;
        if tree_height == 0 || tree_height > MAX_TREE_HEIGHT {
            return Err(CodecError::MerklePath(format!(
                "tree height {tree_height} out of range"
            )));
        }

        let mut path = Vec::with_capacity(tree_height);
        for _ in 0..tree_height {
            let n_leaves = reader.read_len()?;
            let mut level = Vec::with_capacity(n_leaves.min(reader.remaining() / MIN_LEAF_SIZE));
            for _ in 0..n_leaves {
                let offset = reader.read_varint()?;
                let flags = reader.read_u8()?;
                let hash = if flags & FLAG_DUPLICATE != 0 {
                    None
                } else {
                    Some(reader.read_array32()?)
                };
                level.push(PathLeaf {
                    offset,
                    hash,
                    txid: flags & FLAG_TXID != 0,
                });
            }
            path.push(level);
        }
        Ok(Self { block_height, path })
    }

    pub fn write(&self, buf: &mut Vec<u8>) {
        write_varint(buf, u64::from(self.block_height));
        buf.push(self.path.len() as u8);
        for level in &self.path {
            write_varint(buf, level.len() as u64);
            for leaf in level {
                write_varint(buf, leaf.offset);
                let mut flags = 0u8;
                if leaf.is_duplicate() {
                    flags |= FLAG_DUPLICATE;
                }
                if leaf.txid {
                    flags |= FLAG_TXID;
                }
                buf.push(flags);
                if let Some(hash) = &leaf.hash {
                    buf.extend_from_slice(hash);
                }
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write(&mut buf);
        buf
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Whether `txid` appears among the level-0 leaves.
    pub fn contains(&self, txid: &TxId) -> bool {
        self.level0_offset(txid).is_some()
    }

    /// Transactions this path was issued for.
    pub fn txids(&self) -> Vec<TxId> {
        self.path
            .first()
            .map(|level| {
                level
                    .iter()
                    .filter(|leaf| leaf.txid)
                    .filter_map(|leaf| leaf.hash.map(TxId::new))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn level0_offset(&self, txid: &TxId) -> Option<u64> {
        self.path.first()?.iter().find_map(|leaf| match &leaf.hash {
            Some(hash) if hash == txid.as_bytes() => Some(leaf.offset),
            _ => None,
        })
    }

    /// Merkle root (internal byte order) proven for `txid`.
    pub fn compute_root(&self, txid: &TxId) -> Result<[u8; 32], CodecError> {
        let index = self
            .level0_offset(txid)
            .ok_or(CodecError::TxidNotInPath(*txid))?;

        // A block holding a single transaction.
        if self.path.len() == 1 && self.path[0].len() == 1 {
            return Ok(*txid.as_bytes());
        }

        let levels: Vec<BTreeMap<u64, &PathLeaf>> = self
            .path
            .iter()
            .map(|level| level.iter().map(|leaf| (leaf.offset, leaf)).collect())
            .collect();
        let mut working = *txid.as_bytes();
        for height in 0..levels.len() {
            let offset = (index >> height) ^ 1;
            working = match resolve(&levels, height, offset)? {
                Node::Duplicate => hash_pair(&working, &working),
                Node::Hash(sibling) if offset % 2 == 1 => hash_pair(&working, &sibling),
                Node::Hash(sibling) => hash_pair(&sibling, &working),
            };
        }
        Ok(working)
    }

    /// Root in the reversed hex form block explorers report.
    pub fn compute_root_hex(&self, txid: &TxId) -> Result<String, CodecError> {
        let mut root = self.compute_root(txid)?;
        root.reverse();
        Ok(hex::encode(root))
    }
}

/// Find the node at `(height, offset)`, or compute it from the level below
/// when the path omits it.
fn resolve(
    levels: &[BTreeMap<u64, &PathLeaf>],
    height: usize,
    offset: u64,
) -> Result<Node, CodecError> {
    if let Some(leaf) = levels[height].get(&offset) {
        return Ok(match leaf.hash {
            Some(hash) => Node::Hash(hash),
            None => Node::Duplicate,
        });
    }
    if height == 0 {
        return Err(CodecError::MerklePath(format!(
            "missing leaf at height 0 offset {offset}"
        )));
    }
    let left_offset = offset
        .checked_mul(2)
        .ok_or_else(|| CodecError::MerklePath(format!("offset {offset} overflows")))?;
    let left = match resolve(levels, height - 1, left_offset)? {
        Node::Hash(hash) => hash,
        Node::Duplicate => {
            return Err(CodecError::MerklePath(format!(
                "left node at height {} offset {left_offset} is a duplicate",
                height - 1
            )))
        }
    };
    let hash = match resolve(levels, height - 1, left_offset + 1)? {
        Node::Duplicate => hash_pair(&left, &left),
        Node::Hash(right) => hash_pair(&left, &right),
    };
    Ok(Node::Hash(hash))
}
