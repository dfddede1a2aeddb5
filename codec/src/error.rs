use overlay_types::TxId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unexpected end of input at offset {offset}: needed {needed} more bytes")]
    UnexpectedEof { offset: usize, needed: usize },

    #[error("{0} bytes left over after decoding")]
    TrailingBytes(usize),

    #[error("input too large: {size} > {max}")]
    TooLarge { size: usize, max: usize },

    #[error("invalid hex: {0}")]
    Hex(String),

    #[error("malformed script: {0}")]
    Script(String),

    #[error("not a PushDrop token: {0}")]
    NotPushDrop(String),

    #[error("malformed BEEF container: {0}")]
    Beef(String),

    #[error("malformed merkle path: {0}")]
    MerklePath(String),

    #[error("transaction {0} is not covered by the merkle path")]
    TxidNotInPath(TxId),
}

impl From<hex::FromHexError> for CodecError {
    fn from(e: hex::FromHexError) -> Self {
        CodecError::Hex(e.to_string())
    }
}
