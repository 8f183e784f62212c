use bytes::Bytes;
use sha2::{Digest, Sha256};

use crate::BlockHash;

/// Length of a serialized block header.
pub const BLOCK_HEADER_LEN: usize = 80;

/// A block exactly as served by the remote node: the 80-byte header, a varint
/// transaction count, then the transactions.
///
/// Nothing here looks inside the header or the transactions. Splitting the
/// body is left to the storage layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawBlock(Bytes);

impl RawBlock {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A body no longer than a bare header cannot carry any transaction.
    pub fn is_structurally_valid(&self) -> bool {
        self.0.len() > BLOCK_HEADER_LEN
    }

    pub fn header(&self) -> Option<&[u8; BLOCK_HEADER_LEN]> {
        self.0.get(..BLOCK_HEADER_LEN)?.try_into().ok()
    }

    /// Double SHA-256 of the header, in wire order.
    pub fn block_hash(&self) -> Option<BlockHash> {
        self.header().map(header_hash)
    }
}

impl From<Vec<u8>> for RawBlock {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<Bytes> for RawBlock {
    fn from(bytes: Bytes) -> Self {
        Self::new(bytes)
    }
}

pub fn header_hash(header: &[u8; BLOCK_HEADER_LEN]) -> BlockHash {
    let first = Sha256::digest(header);
    BlockHash(Sha256::digest(first).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{genesis_block, sample_block};

    #[test]
    fn test_genesis_hash() {
        let block = genesis_block();
        assert_eq!(
            block.block_hash().unwrap().to_string(),
            "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f"
        );
    }

    #[test]
    fn test_header_only_is_not_valid() {
        let block = genesis_block();
        let header_only = RawBlock::new(block.as_bytes()[..BLOCK_HEADER_LEN].to_vec());
        assert!(!header_only.is_structurally_valid());
        assert!(header_only.block_hash().is_some());

        let one_more = RawBlock::new(block.as_bytes()[..BLOCK_HEADER_LEN + 1].to_vec());
        assert!(one_more.is_structurally_valid());
    }

    #[test]
    fn test_short_buffer_has_no_header() {
        assert!(RawBlock::new(vec![0u8; 79]).header().is_none());
    }

    #[test]
    fn test_samples_have_distinct_hashes() {
        let a = sample_block(1).block_hash().unwrap();
        let b = sample_block(2).block_hash().unwrap();
        assert_ne!(a, b);
    }
}
