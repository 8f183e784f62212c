use bitcoin::consensus::encode::{self, VarInt};
use bitcoin::hashes::Hash;
use containers::{BlockHash, Checkpoint, Height, RawBlock, Txid, BLOCK_HEADER_LEN};
use tracing::trace;

use crate::{KeyValueStore, Result, StorageError};

/// Families of keys written for every block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    BlockHeader,
    BlockHashByHeight,
    BlockHeightByHash,
    BlockTransactionHashes,
    Transaction,
}

impl KeyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyKind::BlockHeader => "blockHeader",
            KeyKind::BlockHashByHeight => "blockHashByHeight",
            KeyKind::BlockHeightByHash => "blockHeightByHash",
            KeyKind::BlockTransactionHashes => "blockTransactionHashes",
            KeyKind::Transaction => "transaction",
        }
    }
}

/// Block-level view of a key-value store for one chain.
///
/// Keys have the form `{prefix}:{chain}:{kind}:{key}`; hashes inside keys are
/// the hex of their wire order. The checkpoint lives at
/// `{prefix}:{chain}:nextBlockHeight`.
pub struct BlockStore<S> {
    prefix: String,
    chain: String,
    kvs: S,
}

impl<S: KeyValueStore> BlockStore<S> {
    pub fn new(kvs: S, chain: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            chain: chain.into(),
            kvs,
        }
    }

    pub fn chain(&self) -> &str {
        &self.chain
    }

    pub fn key(&self, kind: KeyKind, key: &str) -> String {
        format!("{}:{}:{}:{}", self.prefix, self.chain, kind.as_str(), key)
    }

    fn checkpoint_key(&self) -> String {
        format!("{}:{}:nextBlockHeight", self.prefix, self.chain)
    }

    fn get(&self, kind: KeyKind, key: &str) -> Result<Option<Vec<u8>>> {
        self.kvs.get(&self.key(kind, key))
    }

    fn set(&self, kind: KeyKind, key: &str, value: &[u8]) -> Result<()> {
        self.kvs.set(&self.key(kind, key), value)
    }

    fn corrupt(&self, kind: KeyKind, key: &str, reason: impl Into<String>) -> StorageError {
        StorageError::CorruptValue {
            key: self.key(kind, key),
            reason: reason.into(),
        }
    }

    // Checkpoint

    /// The persisted resume point, genesis when nothing was stored yet.
    pub fn get_checkpoint(&self) -> Result<Checkpoint> {
        let key = self.checkpoint_key();
        match self.kvs.get(&key)? {
            Some(bytes) => Checkpoint::decode(&bytes).map_err(|err| StorageError::CorruptValue {
                key,
                reason: err.to_string(),
            }),
            None => Ok(Checkpoint::default()),
        }
    }

    pub fn set_checkpoint(&self, checkpoint: Checkpoint) -> Result<()> {
        self.kvs.set(&self.checkpoint_key(), &checkpoint.encode())
    }

    // Low-level records

    pub fn set_block_header(&self, hash: &BlockHash, header: &[u8; BLOCK_HEADER_LEN]) -> Result<()> {
        self.set(KeyKind::BlockHeader, &hash.to_wire_hex(), header)
    }

    pub fn get_block_header(&self, hash: &BlockHash) -> Result<Option<[u8; BLOCK_HEADER_LEN]>> {
        let key = hash.to_wire_hex();
        match self.get(KeyKind::BlockHeader, &key)? {
            Some(bytes) => bytes
                .try_into()
                .map(Some)
                .map_err(|bytes: Vec<u8>| {
                    self.corrupt(KeyKind::BlockHeader, &key, format!("header of {} bytes", bytes.len()))
                }),
            None => Ok(None),
        }
    }

    pub fn set_block_hash_by_height(&self, height: Height, hash: &BlockHash) -> Result<()> {
        self.set(KeyKind::BlockHashByHeight, &height.to_string(), hash.as_bytes())
    }

    pub fn get_block_hash_by_height(&self, height: Height) -> Result<Option<BlockHash>> {
        let key = height.to_string();
        match self.get(KeyKind::BlockHashByHeight, &key)? {
            Some(bytes) => BlockHash::from_slice(&bytes)
                .map(Some)
                .ok_or_else(|| self.corrupt(KeyKind::BlockHashByHeight, &key, "hash is not 32 bytes")),
            None => Ok(None),
        }
    }

    pub fn set_block_height_by_hash(&self, hash: &BlockHash, height: Height) -> Result<()> {
        self.set(KeyKind::BlockHeightByHash, &hash.to_wire_hex(), &height.to_le_bytes())
    }

    pub fn get_block_height_by_hash(&self, hash: &BlockHash) -> Result<Option<Height>> {
        let key = hash.to_wire_hex();
        match self.get(KeyKind::BlockHeightByHash, &key)? {
            Some(bytes) => <[u8; 4]>::try_from(bytes.as_slice())
                .map(|bytes| Some(Height::from_le_bytes(bytes)))
                .map_err(|_| self.corrupt(KeyKind::BlockHeightByHash, &key, "height is not 4 bytes")),
            None => Ok(None),
        }
    }

    pub fn set_block_transaction_hashes(&self, hash: &BlockHash, txids: &[Txid]) -> Result<()> {
        let value: Vec<u8> = txids.iter().flat_map(|txid| txid.0).collect();
        self.set(KeyKind::BlockTransactionHashes, &hash.to_wire_hex(), &value)
    }

    pub fn get_block_transaction_hashes(&self, hash: &BlockHash) -> Result<Option<Vec<Txid>>> {
        let key = hash.to_wire_hex();
        let Some(bytes) = self.get(KeyKind::BlockTransactionHashes, &key)? else {
            return Ok(None);
        };
        if bytes.len() % 32 != 0 {
            return Err(self.corrupt(KeyKind::BlockTransactionHashes, &key, "length is not a multiple of 32"));
        }
        Ok(Some(bytes.chunks_exact(32).filter_map(Txid::from_slice).collect()))
    }

    pub fn set_transaction(&self, txid: &Txid, tx: &[u8]) -> Result<()> {
        self.set(KeyKind::Transaction, &txid.to_wire_hex(), tx)
    }

    pub fn get_transaction(&self, txid: &Txid) -> Result<Option<Vec<u8>>> {
        self.get(KeyKind::Transaction, &txid.to_wire_hex())
    }

    // Block-level operations

    /// Split `block` into its records and persist them.
    ///
    /// Writing the same block twice leaves the store unchanged, which is what
    /// makes re-committing heights above a stale checkpoint safe. When
    /// `advance_checkpoint` is set the checkpoint moves to `height + 1` after
    /// every other record is written.
    pub fn accept_block(&self, height: Height, block: &RawBlock, advance_checkpoint: bool) -> Result<BlockHash> {
        let decoded: bitcoin::Block = encode::deserialize(block.as_bytes())
            .map_err(|source| StorageError::MalformedBlock { height, source })?;
        let hash = BlockHash(decoded.block_hash().to_byte_array());

        let mut txids = Vec::with_capacity(decoded.txdata.len());
        for tx in &decoded.txdata {
            let txid = Txid(tx.compute_txid().to_byte_array());
            self.set_transaction(&txid, &encode::serialize(tx))?;
            txids.push(txid);
        }
        self.set_block_transaction_hashes(&hash, &txids)?;

        let mut header = [0u8; BLOCK_HEADER_LEN];
        header.copy_from_slice(&encode::serialize(&decoded.header));
        self.set_block_header(&hash, &header)?;
        self.set_block_height_by_hash(&hash, height)?;
        self.set_block_hash_by_height(height, &hash)?;

        if advance_checkpoint {
            self.set_checkpoint(Checkpoint::after(height))?;
        }
        trace!(height = height.0, hash = %hash, txs = txids.len(), "Accepted block");
        Ok(hash)
    }

    /// Reassemble a block: header, varint transaction count, transactions.
    pub fn get_block_by_hash(&self, hash: &BlockHash) -> Result<Option<Vec<u8>>> {
        let Some(header) = self.get_block_header(hash)? else {
            return Ok(None);
        };
        let Some(txids) = self.get_block_transaction_hashes(hash)? else {
            return Ok(None);
        };

        let mut block = header.to_vec();
        block.extend(encode::serialize(&VarInt(txids.len() as u64)));
        for txid in &txids {
            let tx = self
                .get_transaction(txid)?
                .ok_or(StorageError::TransactionNotFound(*txid))?;
            block.extend(tx);
        }
        Ok(Some(block))
    }

    /// Up to `count` consecutive headers starting at `hash`, or `None` when
    /// `hash` is unknown.
    pub fn get_headers(&self, hash: &BlockHash, count: u32) -> Result<Option<Vec<[u8; BLOCK_HEADER_LEN]>>> {
        let Some(start) = self.get_block_height_by_hash(hash)? else {
            return Ok(None);
        };

        let mut headers = Vec::new();
        for offset in 0..count {
            let Some(height) = start.checked_add(offset) else {
                break;
            };
            let Some(block_hash) = self.get_block_hash_by_height(height)? else {
                break;
            };
            let header = self.get_block_header(&block_hash)?.ok_or_else(|| {
                self.corrupt(KeyKind::BlockHeader, &block_hash.to_wire_hex(), "indexed header is missing")
            })?;
            headers.push(header);
        }
        Ok(Some(headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use containers::fixtures::{genesis_block, sample_block, sample_chain};
    use pretty_assertions::assert_eq;

    fn create_store() -> (MemoryStore, BlockStore<MemoryStore>) {
        let memory = MemoryStore::new();
        let store = BlockStore::new(memory.clone(), "BTC", "bitcoin-rest-mirror");
        (memory, store)
    }

    mod checkpoint {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn get_first() {
            let (_, store) = create_store();
            assert_eq!(store.get_checkpoint().unwrap(), Checkpoint::default());
        }

        #[test]
        fn set() {
            let (memory, store) = create_store();
            store.set_checkpoint(Checkpoint::new(Height(1234))).unwrap();
            assert_eq!(store.get_checkpoint().unwrap().next_height, Height(1234));
            assert_eq!(
                memory.get("bitcoin-rest-mirror:BTC:nextBlockHeight").unwrap(),
                Some(vec![0xd2, 0x04, 0, 0])
            );
        }

        #[test]
        fn corrupt() {
            let (memory, store) = create_store();
            memory.set("bitcoin-rest-mirror:BTC:nextBlockHeight", b"12").unwrap();
            assert!(matches!(store.get_checkpoint(), Err(StorageError::CorruptValue { .. })));
        }
    }

    mod block_header {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn get_none() {
            let (_, store) = create_store();
            assert_eq!(store.get_block_header(&BlockHash::default()).unwrap(), None);
        }

        #[test]
        fn set() {
            let (_, store) = create_store();
            let block = genesis_block();
            let hash = block.block_hash().unwrap();
            store.set_block_header(&hash, block.header().unwrap()).unwrap();
            assert_eq!(store.get_block_header(&hash).unwrap().as_ref(), block.header());
        }
    }

    mod block_hash_by_height {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn get_none() {
            let (_, store) = create_store();
            assert_eq!(store.get_block_hash_by_height(Height(0)).unwrap(), None);
        }

        #[test]
        fn set() {
            let (_, store) = create_store();
            let hash = genesis_block().block_hash().unwrap();
            store.set_block_hash_by_height(Height(0), &hash).unwrap();
            assert_eq!(store.get_block_hash_by_height(Height(0)).unwrap(), Some(hash));
        }
    }

    mod accept_block {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn round_trip_is_byte_identical() {
            let (_, store) = create_store();
            for (height, block) in sample_chain(3).iter().enumerate() {
                let hash = store.accept_block(Height(height as u32), block, true).unwrap();
                assert_eq!(Some(hash), block.block_hash());
                assert_eq!(store.get_block_by_hash(&hash).unwrap().as_deref(), Some(block.as_bytes()));
            }
        }

        #[test]
        fn genesis_txid() {
            let (_, store) = create_store();
            let hash = store.accept_block(Height(0), &genesis_block(), false).unwrap();
            let txids = store.get_block_transaction_hashes(&hash).unwrap().unwrap();
            assert_eq!(
                txids[0].to_string(),
                "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b"
            );
        }

        #[test]
        fn is_idempotent() {
            let (memory, store) = create_store();
            let block = sample_block(7);
            store.accept_block(Height(7), &block, false).unwrap();
            let once = memory.snapshot();
            store.accept_block(Height(7), &block, false).unwrap();
            assert_eq!(memory.snapshot(), once);
        }

        #[test]
        fn checkpoint_only_when_asked() {
            let (_, store) = create_store();
            store.accept_block(Height(0), &sample_block(0), false).unwrap();
            assert_eq!(store.get_checkpoint().unwrap(), Checkpoint::default());

            store.accept_block(Height(1), &sample_block(1), true).unwrap();
            assert_eq!(store.get_checkpoint().unwrap(), Checkpoint::new(Height(2)));
        }

        #[test]
        fn indexes_height_both_ways() {
            let (_, store) = create_store();
            let block = sample_block(5);
            let hash = store.accept_block(Height(5), &block, false).unwrap();
            assert_eq!(store.get_block_height_by_hash(&hash).unwrap(), Some(Height(5)));
            assert_eq!(store.get_block_hash_by_height(Height(5)).unwrap(), Some(hash));
        }

        #[test]
        fn malformed_block() {
            let (memory, store) = create_store();
            let truncated = RawBlock::new(genesis_block().as_bytes()[..120].to_vec());
            let err = store.accept_block(Height(3), &truncated, true).unwrap_err();
            assert!(matches!(err, StorageError::MalformedBlock { height: Height(3), .. }));
            assert!(memory.is_empty());
        }
    }

    mod get_block_by_hash {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn unknown() {
            let (_, store) = create_store();
            assert_eq!(store.get_block_by_hash(&BlockHash::default()).unwrap(), None);
        }

        #[test]
        fn missing_transaction() {
            let (memory, store) = create_store();
            let block = genesis_block();
            let hash = store.accept_block(Height(0), &block, false).unwrap();
            let txid = store.get_block_transaction_hashes(&hash).unwrap().unwrap()[0];
            memory.remove(&store.key(KeyKind::Transaction, &txid.to_wire_hex()));

            let err = store.get_block_by_hash(&hash).unwrap_err();
            assert!(matches!(err, StorageError::TransactionNotFound(missing) if missing == txid));
        }
    }

    mod headers {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn consecutive() {
            let (_, store) = create_store();
            let chain = sample_chain(4);
            for (height, block) in chain.iter().enumerate() {
                store.accept_block(Height(height as u32), block, false).unwrap();
            }
            let start = chain[1].block_hash().unwrap();

            let headers = store.get_headers(&start, 2).unwrap().unwrap();
            assert_eq!(headers.len(), 2);
            assert_eq!(Some(&headers[0]), chain[1].header());
            assert_eq!(Some(&headers[1]), chain[2].header());

            let tail = store.get_headers(&start, 10).unwrap().unwrap();
            assert_eq!(tail.len(), 3);
        }

        #[test]
        fn unknown_start() {
            let (_, store) = create_store();
            assert_eq!(store.get_headers(&BlockHash::default(), 5).unwrap(), None);
        }
    }
}
