//! Block fixtures for tests, derived from the Bitcoin genesis block.

use crate::{RawBlock, BLOCK_HEADER_LEN};

pub const GENESIS_BLOCK_HEX: &str = "0100000000000000000000000000000000000000000000000000000000000000000000003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a29ab5f49ffff001d1dac2b7c0101000000010000000000000000000000000000000000000000000000000000000000000000ffffffff4d04ffff001d0104455468652054696d65732030332f4a616e2f32303039204368616e63656c6c6f72206f6e206272696e6b206f66207365636f6e64206261696c6f757420666f722062616e6b73ffffffff0100f2052a01000000434104678afdb0fe5548271967f1a67130b7105cd6a828e03909a67962e0ea1f61deb649f6bc3f4cef38c4f35504e51ec112de5c384df7ba0b8d578a4c702b6bf11d5fac00000000";

/// Offset of the first text byte inside the genesis coinbase script.
const COINBASE_TEXT_OFFSET: usize = 131;

pub fn genesis_block() -> RawBlock {
    RawBlock::new(hex::decode(GENESIS_BLOCK_HEX).expect("genesis hex is valid"))
}

/// Genesis with the header nonce and four bytes of the coinbase script
/// replaced by `seed`, giving a distinct block hash and txid per seed.
pub fn sample_block(seed: u32) -> RawBlock {
    let mut bytes = genesis_block().as_bytes().to_vec();
    bytes[BLOCK_HEADER_LEN - 4..BLOCK_HEADER_LEN].copy_from_slice(&seed.to_le_bytes());
    bytes[COINBASE_TEXT_OFFSET..COINBASE_TEXT_OFFSET + 4].copy_from_slice(&seed.to_le_bytes());
    RawBlock::new(bytes)
}

/// `len` consecutive sample blocks, index `i` standing for height `i`.
pub fn sample_chain(len: u32) -> Vec<RawBlock> {
    (0..len).map(sample_block).collect()
}
