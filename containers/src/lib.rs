pub mod types;
pub mod height;
pub mod checkpoint;
pub mod block;

pub use block::{RawBlock, BLOCK_HEADER_LEN};
pub use checkpoint::Checkpoint;
pub use height::Height;
pub use types::{BlockHash, ParseError, Txid};

#[cfg(any(test, feature = "test-utils"))]
pub mod fixtures;
