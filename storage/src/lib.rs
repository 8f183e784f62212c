//! Block storage on top of a plain key-value store.
//!
//! [`BlockStore`] is the only component that understands the block layout:
//! it splits a raw block into transactions on the way in and reassembles the
//! original bytes on the way out. The key-value backends below it only move
//! opaque bytes.

pub mod client;
pub mod error;
pub mod kvs;
pub mod memory;
pub mod redis_store;

pub use client::{BlockStore, KeyKind};
pub use error::{Result, StorageError};
pub use kvs::{KeyValueStore, StoreConnector};
pub use memory::MemoryStore;
pub use redis_store::{RedisConnector, RedisStore};
