use parking_lot::Mutex;
use redis::Commands;
use tracing::debug;

use crate::{KeyValueStore, Result, StoreConnector};

/// Opens one dedicated Redis connection per [`RedisStore`].
#[derive(Clone, Debug)]
pub struct RedisConnector {
    client: redis::Client,
}

impl RedisConnector {
    pub fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }
}

impl StoreConnector for RedisConnector {
    type Store = RedisStore;

    fn connect(&self) -> Result<Self::Store> {
        let connection = self.client.get_connection()?;
        debug!(addr = ?self.client.get_connection_info().addr, "Opened redis connection");
        Ok(RedisStore {
            connection: Mutex::new(connection),
        })
    }
}

pub struct RedisStore {
    connection: Mutex<redis::Connection>,
}

impl KeyValueStore for RedisStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value: Option<Vec<u8>> = self.connection.lock().get(key)?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let _: () = self.connection.lock().set(key, value)?;
        Ok(())
    }
}
