use crate::Result;

/// Minimal byte-oriented key-value store.
///
/// Implementations use interior mutability so one handle can be shared by
/// reference, but a handle is never shared between commit workers: each
/// worker asks the [`StoreConnector`] for its own.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn set(&self, key: &str, value: &[u8]) -> Result<()>;
}

/// Opens independent handles (connections) to the same underlying store.
pub trait StoreConnector: Send + Sync + 'static {
    type Store: KeyValueStore + 'static;

    fn connect(&self) -> Result<Self::Store>;
}
