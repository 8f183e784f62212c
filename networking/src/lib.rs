pub mod client;
pub mod sync;

pub use client::{BlockSource, FetchClient, FetchError, HttpTransport, RestResponse, RestTransport};
pub use sync::{BlockDownloader, SyncError, Syncer};
