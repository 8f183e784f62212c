//! REST surface serving mirrored blocks in the node's REST format.
//!
//! Routes take an identifier followed by a format extension:
//! `/rest/tx/{txid}.{ext}`, `/rest/block/{hash}.{ext}`,
//! `/rest/headers/{hash}.{ext}?count=N` and
//! `/rest/blockhashbyheight/{height}.{ext}`. Hashes are given in display
//! order. `bin` answers raw bytes and `hex` their hex encoding.

pub mod error;
pub mod format;
pub mod handlers;
pub mod server;

pub use error::ApiError;
pub use format::Format;
pub use server::{create_app, run_rest_server};
