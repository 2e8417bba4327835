//! Persistence of the session document.
//!
//! The whole [`Session`] is stored as one JSON document, so every backend
//! only needs whole-document `load` and `save`.

mod file;
mod memory;
#[cfg(feature = "redis")]
mod redis_kv;

pub use file::FileStore;
pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis_kv::RedisStore;

use async_trait::async_trait;
use santa_core::Session;
use std::fmt::Debug;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("backend error: {0}")]
    Backend(String),
}

/// Storage backend for the session document.
#[async_trait]
pub trait StateStore: Send + Sync + Debug {
    /// Load the saved session, or an empty one if nothing was saved yet.
    async fn load(&self) -> Result<Session, StoreError>;

    /// Replace the saved session.
    async fn save(&self, session: &Session) -> Result<(), StoreError>;
}

fn decode(bytes: &[u8]) -> Result<Session, StoreError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Session::default());
    }
    Ok(serde_json::from_slice(bytes)?)
}
