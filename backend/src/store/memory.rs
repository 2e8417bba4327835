//! In-process backend. State is lost on restart.

use async_trait::async_trait;
use santa_core::Session;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{decode, StateStore, StoreError};

/// Keeps the serialized document in memory, so loads go through the same
/// JSON path as the durable backends.
#[derive(Debug, Default)]
pub struct MemoryStore {
    document: Mutex<Option<Vec<u8>>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent saves fail, simulating an unavailable backend.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self) -> Result<Session, StoreError> {
        let document = self
            .document
            .lock()
            .map_err(|_| StoreError::Backend("memory store poisoned".into()))?;
        match document.as_deref() {
            Some(bytes) => decode(bytes),
            None => Ok(Session::default()),
        }
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("memory store rejected write".into()));
        }
        let json = serde_json::to_vec(session)?;
        let mut document = self
            .document
            .lock()
            .map_err(|_| StoreError::Backend("memory store poisoned".into()))?;
        *document = Some(json);
        Ok(())
    }
}
