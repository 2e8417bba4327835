//! Redis backend: the document lives under a single key.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use santa_core::Session;
use std::fmt;
use tracing::{error, info};

use super::{decode, StateStore, StoreError};

#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
    key: String,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore").field("key", &self.key).finish()
    }
}

fn backend_error(err: redis::RedisError) -> StoreError {
    StoreError::Backend(err.to_string())
}

impl RedisStore {
    /// Connect to `url`. The URL may carry credentials and is never logged.
    pub async fn connect(url: &str, key: impl Into<String>) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(backend_error)?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(backend_error)?;
        let key = key.into();
        info!(key = %key, "connected to redis");
        Ok(Self { conn, key })
    }
}

#[async_trait]
impl StateStore for RedisStore {
    async fn load(&self) -> Result<Session, StoreError> {
        let mut conn = self.conn.clone();
        let document: Option<Vec<u8>> = conn.get(&self.key).await.map_err(backend_error)?;
        match document {
            Some(bytes) => decode(&bytes),
            None => Ok(Session::default()),
        }
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        let json = serde_json::to_vec(session)?;
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(&self.key, json).await.map_err(|err| {
            error!(key = %self.key, error = %err, "failed to write state to redis");
            backend_error(err)
        })
    }
}
