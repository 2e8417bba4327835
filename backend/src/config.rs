use clap::{Parser, ValueEnum};
use santa_core::HashCost;
use std::path::PathBuf;
use std::sync::Arc;

use crate::store::{FileStore, MemoryStore, StateStore, StoreError};

/// What to do with stored pairs when the server starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum StartupDraw {
    /// Draw only when the stored pairs are absent or do not match the members.
    #[default]
    Missing,
    /// Always draw again, discarding stored pairs and their secrets.
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum StoreBackend {
    #[default]
    File,
    Redis,
    Memory,
}

/// Runtime settings consumed by [`crate::AppState`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Page the reveal links in `/api/list` point at.
    pub result_page: String,
    /// When set, `/api/reset` requires this password.
    pub reset_password: Option<String>,
    pub startup_draw: StartupDraw,
    pub draw_seed: Option<u64>,
    pub hash_cost: HashCost,
    pub static_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            result_page: "./result.html".to_string(),
            reset_password: None,
            startup_draw: StartupDraw::default(),
            draw_seed: None,
            hash_cost: HashCost::default(),
            static_dir: None,
        }
    }
}

/// Secret Santa draw server
#[derive(Parser, Debug)]
#[command(name = "santa-backend")]
#[command(about = "Secret Santa draw server")]
#[command(version)]
pub struct Args {
    /// Address to bind to
    #[arg(long, env = "BIND", default_value = "0.0.0.0")]
    pub bind: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Where the session document is kept
    #[arg(long, env = "STORE_BACKEND", value_enum, default_value_t = StoreBackend::File)]
    pub store: StoreBackend,

    /// State file for the file backend
    #[arg(long, env = "STATE_FILE", default_value = "state.json")]
    pub state_file: PathBuf,

    /// Redis connection URL for the redis backend
    #[arg(long, env = "REDIS_URL", hide_env_values = true)]
    pub redis_url: Option<String>,

    /// Redis key holding the session document
    #[arg(long, env = "REDIS_KEY", default_value = "amigo_state")]
    pub redis_key: String,

    /// Directory with the static frontend
    #[arg(long, env = "STATIC_DIR", default_value = "./frontend")]
    pub static_dir: PathBuf,

    /// Base of the reveal links handed out by /api/list
    #[arg(long, env = "RESULT_PAGE", default_value = "./result.html")]
    pub result_page: String,

    /// Password required by /api/reset (reset is open when unset)
    #[arg(long, env = "RESET_PASSWORD", hide_env_values = true)]
    pub reset_password: Option<String>,

    /// Redraw policy applied to stored pairs at startup
    #[arg(long, env = "STARTUP_DRAW", value_enum, default_value_t = StartupDraw::Missing)]
    pub startup_draw: StartupDraw,

    /// Seed for reproducible draws
    #[arg(long, env = "DRAW_SEED")]
    pub draw_seed: Option<u64>,

    /// Argon2id memory cost in KiB
    #[arg(long, env = "HASH_MEMORY_KIB", default_value_t = HashCost::default().memory_kib)]
    pub hash_memory_kib: u32,

    /// Argon2id iteration count
    #[arg(long, env = "HASH_ITERATIONS", default_value_t = HashCost::default().iterations)]
    pub hash_iterations: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn app_config(&self) -> AppConfig {
        AppConfig {
            result_page: self.result_page.clone(),
            reset_password: self.reset_password.clone().filter(|p| !p.is_empty()),
            startup_draw: self.startup_draw,
            draw_seed: self.draw_seed,
            hash_cost: HashCost {
                memory_kib: self.hash_memory_kib,
                iterations: self.hash_iterations,
                ..HashCost::default()
            },
            static_dir: Some(self.static_dir.clone()),
        }
    }

    pub async fn open_store(&self) -> Result<Arc<dyn StateStore>, StoreError> {
        match self.store {
            StoreBackend::File => Ok(Arc::new(FileStore::new(&self.state_file))),
            StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
            StoreBackend::Redis => self.open_redis().await,
        }
    }

    #[cfg(feature = "redis")]
    async fn open_redis(&self) -> Result<Arc<dyn StateStore>, StoreError> {
        let url = self
            .redis_url
            .as_deref()
            .ok_or_else(|| StoreError::Backend("--redis-url is required for the redis store".into()))?;
        let store = crate::store::RedisStore::connect(url, self.redis_key.clone()).await?;
        Ok(Arc::new(store))
    }

    #[cfg(not(feature = "redis"))]
    async fn open_redis(&self) -> Result<Arc<dyn StateStore>, StoreError> {
        Err(StoreError::Backend(
            "built without the `redis` feature".into(),
        ))
    }
}
