pub mod config;
pub mod error;
pub mod store;

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use santa_core::{normalize_name, AuthError, SecretHasher, Session};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use config::{AppConfig, Args, StartupDraw, StoreBackend};
pub use error::{ApiError, StartupError};
pub use store::{FileStore, MemoryStore, StateStore, StoreError};

/// Shared handle to the single session of this process. Every handler holds
/// the lock for its whole read or read-modify-persist cycle.
#[derive(Clone)]
pub struct AppState {
    shared: Arc<Mutex<Shared>>,
    store: Arc<dyn StateStore>,
    hasher: Arc<SecretHasher>,
    config: Arc<AppConfig>,
}

struct Shared {
    session: Session,
    rng: ChaCha8Rng,
}

impl AppState {
    /// Load the stored session and apply the startup draw policy.
    ///
    /// A store that cannot be read is logged and replaced by an empty
    /// session; a redraw that cannot be saved is an error.
    pub async fn load(store: Arc<dyn StateStore>, config: AppConfig) -> Result<Self, StartupError> {
        let hasher = SecretHasher::new(config.hash_cost).map_err(StartupError::HashCost)?;
        let mut rng = config
            .draw_seed
            .map(ChaCha8Rng::seed_from_u64)
            .unwrap_or_else(ChaCha8Rng::from_entropy);

        let mut session = match store.load().await {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, "failed to load state, starting empty");
                Session::default()
            }
        };

        let dropped = session.sanitize();
        if dropped > 0 {
            warn!(dropped, "removed blank or duplicate members from stored state");
        }

        let redraw = match config.startup_draw {
            StartupDraw::Missing => !session.is_consistent(),
            StartupDraw::Always => session.members.len() >= 2 || !session.is_consistent(),
        };
        if redraw {
            session.redraw(&mut rng);
            store.save(&session).await?;
            info!(
                members = session.members.len(),
                pairs = session.pairs.len(),
                policy = ?config.startup_draw,
                "drew pairs at startup"
            );
        } else {
            info!(
                members = session.members.len(),
                pairs = session.pairs.len(),
                "restored stored pairs"
            );
        }

        Ok(Self {
            shared: Arc::new(Mutex::new(Shared { session, rng })),
            store,
            hasher: Arc::new(hasher),
            config: Arc::new(config),
        })
    }

    fn reveal_link(&self, giver: &str) -> Result<String, ApiError> {
        let query = serde_urlencoded::to_string([("giver", giver)])
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        Ok(format!("{}?{}", self.config.result_page, query))
    }
}

pub fn app(state: AppState) -> Router {
    let router = Router::new()
        .route("/api/list", get(list_pairs))
        .route("/api/result", post(reveal_result))
        .route("/api/add", post(add_member))
        .route("/api/reset", post(reset_session));

    let router = match &state.config.static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Empty bodies count as `{}`.
fn parse_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))
}

#[derive(Serialize)]
struct ListEntry {
    name: String,
    link: String,
}

async fn list_pairs(State(state): State<AppState>) -> Result<Json<Vec<ListEntry>>, ApiError> {
    let shared = state.shared.lock().await;
    let entries = shared
        .session
        .pairs
        .iter()
        .map(|a| -> Result<ListEntry, ApiError> {
            Ok(ListEntry {
                name: a.giver.clone(),
                link: state.reveal_link(&a.giver)?,
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;
    Ok(Json(entries))
}

#[derive(Deserialize)]
struct ResultParams {
    giver: Option<String>,
}

#[derive(Deserialize, Default)]
struct RevealRequest {
    #[serde(default)]
    password: String,
}

#[derive(Serialize)]
struct RevealResponse {
    receiver: String,
}

async fn reveal_result(
    State(state): State<AppState>,
    Query(params): Query<ResultParams>,
    body: Bytes,
) -> Result<Json<RevealResponse>, ApiError> {
    let giver = params
        .giver
        .filter(|g| !g.is_empty())
        .ok_or_else(|| ApiError::BadRequest("giver is required".into()))?;
    let request: RevealRequest = parse_body(&body)?;

    let mut shared = state.shared.lock().await;
    let mut assignment = shared
        .session
        .assignment(&giver)
        .cloned()
        .ok_or_else(|| AuthError::NotFound(giver.clone()))?;

    // Hashing is CPU-bound; run it off the async workers. The session lock
    // stays held so concurrent first claims cannot both commit.
    let hasher = state.hasher.clone();
    let (assignment, outcome) = tokio::task::spawn_blocking(move || {
        let outcome = santa_core::reveal(&mut assignment, &request.password, &hasher);
        (assignment, outcome)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("reveal task failed: {e}")))?;

    let reveal = match outcome {
        Ok(reveal) => reveal,
        Err(AuthError::WrongSecret) => {
            warn!(giver = %giver, "reveal denied: wrong secret");
            return Err(AuthError::WrongSecret.into());
        }
        Err(err) => return Err(err.into()),
    };

    if reveal.claimed {
        let mut staged = shared.session.clone();
        if let Some(slot) = staged.pairs.iter_mut().find(|a| a.giver == giver) {
            *slot = assignment;
        }
        state.store.save(&staged).await?;
        shared.session = staged;
        info!(giver = %giver, "secret claimed");
    }

    Ok(Json(RevealResponse {
        receiver: reveal.receiver,
    }))
}

#[derive(Deserialize, Default)]
struct AddRequest {
    #[serde(default)]
    name: String,
}

#[derive(Serialize)]
struct AddResponse {
    name: String,
    members: usize,
}

async fn add_member(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<AddResponse>, ApiError> {
    let request: AddRequest = parse_body(&body)?;
    let name = normalize_name(&request.name)?;

    let mut shared = state.shared.lock().await;
    let Shared { session, rng } = &mut *shared;
    let staged = session.with_member(&name, rng)?;
    state.store.save(&staged).await?;
    *session = staged;

    info!(
        member = %name,
        members = session.members.len(),
        pairs = session.pairs.len(),
        "member added, pairs redrawn"
    );

    Ok(Json(AddResponse {
        name,
        members: session.members.len(),
    }))
}

#[derive(Deserialize, Default)]
struct ResetRequest {
    #[serde(default)]
    password: String,
}

async fn reset_session(State(state): State<AppState>, body: Bytes) -> Result<StatusCode, ApiError> {
    let request: ResetRequest = parse_body(&body)?;
    if let Some(expected) = &state.config.reset_password {
        if request.password != *expected {
            warn!("reset denied: wrong password");
            return Err(ApiError::Forbidden("wrong reset password".into()));
        }
    }

    let mut shared = state.shared.lock().await;
    let staged = Session::default();
    state.store.save(&staged).await?;
    shared.session = staged;
    info!("session reset");

    Ok(StatusCode::OK)
}
