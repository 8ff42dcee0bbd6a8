use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use vendi_db::DbPool;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
}

/// Readiness report for the service and its one hard dependency, the
/// inventory store. The generative backend is intentionally not probed:
/// a down backend degrades answers to canned text, it does not make the
/// service unhealthy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
    pub detail: Option<String>,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database_error = probe_database(&state.db_pool).await.err();
    let ready = database_error.is_none();

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database: if ready { "ready" } else { "degraded" },
        detail: database_error,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn probe_database(pool: &DbPool) -> Result<(), String> {
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(pool)
        .await
        .map(|_| ())
        .map_err(|query_error| format!("database probe failed: {query_error}"))
}
