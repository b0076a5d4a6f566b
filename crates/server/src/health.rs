use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use fernwood_db::DbPool;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
}

/// Liveness plus a catalog readiness signal. The storefront is degraded when
/// the database is unreachable or the schema is missing; an empty catalog is
/// still ready, since seeding is an operator step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: DatabaseHealth,
    pub checked_at: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DatabaseHealth {
    Ready { catalog_size: u64 },
    Degraded { detail: String },
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = catalog_check(&state.db_pool).await;
    let ready = matches!(database, DatabaseHealth::Ready { .. });

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        database,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

// Counting the catalog proves both connectivity and that migrations ran.
async fn catalog_check(pool: &DbPool) -> DatabaseHealth {
    match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM product").fetch_one(pool).await {
        Ok(count) => DatabaseHealth::Ready { catalog_size: count.max(0) as u64 },
        Err(error) => DatabaseHealth::Degraded { detail: format!("catalog query failed: {error}") },
    }
}
