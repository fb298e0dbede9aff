//! Health endpoints: `/healthz` and `/livez` only prove the process answers;
//! `/readyz` also needs the database.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;

use crate::db::DbError;
use crate::side_effects::SideEffectStats;
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<String>,
    /// Email and poster cleanup counters. Failures here never affect readiness.
    #[serde(skip_serializing_if = "Option::is_none")]
    side_effects: Option<SideEffectStats>,
}

impl Health {
    fn up() -> Self {
        Self {
            status: "ok",
            service: "campus-api",
            version: env!("CARGO_PKG_VERSION"),
            database: None,
            side_effects: None,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/livez", get(livez))
        .route("/readyz", get(readyz))
}

async fn healthz() -> impl IntoResponse {
    Json(Health::up())
}

async fn livez() -> impl IntoResponse {
    StatusCode::OK
}

async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    readiness(state.db().ping().await, state.effects().stats())
}

fn readiness(database: Result<(), DbError>, side_effects: SideEffectStats) -> (StatusCode, Json<Health>) {
    let (code, status, database) = match database {
        Ok(()) => (StatusCode::OK, "ok", "ok".to_string()),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, "degraded", e.to_string()),
    };

    (
        code,
        Json(Health {
            status,
            database: Some(database),
            side_effects: Some(side_effects),
            ..Health::up()
        }),
    )
}
