use crate::config::ApiCfg;
use crate::engine::AggregationEngine;
use crate::types::{BalanceHistoryPoint, Snapshot};
use anyhow::Result;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::sync::Arc;

#[derive(Clone)]
struct ApiState {
    engine: Arc<AggregationEngine>,
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn balance(State(st): State<ApiState>) -> (StatusCode, Json<Snapshot>) {
    let snapshot = st.engine.build_snapshot().await;
    let code = if snapshot.is_error() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    (code, Json(snapshot))
}

async fn balance_history(State(st): State<ApiState>) -> Json<Vec<BalanceHistoryPoint>> {
    Json(st.engine.hourly_history())
}

pub async fn serve(cfg: ApiCfg, engine: Arc<AggregationEngine>) -> Result<()> {
    let st = ApiState { engine };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/balance", get(balance))
        .route("/api/balance/history", get(balance_history))
        .with_state(st);

    let addr = cfg.bind.parse()?;
    tracing::info!(bind = %cfg.bind, "api server listening");
    axum::Server::bind(&addr).serve(app.into_make_service()).await?;
    Ok(())
}
