//! HTTP surface of the proxy.
//!
//! - `GET /api/melon/realtime` - current chart, served from the cache while fresh

use crate::{
    config::Settings,
    error::{ProxyError, ProxyResult},
    melon::{chart::ChartRecord, client::Melon, service::ChartService},
    storage::ChartCache,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

const FAILURE_MESSAGE: &str = "Failed to fetch melon chart";

#[derive(Clone)]
pub struct AppState {
    pub service: ChartService,
}

#[derive(Debug, Serialize)]
struct ChartResponse<'a> {
    success: bool,
    updated: i64,
    chart: &'a [ChartRecord],
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    error: &'static str,
    kind: &'static str,
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            success: false,
            error: FAILURE_MESSAGE,
            kind: self.kind(),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

/// GET /api/melon/realtime
async fn realtime_chart(State(state): State<AppState>) -> Result<Response, ProxyError> {
    let entry = state.service.current().await?;
    let body = ChartResponse {
        success: true,
        updated: entry.updated_ms(),
        chart: &entry.records,
    };
    Ok(Json(body).into_response())
}

pub fn router(service: ChartService) -> Router {
    Router::new()
        .route("/api/melon/realtime", get(realtime_chart))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { service })
}

pub async fn run(settings: &Settings) -> ProxyResult<()> {
    let source = Arc::new(Melon::from_settings(settings)?);
    let service = ChartService::new(source, ChartCache::new(settings.cache_ttl()));
    let app = router(service);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Melon chart proxy listening on {}", settings.port);

    axum::serve(listener, app).await?;
    Ok(())
}
