//! HTTP surface of the quote aggregator

use crate::{
    aggregator::QuoteAggregator,
    error::QuoteError,
    resolver::SymbolResolver,
    types::{ComponentHealth, HealthStatus, Quote},
};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<QuoteAggregator>,
    pub resolver: Arc<SymbolResolver>,
}

/// Optional request body of `/api/{symbol}/info`
#[derive(Debug, Default, Deserialize)]
struct QuoteRequest {
    #[serde(rename = "CurrencyCode", alias = "currencyCode", default)]
    currency_code: Option<Vec<String>>,
}

impl QuoteRequest {
    /// Absent, empty or malformed bodies all mean "use the defaults"
    fn from_body(body: &[u8]) -> Self {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Self::default();
        }
        serde_json::from_slice(body).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "Ignoring unreadable request body");
            Self::default()
        })
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: u16,
    msg: String,
}

impl IntoResponse for QuoteError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(ErrorBody {
            code: status.as_u16(),
            msg: self.to_string(),
        });
        (status, body).into_response()
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/api/{symbol}/info", get(get_quotes).post(get_quotes))
        .route("/api/health", get(get_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Quotes a symbol in the requested (or default) currencies.
async fn get_quotes(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    body: Bytes,
) -> Result<Json<Vec<Quote>>, QuoteError> {
    let request = QuoteRequest::from_body(&body);
    let quotes = state.aggregator.quote(&symbol, request.currency_code).await?;
    Ok(Json(quotes))
}

async fn get_health(State(state): State<AppState>) -> (StatusCode, Json<ComponentHealth>) {
    let health = state.aggregator.health_check(&state.resolver).await;
    let status = match health.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    };
    (status, Json(health))
}
