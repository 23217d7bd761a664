use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use hypergate_admission::HEALTH_PATH;
use std::sync::Arc;

pub const SERVICE_NAME: &str = "hyperliquid-mcp";
pub const SERVER_NAME: &str = "HyperLiquid MCP Server";
pub const MCP_PATH: &str = "/mcp";

pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(root))
        .route(HEALTH_PATH, get(health_check))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let policy = state.admission.policy();
    Json(serde_json::json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "auth_required": policy.require_auth,
        "rate_limit": policy.rate_limit_description(),
    }))
}

// ---------------------------------------------------------------------------
// Root
// ---------------------------------------------------------------------------

async fn root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "name": SERVER_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "auth": state.admission.policy().auth_description(),
        "endpoints": {
            HEALTH_PATH: "Health check",
            MCP_PATH: "MCP protocol endpoint",
        },
        "documentation": env!("CARGO_PKG_REPOSITORY"),
    }))
}
