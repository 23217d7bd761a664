pub mod auth;
pub mod routes;
pub mod state;

use axum::{middleware, Router};
use hypergate_admission::AdmissionControl;
use hypergate_mcp::TradingTools;
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpService,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the Axum application router.
///
/// Every route, including the MCP endpoint, sits behind the API-key check.
pub fn build_router(admission: AdmissionControl, tools: TradingTools) -> Router {
    let app_state = Arc::new(state::AppState::new(admission));

    let mcp_service = StreamableHttpService::new(
        move || Ok(tools.clone()),
        LocalSessionManager::default().into(),
        Default::default(),
    );

    Router::new()
        .merge(routes::api_routes())
        .nest_service(routes::MCP_PATH, mcp_service)
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            auth::require_api_key,
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Start the API server.
pub async fn start_server(app: Router, bind_addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("API server listening on {}", bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
