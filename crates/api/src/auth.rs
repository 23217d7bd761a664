use crate::state::AppState;
use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use hypergate_admission::{select_credential, API_KEY_HEADER, API_KEY_QUERY_PARAM};
use std::collections::HashMap;
use std::sync::Arc;

/// Reject requests that do not carry the configured API key.
///
/// The key is read from the `X-API-Key` header, falling back to the
/// `api_key` query parameter. `/health` is always let through.
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let admitted = {
        let header = request
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok());
        let query = Query::<HashMap<String, String>>::try_from_uri(request.uri()).ok();
        let query_key = query
            .as_ref()
            .and_then(|q| q.get(API_KEY_QUERY_PARAM))
            .map(String::as_str);

        state
            .admission
            .authenticator()
            .admit(request.uri().path(), select_credential(header, query_key))
    };

    match admitted {
        Ok(()) => next.run(request).await,
        Err(e) => (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}
