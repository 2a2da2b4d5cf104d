use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

/// `GET /`: liveness plus the configured authentication mode.
///
/// Reports whether the credentials are present, never their values.
pub async fn service_status(state: web::Data<AppState>) -> HttpResponse {
    let auth = &state.config.auth;

    HttpResponse::Ok().json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "auth_mode": auth.mode.to_string(),
        "po_token_set": auth.po_token_set(),
        "visitor_data_set": auth.visitor_data_set(),
    }))
}
