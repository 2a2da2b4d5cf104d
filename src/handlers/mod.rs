pub mod convert;
pub mod status;

pub use convert::*;
pub use status::*;

use crate::error::json_error_handler;
use crate::health;
use actix_web::web;

/// Register every route on `cfg`.
///
/// Used by `main` and by the handler tests, so both run the same route table.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .content_type_required(false)
            .error_handler(json_error_handler),
    )
    .route("/", web::get().to(service_status))
    .route("/convert/", web::post().to(convert_audio))
    .route("/download_audio_post/", web::post().to(convert_audio))
    .route("/health", web::get().to(health::health_check))
    .route("/metrics", web::get().to(health::detailed_metrics));
}
