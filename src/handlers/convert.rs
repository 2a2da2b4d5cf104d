//! Conversion endpoint
//!
//! `POST /convert/` (also mounted at `/download_audio_post/`)
//! Body: `{"url": "https://www.youtube.com/watch?v=..."}`
//!
//! Responds with the MP3 as an attachment named after the video title.

use crate::error::{AppError, AppResult};
use crate::media::AUDIO_MIME;
use crate::state::AppState;
use actix_web::http::header::{HeaderValue, CONTENT_DISPOSITION};
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{info, warn};

/// Body of a conversion request.
#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    pub url: String,
}

pub async fn convert_audio(
    state: web::Data<AppState>,
    body: web::Json<ConvertRequest>,
) -> AppResult<HttpResponse> {
    let ConvertRequest { url } = body.into_inner();
    info!(url = %url, "Conversion requested");

    let _running = state.begin_conversion();
    let result = state.pipeline.convert(&url).await;
    state.record_conversion(result.is_ok());

    let audio = result.map_err(|err| {
        warn!(kind = err.kind(), error = %err, "Conversion failed");
        AppError::from(err)
    })?;

    info!(title = %audio.title, bytes = audio.bytes.len(), "Sending converted audio");

    Ok(HttpResponse::Ok()
        .content_type(AUDIO_MIME)
        .insert_header((CONTENT_DISPOSITION, content_disposition(&audio.filename)?))
        .body(audio.bytes))
}

/// `attachment; filename="<filename>"`.
///
/// Header values cannot carry control characters, so those are dropped from
/// the header; everything else in the filename is sent as-is.
fn content_disposition(filename: &str) -> AppResult<HeaderValue> {
    let value = format!("attachment; filename=\"{}\"", filename);
    if let Ok(header) = HeaderValue::from_bytes(value.as_bytes()) {
        return Ok(header);
    }

    let cleaned: String = value.chars().filter(|c| !c.is_control()).collect();
    HeaderValue::from_bytes(cleaned.as_bytes())
        .map_err(|err| AppError::Internal(format!("invalid Content-Disposition: {}", err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::handlers::configure;
    use crate::media::testing::{pipeline_in, FakeSource, FakeTranscoder, MP3_FRAME};
    use crate::media::{RemoteSource, Transcoder};
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::{json, Value};
    use std::path::Path;
    use std::sync::Arc;

    const VIDEO_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    fn state_with(
        dir: &Path,
        source: Arc<dyn RemoteSource>,
        transcoder: Arc<dyn Transcoder>,
    ) -> AppState {
        AppState::new(AppConfig::default(), pipeline_in(dir, source, transcoder))
    }

    fn scratch_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[actix_web::test]
    async fn test_successful_conversion() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with(
            dir.path(),
            Arc::new(FakeSource::succeeding("Artist / Song Title")),
            Arc::new(FakeTranscoder::succeeding()),
        );
        let app = test::init_service(
            App::new().app_data(web::Data::new(state)).configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/convert/")
            .set_json(json!({ "url": VIDEO_URL }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let headers = resp.headers();
        assert_eq!(headers.get("content-type").unwrap(), "audio/mpeg");
        assert_eq!(
            headers.get("content-disposition").unwrap(),
            "attachment; filename=\"Artist _ Song Title.mp3\""
        );

        let body = test::read_body(resp).await;
        assert!(body.starts_with(MP3_FRAME));
        assert!(scratch_is_empty(dir.path()));
    }

    #[actix_web::test]
    async fn test_legacy_route_and_missing_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with(
            dir.path(),
            Arc::new(FakeSource::succeeding("Song")),
            Arc::new(FakeTranscoder::succeeding()),
        );
        let app = test::init_service(
            App::new().app_data(web::Data::new(state)).configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/download_audio_post/")
            .set_payload(format!(r#"{{"url": "{}"}}"#, VIDEO_URL))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let disposition = resp.headers().get("content-disposition").unwrap().to_str().unwrap();
        assert!(disposition.contains("attachment"));
        assert!(disposition.ends_with(".mp3\""));
    }

    #[actix_web::test]
    async fn test_invalid_bodies_are_rejected_before_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(FakeSource::succeeding("Song"));
        let state = state_with(dir.path(), source.clone(), Arc::new(FakeTranscoder::succeeding()));
        let app = test::init_service(
            App::new().app_data(web::Data::new(state)).configure(configure),
        )
        .await;

        let bodies = [
            json!({}).to_string(),
            json!({ "link": VIDEO_URL }).to_string(),
            json!({ "url": 123 }).to_string(),
            "{\"url\": ".to_string(),
            "not json at all".to_string(),
        ];

        for body in bodies {
            let req = test::TestRequest::post()
                .uri("/convert/")
                .insert_header(("content-type", "application/json"))
                .set_payload(body.clone())
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY, "body: {body}");

            let json: Value = test::read_body_json(resp).await;
            assert!(json["detail"].as_str().is_some_and(|d| !d.is_empty()));
        }

        assert_eq!(source.resolve_calls(), 0);
    }

    #[actix_web::test]
    async fn test_unresolvable_url_is_a_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with(
            dir.path(),
            Arc::new(FakeSource::rejecting(
                "ERROR: [generic] 'http://not-youtube.com' is not a valid URL",
            )),
            Arc::new(FakeTranscoder::succeeding()),
        );
        let app = test::init_service(
            App::new().app_data(web::Data::new(state)).configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/convert/")
            .set_json(json!({ "url": "http://not-youtube.com" }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.headers().get("content-type").unwrap(), "application/json");
        let json: Value = test::read_body_json(resp).await;
        let detail = json["detail"].as_str().unwrap();
        assert!(detail.starts_with("Fehler: "));
        assert!(detail.len() > "Fehler: ".len());
        assert!(detail.contains("not a valid URL"));
    }

    #[actix_web::test]
    async fn test_empty_url_passes_validation_and_fails_in_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(FakeSource::rejecting("ERROR: [generic] '' is not a valid URL"));
        let state = state_with(dir.path(), source.clone(), Arc::new(FakeTranscoder::succeeding()));
        let app = test::init_service(
            App::new().app_data(web::Data::new(state)).configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/convert/")
            .set_json(json!({ "url": "" }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json: Value = test::read_body_json(resp).await;
        assert!(json["detail"].as_str().unwrap().starts_with("Fehler: "));
        assert_eq!(source.resolve_calls(), 1);
        assert!(scratch_is_empty(dir.path()));
    }

    #[actix_web::test]
    async fn test_no_audio_stream_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with(
            dir.path(),
            Arc::new(FakeSource::without_audio()),
            Arc::new(FakeTranscoder::succeeding()),
        );
        let app = test::init_service(
            App::new().app_data(web::Data::new(state)).configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/convert/")
            .set_json(json!({ "url": VIDEO_URL }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let json: Value = test::read_body_json(resp).await;
        assert_eq!(json["detail"], "Fehler: Kein Audiostream gefunden");
    }

    #[actix_web::test]
    async fn test_transcode_failure_leaves_no_scratch_files() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with(
            dir.path(),
            Arc::new(FakeSource::succeeding("Song")),
            Arc::new(FakeTranscoder::failing("Conversion failed!")),
        );
        let app = test::init_service(
            App::new().app_data(web::Data::new(state.clone())).configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/convert/")
            .set_json(json!({ "url": VIDEO_URL }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(scratch_is_empty(dir.path()));

        let metrics = state.get_metrics_snapshot();
        assert_eq!(metrics.conversions_failed, 1);
        assert_eq!(metrics.active_conversions, 0);
    }

    #[actix_web::test]
    async fn test_repeated_requests_succeed_independently() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with(
            dir.path(),
            Arc::new(FakeSource::succeeding("Song")),
            Arc::new(FakeTranscoder::succeeding()),
        );
        let app = test::init_service(
            App::new().app_data(web::Data::new(state.clone())).configure(configure),
        )
        .await;

        for _ in 0..2 {
            let req = test::TestRequest::post()
                .uri("/convert/")
                .set_json(json!({ "url": VIDEO_URL }))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
            assert!(!test::read_body(resp).await.is_empty());
        }

        assert!(scratch_is_empty(dir.path()));
        assert_eq!(state.get_metrics_snapshot().conversions_completed, 2);
    }

    #[actix_web::test]
    async fn test_concurrent_invalid_urls_fail_independently() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(FakeSource::rejecting("ERROR: Unsupported URL"));
        let state = state_with(dir.path(), source.clone(), Arc::new(FakeTranscoder::succeeding()));
        let app = test::init_service(
            App::new().app_data(web::Data::new(state)).configure(configure),
        )
        .await;

        let app = &app;
        let requests = (0..8).map(move |i| {
            let req = test::TestRequest::post()
                .uri("/convert/")
                .set_json(json!({ "url": format!("https://example.com/{i}") }))
                .to_request();
            test::call_service(app, req)
        });
        let responses = futures_util::future::join_all(requests).await;

        assert_eq!(responses.len(), 8);
        for resp in responses {
            assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
        assert_eq!(source.resolve_calls(), 8);
        assert!(scratch_is_empty(dir.path()));
    }

    #[actix_web::test]
    async fn test_content_disposition_keeps_filename_verbatim() {
        let header = content_disposition("a\\b: c.mp3").unwrap();
        assert_eq!(header, "attachment; filename=\"a\\b: c.mp3\"");

        let header = content_disposition("Café.mp3").unwrap();
        assert_eq!(header.as_bytes(), "attachment; filename=\"Café.mp3\"".as_bytes());

        let header = content_disposition("line\nbreak.mp3").unwrap();
        assert_eq!(header, "attachment; filename=\"linebreak.mp3\"");
    }
}
