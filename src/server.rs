//! HTTP surface: the analyze endpoint plus static probes.

use crate::app::{AnalyzeInput, App};
use crate::models::{Config, UploadedImage};
use crate::response::AnalyzeResponse;
use crate::{Error, Result};
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

pub fn router(app: Arc<App>, config: &Config) -> Result<Router> {
    Ok(Router::new()
        .route("/analyze-image", post(analyze_image))
        .route("/test", get(test_endpoint))
        .route("/health", get(health_check))
        .route("/", get(root))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors_layer(&config.allowed_origins)?)
        .layer(TraceLayer::new_for_http())
        .with_state(app))
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|e| Error::Config(format!("Invalid CORS origin '{}': {}", origin, e)))
        })
        .collect::<Result<Vec<_>>>()?;

    // Credentialed CORS forbids wildcards, so methods and headers are mirrored.
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true))
}

/// Client mistakes in the multipart form itself.
#[derive(Debug)]
enum FormError {
    Malformed(String),
    MissingField(&'static str),
}

impl IntoResponse for FormError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            FormError::Malformed(message) => (StatusCode::BAD_REQUEST, message),
            FormError::MissingField(field) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("{} is required", field),
            ),
        };
        (status, Json(AnalyzeResponse::error(message))).into_response()
    }
}

async fn read_form(mut multipart: Multipart) -> std::result::Result<AnalyzeInput, FormError> {
    let malformed = |e: axum::extract::multipart::MultipartError| {
        FormError::Malformed(format!("Invalid multipart body: {}", e))
    };

    let mut input = AnalyzeInput::default();
    let mut system_instruction = None;

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(malformed)?;
                if !bytes.is_empty() {
                    input.image = Some(UploadedImage {
                        bytes: bytes.to_vec(),
                        content_type,
                    });
                }
            }
            "prompt" => {
                let prompt = field.text().await.map_err(malformed)?;
                input.prompt = Some(prompt).filter(|p| !p.is_empty());
            }
            "system_instructions" => {
                system_instruction = Some(field.text().await.map_err(malformed)?);
            }
            "history" => {
                input.history = Some(field.text().await.map_err(malformed)?);
            }
            other => debug!("Ignoring unknown form field '{}'", other),
        }
    }

    input.system_instruction = system_instruction
        .filter(|s| !s.trim().is_empty())
        .ok_or(FormError::MissingField("system_instructions"))?;

    Ok(input)
}

async fn analyze_image(
    State(app): State<Arc<App>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Response {
    let multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => return FormError::Malformed(rejection.body_text()).into_response(),
    };

    let input = match read_form(multipart).await {
        Ok(input) => input,
        Err(e) => return e.into_response(),
    };

    let request_id = Uuid::new_v4();
    let response = app
        .analyze(input)
        .instrument(info_span!("analyze", %request_id))
        .await;

    Json(response).into_response()
}

async fn test_endpoint() -> Json<serde_json::Value> {
    Json(json!({ "message": "Test endpoint works! Backend is running correctly." }))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "Vision relay is running. POST /analyze-image to analyze an image." }))
}
