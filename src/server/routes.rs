//! Request routing and handlers
//!
//! Handlers work on an [`ApiRequest`] and return an [`ApiResponse`], so the
//! whole HTTP surface can be exercised without a socket.

use super::{cors::CorsPolicy, multipart::UploadForm, response::ApiResponse};
use crate::{
    error::{BgRemovalError, ErrorKind},
    pipeline::CompositingPipeline,
    tracing_config::events,
};
use log::info;
use serde_json::json;
use tiny_http::Method;

/// Service name reported by `GET /`
pub const SERVICE_NAME: &str = "Background Removal API";

/// Message returned for 413 responses
pub const TOO_LARGE_MESSAGE: &str = "Image too large. Try a smaller image or use \"fast\" model.";

/// Default request body limit (20 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

/// Shared state for request handlers
#[derive(Debug)]
pub struct AppState {
    pub pipeline: CompositingPipeline,
    pub cors: CorsPolicy,
    pub max_upload_bytes: u64,
}

impl AppState {
    #[must_use]
    pub fn new(pipeline: CompositingPipeline, cors: CorsPolicy, max_upload_bytes: u64) -> Self {
        Self {
            pipeline,
            cors,
            max_upload_bytes,
        }
    }
}

/// A buffered HTTP request
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Request target, possibly including a query string
    pub url: String,
    pub origin: Option<String>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    /// Set when the body was cut off at the upload limit
    pub body_truncated: bool,
}

impl ApiRequest {
    #[must_use]
    pub fn new<S: Into<String>>(method: Method, url: S) -> Self {
        Self {
            method,
            url: url.into(),
            origin: None,
            content_type: None,
            body: Vec::new(),
            body_truncated: false,
        }
    }

    #[must_use]
    pub fn with_origin<S: Into<String>>(mut self, origin: S) -> Self {
        self.origin = Some(origin.into());
        self
    }

    #[must_use]
    pub fn with_body<S: Into<String>>(mut self, content_type: S, body: Vec<u8>) -> Self {
        self.content_type = Some(content_type.into());
        self.body = body;
        self
    }

    /// Path without query string
    #[must_use]
    pub fn path(&self) -> &str {
        self.url.split(['?', '#']).next().unwrap_or("/")
    }
}

/// Route a request to its handler and attach CORS headers
#[must_use]
pub fn handle(state: &AppState, request: ApiRequest) -> ApiResponse {
    let origin = request.origin.clone();

    if request.method == Method::Options {
        return ApiResponse::ok(json!({ "status": "ok" }))
            .with_headers(state.cors.preflight_headers(origin.as_deref()));
    }

    let path = request.path().to_string();
    let method = request.method.clone();
    let response = match (path.as_str(), &method) {
        ("/", Method::Get) => home(state),
        ("/health", Method::Get) => health(state),
        ("/remove-background", Method::Post) => remove_background(state, request),
        ("/" | "/health" | "/remove-background", _) => {
            ApiResponse::error(405, "Method not allowed")
        },
        _ => ApiResponse::error(404, "Not found"),
    };

    response.with_headers(state.cors.response_headers(origin.as_deref()))
}

fn home(state: &AppState) -> ApiResponse {
    ApiResponse::ok(json!({
        "service": SERVICE_NAME,
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
        "allowed_origins": state.cors.allowed_origins(),
    }))
}

fn health(state: &AppState) -> ApiResponse {
    ApiResponse::ok(json!({
        "status": "healthy",
        "models": state.pipeline.registry().variant_names(),
        "allowed_origins": state.cors.allowed_origins(),
    }))
}

fn remove_background(state: &AppState, request: ApiRequest) -> ApiResponse {
    if request.body_truncated || request.body.len() as u64 > state.max_upload_bytes {
        events::warning_with_recommendation(
            &format!("upload exceeds {} bytes", state.max_upload_bytes),
            "send a smaller image",
        );
        return ApiResponse::error(413, TOO_LARGE_MESSAGE);
    }

    let Some(content_type) = request.content_type.as_deref() else {
        return ApiResponse::error(400, "Expected multipart/form-data body");
    };

    let mut form = match UploadForm::parse(content_type, request.body, state.max_upload_bytes) {
        Ok(form) => form,
        Err(e) => return form_error(&e),
    };
    let image = match form.take_image() {
        Ok(image) => image,
        Err(e) => return form_error(&e),
    };
    let options = match form.processing_options() {
        Ok(options) => options,
        Err(e) => return form_error(&e),
    };

    info!(
        "📥 Removal request from {} (model: {}, bgType: {}, shadow: {}, {} bytes)",
        request.origin.as_deref().unwrap_or("unknown origin"),
        options.model,
        options.background_mode,
        options.shadow,
        image.len()
    );

    match state.pipeline.process_bytes_to_data_uri(&image, &options) {
        Ok(encoded) => {
            let result = &encoded.result;
            for fallback in &result.fallbacks {
                info!("↩️ Fallback: {}", fallback);
            }
            ApiResponse::ok(json!({
                "success": true,
                "output": encoded.data_uri,
                "dimensions": {
                    "width": result.original_width,
                    "height": result.original_height,
                },
                "bgType": result.background_mode.as_str(),
                "hasBackground": result.has_background,
            }))
        },
        Err(e) => processing_error(&e),
    }
}

/// Errors raised while reading the form are the caller's fault
fn form_error(error: &BgRemovalError) -> ApiResponse {
    match error.kind() {
        ErrorKind::ResourceExhausted => ApiResponse::error(413, TOO_LARGE_MESSAGE),
        _ => ApiResponse::error(400, error_message(error)),
    }
}

fn processing_error(error: &BgRemovalError) -> ApiResponse {
    match error.kind() {
        ErrorKind::BadRequest => ApiResponse::error(400, error_message(error)),
        ErrorKind::ResourceExhausted => {
            events::warning_with_recommendation(&error.to_string(), "use a smaller image or the fast model");
            ApiResponse::error(413, TOO_LARGE_MESSAGE)
        },
        ErrorKind::Processing => {
            events::error_with_context(error, "remove-background");
            ApiResponse::error(500, error_message(error))
        },
    }
}

fn error_message(error: &BgRemovalError) -> String {
    match error {
        BgRemovalError::InvalidConfig(msg) => msg.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{backends::MockBackend, config::PipelineConfig, models::ModelRegistry};
    use crate::server::multipart::tests::{content_type, form_body};
    use image::{DynamicImage, Rgb, RgbImage};
    use std::sync::Arc;

    fn state() -> AppState {
        let registry = ModelRegistry::builder()
            .register_backend("general", Box::new(MockBackend::with_input_size(16)))
            .unwrap()
            .register_backend("fast", Box::new(MockBackend::with_input_size(16)))
            .unwrap()
            .build()
            .unwrap();
        let pipeline =
            CompositingPipeline::new(PipelineConfig::default(), Arc::new(registry)).unwrap();
        AppState::new(pipeline, CorsPolicy::default(), 1 << 20)
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 10, 10])))
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn upload(fields: &[(&str, &str)], image: Option<&[u8]>) -> ApiRequest {
        ApiRequest::new(Method::Post, "/remove-background")
            .with_body(content_type(), form_body(fields, image))
    }

    #[test]
    fn test_home_and_health() {
        let state = state();
        let response = handle(&state, ApiRequest::new(Method::Get, "/"));
        assert_eq!(response.status, 200);
        assert_eq!(response.body["service"], SERVICE_NAME);
        assert_eq!(response.body["status"], "running");

        let response = handle(&state, ApiRequest::new(Method::Get, "/health?probe=1"));
        assert_eq!(response.body["status"], "healthy");
        assert_eq!(response.body["models"], json!(["fast", "general"]));
    }

    #[test]
    fn test_unknown_route_and_method() {
        let state = state();
        assert_eq!(handle(&state, ApiRequest::new(Method::Get, "/nope")).status, 404);
        assert_eq!(
            handle(&state, ApiRequest::new(Method::Get, "/remove-background")).status,
            405
        );
    }

    #[test]
    fn test_preflight() {
        let state = state();
        let response = handle(
            &state,
            ApiRequest::new(Method::Options, "/remove-background").with_origin("https://editorn.com"),
        );
        assert_eq!(response.status, 200);
        assert_eq!(
            response.header("Access-Control-Allow-Origin"),
            Some("https://editorn.com")
        );
        assert_eq!(response.header("Access-Control-Max-Age"), Some("86400"));
    }

    #[test]
    fn test_successful_removal() {
        let state = state();
        let image = png(24, 18);
        let response = handle(
            &state,
            upload(&[("bgType", "color"), ("bgColor", "#00FF00")], Some(&image)),
        );

        assert_eq!(response.status, 200, "{}", response.body);
        assert_eq!(response.body["success"], true);
        assert_eq!(response.body["bgType"], "color");
        assert_eq!(response.body["hasBackground"], true);
        assert_eq!(response.body["dimensions"], json!({ "width": 24, "height": 18 }));
        assert!(response.body["output"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_missing_image_is_bad_request() {
        let response = handle(&state(), upload(&[("bgType", "color")], None));
        assert_eq!(response.status, 400);
        assert_eq!(response.body["error"], "No image provided");
    }

    #[test]
    fn test_invalid_color_is_server_error() {
        let image = png(8, 8);
        let response = handle(
            &state(),
            upload(&[("bgType", "color"), ("bgColor", "#ZZZZZZ")], Some(&image)),
        );
        assert_eq!(response.status, 500);
        assert_eq!(response.body["success"], false);
    }

    #[test]
    fn test_oversized_body() {
        let mut request = upload(&[], Some(&png(8, 8)));
        request.body_truncated = true;
        let response = handle(&state(), request);
        assert_eq!(response.status, 413);
        assert_eq!(response.body["error"], TOO_LARGE_MESSAGE);
    }

    #[test]
    fn test_cors_only_for_allowed_origins() {
        let state = state();
        let allowed = handle(
            &state,
            ApiRequest::new(Method::Get, "/health").with_origin("http://localhost:3000"),
        );
        assert_eq!(
            allowed.header("Access-Control-Allow-Origin"),
            Some("http://localhost:3000")
        );

        let denied = handle(
            &state,
            ApiRequest::new(Method::Get, "/health").with_origin("https://attacker.example"),
        );
        assert_eq!(denied.header("Access-Control-Allow-Origin"), None);
    }
}
