//! HTTP service exposing the compositing pipeline
//!
//! Requests are accepted on a `tiny_http` listener and processed on a tokio
//! blocking pool sized by [`ServerConfig::workers`]. Routing lives in
//! [`routes`] and works on buffered requests, so handlers are tested
//! without sockets.

pub mod config;
pub mod cors;
pub mod multipart;
pub mod response;
pub mod routes;

pub use config::{ServerArgs, ServerConfig};
pub use cors::CorsPolicy;
pub use response::ApiResponse;
pub use routes::{handle, ApiRequest, AppState};

use crate::{
    backends::MockBackend,
    models::{ModelRegistry, ModelRegistryBuilder, ModelVariantConfig},
    pipeline::CompositingPipeline,
    tracing_config::{events, spans},
};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use tiny_http::{Request, Server};

/// Grace period for in-flight requests on shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Load every configured variant into a registry
///
/// # Errors
/// - Variant files missing or invalid
/// - Default variant not among the loaded variants
pub fn build_registry(config: &ServerConfig) -> Result<ModelRegistry> {
    let mut builder = ModelRegistry::builder().default_variant(config.default_model.clone());

    for variant in &config.variants {
        let _span = spans::model_loading(&variant.name, &variant.path).entered();
        builder = if config.mock_models {
            warn!("🧪 Using mock segmentation for '{}'", variant.name);
            builder.register_backend(
                variant.name.clone(),
                Box::new(MockBackend::with_input_size(variant.input_size as usize)),
            )?
        } else {
            load_variant(builder, variant)
                .with_context(|| format!("Failed to load model variant '{}'", variant.name))?
        };
    }

    Ok(builder.build()?)
}

#[cfg(feature = "tract")]
fn load_variant(builder: ModelRegistryBuilder, variant: &ModelVariantConfig) -> Result<ModelRegistryBuilder> {
    Ok(builder.load_variant(variant)?)
}

#[cfg(not(feature = "tract"))]
fn load_variant(_builder: ModelRegistryBuilder, variant: &ModelVariantConfig) -> Result<ModelRegistryBuilder> {
    anyhow::bail!(
        "Cannot load '{}': built without the tract feature (use --mock-models)",
        variant.path.display()
    )
}

/// Build the shared request state from a configuration
///
/// # Errors
/// - See [`build_registry`]
/// - Invalid pipeline configuration
pub fn build_state(config: &ServerConfig) -> Result<AppState> {
    let registry = Arc::new(build_registry(config)?);
    let pipeline = CompositingPipeline::new(config.pipeline.clone(), registry)
        .context("Invalid pipeline configuration")?;
    Ok(AppState::new(
        pipeline,
        CorsPolicy::new(config.allowed_origins.clone()),
        config.max_upload_bytes,
    ))
}

/// Run the service until Ctrl+C
///
/// # Errors
/// - Model loading failures
/// - Address cannot be bound
/// - Runtime cannot be created
pub fn run(config: ServerConfig) -> Result<()> {
    let state = Arc::new(build_state(&config)?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .max_blocking_threads(config.workers)
        .thread_name("bgremove-worker")
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    let address = config.bind_address();
    let server = Server::http(&address)
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", address, e))?;
    let server = Arc::new(server);

    info!(
        "🌐 Listening on http://{} ({} workers, models: {})",
        address,
        config.workers,
        state.pipeline.registry().variant_names().join(", ")
    );
    info!("🔒 Allowed origins: {}", state.cors.allowed_origins().join(", "));

    {
        let server = Arc::clone(&server);
        runtime.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("🛑 Shutdown requested, draining requests");
                server.unblock();
            }
        });
    }

    for request in server.incoming_requests() {
        let state = Arc::clone(&state);
        runtime.spawn_blocking(move || serve(&state, request));
    }

    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    info!("👋 Server stopped");
    Ok(())
}

/// Buffer, route and answer one request
fn serve(state: &AppState, mut request: Request) {
    let request_id = uuid::Uuid::new_v4().to_string();
    let method = request.method().clone();
    let url = request.url().to_string();
    let span = spans::request(&request_id, &method.to_string(), &url);
    let _guard = span.enter();

    let api_request = buffer_request(state, &mut request);
    let started = instant::Instant::now();
    let response = handle(state, api_request);
    debug!(
        "📤 {} {} -> {} in {:.1}ms",
        method,
        url,
        response.status,
        started.elapsed().as_secs_f64() * 1000.0
    );

    if let Err(e) = request.respond(response.into_http()) {
        events::error_with_context(&e, "writing response");
    }
}

fn header_value(request: &Request, name: &'static str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|h| h.field.equiv(name))
        .map(|h| h.value.as_str().to_string())
}

/// Read the body up to the upload limit
fn buffer_request(state: &AppState, request: &mut Request) -> ApiRequest {
    let mut api_request = ApiRequest::new(request.method().clone(), request.url());
    api_request.origin = header_value(request, "Origin");
    api_request.content_type = header_value(request, "Content-Type");

    let limit = state.max_upload_bytes;
    if request.body_length().is_some_and(|len| len as u64 > limit) {
        api_request.body_truncated = true;
        return api_request;
    }

    let mut body = Vec::new();
    match request.as_reader().take(limit + 1).read_to_end(&mut body) {
        Ok(_) if body.len() as u64 > limit => api_request.body_truncated = true,
        Ok(_) => api_request.body = body,
        Err(e) => events::error_with_context(&e, "reading request body"),
    }
    api_request
}
