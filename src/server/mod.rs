//! HTTP API over the exercise catalog.

pub mod error;
pub mod handlers;

use crate::adapters::google::{DisabledImageSearch, GoogleImageSearch};
use crate::adapters::memory::MemoryStore;
use crate::config::settings::{Settings, DEFAULT_MAX_UPLOAD_BYTES};
use crate::core::CatalogService;
use crate::domain::ports::{ExerciseStore, ImageSearch, RoutineStore};
use crate::utils::error::Result;
use axum::extract::{DefaultBodyLimit, Request};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::Router;
use std::sync::Arc;
use std::time::Instant;

pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub catalog: CatalogService,
    /// Larger request bodies are answered with 413.
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(catalog: CatalogService) -> Self {
        Self {
            catalog,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_upload_limit(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.max_upload_bytes);
    Router::new()
        .route("/", get(handlers::root))
        .route("/hello/:name", get(handlers::hello))
        .route("/exercises/title", get(handlers::exercise_by_title))
        .route("/exercises/search", get(handlers::search_exercise))
        .route("/exercises/upload-csv", post(handlers::upload_exercises_csv))
        .route("/exercises/:id", get(handlers::exercise_by_id))
        .route("/exercises", get(handlers::exercises))
        .route("/titles", get(handlers::titles))
        .route("/exercise", post(handlers::create_exercise))
        .route("/exercise/update-gif", post(handlers::update_gif))
        .route(
            "/routines",
            get(handlers::routines).post(handlers::create_routine),
        )
        .route("/routines/upload-csv", post(handlers::upload_routines_csv))
        .route("/routines/:id", put(handlers::update_routine))
        .layer(body_limit)
        .layer(middleware::from_fn(cors))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

/// Allows every origin, method and header; answers preflight requests directly.
async fn cors(request: Request, next: Next) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("*"));
    let requested_headers = request
        .headers()
        .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("*"));

    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, PATCH, OPTIONS"),
    );
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, requested_headers);
    headers.insert(header::VARY, HeaderValue::from_static("Origin"));
    response
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    if status.is_server_error() {
        tracing::error!(%method, %path, %status, elapsed_ms, "request failed");
    } else if status.is_client_error() {
        tracing::warn!(%method, %path, %status, elapsed_ms, "request rejected");
    } else {
        tracing::debug!(%method, %path, %status, elapsed_ms, "request served");
    }
    response
}

fn shared<S>(store: S) -> (Arc<dyn ExerciseStore>, Arc<dyn RoutineStore>)
where
    S: ExerciseStore + RoutineStore + 'static,
{
    let store = Arc::new(store);
    let exercises: Arc<dyn ExerciseStore> = store.clone();
    let routines: Arc<dyn RoutineStore> = store;
    (exercises, routines)
}

async fn build_stores(settings: &Settings) -> (Arc<dyn ExerciseStore>, Arc<dyn RoutineStore>) {
    match &settings.mongo_uri {
        #[cfg(feature = "mongo")]
        Some(uri) => {
            match crate::adapters::mongo::MongoStore::connect(uri, &settings.db_name).await {
                Ok(store) => shared(store),
                Err(e) => {
                    tracing::error!("Failed to configure MongoDB client: {}", e);
                    shared(MemoryStore::unavailable())
                }
            }
        }
        #[cfg(not(feature = "mongo"))]
        Some(_) => {
            tracing::warn!("MONGO_URI is set but the mongo feature is disabled; using in-memory store");
            shared(MemoryStore::new())
        }
        None => {
            tracing::warn!("MONGO_URI not set; using in-memory store");
            shared(MemoryStore::new())
        }
    }
}

fn build_search(settings: &Settings) -> Arc<dyn ImageSearch> {
    match (&settings.google_api_key, &settings.google_cx) {
        (Some(key), Some(cx)) => Arc::new(GoogleImageSearch::new(
            settings.search_endpoint.clone(),
            key.clone(),
            cx.clone(),
        )),
        _ => {
            tracing::warn!("GOOGLE_API_KEY or GOOGLE_CX not set; image search disabled");
            Arc::new(DisabledImageSearch)
        }
    }
}

/// 建立服務並監聽，直到收到 Ctrl-C
pub async fn serve(settings: Settings) -> Result<()> {
    let (exercises, routines) = build_stores(&settings).await;
    let mut catalog = CatalogService::new(exercises, routines, build_search(&settings));
    catalog.initialize(&settings.fallback_routines_path).await;
    if catalog.is_degraded() {
        tracing::warn!("Serving routines from fallback file");
    }

    let addr = settings.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("fit-check listening on {}", addr);

    let state = AppState::new(catalog).with_upload_limit(settings.max_upload_bytes);
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("fit-check stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
