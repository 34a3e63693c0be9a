//! HTTP proxy API.
//!
//! Wraps the resolver in a small JSON API so browser and mobile clients can
//! look up products without hitting the upstream providers (and their CORS
//! policies) directly. All lookups served here share one in-memory cache
//! for the lifetime of the process.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/health` | Liveness check |
//! | `GET`  | `/api/product/{barcode}` | Full normalized product (proxy shape) |
//! | `POST` | `/api/lookup` | Category-hinted lookup, slim response |
//! | `POST` | `/api/save-expiry` | Patch a scan row's expiry fields |
//!
//! # Error Contract
//!
//! The proxy endpoint answers `{ok:false, error}` with 400 for a missing
//! barcode and 502 when every upstream was unreachable, and
//! `{ok:false, notFound:true, message}` with 404 for an unknown barcode.
//! Raw upstream error text is logged, never returned.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted; the whole point of the
//! proxy is to sit in front of APIs the browser cannot call cross-origin.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::cache::{MemoryCache, SystemClock};
use crate::config::Config;
use crate::models::{Category, LookupResult, Product, Source};
use crate::providers::build_adapters;
use crate::resolver::{Resolver, NOT_FOUND_MESSAGE};
use crate::scans::ScanStore;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    resolver: Arc<Resolver>,
    scans: Option<Arc<ScanStore>>,
}

/// Starts the proxy server with the production resolver (live adapters,
/// in-memory cache). Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let cache = Arc::new(MemoryCache::new(Arc::new(SystemClock)));
    let adapters = build_adapters(&config.providers)?;
    let resolver = Arc::new(Resolver::new(adapters, cache));

    let scans = match &config.backend {
        Some(backend) => Some(Arc::new(ScanStore::new(backend)?)),
        None => None,
    };
    if scans.is_none() {
        info!("no backend configured, scan history disabled");
    }

    run_server_with_parts(config, resolver, scans).await
}

/// Starts the proxy server over an injected resolver and scan store.
///
/// Like [`run_server`], but the caller supplies the parts, so tests can
/// drive the HTTP contract with stub adapters and custom caches.
pub async fn run_server_with_parts(
    config: &Config,
    resolver: Arc<Resolver>,
    scans: Option<Arc<ScanStore>>,
) -> anyhow::Result<()> {
    let state = AppState { resolver, scans };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router(state).layer(cors);

    info!("proxy listening on http://{}", config.server.bind);
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handle_health))
        .route("/api/product/{barcode}", get(handle_product))
        .route("/api/lookup", post(handle_lookup))
        .route("/api/save-expiry", post(handle_save_expiry))
        .with_state(state)
}

/// JSON error carrying the proxy wire shape (`ok: false`).
struct ApiError {
    status: StatusCode,
    body: serde_json::Value,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn missing_barcode() -> ApiError {
    ApiError {
        status: StatusCode::BAD_REQUEST,
        body: json!({"ok": false, "error": "Missing barcode"}),
    }
}

fn upstream_error(message: &str) -> ApiError {
    ApiError {
        status: StatusCode::BAD_GATEWAY,
        body: json!({"ok": false, "error": message}),
    }
}

fn not_found_error() -> ApiError {
    ApiError {
        status: StatusCode::NOT_FOUND,
        body: json!({"ok": false, "notFound": true, "message": NOT_FOUND_MESSAGE}),
    }
}

// ============ GET /api/health ============

async fn handle_health() -> Json<serde_json::Value> {
    Json(json!({"ok": true}))
}

// ============ GET /api/product/{barcode} ============

#[derive(Serialize)]
struct ProductResponse {
    ok: bool,
    product: Product,
}

/// Full-product proxy endpoint. No category hint: the path is barcode-only,
/// so the default (food-first) chain ordering applies.
async fn handle_product(
    State(state): State<AppState>,
    Path(barcode): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let barcode = barcode.trim().to_string();
    if barcode.is_empty() {
        return Err(missing_barcode());
    }
    let result = state.resolver.resolve(&barcode, None).await;
    // The proxy path carries no auth; its history rows stay anonymous.
    record_history(&state, &barcode, &result, None).await;
    match result {
        LookupResult::Found(product) => Ok(Json(ProductResponse { ok: true, product })),
        LookupResult::NotFound => Err(not_found_error()),
        LookupResult::Error(message) => Err(upstream_error(&message)),
    }
}

// ============ POST /api/lookup ============

#[derive(Deserialize)]
struct LookupRequest {
    barcode: Option<String>,
    category: Option<String>,
    /// Authenticated user making the scan, forwarded by the app after its
    /// own auth flow. Anonymous lookups leave it out.
    user_id: Option<String>,
}

/// Slim per-scan response consumed by the in-app scanner flow.
#[derive(Serialize)]
struct LookupResponse {
    barcode: String,
    product_name: Option<String>,
    brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expiry_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_expired: Option<bool>,
    source: Source,
}

async fn handle_lookup(
    State(state): State<AppState>,
    Json(req): Json<LookupRequest>,
) -> Result<Response, ApiError> {
    let barcode = req.barcode.unwrap_or_default().trim().to_string();
    if barcode.is_empty() {
        return Err(ApiError {
            status: StatusCode::BAD_REQUEST,
            body: json!({"error": "barcode required"}),
        });
    }
    let category = req.category.as_deref().and_then(Category::from_hint);
    let result = state.resolver.resolve(&barcode, category).await;
    record_history(&state, &barcode, &result, req.user_id.as_deref()).await;
    match result {
        LookupResult::Found(p) => Ok(Json(LookupResponse {
            barcode,
            product_name: p.product_name,
            brand: p.brand,
            expiry_date: p.expiry_date,
            is_expired: p.is_expired,
            source: p.source,
        })
        .into_response()),
        LookupResult::NotFound => Ok(Json(json!({"notFound": true})).into_response()),
        LookupResult::Error(message) => Err(upstream_error(&message)),
    }
}

// ============ POST /api/save-expiry ============

#[derive(Deserialize)]
struct SaveExpiryRequest {
    barcode: Option<String>,
    expiry_date: Option<String>,
}

async fn handle_save_expiry(
    State(state): State<AppState>,
    Json(req): Json<SaveExpiryRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (Some(barcode), Some(expiry_date)) = (
        req.barcode.filter(|b| !b.trim().is_empty()),
        req.expiry_date.filter(|d| !d.trim().is_empty()),
    ) else {
        return Err(ApiError {
            status: StatusCode::BAD_REQUEST,
            body: json!({"error": "barcode and expiry_date required"}),
        });
    };
    let Some(scans) = &state.scans else {
        return Err(ApiError {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: json!({"error": "persistence not configured"}),
        });
    };
    if let Err(e) = scans.save_expiry(barcode.trim(), expiry_date.trim()).await {
        error!(error = %e, "save-expiry failed");
        return Err(ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: json!({"error": "failed to save expiry"}),
        });
    }
    Ok(Json(json!({"ok": true})))
}

/// Best-effort history write: lookups must not fail because the history
/// backend is down.
async fn record_history(
    state: &AppState,
    barcode: &str,
    result: &LookupResult,
    user_id: Option<&str>,
) {
    let Some(scans) = &state.scans else { return };
    let Some(record) = crate::models::ScanRecord::from_result(barcode, result, user_id) else {
        return;
    };
    if let Err(e) = scans.record_scan(&record).await {
        error!(barcode, error = %e, "scan history write failed");
    }
}
