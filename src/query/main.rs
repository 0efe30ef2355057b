//! Address form query server.
//!
//! Answers hierarchical lookups against the published dataset version and,
//! when a feed directory is configured, rebuilds that version in the background.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use addressok::config::Config;
use addressok::lookup::{AddressResponse, AddressSelection, QueryEngine};
use addressok::store::{self, Retrying, SledStore};
use addressok::version::VersionManager;
use addressok::{Error, ObjectId};

mod refresh;

type Store = Retrying<SledStore>;

#[derive(Parser, Debug)]
#[command(name = "query")]
#[command(about = "Address classifier lookup server")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides the config file
    #[arg(short, long)]
    listen: Option<String>,

    /// Record store directory, overrides the config file
    #[arg(long)]
    store: Option<PathBuf>,

    /// Feed directory to rebuild from, overrides the config file
    #[arg(long)]
    feed_dir: Option<PathBuf>,
}

/// Application state shared across handlers
struct AppState {
    store: Arc<Store>,
    engine: Arc<QueryEngine<Store>>,
    timeout: Duration,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    info!("AddressOK Query Server");

    let mut config = match &args.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(listen) = args.listen {
        config.query.listen = listen;
    }
    if let Some(path) = args.store {
        config.store.path = path;
    }
    if let Some(dir) = args.feed_dir {
        config.query.feed_dir = Some(dir);
    }

    let store = Arc::new(store::open(&config).context("Failed to open record store")?);
    match VersionManager::new(&*store).current()? {
        Some(current) => info!(
            "Serving version {} ({})",
            current.version, current.source_date
        ),
        None => info!("No published version yet, lookups will fail until a build completes"),
    }

    if let Some(dir) = config.query.feed_dir.clone() {
        tokio::spawn(refresh::run(store.clone(), config.clone(), dir));
    }

    let state = Arc::new(AppState {
        engine: Arc::new(QueryEngine::new(store.clone(), config.build.max_depth)),
        store,
        timeout: config.query.timeout(),
    });

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/v1/lookup", get(lookup_handler))
        .route("/v1/lookup/zip", get(zip_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("Starting server on {}", config.query.listen);

    let listener = tokio::net::TcpListener::bind(&config.query.listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let store = state.store.clone();
    let current = match tokio::task::spawn_blocking(move || VersionManager::new(&*store).current())
        .await
    {
        Ok(Ok(current)) => current,
        Ok(Err(e)) => {
            error!("Failed to read version pointer: {}", e);
            None
        }
        Err(e) => {
            error!("Version read task failed: {}", e);
            None
        }
    };

    Json(HealthResponse {
        status: if current.is_some() { "ok" } else { "degraded" },
        version: current.as_ref().map(|v| v.version),
        source_date: current.map(|v| v.source_date),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: Option<u32>,
    source_date: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct LookupQueryParams {
    /// Object the user just picked; takes precedence over the per-field ids
    address_object_id: Option<ObjectId>,
    region_id: ObjectId,
    district_id: ObjectId,
    place_id: ObjectId,
    street_id: ObjectId,
    postal_code: String,
}

/// Fill the form from the picked object or the most specific filled field
async fn lookup_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LookupQueryParams>,
) -> (StatusCode, Json<LookupEnvelope>) {
    let selection = AddressSelection {
        region_id: params.region_id,
        district_id: params.district_id,
        place_id: params.place_id,
        street_id: params.street_id,
        postal_code: params.postal_code,
    };
    let id = params
        .address_object_id
        .unwrap_or_else(|| selection.most_specific());

    run_lookup(&state, move |engine, deadline| {
        engine.lookup(id, &selection.postal_code, Some(deadline))
    })
    .await
}

#[derive(Deserialize)]
struct ZipQueryParams {
    postal_code: String,
}

/// Every object served by one postal code
async fn zip_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ZipQueryParams>,
) -> (StatusCode, Json<LookupEnvelope>) {
    run_lookup(&state, move |engine, deadline| {
        engine.lookup_by_postal_code(&params.postal_code, Some(deadline))
    })
    .await
}

/// Run a blocking lookup with the request deadline, mapping failures to a generic envelope
async fn run_lookup<F>(state: &AppState, op: F) -> (StatusCode, Json<LookupEnvelope>)
where
    F: FnOnce(&QueryEngine<Store>, Instant) -> addressok::Result<AddressResponse>
        + Send
        + 'static,
{
    let engine = state.engine.clone();
    let deadline = Instant::now() + state.timeout;
    let task = tokio::task::spawn_blocking(move || op(&*engine, deadline));

    match tokio::time::timeout(state.timeout, task).await {
        Ok(Ok(Ok(response))) => (StatusCode::OK, Json(LookupEnvelope::ok(response))),
        Ok(Ok(Err(e))) => {
            error!("Lookup failed: {}", e);
            let status = match e {
                Error::NoPublishedVersion => StatusCode::SERVICE_UNAVAILABLE,
                Error::Cancelled => StatusCode::GATEWAY_TIMEOUT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(LookupEnvelope::failed()))
        }
        Ok(Err(e)) => {
            error!("Lookup task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(LookupEnvelope::failed()),
            )
        }
        Err(_) => {
            error!("Lookup timed out after {:?}", state.timeout);
            (StatusCode::GATEWAY_TIMEOUT, Json(LookupEnvelope::failed()))
        }
    }
}

#[derive(Serialize)]
struct LookupEnvelope {
    result: &'static str,
    #[serde(flatten)]
    response: Option<AddressResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<&'static str>,
}

impl LookupEnvelope {
    fn ok(response: AddressResponse) -> Self {
        Self {
            result: "ok",
            response: Some(response),
            error_message: None,
        }
    }

    fn failed() -> Self {
        Self {
            result: "error",
            response: None,
            error_message: Some("lookup failed"),
        }
    }
}
