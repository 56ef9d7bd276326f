//! BifrostQL query engine host.
//!
//! Reads the live database catalog into a [`model::DbModel`], derives a
//! GraphQL schema from it, and serves it over HTTP via `axum`. Everything
//! past the transport boundary — parsing, the query tree, the module
//! pipeline, SQL compilation, execution — lives in the library modules this
//! binary wires together; see spec.md §1 for the scope line between "core"
//! and "external collaborators" (auth, transport, UI).

mod cache;
mod compiler;
mod config;
mod db;
mod dialect;
mod error;
mod executor;
mod gql_schema;
mod model;
mod mutation;
mod pipeline;
mod query_tree;
mod schema_reader;

use std::sync::Arc;

use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cache::{CacheEntry, PathCache};
use crate::config::{Config, MetadataOverlay};
use crate::db::Pool;
use crate::error::EngineError;
use crate::gql_schema::GqlSchema;
use crate::model::{DbModel, DbModelBuilder};
use crate::pipeline::{modules, Pipeline};

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    pool: Pool,
    cache: PathCache,
    overlay: Arc<MetadataOverlay>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bifrostql=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = match Config::from_env() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("configuration error: {e:#}");
            std::process::exit(1);
        }
    };

    let overlay = Arc::new(match &config.metadata_path {
        Some(path) => match MetadataOverlay::load(path) {
            Ok(o) => o,
            Err(e) => {
                eprintln!("metadata overlay error: {e:#}");
                std::process::exit(1);
            }
        },
        None => MetadataOverlay::empty(),
    });

    tracing::info!(engine = ?config.engine, "connecting to database");
    let pool = match db::connect(&config.connection_string, config.engine).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("could not connect to database: {e:#}");
            std::process::exit(2);
        }
    };
    tracing::info!("database connected");

    let cache = PathCache::new();

    // Build the schema once up front so startup fails fast (exit code 2,
    // spec.md §6) rather than on the first request.
    if let Err(e) = load_schema(&pool, &overlay, &cache, &config.path, config.statement_timeout).await {
        eprintln!("schema load failed: {e:#}");
        std::process::exit(2);
    }
    tracing::info!(path = %config.path, "schema loaded");

    if let Some(interval) = config.schema_refresh_poll {
        let pool = pool.clone();
        let overlay = overlay.clone();
        let cache = cache.clone();
        let path = config.path.clone();
        let statement_timeout = config.statement_timeout;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                cache.invalidate(&path);
                if let Err(e) = load_schema(&pool, &overlay, &cache, &path, statement_timeout).await {
                    tracing::error!(error = %e, "background schema refresh failed, keeping previous snapshot");
                }
            }
        });
    }

    let state = AppState { config: config.clone(), pool, cache, overlay };

    let app = Router::new()
        .route("/healthz", get(health))
        .route(&config.path, get(graphiql).post(graphql_handler))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = std::net::SocketAddr::from((
        [0, 0, 0, 0],
        config.port,
    ));
    tracing::info!(%addr, path = %config.path, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Reads the catalog, builds the `DbModel`, wires the default modules
/// (tenant isolation, soft delete, created-by population) over it, and
/// derives the GraphQL schema — the loader every `PathCache` miss runs,
/// whether that miss happens at startup, on the refresh timer, or (rarely,
/// between an `invalidate` and the refresh task's own reload) on an
/// in-flight request.
async fn build_cache_entry(
    pool: Pool,
    overlay: Arc<MetadataOverlay>,
    statement_timeout: std::time::Duration,
) -> Result<(Arc<DbModel>, GqlSchema), EngineError> {
    let schema_data = schema_reader::read_schema(&pool).await?;
    let model = Arc::new(DbModelBuilder::new(schema_data, (*overlay).clone()).build());

    let pipeline = Arc::new(
        Pipeline::builder()
            .filter_transformer(Box::new(modules::TenantFilterTransformer::new(model.clone())))
            .filter_transformer(Box::new(modules::SoftDeleteFilterTransformer::new(model.clone())))
            .mutation_transformer(Box::new(modules::SoftDeleteMutationTransformer::new(model.clone())))
            .mutation_transformer(Box::new(modules::PopulateContextTransformer::new(model.clone())))
            .build(),
    );

    let schema = gql_schema::build_schema(model.clone(), pool, pipeline, statement_timeout)?;
    Ok((model, schema))
}

async fn load_schema(pool: &Pool, overlay: &Arc<MetadataOverlay>, cache: &PathCache, path: &str, statement_timeout: std::time::Duration) -> Result<(), EngineError> {
    let pool = pool.clone();
    let overlay = overlay.clone();
    cache
        .get_or_build(path, || build_cache_entry(pool, overlay, statement_timeout))
        .await
        .map(|_: CacheEntry| ())
}

/// Parses the `x-bifrostql-claims` header (a JSON object of string claims)
/// into a [`pipeline::UserContext`]. Token verification itself is the
/// external auth collaborator's job (spec.md §1); by the time a request
/// reaches this binary it either carries pre-validated claims or none.
fn user_context_from_headers(headers: &HeaderMap) -> pipeline::UserContext {
    let claims = headers
        .get("x-bifrostql-claims")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| serde_json::from_str::<std::collections::HashMap<String, String>>(s).ok())
        .unwrap_or_default();
    pipeline::UserContext { claims }
}

async fn graphql_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: GraphQLRequest,
) -> impl IntoResponse {
    if !state.config.disable_auth && !headers.contains_key("x-bifrostql-claims") {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "errors": [{ "message": "request carries no validated principal" }] })),
        )
            .into_response();
    }

    let entry = match state
        .cache
        .get_or_build(&state.config.path, || {
            build_cache_entry(state.pool.clone(), state.overlay.clone(), state.config.statement_timeout)
        })
        .await
    {
        Ok(entry) => entry,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "errors": [{ "message": e.user_message() }] })),
            )
                .into_response();
        }
    };

    let user_ctx = user_context_from_headers(&headers);
    let request = request.into_inner().data(user_ctx);
    let response = entry.schema.execute(request).await;
    GraphQLResponse::from(response).into_response()
}

async fn graphiql(State(state): State<AppState>) -> impl IntoResponse {
    Html(GraphiQLSource::build().endpoint(&state.config.path).finish())
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let paths = state.cache.paths();
    Json(serde_json::json!({ "status": "ok", "schemas_loaded": paths }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_context_parses_claims_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-bifrostql-claims", "{\"tenant_id\":\"42\"}".parse().unwrap());
        let ctx = user_context_from_headers(&headers);
        assert_eq!(ctx.get("tenant_id"), Some("42"));
    }

    #[test]
    fn user_context_defaults_empty_without_header() {
        let ctx = user_context_from_headers(&HeaderMap::new());
        assert!(ctx.get("tenant_id").is_none());
    }
}
