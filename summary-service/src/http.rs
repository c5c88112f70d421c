//! Thin HTTP surface over the query service. All algorithmic content lives in
//! the components it calls; this module only parses parameters, resolves the
//! principal header, and maps errors to status codes.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::query::{Period, QueryError, QueryRequest, QueryService};
use crate::scope::ScopeResolver;
use crate::store::{DirectoryStore, GrantStore};
use crate::trend::QueryResponse;

const PRINCIPAL_HEADER: &str = "x-principal";

#[derive(Clone)]
pub struct AppState {
    query: Arc<QueryService>,
    directory: Arc<dyn DirectoryStore>,
    scopes: Arc<ScopeResolver>,
    reading_tables: Arc<Vec<String>>,
}

impl AppState {
    pub fn new(
        query: Arc<QueryService>,
        directory: Arc<dyn DirectoryStore>,
        grants: Arc<dyn GrantStore>,
        reading_tables: Vec<String>,
    ) -> Self {
        Self {
            query,
            directory,
            scopes: Arc::new(ScopeResolver::new(grants)),
            reading_tables: Arc::new(reading_tables),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/inverter/data", get(inverter_data))
        .route("/api/plants", get(plants))
        .route("/api/health", get(health))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct DataParams {
    period: Option<String>,
    offset: Option<i64>,
    plants: Option<String>,
    devices: Option<String>,
}

type ApiError = (StatusCode, Json<Value>);

fn error_body(status: StatusCode, message: &str) -> ApiError {
    (status, Json(json!({ "error": message })))
}

fn principal_from(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(PRINCIPAL_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| error_body(StatusCode::UNAUTHORIZED, "missing principal header"))
}

fn split_csv(value: &Option<String>) -> Vec<String> {
    value
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_plant_ids(value: &Option<String>) -> Result<Vec<i64>, ApiError> {
    split_csv(value)
        .iter()
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| error_body(StatusCode::BAD_REQUEST, "invalid plant id"))
        })
        .collect()
}

async fn inverter_data(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<DataParams>,
) -> Result<Json<QueryResponse>, ApiError> {
    let principal = principal_from(&headers)?;

    let period: Period = params
        .period
        .as_deref()
        .unwrap_or("day")
        .parse()
        .map_err(|e: QueryError| error_body(StatusCode::BAD_REQUEST, &e.to_string()))?;

    let request = QueryRequest {
        principal,
        period,
        offset: params.offset.unwrap_or(0),
        plants: parse_plant_ids(&params.plants)?,
        devices: split_csv(&params.devices),
    };

    match state.query.query(&request).await {
        Ok(response) => Ok(Json(response)),
        Err(e @ QueryError::Unauthorized(_)) => {
            Err(error_body(StatusCode::FORBIDDEN, &e.to_string()))
        }
        Err(e @ (QueryError::InvalidPeriod(_) | QueryError::OffsetOutOfRange(_))) => {
            Err(error_body(StatusCode::BAD_REQUEST, &e.to_string()))
        }
        Err(QueryError::Store(e)) => {
            tracing::error!(error = %e, "query failed");
            Err(error_body(StatusCode::INTERNAL_SERVER_ERROR, "query failed"))
        }
    }
}

async fn plants(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let principal = principal_from(&headers)?;

    let scope = state.scopes.resolve(&principal, &[], &[]).await.map_err(|e| match e {
        crate::scope::ScopeError::Store(e) => {
            tracing::error!(error = %e, "grant lookup failed");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "grant lookup failed")
        }
        denied => error_body(StatusCode::FORBIDDEN, &denied.to_string()),
    })?;

    let entries = state.directory.plant_directory().await.map_err(|e| {
        tracing::error!(error = %e, "plant directory load failed");
        error_body(StatusCode::INTERNAL_SERVER_ERROR, "directory unavailable")
    })?;

    let visible: Vec<Value> = entries
        .iter()
        .filter(|e| match &scope.plants {
            None => true,
            Some(allowed) => allowed.contains(&e.plant_id),
        })
        .map(|e| json!({ "plantId": e.plant_id, "plantName": e.plant_name }))
        .collect();

    Ok(Json(json!({ "plants": visible })))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "ok": true, "tables": *state.reading_tables }))
}
