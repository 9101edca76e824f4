//! In-process stub of the remote API
//!
//! Implements the indicator endpoint and the change feed with last-write-wins
//! storage, so scenarios can be exercised without the real system. Every
//! upsert marks the person as changed on the stub's current day.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use tracing::{debug, warn};

use crate::api::types::{
    ChangeFeedResponse, IndicatorRequest, IndicatorResponse, CHANGES_PATH, CHANGES_SINCE_PARAM,
    INDICATOR_PATH,
};

/// Stub settings
#[derive(Debug, Clone, Default)]
pub struct StubConfig {
    /// Required bearer token; any bearer token is accepted when unset
    pub token: Option<String>,
    /// Fixed current day; the local date is used when unset
    pub today: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
struct StoredIndicator {
    begindatum: NaiveDate,
    einddatum: Option<NaiveDate>,
}

#[derive(Debug, Default)]
struct Store {
    indicators: BTreeMap<String, StoredIndicator>,
    changed_on: BTreeMap<String, NaiveDate>,
}

#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<Store>>,
    config: Arc<StubConfig>,
}

impl AppState {
    fn today(&self) -> NaiveDate {
        self.config
            .today
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), Response> {
        let presented = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        let allowed = match (presented, &self.config.token) {
            (Some(token), Some(expected)) => token == expected.as_str(),
            (Some(token), None) => !token.is_empty(),
            (None, _) => false,
        };

        if allowed {
            Ok(())
        } else {
            warn!("rejecting request without a valid bearer token");
            Err(StatusCode::UNAUTHORIZED.into_response())
        }
    }
}

fn problem(status: StatusCode, detail: impl Into<String>) -> Response {
    let body = json!({
        "status": status.as_u16(),
        "title": status.canonical_reason().unwrap_or("error"),
        "detail": detail.into(),
    });
    (status, Json(body)).into_response()
}

/// Build the stub router
pub fn router(config: StubConfig) -> Router {
    let state = AppState {
        store: Arc::new(Mutex::new(Store::default())),
        config: Arc::new(config),
    };

    Router::new()
        .route(&format!("/{}/:bsn", INDICATOR_PATH), put(put_indicator))
        .route(&format!("/{}", CHANGES_PATH), get(get_changes))
        .with_state(state)
}

/// Serve the stub on an already bound listener
pub async fn serve(listener: TcpListener, config: StubConfig) -> std::io::Result<()> {
    axum::serve(listener, router(config)).await
}

async fn put_indicator(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(bsn): Path<String>,
    body: Result<Json<IndicatorRequest>, JsonRejection>,
) -> Response {
    if let Err(rejected) = state.authorize(&headers) {
        return rejected;
    }
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => return problem(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    if bsn.trim().is_empty() {
        return problem(StatusCode::BAD_REQUEST, "empty burgerservicenummer");
    }

    let today = state.today();
    let Ok(mut store) = state.store.lock() else {
        return problem(StatusCode::INTERNAL_SERVER_ERROR, "store unavailable");
    };

    let (status, begindatum) = match store.indicators.get(&bsn) {
        Some(existing) => (StatusCode::OK, existing.begindatum),
        None => (StatusCode::CREATED, today),
    };
    store.indicators.insert(
        bsn.clone(),
        StoredIndicator {
            begindatum,
            einddatum: request.einddatum,
        },
    );
    store.changed_on.insert(bsn.clone(), today);
    debug!(%bsn, einddatum = ?request.einddatum, status = status.as_u16(), "indicator stored");

    let response = IndicatorResponse {
        burgerservicenummer: Some(bsn),
        begindatum: Some(begindatum.format("%Y-%m-%d").to_string()),
        einddatum: request.einddatum.map(|d| d.format("%Y-%m-%d").to_string()),
    };
    (status, Json(response)).into_response()
}

async fn get_changes(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Err(rejected) = state.authorize(&headers) {
        return rejected;
    }
    let Some(since) = params.get(CHANGES_SINCE_PARAM) else {
        return problem(StatusCode::BAD_REQUEST, format!("missing '{}'", CHANGES_SINCE_PARAM));
    };
    let Ok(since) = NaiveDate::parse_from_str(since, "%Y-%m-%d") else {
        return problem(StatusCode::BAD_REQUEST, format!("invalid date '{}'", since));
    };

    let Ok(store) = state.store.lock() else {
        return problem(StatusCode::INTERNAL_SERVER_ERROR, "store unavailable");
    };
    let changed: Vec<String> = store
        .changed_on
        .iter()
        .filter(|(_, day)| **day >= since)
        .map(|(bsn, _)| bsn.clone())
        .collect();
    debug!(%since, count = changed.len(), "change feed served");

    Json(ChangeFeedResponse {
        burgerservicenummers: changed,
    })
    .into_response()
}
