use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::{Path as AxumPath, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use crate::blog;
use crate::constants::{DEFAULT_PRICE_RANGE, HOME_LOAD_TIMEOUT, PROVIDER_LIST_TIMEOUT};
use crate::error::LoadError;
use crate::index::{ProviderFilters, Sort, filter_options, query_providers};
use crate::loading::{load_home, load_medications, load_provider, load_providers};
use crate::model::Provider;
use crate::store::EntityStore;

pub struct AppState<S> {
    store: Arc<S>,
    provider_timeout: Duration,
    home_timeout: Duration,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            provider_timeout: self.provider_timeout,
            home_timeout: self.home_timeout,
        }
    }
}

impl<S> AppState<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
            provider_timeout: PROVIDER_LIST_TIMEOUT,
            home_timeout: HOME_LOAD_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, providers: Duration, home: Duration) -> Self {
        self.provider_timeout = providers;
        self.home_timeout = home;
        self
    }
}

pub fn router<S: EntityStore + 'static>(state: AppState<S>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/home", get(api_home::<S>))
        .route("/api/providers", get(api_providers::<S>))
        .route("/api/providers/:id", get(api_provider_detail::<S>))
        .route("/api/filters/providers", get(api_provider_filters::<S>))
        .route("/api/medications", get(api_medications::<S>))
        .route("/api/blog", get(api_blog::<S>))
        .route("/api/blog/:slug", get(api_article::<S>))
        .layer(cors)
        .with_state(state)
}

pub async fn run<S: EntityStore + 'static>(state: AppState<S>, host: &str, port: u16) -> anyhow::Result<()> {
    let app = router(state);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .context("parse host:port")?;

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Load failures are retryable from the page: 504 on timeout, 502 otherwise.
fn load_error_response(err: LoadError) -> axum::response::Response {
    let status = match err {
        LoadError::TimedOut { .. } => StatusCode::GATEWAY_TIMEOUT,
        LoadError::Failed { .. } => StatusCode::BAD_GATEWAY,
    };
    (status, Json(json!({ "error": err.user_message(), "retry": true }))).into_response()
}

async fn api_home<S: EntityStore + 'static>(State(st): State<AppState<S>>) -> impl IntoResponse {
    match load_home(st.store.as_ref(), st.home_timeout).await {
        Ok(home) => Json(home).into_response(),
        Err(e) => load_error_response(e),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ProviderSearchParams {
    search: Option<String>,
    /// Takes precedence over `search`, as on the home page's location box.
    location: Option<String>,
    #[serde(rename = "type")]
    provider_type: Option<String>,
    medication: Option<String>,
    price_min: Option<f64>,
    price_max: Option<f64>,
    trust_score_min: Option<f64>,
    rating_min: Option<f64>,
    gphc_registered: Option<bool>,
    cqc_regulated: Option<bool>,
    mhra_compliant: Option<bool>,
    gmc_doctors: Option<bool>,
    #[serde(alias = "sortBy")]
    sort: Option<String>,
}

#[derive(Debug, Serialize)]
struct ProviderSearchResponse<'a> {
    total: usize,
    providers: Vec<&'a Provider>,
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty() && *s != "all")
}

fn parse_search(p: &ProviderSearchParams) -> String {
    non_blank(p.location.as_deref())
        .or_else(|| non_blank(p.search.as_deref()))
        .unwrap_or("")
        .to_string()
}

/// Selecting a medication switches the default order to cheapest first.
fn parse_sort(p: &ProviderSearchParams, medication: Option<&str>) -> Option<Sort> {
    match non_blank(p.sort.as_deref()) {
        Some(s) => Sort::parse(s),
        None if medication.is_some() => Some(Sort::PriceAsc),
        None => Some(Sort::TrustScoreDesc),
    }
}

fn parse_filters(p: &ProviderSearchParams) -> ProviderFilters {
    let medication = non_blank(p.medication.as_deref()).map(str::to_string);
    let (default_min, default_max) = DEFAULT_PRICE_RANGE;
    ProviderFilters {
        provider_type: non_blank(p.provider_type.as_deref()).map(str::to_string),
        sort: parse_sort(p, medication.as_deref()),
        medication,
        medication_price_range: Some((
            p.price_min.unwrap_or(default_min),
            p.price_max.unwrap_or(default_max),
        )),
        trust_score_min: p.trust_score_min.unwrap_or(0.0),
        rating_min: p.rating_min.unwrap_or(0.0),
        gphc_registered: p.gphc_registered.filter(|b| *b),
        cqc_regulated: p.cqc_regulated.filter(|b| *b),
        mhra_compliant: p.mhra_compliant.filter(|b| *b),
        gmc_doctors: p.gmc_doctors.filter(|b| *b),
    }
}

async fn api_providers<S: EntityStore + 'static>(
    State(st): State<AppState<S>>,
    Query(p): Query<ProviderSearchParams>,
) -> impl IntoResponse {
    let providers = match load_providers(st.store.as_ref(), st.provider_timeout).await {
        Ok(v) => v,
        Err(e) => return load_error_response(e),
    };
    let filters = parse_filters(&p);
    let hits = query_providers(&providers, &parse_search(&p), &filters);
    Json(ProviderSearchResponse {
        total: hits.len(),
        providers: hits,
    })
    .into_response()
}

async fn api_provider_detail<S: EntityStore + 'static>(
    State(st): State<AppState<S>>,
    AxumPath(id): AxumPath<String>,
) -> impl IntoResponse {
    match load_provider(st.store.as_ref(), &id).await {
        Ok(Some(provider)) => Json(provider).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "Provider not found").into_response(),
        Err(e) => {
            tracing::warn!("Loading provider {} failed: {}", id, e);
            (StatusCode::BAD_GATEWAY, "Failed to load provider details").into_response()
        }
    }
}

async fn api_provider_filters<S: EntityStore + 'static>(
    State(st): State<AppState<S>>,
) -> impl IntoResponse {
    match load_providers(st.store.as_ref(), st.provider_timeout).await {
        Ok(providers) => Json(filter_options(&providers)).into_response(),
        Err(e) => load_error_response(e),
    }
}

async fn api_medications<S: EntityStore + 'static>(
    State(st): State<AppState<S>>,
) -> impl IntoResponse {
    Json(load_medications(st.store.as_ref()).await)
}

async fn api_blog<S: EntityStore + 'static>(State(st): State<AppState<S>>) -> impl IntoResponse {
    match blog::list_published(st.store.as_ref()).await {
        Ok(posts) => Json(posts).into_response(),
        Err(e) => {
            tracing::warn!("Failed to fetch blog posts: {}", e);
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}

async fn api_article<S: EntityStore + 'static>(
    State(st): State<AppState<S>>,
    AxumPath(slug): AxumPath<String>,
) -> impl IntoResponse {
    match blog::find_published(st.store.as_ref(), &slug).await {
        Ok(Some(post)) => Json(post).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "Article not found.").into_response(),
        Err(e) => (StatusCode::BAD_GATEWAY, e.to_string()).into_response(),
    }
}
