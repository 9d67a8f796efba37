use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use jobscout::filter_rules::RuleSet;
use jobscout::{
    Admission, BrowseFilter, CachedEmbedder, CorpusStore, EngineArgs, Explanation, Facets,
    JobRecord, QueryEmbedder, RankedCandidate, RateLimiter, ReloadSummary, SearchEngine,
    SearchError,
};
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug)]
#[command(
    name = "jobscout-api",
    about = "HTTP API for semantic job search over a precomputed vector store"
)]
struct ApiCli {
    /// Address to bind the HTTP server to (host:port).
    #[arg(long, env = "JOBSCOUT_BIND", default_value = "127.0.0.1:8080")]
    bind: String,

    /// Maximum top_n allowed per request.
    #[arg(long, env = "JOBSCOUT_MAX_TOP_N", default_value_t = 50)]
    max_top_n: usize,

    /// Max cached query embeddings kept in-memory (0 disables caching).
    #[arg(long, env = "JOBSCOUT_EMBEDDING_CACHE", default_value_t = 1024)]
    embedding_cache_size: usize,

    /// Sustained searches per minute allowed per client address (0 disables rate limiting).
    #[arg(long, env = "JOBSCOUT_RATE_LIMIT", default_value_t = 120)]
    max_requests_per_minute: u32,

    /// Searches a client may send back to back before the per-minute rate applies.
    #[arg(long, env = "JOBSCOUT_RATE_BURST", default_value_t = 12)]
    rate_limit_burst: u32,

    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Clone)]
struct AppState {
    engine: Arc<SearchEngine>,
    max_top_n: usize,
    rate_limiter: Option<Arc<RateLimiter<IpAddr>>>,
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    top_n: Option<usize>,
    #[serde(default)]
    explain: bool,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    results: Vec<RankedCandidate>,
    meta: ResponseMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    explanation: Option<Explanation>,
}

#[derive(Debug, Serialize)]
struct ResponseMeta {
    top_n: usize,
    latency_ms: f64,
    rules_applied: usize,
}

#[derive(Debug, Serialize)]
struct JobsResponse {
    total: usize,
    jobs: Vec<JobRecord>,
    facets: Facets,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn main() -> Result<()> {
    jobscout::logging::init();
    let cli = ApiCli::parse();
    // blocking HTTP clients must be dropped outside the runtime
    let engine = build_engine(&cli)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    runtime.block_on(serve(cli, engine))
}

async fn serve(cli: ApiCli, engine: SearchEngine) -> Result<()> {
    let rate_limiter = RateLimiter::new(cli.max_requests_per_minute, cli.rate_limit_burst);
    if rate_limiter.is_none() {
        tracing::info!("rate limiting disabled");
    }
    let state = AppState {
        engine: Arc::new(engine),
        max_top_n: cli.max_top_n.max(1),
        rate_limiter: rate_limiter.map(Arc::new),
    };
    let app = router(state);

    let addr: SocketAddr = cli
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", cli.bind))?;
    tracing::info!("jobscout-api listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
        .context("server shutdown")?;
    Ok(())
}

fn build_engine(cli: &ApiCli) -> Result<SearchEngine> {
    let args = &cli.engine;
    let remote = args
        .build_embedder()
        .context("failed to build query embedder")?;
    let embedder: Arc<dyn QueryEmbedder> =
        CachedEmbedder::wrap(Arc::new(remote), cli.embedding_cache_size);
    let explainer = args
        .build_explainer()
        .context("failed to build explanation client")?;
    let corpus = Arc::new(CorpusStore::open(args.corpus_source()));
    let engine = SearchEngine::new(embedder, corpus, RuleSet::empty(), args.build_controls())
        .with_explainer(explainer);
    match &args.rules {
        Some(path) => Ok(engine.with_rule_table(path)),
        None => {
            tracing::info!("no rule table configured; results are not filtered");
            Ok(engine)
        }
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/search", post(search_handler))
        .route("/v1/reload", post(reload_handler))
        .route("/v1/jobs", get(jobs_handler))
        .with_state(state)
}

async fn healthz(State(state): State<AppState>) -> StatusCode {
    if state.engine.corpus().is_some() && state.engine.rules().is_some() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn search_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, Response> {
    if request.query.trim().is_empty() {
        return Err(bad_request("query text must not be empty").into_response());
    }
    if let Some(limiter) = &state.rate_limiter {
        if let Admission::Limited { retry_after } = limiter.check(&peer.ip()) {
            tracing::debug!(client = %peer.ip(), "search rate limited");
            return Err(too_many_requests(retry_after));
        }
    }
    let top_n = request
        .top_n
        .unwrap_or(state.engine.controls().top_n())
        .clamp(1, state.max_top_n);
    let start = Instant::now();
    let report = state
        .engine
        .run(&request.query, Some(top_n))
        .await
        .map_err(|err| search_error(err).into_response())?;
    let explanation = if request.explain && !report.results.is_empty() {
        state.engine.explain(&request.query, &report.results).await
    } else {
        None
    };
    Ok(Json(SearchResponse {
        meta: ResponseMeta {
            top_n,
            latency_ms: start.elapsed().as_secs_f64() * 1000.0,
            rules_applied: report.rules_applied,
        },
        results: report.results,
        explanation,
    }))
}

async fn reload_handler(State(state): State<AppState>) -> Result<Json<ReloadSummary>, ApiError> {
    let engine = Arc::clone(&state.engine);
    let summary = tokio::task::spawn_blocking(move || engine.reload())
        .await
        .map_err(|err| internal_error(format!("reload task failed: {err}")))?
        .map_err(|err| internal_error(format!("reload failed, keeping previous data: {err}")))?;
    tracing::info!(
        jobs = summary.jobs,
        vectors = summary.vectors,
        rules = summary.rules,
        "reloaded search data"
    );
    Ok(Json(summary))
}

async fn jobs_handler(
    State(state): State<AppState>,
    Query(filter): Query<BrowseFilter>,
) -> Result<Json<JobsResponse>, ApiError> {
    let (jobs, facets) = state.engine.browse(&filter).map_err(search_error)?;
    Ok(Json(JobsResponse {
        total: jobs.len(),
        jobs,
        facets,
    }))
}

fn search_error(err: SearchError) -> ApiError {
    let (status, message) = match &err {
        SearchError::EmptyQuery => (StatusCode::BAD_REQUEST, err.to_string()),
        SearchError::Embedding(_) => (StatusCode::BAD_GATEWAY, err.to_string()),
        SearchError::CorpusUnavailable | SearchError::RulesUnavailable => (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("no results available: {err}"),
        ),
    };
    (status, Json(ErrorBody { message }))
}

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            message: message.into(),
        }),
    )
}

fn internal_error(message: impl Into<String>) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            message: message.into(),
        }),
    )
}

fn too_many_requests(retry_after: Duration) -> Response {
    let seconds = retry_after.as_secs_f64().ceil().max(1.0) as u64;
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, seconds.to_string())],
        Json(ErrorBody {
            message: format!("rate limit exceeded, retry in {seconds}s"),
        }),
    )
        .into_response()
}
