//! JSON HTTP server.
//!
//! Every model and client is built once in [`Services::from_config`] and
//! shared by the handlers behind an `Arc`.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Status, version, whether the index has passages |
//! | `POST` | `/predict` | Risk label for one clause |
//! | `POST` | `/api/summarize` | Chunked summary of a document |
//! | `POST` | `/api/analyze` | Summary, notice-reply advice and per-clause risk |
//! | `POST` | `/compare` | Explain the change between two retrieved sections |
//! | `POST` | `/search` | Top-k passages for a query |
//! | `GET`  | `/sources` | Indexed source names |
//! | `POST` | `/advice` | Case-grounded advice for a situation |
//! | `GET`  | `/api/news` | Paginated legal news for a location |
//! | `POST` | `/api/search-laws` | Scrape statute search results |
//! | `POST` | `/api/will` | Draft a will from free text |
//! | `POST` | `/api/lawyers/search` | Filter and rank the lawyer directory |
//! | `POST` | `/api/assistant` | IVR assistant reply |
//! | `GET`  | `/api/pdf/{*path}` | Serve a PDF from the corpus |
//!
//! # Error Contract
//!
//! ```json
//! { "error": "No clause_text provided" }
//! ```
//!
//! Missing input is `400`, unknown files `404`, everything else `500`.
//! `/advice`, `/api/news` and `/compare` report upstream failures in-band
//! with a `200`.

use anyhow::{Context, Result};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts, Path, Query, Request, State,
    },
    http::{header, request::Parts, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::advice::{validate_advice_request, AdviceOutcome, LegalAdvisor, Retriever};
use crate::assistant::{AssistantContext, LegalAssistant};
use crate::classifier::{overall_risk, Classifier, LinearClassifier, RiskAnalyzer};
use crate::config::Config;
use crate::corpus::resolve_within;
use crate::db;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::lawyers::{LawyerDirectory, LawyerFilters, LawyerMatch};
use crate::llm::{create_generator, GenerationOptions, TextGenerator};
use crate::models::{ClauseRisk, PassageMetadata, ScoredPassage};
use crate::news::{normalize_paging, NewsClient, NewsPage};
use crate::preprocess::normalize_whitespace;
use crate::scraper::{LawScraper, LawSearchResult, ScrapeError};
use crate::store::{SqliteVectorStore, VectorStore};
use crate::summarize::{summarize_document, LlmSummarizer, Summarizer};
use crate::will::{GeneratedWill, WillGenerator};

/// Pluggable model and storage backends.
pub struct Providers {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub classifier: Arc<dyn Classifier>,
    pub generator: Arc<dyn TextGenerator>,
    pub store: Arc<dyn VectorStore>,
}

/// Everything a request handler needs, built once at startup.
pub struct Services {
    pub config: Config,
    pub analyzer: RiskAnalyzer,
    pub summarizer: Arc<dyn Summarizer>,
    pub advisor: LegalAdvisor,
    pub news: NewsClient,
    pub scraper: LawScraper,
    pub wills: WillGenerator,
    pub lawyers: LawyerDirectory,
    pub assistant: LegalAssistant,
    pub embedder: Arc<dyn EmbeddingProvider>,
}

impl Services {
    pub fn new(config: Config, providers: Providers) -> Result<Self> {
        let Providers {
            embedder,
            classifier,
            generator,
            store,
        } = providers;

        if embedder.dims() != classifier.input_dims() {
            warn!(
                embedding_dims = embedder.dims(),
                classifier_dims = classifier.input_dims(),
                "embedding and classifier dimensions differ; /predict will fail"
            );
        }

        let options = GenerationOptions::from_config(&config.llm);
        let retriever = Retriever::new(embedder.clone(), store, config.retrieval.max_k);

        Ok(Self {
            analyzer: RiskAnalyzer::new(embedder.clone(), classifier),
            summarizer: Arc::new(LlmSummarizer::new(generator.clone(), options.clone())),
            advisor: LegalAdvisor::new(
                retriever,
                generator.clone(),
                options.clone(),
                config.llm.compare_temperature,
            ),
            news: NewsClient::new(&config.news)?,
            scraper: LawScraper::new(&config.scraper)?,
            wills: WillGenerator::new(generator.clone(), options.clone()),
            lawyers: LawyerDirectory::load(&config.lawyers)?,
            assistant: LegalAssistant::new(generator, options),
            embedder,
            config,
        })
    }

    /// Load the classifier artifact, open the index and build the
    /// configured providers. A missing artifact or index is an error.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let classifier = LinearClassifier::load(&config.classifier.path)?;

        let pool = db::connect_existing(config).await?;
        let store = SqliteVectorStore::new(pool);
        info!(passages = store.count().await?, "opened vector index");

        let providers = Providers {
            embedder: Arc::from(create_provider(&config.embedding)?),
            classifier: Arc::new(classifier),
            generator: Arc::from(create_generator(&config.llm)?),
            store: Arc::new(store),
        };
        Self::new(config.clone(), providers)
    }
}

/// Start the server with providers built from `config`.
///
/// This is the entry point used by `lexassist serve`.
pub async fn run_server(config: &Config) -> Result<()> {
    let services = Services::from_config(config).await?;
    run_server_with_services(&config.server.bind, Arc::new(services)).await
}

/// Start the server on `bind` with prebuilt services.
pub async fn run_server_with_services(bind: &str, services: Arc<Services>) -> Result<()> {
    let app = router(services)?;

    println!("lexassist server listening on http://{}", bind);
    info!(bind, "server starting");

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(services: Arc<Services>) -> Result<Router> {
    let cors = cors_layer(&services.config.server.cors_origins)?;

    Ok(Router::new()
        .route("/health", get(handle_health))
        .route("/predict", post(handle_predict))
        .route("/api/summarize", post(handle_summarize))
        .route("/api/analyze", post(handle_analyze))
        .route("/compare", post(handle_compare))
        .route("/search", post(handle_search))
        .route("/sources", get(handle_sources))
        .route("/advice", post(handle_advice))
        .route("/api/news", get(handle_news))
        .route("/api/search-laws", post(handle_search_laws))
        .route("/api/will", post(handle_will))
        .route("/api/lawyers/search", post(handle_lawyers))
        .route("/api/assistant", post(handle_assistant))
        .route("/api/pdf/{*path}", get(handle_pdf))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(services))
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return Ok(layer.allow_origin(Any));
    }
    let origins = origins
        .iter()
        .map(|o| {
            HeaderValue::from_str(o).with_context(|| format!("Invalid CORS origin: {}", o))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(layer.allow_origin(AllowOrigin::list(origins)))
}

type AppState = State<Arc<Services>>;

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// `Json` whose rejections (wrong content type, malformed or mistyped body)
/// come back as a `400` with the usual error body.
struct JsonBody<T>(T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(bad_request(rejection.body_text())),
        }
    }
}

struct QueryParams<T>(T);

impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    Query<T>: FromRequestParts<S, Rejection = QueryRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(bad_request(rejection.body_text())),
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    let message = message.into();
    error!(error = %message, "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message,
    }
}

fn internal_error(err: anyhow::Error) -> AppError {
    internal(format!("{:#}", err))
}

/// Treat absent, empty and whitespace-only strings alike.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    vector_store: bool,
}

async fn handle_health(State(services): AppState) -> Json<HealthResponse> {
    let vector_store = services
        .advisor
        .retriever()
        .count()
        .await
        .map(|n| n > 0)
        .unwrap_or(false);
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        vector_store,
    })
}

// ============ POST /predict ============

#[derive(Deserialize)]
struct PredictRequest {
    #[serde(default)]
    clause_text: Option<String>,
}

#[derive(Serialize)]
struct PredictResponse {
    risk_level: String,
}

async fn handle_predict(
    State(services): AppState,
    JsonBody(req): JsonBody<PredictRequest>,
) -> Result<Json<PredictResponse>, AppError> {
    let clause = present(req.clause_text).ok_or_else(|| bad_request("No clause_text provided"))?;
    let risk_level = services
        .analyzer
        .predict(&clause)
        .await
        .map_err(internal_error)?;
    Ok(Json(PredictResponse { risk_level }))
}

// ============ POST /api/summarize, /api/analyze ============

#[derive(Deserialize)]
struct TextRequest {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize)]
struct SummaryResponse {
    summary: String,
    original_text: String,
}

async fn summarize_request(services: &Services, req: TextRequest) -> Result<SummaryResponse, AppError> {
    let text = present(req.text).ok_or_else(|| bad_request("No text provided"))?;
    let cleaned = normalize_whitespace(&text);
    let summary = summarize_document(services.summarizer.as_ref(), &cleaned, &services.config.summarizer)
        .await
        .map_err(|_| internal("Failed to generate summary"))?;
    Ok(SummaryResponse {
        summary,
        original_text: cleaned,
    })
}

async fn handle_summarize(
    State(services): AppState,
    JsonBody(req): JsonBody<TextRequest>,
) -> Result<Json<SummaryResponse>, AppError> {
    Ok(Json(summarize_request(&services, req).await?))
}

#[derive(Serialize)]
struct RiskAnalysis {
    overall_risk: Option<String>,
    clause_analysis: Vec<ClauseRisk>,
}

#[derive(Serialize)]
struct AnalyzeResponse {
    #[serde(flatten)]
    summary: SummaryResponse,
    legal_analysis: AdviceOutcome<PassageMetadata>,
    risk_analysis: RiskAnalysis,
}

async fn handle_analyze(
    State(services): AppState,
    JsonBody(req): JsonBody<TextRequest>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let summary = summarize_request(&services, req).await?;
    let legal_analysis = services
        .advisor
        .advise_notice(&summary.summary, services.config.retrieval.advice_k)
        .await;
    let clause_analysis = services
        .analyzer
        .analyze_clauses(&summary.original_text)
        .await
        .map_err(internal_error)?;

    Ok(Json(AnalyzeResponse {
        risk_analysis: RiskAnalysis {
            overall_risk: overall_risk(&clause_analysis),
            clause_analysis,
        },
        legal_analysis,
        summary,
    }))
}

// ============ POST /compare, /search; GET /sources ============

#[derive(Deserialize)]
struct QueryRequest {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    k: Option<usize>,
}

#[derive(Serialize)]
struct CompareResponse {
    result: String,
}

async fn handle_compare(
    State(services): AppState,
    JsonBody(req): JsonBody<QueryRequest>,
) -> Result<Json<CompareResponse>, AppError> {
    let query = present(req.query).ok_or_else(|| bad_request("Missing query parameter"))?;
    let result = services
        .advisor
        .compare(&query)
        .await
        .map_err(internal_error)?;
    Ok(Json(CompareResponse { result }))
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchHit>,
}

#[derive(Serialize)]
struct SearchHit {
    content: String,
    metadata: PassageMetadata,
    similarity: f32,
}

impl From<ScoredPassage> for SearchHit {
    fn from(p: ScoredPassage) -> Self {
        Self {
            content: p.content,
            metadata: p.metadata,
            similarity: p.similarity,
        }
    }
}

async fn handle_search(
    State(services): AppState,
    JsonBody(req): JsonBody<QueryRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    let query = present(req.query).ok_or_else(|| bad_request("Missing query parameter"))?;
    let k = req.k.unwrap_or(services.config.retrieval.default_k);
    let results = services
        .advisor
        .retriever()
        .search(&query, k)
        .await
        .map_err(internal_error)?;
    Ok(Json(SearchResponse {
        results: results.into_iter().map(SearchHit::from).collect(),
    }))
}

#[derive(Serialize)]
struct SourcesResponse {
    sources: Vec<String>,
}

async fn handle_sources(State(services): AppState) -> Result<Json<SourcesResponse>, AppError> {
    let sources = services
        .advisor
        .retriever()
        .sources()
        .await
        .map_err(internal_error)?;
    Ok(Json(SourcesResponse { sources }))
}

// ============ POST /advice ============

#[derive(Deserialize)]
struct AdviceRequest {
    #[serde(default)]
    situation_summary: String,
    #[serde(default = "default_num_cases")]
    num_cases: i64,
}

fn default_num_cases() -> i64 {
    5
}

async fn handle_advice(
    State(services): AppState,
    JsonBody(req): JsonBody<AdviceRequest>,
) -> Result<Json<AdviceOutcome<String>>, AppError> {
    let num_cases = usize::try_from(req.num_cases).unwrap_or(0);
    validate_advice_request(&req.situation_summary, num_cases).map_err(bad_request)?;
    Ok(Json(
        services
            .advisor
            .advise(&req.situation_summary, num_cases)
            .await,
    ))
}

// ============ GET /api/news ============

#[derive(Deserialize)]
struct NewsQuery {
    page: Option<i64>,
    #[serde(rename = "pageSize")]
    page_size: Option<i64>,
    city: Option<String>,
    state: Option<String>,
    country: Option<String>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum NewsResponse {
    Ok { success: bool, data: NewsPage },
    Failed { success: bool, error: NewsError },
}

#[derive(Serialize)]
struct NewsError {
    message: String,
    #[serde(rename = "type")]
    kind: String,
}

async fn handle_news(
    State(services): AppState,
    QueryParams(q): QueryParams<NewsQuery>,
) -> Json<NewsResponse> {
    let (page, page_size) = normalize_paging(q.page.unwrap_or(1), q.page_size.unwrap_or(10));
    let (location, detected_from) =
        services
            .news
            .resolve_location(present(q.city), present(q.state), present(q.country));

    match services
        .news
        .fetch(location, detected_from, page, page_size)
        .await
    {
        Ok(data) => Json(NewsResponse::Ok {
            success: true,
            data,
        }),
        Err(e) => {
            error!(error = %e, "news fetch failed");
            Json(NewsResponse::Failed {
                success: false,
                error: NewsError {
                    message: format!("{:#}", e),
                    kind: "API_ERROR".to_string(),
                },
            })
        }
    }
}

// ============ POST /api/search-laws ============

#[derive(Deserialize)]
struct SearchLawsRequest {
    #[serde(default)]
    query: Option<String>,
    #[serde(default, rename = "maxResults")]
    max_results: Option<serde_json::Value>,
}

async fn handle_search_laws(
    State(services): AppState,
    JsonBody(req): JsonBody<SearchLawsRequest>,
) -> Result<Json<LawSearchResult>, AppError> {
    let query = present(req.query).ok_or_else(|| bad_request("Query is required"))?;
    let max_results = match req.max_results {
        None => 5,
        Some(v) => v
            .as_u64()
            .filter(|n| *n >= 1)
            .ok_or_else(|| bad_request("maxResults must be a positive integer"))?
            as usize,
    };

    match services.scraper.search(&query, max_results).await {
        Ok(result) => Ok(Json(result)),
        Err(ScrapeError::NoResults(message)) => Err(not_found(message)),
        Err(ScrapeError::Failed(e)) => Err(internal_error(e)),
    }
}

// ============ POST /api/will ============

#[derive(Deserialize)]
struct WillRequest {
    #[serde(default)]
    input: Option<String>,
}

async fn handle_will(
    State(services): AppState,
    JsonBody(req): JsonBody<WillRequest>,
) -> Result<Json<GeneratedWill>, AppError> {
    let input = present(req.input).ok_or_else(|| bad_request("No input provided"))?;
    let will = services
        .wills
        .generate(&input)
        .await
        .map_err(internal_error)?;
    Ok(Json(will))
}

// ============ POST /api/lawyers/search ============

#[derive(Serialize)]
struct LawyersResponse {
    total: usize,
    lawyers: Vec<LawyerMatch>,
}

async fn handle_lawyers(
    State(services): AppState,
    JsonBody(filters): JsonBody<LawyerFilters>,
) -> Result<Json<LawyersResponse>, AppError> {
    let lawyers = services
        .lawyers
        .search(&filters, services.embedder.as_ref())
        .await
        .map_err(internal_error)?;
    Ok(Json(LawyersResponse {
        total: lawyers.len(),
        lawyers,
    }))
}

// ============ POST /api/assistant ============

#[derive(Deserialize)]
struct AssistantRequest {
    #[serde(default)]
    input: Option<String>,
    #[serde(default)]
    context: AssistantContext,
}

#[derive(Serialize)]
struct AssistantResponse {
    text: String,
}

async fn handle_assistant(
    State(services): AppState,
    JsonBody(req): JsonBody<AssistantRequest>,
) -> Result<Json<AssistantResponse>, AppError> {
    let input = present(req.input).ok_or_else(|| bad_request("No input provided"))?;
    let text = services
        .assistant
        .reply(&input, &req.context)
        .await
        .map_err(|e| internal(format!("Error processing request: {:#}", e)))?;
    Ok(Json(AssistantResponse { text }))
}

// ============ GET /api/pdf/{*path} ============

async fn handle_pdf(
    State(services): AppState,
    Path(path): Path<String>,
) -> Result<Response, AppError> {
    let file = resolve_within(&services.config.corpus.root, &path)
        .ok_or_else(|| not_found(format!("PDF not found: {}", path)))?;
    let bytes = tokio::fs::read(&file)
        .await
        .map_err(|e| not_found(format!("PDF not found: {}", e)))?;
    Ok(([(header::CONTENT_TYPE, "application/pdf")], bytes).into_response())
}
