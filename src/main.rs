use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{Request, Response, StatusCode};
use axum::routing::{get, post};
use opentelemetry::KeyValue;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::{MakeSpan, OnResponse, TraceLayer},
};
use tracing::Span;

use disaster_response::config::Config;
use disaster_response::db::{PgStore, pool::create_pool};
use disaster_response::llm::{self, LlmClient};
use disaster_response::lookup::{Gdacs, OpenMeteo};
use disaster_response::pipeline::{Collaborators, Orchestrator, PipelineSettings};
use disaster_response::routes;
use disaster_response::service::EmergencyService;
use disaster_response::store::{FsImageStore, RecordStore};
use disaster_response::tasks::{TaskGenerator, TaskService};
use disaster_response::telemetry::{HTTP_REQUEST_DURATION, HTTP_REQUESTS_TOTAL, init_telemetry};
use disaster_response::vision::HttpClassifier;
use disaster_response::AppState;

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Clone)]
struct HttpMakeSpan;

impl<B> MakeSpan<B> for HttpMakeSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let method = request.method().as_str();
        let path = request.uri().path();

        tracing::info_span!(
            "HTTP request",
            otel.name = %format!("{} {}", method, path),
            http.method = %method,
            http.route = %path,
            http.target = %request.uri(),
            http.scheme = "http",
            http.flavor = ?request.version(),
            http.user_agent = request.headers()
                .get("user-agent")
                .and_then(|v| v.to_str().ok())
                .unwrap_or(""),
            http.response.status_code = tracing::field::Empty,
            otel.status_code = tracing::field::Empty,
        )
    }
}

#[derive(Clone)]
struct HttpOnResponse;

impl<B> OnResponse<B> for HttpOnResponse {
    fn on_response(self, response: &Response<B>, latency: Duration, span: &Span) {
        let status = response.status().as_u16();

        span.record("http.response.status_code", status as i64);

        if status >= 500 {
            span.record("otel.status_code", "ERROR");
        } else {
            span.record("otel.status_code", "OK");
        }

        let latency_ms = latency.as_secs_f64() * 1000.0;
        let status_class = format!("{}xx", status / 100);

        HTTP_REQUESTS_TOTAL.add(
            1,
            &[
                KeyValue::new("http.status_code", status.to_string()),
                KeyValue::new("http.status_class", status_class.clone()),
            ],
        );

        HTTP_REQUEST_DURATION.record(
            latency_ms,
            &[
                KeyValue::new("http.status_code", status.to_string()),
                KeyValue::new("http.status_class", status_class),
            ],
        );

        tracing::info!(
            http.response.status_code = status,
            latency_ms = latency_ms,
            "finished processing request"
        );
    }
}

fn build_provider(name: &str, config: &Config) -> anyhow::Result<Option<Arc<dyn llm::Provider>>> {
    let timeout = Duration::from_secs(config.llm_timeout_secs);
    let provider: Arc<dyn llm::Provider> = match name {
        "anthropic" => Arc::new(llm::anthropic::AnthropicProvider::new(
            config.anthropic_api_key.as_deref().unwrap_or(""),
            timeout,
        )?),
        "openai" => Arc::new(llm::openai::OpenAIProvider::new(
            config.openai_api_key.as_deref().unwrap_or(""),
            timeout,
        )?),
        "google" => Arc::new(llm::openai::OpenAIProvider::new_google(
            config.google_api_key.as_deref().unwrap_or(""),
            timeout,
        )?),
        "ollama" => Arc::new(llm::openai::OpenAIProvider::new_ollama(
            &config.ollama_base_url,
            timeout,
        )?),
        _ => return Ok(None),
    };
    Ok(Some(provider))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    let telemetry_guard = init_telemetry(&config)?;

    tracing::info!(
        port = config.port,
        environment = %config.environment,
        "Starting disaster-response"
    );

    let pool = create_pool(&config.database_url).await?;
    let records: Arc<dyn RecordStore> = Arc::new(PgStore::new(pool));

    let primary = build_provider(&config.llm_provider, &config)?
        .ok_or_else(|| anyhow::anyhow!("unknown LLM provider {}", config.llm_provider))?;
    let mut llm_client = LlmClient::new(primary);
    if let Some(fallback) = build_provider(&config.fallback_provider, &config)? {
        llm_client = llm_client.with_fallback(fallback, &config.fallback_model);
    }
    let llm_client = Arc::new(llm_client);

    tracing::info!(
        primary_provider = %config.llm_provider,
        fallback_provider = %config.fallback_provider,
        "LLM client initialized"
    );

    let lookup_timeout = Duration::from_secs(config.lookup_timeout_secs);
    let collaborators = Collaborators {
        classifier: Arc::new(HttpClassifier::new(
            &config.classifier_url,
            Duration::from_secs(config.classifier_timeout_secs),
        )?),
        weather: Arc::new(OpenMeteo::new(&config.weather_api_url, lookup_timeout)?),
        disaster_feed: Arc::new(Gdacs::new(
            &config.disaster_feed_url,
            config.disaster_feed_radius_km,
            lookup_timeout,
        )?),
        llm: Arc::clone(&llm_client),
    };
    let orchestrator = Arc::new(Orchestrator::new(
        collaborators,
        PipelineSettings {
            model: config.llm_model.clone(),
            max_workers: config.pipeline_max_workers,
        },
    ));

    let images = Arc::new(FsImageStore::new(
        &config.image_store_dir,
        &config.image_public_base_url,
    ));

    let state = AppState {
        config: config.clone(),
        emergency: EmergencyService::new(orchestrator, Arc::clone(&records), images),
        tasks: TaskService::new(
            Arc::clone(&records),
            TaskGenerator::new(llm_client, &config.llm_model),
        ),
        records,
    };

    let app = Router::new()
        .route("/api/health", get(routes::health::health))
        .route("/api/disasters", post(routes::disasters::submit_report))
        .route("/api/disasters/nearby", get(routes::disasters::nearby_disasters))
        .route("/api/disasters/{id}", get(routes::disasters::get_disaster))
        .route("/api/disasters/{id}/ledger", get(routes::disasters::get_ledger))
        .route("/api/disasters/{id}/tasks", post(routes::tasks::generate_task))
        .route(
            "/api/disasters/{id}/requests",
            post(routes::tasks::submit_help_request),
        )
        .nest_service("/images", ServeDir::new(&config.image_store_dir))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(HttpMakeSpan)
                .on_response(HttpOnResponse),
        )
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(300),
        ))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    telemetry_guard.shutdown();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
