use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub environment: String,
    pub database_url: String,
    pub llm_provider: String,
    pub llm_model: String,
    pub fallback_provider: String,
    pub fallback_model: String,
    pub ollama_base_url: String,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub llm_timeout_secs: u64,
    pub classifier_url: String,
    pub classifier_timeout_secs: u64,
    pub weather_api_url: String,
    pub disaster_feed_url: String,
    pub disaster_feed_radius_km: u32,
    pub lookup_timeout_secs: u64,
    pub pipeline_max_workers: usize,
    pub image_store_dir: String,
    pub image_public_base_url: String,
    pub otel_service_name: String,
    pub otel_exporter_endpoint: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let port: u16 = env::var("APP_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .expect("APP_PORT must be a number");

        Self {
            port,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            llm_provider: env::var("LLM_PROVIDER").unwrap_or_else(|_| "google".to_string()),
            llm_model: env::var("LLM_MODEL").unwrap_or_else(|_| "gemini-2.0-flash".to_string()),
            fallback_provider: env::var("FALLBACK_PROVIDER").unwrap_or_else(|_| "none".to_string()),
            fallback_model: env::var("FALLBACK_MODEL")
                .unwrap_or_else(|_| "claude-haiku-4-5-20251001".to_string()),
            ollama_base_url: env::var("OLLAMA_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").ok(),
            google_api_key: env::var("GOOGLE_API_KEY").ok(),
            llm_timeout_secs: env::var("LLM_TIMEOUT_SECS")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .expect("LLM_TIMEOUT_SECS must be a number"),
            classifier_url: env::var("CLASSIFIER_URL")
                .unwrap_or_else(|_| "http://localhost:8500/classify".to_string()),
            classifier_timeout_secs: env::var("CLASSIFIER_TIMEOUT_SECS")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .expect("CLASSIFIER_TIMEOUT_SECS must be a number"),
            weather_api_url: env::var("WEATHER_API_URL")
                .unwrap_or_else(|_| "https://api.open-meteo.com/v1/forecast".to_string()),
            disaster_feed_url: env::var("DISASTER_FEED_URL").unwrap_or_else(|_| {
                "https://www.gdacs.org/gdacsapi/api/events/search".to_string()
            }),
            disaster_feed_radius_km: env::var("DISASTER_FEED_RADIUS_KM")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .expect("DISASTER_FEED_RADIUS_KM must be a number"),
            lookup_timeout_secs: env::var("LOOKUP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .expect("LOOKUP_TIMEOUT_SECS must be a number"),
            pipeline_max_workers: env::var("PIPELINE_MAX_WORKERS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .expect("PIPELINE_MAX_WORKERS must be a number"),
            image_store_dir: env::var("IMAGE_STORE_DIR")
                .unwrap_or_else(|_| "./data/images".to_string()),
            image_public_base_url: env::var("IMAGE_PUBLIC_BASE_URL")
                .unwrap_or_else(|_| format!("http://localhost:{port}/images")),
            otel_service_name: env::var("OTEL_SERVICE_NAME")
                .unwrap_or_else(|_| "disaster-response".to_string()),
            otel_exporter_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4317".to_string()),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
