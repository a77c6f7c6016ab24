use std::time::Duration;

use super::{GeoLookup, LookupError, get_json};

pub struct OpenMeteo {
    client: reqwest::Client,
    url: String,
}

impl OpenMeteo {
    pub fn new(url: &str, timeout: Duration) -> reqwest::Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            url: url.to_string(),
        })
    }

    fn query(latitude: f64, longitude: f64) -> Vec<(&'static str, String)> {
        vec![
            ("latitude", latitude.to_string()),
            ("longitude", longitude.to_string()),
            ("current_weather", "true".to_string()),
            (
                "hourly",
                "temperature_2m,precipitation,wind_speed_10m".to_string(),
            ),
            (
                "daily",
                "temperature_2m_max,temperature_2m_min,precipitation_sum".to_string(),
            ),
            ("forecast_days", "7".to_string()),
        ]
    }
}

#[async_trait::async_trait]
impl GeoLookup for OpenMeteo {
    fn name(&self) -> &str {
        "open-meteo"
    }

    #[tracing::instrument(name = "lookup.weather", skip(self))]
    async fn fetch(&self, latitude: f64, longitude: f64) -> Result<serde_json::Value, LookupError> {
        get_json(&self.client, &self.url, &Self::query(latitude, longitude)).await
    }
}
