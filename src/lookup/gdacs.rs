use std::time::Duration;

use super::{GeoLookup, LookupError, get_json};

/// GDACS event search around a point.
pub struct Gdacs {
    client: reqwest::Client,
    url: String,
    radius_km: u32,
}

impl Gdacs {
    pub fn new(url: &str, radius_km: u32, timeout: Duration) -> reqwest::Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            url: url.to_string(),
            radius_km,
        })
    }
}

#[async_trait::async_trait]
impl GeoLookup for Gdacs {
    fn name(&self) -> &str {
        "gdacs"
    }

    #[tracing::instrument(name = "lookup.disaster_history", skip(self), fields(radius_km = self.radius_km))]
    async fn fetch(&self, latitude: f64, longitude: f64) -> Result<serde_json::Value, LookupError> {
        let query = [
            ("lat", latitude.to_string()),
            ("lon", longitude.to_string()),
            ("radius", self.radius_km.to_string()),
        ];
        get_json(&self.client, &self.url, &query).await
    }
}
