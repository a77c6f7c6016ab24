use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;

use super::{Classification, ClassificationError, Classifier, validate_image};

/// Posts raw image bytes to the inference service and reads back
/// `{"label": "...", "confidence": 0.93, "people": 2}`.
pub struct HttpClassifier {
    client: reqwest::Client,
    url: String,
}

impl HttpClassifier {
    pub fn new(url: &str, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[derive(Deserialize)]
struct ClassifierResponse {
    label: String,
    confidence: f64,
    #[serde(default)]
    people: u32,
}

#[async_trait::async_trait]
impl Classifier for HttpClassifier {
    #[tracing::instrument(name = "vision.classify", skip_all, fields(image.bytes = image.len()))]
    async fn classify(&self, image: &[u8]) -> Result<Classification, ClassificationError> {
        let format = validate_image(image)?;

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, format.media_type())
            .body(image.to_vec())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClassificationError::Timeout
                } else {
                    ClassificationError::Service(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassificationError::Service(format!("{status}: {body}")));
        }

        let parsed: ClassifierResponse = response
            .json()
            .await
            .map_err(|e| ClassificationError::Decode(e.to_string()))?;

        if !(0.0..=1.0).contains(&parsed.confidence) {
            return Err(ClassificationError::Decode(format!(
                "confidence {} outside 0..=1",
                parsed.confidence
            )));
        }

        Ok(Classification {
            label: parsed.label,
            confidence: parsed.confidence,
            people_count: parsed.people,
        })
    }
}
