pub mod gdacs;
pub mod open_meteo;

use thiserror::Error;

pub use gdacs::Gdacs;
pub use open_meteo::OpenMeteo;

#[derive(Error, Debug, Clone)]
pub enum LookupError {
    #[error("timeout")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for LookupError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LookupError::Timeout
        } else if e.is_decode() {
            LookupError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            LookupError::Status(status.as_u16())
        } else {
            LookupError::Network(e.to_string())
        }
    }
}

/// One outbound call keyed by coordinates, returning the remote JSON as-is.
#[async_trait::async_trait]
pub trait GeoLookup: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch(&self, latitude: f64, longitude: f64) -> Result<serde_json::Value, LookupError>;
}

pub(crate) async fn get_json(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<serde_json::Value, LookupError> {
    let response = client.get(url).query(query).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(LookupError::Status(status.as_u16()));
    }

    Ok(response.json::<serde_json::Value>().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_renders_as_bare_word() {
        assert_eq!(LookupError::Timeout.to_string(), "timeout");
        assert_eq!(LookupError::Status(502).to_string(), "unexpected status 502");
    }
}
