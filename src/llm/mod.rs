pub mod anthropic;
pub mod client;
pub mod openai;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

pub use client::LlmClient;

use crate::vision::ImageFormat;

/// Inline image sent alongside a prompt, already base64-encoded.
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub media_type: String,
    pub data: String,
}

impl ImageAttachment {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let media_type = ImageFormat::sniff(bytes)
            .unwrap_or(ImageFormat::Jpeg)
            .media_type()
            .to_string();
        Self {
            media_type,
            data: STANDARD.encode(bytes),
        }
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub image: Option<ImageAttachment>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stage: String,
}

#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub content: String,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub finish_reason: String,
    pub provider: String,
}

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("{0}")]
    Provider(String),

    #[error("empty response from model")]
    EmptyResponse,
}

#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    async fn generate(&self, req: &GenerateRequest) -> anyhow::Result<GenerateResponse>;
    fn name(&self) -> &str;
}
