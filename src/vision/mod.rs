//! Scene classification collaborator.
//!
//! The model itself runs as a separate inference service; this module owns the
//! contract (format sniffing, the summary sentence) and the HTTP client for it.

pub mod http;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::HttpClassifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
    Gif,
    Bmp,
}

impl ImageFormat {
    /// Detects the format from magic bytes; `None` when unrecognised.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [0xFF, 0xD8, 0xFF, ..] => Some(Self::Jpeg),
            [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some(Self::Png),
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some(Self::Webp),
            [b'G', b'I', b'F', b'8', ..] => Some(Self::Gif),
            [b'B', b'M', ..] => Some(Self::Bmp),
            _ => None,
        }
    }

    pub fn media_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: String,
    /// Softmax probability of `label`, 0.0..=1.0.
    pub confidence: f64,
    pub people_count: u32,
}

impl Classification {
    pub fn summary(&self) -> String {
        let noun = if self.people_count == 1 {
            "person"
        } else {
            "people"
        };
        format!(
            "The image likely shows a {} scene with {} {} detected. (Confidence: {:.1}%)",
            self.label.to_uppercase(),
            self.people_count,
            noun,
            self.confidence * 100.0
        )
    }
}

#[derive(Error, Debug, Clone)]
pub enum ClassificationError {
    #[error("image is empty")]
    EmptyImage,

    #[error("unsupported image format")]
    UnsupportedFormat,

    #[error("timeout")]
    Timeout,

    #[error("classifier service error: {0}")]
    Service(String),

    #[error("malformed classifier response: {0}")]
    Decode(String),
}

#[async_trait::async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, image: &[u8]) -> Result<Classification, ClassificationError>;
}

/// Rejects inputs the model cannot process before any remote call is made.
pub fn validate_image(image: &[u8]) -> Result<ImageFormat, ClassificationError> {
    if image.is_empty() {
        return Err(ClassificationError::EmptyImage);
    }
    ImageFormat::sniff(image).ok_or(ClassificationError::UnsupportedFormat)
}
