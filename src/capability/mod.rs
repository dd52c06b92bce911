//! Contracts for the external generation services the engine delegates to.
//!
//! The engine never generates content itself. Each node executor builds one
//! of the request types below and awaits a [`GenerationCapability`]; every
//! such call is a suspension point of the run. Transport is up to the
//! implementor (see the `http` feature for ready-made clients).

pub mod error;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use error::CapabilityError;

/// Which medium a rewritten prompt is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaTypeHint {
    #[default]
    Image,
    Video,
}

impl MediaTypeHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaTypeHint::Image => "image",
            MediaTypeHint::Video => "video",
        }
    }
}

/// `GenerateImage(prompt, referenceImages[], modelId, style, aspectRatio, resolution)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRequest {
    pub prompt: String,
    pub reference_images: Vec<String>,
    pub model_id: String,
    pub style: Option<String>,
    pub aspect_ratio: Option<String>,
    pub resolution: Option<String>,
}

/// `GenerateVideo(prompt, referenceImages[], modelId, aspectRatio, resolution, durationSeconds)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRequest {
    pub prompt: String,
    pub reference_images: Vec<String>,
    pub model_id: String,
    pub aspect_ratio: Option<String>,
    pub resolution: Option<String>,
    pub duration_seconds: u32,
}

/// `RewritePrompt(subject, secondaryText, referenceImages[], agentInstruction,
/// modelId, aspectRatio, resolution, mediaTypeHint)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteRequest {
    pub subject: String,
    pub secondary_text: String,
    pub reference_images: Vec<String>,
    pub agent_instruction: String,
    pub model_id: String,
    pub aspect_ratio: Option<String>,
    pub resolution: Option<String>,
    pub media_type: MediaTypeHint,
}

/// `{url}` answer of the image and video operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaResponse {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl MediaResponse {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            error: None,
        }
    }

    /// The generated url, or why there is none.
    pub fn into_url(self, operation: &'static str) -> Result<String, CapabilityError> {
        match (self.url, self.error) {
            (Some(url), _) if !url.trim().is_empty() => Ok(url),
            (_, Some(error)) => Err(CapabilityError::BackendError(error)),
            _ => Err(CapabilityError::EmptyPayload(operation)),
        }
    }
}

/// `{prompt}` answer of the rewrite operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptResponse {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PromptResponse {
    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            error: None,
        }
    }

    pub fn into_prompt(self) -> Result<String, CapabilityError> {
        match (self.prompt, self.error) {
            (Some(prompt), _) if !prompt.trim().is_empty() => Ok(prompt),
            (_, Some(error)) => Err(CapabilityError::BackendError(error)),
            _ => Err(CapabilityError::EmptyPayload("RewritePrompt")),
        }
    }
}

/// The external generation services, as seen by the engine.
#[async_trait]
pub trait GenerationCapability: Send + Sync {
    async fn generate_image(&self, request: ImageRequest) -> Result<MediaResponse, CapabilityError>;

    async fn generate_video(&self, request: VideoRequest) -> Result<MediaResponse, CapabilityError>;

    async fn rewrite_prompt(&self, request: RewriteRequest)
    -> Result<PromptResponse, CapabilityError>;
}

#[async_trait]
impl<T: GenerationCapability + ?Sized> GenerationCapability for std::sync::Arc<T> {
    async fn generate_image(&self, request: ImageRequest) -> Result<MediaResponse, CapabilityError> {
        (**self).generate_image(request).await
    }

    async fn generate_video(&self, request: VideoRequest) -> Result<MediaResponse, CapabilityError> {
        (**self).generate_video(request).await
    }

    async fn rewrite_prompt(
        &self,
        request: RewriteRequest,
    ) -> Result<PromptResponse, CapabilityError> {
        (**self).rewrite_prompt(request).await
    }
}
