//! Client for the generation backend's JSON API.
//!
//! | Operation       | Route                         | Answer              |
//! |-----------------|-------------------------------|---------------------|
//! | GenerateImage   | `POST /api/generate`          | `{url}` / `{error}` |
//! | GenerateVideo   | `POST /api/generate/video`    | `{url}` / `{error}` |
//! | RewritePrompt   | `POST /api/prompt/midjourney` | `{prompt}` / `{error}` |

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::capability::{
    CapabilityError, ImageRequest, MediaResponse, MediaTypeHint, PromptResponse, RewriteRequest,
    VideoRequest,
};
use crate::client::{Client, HasProvider};

/// Marker type for the backend provider
pub struct Backend;

/// Configuration for the backend client
#[derive(Clone, Debug)]
pub struct BackendConfig {
    /// Base URL (default: http://localhost:8000)
    pub base_url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
        }
    }
}

impl BackendConfig {
    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// The backend reports rewrite failures inside a successful answer.
const REWRITE_ERROR_PREFIX: &str = "Error generating prompt:";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationSettings<'a> {
    model_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    style: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aspect_ratio: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolution: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_seconds: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody<'a> {
    prompt: &'a str,
    config: GenerationSettings<'a>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    reference_images: &'a [String],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RewriteBody<'a> {
    subject: &'a str,
    presets: Vec<&'a str>,
    reference_images: &'a [String],
    config: GenerationSettings<'a>,
    #[serde(rename = "media_type")]
    media_type: MediaTypeHint,
    #[serde(skip_serializing_if = "str::is_empty")]
    agent_instruction: &'a str,
}

fn image_body(request: &ImageRequest) -> GenerateBody<'_> {
    GenerateBody {
        prompt: &request.prompt,
        config: GenerationSettings {
            model_id: &request.model_id,
            style: request.style.as_deref(),
            aspect_ratio: request.aspect_ratio.as_deref(),
            resolution: request.resolution.as_deref(),
            duration_seconds: None,
        },
        reference_images: &request.reference_images,
    }
}

fn video_body(request: &VideoRequest) -> GenerateBody<'_> {
    GenerateBody {
        prompt: &request.prompt,
        config: GenerationSettings {
            model_id: &request.model_id,
            style: None,
            aspect_ratio: request.aspect_ratio.as_deref(),
            resolution: request.resolution.as_deref(),
            duration_seconds: Some(request.duration_seconds),
        },
        reference_images: &request.reference_images,
    }
}

fn rewrite_body(request: &RewriteRequest) -> RewriteBody<'_> {
    RewriteBody {
        subject: &request.subject,
        presets: request
            .secondary_text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect(),
        reference_images: &request.reference_images,
        config: GenerationSettings {
            model_id: &request.model_id,
            style: None,
            aspect_ratio: request.aspect_ratio.as_deref(),
            resolution: request.resolution.as_deref(),
            duration_seconds: None,
        },
        media_type: request.media_type,
        agent_instruction: &request.agent_instruction,
    }
}

async fn post<B: Serialize, R: DeserializeOwned>(
    http: &reqwest::Client,
    config: &BackendConfig,
    path: &str,
    body: &B,
) -> Result<R, CapabilityError> {
    let url = config.endpoint(path);
    log::debug!("POST {}", url);

    let response = http
        .post(&url)
        .header("Content-Type", "application/json")
        .json(body)
        .send()
        .await?;

    let status = response.status();
    let text = response.text().await?;
    // Error answers still carry `{error}`, which the response types understand.
    match serde_json::from_str::<R>(&text) {
        Ok(parsed) => Ok(parsed),
        Err(_) if !status.is_success() => Err(CapabilityError::BackendError(format!(
            "HTTP {}: {}",
            status, text
        ))),
        Err(err) => Err(err.into()),
    }
}

pub(crate) async fn generate_image(
    http: &reqwest::Client,
    config: &BackendConfig,
    request: &ImageRequest,
) -> Result<MediaResponse, CapabilityError> {
    post(http, config, "/api/generate", &image_body(request)).await
}

pub(crate) async fn generate_video(
    http: &reqwest::Client,
    config: &BackendConfig,
    request: &VideoRequest,
) -> Result<MediaResponse, CapabilityError> {
    post(http, config, "/api/generate/video", &video_body(request)).await
}

pub(crate) async fn rewrite_prompt(
    http: &reqwest::Client,
    config: &BackendConfig,
    request: &RewriteRequest,
) -> Result<PromptResponse, CapabilityError> {
    let response: PromptResponse =
        post(http, config, "/api/prompt/midjourney", &rewrite_body(request)).await?;
    reject_inline_error(response)
}

fn reject_inline_error(response: PromptResponse) -> Result<PromptResponse, CapabilityError> {
    match response.prompt.as_deref().map(str::trim) {
        Some(prompt) if prompt.starts_with(REWRITE_ERROR_PREFIX) => Err(
            CapabilityError::BackendError(prompt[REWRITE_ERROR_PREFIX.len()..].trim().to_string()),
        ),
        _ => Ok(response),
    }
}

impl<S> Client<S>
where
    S: HasProvider<Backend> + Send + Sync,
{
    /// `POST /api/generate`
    pub async fn backend_generate_image(
        &self,
        request: &ImageRequest,
    ) -> Result<MediaResponse, CapabilityError> {
        let config = self.backend_config.as_ref().ok_or_else(|| {
            CapabilityError::ProviderNotConfigured("Backend not configured".to_string())
        })?;
        generate_image(&self.client, config, request).await
    }

    /// `POST /api/generate/video`
    pub async fn backend_generate_video(
        &self,
        request: &VideoRequest,
    ) -> Result<MediaResponse, CapabilityError> {
        let config = self.backend_config.as_ref().ok_or_else(|| {
            CapabilityError::ProviderNotConfigured("Backend not configured".to_string())
        })?;
        generate_video(&self.client, config, request).await
    }

    /// `POST /api/prompt/midjourney`
    pub async fn backend_rewrite_prompt(
        &self,
        request: &RewriteRequest,
    ) -> Result<PromptResponse, CapabilityError> {
        let config = self.backend_config.as_ref().ok_or_else(|| {
            CapabilityError::ProviderNotConfigured("Backend not configured".to_string())
        })?;
        rewrite_prompt(&self.client, config, request).await
    }
}
