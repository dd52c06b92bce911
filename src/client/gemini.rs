//! Google Gemini client
//!
//! Talks to `generateContent` directly: image generation with inline
//! reference images, and prompt rewriting with a model fallback chain.
//! Gemini has no video operation here.

use serde::{Deserialize, Serialize};

use crate::capability::{
    CapabilityError, ImageRequest, MediaResponse, MediaTypeHint, PromptResponse, RewriteRequest,
};
use crate::client::{Client, HasProvider};

/// Marker type for Gemini provider
pub struct Gemini;

/// Prompt models tried after the configured one, in order.
pub const PROMPT_MODEL_FALLBACKS: [&str; 3] = ["gemini-2.0-flash", "gemini-2.5-flash", "gemini-1.5-flash"];

const IMAGE_SYSTEM_INSTRUCTION: &str = "You are an expert Midjourney portrait prompt engineer. \
Turn the user's concept, keywords and reference images into one photorealistic Midjourney prompt.\n\
Structure: /imagine prompt: [Subject and physical traits] + [Pose and action] + [Clothing and style] \
+ [Environment] + [Lighting and atmosphere] + [Camera angle and quality]\n\
Rules: write in English as a single dense paragraph of comma-separated keywords; \
output raw text only, starting with \"/imagine prompt: \"; never add --v or --ar parameters; \
carry the key visual elements of the reference images into the description; \
the user concept decides the subject, the keywords only season it.";

const VIDEO_SYSTEM_INSTRUCTION: &str = "You are an expert AI video prompt engineer. \
Turn the user's concept, keywords and reference images into one cinematic video generation prompt.\n\
Structure: [Camera movement] + [Subject and action] + [Environment and lighting] + [Cinematic look and film stock]\n\
Rules: write in English as a single dense paragraph; output raw text only, no markdown; \
emphasise motion, camera angles and dynamic lighting; \
carry the key visual elements of the reference images into the description; \
the user concept decides the subject, the keywords only season it.";

/// Configuration for Gemini client
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    pub api_key: String,
    /// Base URL (default: https://generativelanguage.googleapis.com)
    pub base_url: String,
    /// Used when a request names no usable image model.
    pub image_model: String,
    /// First model tried for prompt rewriting.
    pub prompt_model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            image_model: "gemini-3-pro-image-preview".to_string(),
            prompt_model: "gemini-2.0-flash".to_string(),
        }
    }
}

impl GeminiConfig {
    /// Reads `GEMINI_API_KEY` (required), `IMAGE_MODEL_ID` and `PROMPT_MODEL_ID`.
    pub fn from_env() -> Result<Self, CapabilityError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| CapabilityError::ProviderNotConfigured("GEMINI_API_KEY is not set".to_string()))?;

        let mut config = Self {
            api_key,
            ..Default::default()
        };
        if let Ok(model) = std::env::var("IMAGE_MODEL_ID") {
            config.image_model = model;
        }
        if let Ok(model) = std::env::var("PROMPT_MODEL_ID") {
            config.prompt_model = model;
        }
        Ok(config)
    }
}

/// Request structure for Gemini generate content
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

/// A part of content: text or inline binary data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<GeminiInlineData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiInlineData {
    pub mime_type: String,
    /// Base64 payload.
    pub data: String,
}

impl GeminiPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    /// Builds an inline part from a `data:<mime>;base64,<payload>` URI.
    ///
    /// Anything else (plain URLs, malformed URIs) yields `None`.
    pub fn from_data_uri(uri: &str) -> Option<Self> {
        let rest = uri.trim().strip_prefix("data:")?;
        let (header, payload) = rest.split_once(',')?;
        let mime_type = header.strip_suffix(";base64")?;
        if mime_type.is_empty() || payload.is_empty() {
            return None;
        }
        Some(Self {
            text: None,
            inline_data: Some(GeminiInlineData {
                mime_type: mime_type.to_string(),
                data: payload.to_string(),
            }),
        })
    }
}

impl GeminiContent {
    pub fn user(parts: Vec<GeminiPart>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![GeminiPart::text(text)],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Response from Gemini generate content
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    #[serde(default)]
    pub content: Option<GeminiContent>,
    pub finish_reason: Option<String>,
}

impl GeminiResponse {
    fn parts(&self) -> impl Iterator<Item = &GeminiPart> {
        self.candidates
            .iter()
            .filter_map(|candidate| candidate.content.as_ref())
            .flat_map(|content| content.parts.iter())
    }

    /// The first inline image, re-encoded as a data URI.
    pub fn first_image(&self) -> Option<String> {
        self.parts()
            .filter_map(|part| part.inline_data.as_ref())
            .map(|inline| format!("data:{};base64,{}", inline.mime_type, inline.data))
            .next()
    }

    /// All text parts, concatenated.
    pub fn text(&self) -> Option<String> {
        let text: String = self.parts().filter_map(|part| part.text.as_deref()).collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

/// Appends aspect ratio and resolution hints to an image prompt.
pub fn image_prompt(prompt: &str, aspect_ratio: Option<&str>, resolution: Option<&str>) -> String {
    let mut suffixes = Vec::new();
    if let Some(aspect) = aspect_ratio.filter(|a| !a.trim().is_empty()) {
        suffixes.push(format!("--aspect {}", aspect));
    }
    match resolution {
        Some("2K") => suffixes.push("2k resolution, high quality".to_string()),
        Some("4K") => suffixes.push("4k resolution, ultra high definition, extremely detailed".to_string()),
        _ => {}
    }

    if suffixes.is_empty() {
        prompt.to_string()
    } else {
        format!("{} {}", prompt, suffixes.join(", "))
    }
}

/// The image model to call for a request.
fn image_model<'a>(requested: &'a str, config: &'a GeminiConfig) -> &'a str {
    // imagen models are not reachable with a Gemini key
    if requested.trim().is_empty() || requested.contains("imagen-3.0") {
        &config.image_model
    } else {
        requested
    }
}

/// Prompt models to try, in order, without duplicates.
pub fn prompt_models(requested: &str, config: &GeminiConfig) -> Vec<String> {
    let mut models: Vec<String> = Vec::new();
    let candidates = [requested, config.prompt_model.as_str()]
        .into_iter()
        .chain(PROMPT_MODEL_FALLBACKS);
    for model in candidates {
        let model = model.trim();
        if !model.is_empty() && !models.iter().any(|m| m == model) {
            models.push(model.to_string());
        }
    }
    models
}

fn rewrite_message(request: &RewriteRequest) -> String {
    let subject = if request.subject.trim().is_empty() {
        "Synthesize a creative scene based on the attached images."
    } else {
        request.subject.trim()
    };
    let presets = request
        .secondary_text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    let mut message = format!(
        "User Concept: {}\nPresets (Styles/Keywords): {}\nTarget Resolution: {}",
        subject,
        presets,
        request.resolution.as_deref().unwrap_or("")
    );
    if !request.agent_instruction.trim().is_empty() {
        message.push_str(&format!("\nAdditional Instruction: {}", request.agent_instruction.trim()));
    }
    message
}

/// Removes `--v <number>` flags.
pub fn strip_version_flag(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("--v") {
        let after = &rest[start + 3..];
        let spaced = after.trim_start();
        let number_len = spaced
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(spaced.len());
        let is_flag = spaced.len() < after.len() && number_len > 0;

        if is_flag {
            out.push_str(&rest[..start]);
            rest = &spaced[number_len..];
        } else {
            out.push_str(&rest[..start + 3]);
            rest = after;
        }
    }
    out.push_str(rest);
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Flattens the answer to one line; image prompts get `--ar` and lose `--v`.
pub fn post_process(text: &str, media_type: MediaTypeHint, aspect_ratio: Option<&str>) -> String {
    let mut prompt = text.replace('\n', " ").trim().to_string();
    if media_type == MediaTypeHint::Image {
        if let Some(aspect) = aspect_ratio.filter(|a| !a.trim().is_empty()) {
            if !prompt.contains("--ar") {
                prompt.push_str(&format!(" --ar {}", aspect));
            }
        }
        prompt = strip_version_flag(&prompt);
    }
    prompt
}

fn reference_parts(reference_images: &[String]) -> Vec<GeminiPart> {
    reference_images
        .iter()
        .filter_map(|image| {
            let part = GeminiPart::from_data_uri(image);
            if part.is_none() {
                log::debug!("Skipping reference image that is not a base64 data URI");
            }
            part
        })
        .collect()
}

pub(crate) async fn call(
    http: &reqwest::Client,
    config: &GeminiConfig,
    model: &str,
    request: &GeminiRequest,
) -> Result<GeminiResponse, CapabilityError> {
    let url = format!(
        "{}/v1beta/models/{}:generateContent?key={}",
        config.base_url.trim_end_matches('/'),
        model,
        config.api_key
    );

    let response = http
        .post(&url)
        .header("Content-Type", "application/json")
        .json(request)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(CapabilityError::GeminiError(describe_failure(status.as_u16(), &error_text)));
    }

    Ok(response.json().await?)
}

fn describe_failure(status: u16, body: &str) -> String {
    if status == 503 || body.to_lowercase().contains("overloaded") {
        "Gemini is overloaded; try again in about a minute".to_string()
    } else if status == 500 {
        format!(
            "HTTP 500: internal error, possibly a prompt or reference images too large: {}",
            body
        )
    } else {
        format!("HTTP {}: {}", status, body)
    }
}

pub(crate) async fn generate_image(
    http: &reqwest::Client,
    config: &GeminiConfig,
    request: &ImageRequest,
) -> Result<MediaResponse, CapabilityError> {
    let model = image_model(&request.model_id, config);
    let mut parts = reference_parts(&request.reference_images);
    parts.push(GeminiPart::text(image_prompt(
        &request.prompt,
        request.aspect_ratio.as_deref(),
        request.resolution.as_deref(),
    )));
    log::debug!(
        "Gemini image request to {} with {} reference image(s)",
        model,
        parts.len() - 1
    );

    let body = GeminiRequest {
        contents: vec![GeminiContent::user(parts)],
        system_instruction: None,
        generation_config: None,
    };
    let response = call(http, config, model, &body).await?;

    response
        .first_image()
        .map(MediaResponse::url)
        .ok_or_else(|| CapabilityError::InvalidResponse("No image found in response".to_string()))
}

pub(crate) async fn rewrite_prompt(
    http: &reqwest::Client,
    config: &GeminiConfig,
    request: &RewriteRequest,
) -> Result<PromptResponse, CapabilityError> {
    let mut parts = reference_parts(&request.reference_images);
    parts.push(GeminiPart::text(rewrite_message(request)));

    let system = match request.media_type {
        MediaTypeHint::Video => VIDEO_SYSTEM_INSTRUCTION,
        MediaTypeHint::Image => IMAGE_SYSTEM_INSTRUCTION,
    };
    let body = GeminiRequest {
        contents: vec![GeminiContent::user(parts)],
        system_instruction: Some(GeminiContent::system(system)),
        generation_config: Some(GeminiGenerationConfig {
            temperature: Some(0.7),
        }),
    };

    let mut last_error = None;
    for model in prompt_models(&request.model_id, config) {
        match call(http, config, &model, &body).await {
            Ok(response) => match response.text() {
                Some(text) => {
                    return Ok(PromptResponse::prompt(post_process(
                        &text,
                        request.media_type,
                        request.aspect_ratio.as_deref(),
                    )));
                }
                None => log::warn!("Prompt model {} returned no text", model),
            },
            Err(err) => {
                log::warn!("Prompt model {} failed: {}", model, err);
                last_error = Some(err);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        CapabilityError::InvalidResponse("No prompt model returned text".to_string())
    }))
}

impl<S> Client<S>
where
    S: HasProvider<Gemini> + Send + Sync,
{
    fn require_gemini(&self) -> Result<&GeminiConfig, CapabilityError> {
        self.gemini_config.as_ref().ok_or_else(|| {
            CapabilityError::ProviderNotConfigured("Gemini not configured".to_string())
        })
    }

    /// Call Gemini's generate content API
    pub async fn call_gemini(
        &self,
        model: &str,
        request: &GeminiRequest,
    ) -> Result<GeminiResponse, CapabilityError> {
        call(&self.client, self.require_gemini()?, model, request).await
    }

    pub async fn gemini_generate_image(
        &self,
        request: &ImageRequest,
    ) -> Result<MediaResponse, CapabilityError> {
        generate_image(&self.client, self.require_gemini()?, request).await
    }

    pub async fn gemini_rewrite_prompt(
        &self,
        request: &RewriteRequest,
    ) -> Result<PromptResponse, CapabilityError> {
        rewrite_prompt(&self.client, self.require_gemini()?, request).await
    }
}
