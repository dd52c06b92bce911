//! HTTP generation clients.
//!
//! [`Client`] uses a typestate to track which providers are configured, so
//! provider-specific calls only compile when that provider was enabled.
//! Whatever its state, a client is also a [`GenerationCapability`] the engine
//! can run against: it routes every call to the backend when one is
//! configured and falls back to Gemini otherwise.

pub mod backend;
pub mod gemini;

use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;

use crate::capability::{
    CapabilityError, GenerationCapability, ImageRequest, MediaResponse, PromptResponse,
    RewriteRequest, VideoRequest,
};

pub use backend::{Backend, BackendConfig};
pub use gemini::{Gemini, GeminiConfig, GeminiContent, GeminiPart, GeminiRequest, GeminiResponse};

/// Upper bound for a single generation call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Generation client wrapper around reqwest::Client
#[derive(Clone)]
pub struct Client<S> {
    pub(crate) client: reqwest::Client,
    pub(crate) state: PhantomData<S>,
    pub(crate) backend_config: Option<BackendConfig>,
    pub(crate) gemini_config: Option<GeminiConfig>,
}

// ============================================================================
// Type States
// ============================================================================

/// Marker indicating a provider is enabled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Enabled;

/// Marker indicating a provider is disabled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Disabled;

/// Provider state container
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Providers<BackendState, GeminiState> {
    _backend: PhantomData<BackendState>,
    _gemini: PhantomData<GeminiState>,
}

/// Trait to check if a provider is available on this client
pub trait HasProvider<Provider> {}

impl<G> HasProvider<Backend> for Providers<Enabled, G> {}

impl<B> HasProvider<Gemini> for Providers<B, Enabled> {}

// ============================================================================
// Client constructors and builders
// ============================================================================

impl Client<Providers<Disabled, Disabled>> {
    /// Create a new client with no providers configured
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|err| {
                log::warn!("Falling back to a default HTTP client: {}", err);
                reqwest::Client::new()
            });
        Client {
            client,
            state: PhantomData,
            backend_config: None,
            gemini_config: None,
        }
    }
}

impl Default for Client<Providers<Disabled, Disabled>> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G> Client<Providers<Disabled, G>> {
    /// Enable the generation backend at `base_url` (e.g. `http://localhost:8000`)
    pub fn with_backend(self, base_url: impl Into<String>) -> Client<Providers<Enabled, G>> {
        self.with_backend_config(BackendConfig {
            base_url: base_url.into(),
        })
    }

    pub fn with_backend_config(self, config: BackendConfig) -> Client<Providers<Enabled, G>> {
        Client {
            client: self.client,
            state: PhantomData,
            backend_config: Some(config),
            gemini_config: self.gemini_config,
        }
    }
}

impl<B> Client<Providers<B, Disabled>> {
    /// Enable Gemini with an API key and the default endpoint and models
    pub fn with_gemini(self, api_key: impl Into<String>) -> Client<Providers<B, Enabled>> {
        self.with_gemini_config(GeminiConfig {
            api_key: api_key.into(),
            ..Default::default()
        })
    }

    /// Enable Gemini from `GEMINI_API_KEY` and friends.
    pub fn with_gemini_from_env(self) -> Result<Client<Providers<B, Enabled>>, CapabilityError> {
        Ok(self.with_gemini_config(GeminiConfig::from_env()?))
    }

    pub fn with_gemini_config(self, config: GeminiConfig) -> Client<Providers<B, Enabled>> {
        Client {
            client: self.client,
            state: PhantomData,
            backend_config: self.backend_config,
            gemini_config: Some(config),
        }
    }
}

// Edit methods for enabled providers

impl<G> Client<Providers<Enabled, G>> {
    pub fn edit_backend_url(&mut self, base_url: impl Into<String>) {
        if let Some(ref mut config) = self.backend_config {
            config.base_url = base_url.into();
        }
    }
}

impl<B> Client<Providers<B, Enabled>> {
    pub fn edit_gemini_image_model(&mut self, model: impl Into<String>) {
        if let Some(ref mut config) = self.gemini_config {
            config.image_model = model.into();
        }
    }

    pub fn edit_gemini_prompt_model(&mut self, model: impl Into<String>) {
        if let Some(ref mut config) = self.gemini_config {
            config.prompt_model = model.into();
        }
    }
}

impl<S> Client<S> {
    pub fn backend_config(&self) -> Option<&BackendConfig> {
        self.backend_config.as_ref()
    }

    pub fn gemini_config(&self) -> Option<&GeminiConfig> {
        self.gemini_config.as_ref()
    }

    fn not_configured() -> CapabilityError {
        CapabilityError::ProviderNotConfigured(
            "neither a backend nor Gemini is configured".to_string(),
        )
    }
}

// ============================================================================
// Engine capability
// ============================================================================

#[async_trait]
impl<S: Send + Sync> GenerationCapability for Client<S> {
    async fn generate_image(&self, request: ImageRequest) -> Result<MediaResponse, CapabilityError> {
        match (&self.backend_config, &self.gemini_config) {
            (Some(config), _) => backend::generate_image(&self.client, config, &request).await,
            (None, Some(config)) => gemini::generate_image(&self.client, config, &request).await,
            (None, None) => Err(Self::not_configured()),
        }
    }

    async fn generate_video(&self, request: VideoRequest) -> Result<MediaResponse, CapabilityError> {
        match (&self.backend_config, &self.gemini_config) {
            (Some(config), _) => backend::generate_video(&self.client, config, &request).await,
            (None, Some(_)) => Err(CapabilityError::Unsupported(
                "video generation needs the backend provider".to_string(),
            )),
            (None, None) => Err(Self::not_configured()),
        }
    }

    async fn rewrite_prompt(
        &self,
        request: RewriteRequest,
    ) -> Result<PromptResponse, CapabilityError> {
        match (&self.backend_config, &self.gemini_config) {
            (Some(config), _) => backend::rewrite_prompt(&self.client, config, &request).await,
            (None, Some(config)) => gemini::rewrite_prompt(&self.client, config, &request).await,
            (None, None) => Err(Self::not_configured()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::MediaTypeHint;

    #[test]
    fn test_builders_enable_providers() {
        let client = Client::new()
            .with_backend("http://localhost:8000")
            .with_gemini("key");
        assert_eq!(client.backend_config().unwrap().base_url, "http://localhost:8000");
        assert_eq!(client.gemini_config().unwrap().api_key, "key");

        let mut client = Client::new().with_gemini("key");
        client.edit_gemini_prompt_model("gemini-2.5-flash");
        assert!(client.backend_config().is_none());
        assert_eq!(client.gemini_config().unwrap().prompt_model, "gemini-2.5-flash");
    }

    #[tokio::test]
    async fn test_unconfigured_client_refuses_calls() {
        let client = Client::new();
        let err = client
            .rewrite_prompt(RewriteRequest {
                subject: "cat".into(),
                secondary_text: String::new(),
                reference_images: vec![],
                agent_instruction: String::new(),
                model_id: "m".into(),
                aspect_ratio: None,
                resolution: None,
                media_type: MediaTypeHint::Image,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::ProviderNotConfigured(_)));
    }

    #[tokio::test]
    async fn test_gemini_only_client_has_no_video() {
        let client = Client::new().with_gemini("key");
        let err = client
            .generate_video(VideoRequest {
                prompt: "a fox".into(),
                reference_images: vec![],
                model_id: "veo".into(),
                aspect_ratio: None,
                resolution: None,
                duration_seconds: 5,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::Unsupported(_)));
    }
}
