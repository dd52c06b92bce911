use thiserror::Error;

/// Failure of an external generation call.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[cfg(feature = "http")]
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The generation backend answered with an error message.
    #[error("Backend error: {0}")]
    BackendError(String),

    #[error("Gemini error: {0}")]
    GeminiError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The call succeeded but returned no url/prompt.
    #[error("{0} returned no payload")]
    EmptyPayload(&'static str),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}
