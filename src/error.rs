//! Error types for the tour guide.

/// User-safe text shown when the AI reply cannot be parsed.
pub const UNREADABLE_RESPONSE: &str = "AI returned an unreadable response. Please try again.";

/// Fallback text shown when a provider failure carries no message.
pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

/// Top-level error type for the guide.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("AI error: {0}")]
    Ai(#[from] AiError),

    #[error("Presenter error: {0}")]
    Presenter(#[from] PresenterError),
}

impl Error {
    /// Text suitable for the chat panel.
    pub fn user_message(&self) -> String {
        match self {
            Self::Ai(e) => e.user_message(),
            Self::Config(e) => e.to_string(),
            Self::Presenter(_) => GENERIC_FAILURE.to_string(),
        }
    }
}

/// Configuration-related errors. Raised at init so the host fails fast.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// AI provider and response errors.
#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("{0}")]
    ResponseFormat(String),
}

impl AiError {
    /// Build the response-format error with its fixed user-safe message.
    pub fn unreadable() -> Self {
        Self::ResponseFormat(UNREADABLE_RESPONSE.to_string())
    }

    /// Text suitable for the chat panel.
    pub fn user_message(&self) -> String {
        match self {
            Self::ResponseFormat(msg) => msg.clone(),
            Self::RequestFailed { reason, .. } if !reason.trim().is_empty() => reason.clone(),
            _ => GENERIC_FAILURE.to_string(),
        }
    }
}

/// Presenter (tooltip renderer) errors.
#[derive(Debug, thiserror::Error)]
pub enum PresenterError {
    #[error("Presenter failed to load: {0}")]
    LoadFailed(String),
}

/// Result type alias for the guide.
pub type Result<T> = std::result::Result<T, Error>;
