use futures::future::BoxFuture;
use snafu::Snafu;

use super::model::{canonical_provider_id, default_model_for};

#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    pub provider_id: String,
    pub api_key: String,
    pub endpoint: String,
    pub preamble: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
}

impl BackendConfig {
    pub fn new(
        provider_id: impl Into<String>,
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            provider_id: canonical_provider_id(&provider_id.into()),
            api_key: api_key.into().trim().to_string(),
            endpoint: endpoint.into().trim().to_string(),
            preamble: None,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        let preamble = preamble.into();
        self.preamble = if preamble.trim().is_empty() {
            None
        } else {
            Some(preamble)
        };
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn default_model(&self) -> &'static str {
        default_model_for(&self.provider_id)
    }
}

/// Text returned by one backend round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
}

impl Reply {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BackendError {
    #[snafu(display("missing API key for provider '{provider_id}'"))]
    MissingApiKey {
        stage: &'static str,
        provider_id: String,
    },
    #[snafu(display("provider '{provider_id}' is not supported"))]
    UnsupportedProvider {
        stage: &'static str,
        provider_id: String,
    },
    #[snafu(display("http client failed on `{stage}`, {source}"))]
    HttpClient {
        stage: &'static str,
        source: rig::http_client::Error,
    },
    #[snafu(display("completions failed on `{stage}`, {source}"))]
    CompletionsFailed {
        stage: &'static str,
        source: rig::completion::CompletionError,
    },
    #[snafu(display("malformed response on `{stage}`: {details}"))]
    MalformedResponse {
        stage: &'static str,
        details: String,
    },
    #[snafu(display("request interrupted on `{stage}`: {details}"))]
    Interrupted {
        stage: &'static str,
        details: String,
    },
    #[snafu(display("provider '{provider_id}' is not configured: {details}"))]
    Unconfigured {
        stage: &'static str,
        provider_id: String,
        details: String,
    },
}

impl BackendError {
    /// Pipeline stage where the error was raised, for structured logging.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::MissingApiKey { stage, .. }
            | Self::UnsupportedProvider { stage, .. }
            | Self::HttpClient { stage, .. }
            | Self::CompletionsFailed { stage, .. }
            | Self::MalformedResponse { stage, .. }
            | Self::Interrupted { stage, .. }
            | Self::Unconfigured { stage, .. } => stage,
        }
    }
}

/// Stateful conversation with the backend.
///
/// Implementations keep whatever context the backend needs so that every `send`
/// continues the same conversation.
pub trait ChatSession: Send {
    fn send<'a>(&'a mut self, message: &'a str) -> BoxFuture<'a, BackendResult<Reply>>;
}

pub trait ChatBackend: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    /// Opens a fresh conversation. Each call yields an independent context.
    fn create_session(&self, model_id: &str) -> BackendResult<Box<dyn ChatSession>>;
}

/// Stand-in used when no usable backend could be built from settings.
///
/// Every session creation fails with the recorded reason, so each submission ends in the
/// fallback reply instead of the application refusing to start.
pub struct UnconfiguredBackend {
    provider_id: String,
    reason: String,
}

impl UnconfiguredBackend {
    pub fn new(provider_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            reason: reason.into(),
        }
    }
}

impl ChatBackend for UnconfiguredBackend {
    fn id(&self) -> &str {
        &self.provider_id
    }

    fn name(&self) -> &str {
        "Unconfigured"
    }

    fn create_session(&self, _model_id: &str) -> BackendResult<Box<dyn ChatSession>> {
        UnconfiguredSnafu {
            stage: "create-session",
            provider_id: self.provider_id.clone(),
            details: self.reason.clone(),
        }
        .fail()
    }
}
