use futures::future::BoxFuture;
use rig::completion::{AssistantContent, CompletionModel, Message as RigMessage};
use rig::prelude::CompletionClient;
use rig::providers::{gemini, openai};
use snafu::{ResultExt, ensure};

use super::backend::{
    BackendConfig, BackendResult, ChatBackend, ChatSession, CompletionsFailedSnafu,
    HttpClientSnafu, MalformedResponseSnafu, MissingApiKeySnafu, Reply,
    UnsupportedProviderSnafu,
};
use super::model::{GEMINI_PROVIDER_ID, OPENAI_PROVIDER_ID};

/// Rig-backed chat backend for the Gemini and OpenAI providers.
pub struct RigBackend {
    config: BackendConfig,
}

impl RigBackend {
    pub fn new(config: BackendConfig) -> BackendResult<Self> {
        ensure!(
            !config.api_key.is_empty(),
            MissingApiKeySnafu {
                stage: "rig-backend-new",
                provider_id: config.provider_id.clone(),
            }
        );
        ensure!(
            matches!(
                config.provider_id.as_str(),
                GEMINI_PROVIDER_ID | OPENAI_PROVIDER_ID
            ),
            UnsupportedProviderSnafu {
                stage: "rig-backend-new",
                provider_id: config.provider_id.clone(),
            }
        );

        Ok(Self { config })
    }

    fn build_gemini_client(config: &BackendConfig) -> BackendResult<gemini::Client> {
        let mut builder = gemini::Client::builder().api_key(config.api_key.as_str());
        if !config.endpoint.is_empty() {
            builder = builder.base_url(config.endpoint.as_str());
        }
        builder.build().context(HttpClientSnafu {
            stage: "build-gemini-client",
        })
    }

    fn build_openai_client(config: &BackendConfig) -> BackendResult<openai::Client> {
        let mut builder = openai::Client::builder().api_key(config.api_key.as_str());
        if !config.endpoint.is_empty() {
            builder = builder.base_url(config.endpoint.as_str());
        }
        builder.build().context(HttpClientSnafu {
            stage: "build-openai-client",
        })
    }
}

impl ChatBackend for RigBackend {
    fn id(&self) -> &str {
        &self.config.provider_id
    }

    fn name(&self) -> &str {
        match self.config.provider_id.as_str() {
            OPENAI_PROVIDER_ID => "Rig OpenAI",
            _ => "Rig Gemini",
        }
    }

    fn create_session(&self, model_id: &str) -> BackendResult<Box<dyn ChatSession>> {
        let model_id = if model_id.trim().is_empty() {
            self.config.default_model()
        } else {
            model_id.trim()
        };

        tracing::debug!(
            provider_id = %self.config.provider_id,
            model_id = %model_id,
            "opening chat session"
        );

        match self.config.provider_id.as_str() {
            GEMINI_PROVIDER_ID => {
                let client = Self::build_gemini_client(&self.config)?;
                let model = client.completion_model(model_id.to_string());
                Ok(Box::new(RigChatSession::new(model, model_id, &self.config)))
            }
            OPENAI_PROVIDER_ID => {
                let client = Self::build_openai_client(&self.config)?;
                let model = client.completion_model(model_id.to_string());
                Ok(Box::new(RigChatSession::new(model, model_id, &self.config)))
            }
            _ => UnsupportedProviderSnafu {
                stage: "create-session",
                provider_id: self.config.provider_id.clone(),
            }
            .fail(),
        }
    }
}

/// One conversation on a rig completion model.
///
/// Rig requests are stateless, so the session replays its own history with every send.
/// History only grows after a round trip succeeds; a failed send leaves it untouched.
struct RigChatSession<M> {
    model: M,
    model_id: String,
    history: Vec<RigMessage>,
    preamble: Option<String>,
    temperature: Option<f64>,
    max_tokens: Option<u64>,
}

impl<M> RigChatSession<M> {
    fn new(model: M, model_id: &str, config: &BackendConfig) -> Self {
        Self {
            model,
            model_id: model_id.to_string(),
            history: Vec::new(),
            preamble: config.preamble.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

impl<M> ChatSession for RigChatSession<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn send<'a>(&'a mut self, message: &'a str) -> BoxFuture<'a, BackendResult<Reply>> {
        Box::pin(async move {
            let prompt = RigMessage::user(message.to_string());
            let mut builder = self
                .model
                .completion_request(prompt.clone())
                .messages(self.history.clone());

            if let Some(preamble) = &self.preamble {
                builder = builder.preamble(preamble.clone());
            }

            if let Some(temperature) = self.temperature {
                builder = builder.temperature(temperature);
            }

            if let Some(max_tokens) = self.max_tokens {
                builder = builder.max_tokens(max_tokens);
            }

            let response = builder.send().await.context(CompletionsFailedSnafu {
                stage: "send-message",
            })?;

            let Some(text) = reply_text(response.choice.iter()) else {
                tracing::warn!(
                    model_id = %self.model_id,
                    history_len = self.history.len(),
                    "completion carried no text content"
                );
                return MalformedResponseSnafu {
                    stage: "extract-reply-text",
                    details: "completion has no text content".to_string(),
                }
                .fail();
            };

            self.history.push(prompt);
            self.history.push(RigMessage::assistant(text.clone()));

            Ok(Reply::new(text))
        })
    }
}

/// Joins every text part of a completion choice.
///
/// Returns `None` when the choice carries no text part at all. An empty text part is a
/// valid (empty) reply.
fn reply_text<'a>(contents: impl IntoIterator<Item = &'a AssistantContent>) -> Option<String> {
    let mut text: Option<String> = None;

    for content in contents {
        if let AssistantContent::Text(part) = content {
            text.get_or_insert_with(String::new).push_str(&part.text);
        }
    }

    text
}
