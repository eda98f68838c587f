use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use geminis_llm::{BackendConfig, GEMINI_PROVIDER_ID, canonical_provider_id, default_model_for};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use snafu::{ResultExt, Snafu};

use crate::controller::DEFAULT_FALLBACK_REPLY;
use crate::view::Suggestion;

pub const SETTINGS_DIRECTORY_NAME: &str = "geminis";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
/// Prefix for environment overrides, e.g. `GEMINIS_MODEL` or `GEMINIS_PRESENTATION__TITLE`.
pub const ENV_PREFIX: &str = "GEMINIS_";
/// Environment variables consulted, in order, when no API key is configured.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemePreference {
    #[default]
    Light,
    Dark,
}

impl ThemePreference {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }

    pub fn is_dark(&self) -> bool {
        matches!(self, Self::Dark)
    }
}

impl Serialize for ThemePreference {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for ThemePreference {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(parse_theme_preference(&value))
    }
}

/// Strings and affordances shown by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presentation {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_greeting")]
    pub greeting: String,
    #[serde(default = "default_placeholder")]
    pub placeholder: String,
    #[serde(default = "default_thinking_indicator")]
    pub thinking_indicator: String,
    #[serde(default = "default_assistant_label")]
    pub assistant_label: String,
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,
    #[serde(default = "default_suggestions")]
    pub suggestions: Vec<Suggestion>,
}

impl Default for Presentation {
    fn default() -> Self {
        Self {
            title: default_title(),
            greeting: default_greeting(),
            placeholder: default_placeholder(),
            thinking_indicator: default_thinking_indicator(),
            assistant_label: default_assistant_label(),
            fallback_reply: default_fallback_reply(),
            suggestions: default_suggestions(),
        }
    }
}

impl Presentation {
    fn normalized(mut self) -> Self {
        let defaults = Self::default();
        fill_if_blank(&mut self.title, defaults.title);
        fill_if_blank(&mut self.greeting, defaults.greeting);
        fill_if_blank(&mut self.placeholder, defaults.placeholder);
        fill_if_blank(&mut self.thinking_indicator, defaults.thinking_indicator);
        fill_if_blank(&mut self.assistant_label, defaults.assistant_label);
        fill_if_blank(&mut self.fallback_reply, defaults.fallback_reply);

        // A chip without a prompt would prefill nothing.
        self.suggestions = self
            .suggestions
            .into_iter()
            .filter(|suggestion| !suggestion.prompt.trim().is_empty())
            .map(|suggestion| {
                if suggestion.label.trim().is_empty() {
                    Suggestion::new(suggestion.prompt.clone(), suggestion.prompt)
                } else {
                    suggestion
                }
            })
            .collect();

        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_provider_id")]
    pub provider_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub preamble: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u64>,
    #[serde(default = "default_user_name")]
    pub user_name: String,
    #[serde(default)]
    pub theme_mode: ThemePreference,
    #[serde(default)]
    pub theme_name: String,
    #[serde(default)]
    pub presentation: Presentation,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider_id: default_provider_id(),
            api_key: String::new(),
            endpoint: String::new(),
            model: default_model_for(GEMINI_PROVIDER_ID).to_string(),
            preamble: None,
            temperature: None,
            max_tokens: None,
            user_name: default_user_name(),
            theme_mode: ThemePreference::default(),
            theme_name: String::new(),
            presentation: Presentation::default(),
        }
    }
}

impl Settings {
    /// Layered sources: built-in defaults, then the JSON file, then `GEMINIS_*` variables.
    pub fn figment(path: &Path) -> Figment {
        Self::file_figment(path).merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Defaults and the JSON file only. This is what `update` edits and writes back.
    pub fn file_figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Settings::default())).merge(Json::file(path))
    }

    pub fn normalized(mut self) -> Self {
        self.provider_id = canonical_provider_id(&self.provider_id);
        self.api_key = self.api_key.trim().to_string();
        self.endpoint = self.endpoint.trim().to_string();
        self.model = self.model.trim().to_string();
        if self.model.is_empty() {
            self.model = default_model_for(&self.provider_id).to_string();
        }
        self.preamble = self
            .preamble
            .take()
            .filter(|preamble| !preamble.trim().is_empty());
        self.user_name = self.user_name.trim().to_string();
        self.theme_name = self.theme_name.trim().to_string();
        self.presentation = self.presentation.normalized();
        self
    }

    /// Fills a blank API key from the first non-blank variable in [`API_KEY_ENV_VARS`].
    pub fn with_api_key_fallback(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if !self.api_key.is_empty() {
            return self;
        }

        if let Some(api_key) = API_KEY_ENV_VARS
            .iter()
            .filter_map(|name| lookup(name))
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
        {
            self.api_key = api_key;
        }

        self
    }

    pub fn backend_config(&self) -> BackendConfig {
        let mut config = BackendConfig::new(&self.provider_id, &self.api_key, &self.endpoint);
        if let Some(preamble) = &self.preamble {
            config = config.with_preamble(preamble.clone());
        }
        if let Some(temperature) = self.temperature {
            config = config.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            config = config.with_max_tokens(max_tokens);
        }
        config
    }

    pub fn model_id(&self) -> &str {
        if self.model.trim().is_empty() {
            default_model_for(&self.provider_id)
        } else {
            self.model.trim()
        }
    }

    pub fn greeting(&self) -> String {
        if self.user_name.is_empty() {
            self.presentation.greeting.clone()
        } else {
            format!("{}, {}", self.presentation.greeting, self.user_name)
        }
    }

    /// Single uppercase letter used for the user avatar.
    pub fn avatar_initial(&self) -> String {
        self.user_name
            .chars()
            .find(|c| c.is_alphanumeric())
            .map(|c| c.to_uppercase().collect())
            .unwrap_or_else(|| "?".to_string())
    }
}

pub struct SettingsStore {
    settings: Arc<ArcSwap<Settings>>,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".geminis"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn new(config_path: PathBuf) -> Self {
        let settings = Self::load_from_disk(&config_path);
        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> Arc<Settings> {
        self.settings.load_full()
    }

    /// Re-reads the settings file and environment, replacing the current snapshot.
    pub fn reload(&self) -> Arc<Settings> {
        let settings = Arc::new(Self::load_from_disk(&self.config_path));
        self.settings.store(settings.clone());
        settings
    }

    /// Applies `change` to the file-backed settings, saves them and reloads the snapshot.
    ///
    /// Environment overrides never reach the file; they are layered back on by the reload.
    pub fn update(
        &self,
        change: impl FnOnce(&mut Settings),
    ) -> Result<Arc<Settings>, SettingsError> {
        let mut file_settings =
            Self::extract(Settings::file_figment(&self.config_path), &self.config_path);
        change(&mut file_settings);
        self.persist(&file_settings.normalized())?;
        Ok(self.reload())
    }

    fn load_from_disk(path: &Path) -> Settings {
        if !path.exists() {
            tracing::info!("settings file not found at {:?}, using defaults", path);
        }

        Self::extract(Settings::figment(path), path)
    }

    fn extract(figment: Figment, path: &Path) -> Settings {
        match figment.extract::<Settings>() {
            Ok(settings) => settings.normalized(),
            Err(error) => {
                tracing::warn!(
                    "failed to parse settings from {:?}: {}. using defaults",
                    path,
                    error
                );
                Settings::default()
            }
        }
    }

    fn persist(&self, settings: &Settings) -> Result<(), SettingsError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                stage: "create-settings-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(settings).context(SerializeConfigSnafu {
            stage: "serialize-settings-json",
        })?;

        let temp_path = self.config_path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteFileSnafu {
            stage: "write-temporary-settings-file",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, &self.config_path).context(RenameTempFileSnafu {
            stage: "rename-temporary-settings-file",
            from: temp_path,
            to: self.config_path.clone(),
        })?;

        tracing::info!("saved settings to {:?}", self.config_path);
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("failed to create settings directory at {path:?} on `{stage}`: {source}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize settings on `{stage}`: {source}"))]
    SerializeConfig {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write settings file at {path:?} on `{stage}`: {source}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "failed to replace settings file from {from:?} to {to:?} on `{stage}`: {source}"
    ))]
    RenameTempFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

fn fill_if_blank(value: &mut String, default: String) {
    if value.trim().is_empty() {
        *value = default;
    } else {
        *value = value.trim().to_string();
    }
}

fn default_provider_id() -> String {
    GEMINI_PROVIDER_ID.to_string()
}

fn default_user_name() -> String {
    "Miguel".to_string()
}

fn default_title() -> String {
    "Gėminis".to_string()
}

fn default_greeting() -> String {
    "Hola".to_string()
}

fn default_placeholder() -> String {
    "Ask Gemini".to_string()
}

fn default_thinking_indicator() -> String {
    "Gemini is thinking...".to_string()
}

fn default_assistant_label() -> String {
    "Gemini".to_string()
}

fn default_fallback_reply() -> String {
    DEFAULT_FALLBACK_REPLY.to_string()
}

fn default_suggestions() -> Vec<Suggestion> {
    vec![
        Suggestion::new("Crear imagen", "Crear una imagen de un astronauta"),
        Suggestion::new("Escribir", "Escribir un poema sobre la lluvia"),
        Suggestion::new("Construir", "Construir un plan de entrenamiento"),
        Suggestion::new("Investigación profunda", "Investigación profunda sobre IA"),
    ]
}

fn parse_theme_preference(value: &str) -> ThemePreference {
    if value.trim().eq_ignore_ascii_case("dark") {
        ThemePreference::Dark
    } else {
        ThemePreference::Light
    }
}
