//! Session state for the Gėminis client: transcript, request lifecycle, settings and the
//! screen projection consumed by the UI.

mod controller;
mod settings;
mod transcript;
mod view;

pub use controller::{
    DEFAULT_FALLBACK_REPLY, InFlight, SessionController, SessionPhase, Settled, SubmitRejected,
};
pub use settings::{
    API_KEY_ENV_VARS, ENV_PREFIX, Presentation, SETTINGS_DIRECTORY_NAME, SETTINGS_FILE_NAME,
    Settings, SettingsError, SettingsStore, ThemePreference,
};
pub use transcript::{Role, Transcript, Turn, TurnId};
pub use view::{ComposerView, RowView, ScreenView, Suggestion, TranscriptView, project};
