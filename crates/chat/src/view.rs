use serde::{Deserialize, Serialize};

use crate::controller::SessionController;
use crate::settings::Settings;
use crate::transcript::{Role, TurnId};

/// Welcome chip. Picking it prefills the composer with `prompt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub label: String,
    pub prompt: String,
}

impl Suggestion {
    pub fn new(label: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            prompt: prompt.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowView {
    pub id: TurnId,
    pub role: Role,
    pub sender: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptView {
    Welcome {
        greeting: String,
        suggestions: Vec<Suggestion>,
    },
    Conversation {
        rows: Vec<RowView>,
        /// Indicator text while a reply is pending.
        thinking: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposerView {
    pub draft: String,
    pub placeholder: String,
    pub input_enabled: bool,
    pub send_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenView {
    pub title: String,
    pub avatar_initial: String,
    pub body: TranscriptView,
    pub composer: ComposerView,
}

/// Derives everything the screen shows from controller state. Holds no state of its own.
pub fn project(controller: &SessionController, settings: &Settings) -> ScreenView {
    let presentation = &settings.presentation;
    let avatar_initial = settings.avatar_initial();
    let pending = controller.is_pending();

    let body = if controller.transcript().is_empty() && !pending {
        TranscriptView::Welcome {
            greeting: settings.greeting(),
            suggestions: presentation.suggestions.clone(),
        }
    } else {
        let rows = controller
            .transcript()
            .iter()
            .map(|turn| RowView {
                id: turn.id(),
                role: turn.role(),
                sender: match turn.role() {
                    Role::User => avatar_initial.clone(),
                    Role::Assistant => presentation.assistant_label.clone(),
                },
                content: turn.content().to_string(),
            })
            .collect();

        TranscriptView::Conversation {
            rows,
            thinking: pending.then(|| presentation.thinking_indicator.clone()),
        }
    };

    let draft = controller.draft().to_string();
    let composer = ComposerView {
        send_enabled: !pending && !draft.trim().is_empty(),
        input_enabled: !pending,
        placeholder: presentation.placeholder.clone(),
        draft,
    };

    ScreenView {
        title: presentation.title.clone(),
        avatar_initial,
        body,
        composer,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use geminis_llm::UnconfiguredBackend;

    use super::*;

    fn controller() -> SessionController {
        SessionController::new(
            Arc::new(UnconfiguredBackend::new("gemini", "missing API key")),
            "gemini-2.5-flash",
        )
    }

    #[test]
    fn empty_session_shows_welcome_with_suggestions() {
        let view = project(&controller(), &Settings::default());

        assert_eq!(view.title, "Gėminis");
        assert_eq!(view.avatar_initial, "M");
        let TranscriptView::Welcome {
            greeting,
            suggestions,
        } = view.body
        else {
            panic!("empty session must show the welcome screen");
        };
        assert_eq!(greeting, "Hola, Miguel");
        assert_eq!(suggestions.len(), 4);
        assert_eq!(view.composer.placeholder, "Ask Gemini");
        assert!(view.composer.input_enabled);
        assert!(!view.composer.send_enabled);
    }

    #[test]
    fn pending_session_shows_user_turn_and_thinking_indicator() {
        let mut controller = controller();
        let in_flight = controller.submit("Hello").unwrap();

        let view = project(&controller, &Settings::default());
        let TranscriptView::Conversation { rows, thinking } = &view.body else {
            panic!("pending session must show the conversation");
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].role, Role::User);
        assert_eq!(rows[0].sender, "M");
        assert_eq!(rows[0].content, "Hello");
        assert_eq!(thinking.as_deref(), Some("Gemini is thinking..."));
        assert!(!view.composer.input_enabled);
        assert!(!view.composer.send_enabled);

        drop(in_flight);
    }

    #[tokio::test]
    async fn settled_session_drops_indicator_and_labels_assistant() {
        let mut controller = controller();
        controller.converse("Hello").await;
        controller.prefill("Escribir un poema");

        let view = project(&controller, &Settings::default());
        let TranscriptView::Conversation { rows, thinking } = &view.body else {
            panic!("settled session must show the conversation");
        };
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].role, Role::Assistant);
        assert_eq!(rows[1].sender, "Gemini");
        assert_eq!(
            rows[1].content,
            "Sorry, something went wrong. Please try again."
        );
        assert!(thinking.is_none());
        assert_eq!(view.composer.draft, "Escribir un poema");
        assert!(view.composer.send_enabled);
    }

    #[test]
    fn whitespace_draft_cannot_be_sent() {
        let mut controller = controller();
        controller.update_draft("   ");
        let view = project(&controller, &Settings::default());
        assert!(view.composer.input_enabled);
        assert!(!view.composer.send_enabled);
    }

    #[tokio::test]
    async fn reloaded_settings_restyle_the_same_conversation() {
        let mut controller = controller();
        controller.converse("Hello").await;

        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            let file_name = crate::settings::SETTINGS_FILE_NAME;
            jail.create_file(file_name, r#"{ "presentation": { "title": "Before" } }"#)?;
            let store = crate::settings::SettingsStore::new(jail.directory().join(file_name));
            assert_eq!(project(&controller, &store.settings()).title, "Before");

            jail.create_file(file_name, r#"{ "presentation": { "title": "After" } }"#)?;
            let view = project(&controller, &store.reload());
            assert_eq!(view.title, "After");
            let TranscriptView::Conversation { rows, .. } = &view.body else {
                panic!("reloading settings must keep the conversation");
            };
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[0].content, "Hello");
            Ok(())
        });
    }
}
