use std::sync::Arc;

use geminis_chat::{
    ScreenView, SessionController, Settings, SettingsStore, Settled, TranscriptView, project,
};
use geminis_llm::{ChatBackend, UnconfiguredBackend, create_backend};
use gpui::*;
use gpui_component::{ActiveTheme, v_flex};
use gpui_tokio_bridge::Tokio;

use crate::chat::events::{DraftChanged, Submit, SuggestionPicked};
use crate::chat::{MessageInput, MessageList, WelcomePanel};

/// Owns the session controller and renders its projection.
///
/// Children never touch session state directly; they emit events and this view pushes
/// the next [`ScreenView`] back down after every change.
pub struct ChatView {
    settings: Arc<SettingsStore>,
    controller: SessionController,
    screen: ScreenView,
    message_list: Entity<MessageList>,
    message_input: Entity<MessageInput>,
    welcome: Entity<WelcomePanel>,
    response_task: Option<Task<()>>,
}

impl ChatView {
    pub fn new(settings: Arc<SettingsStore>, window: &mut Window, cx: &mut Context<Self>) -> Self {
        let snapshot = settings.settings();
        let controller = Self::build_controller(&snapshot);
        let screen = project(&controller, &snapshot);

        let message_list = cx.new(MessageList::new);
        let placeholder = SharedString::from(screen.composer.placeholder.clone());
        let message_input = cx.new(|cx| MessageInput::new(placeholder, window, cx));
        let welcome = cx.new(WelcomePanel::new);

        cx.subscribe_in(
            &message_input,
            window,
            |this, _, event: &Submit, window, cx| {
                this.handle_submit(event, window, cx);
            },
        )
        .detach();

        cx.subscribe(&message_input, |this, _, event: &DraftChanged, cx| {
            this.controller.update_draft(event.text.clone());
            this.refresh(cx);
        })
        .detach();

        cx.subscribe_in(
            &welcome,
            window,
            |this, _, event: &SuggestionPicked, window, cx| {
                this.handle_suggestion_picked(event, window, cx);
            },
        )
        .detach();

        let mut this = Self {
            settings,
            controller,
            screen,
            message_list,
            message_input,
            welcome,
            response_task: None,
        };
        this.refresh(cx);
        this
    }

    pub fn screen(&self) -> &ScreenView {
        &self.screen
    }

    /// Re-projects after a settings change. The session itself is kept.
    pub fn refresh(&mut self, cx: &mut Context<Self>) {
        let settings = self.settings.settings();
        self.screen = project(&self.controller, &settings);

        match &self.screen.body {
            TranscriptView::Welcome {
                greeting,
                suggestions,
            } => {
                self.welcome.update(cx, |welcome, cx| {
                    welcome.set_content(greeting, suggestions, cx);
                });
            }
            TranscriptView::Conversation { rows, thinking } => {
                let (rows, thinking) = (rows.clone(), thinking.clone());
                self.message_list.update(cx, |list, cx| {
                    list.set_rows(rows, thinking, cx);
                });
            }
        }

        let composer = self.screen.composer.clone();
        self.message_input.update(cx, |input, cx| {
            input.sync(&composer, cx);
        });

        cx.notify();
    }

    fn build_controller(settings: &Settings) -> SessionController {
        let resolved = settings
            .clone()
            .with_api_key_fallback(|name| std::env::var(name).ok());

        let backend: Arc<dyn ChatBackend> = match create_backend(resolved.backend_config()) {
            Ok(backend) => backend,
            Err(error) => {
                // Keep the window usable; every turn will end in the fallback reply.
                tracing::error!(
                    stage = error.stage(),
                    provider_id = %resolved.provider_id,
                    "backend unavailable: {}",
                    error
                );
                Arc::new(UnconfiguredBackend::new(
                    resolved.provider_id.clone(),
                    error.to_string(),
                ))
            }
        };

        tracing::info!(
            backend = backend.name(),
            model_id = resolved.model_id(),
            "chat backend ready"
        );

        SessionController::new(backend, resolved.model_id())
            .with_fallback_reply(resolved.presentation.fallback_reply.clone())
    }

    fn handle_submit(&mut self, event: &Submit, window: &mut Window, cx: &mut Context<Self>) {
        self.controller.update_draft(event.content.clone());

        let in_flight = match self.controller.submit_draft() {
            Ok(in_flight) => in_flight,
            Err(reason) => {
                tracing::debug!(?reason, "submission ignored");
                self.refresh(cx);
                return;
            }
        };

        let user_turn = in_flight.user_turn();
        self.message_input.update(cx, |input, cx| {
            input.set_draft("", window, cx);
        });
        self.message_list.update(cx, |list, cx| {
            list.request_scroll_to_bottom(cx);
        });
        self.refresh(cx);

        // The backend call runs on tokio; only the settle step touches UI state.
        let worker = Tokio::spawn(cx, in_flight.resolve());
        self.response_task = Some(cx.spawn(async move |this, cx| {
            let settled = match worker.await {
                Ok(settled) => settled,
                Err(error) => Settled::interrupted(user_turn, format!("{error:?}")),
            };

            let _ = this.update(cx, |this, cx| {
                this.controller.settle(settled);
                this.response_task = None;
                this.refresh(cx);
            });
        }));
    }

    fn handle_suggestion_picked(
        &mut self,
        event: &SuggestionPicked,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        self.controller.prefill(event.prompt.clone());

        let draft = self.controller.draft().to_string();
        self.message_input.update(cx, |input, cx| {
            input.set_draft(&draft, window, cx);
            input.focus(window, cx);
        });
        self.refresh(cx);
    }
}

impl Render for ChatView {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let body = match self.screen.body {
            TranscriptView::Welcome { .. } => self.welcome.clone().into_any_element(),
            TranscriptView::Conversation { .. } => self.message_list.clone().into_any_element(),
        };

        v_flex()
            .id("chat-view")
            .relative()
            .size_full()
            .min_h_0()
            .overflow_hidden()
            .bg(theme.background)
            .child(
                div()
                    .id("chat-view-body")
                    .flex_1()
                    .min_h_0()
                    .child(body),
            )
            .child(
                div()
                    .id("chat-view-message-input")
                    .flex_shrink_0()
                    .w_full()
                    .max_w(px(760.))
                    .mx_auto()
                    .child(self.message_input.clone()),
            )
    }
}
