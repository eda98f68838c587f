use gpui::*;
use gpui_component::{
    ActiveTheme, IconName, Sizable,
    button::{Button, ButtonVariants},
    input::{Input, InputEvent, InputState},
    v_flex,
};

use geminis_chat::ComposerView;

use crate::chat::events::{DraftChanged, Submit};

pub struct MessageInput {
    input_state: Entity<InputState>,
    input_enabled: bool,
    send_enabled: bool,
    pending_newline: bool,
}

impl EventEmitter<Submit> for MessageInput {}
impl EventEmitter<DraftChanged> for MessageInput {}

impl MessageInput {
    pub fn new(placeholder: SharedString, window: &mut Window, cx: &mut Context<Self>) -> Self {
        let input_state = cx.new(|cx| {
            InputState::new(window, cx)
                .placeholder(placeholder)
                .clean_on_escape()
                .auto_grow(1, 8)
        });

        cx.subscribe_in(
            &input_state,
            window,
            |this, state, event: &InputEvent, window, cx| match event {
                InputEvent::Change { .. } => {
                    let text = state.read(cx).value().to_string();
                    cx.emit(DraftChanged { text });
                    cx.notify();
                }
                InputEvent::PressEnter { secondary } => {
                    if *secondary {
                        this.pending_newline = false;
                        return;
                    }

                    if this.pending_newline {
                        // Shift+Enter already inserted the newline; swallow the enter that follows it.
                        this.pending_newline = false;
                    } else {
                        this.trim_trailing_newline(window, cx);
                        this.handle_submit(cx);
                    }
                }
                _ => {}
            },
        )
        .detach();

        Self {
            input_state,
            input_enabled: true,
            send_enabled: false,
            pending_newline: false,
        }
    }

    /// Applies the enabled flags of the projected composer.
    pub fn sync(&mut self, composer: &ComposerView, cx: &mut Context<Self>) {
        self.input_enabled = composer.input_enabled;
        self.send_enabled = composer.send_enabled;
        if !self.input_enabled {
            self.pending_newline = false;
        }
        cx.notify();
    }

    /// Replaces the visible text, e.g. after a prefill or an accepted submission.
    pub fn set_draft(&mut self, text: &str, window: &mut Window, cx: &mut Context<Self>) {
        let current = self.input_state.read(cx).value().to_string();
        if current != text {
            self.input_state.update(cx, |state, cx| {
                state.set_value(text.to_string(), window, cx);
            });
        }
        self.pending_newline = false;
    }

    pub fn focus(&self, window: &mut Window, cx: &mut Context<Self>) {
        self.input_state.update(cx, |state, cx| {
            state.focus(window, cx);
        });
    }

    fn handle_shift_enter(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        if !self.input_enabled {
            return;
        }

        self.pending_newline = true;
        self.input_state.update(cx, |state, cx| {
            state.insert("\n", window, cx);
        });
        cx.notify();
    }

    fn trim_trailing_newline(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        self.input_state.update(cx, |state, cx| {
            let value = state.value().to_string();
            if let Some(trimmed) = value.strip_suffix('\n') {
                state.set_value(trimmed.to_string(), window, cx);
            }
        });
    }

    fn handle_submit(&mut self, cx: &mut Context<Self>) {
        if !self.input_enabled {
            return;
        }

        let content = self.input_state.read(cx).value().to_string();
        if content.trim().is_empty() {
            return;
        }

        // The chat view clears the input once the session accepts the turn.
        cx.emit(Submit::new(content));
    }
}

impl Render for MessageInput {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let has_text = !self.input_state.read(cx).value().trim().is_empty();
        let can_send = self.send_enabled && self.input_enabled && has_text;

        v_flex()
            .bg(theme.background)
            .gap_2()
            .p_3()
            .child(
                div()
                    .w_full()
                    .px_3()
                    .py_2()
                    .rounded_xl()
                    .border_1()
                    .border_color(theme.border)
                    .bg(theme.background)
                    .on_key_down(cx.listener(|this, event: &KeyDownEvent, window, cx| {
                        if event.keystroke.key == "enter" && event.keystroke.modifiers.shift {
                            this.handle_shift_enter(window, cx);
                        }
                    }))
                    .child(
                        Input::new(&self.input_state)
                            .w_full()
                            .disabled(!self.input_enabled),
                    ),
            )
            .child(
                div().w_full().flex().justify_end().child(
                    Button::new("send")
                        .small()
                        .primary()
                        .icon(IconName::ArrowUp)
                        .child("Send")
                        .disabled(!can_send)
                        .on_click(cx.listener(|this, _, _window, cx| {
                            this.handle_submit(cx);
                        })),
                ),
            )
    }
}
