use gpui::*;
use gpui_component::{
    ActiveTheme, Sizable,
    button::{Button, ButtonVariants},
    h_flex, v_flex,
};

use geminis_chat::Suggestion;

use crate::chat::events::SuggestionPicked;

/// Greeting shown before the first turn, with one chip per suggestion.
pub struct WelcomePanel {
    greeting: SharedString,
    suggestions: Vec<Suggestion>,
}

impl EventEmitter<SuggestionPicked> for WelcomePanel {}

impl WelcomePanel {
    pub fn new(_cx: &mut Context<Self>) -> Self {
        Self {
            greeting: SharedString::default(),
            suggestions: Vec::new(),
        }
    }

    pub fn set_content(
        &mut self,
        greeting: &str,
        suggestions: &[Suggestion],
        cx: &mut Context<Self>,
    ) {
        if self.greeting.as_ref() == greeting && self.suggestions.as_slice() == suggestions {
            return;
        }

        self.greeting = SharedString::from(greeting.to_string());
        self.suggestions = suggestions.to_vec();
        cx.notify();
    }

    fn pick(&mut self, index: usize, cx: &mut Context<Self>) {
        if let Some(suggestion) = self.suggestions.get(index) {
            cx.emit(SuggestionPicked {
                prompt: suggestion.prompt.clone(),
            });
        }
    }
}

impl Render for WelcomePanel {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        let chips = self
            .suggestions
            .iter()
            .enumerate()
            .map(|(index, suggestion)| {
                Button::new(("welcome-suggestion", index))
                    .outline()
                    .small()
                    .child(suggestion.label.clone())
                    .on_click(cx.listener(move |this, _, _window, cx| {
                        this.pick(index, cx);
                    }))
            })
            .collect::<Vec<_>>();

        v_flex()
            .id("welcome-panel")
            .size_full()
            .items_center()
            .justify_center()
            .gap_6()
            .px_4()
            .child(
                div()
                    .text_3xl()
                    .font_weight(FontWeight::SEMIBOLD)
                    .text_color(theme.foreground)
                    .child(self.greeting.clone()),
            )
            .child(
                h_flex()
                    .flex_wrap()
                    .justify_center()
                    .gap_2()
                    .children(chips),
            )
    }
}
