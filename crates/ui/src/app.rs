use std::sync::Arc;

use geminis_chat::SettingsStore;
use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::{
    ActiveTheme, IconName, Sizable,
    button::{Button, ButtonVariants},
    h_flex, v_flex,
};

use crate::chat::ChatView;
use crate::theme::apply_theme;

#[cfg(target_os = "macos")]
const WINDOW_TOOLBAR_LEFT_SAFE_PADDING: f32 = 78.0;
#[cfg(not(target_os = "macos"))]
const WINDOW_TOOLBAR_LEFT_SAFE_PADDING: f32 = 16.0;
#[cfg(target_os = "windows")]
const WINDOW_TOOLBAR_RIGHT_SAFE_PADDING: f32 = 120.0;
#[cfg(not(target_os = "windows"))]
const WINDOW_TOOLBAR_RIGHT_SAFE_PADDING: f32 = 16.0;
const AVATAR_SIZE: f32 = 28.0;

gpui::actions!(shell, [ToggleTheme, Quit]);

/// Title bar height that follows the user's rem size.
fn window_toolbar_height(window: &Window) -> Pixels {
    (2.25 * window.rem_size()).max(px(40.0))
}

/// Window root: header with title, theme toggle and avatar above the chat view.
pub struct GeminisShell {
    settings: Arc<SettingsStore>,
    chat_view: Entity<ChatView>,
    title_bar_should_move: bool,
}

impl GeminisShell {
    pub fn new(settings: Arc<SettingsStore>, window: &mut Window, cx: &mut Context<Self>) -> Self {
        let chat_settings = settings.clone();
        let chat_view = cx.new(|cx| ChatView::new(chat_settings, window, cx));

        Self {
            settings,
            chat_view,
            title_bar_should_move: false,
        }
    }

    /// Flips light/dark, persists the choice and applies it to the window.
    fn toggle_theme(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        let next_mode = self.settings.settings().theme_mode.toggled();

        if let Err(error) = self
            .settings
            .update(|settings| settings.theme_mode = next_mode)
        {
            tracing::error!("failed to save theme preference: {}", error);
        }

        apply_theme(&self.settings.settings(), Some(window), cx);
        self.settings_reloaded(cx);
    }

    /// Pushes the current settings snapshot into the title bar and chat view.
    pub fn settings_reloaded(&mut self, cx: &mut Context<Self>) {
        self.chat_view.update(cx, |chat_view, cx| chat_view.refresh(cx));
        cx.notify();
    }
}

impl Render for GeminisShell {
    fn render(&mut self, window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let toolbar_height = window_toolbar_height(window);

        v_flex()
            .id("app-shell")
            .size_full()
            .bg(theme.background)
            .on_action(cx.listener(|this, _: &ToggleTheme, window, cx| {
                this.toggle_theme(window, cx);
            }))
            .child(self.render_top_bar(window, toolbar_height, cx))
            .child(
                div()
                    .id("main-content")
                    .flex_1()
                    .w_full()
                    .min_h_0()
                    .overflow_hidden()
                    .child(self.chat_view.clone()),
            )
    }
}

impl GeminisShell {
    fn render_top_bar(
        &self,
        window: &Window,
        toolbar_height: Pixels,
        cx: &Context<Self>,
    ) -> impl IntoElement {
        let theme = cx.theme();
        let (title, avatar_initial) = {
            let screen = self.chat_view.read(cx).screen();
            (screen.title.clone(), screen.avatar_initial.clone())
        };
        let theme_icon = if self.settings.settings().theme_mode.is_dark() {
            IconName::Sun
        } else {
            IconName::Moon
        };

        h_flex()
            .id("app-top-bar")
            .window_control_area(WindowControlArea::Drag)
            .on_mouse_down_out(cx.listener(|this, _, _window, _cx| {
                this.title_bar_should_move = false;
            }))
            .on_mouse_up(
                MouseButton::Left,
                cx.listener(|this, _, _window, _cx| {
                    this.title_bar_should_move = false;
                }),
            )
            .on_mouse_down(
                MouseButton::Left,
                cx.listener(|this, _, _window, _cx| {
                    this.title_bar_should_move = true;
                }),
            )
            .on_mouse_move(cx.listener(|this, _, window, _cx| {
                if this.title_bar_should_move {
                    this.title_bar_should_move = false;
                    window.start_window_move();
                }
            }))
            .w_full()
            .h(toolbar_height)
            .flex_shrink_0()
            .pl(px(WINDOW_TOOLBAR_LEFT_SAFE_PADDING))
            .pr(px(WINDOW_TOOLBAR_RIGHT_SAFE_PADDING))
            .items_center()
            .justify_between()
            .bg(theme.background)
            .border_b_1()
            .border_color(theme.border)
            .child(
                div()
                    .id("app-title")
                    .text_lg()
                    .font_weight(FontWeight::SEMIBOLD)
                    .text_color(theme.foreground)
                    .child(title),
            )
            .child(
                h_flex()
                    .gap_2()
                    .items_center()
                    .child(
                        Button::new("toggle-theme")
                            .ghost()
                            .small()
                            .icon(theme_icon)
                            .on_click(cx.listener(|this, _, window, cx| {
                                this.toggle_theme(window, cx);
                            })),
                    )
                    .child(
                        div()
                            .id("user-avatar")
                            .size(px(AVATAR_SIZE))
                            .rounded_full()
                            .bg(theme.primary)
                            .text_color(theme.primary_foreground)
                            .text_sm()
                            .flex()
                            .items_center()
                            .justify_center()
                            .child(avatar_initial),
                    )
                    .child(self.render_linux_window_controls(window, cx)),
            )
            .when(
                cfg!(target_os = "linux") && window.window_controls().window_menu,
                |title_bar| {
                    title_bar.on_mouse_down(MouseButton::Right, |event, window, _| {
                        window.show_window_menu(event.position);
                    })
                },
            )
    }

    fn render_linux_window_controls(&self, window: &Window, cx: &Context<Self>) -> AnyElement {
        #[cfg(target_os = "linux")]
        {
            let maximize_icon = if window.is_maximized() {
                IconName::WindowRestore
            } else {
                IconName::WindowMaximize
            };

            h_flex()
                .id("linux-window-controls")
                .items_center()
                // Keep control clicks out of the title bar drag and double-click gestures.
                .on_mouse_down(MouseButton::Left, |_, _, cx| cx.stop_propagation())
                .on_mouse_down(MouseButton::Right, |_, _, cx| cx.stop_propagation())
                .gap_2()
                .ml_2()
                .child(
                    Button::new("linux-window-minimize")
                        .ghost()
                        .small()
                        .icon(IconName::WindowMinimize)
                        .on_click(cx.listener(|_, _, window, _| {
                            window.minimize_window();
                        })),
                )
                .child(
                    Button::new("linux-window-maximize")
                        .ghost()
                        .small()
                        .icon(maximize_icon)
                        .on_click(cx.listener(|_, _, window, _| {
                            window.zoom_window();
                        })),
                )
                .child(
                    Button::new("linux-window-close")
                        .ghost()
                        .small()
                        .icon(IconName::WindowClose)
                        .on_click(cx.listener(|_, _, window, _| {
                            window.remove_window();
                        })),
                )
                .into_any_element()
        }

        #[cfg(not(target_os = "linux"))]
        {
            let _ = (window, cx);
            div().into_any_element()
        }
    }
}
