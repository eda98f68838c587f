use std::sync::Arc;

use geminis_chat::SettingsStore;
use gpui::*;
use gpui_component::{Root, ThemeRegistry};

use ui::app::{GeminisShell, Quit, ToggleTheme};
use ui::theme::{apply_theme, default_themes_path};

/// Application entry point.
///
/// Bootstraps GPUI with bundled assets, the tokio bridge used for backend calls,
/// gpui-component and the settings store, then opens the single chat window and
/// starts the theme watcher.
fn main() {
    tracing_subscriber::fmt::init();

    let app = Application::new().with_assets(gpui_component_assets::Assets);

    app.run(|cx| {
        gpui_tokio_bridge::init(cx);

        // Must run before any Root is created.
        gpui_component::init(cx);

        let settings = Arc::new(SettingsStore::load());
        tracing::info!(config_path = ?settings.config_path(), "settings loaded");

        apply_theme(&settings.settings(), None, cx);

        cx.on_action(|_: &Quit, cx| {
            cx.quit();
        });

        cx.bind_keys([
            KeyBinding::new("cmd-q", Quit, None),
            KeyBinding::new("cmd-shift-l", ToggleTheme, None),
        ]);

        cx.spawn(async move |cx| {
            cx.update(|cx| {
                let options = WindowOptions {
                    window_bounds: Some(WindowBounds::Windowed(Bounds::centered(
                        None,
                        size(px(960.), px(760.)),
                        cx,
                    ))),
                    titlebar: Some(TitlebarOptions {
                        appears_transparent: true,
                        traffic_light_position: Some(point(px(9.), px(9.))),
                        ..Default::default()
                    }),
                    // Linux/FreeBSD draw their own title area.
                    #[cfg(any(target_os = "linux", target_os = "freebsd"))]
                    window_decorations: Some(WindowDecorations::Client),
                    #[cfg(not(any(target_os = "linux", target_os = "freebsd")))]
                    window_decorations: None,
                    ..Default::default()
                };

                // Root is required by gpui-component for overlays.
                let window_settings = settings.clone();
                let mut shell_handle = None;
                let opened = cx.open_window(options, |window, cx| {
                    let shell = cx.new(|cx| GeminisShell::new(window_settings, window, cx));
                    shell_handle = Some(shell.downgrade());
                    cx.new(|cx| Root::new(shell, window, cx))
                });

                match opened {
                    Ok(_) => cx.activate(true),
                    Err(error) => {
                        tracing::error!("failed to open main window: {}", error);
                        cx.quit();
                        return;
                    }
                }

                // A missing themes directory is not fatal; the built-in light/dark themes remain.
                if let Err(err) = ThemeRegistry::watch_dir(default_themes_path(), cx, move |cx| {
                    apply_theme(&settings.reload(), None, cx);
                    if let Some(shell) = shell_handle.as_ref().and_then(|shell| shell.upgrade()) {
                        shell.update(cx, |shell, cx| shell.settings_reloaded(cx));
                    }
                    tracing::info!("theme directory reloaded");
                }) {
                    tracing::warn!(
                        "failed to watch themes directory: {}. using default themes",
                        err
                    );
                }
            })
        })
        .detach();
    });
}
