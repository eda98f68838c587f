use std::path::PathBuf;

use geminis_chat::{Settings, ThemePreference};
use gpui::{App, SharedString, Window};
use gpui_component::{Theme, ThemeMode, ThemeRegistry};

/// Directory watched for theme files.
pub fn default_themes_path() -> PathBuf {
    PathBuf::from("./themes")
}

pub fn theme_mode(preference: ThemePreference) -> ThemeMode {
    match preference {
        ThemePreference::Light => ThemeMode::Light,
        ThemePreference::Dark => ThemeMode::Dark,
    }
}

/// Applies the named theme when the registry has it, otherwise the plain light/dark mode.
pub fn apply_theme(settings: &Settings, window: Option<&mut Window>, cx: &mut App) {
    let mode = theme_mode(settings.theme_mode);

    if !settings.theme_name.is_empty()
        && let Some(theme_config) = ThemeRegistry::global(cx)
            .themes()
            .get(&SharedString::from(settings.theme_name.clone()))
            .cloned()
    {
        // A named theme only replaces the slot matching its own mode.
        let theme = Theme::global_mut(cx);
        if theme_config.mode.is_dark() {
            theme.dark_theme = theme_config;
        } else {
            theme.light_theme = theme_config;
        }
    }

    tracing::debug!(mode = settings.theme_mode.name(), theme = %settings.theme_name, "applying theme");
    Theme::change(mode, window, cx);
}
