//! Cached system locale state.

use serde_json::Value;
use tracing::warn;

/// UI locale reported when the settings service has not yet answered or the
/// locale value carries no UI entry.
pub const DEFAULT_UI_LOCALE: &str = "en-US";

/// The last `localeInfo` value reported by the settings service.
///
/// Mutated only from the event loop, on settings callbacks; broadcast to
/// every live plugin after each update.
#[derive(Debug, Default)]
pub struct LocaleState {
    info: Value,
}

impl LocaleState {
    pub fn new() -> Self {
        Self { info: Value::Null }
    }

    /// Stores a freshly reported locale value.
    pub fn update(&mut self, info: Value) {
        self.info = info;
    }

    /// The full structured locale value. `Null` before the first settings
    /// reply.
    pub fn info(&self) -> &Value {
        &self.info
    }

    /// The UI locale string (`locales.UI`), or [`DEFAULT_UI_LOCALE`] when the
    /// stored value has none.
    pub fn ui_locale(&self) -> String {
        match self.info.pointer("/locales/UI").and_then(Value::as_str) {
            Some(ui) => ui.to_string(),
            None => {
                if !self.info.is_null() {
                    warn!(locale = %self.info, "Could not read UI locale, using default");
                }
                DEFAULT_UI_LOCALE.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_before_first_update() {
        let state = LocaleState::new();
        assert_eq!(state.ui_locale(), DEFAULT_UI_LOCALE);
        assert!(state.info().is_null());
    }

    #[test]
    fn test_reads_ui_locale() {
        let mut state = LocaleState::new();
        state.update(json!({"locales": {"UI": "fr-FR", "TV": "fr-FR"}}));
        assert_eq!(state.ui_locale(), "fr-FR");
    }

    #[test]
    fn test_falls_back_when_ui_entry_missing() {
        let mut state = LocaleState::new();
        state.update(json!({"timezone": "Europe/Paris"}));
        assert_eq!(state.ui_locale(), DEFAULT_UI_LOCALE);
    }
}
