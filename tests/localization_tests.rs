//! # Localization Tests
//!
//! Message retrieval and formatting for both bundled languages.

use photo_reports::localization::LocalizationManager;
use std::collections::HashMap;

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_localization() -> LocalizationManager {
        LocalizationManager::new().expect("Failed to create localization manager")
    }

    #[test]
    fn test_get_message_existing_key() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("help-message", "en", None);
        assert!(message.contains("Commands"));
        assert!(message.contains("/sync_events"));
    }

    #[test]
    fn test_get_message_nonexistent_key() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("nonexistent-key", "en", None);
        assert!(message.starts_with("Missing translation:"));
    }

    #[test]
    fn test_unsupported_language_falls_back_to_russian() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("help-message", "unsupported", None);
        let russian = manager.get_message_in_language("help-message", "ru", None);
        assert_eq!(message, russian);
        assert!(message.contains("Команды"));
    }

    #[test]
    fn test_get_message_with_args() {
        let manager = setup_localization();

        let mut args = HashMap::new();
        args.insert("path", "/Reports");

        let message = manager.get_message_in_language("setpath-done", "en", Some(&args));
        assert!(message.contains("/Reports"));
        // No bidi isolation marks around arguments
        assert!(!message.contains('\u{2068}'));
    }

    #[test]
    fn test_get_message_missing_args() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("setpath-done", "en", None);
        assert!(!message.is_empty());
    }

    #[test]
    fn test_every_english_message_has_a_russian_counterpart() {
        let manager = setup_localization();
        let english = include_str!("../locales/en/main.ftl");

        let keys = english
            .lines()
            .filter(|line| !line.starts_with(' ') && !line.starts_with('#'))
            .filter_map(|line| line.split_once(" =").map(|(key, _)| key.trim()))
            .filter(|key| !key.is_empty());

        for key in keys {
            let message = manager.get_message_in_language(key, "ru", None);
            assert!(!message.starts_with("Missing translation:"), "missing ru message {key}");
        }
    }

    #[test]
    fn test_language_detection() {
        let manager = setup_localization();

        assert_eq!(manager.resolve_language(Some("en")), "en");
        assert_eq!(manager.resolve_language(Some("en-GB")), "en");
        assert_eq!(manager.resolve_language(Some("ru")), "ru");
        assert_eq!(manager.resolve_language(Some("uk")), "ru");
        assert_eq!(manager.resolve_language(None), "ru");
    }

    #[test]
    fn test_convenience_functions() {
        photo_reports::localization::init_localization().expect("Failed to initialize localization");

        let message = photo_reports::localization::t_lang("category-raids", Some("en"));
        assert_eq!(message, "Raids, captures");

        let args = vec![("path", "/Отчеты")];
        let message = photo_reports::localization::t_args_lang("setpath-done", &args, Some("ru"));
        assert!(message.contains("/Отчеты"));
    }
}
