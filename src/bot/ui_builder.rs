//! UI Builder module for creating keyboards and formatting messages
//!
//! Every text produced here is HTML; dynamic values are escaped.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup};
use teloxide::utils::html::escape;

use crate::categories::{FolderKey, TwoStageKind};
use crate::clock::is_night_window;
use crate::errors::DiskResult;
use crate::events::EndResolution;
use crate::localization::{t_args_lang, t_lang};
use crate::settings::UserSettings;
use crate::stage_files::{EventSummary, Stage};

use super::callback_handler::CallbackAction;
use super::dialogue_manager::{PendingReport, SingleSaved, StageOverview, StageSaved};

/// Photos listed by `/list_photos` before the rest is summarized
pub const PHOTO_LIST_LIMIT: usize = 10;

fn button(text: String, action: CallbackAction) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, action.data())
}

/// Persistent reply keyboard with the settings button
pub fn settings_reply_keyboard(language_code: Option<&str>) -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(t_lang(
        "settings-keyboard-label",
        language_code,
    ))]])
}

/// Whether a text is the settings button label in any language
pub fn is_settings_label(text: &str) -> bool {
    ["ru", "en"]
        .into_iter()
        .any(|language| t_lang("settings-keyboard-label", Some(language)) == text.trim())
}

pub fn settings_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    let label = |key: &str| t_lang(key, language_code);
    InlineKeyboardMarkup::new(vec![
        vec![
            button(label("button-auth"), CallbackAction::AuthButton),
            button(label("button-change-path"), CallbackAction::ChangePath),
        ],
        vec![
            button(label("button-test"), CallbackAction::TestConnection),
            button(label("button-current-settings"), CallbackAction::CurrentSettings),
        ],
        vec![button(label("button-disconnect"), CallbackAction::DisconnectButton)],
    ])
}

pub fn step1_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    let label = |key: &str| t_lang(key, language_code);
    InlineKeyboardMarkup::new(vec![
        vec![button(label("button-punishments"), CallbackAction::CategoryPunishments)],
        vec![button(label("button-mp"), CallbackAction::CategoryMp)],
        vec![button(label("button-mp-help"), CallbackAction::CategoryMpHelp)],
        vec![button(label("button-events"), CallbackAction::CategoryEvents)],
        vec![button(label("button-cancel"), CallbackAction::CancelWizard)],
    ])
}

pub fn step2_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    let label = |key: &str| t_lang(key, language_code);
    InlineKeyboardMarkup::new(vec![
        vec![button(label("button-raids"), CallbackAction::EventRaids)],
        vec![button(label("button-supplies"), CallbackAction::EventSupplies)],
        vec![button(label("button-back"), CallbackAction::BackToStep1)],
        vec![button(label("button-cancel"), CallbackAction::CancelWizard)],
    ])
}

/// Start/end keyboard; MP goes back to the first step, events to the second
pub fn stage_keyboard(kind: TwoStageKind, language_code: Option<&str>) -> InlineKeyboardMarkup {
    let label = |key: &str| t_lang(key, language_code);
    let back = match kind {
        TwoStageKind::Mp => CallbackAction::BackToStep1,
        TwoStageKind::Raids | TwoStageKind::Supplies => CallbackAction::BackToStep2,
    };
    InlineKeyboardMarkup::new(vec![
        vec![
            button(label("button-stage-start"), CallbackAction::StageStart),
            button(label("button-stage-end"), CallbackAction::StageEnd),
        ],
        vec![button(label("button-back"), back)],
        vec![button(label("button-cancel"), CallbackAction::CancelWizard)],
    ])
}

pub fn category_display(kind: TwoStageKind, language_code: Option<&str>) -> String {
    t_lang(&format!("category-{}", kind.key()), language_code)
}

pub fn format_step1_prompt(language_code: Option<&str>) -> String {
    t_lang("step1-prompt", language_code)
}

/// Event type prompt naming the folders that apply at `started_at`
pub fn format_step2_prompt(started_at: chrono::DateTime<chrono::Utc>, language_code: Option<&str>) -> String {
    let night = is_night_window(started_at);
    let folder = |kind: TwoStageKind| match (night, kind.night_folder()) {
        (true, Some(name)) => name,
        _ => kind.day_folder(),
    };
    t_args_lang(
        "step2-prompt",
        &[
            ("raids", escape(folder(TwoStageKind::Raids)).as_str()),
            ("supplies", escape(folder(TwoStageKind::Supplies)).as_str()),
        ],
        language_code,
    )
}

pub fn format_stage_prompt(kind: TwoStageKind, overview: &StageOverview, language_code: Option<&str>) -> String {
    let icon = match kind {
        TwoStageKind::Mp => "📋",
        TwoStageKind::Raids | TwoStageKind::Supplies => "⚡",
    };
    let mut text = t_args_lang(
        "stage-prompt",
        &[("icon", icon), ("category", escape(&overview.folder.folder_name).as_str())],
        language_code,
    );
    text.push_str("\n\n");

    let mut has_hint = false;
    if let Some(number) = overview.pending {
        text.push_str(&t_args_lang("stage-pending", &[("number", number.to_string().as_str())], language_code));
        text.push('\n');
        has_hint = true;
    }
    if let Some(unfinished) = overview.unfinished.as_ref().filter(|numbers| !numbers.is_empty()) {
        let numbers = unfinished
            .iter()
            .map(|number| number.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        text.push_str(&t_args_lang("stage-unfinished", &[("numbers", numbers.as_str())], language_code));
        text.push('\n');
        has_hint = true;
    }
    if has_hint {
        text.push('\n');
    }

    text.push_str(&t_lang("stage-legend", language_code));
    text
}

pub fn format_single_saved(saved: &SingleSaved, language_code: Option<&str>) -> String {
    t_args_lang(
        "saved-single",
        &[
            ("category", escape(&saved.folder.folder_name).as_str()),
            ("week", escape(&saved.folder.week_label).as_str()),
            ("file", escape(&saved.file_name).as_str()),
        ],
        language_code,
    )
}

pub fn format_stage_saved(saved: &StageSaved, language_code: Option<&str>) -> String {
    let stage = match saved.stage {
        Stage::Start => t_lang("stage-name-start", language_code),
        Stage::End => t_lang("stage-name-end", language_code),
    };
    let mut text = t_args_lang(
        "saved-stage",
        &[
            ("category", escape(&saved.folder.folder_name).as_str()),
            ("week", escape(&saved.folder.week_label).as_str()),
            ("number", saved.number.to_string().as_str()),
            ("stage", stage.as_str()),
            ("file", escape(&saved.file_name).as_str()),
        ],
        language_code,
    );
    text.push_str("\n\n");

    let footer = match (saved.stage, saved.resolution) {
        (Stage::Start, _) => t_lang("saved-footer-start", language_code),
        (Stage::End, Some(EndResolution::SupersededCompleted)) => match saved.superseded {
            Some(number) => t_args_lang(
                "saved-footer-superseded",
                &[("number", number.to_string().as_str())],
                language_code,
            ),
            None => t_lang("saved-footer-no-start", language_code),
        },
        (Stage::End, Some(resolution)) if resolution.is_continuation() => {
            t_lang("saved-footer-complete", language_code)
        }
        (Stage::End, _) => t_lang("saved-footer-no-start", language_code),
    };
    text.push_str(&footer);
    text
}

/// Toast shown when an end did not close an existing event
pub fn end_resolution_toast(resolution: Option<EndResolution>, language_code: Option<&str>) -> Option<String> {
    match resolution? {
        EndResolution::SupersededCompleted => Some(t_lang("toast-superseded", language_code)),
        EndResolution::Fresh => Some(t_lang("toast-no-start", language_code)),
        EndResolution::Continuation | EndResolution::Orphaned => None,
    }
}

pub fn format_settings(settings: &UserSettings, language_code: Option<&str>) -> String {
    let status = if settings.token().is_some() {
        t_lang("token-set", language_code)
    } else {
        t_lang("token-not-set", language_code)
    };
    let preview = settings
        .token_preview()
        .map(|preview| escape(&preview))
        .unwrap_or_else(|| t_lang("token-preview-none", language_code));
    t_args_lang(
        "settings-message",
        &[
            ("status", status.as_str()),
            ("preview", preview.as_str()),
            ("path", escape(&settings.yandex_path).as_str()),
        ],
        language_code,
    )
}

pub fn format_sync_report(report: &[(FolderKey, DiskResult<EventSummary>)], language_code: Option<&str>) -> String {
    let mut text = t_lang("sync-title", language_code);
    for (folder, summary) in report {
        text.push_str("\n\n");
        let name = escape(&folder.folder_name);
        let section = match summary {
            Ok(summary) => t_args_lang(
                "sync-folder",
                &[
                    ("folder", name.as_str()),
                    ("total", summary.total.to_string().as_str()),
                    ("completed", summary.completed.to_string().as_str()),
                    ("incomplete", summary.incomplete.to_string().as_str()),
                    ("end_only", summary.end_only.to_string().as_str()),
                ],
                language_code,
            ),
            Err(e) => t_args_lang(
                "sync-folder-error",
                &[("folder", name.as_str()), ("error", escape(&e.to_string()).as_str())],
                language_code,
            ),
        };
        text.push_str(&section);
    }
    text
}

pub fn format_pending_report(
    report: &PendingReport,
    now: chrono::DateTime<chrono::Utc>,
    language_code: Option<&str>,
) -> String {
    if report.is_empty() {
        return t_lang("pending-none", language_code);
    }

    let mut sections = vec![t_lang("pending-title", language_code)];
    for entry in &report.memory {
        sections.push(t_args_lang(
            "pending-memory",
            &[
                ("number", entry.event_number.to_string().as_str()),
                ("category", category_display(entry.category, language_code).as_str()),
                ("minutes", entry.age_minutes(now).to_string().as_str()),
            ],
            language_code,
        ));
    }
    for (kind, folder, numbers) in &report.on_disk {
        for number in numbers {
            sections.push(t_args_lang(
                "pending-disk",
                &[
                    ("number", number.to_string().as_str()),
                    ("category", category_display(*kind, language_code).as_str()),
                    ("path", escape(&folder.path()).as_str()),
                ],
                language_code,
            ));
        }
    }
    sections.push(t_lang("pending-footer", language_code));
    sections.join("\n\n")
}

pub fn format_photo_list(photos: &[String], language_code: Option<&str>) -> String {
    if photos.is_empty() {
        return t_lang("photos-none", language_code);
    }
    let mut text = t_args_lang("photos-title", &[("count", photos.len().to_string().as_str())], language_code);
    text.push_str("\n\n");
    let lines: Vec<String> = photos
        .iter()
        .take(PHOTO_LIST_LIMIT)
        .enumerate()
        .map(|(i, name)| format!("{}. {}", i + 1, escape(name)))
        .collect();
    text.push_str(&lines.join("\n"));
    if photos.len() > PHOTO_LIST_LIMIT {
        text.push_str("\n\n");
        text.push_str(&t_args_lang(
            "photos-more",
            &[("count", (photos.len() - PHOTO_LIST_LIMIT).to_string().as_str())],
            language_code,
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::FolderKey;

    fn saved(stage: Stage, resolution: Option<EndResolution>) -> StageSaved {
        StageSaved {
            kind: TwoStageKind::Raids,
            stage,
            number: 5,
            resolution,
            superseded: None,
            folder: FolderKey::new("/RMRPreport", "10.03.25 – 16.03.25", "Налёты, захваты"),
            file_name: "5-2.jpg".to_string(),
        }
    }

    #[test]
    fn test_stage_saved_footer_depends_on_resolution() {
        let text = format_stage_saved(&saved(Stage::End, Some(EndResolution::Continuation)), Some("en"));
        assert!(text.contains("Event fully saved"));
        assert!(text.contains("#5"));

        let text = format_stage_saved(&saved(Stage::End, Some(EndResolution::Fresh)), Some("en"));
        assert!(text.contains("without a start"));

        let text = format_stage_saved(&saved(Stage::Start, None), Some("en"));
        assert!(text.contains("end screenshot"));
    }

    #[test]
    fn test_toast_only_for_new_events() {
        assert!(end_resolution_toast(Some(EndResolution::Orphaned), None).is_none());
        assert!(end_resolution_toast(None, None).is_none());
        assert!(end_resolution_toast(Some(EndResolution::Fresh), None).is_some());
        assert!(end_resolution_toast(Some(EndResolution::SupersededCompleted), None).is_some());
    }

    #[test]
    fn test_photo_list_is_truncated() {
        let photos: Vec<String> = (0..12).map(|i| format!("photo_{i}.jpg")).collect();
        let text = format_photo_list(&photos, Some("en"));
        assert!(text.contains("(12)"));
        assert!(text.contains("10. photo_9.jpg"));
        assert!(!text.contains("photo_10.jpg"));
        assert!(text.contains("and 2 more"));
    }

    #[test]
    fn test_settings_labels() {
        assert!(is_settings_label("⚙️ Настройки"));
        assert!(is_settings_label("⚙️ Settings"));
        assert!(!is_settings_label("Settings"));
    }
}
