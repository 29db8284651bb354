//! Callback Handler module for processing inline keyboard callback queries

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, InlineKeyboardMarkup, MessageId, ParseMode};
use teloxide::utils::html::escape;
use tracing::{debug, warn};

use crate::app::App;
use crate::categories::{SingleShotKind, TwoStageKind};
use crate::localization::{t_args_lang, t_lang};
use crate::stage_files::Stage;
use crate::wizard::{WizardState, WizardStep};

use super::dialogue_manager::{save_single_shot, save_two_stage, stage_overview};
use super::message_handler::{handle_disconnect, handle_test, send_html};
use super::ui_builder::{
    end_resolution_toast, format_settings, format_single_saved, format_stage_prompt, format_stage_saved,
    format_step1_prompt, format_step2_prompt, stage_keyboard, step1_keyboard, step2_keyboard,
};

/// Inline button actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    AuthButton,
    ChangePath,
    TestConnection,
    CurrentSettings,
    DisconnectButton,
    CategoryPunishments,
    CategoryMp,
    CategoryMpHelp,
    CategoryEvents,
    EventRaids,
    EventSupplies,
    StageStart,
    StageEnd,
    BackToStep1,
    BackToStep2,
    CancelWizard,
}

impl CallbackAction {
    const ALL: [CallbackAction; 16] = [
        CallbackAction::AuthButton,
        CallbackAction::ChangePath,
        CallbackAction::TestConnection,
        CallbackAction::CurrentSettings,
        CallbackAction::DisconnectButton,
        CallbackAction::CategoryPunishments,
        CallbackAction::CategoryMp,
        CallbackAction::CategoryMpHelp,
        CallbackAction::CategoryEvents,
        CallbackAction::EventRaids,
        CallbackAction::EventSupplies,
        CallbackAction::StageStart,
        CallbackAction::StageEnd,
        CallbackAction::BackToStep1,
        CallbackAction::BackToStep2,
        CallbackAction::CancelWizard,
    ];

    /// Callback data carried by the button
    pub fn data(self) -> &'static str {
        match self {
            CallbackAction::AuthButton => "auth_button",
            CallbackAction::ChangePath => "change_path",
            CallbackAction::TestConnection => "test_connection",
            CallbackAction::CurrentSettings => "current_settings",
            CallbackAction::DisconnectButton => "disconnect_button",
            CallbackAction::CategoryPunishments => "category_punishments",
            CallbackAction::CategoryMp => "category_mp",
            CallbackAction::CategoryMpHelp => "category_mp_help",
            CallbackAction::CategoryEvents => "category_events",
            CallbackAction::EventRaids => "event_raids",
            CallbackAction::EventSupplies => "event_supplies",
            CallbackAction::StageStart => "stage_start",
            CallbackAction::StageEnd => "stage_end",
            CallbackAction::BackToStep1 => "back_to_step1",
            CallbackAction::BackToStep2 => "back_to_step2",
            CallbackAction::CancelWizard => "cancel_wizard",
        }
    }

    /// Parse callback data; buttons from older keyboards
    /// (`event_start`, `mp_end`, ...) map to the stage actions
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "event_start" | "mp_start" => Some(CallbackAction::StageStart),
            "event_end" | "mp_end" => Some(CallbackAction::StageEnd),
            _ => Self::ALL.into_iter().find(|action| action.data() == data),
        }
    }
}

async fn answer(bot: &Bot, q: &CallbackQuery, text: Option<String>) {
    let mut request = bot.answer_callback_query(q.id.clone());
    if let Some(text) = text {
        request = request.text(text);
    }
    if let Err(e) = request.await {
        debug!(error = %e, "Could not answer callback query");
    }
}

/// Replace the wizard message, or send a new one if it was never recorded
async fn edit_wizard(bot: &Bot, state: &WizardState, text: String, keyboard: Option<InlineKeyboardMarkup>) {
    let chat_id = ChatId(state.chat_id);
    let result = match state.message_id {
        Some(message_id) => {
            let mut request = bot
                .edit_message_text(chat_id, MessageId(message_id), text)
                .parse_mode(ParseMode::Html);
            if let Some(keyboard) = keyboard {
                request = request.reply_markup(keyboard);
            }
            request.await.map(|_| ())
        }
        None => {
            let mut request = bot.send_message(chat_id, text).parse_mode(ParseMode::Html);
            if let Some(keyboard) = keyboard {
                request = request.reply_markup(keyboard);
            }
            request.await.map(|_| ())
        }
    };
    if let Err(e) = result {
        warn!(chat_id = state.chat_id, error = %e, "Failed to update wizard message");
    }
}

async fn show_step1(bot: &Bot, q: &CallbackQuery, app: &App, user_id: u64, language_code: Option<&str>) {
    match app.wizards.set_step(user_id, WizardStep::ChooseCategory) {
        Some(state) => {
            answer(bot, q, None).await;
            edit_wizard(bot, &state, format_step1_prompt(language_code), Some(step1_keyboard(language_code))).await;
        }
        None => answer(bot, q, Some(t_lang("wizard-missing", language_code))).await,
    }
}

async fn show_step2(bot: &Bot, q: &CallbackQuery, app: &App, user_id: u64, language_code: Option<&str>) {
    match app.wizards.set_step(user_id, WizardStep::ChooseEventKind) {
        Some(state) => {
            answer(bot, q, None).await;
            let text = format_step2_prompt(state.started_at, language_code);
            edit_wizard(bot, &state, text, Some(step2_keyboard(language_code))).await;
        }
        None => answer(bot, q, Some(t_lang("wizard-missing", language_code))).await,
    }
}

async fn show_stage_step(
    bot: &Bot,
    q: &CallbackQuery,
    app: &App,
    user_id: u64,
    kind: TwoStageKind,
    language_code: Option<&str>,
) {
    let Some(state) = app.wizards.set_step(user_id, WizardStep::ChooseStage(kind)) else {
        answer(bot, q, Some(t_lang("wizard-missing", language_code))).await;
        return;
    };
    answer(bot, q, None).await;

    let disk = app.disk_for(user_id).ok();
    let overview = stage_overview(app, disk.as_ref(), user_id, kind, &state).await;
    let text = format_stage_prompt(kind, &overview, language_code);
    edit_wizard(bot, &state, text, Some(stage_keyboard(kind, language_code))).await;
}

async fn save_single(
    bot: &Bot,
    q: &CallbackQuery,
    app: &App,
    user_id: u64,
    kind: SingleShotKind,
    language_code: Option<&str>,
) {
    let disk = match app.disk_for(user_id) {
        Ok(disk) => disk,
        Err(e) => {
            debug!(user_id, error = %e, "Save attempted without disk access");
            answer(bot, q, Some(t_lang("not-authorized", language_code))).await;
            return;
        }
    };
    // Taking the dialog first makes a second tap a no-op
    let Some(state) = app.wizards.finish(user_id) else {
        answer(bot, q, Some(t_lang("wizard-missing", language_code))).await;
        return;
    };
    answer(bot, q, None).await;

    let text = match save_single_shot(app, &disk, user_id, kind, &state).await {
        Ok(saved) => format_single_saved(&saved, language_code),
        Err(e) => t_args_lang("save-failed", &[("error", escape(&e.to_string()).as_str())], language_code),
    };
    edit_wizard(bot, &state, text, None).await;
}

async fn save_stage(
    bot: &Bot,
    q: &CallbackQuery,
    app: &App,
    user_id: u64,
    stage: Stage,
    language_code: Option<&str>,
) {
    let disk = match app.disk_for(user_id) {
        Ok(disk) => disk,
        Err(e) => {
            debug!(user_id, error = %e, "Save attempted without disk access");
            answer(bot, q, Some(t_lang("not-authorized", language_code))).await;
            return;
        }
    };
    // Category comes from the dialog actually taken, never from an earlier read
    let Some((kind, state)) = app.wizards.finish_stage(user_id) else {
        match app.wizards.get(user_id) {
            Some(state) => {
                debug!(user_id, step = ?state.step, "Stage button pressed outside the stage step");
                answer(bot, q, None).await;
            }
            None => answer(bot, q, Some(t_lang("wizard-missing", language_code))).await,
        }
        return;
    };
    if stage == Stage::Start {
        answer(bot, q, None).await;
    }

    let text = match save_two_stage(app, &disk, user_id, kind, stage, &state).await {
        Ok(saved) => {
            if stage == Stage::End {
                answer(bot, q, end_resolution_toast(saved.resolution, language_code)).await;
            }
            format_stage_saved(&saved, language_code)
        }
        Err(e) => {
            if stage == Stage::End {
                answer(bot, q, None).await;
            }
            t_args_lang("save-failed", &[("error", escape(&e.to_string()).as_str())], language_code)
        }
    };
    edit_wizard(bot, &state, text, None).await;
}

/// Handle callback queries from inline keyboards
pub async fn callback_handler(bot: Bot, q: CallbackQuery, app: Arc<App>) -> Result<()> {
    let user_id = q.from.id.0;
    let language_code = q.from.language_code.clone();
    let language_code = language_code.as_deref();

    let Some(action) = q.data.as_deref().and_then(CallbackAction::parse) else {
        debug!(user_id, data = ?q.data, "Unknown callback data");
        answer(&bot, &q, None).await;
        return Ok(());
    };
    debug!(user_id, ?action, "Received callback query from user");

    let chat_id = q
        .message
        .as_ref()
        .map(|message| message.chat().id)
        .unwrap_or(ChatId(user_id as i64));

    match action {
        CallbackAction::AuthButton => {
            answer(&bot, &q, None).await;
            send_html(&bot, chat_id, t_lang("auth-button-hint", language_code)).await?;
        }
        CallbackAction::ChangePath => {
            answer(&bot, &q, None).await;
            send_html(&bot, chat_id, t_lang("change-path-hint", language_code)).await?;
        }
        CallbackAction::TestConnection => {
            answer(&bot, &q, None).await;
            handle_test(&bot, chat_id, &app, user_id, language_code).await?;
        }
        CallbackAction::CurrentSettings => {
            answer(&bot, &q, None).await;
            let settings = app.settings.get(user_id);
            send_html(&bot, chat_id, format_settings(&settings, language_code)).await?;
        }
        CallbackAction::DisconnectButton => {
            answer(&bot, &q, None).await;
            handle_disconnect(&bot, chat_id, &app, user_id, language_code).await?;
        }
        CallbackAction::CategoryPunishments => {
            save_single(&bot, &q, &app, user_id, SingleShotKind::Punishments, language_code).await;
        }
        CallbackAction::CategoryMpHelp => {
            save_single(&bot, &q, &app, user_id, SingleShotKind::MpHelp, language_code).await;
        }
        CallbackAction::CategoryMp => {
            show_stage_step(&bot, &q, &app, user_id, TwoStageKind::Mp, language_code).await;
        }
        CallbackAction::EventRaids => {
            show_stage_step(&bot, &q, &app, user_id, TwoStageKind::Raids, language_code).await;
        }
        CallbackAction::EventSupplies => {
            show_stage_step(&bot, &q, &app, user_id, TwoStageKind::Supplies, language_code).await;
        }
        CallbackAction::CategoryEvents | CallbackAction::BackToStep2 => {
            show_step2(&bot, &q, &app, user_id, language_code).await;
        }
        CallbackAction::BackToStep1 => {
            show_step1(&bot, &q, &app, user_id, language_code).await;
        }
        CallbackAction::StageStart => {
            save_stage(&bot, &q, &app, user_id, Stage::Start, language_code).await;
        }
        CallbackAction::StageEnd => {
            save_stage(&bot, &q, &app, user_id, Stage::End, language_code).await;
        }
        CallbackAction::CancelWizard => {
            answer(&bot, &q, Some(t_lang("wizard-cancelled-toast", language_code))).await;
            if let Some(state) = app.wizards.finish(user_id) {
                app.discard_photo(&state);
                edit_wizard(&bot, &state, t_lang("wizard-cancelled", language_code), None).await;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_data_round_trip() {
        for action in CallbackAction::ALL {
            assert_eq!(CallbackAction::parse(action.data()), Some(action));
        }
    }

    #[test]
    fn test_legacy_stage_buttons() {
        assert_eq!(CallbackAction::parse("mp_start"), Some(CallbackAction::StageStart));
        assert_eq!(CallbackAction::parse("event_end"), Some(CallbackAction::StageEnd));
        assert_eq!(CallbackAction::parse("edit_3"), None);
    }
}
