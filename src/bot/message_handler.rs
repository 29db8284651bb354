//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{FileId, ParseMode};
use teloxide::utils::html::escape;
use tracing::{debug, error, info, warn};

use crate::app::App;
use crate::config::normalize_remote_path;
use crate::localization::{t_args_lang, t_lang};
use crate::oauth;
use crate::pending::UserId;
use crate::wizard::{PhotoRef, WizardState};

use super::commands::Command;
use super::dialogue_manager::{connection_test, init_week_folders, pending_report, sync_report};
use super::ui_builder::{
    format_pending_report, format_photo_list, format_step1_prompt, format_sync_report, is_settings_label,
    settings_keyboard, settings_reply_keyboard, step1_keyboard,
};

/// Send an HTML formatted message
pub async fn send_html(bot: &Bot, chat_id: ChatId, text: String) -> Result<Message> {
    Ok(bot.send_message(chat_id, text).parse_mode(ParseMode::Html).await?)
}

/// Fetch a Telegram file's bytes
pub async fn download_file(bot: &Bot, http: &reqwest::Client, file_id: FileId) -> Result<Vec<u8>> {
    let file = bot.get_file(file_id).await?;
    let url = format!("https://api.telegram.org/file/bot{}/{}", bot.token(), file.path);

    let response = http.get(&url).send().await?.error_for_status()?;
    let bytes = response.bytes().await?;
    Ok(bytes.to_vec())
}

/// Check the stored token: disk usage plus a scratch folder round trip
pub async fn handle_test(
    bot: &Bot,
    chat_id: ChatId,
    app: &App,
    user_id: UserId,
    language_code: Option<&str>,
) -> Result<()> {
    let disk = match app.disk_for(user_id) {
        Ok(disk) => disk,
        Err(_) => {
            send_html(bot, chat_id, t_lang("test-no-token", language_code)).await?;
            return Ok(());
        }
    };
    send_html(bot, chat_id, t_lang("test-checking", language_code)).await?;

    let base_path = app.base_path_for(user_id, None);
    let text = match connection_test(&disk, &base_path, Utc::now()).await {
        Ok(info) => {
            info!(user_id, free_space = info.free_space(), "Connection test passed");
            t_args_lang(
                "test-success",
                &[("free_gb", format!("{:.2}", info.free_gb()).as_str())],
                language_code,
            )
        }
        Err(e) => {
            warn!(user_id, error = %e, "Connection test failed");
            t_args_lang("test-failed", &[("error", escape(&e.to_string()).as_str())], language_code)
        }
    };
    send_html(bot, chat_id, text).await?;
    Ok(())
}

pub async fn handle_disconnect(
    bot: &Bot,
    chat_id: ChatId,
    app: &App,
    user_id: UserId,
    language_code: Option<&str>,
) -> Result<()> {
    app.settings.set_token(user_id, None)?;
    info!(user_id, "Yandex Disk token removed");
    send_html(bot, chat_id, t_lang("disconnected", language_code)).await?;
    Ok(())
}

/// Download a photo and open the save dialog for it
async fn start_wizard(
    bot: &Bot,
    msg: &Message,
    app: &App,
    user_id: UserId,
    file_id: FileId,
    file_name: Option<&str>,
    language_code: Option<&str>,
) -> Result<()> {
    let bytes = match download_file(bot, &app.http, file_id.clone()).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(user_id, error = %e, "Failed to download photo");
            send_html(bot, msg.chat.id, t_lang("photo-failed", language_code)).await?;
            return Ok(());
        }
    };
    let (local_path, extension) = match app.photos.store_bytes(&bytes, file_name) {
        Ok(stored) => stored,
        Err(e) => {
            error!(user_id, error = %e, "Failed to store photo locally");
            send_html(bot, msg.chat.id, t_lang("photo-failed", language_code)).await?;
            return Ok(());
        }
    };
    debug!(user_id, path = %local_path.display(), size = bytes.len(), "Photo stored");

    let photo = PhotoRef {
        file_id: file_id.to_string(),
        local_path,
        extension,
    };
    let state = WizardState::new(photo, msg.chat.id.0, Utc::now());
    if let Some(previous) = app.wizards.start(user_id, state) {
        debug!(user_id, "Replacing unfinished save dialog");
        app.discard_photo(&previous);
    }

    let sent = bot
        .send_message(msg.chat.id, format_step1_prompt(language_code))
        .parse_mode(ParseMode::Html)
        .reply_markup(step1_keyboard(language_code))
        .await?;
    app.wizards.set_message_id(user_id, sent.id.0);
    Ok(())
}

async fn send_settings_menu(bot: &Bot, chat_id: ChatId, language_code: Option<&str>) -> Result<()> {
    bot.send_message(chat_id, t_lang("settings-menu", language_code))
        .parse_mode(ParseMode::Html)
        .reply_markup(settings_keyboard(language_code))
        .await?;
    Ok(())
}

async fn not_authorized(bot: &Bot, chat_id: ChatId, language_code: Option<&str>) -> Result<()> {
    send_html(bot, chat_id, t_lang("not-authorized", language_code)).await?;
    Ok(())
}

async fn handle_command(
    bot: &Bot,
    msg: &Message,
    app: &App,
    user_id: UserId,
    command: Command,
    language_code: Option<&str>,
) -> Result<()> {
    let chat_id = msg.chat.id;
    debug!(user_id, ?command, "Handling command");

    match command {
        Command::Start => {
            let name = msg
                .from
                .as_ref()
                .map(|user| user.first_name.clone())
                .unwrap_or_default();
            bot.send_message(
                chat_id,
                t_args_lang("start-message", &[("name", escape(&name).as_str())], language_code),
            )
            .parse_mode(ParseMode::Html)
            .reply_markup(settings_reply_keyboard(language_code))
            .await?;
        }
        Command::Help => {
            send_html(bot, chat_id, t_lang("help-message", language_code)).await?;
        }
        Command::Auth => {
            if app.config.yandex.client_id.is_empty() {
                send_html(bot, chat_id, t_lang("auth-not-configured", language_code)).await?;
                return Ok(());
            }
            let url = oauth::authorize_url(&app.config.yandex)?;
            send_html(
                bot,
                chat_id,
                t_args_lang("auth-instructions", &[("url", escape(&url).as_str())], language_code),
            )
            .await?;
        }
        Command::Code(None) => {
            send_html(bot, chat_id, t_lang("code-usage", language_code)).await?;
        }
        Command::Code(Some(code)) => match oauth::exchange_code(&app.http, &app.config.yandex, &code).await {
            Ok(token) => {
                app.settings.set_token(user_id, Some(token))?;
                info!(user_id, "Yandex Disk token saved");
                send_html(bot, chat_id, t_lang("auth-success", language_code)).await?;
            }
            Err(e) => {
                warn!(user_id, error = %e, "Code exchange failed");
                send_html(bot, chat_id, t_lang("auth-failed", language_code)).await?;
            }
        },
        Command::Test => handle_test(bot, chat_id, app, user_id, language_code).await?,
        Command::Disconnect => handle_disconnect(bot, chat_id, app, user_id, language_code).await?,
        Command::Settings => send_settings_menu(bot, chat_id, language_code).await?,
        Command::SetPath(None) => {
            send_html(bot, chat_id, t_lang("setpath-usage", language_code)).await?;
        }
        Command::SetPath(Some(path)) => {
            let path = normalize_remote_path(&path);
            app.settings.set_base_path(user_id, &path)?;
            app.wizards.set_base_path(user_id, &path);
            info!(user_id, path = %path, "Base path saved");
            send_html(
                bot,
                chat_id,
                t_args_lang("setpath-done", &[("path", escape(&path).as_str())], language_code),
            )
            .await?;
        }
        Command::SetBasePath(None) => {
            send_html(bot, chat_id, t_lang("setbasepath-usage", language_code)).await?;
        }
        Command::SetBasePath(Some(path)) => {
            let path = normalize_remote_path(&path);
            let text = match app.wizards.set_base_path(user_id, &path) {
                Some(_) => t_args_lang("setbasepath-done", &[("path", escape(&path).as_str())], language_code),
                None => t_lang("setbasepath-no-wizard", language_code),
            };
            send_html(bot, chat_id, text).await?;
        }
        Command::SyncEvents => {
            let Ok(disk) = app.disk_for(user_id) else {
                return not_authorized(bot, chat_id, language_code).await;
            };
            send_html(bot, chat_id, t_lang("sync-in-progress", language_code)).await?;
            let report = sync_report(app, &disk, user_id, Utc::now()).await;
            send_html(bot, chat_id, format_sync_report(&report, language_code)).await?;
        }
        Command::Pending => {
            let disk = app.disk_for(user_id).ok();
            let now = Utc::now();
            let report = pending_report(app, disk.as_ref(), user_id, now).await;
            send_html(bot, chat_id, format_pending_report(&report, now, language_code)).await?;
        }
        Command::ClearPending => {
            let removed = app.events.clear_pending_for_user(user_id);
            let text = if removed > 0 {
                t_args_lang("clear-pending-done", &[("count", removed.to_string().as_str())], language_code)
            } else {
                t_lang("clear-pending-none", language_code)
            };
            send_html(bot, chat_id, text).await?;
        }
        Command::InitFolders => {
            let Ok(disk) = app.disk_for(user_id) else {
                return not_authorized(bot, chat_id, language_code).await;
            };
            send_html(bot, chat_id, t_lang("init-folders-progress", language_code)).await?;
            let (week_path, failed) = init_week_folders(app, &disk, user_id, Utc::now()).await;
            let text = if failed == 0 {
                t_args_lang("init-folders-done", &[("path", escape(&week_path).as_str())], language_code)
            } else {
                t_args_lang(
                    "init-folders-partial",
                    &[
                        ("failed", failed.to_string().as_str()),
                        ("path", escape(&week_path).as_str()),
                    ],
                    language_code,
                )
            };
            send_html(bot, chat_id, text).await?;
        }
        Command::ResetWizard => {
            if let Some(state) = app.wizards.finish(user_id) {
                app.discard_photo(&state);
            }
            send_html(bot, chat_id, t_lang("reset-wizard-done", language_code)).await?;
        }
        Command::ListPhotos => {
            let text = match app.photos.list_photos() {
                Ok(photos) => format_photo_list(&photos, language_code),
                Err(e) => {
                    error!(error = %e, "Failed to list cached photos");
                    t_lang("photos-error", language_code)
                }
            };
            send_html(bot, chat_id, text).await?;
        }
        Command::Cleanup => {
            let text = match app.cleanup_photos() {
                Ok(removed) => {
                    t_args_lang("cleanup-done", &[("count", removed.to_string().as_str())], language_code)
                }
                Err(e) => {
                    error!(error = %e, "Photo cleanup failed");
                    t_lang("cleanup-error", language_code)
                }
            };
            send_html(bot, chat_id, text).await?;
        }
    }
    Ok(())
}

async fn handle_text_message(
    bot: &Bot,
    msg: &Message,
    app: &App,
    user_id: UserId,
    text: &str,
    language_code: Option<&str>,
) -> Result<()> {
    if let Some(command) = Command::parse(text) {
        return handle_command(bot, msg, app, user_id, command, language_code).await;
    }
    if is_settings_label(text) {
        return send_settings_menu(bot, msg.chat.id, language_code).await;
    }
    send_html(bot, msg.chat.id, t_lang("text-hint", language_code)).await?;
    Ok(())
}

pub async fn message_handler(bot: Bot, msg: Message, app: Arc<App>) -> Result<()> {
    let Some(user) = msg.from.as_ref() else {
        debug!(chat_id = %msg.chat.id, "Ignoring message without sender");
        return Ok(());
    };
    let user_id = user.id.0;
    let language_code = user.language_code.clone();
    let language_code = language_code.as_deref();

    let result = if let Some(text) = msg.text() {
        debug!(user_id, "Received text message");
        handle_text_message(&bot, &msg, &app, user_id, text, language_code).await
    } else if let Some(photos) = msg.photo() {
        info!(user_id, count = photos.len(), "Received photo");
        match photos.last() {
            Some(largest) => {
                start_wizard(&bot, &msg, &app, user_id, largest.file.id.clone(), None, language_code).await
            }
            None => Ok(()),
        }
    } else if let Some(doc) = msg.document() {
        let is_image = doc
            .mime_type
            .as_ref()
            .is_some_and(|mime| mime.to_string().starts_with("image/"));
        if is_image {
            info!(user_id, file_name = ?doc.file_name, "Received image document");
            start_wizard(
                &bot,
                &msg,
                &app,
                user_id,
                doc.file.id.clone(),
                doc.file_name.as_deref(),
                language_code,
            )
            .await
        } else {
            debug!(user_id, mime_type = ?doc.mime_type, "Ignoring non-image document");
            send_html(&bot, msg.chat.id, t_lang("text-hint", language_code)).await.map(|_| ())
        }
    } else {
        debug!(user_id, "Ignoring unsupported message");
        Ok(())
    };

    if let Err(e) = &result {
        error!(user_id, error = %e, "Failed to handle message");
        send_html(
            &bot,
            msg.chat.id,
            t_args_lang("generic-error", &[("error", escape(&e.to_string()).as_str())], language_code),
        )
        .await?;
    }
    Ok(())
}
