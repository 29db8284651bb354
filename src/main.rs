use anyhow::Result;
use std::env;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use photo_reports::app::App;
use photo_reports::bot;
use photo_reports::config::AppConfig;
use photo_reports::localization::init_localization;
use photo_reports::maintenance;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    init_tracing();
    info!("Starting Photo Reports Telegram Bot");

    init_localization()?;

    let config = AppConfig::from_env()?;
    info!(
        photos_dir = %config.photos_dir.display(),
        settings_file = %config.settings_file.display(),
        "Configuration loaded"
    );

    let bot = Bot::new(config.bot_token.clone());
    let app = Arc::new(App::new(config)?);
    let _maintenance = maintenance::spawn(Arc::clone(&app));

    info!("Bot initialized, starting dispatcher");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint({
            let app = Arc::clone(&app);
            move |bot: Bot, msg: Message| {
                let app = Arc::clone(&app);
                async move { bot::message_handler(bot, msg, app).await }
            }
        }))
        .branch(Update::filter_callback_query().endpoint({
            let app = Arc::clone(&app);
            move |bot: Bot, q: CallbackQuery| {
                let app = Arc::clone(&app);
                async move { bot::callback_handler(bot, q, app).await }
            }
        }));

    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
