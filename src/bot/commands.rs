//! Text command parsing

/// Commands understood by the bot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Auth,
    /// `/code <verification code>`; `None` when the code is missing
    Code(Option<String>),
    Test,
    Disconnect,
    Settings,
    SetPath(Option<String>),
    SetBasePath(Option<String>),
    SyncEvents,
    Pending,
    ClearPending,
    InitFolders,
    ResetWizard,
    ListPhotos,
    Cleanup,
}

impl Command {
    /// Parse a message text, `None` for plain text or unknown commands
    ///
    /// Accepts the `/command@BotName` form used in group chats.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let body = text.strip_prefix('/')?;
        let (head, rest) = match body.find(char::is_whitespace) {
            Some(index) => (&body[..index], body[index..].trim()),
            None => (body, ""),
        };
        let name = head.split('@').next().unwrap_or(head).to_ascii_lowercase();
        let argument = (!rest.is_empty()).then(|| rest.to_string());

        let command = match name.as_str() {
            "start" => Command::Start,
            "help" => Command::Help,
            "auth" => Command::Auth,
            // Codes never contain spaces, extra words are ignored
            "code" => Command::Code(
                argument.and_then(|arg| arg.split_whitespace().next().map(str::to_string)),
            ),
            "test" => Command::Test,
            "disconnect" => Command::Disconnect,
            "settings" => Command::Settings,
            "setpath" => Command::SetPath(argument),
            "setbasepath" => Command::SetBasePath(argument),
            "sync_events" => Command::SyncEvents,
            "pending" => Command::Pending,
            "clear_pending" => Command::ClearPending,
            "init_folders" => Command::InitFolders,
            "reset_wizard" => Command::ResetWizard,
            "list_photos" => Command::ListPhotos,
            "cleanup" => Command::Cleanup,
            _ => return None,
        };
        Some(command)
    }
}
