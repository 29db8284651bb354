//! Bot module for handling Telegram interactions
//!
//! - `commands`: Parses slash commands
//! - `message_handler`: Handles commands, photos and image documents
//! - `callback_handler`: Handles inline keyboard callback queries
//! - `ui_builder`: Creates keyboards and formats messages
//! - `dialogue_manager`: Save actions and reports behind the dialog

pub mod callback_handler;
pub mod commands;
pub mod dialogue_manager;
pub mod message_handler;
pub mod ui_builder;

// Re-export main handler functions for use in main.rs
pub use callback_handler::callback_handler;
pub use message_handler::message_handler;

pub use callback_handler::CallbackAction;
pub use commands::Command;
pub use message_handler::download_file;
