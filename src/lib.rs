//! # Photo Reports Telegram Bot
//!
//! A Telegram bot that files screenshots into weekly report folders on
//! Yandex Disk and numbers two-stage events (start and end shots) so that
//! both halves of an event land under the same number.

pub mod app;
pub mod bot;
pub mod categories;
pub mod circuit_breaker;
pub mod clock;
pub mod config;
pub mod errors;
pub mod events;
pub mod key_locks;
pub mod local_files;
pub mod localization;
pub mod maintenance;
pub mod oauth;
pub mod pending;
pub mod remote;
pub mod settings;
pub mod stage_files;
pub mod store;
pub mod wizard;
pub mod yandex_disk;
