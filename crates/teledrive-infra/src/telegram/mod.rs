//! Telegram Bot API transport.
//!
//! Documents are posted with `sendDocument` and fetched back through
//! `getFile` plus the file download endpoint.

pub mod client;
pub mod types;

pub use client::TelegramBotApi;
