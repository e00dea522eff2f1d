//! Infrastructure layer for Teledrive.
//!
//! Contains the concrete Telegram Bot API transport implementing
//! [`FileTransport`](teledrive_core::transport::FileTransport), configuration
//! loading (TOML file plus environment overrides), and the bootstrap that
//! wires both into a ready [`StorageManager`](teledrive_core::storage::StorageManager).

pub mod bootstrap;
pub mod config;
pub mod telegram;
