//! Shared domain types for Teledrive.
//!
//! This crate contains the core domain types used across the Teledrive storage
//! layer: bot credentials, chunk manifests, upload results, provider status,
//! configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, thiserror, secrecy.

pub mod bot;
pub mod config;
pub mod error;
pub mod storage;
