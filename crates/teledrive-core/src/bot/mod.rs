//! Telegram bot credential pool.
//!
//! `health` tracks per-credential liveness; `pool` load-balances uploads
//! across healthy credentials and fails over when one keeps failing.

pub mod health;
pub mod pool;
