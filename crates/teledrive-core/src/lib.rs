//! Storage virtualization logic for Teledrive.
//!
//! Turns a pool of rate-limited, size-capped Telegram bots into a single
//! storage backend: health tracking, backoff, chunked transfer, round-robin
//! failover, and the provider/manager layer on top. Depends only on
//! `teledrive-types` -- the HTTP transport lives in `teledrive-infra`.

pub mod bot;
pub mod chunked;
pub mod retry;
pub mod storage;
pub mod transport;
