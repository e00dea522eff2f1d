//! Bot credential types.
//!
//! A "bot" is one configured Telegram Bot API account: a token plus the chat
//! where its documents are posted. Runtime health lives in `teledrive-core`;
//! these types only carry identity and the status snapshot shape.

use std::fmt;
use std::str::FromStr;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Maximum number of bot credentials a pool accepts.
pub const MAX_BOTS: usize = 10;

/// One transport credential.
///
/// The token is wrapped in [`SecretString`] so it never shows up in `Debug`
/// output or tracing fields.
#[derive(Debug)]
pub struct BotCredential {
    /// Stable identifier (`bot1` .. `bot10`), recorded in every `ChunkInfo`.
    pub id: String,
    /// Display name for dashboards.
    pub name: String,
    /// Bot API token.
    pub token: SecretString,
    /// Destination chat/channel where documents are posted.
    pub chat_id: String,
}

impl BotCredential {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        token: impl Into<String>,
        chat_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            token: SecretString::from(token.into()),
            chat_id: chat_id.into(),
        }
    }
}

/// Health state of a bot as seen by the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotState {
    /// Selectable by round-robin.
    Active,
    /// Demoted after repeated failures; waiting for its recovery deadline.
    Inactive,
    /// Recovery deadline elapsed; one trial upload allowed.
    Probation,
}

impl fmt::Display for BotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BotState::Active => write!(f, "active"),
            BotState::Inactive => write!(f, "inactive"),
            BotState::Probation => write!(f, "probation"),
        }
    }
}

impl FromStr for BotState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(BotState::Active),
            "inactive" => Ok(BotState::Inactive),
            "probation" => Ok(BotState::Probation),
            other => Err(format!("invalid bot state: '{other}'")),
        }
    }
}

/// Read-only health snapshot of one bot, for ops dashboards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotStatusInfo {
    pub id: String,
    pub name: String,
    /// `true` for `Active` and `Probation`.
    pub active: bool,
    /// Consecutive failures since the last success.
    pub failures: u32,
    pub state: BotState,
    pub total_successes: u64,
    pub total_failures: u64,
    pub last_error: Option<String>,
    /// RFC 3339 timestamp of the most recent failure.
    pub last_failure_at: Option<String>,
}
