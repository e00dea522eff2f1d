//! Provider and bot health dashboards.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use teledrive_types::bot::{BotState, BotStatusInfo};
use teledrive_types::config::TelegramConfig;
use teledrive_types::storage::ProviderStatus;

use crate::state::AppState;

fn availability(status: &ProviderStatus) -> String {
    if status.available {
        style("available").green().to_string()
    } else {
        style("unavailable").red().to_string()
    }
}

/// Pool settings in effect, as loaded from configuration.
fn pool_settings(config: &TelegramConfig) -> serde_json::Value {
    serde_json::json!({
        "configured_bots": config.bots.len(),
        "usable": config.is_complete(),
        "chunk_size_bytes": config.chunk_size_bytes,
        "failure_threshold": config.failure_threshold,
        "recovery_window_secs": config.recovery_window_secs,
    })
}

/// Display provider availability.
pub fn status(state: &AppState, json: bool) -> Result<()> {
    let status = state.manager.get_status();
    let bots = state.manager.bot_status();
    let healthy = bots.iter().filter(|b| b.active).count();

    if json {
        let body = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "storage": status,
            "available_providers": state.manager.get_available_providers(),
            "bots": { "total": bots.len(), "healthy": healthy },
            "pool": pool_settings(&state.config.telegram),
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!();
    println!("  {} Teledrive v{}", style("⚡").bold(), env!("CARGO_PKG_VERSION"));
    println!();

    println!("  {}", style("── Storage ──").dim());
    println!(
        "  Primary:  {} ({})",
        style(status.primary.provider).bold(),
        availability(&status.primary)
    );
    if status.fallbacks.is_empty() {
        println!("  Fallback: {}", style("none").dim());
    }
    for fallback in &status.fallbacks {
        println!(
            "  Fallback: {} ({})",
            style(fallback.provider).bold(),
            availability(fallback)
        );
    }
    if status.replication_enabled {
        println!("  Replication: {}", style("enabled (inert)").yellow());
    }
    println!();

    println!("  {}", style("── Bots ──").dim());
    println!("  Total:   {}", style(bots.len()).bold());
    println!("  Healthy: {}", style(healthy).green());
    if healthy < bots.len() {
        println!("  Down:    {}", style(bots.len() - healthy).red());
    }
    let telegram = &state.config.telegram;
    println!(
        "  Chunks:  {} MiB",
        style(telegram.chunk_size_bytes / (1024 * 1024)).dim()
    );
    println!(
        "  Sit out: {}s after {} failures",
        style(telegram.recovery_window_secs).dim(),
        style(telegram.failure_threshold).dim()
    );
    println!();
    Ok(())
}

fn state_cell(state: BotState) -> Cell {
    match state {
        BotState::Active => Cell::new("active").fg(Color::Green),
        BotState::Probation => Cell::new("probation").fg(Color::Yellow),
        BotState::Inactive => Cell::new("INACTIVE").fg(Color::Red),
    }
}

fn bot_table(bots: &[BotStatusInfo]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Id").fg(Color::White),
        Cell::new("Name").fg(Color::White),
        Cell::new("State").fg(Color::White),
        Cell::new("Failures").fg(Color::White),
        Cell::new("Successes").fg(Color::White),
        Cell::new("Total Failures").fg(Color::White),
        Cell::new("Last Error").fg(Color::White),
    ]);

    for bot in bots {
        let failures = if bot.failures > 0 {
            Cell::new(bot.failures).fg(Color::Red)
        } else {
            Cell::new(bot.failures).fg(Color::DarkGrey)
        };
        let last_error = match (&bot.last_error, &bot.last_failure_at) {
            (Some(err), Some(at)) => format!("{err} ({at})"),
            (Some(err), None) => err.clone(),
            _ => "-".to_string(),
        };
        table.add_row(vec![
            Cell::new(&bot.id).fg(Color::Cyan),
            Cell::new(&bot.name).fg(Color::White),
            state_cell(bot.state),
            failures,
            Cell::new(bot.total_successes).fg(Color::DarkGrey),
            Cell::new(bot.total_failures).fg(Color::DarkGrey),
            Cell::new(last_error).fg(Color::DarkGrey),
        ]);
    }
    table
}

/// Display per-bot health.
pub fn bots(state: &AppState, json: bool) -> Result<()> {
    let bots = state.manager.bot_status();

    if json {
        println!("{}", serde_json::to_string_pretty(&bots)?);
        return Ok(());
    }

    if bots.is_empty() {
        println!();
        println!("  No bots configured.");
        println!(
            "  Set {} and {} to enable Telegram storage.",
            style("TELEGRAM_BOT_TOKEN").yellow(),
            style("TELEGRAM_CHAT_ID").yellow()
        );
        println!();
        return Ok(());
    }

    println!();
    println!("{}", bot_table(&bots));
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: &str, state: BotState, failures: u32) -> BotStatusInfo {
        BotStatusInfo {
            id: id.to_string(),
            name: id.to_string(),
            active: state != BotState::Inactive,
            failures,
            state,
            total_successes: 3,
            total_failures: u64::from(failures),
            last_error: (failures > 0).then(|| "HTTP 502".to_string()),
            last_failure_at: None,
        }
    }

    #[test]
    fn test_bot_table_has_row_per_bot() {
        let bots = vec![
            info("bot1", BotState::Active, 0),
            info("bot2", BotState::Inactive, 5),
        ];
        let rendered = bot_table(&bots).to_string();
        assert!(rendered.contains("bot1"));
        assert!(rendered.contains("bot2"));
        assert!(rendered.contains("INACTIVE"));
        assert!(rendered.contains("HTTP 502"));
    }

    #[test]
    fn test_pool_settings_reflect_config() {
        let mut config = TelegramConfig::default();
        let settings = pool_settings(&config);
        assert_eq!(settings["configured_bots"], 0);
        assert_eq!(settings["usable"], false);
        assert_eq!(settings["failure_threshold"], 5);
        assert_eq!(settings["recovery_window_secs"], 300);

        config.chat_id = Some("-100".to_string());
        config.bots.push(teledrive_types::config::BotConfig {
            name: None,
            token: "1:A".to_string(),
        });
        let settings = pool_settings(&config);
        assert_eq!(settings["configured_bots"], 1);
        assert_eq!(settings["usable"], true);
    }

    #[test]
    fn test_commands_run_without_bots() {
        let state = AppState::init(Default::default()).unwrap();
        status(&state, true).unwrap();
        bots(&state, false).unwrap();
    }
}
