use guildhall_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line("database.url", &config.database.url));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
    ));
    lines.push(render_line("database.timeout_secs", &config.database.timeout_secs.to_string()));

    lines.push(render_line(
        "discord.bot_token",
        &redact_token(config.discord.bot_token.expose_secret()),
    ));
    lines.push(render_line(
        "discord.admin_user_ids",
        &format!("{} configured", config.discord.admin_user_ids.len()),
    ));

    lines.push(render_line(
        "leveling.xp_per_message",
        &format!("[{}, {}]", config.leveling.xp_per_message_min, config.leveling.xp_per_message_max),
    ));
    lines.push(render_line(
        "leveling.xp_cooldown_secs",
        &config.leveling.xp_cooldown_secs.to_string(),
    ));
    lines.push(render_line(
        "leveling.excluded_channels",
        &format!("{} configured", config.leveling.excluded_channels.len()),
    ));
    lines.push(render_line(
        "leveling.role_multipliers",
        &format!("{} configured", config.leveling.role_multipliers.len()),
    ));

    lines.push(render_line(
        "polls.option_count",
        &format!("[{}, {}]", config.polls.min_options, config.polls.max_options),
    ));
    lines.push(render_line(
        "polls.default_duration_hours",
        &config.polls.default_duration_hours.to_string(),
    ));

    lines.push(render_line("server.bind_address", &config.server.bind_address));
    lines.push(render_line(
        "server.health_check_port",
        &config.server.health_check_port.to_string(),
    ));

    lines.push(render_line("logging.level", &config.logging.level));

    lines.join("\n")
}

fn render_line(key: &str, value: &str) -> String {
    format!("  {key} = {value}")
}

fn redact_token(token: &str) -> String {
    if token.is_empty() {
        return "<unset>".to_string();
    }
    let visible: String = token.chars().take(4).collect();
    format!("{visible}… ({} chars)", token.chars().count())
}
