use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub discord: DiscordConfig,
    pub leveling: LevelingConfig,
    pub polls: PollsConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct DiscordConfig {
    pub bot_token: SecretString,
    /// User ids allowed to delete polls they did not author.
    pub admin_user_ids: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct LevelingConfig {
    pub xp_per_message_min: u64,
    pub xp_per_message_max: u64,
    pub xp_cooldown_secs: u64,
    /// Channels that never grant XP.
    pub excluded_channels: Vec<String>,
    /// Role id -> XP multiplier; the highest matching multiplier wins.
    pub role_multipliers: HashMap<String, f64>,
    /// Templates with `{user}` and `{level}` placeholders.
    pub level_up_messages: Vec<String>,
    /// Messages shorter than this grant no XP.
    pub min_message_chars: usize,
}

#[derive(Clone, Debug)]
pub struct PollsConfig {
    /// Reaction symbols in option-index order; length caps the option count.
    pub reaction_symbols: Vec<String>,
    pub min_options: usize,
    pub max_options: usize,
    pub default_duration_hours: u32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub discord_bot_token: Option<String>,
    pub admin_user_ids: Option<Vec<String>>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://guildhall.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            discord: DiscordConfig {
                bot_token: String::new().into(),
                admin_user_ids: Vec::new(),
            },
            leveling: LevelingConfig {
                xp_per_message_min: 5,
                xp_per_message_max: 15,
                xp_cooldown_secs: 60,
                excluded_channels: Vec::new(),
                role_multipliers: HashMap::new(),
                level_up_messages: vec![
                    "🎉 Congratulations {user}! You reached level **{level}**!".to_string(),
                    "⭐ Incredible {user}! You are now level **{level}**!".to_string(),
                    "🚀 Keep it up {user}! You climbed to level **{level}**!".to_string(),
                    "💪 Great work {user}! Level **{level}** unlocked!".to_string(),
                ],
                min_message_chars: 5,
            },
            polls: PollsConfig {
                reaction_symbols: vec![
                    "🇦", "🇧", "🇨", "🇩", "🇪", "🇫", "🇬", "🇭", "🇮", "🇯",
                ]
                .into_iter()
                .map(str::to_string)
                .collect(),
                min_options: 2,
                max_options: 10,
                default_duration_hours: 24,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("guildhall.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(discord) = patch.discord {
            if let Some(bot_token_value) = discord.bot_token {
                self.discord.bot_token = bot_token_value.into();
            }
            if let Some(admin_user_ids) = discord.admin_user_ids {
                self.discord.admin_user_ids = admin_user_ids;
            }
        }

        if let Some(leveling) = patch.leveling {
            if let Some(min) = leveling.xp_per_message_min {
                self.leveling.xp_per_message_min = min;
            }
            if let Some(max) = leveling.xp_per_message_max {
                self.leveling.xp_per_message_max = max;
            }
            if let Some(cooldown) = leveling.xp_cooldown_secs {
                self.leveling.xp_cooldown_secs = cooldown;
            }
            if let Some(excluded) = leveling.excluded_channels {
                self.leveling.excluded_channels = excluded;
            }
            if let Some(multipliers) = leveling.role_multipliers {
                self.leveling.role_multipliers = multipliers;
            }
            if let Some(messages) = leveling.level_up_messages {
                self.leveling.level_up_messages = messages;
            }
            if let Some(min_chars) = leveling.min_message_chars {
                self.leveling.min_message_chars = min_chars;
            }
        }

        if let Some(polls) = patch.polls {
            if let Some(symbols) = polls.reaction_symbols {
                self.polls.reaction_symbols = symbols;
            }
            if let Some(min_options) = polls.min_options {
                self.polls.min_options = min_options;
            }
            if let Some(max_options) = polls.max_options {
                self.polls.max_options = max_options;
            }
            if let Some(default_duration) = polls.default_duration_hours {
                self.polls.default_duration_hours = default_duration;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("GUILDHALL_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("GUILDHALL_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("GUILDHALL_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("GUILDHALL_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("GUILDHALL_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("GUILDHALL_DISCORD_BOT_TOKEN") {
            self.discord.bot_token = value.into();
        }
        if let Some(value) = read_env("GUILDHALL_DISCORD_ADMIN_USER_IDS") {
            self.discord.admin_user_ids =
                value.split(',').map(str::trim).filter(|id| !id.is_empty()).map(str::to_string).collect();
        }

        if let Some(value) = read_env("GUILDHALL_LEVELING_XP_COOLDOWN_SECS") {
            self.leveling.xp_cooldown_secs =
                parse_u64("GUILDHALL_LEVELING_XP_COOLDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("GUILDHALL_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("GUILDHALL_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_u16("GUILDHALL_SERVER_HEALTH_CHECK_PORT", &value)?;
        }

        let log_level =
            read_env("GUILDHALL_LOGGING_LEVEL").or_else(|| read_env("GUILDHALL_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("GUILDHALL_LOGGING_FORMAT").or_else(|| read_env("GUILDHALL_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(bot_token) = overrides.discord_bot_token {
            self.discord.bot_token = bot_token.into();
        }
        if let Some(admin_user_ids) = overrides.admin_user_ids {
            self.discord.admin_user_ids = admin_user_ids;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_discord(&self.discord)?;
        validate_leveling(&self.leveling)?;
        validate_polls(&self.polls)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("guildhall.toml"), PathBuf::from("config/guildhall.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_discord(discord: &DiscordConfig) -> Result<(), ConfigError> {
    if discord.bot_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "discord.bot_token is required. Get it from the Discord developer portal > Your App > Bot > Token".to_string(),
        ));
    }

    Ok(())
}

fn validate_leveling(leveling: &LevelingConfig) -> Result<(), ConfigError> {
    if leveling.xp_per_message_min == 0 {
        return Err(ConfigError::Validation(
            "leveling.xp_per_message_min must be greater than zero".to_string(),
        ));
    }

    if leveling.xp_per_message_min > leveling.xp_per_message_max {
        return Err(ConfigError::Validation(
            "leveling.xp_per_message_min must not exceed leveling.xp_per_message_max".to_string(),
        ));
    }

    if leveling.xp_cooldown_secs > 86_400 {
        return Err(ConfigError::Validation(
            "leveling.xp_cooldown_secs must be at most 86400".to_string(),
        ));
    }

    if leveling.level_up_messages.is_empty() {
        return Err(ConfigError::Validation(
            "leveling.level_up_messages must contain at least one template".to_string(),
        ));
    }

    for (role, multiplier) in &leveling.role_multipliers {
        if !multiplier.is_finite() || *multiplier <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "leveling.role_multipliers[{role}] must be a positive finite number"
            )));
        }
    }

    Ok(())
}

fn validate_polls(polls: &PollsConfig) -> Result<(), ConfigError> {
    if polls.min_options < 2 {
        return Err(ConfigError::Validation(
            "polls.min_options must be at least 2".to_string(),
        ));
    }

    if polls.max_options < polls.min_options {
        return Err(ConfigError::Validation(
            "polls.max_options must not be below polls.min_options".to_string(),
        ));
    }

    if polls.reaction_symbols.len() < polls.max_options {
        return Err(ConfigError::Validation(
            "polls.reaction_symbols must provide one symbol per allowed option".to_string(),
        ));
    }

    let mut seen = std::collections::HashSet::new();
    for symbol in &polls.reaction_symbols {
        if !seen.insert(symbol) {
            return Err(ConfigError::Validation(format!(
                "polls.reaction_symbols contains duplicate symbol `{symbol}`"
            )));
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    discord: Option<DiscordPatch>,
    leveling: Option<LevelingPatch>,
    polls: Option<PollsPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DiscordPatch {
    bot_token: Option<String>,
    admin_user_ids: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct LevelingPatch {
    xp_per_message_min: Option<u64>,
    xp_per_message_max: Option<u64>,
    xp_cooldown_secs: Option<u64>,
    excluded_channels: Option<Vec<String>>,
    role_multipliers: Option<HashMap<String, f64>>,
    level_up_messages: Option<Vec<String>>,
    min_message_chars: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct PollsPatch {
    reaction_symbols: Option<Vec<String>>,
    min_options: Option<usize>,
    max_options: Option<usize>,
    default_duration_hours: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    fn token_overrides() -> ConfigOverrides {
        ConfigOverrides {
            discord_bot_token: Some("test-token".to_string()),
            ..ConfigOverrides::default()
        }
    }

    #[test]
    fn defaults_match_the_documented_leveling_and_poll_surface() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions {
            overrides: token_overrides(),
            ..LoadOptions::default()
        })
        .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.leveling.xp_per_message_min == 5, "default xp min should be 5")?;
        ensure(config.leveling.xp_per_message_max == 15, "default xp max should be 15")?;
        ensure(config.leveling.xp_cooldown_secs == 60, "default cooldown should be 60s")?;
        ensure(config.polls.min_options == 2, "default min options should be 2")?;
        ensure(config.polls.max_options == 10, "default max options should be 10")?;
        ensure(
            config.polls.reaction_symbols.len() == 10,
            "default symbol list should cover ten options",
        )?;
        ensure(
            config.leveling.level_up_messages.len() == 4,
            "default template list should have four entries",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_GUILDHALL_BOT_TOKEN", "token-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("guildhall.toml");
            fs::write(
                &path,
                r#"
[discord]
bot_token = "${TEST_GUILDHALL_BOT_TOKEN}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.discord.bot_token.expose_secret() == "token-from-env",
                "bot token should be loaded from environment",
            )
        })();

        clear_vars(&["TEST_GUILDHALL_BOT_TOKEN"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("GUILDHALL_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("GUILDHALL_DISCORD_BOT_TOKEN", "token-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("guildhall.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[discord]
bot_token = "token-from-file"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.discord.bot_token.expose_secret() == "token-from-env",
                "env bot token should win over file and defaults",
            )
        })();

        clear_vars(&["GUILDHALL_DATABASE_URL", "GUILDHALL_DISCORD_BOT_TOKEN"]);
        result
    }

    #[test]
    fn validation_rejects_inverted_xp_range() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("guildhall.toml");
        fs::write(
            &path,
            r#"
[leveling]
xp_per_message_min = 20
xp_per_message_max = 10
"#,
        )
        .map_err(|err| err.to_string())?;

        let error = match AppConfig::load(LoadOptions {
            config_path: Some(path),
            overrides: token_overrides(),
            ..LoadOptions::default()
        }) {
            Ok(_) => return Err("inverted xp range should fail validation".to_string()),
            Err(error) => error,
        };

        ensure(
            matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("xp_per_message_min")
            ),
            "validation failure should mention the xp range",
        )
    }

    #[test]
    fn validation_rejects_symbol_list_shorter_than_max_options() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("guildhall.toml");
        fs::write(
            &path,
            r#"
[polls]
reaction_symbols = ["🇦", "🇧", "🇨"]
max_options = 5
"#,
        )
        .map_err(|err| err.to_string())?;

        let error = match AppConfig::load(LoadOptions {
            config_path: Some(path),
            overrides: token_overrides(),
            ..LoadOptions::default()
        }) {
            Ok(_) => return Err("short symbol list should fail validation".to_string()),
            Err(error) => error,
        };

        ensure(
            matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("reaction_symbols")
            ),
            "validation failure should mention reaction_symbols",
        )
    }

    #[test]
    fn missing_bot_token_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let error = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => return Err("expected validation failure but config load succeeded".to_string()),
            Err(error) => error,
        };

        ensure(
            matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("discord.bot_token")
            ),
            "validation failure should mention discord.bot_token",
        )
    }

    #[test]
    fn secret_token_is_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                discord_bot_token: Some("secret-token-value".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .map_err(|err| format!("config load failed: {err}"))?;

        let debug = format!("{config:?}");
        ensure(!debug.contains("secret-token-value"), "debug output should not contain token")?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )
    }
}
