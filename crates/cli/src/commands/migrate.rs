use crate::commands::CommandResult;
use guildhall_core::config::{AppConfig, LoadOptions};
use guildhall_db::{connect, migrations};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "migrate",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "migrate",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    match runtime.block_on(apply(&config)) {
        Ok(message) => CommandResult::success("migrate", message),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}

async fn apply(config: &AppConfig) -> Result<String, (&'static str, String, u8)> {
    let pool = connect(&config.database)
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

    let applied = migrations::run_pending(&pool)
        .await
        .map_err(|error| ("migration", error.to_string(), 5u8));
    pool.close().await;
    applied?;

    Ok(format!("database schema is current ({} known migrations)", migrations::migration_count()))
}
