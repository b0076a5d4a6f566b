pub mod config;
pub mod migrate;
pub mod seed;

use std::future::Future;

use fernwood_core::config::{AppConfig, LoadOptions};
use fernwood_db::{connect, DbPool, PoolSettings};
use serde::Serialize;

/// Failure class, message and exit code for a command step.
pub(crate) type CommandFailure = (&'static str, String, u8);

/// Loads the effective configuration, opens a pool against the configured
/// database on a single-thread runtime and runs `task` against it. Exit
/// codes 2 (config), 3 (runtime) and 4 (connectivity) are claimed here;
/// tasks report their own from 5 upward.
pub(crate) fn run_against_database<T, F, Fut>(
    command: &'static str,
    task: F,
) -> Result<T, CommandResult>
where
    F: FnOnce(DbPool) -> Fut,
    Fut: Future<Output = Result<T, CommandFailure>>,
{
    let config = AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })?;

    let runtime =
        tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
            CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            )
        })?;

    runtime.block_on(async {
        let pool = connect(&PoolSettings::from(&config.database))
            .await
            .map_err(|error| CommandResult::failure(command, "db_connectivity", error.to_string(), 4))?;
        let outcome = task(pool.clone()).await;
        pool.close().await;
        outcome.map_err(|(error_class, message, exit_code)| {
            CommandResult::failure(command, error_class, message, exit_code)
        })
    })
}

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
