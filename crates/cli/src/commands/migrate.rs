use crate::commands::{run_against_database, CommandResult};
use fernwood_db::migrations;

pub fn run() -> CommandResult {
    let result = run_against_database("migrate", |pool| async move {
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        Ok(migrations::MIGRATOR.iter().count())
    });

    match result {
        Ok(total) => CommandResult::success("migrate", success_message(total)),
        Err(failure) => failure,
    }
}

fn success_message(total: usize) -> String {
    format!("schema is current: {total} migrations applied")
}
