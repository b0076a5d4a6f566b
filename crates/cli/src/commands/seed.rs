use crate::commands::{run_against_database, CommandResult};
use fernwood_db::{migrations, ShowroomSeedDataset};

pub fn run() -> CommandResult {
    let result = run_against_database("seed", |pool| async move {
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let seed_result = ShowroomSeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = ShowroomSeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;
        if !verification.all_present {
            return Err((
                "seed_verification",
                verification_failure_message(&verification.checks),
                6u8,
            ));
        }

        Ok(seed_result.products_seeded)
    });

    match result {
        Ok(products_seeded) => CommandResult::success(
            "seed",
            format!("showroom catalog loaded: {products_seeded} products seeded and verified"),
        ),
        Err(failure) => failure,
    }
}

fn verification_failure_message(checks: &[(&'static str, bool)]) -> String {
    let failed_checks = checks
        .iter()
        .filter_map(|(check, passed)| (!passed).then_some(*check))
        .collect::<Vec<_>>();
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}
