use crate::commands::{load_config, runtime, CommandResult, Failure};
use fixquote_db::{connect_with_settings, migrations};

pub fn run() -> CommandResult {
    let config = match load_config() {
        Ok(config) => config,
        Err(failure) => return failure.into_result("migrate"),
    };
    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(failure) => return failure.into_result("migrate"),
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| Failure::new("db_connectivity", error.to_string(), Failure::DATABASE))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| Failure::new("migration", error.to_string(), Failure::MIGRATION))?;
        pool.close().await;
        Ok::<(), Failure>(())
    });

    match result {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err(failure) => failure.into_result("migrate"),
    }
}
