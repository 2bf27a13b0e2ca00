use std::process::ExitCode;

use shoal_client::Client;
use shoal_db::Database;
use shoal_harness::{HarnessConfig, run_all};
use shoal_server::Server;
use tracing::info;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match HarnessConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("shoal-harness: {e}");
            return ExitCode::FAILURE;
        }
    };
    let level = match config.max_level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("shoal-harness: {e}");
            return ExitCode::FAILURE;
        }
    };
    tracing_subscriber::fmt().with_max_level(level).init();
    info!(
        objects_per_name = config.objects_per_name,
        add_concurrency = config.add_concurrency,
        reindex_batch_size = config.reindex_batch_size,
        "starting shoal-harness"
    );

    let server = Server::new(Database::open(config.database.clone()), config.server.clone()).spawn();
    let client = Client::connect(&server, config.client.clone());

    let outcomes = run_all(&client, &config).await;
    server.shutdown().await;

    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(report) => println!("ok    {} ({} steps)", outcome.name, report.steps),
            Err(e) => {
                failed += 1;
                println!("FAIL  {}: {e}", outcome.name);
            }
        }
    }
    println!("{} passed, {failed} failed", outcomes.len() - failed);

    if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
