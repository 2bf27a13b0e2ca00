pub mod config;
pub mod error;
pub mod expect;
pub mod ops;
pub mod populate;
pub mod scenario;

use shoal_client::Client;
use tracing::error;

pub use config::HarnessConfig;
pub use error::HarnessError;
pub use scenario::{Scenario, ScenarioKind, ScenarioReport, Step};

pub struct ScenarioOutcome {
    pub name: String,
    pub result: Result<ScenarioReport, HarnessError>,
}

impl ScenarioOutcome {
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }
}

/// Run every scenario in order over one shared client. A failing scenario
/// does not stop the ones after it.
pub async fn run_all(client: &Client, config: &HarnessConfig) -> Vec<ScenarioOutcome> {
    let mut outcomes = Vec::new();
    for scenario in Scenario::all(config.objects_per_name) {
        let result = scenario.run(client, config).await;
        if let Err(e) = &result {
            error!(scenario = %scenario.bucket, "scenario failed: {e}");
        }
        outcomes.push(ScenarioOutcome {
            name: scenario.bucket,
            result,
        });
    }
    outcomes
}
