#![allow(dead_code)]

use shoal_client::Client;
use shoal_db::Database;
use shoal_harness::HarnessConfig;
use shoal_server::{Server, ServerHandle};

pub fn start(config: &HarnessConfig) -> (ServerHandle, Client) {
    let server = Server::new(Database::open(config.database.clone()), config.server.clone()).spawn();
    let client = Client::connect(&server, config.client.clone());
    (server, client)
}

pub fn small_config() -> HarnessConfig {
    HarnessConfig {
        objects_per_name: 1,
        ..HarnessConfig::default()
    }
}
