//! CLI command implementations

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::info;

use crate::core::{ResourceDescriptor, Store, StoreRegistry};
use crate::driver::MemoryDriver;
use crate::http_server::HttpServer;
use crate::observability::init_tracing;

use super::args::Command;
use super::config::AppConfig;
use super::errors::{CliError, CliResult};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Init { config } => init(&config),
        Command::Check { config } => check(&config),
        Command::Serve { config, port } => serve(&config, port),
    }
}

/// Sample configuration written by `init`
pub fn sample_config() -> Value {
    json!({
        "server": { "host": "127.0.0.1", "port": 3000 },
        "log_filter": "info,tower_http=debug",
        "resources": [
            {
                "name": "people",
                "schema": {
                    "id": { "type": "id" },
                    "name": { "type": "string", "searchable": true, "sortable": true },
                    "surname": { "type": "string", "required": true, "max": 20, "searchable": true, "sortable": true },
                    "age": { "type": "number", "max": 99, "sortable": true },
                    "tags": { "type": "array" }
                },
                "default_sort": [ { "field": "surname", "direction": "asc" } ],
                "handles": { "post_append": true }
            },
            {
                "name": "pets",
                "public_url": "/people/:personId/pets/:id",
                "schema": {
                    "id": { "type": "id" },
                    "personId": { "type": "id" },
                    "name": { "type": "string", "required": true, "searchable": true }
                }
            }
        ]
    })
}

/// Write a sample configuration file. Refuses to overwrite.
pub fn init(config_path: &Path) -> CliResult<()> {
    if config_path.exists() {
        return Err(CliError::already_exists(config_path.display()));
    }

    let content = serde_json::to_string_pretty(&sample_config())?;
    fs::write(config_path, content)?;

    println!("Wrote sample configuration to {}", config_path.display());
    Ok(())
}

/// One row of the `check` output
fn describe(descriptor: &ResourceDescriptor) -> Value {
    json!({
        "name": descriptor.name,
        "collection": descriptor.collection_pattern(),
        "item": descriptor.item_pattern(),
        "params": descriptor.param_ids(),
        "id_property": descriptor.id_property(),
        "fields": descriptor.schema.len(),
        "search_fields": descriptor.effective_search_schema().keys().collect::<Vec<_>>(),
        "handles": descriptor.handles,
        "chain_errors": descriptor.chain_errors,
    })
}

/// Validate a configuration file and print its resource table
pub fn check(config_path: &Path) -> CliResult<()> {
    let config = AppConfig::load(config_path)?;
    let table: Vec<Value> = config.resources.iter().map(describe).collect();
    println!("{}", serde_json::to_string_pretty(&table)?);
    Ok(())
}

/// Build a registry with one in-memory store per resource
pub fn build_registry(config: &AppConfig) -> CliResult<StoreRegistry> {
    let mut registry = StoreRegistry::new();

    for descriptor in &config.resources {
        let driver = match descriptor.id_property() {
            Some(id) => MemoryDriver::new(id),
            None => MemoryDriver::without_ids(),
        };
        let store = Store::new(descriptor.clone(), Arc::new(driver));
        registry
            .register(store)
            .map_err(|e| CliError::config_error(e.to_string()))?;
    }

    Ok(registry)
}

/// Serve every configured resource
pub fn serve(config_path: &Path, port: Option<u16>) -> CliResult<()> {
    let mut config = AppConfig::load(config_path)?;
    init_tracing(&config.log_filter);

    if let Some(port) = port {
        config.server.port = port;
    }

    let registry = Arc::new(build_registry(&config)?);
    info!(
        config = %config_path.display(),
        resources = registry.len(),
        "configuration loaded"
    );

    let server = HttpServer::with_config(config.server.clone(), registry);

    // Start the async runtime and run the server
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::serve_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(async {
        server
            .start()
            .await
            .map_err(|e| CliError::serve_failed(format!("HTTP server failed: {}", e)))
    })?;

    Ok(())
}
