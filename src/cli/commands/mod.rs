pub mod connection;
pub mod query;
pub mod services;
pub mod token;
pub mod tools;

use anyhow::{Context, Result};
use colored::*;
use log::info;
use serde_json::Value;

use super::app::{Cli, Commands};
use crate::adapter::ToolAdapter;
use crate::api::{ArcgisClient, ArcgisError};
use crate::auth::Credentials;
use crate::config::Config;

const SUGGESTION_LIMIT: usize = 5;

/// Dispatch a parsed command line
pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let env_file = cli.env_file.as_deref();

    match cli.command {
        Commands::Capabilities => tools::capabilities_command(),
        Commands::Services(args) => services::services_command(&connect(&config, env_file)?, args).await,
        Commands::Service(args) => services::service_command(&connect(&config, env_file)?, args).await,
        Commands::Layer(args) => services::layer_command(&connect(&config, env_file)?, args).await,
        Commands::Query(args) => query::handle_query_command(&connect(&config, env_file)?, &config, args).await,
        Commands::Test => connection::test_command(&connect(&config, env_file)?).await,
        Commands::Token(args) => token::token_command(&connect(&config, env_file)?, args).await,
        Commands::ServerInfo => connection::server_info_command(&connect(&config, env_file)?).await,
        Commands::Call(args) => tools::call_command(ToolAdapter::new(connect(&config, env_file)?), args).await,
    }
}

fn connect(config: &Config, env_file: Option<&str>) -> Result<ArcgisClient> {
    let credentials = match env_file {
        Some(path) => Credentials::from_env_file(path),
        None => Credentials::from_env(),
    }
    .context("Failed to load ArcGIS credentials")?;

    info!("Connecting to {}", credentials.server_url());
    ArcgisClient::new(credentials, config.to_client_options()).context("Failed to create ArcGIS client")
}

/// Pass results through, printing near-miss service names on a failed lookup
fn with_suggestions(client: &ArcgisClient, result: Result<Value, ArcgisError>) -> Result<Value> {
    match result {
        Err(err @ ArcgisError::NotFound { .. }) => {
            if let ArcgisError::NotFound { name, .. } = &err {
                let last_segment = name.rsplit('/').next().unwrap_or(name);
                let suggestions = client.suggest_recent(last_segment, SUGGESTION_LIMIT);
                if !suggestions.is_empty() {
                    println!("❓ {}", "Did you mean:".yellow());
                    for suggestion in suggestions {
                        println!("   {}", suggestion.cyan());
                    }
                }
            }
            Err(err.into())
        }
        other => Ok(other?),
    }
}
