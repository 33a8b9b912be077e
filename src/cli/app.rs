use super::commands::tools::CallArgs;
use super::commands::query::QueryCommands;
use super::commands::services::{LayerArgs, ServiceArgs, ServicesArgs};
use super::commands::token::TokenArgs;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "arcgis-cli")]
#[command(about = "A CLI tool for browsing and querying ArcGIS Enterprise services")]
pub struct Cli {
    /// Read credentials from this env file instead of the environment
    #[arg(long, global = true)]
    pub env_file: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List services in every folder, grouped by category
    Services(ServicesArgs),
    /// Show metadata for one service
    Service(ServiceArgs),
    /// Show metadata for one layer of a service
    Layer(LayerArgs),
    /// Query features of a service layer
    Query(QueryCommands),
    /// Test connectivity to the server and portal
    Test,
    /// Show token status or issue a one-off token
    Token(TokenArgs),
    /// Show server version, folders and service count
    ServerInfo,
    /// List the operations exposed to tool callers
    Capabilities,
    /// Invoke an operation by name with JSON arguments
    Call(CallArgs),
}
