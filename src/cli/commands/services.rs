use anyhow::Result;
use clap::Args;
use colored::*;
use serde_json::{json, Value};

use super::with_suggestions;
use crate::api::{ArcgisClient, ServiceCategory};
use crate::cli::output::{format_output, OutputFormat};

#[derive(Args)]
pub struct ServicesArgs {
    /// Only list services of this category (system, hosted, custom)
    #[arg(short, long)]
    pub category: Option<ServiceCategory>,

    /// Output format
    #[arg(long, default_value = "table")]
    pub format: OutputFormat,

    /// Pretty print JSON output
    #[arg(short, long)]
    pub pretty: bool,
}

#[derive(Args)]
pub struct ServiceArgs {
    /// Service name, optionally prefixed with its folder (e.g. Hosted/Parcels)
    pub name: String,

    /// Folder containing the service
    #[arg(short, long, default_value = "")]
    pub folder: String,
}

#[derive(Args)]
pub struct LayerArgs {
    /// Service name, optionally prefixed with its folder
    pub name: String,

    /// Folder containing the service
    #[arg(short, long, default_value = "")]
    pub folder: String,

    /// Layer ID within the service
    #[arg(short, long, default_value_t = 0)]
    pub layer: u32,
}

pub async fn services_command(client: &ArcgisClient, args: ServicesArgs) -> Result<()> {
    let catalog = client.catalog().await?;

    for skipped in catalog.skipped_folders() {
        println!("⚠️  Skipped folder {}: {}", skipped.folder.yellow(), skipped.error.dimmed());
    }

    let listing = match args.category {
        Some(category) => {
            let services: Vec<Value> = catalog.by_category(category).iter().map(|s| s.to_value()).collect();
            json!({ "services": services, "count": services.len(), "category": category.as_str() })
        }
        None => catalog.to_value(),
    };

    if args.format == OutputFormat::Table {
        let summary = catalog.summary();
        println!(
            "📋 {} services ({} system, {} hosted, {} custom)",
            summary.total.to_string().bright_green().bold(),
            summary.system_services,
            summary.hosted_services,
            summary.custom_services
        );
        if let Some(category) = args.category {
            println!("🔎 Showing {}", category.description().cyan());
        }
        println!();
    }

    println!("{}", format_output(&listing, args.format, args.pretty)?);
    Ok(())
}

pub async fn service_command(client: &ArcgisClient, args: ServiceArgs) -> Result<()> {
    let result = client.get_service_details(&args.name, &args.folder).await;
    let details = with_suggestions(client, result)?;

    if let Some(path) = details.pointer("/service_metadata/full_path").and_then(|p| p.as_str()) {
        println!("🗺️  {}", path.bright_green().bold());
    }
    println!("{}", serde_json::to_string_pretty(&details)?);
    Ok(())
}

pub async fn layer_command(client: &ArcgisClient, args: LayerArgs) -> Result<()> {
    let result = client.get_layer_info(&args.name, &args.folder, args.layer).await;
    let info = with_suggestions(client, result)?;

    if let Some(name) = info.get("name").and_then(|n| n.as_str()) {
        let geometry = info.get("geometryType").and_then(|g| g.as_str()).unwrap_or("none");
        println!("🧭 Layer {}: {} ({})", args.layer, name.bright_green().bold(), geometry.dimmed());
    }
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}
