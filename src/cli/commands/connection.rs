use anyhow::Result;
use colored::*;
use serde_json::Value;

use crate::api::ArcgisClient;

pub async fn test_command(client: &ArcgisClient) -> Result<()> {
    println!("🔌 {}", "Testing connection...".dimmed());
    let report = client.test_connection().await;

    print_probe("Server", &report["server"]);
    print_probe("Portal", &report["portal"]);

    let connected = report["server"]["status"] == "connected" && report["portal"]["status"] == "connected";
    if !connected {
        anyhow::bail!("Connection test failed");
    }
    Ok(())
}

fn print_probe(label: &str, probe: &Value) {
    let url = probe["url"].as_str().unwrap_or("");
    if probe["status"] == "connected" {
        println!("✅ {} {}", label.bold(), url.cyan());
        if let Some(count) = probe.get("services_count") {
            println!("   {} root services, {} folders", count, probe["folders_count"]);
        }
    } else {
        println!("❌ {} {}", label.bold(), url.cyan());
        println!("   {}", probe["error"].as_str().unwrap_or("unknown error").red());
    }
}

pub async fn server_info_command(client: &ArcgisClient) -> Result<()> {
    let info = client.get_server_info().await?;

    println!("🖥️  {}", client.credentials().server_url().bright_green().bold());
    println!("   Version:  {}", info["server_version"]);
    println!("   Services: {}", info["services_count"]);
    if let Some(folders) = info["folders"].as_array() {
        let names: Vec<&str> = folders.iter().filter_map(|f| f.as_str()).collect();
        println!("   Folders:  {}", names.join(", "));
    }
    Ok(())
}
