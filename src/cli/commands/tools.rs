use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use serde_json::Value;

use crate::adapter::ToolAdapter;
use crate::capability;

#[derive(Args)]
pub struct CallArgs {
    /// Operation name (see `capabilities`)
    pub tool: String,

    /// Arguments as a JSON object
    #[arg(long)]
    pub args: Option<String>,
}

pub fn capabilities_command() -> Result<()> {
    let listing = capability::list_value();
    println!("{}", serde_json::to_string_pretty(&listing)?);
    Ok(())
}

/// Invoke an operation through the tool boundary and print its envelope
pub async fn call_command(adapter: ToolAdapter, args: CallArgs) -> Result<()> {
    let arguments: Value = match &args.args {
        Some(raw) => serde_json::from_str(raw).context("Failed to parse --args as JSON")?,
        None => Value::Null,
    };

    let envelope = adapter.invoke(&args.tool, arguments).await;
    println!("{}", serde_json::to_string_pretty(&envelope.to_value())?);

    if let Some(error) = &envelope.error {
        eprintln!("❌ {}", error.red());
        anyhow::bail!("{} failed", args.tool);
    }
    Ok(())
}
