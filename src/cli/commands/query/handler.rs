//! Query command handler

use anyhow::{Context, Result};
use colored::*;
use std::fs;
use std::time::Instant;

use super::QueryCommands;
use crate::api::query::{Envelope, OutStatistic, QueryBuilder, QueryResult, QuerySpec};
use crate::api::ArcgisClient;
use crate::cli::commands::with_suggestions;
use crate::cli::output::format_output;
use crate::config::Config;

pub async fn handle_query_command(client: &ArcgisClient, config: &Config, args: QueryCommands) -> Result<()> {
    let spec = build_spec(&args, config.settings.default_max_record_count)?;

    if args.dry {
        let query = client
            .build_query(&args.service, &args.folder, args.layer, &spec)
            .await
            .context("Failed to resolve service")?;

        println!("🔍 Request URL:");
        println!();
        println!("{}", query.to_url());
        println!();
        println!("📝 Parameters:");
        for (key, value) in &query.params {
            println!("   {} = {}", key.cyan(), value);
        }
        return Ok(());
    }

    println!("🚀 {}", format!("Querying {} layer {}...", args.service, args.layer).dimmed());
    let started = Instant::now();

    let result = client
        .query_service_layer(&args.service, &args.folder, args.layer, &spec)
        .await;
    let response = with_suggestions(client, result)?;
    let elapsed = started.elapsed();

    if args.stats {
        let summary = QueryResult::from_json(response.clone());
        println!("⏱️  Execution time: {:.2}ms", elapsed.as_secs_f64() * 1000.0);
        match summary.count {
            Some(count) => println!("📊 Count: {}", count),
            None => println!("📊 Features returned: {}", summary.len()),
        }
        if summary.has_more() {
            println!("⚠️  {}", "Transfer limit exceeded; more records are available".yellow());
        }
        println!();
    }

    let formatted_output = format_output(&response, args.format, args.pretty)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &formatted_output)
            .with_context(|| format!("Failed to write output to: {}", output_path.display()))?;
        println!("💾 Results saved to: {}", output_path.display().to_string().bright_green());
    } else {
        println!("📋 Results:");
        println!();
        println!("{}", formatted_output);
    }

    Ok(())
}

/// Translate command-line flags into a `QuerySpec`
pub fn build_spec(args: &QueryCommands, default_max_record_count: u32) -> Result<QuerySpec> {
    let mut builder = QueryBuilder::new()
        .max_record_count(args.max_records.unwrap_or(default_max_record_count))
        .return_geometry(!args.no_geometry)
        .spatial_relationship(args.spatial_rel);

    if let Some(clause) = &args.where_clause {
        builder = builder.where_clause(clause.as_str());
    }
    if !args.fields.is_empty() {
        let fields: Vec<&str> = args.fields.iter().map(|f| f.trim()).collect();
        builder = builder.select(&fields);
    }
    if args.ids_only {
        builder = builder.ids_only();
    }
    if args.count {
        builder = builder.count_only();
    }
    if args.distinct {
        builder = builder.distinct_values();
    }
    if args.extent_only {
        builder = builder.extent_only();
    }
    if !args.group_by.is_empty() {
        let fields: Vec<&str> = args.group_by.iter().map(|f| f.trim()).collect();
        builder = builder.group_by(&fields);
    }
    if let Some(statistics) = &args.statistics {
        let statistics: Vec<OutStatistic> =
            serde_json::from_str(statistics).context("Failed to parse --statistics as JSON")?;
        for statistic in statistics {
            builder = builder.statistic(statistic);
        }
    }
    if !args.object_ids.is_empty() {
        builder = builder.object_ids(&args.object_ids);
    }
    if let Some(geometry) = &args.geometry {
        let geometry = serde_json::from_str(geometry).context("Failed to parse --geometry as JSON")?;
        builder = builder.geometry(geometry, args.geometry_type);
    }
    if !args.bbox.is_empty() && args.bbox.len() != 4 {
        anyhow::bail!("--bbox expects xmin,ymin,xmax,ymax");
    }
    if let [xmin, ymin, xmax, ymax] = args.bbox[..] {
        let mut envelope = Envelope::new(xmin, ymin, xmax, ymax);
        if let Some(wkid) = args.wkid {
            envelope = envelope.with_wkid(wkid);
        }
        builder = builder.envelope(envelope);
    }
    if let Some(offset) = args.offset.filter(|o| *o > 0) {
        builder = builder.offset(offset);
    }
    if let Some(limit) = args.limit.filter(|l| *l > 0) {
        builder = builder.top(limit);
    }
    for (key, value) in &args.params {
        builder = builder.param(key.as_str(), value.as_str());
    }

    let mut spec = builder.build();
    if let Some(order_by) = args.order_by.as_deref().map(str::trim).filter(|o| !o.is_empty()) {
        spec.order_by_fields = Some(order_by.to_string());
    }
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::query::{GeometryType, SpatialRelationship};
    use crate::cli::app::{Cli, Commands};
    use clap::Parser;

    fn parse(extra: &[&str]) -> QueryCommands {
        let mut argv = vec!["arcgis-cli", "query", "Hosted/TouristAttractions"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Query(args) => args,
            _ => panic!("expected query command"),
        }
    }

    fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_defaults() {
        let spec = build_spec(&parse(&[]), 1000).unwrap();
        assert_eq!(spec, QuerySpec::default());
    }

    #[test]
    fn test_flags_map_to_params() {
        let args = parse(&[
            "--where", "TYPE = 'museum'",
            "--fields", "NAME,TYPE",
            "--no-geometry",
            "--limit", "25",
            "--offset", "50",
            "--order-by", "NAME ASC",
            "--param", "outSR=4326",
        ]);
        let params = build_spec(&args, 1000).unwrap().to_params();

        assert_eq!(param(&params, "where"), Some("TYPE = 'museum'"));
        assert_eq!(param(&params, "outFields"), Some("NAME,TYPE"));
        assert_eq!(param(&params, "returnGeometry"), Some("false"));
        assert_eq!(param(&params, "resultRecordCount"), Some("25"));
        assert_eq!(param(&params, "maxRecordCount"), None);
        assert_eq!(param(&params, "resultOffset"), Some("50"));
        assert_eq!(param(&params, "orderByFields"), Some("NAME ASC"));
        assert_eq!(param(&params, "outSR"), Some("4326"));
    }

    #[test]
    fn test_bbox_becomes_envelope() {
        let args = parse(&["--bbox", "1.5,50.0,2.5,51.0", "--wkid", "4326", "--spatial-rel", "within"]);
        let spec = build_spec(&args, 1000).unwrap();

        assert_eq!(spec.geometry_type, GeometryType::Envelope);
        assert_eq!(spec.spatial_relationship, SpatialRelationship::Within);
        let geometry = spec.geometry.unwrap();
        assert_eq!(geometry["xmin"], 1.5);
        assert_eq!(geometry["spatialReference"]["wkid"], 4326);
    }

    #[test]
    fn test_max_records_from_config() {
        let spec = build_spec(&parse(&[]), 250).unwrap();
        assert_eq!(spec.max_record_count, 250);
    }

    #[test]
    fn test_bad_statistics_json() {
        assert!(build_spec(&parse(&["--statistics", "not json"]), 1000).is_err());
    }

    #[test]
    fn test_bbox_needs_four_values() {
        assert!(build_spec(&parse(&["--bbox", "1.0,2.0"]), 1000).is_err());
    }

    #[test]
    fn test_parse_key_val() {
        assert!(Cli::try_parse_from(["arcgis-cli", "query", "Parcels", "--param", "novalue"]).is_err());
    }
}
