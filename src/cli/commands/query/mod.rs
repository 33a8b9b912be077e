pub mod handler;

use clap::Args;
use std::path::PathBuf;

use crate::api::query::{GeometryType, SpatialRelationship};
use crate::cli::output::OutputFormat;

pub use handler::handle_query_command;

#[derive(Args, Debug, Clone)]
pub struct QueryCommands {
    /// Service name, optionally prefixed with its folder (e.g. Hosted/Parcels)
    pub service: String,

    /// Folder containing the service
    #[arg(short, long, default_value = "")]
    pub folder: String,

    /// Layer ID within the service
    #[arg(short, long, default_value_t = 0)]
    pub layer: u32,

    /// SQL where clause (e.g. "POP > 1000")
    #[arg(short, long = "where")]
    pub where_clause: Option<String>,

    /// Comma-separated fields to return
    #[arg(long, value_delimiter = ',')]
    pub fields: Vec<String>,

    /// Leave feature geometry out of the response
    #[arg(long)]
    pub no_geometry: bool,

    /// Return only object IDs
    #[arg(long)]
    pub ids_only: bool,

    /// Return only the number of matching features
    #[arg(long)]
    pub count: bool,

    /// Return distinct attribute values
    #[arg(long)]
    pub distinct: bool,

    /// Return only the extent of matching features
    #[arg(long)]
    pub extent_only: bool,

    /// Sort order (e.g. "NAME ASC, POP DESC")
    #[arg(long)]
    pub order_by: Option<String>,

    /// Comma-separated fields to group statistics by
    #[arg(long, value_delimiter = ',')]
    pub group_by: Vec<String>,

    /// Statistics definitions as a JSON array
    #[arg(long)]
    pub statistics: Option<String>,

    /// Comma-separated object IDs
    #[arg(long, value_delimiter = ',')]
    pub object_ids: Vec<i64>,

    /// Filter geometry as JSON
    #[arg(long, conflicts_with = "bbox")]
    pub geometry: Option<String>,

    /// Geometry type of --geometry (point, multipoint, polyline, polygon, envelope)
    #[arg(long, default_value = "envelope")]
    pub geometry_type: GeometryType,

    /// Envelope filter as xmin,ymin,xmax,ymax
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub bbox: Vec<f64>,

    /// Spatial reference WKID of --bbox
    #[arg(long)]
    pub wkid: Option<u32>,

    /// Spatial relationship (intersects, contains, within, ...)
    #[arg(long, default_value = "intersects")]
    pub spatial_rel: SpatialRelationship,

    /// Number of records to skip
    #[arg(long)]
    pub offset: Option<i64>,

    /// Number of records to return
    #[arg(long)]
    pub limit: Option<i64>,

    /// Record cap used when --limit is not set
    #[arg(long)]
    pub max_records: Option<u32>,

    /// Extra raw query parameter as key=value (repeatable)
    #[arg(long = "param", value_parser = parse_key_val)]
    pub params: Vec<(String, String)>,

    /// Output format
    #[arg(long, default_value = "json")]
    pub format: OutputFormat,

    /// Pretty print the output
    #[arg(short, long)]
    pub pretty: bool,

    /// Show the request URL and parameters without executing
    #[arg(long)]
    pub dry: bool,

    /// Save query results to file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Show query execution time and statistics
    #[arg(long)]
    pub stats: bool,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    if key.trim().is_empty() {
        return Err(format!("empty parameter name in '{}'", s));
    }
    Ok((key.trim().to_string(), value.to_string()))
}
