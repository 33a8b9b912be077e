//! Layer query parameters
//!
//! `QuerySpec` is the reusable description of a layer query. `to_params`
//! turns it into the ordered parameter list sent to `.../query`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

use crate::api::constants::{params, DEFAULT_MAX_RECORD_COUNT, DEFAULT_OUT_FIELDS, DEFAULT_WHERE, FORMAT_PARAM};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryType {
    #[serde(rename = "esriGeometryPoint")]
    Point,
    #[serde(rename = "esriGeometryMultipoint")]
    Multipoint,
    #[serde(rename = "esriGeometryPolyline")]
    Polyline,
    #[serde(rename = "esriGeometryPolygon")]
    Polygon,
    #[default]
    #[serde(rename = "esriGeometryEnvelope")]
    Envelope,
}

impl GeometryType {
    pub const ALL: [GeometryType; 5] = [
        GeometryType::Point,
        GeometryType::Multipoint,
        GeometryType::Polyline,
        GeometryType::Polygon,
        GeometryType::Envelope,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GeometryType::Point => "esriGeometryPoint",
            GeometryType::Multipoint => "esriGeometryMultipoint",
            GeometryType::Polyline => "esriGeometryPolyline",
            GeometryType::Polygon => "esriGeometryPolygon",
            GeometryType::Envelope => "esriGeometryEnvelope",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpatialRelationship {
    #[default]
    #[serde(rename = "esriSpatialRelIntersects")]
    Intersects,
    #[serde(rename = "esriSpatialRelContains")]
    Contains,
    #[serde(rename = "esriSpatialRelCrosses")]
    Crosses,
    #[serde(rename = "esriSpatialRelEnvelopeIntersects")]
    EnvelopeIntersects,
    #[serde(rename = "esriSpatialRelIndexIntersects")]
    IndexIntersects,
    #[serde(rename = "esriSpatialRelOverlaps")]
    Overlaps,
    #[serde(rename = "esriSpatialRelTouches")]
    Touches,
    #[serde(rename = "esriSpatialRelWithin")]
    Within,
}

impl SpatialRelationship {
    pub const ALL: [SpatialRelationship; 8] = [
        SpatialRelationship::Intersects,
        SpatialRelationship::Contains,
        SpatialRelationship::Crosses,
        SpatialRelationship::EnvelopeIntersects,
        SpatialRelationship::IndexIntersects,
        SpatialRelationship::Overlaps,
        SpatialRelationship::Touches,
        SpatialRelationship::Within,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SpatialRelationship::Intersects => "esriSpatialRelIntersects",
            SpatialRelationship::Contains => "esriSpatialRelContains",
            SpatialRelationship::Crosses => "esriSpatialRelCrosses",
            SpatialRelationship::EnvelopeIntersects => "esriSpatialRelEnvelopeIntersects",
            SpatialRelationship::IndexIntersects => "esriSpatialRelIndexIntersects",
            SpatialRelationship::Overlaps => "esriSpatialRelOverlaps",
            SpatialRelationship::Touches => "esriSpatialRelTouches",
            SpatialRelationship::Within => "esriSpatialRelWithin",
        }
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for SpatialRelationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the full esri name or the short form (`point`, `envelope`, ...)
impl FromStr for GeometryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        GeometryType::ALL
            .into_iter()
            .find(|g| g.as_str().to_lowercase() == wanted || g.as_str()[12..].to_lowercase() == wanted)
            .ok_or_else(|| format!("Unknown geometry type: {}", s))
    }
}

/// Accepts the full esri name or the short form (`intersects`, `within`, ...)
impl FromStr for SpatialRelationship {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        SpatialRelationship::ALL
            .into_iter()
            .find(|r| r.as_str().to_lowercase() == wanted || r.as_str()[14..].to_lowercase() == wanted)
            .ok_or_else(|| format!("Unknown spatial relationship: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatisticType {
    Count,
    Sum,
    Min,
    Max,
    Avg,
    Stddev,
    Var,
}

/// One entry of `outStatistics`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutStatistic {
    pub statistic_type: StatisticType,
    pub on_statistic_field: String,
    pub out_statistic_field_name: String,
}

impl OutStatistic {
    pub fn new(statistic_type: StatisticType, field: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            statistic_type,
            on_statistic_field: field.into(),
            out_statistic_field_name: alias.into(),
        }
    }
}

/// Axis-aligned query envelope
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
    pub wkid: Option<u32>,
}

impl Envelope {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self { xmin, ymin, xmax, ymax, wkid: None }
    }

    pub fn with_wkid(mut self, wkid: u32) -> Self {
        self.wkid = Some(wkid);
        self
    }

    pub fn to_value(&self) -> Value {
        let mut value = json!({
            "xmin": self.xmin,
            "ymin": self.ymin,
            "xmax": self.xmax,
            "ymax": self.ymax,
        });
        if let Some(wkid) = self.wkid {
            value["spatialReference"] = json!({ "wkid": wkid });
        }
        value
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySpec {
    pub where_clause: String,
    pub out_fields: String,
    pub return_geometry: bool,
    pub return_ids_only: bool,
    pub return_count_only: bool,
    pub return_distinct_values: bool,
    pub return_extent_only: bool,
    pub order_by_fields: Option<String>,
    pub group_by_fields: Option<String>,
    pub statistics: Option<Vec<OutStatistic>>,
    pub object_ids: Option<Vec<i64>>,
    pub geometry: Option<Value>,
    pub geometry_type: GeometryType,
    pub spatial_relationship: SpatialRelationship,
    pub result_offset: Option<i64>,
    pub result_record_count: Option<i64>,
    pub max_record_count: u32,
    /// Raw parameters applied after the typed ones
    #[serde(skip)]
    pub(super) overrides: Vec<(String, String)>,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            where_clause: DEFAULT_WHERE.to_string(),
            out_fields: DEFAULT_OUT_FIELDS.to_string(),
            return_geometry: true,
            return_ids_only: false,
            return_count_only: false,
            return_distinct_values: false,
            return_extent_only: false,
            order_by_fields: None,
            group_by_fields: None,
            statistics: None,
            object_ids: None,
            geometry: None,
            geometry_type: GeometryType::default(),
            spatial_relationship: SpatialRelationship::default(),
            result_offset: None,
            result_record_count: None,
            max_record_count: DEFAULT_MAX_RECORD_COUNT,
            overrides: Vec::new(),
        }
    }
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a raw parameter, replacing any parameter of the same name
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.overrides.retain(|(k, _)| *k != key);
        self.overrides.push((key, value.into()));
        self
    }

    pub fn overrides(&self) -> &[(String, String)] {
        &self.overrides
    }

    /// Ordered query parameters, `f=json` first, without the token
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = Vec::new();
        let mut push = |key: &str, value: String| out.push((key.to_string(), value));

        push(FORMAT_PARAM.0, FORMAT_PARAM.1.to_string());

        let where_clause = self.where_clause.trim();
        push(
            params::WHERE,
            if where_clause.is_empty() { DEFAULT_WHERE.to_string() } else { where_clause.to_string() },
        );
        push(params::OUT_FIELDS, self.out_fields.clone());
        push(params::RETURN_GEOMETRY, self.return_geometry.to_string());
        push(params::RETURN_IDS_ONLY, self.return_ids_only.to_string());
        push(params::RETURN_COUNT_ONLY, self.return_count_only.to_string());
        push(params::RETURN_DISTINCT_VALUES, self.return_distinct_values.to_string());
        push(params::RETURN_EXTENT_ONLY, self.return_extent_only.to_string());

        match self.result_record_count.filter(|count| *count > 0) {
            Some(count) => push(params::RESULT_RECORD_COUNT, count.to_string()),
            None => push(params::MAX_RECORD_COUNT, self.max_record_count.to_string()),
        }

        if let Some(ids) = self.object_ids.as_ref().filter(|ids| !ids.is_empty()) {
            let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
            push(params::OBJECT_IDS, ids.join(","));
        }

        if let Some(geometry) = self.geometry.as_ref().filter(|g| !g.is_null()) {
            push(params::GEOMETRY, geometry.to_string());
            push(params::GEOMETRY_TYPE, self.geometry_type.as_str().to_string());
            push(params::SPATIAL_REL, self.spatial_relationship.as_str().to_string());
        }

        if let Some(order_by) = non_empty(&self.order_by_fields) {
            push(params::ORDER_BY_FIELDS, order_by.to_string());
        }
        if let Some(group_by) = non_empty(&self.group_by_fields) {
            push(params::GROUP_BY_FIELDS, group_by.to_string());
        }
        if let Some(statistics) = self.statistics.as_ref().filter(|s| !s.is_empty()) {
            push(params::OUT_STATISTICS, serde_json::to_string(statistics).unwrap_or_default());
        }

        if let Some(offset) = self.result_offset.filter(|offset| *offset > 0) {
            push(params::RESULT_OFFSET, offset.to_string());
        }

        for (key, value) in &self.overrides {
            apply_override(&mut out, key, value);
        }

        out
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Replace or append `key`; the two record-count keys exclude each other
fn apply_override(params_out: &mut Vec<(String, String)>, key: &str, value: &str) {
    let exclusive = match key {
        params::RESULT_RECORD_COUNT => Some(params::MAX_RECORD_COUNT),
        params::MAX_RECORD_COUNT => Some(params::RESULT_RECORD_COUNT),
        _ => None,
    };
    if let Some(other) = exclusive {
        params_out.retain(|(k, _)| k != other);
    }

    match params_out.iter_mut().find(|(k, _)| k == key) {
        Some(existing) => existing.1 = value.to_string(),
        None => params_out.push((key.to_string(), value.to_string())),
    }
}
