//! Tool-calling boundary
//!
//! `ToolAdapter::invoke` takes an operation name plus JSON arguments and
//! always answers with a `ToolEnvelope`. Errors are reported in the envelope
//! and never returned as Rust errors.

use log::{info, warn};
use serde::Serialize;
use serde_json::{json, Value};

use crate::api::client::ArcgisClient;
use crate::api::error::{ArcgisError, Result};
use crate::api::query::{GeometryType, OutStatistic, QuerySpec, SpatialRelationship};
use crate::capability::{self, BoundArguments, CapabilityDescriptor};

const SUGGESTION_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolEnvelope {
    pub output: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ToolEnvelope {
    pub fn ok(output: Value) -> Self {
        Self {
            output,
            error: None,
            error_kind: None,
            details: None,
        }
    }

    pub fn from_error(err: &ArcgisError) -> Self {
        Self {
            output: Value::Null,
            error: Some(err.to_string()),
            error_kind: Some(err.kind()),
            details: err.details(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn to_value(&self) -> Value {
        json!(self)
    }
}

pub struct ToolAdapter {
    client: ArcgisClient,
}

impl ToolAdapter {
    pub fn new(client: ArcgisClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ArcgisClient {
        &self.client
    }

    pub fn capabilities(&self) -> &'static [CapabilityDescriptor] {
        capability::descriptors()
    }

    pub async fn invoke(&self, name: &str, args: Value) -> ToolEnvelope {
        info!("Invoking tool '{}'", name);

        let descriptor = match capability::find(name) {
            Some(descriptor) => descriptor,
            None => {
                let err = ArcgisError::validation("name", format!("unknown operation '{}'", name));
                return ToolEnvelope::from_error(&err);
            }
        };

        let result = match descriptor.bind_arguments(&args) {
            Ok(bound) => self.dispatch(descriptor.name, &bound).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(output) => ToolEnvelope::ok(output),
            Err(err) => {
                warn!("Tool '{}' failed: {}", name, err);
                let mut envelope = ToolEnvelope::from_error(&err);
                if let ArcgisError::NotFound { name: service, .. } = &err {
                    self.attach_suggestions(&mut envelope, service);
                }
                envelope
            }
        }
    }

    async fn dispatch(&self, name: &str, args: &BoundArguments) -> Result<Value> {
        match name {
            "list_services" => self.client.list_services().await,
            "get_service_details" => {
                self.client
                    .get_service_details(args.str("service_name"), args.str("folder"))
                    .await
            }
            "query_service_layer" => {
                let spec = query_spec_from_args(args)?;
                self.client
                    .query_service_layer(args.str("service_name"), args.str("folder"), layer_id(args)?, &spec)
                    .await
            }
            "get_layer_info" => {
                self.client
                    .get_layer_info(args.str("service_name"), args.str("folder"), layer_id(args)?)
                    .await
            }
            "test_connection" => Ok(self.client.test_connection().await),
            "get_token_status" => Ok(json!(self.client.token_status())),
            "get_server_info" => self.client.get_server_info().await,
            "get_portal_info" => Ok(self.client.get_portal_info()),
            "get_portal_token" => {
                let expiration = u32::try_from(args.int("expiration"))
                    .ok()
                    .filter(|minutes| *minutes > 0)
                    .ok_or_else(|| ArcgisError::validation("expiration", "must be a positive number of minutes"))?;
                self.client.get_portal_token(expiration).await
            }
            other => Err(ArcgisError::validation("name", format!("unknown operation '{}'", other))),
        }
    }

    /// Offer near-miss names from the catalog the lookup just used
    fn attach_suggestions(&self, envelope: &mut ToolEnvelope, service_name: &str) {
        let last_segment = service_name.rsplit('/').next().unwrap_or(service_name);
        let suggestions = self.client.suggest_recent(last_segment, SUGGESTION_LIMIT);
        if suggestions.is_empty() {
            return;
        }
        let details = envelope.details.get_or_insert_with(|| json!({}));
        if let Some(object) = details.as_object_mut() {
            object.insert("suggestions".to_string(), json!(suggestions));
        }
    }
}

fn layer_id(args: &BoundArguments) -> Result<u32> {
    u32::try_from(args.int("layer_id")).map_err(|_| ArcgisError::validation("layer_id", "must be a non-negative integer"))
}

/// Translate bound `query_service_layer` arguments into a `QuerySpec`
pub fn query_spec_from_args(args: &BoundArguments) -> Result<QuerySpec> {
    let geometry_type = args
        .str("geometry_type")
        .parse::<GeometryType>()
        .map_err(|e| ArcgisError::validation("geometry_type", e))?;
    let spatial_relationship = args
        .str("spatial_rel")
        .parse::<SpatialRelationship>()
        .map_err(|e| ArcgisError::validation("spatial_rel", e))?;

    let object_ids = match args.value("object_ids") {
        Value::Null => None,
        Value::Array(ids) => Some(
            ids.iter()
                .map(|id| {
                    id.as_i64()
                        .or_else(|| id.as_str().and_then(|s| s.trim().parse().ok()))
                        .ok_or_else(|| ArcgisError::validation("object_ids", format!("not an object id: {}", id)))
                })
                .collect::<Result<Vec<i64>>>()?,
        ),
        _ => None,
    };

    let statistics = match args.value("out_statistics") {
        Value::Null => None,
        value => Some(
            serde_json::from_value::<Vec<OutStatistic>>(value.clone())
                .map_err(|e| ArcgisError::validation("out_statistics", e.to_string()))?,
        ),
    };

    let max_record_count = u32::try_from(args.int("max_record_count"))
        .map_err(|_| ArcgisError::validation("max_record_count", "must be a non-negative integer"))?;

    let mut spec = QuerySpec::new();
    spec.where_clause = args.str("where").to_string();
    spec.out_fields = args.opt_str("out_fields").unwrap_or("*").to_string();
    spec.return_geometry = args.bool("return_geometry");
    spec.return_ids_only = args.bool("return_ids_only");
    spec.return_count_only = args.bool("return_count_only");
    spec.return_distinct_values = args.bool("return_distinct_values");
    spec.return_extent_only = args.bool("return_extent_only");
    spec.order_by_fields = args.opt_str("order_by_fields").map(str::to_string);
    spec.group_by_fields = args.opt_str("group_by_fields_for_statistics").map(str::to_string);
    spec.statistics = statistics;
    spec.object_ids = object_ids;
    spec.geometry = Some(args.value("geometry").clone()).filter(|g| !g.is_null());
    spec.geometry_type = geometry_type;
    spec.spatial_relationship = spatial_relationship;
    spec.result_offset = Some(args.int("result_offset")).filter(|n| *n > 0);
    spec.result_record_count = Some(args.int("result_record_count")).filter(|n| *n > 0);
    spec.max_record_count = max_record_count;
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bind(args: Value) -> BoundArguments {
        capability::find("query_service_layer").unwrap().bind_arguments(&args).unwrap()
    }

    #[test]
    fn test_query_spec_defaults() {
        let spec = query_spec_from_args(&bind(json!({"service_name": "Parcels"}))).unwrap();
        assert_eq!(spec, QuerySpec::default());
    }

    #[test]
    fn test_query_spec_from_full_arguments() {
        let spec = query_spec_from_args(&bind(json!({
            "service_name": "Parcels",
            "where": "ZONE = 'R1'",
            "object_ids": [1, "2"],
            "geometry": {"x": 1.0, "y": 2.0},
            "geometry_type": "esriGeometryPoint",
            "spatial_rel": "esriSpatialRelWithin",
            "out_statistics": [{"statisticType": "count", "onStatisticField": "OBJECTID", "outStatisticFieldName": "N"}],
            "result_record_count": 10
        })))
        .unwrap();

        assert_eq!(spec.where_clause, "ZONE = 'R1'");
        assert_eq!(spec.object_ids, Some(vec![1, 2]));
        assert_eq!(spec.geometry_type, GeometryType::Point);
        assert_eq!(spec.spatial_relationship, SpatialRelationship::Within);
        assert_eq!(spec.statistics.as_ref().map(Vec::len), Some(1));
        assert_eq!(spec.result_record_count, Some(10));
    }

    #[test]
    fn test_query_spec_rejects_bad_geometry_type() {
        let err = query_spec_from_args(&bind(json!({"service_name": "Parcels", "geometry_type": "blob"}))).unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn test_envelope_serialization() {
        let ok = ToolEnvelope::ok(json!({"count": 1})).to_value();
        assert_eq!(ok, json!({"output": {"count": 1}}));

        let err = ToolEnvelope::from_error(&ArcgisError::not_found("Unknown", "")).to_value();
        assert_eq!(err["output"], Value::Null);
        assert_eq!(err["error"], "Service 'Unknown' not found in folder ''");
        assert_eq!(err["error_kind"], "not_found");
        assert_eq!(err["details"]["name"], "Unknown");
    }
}
