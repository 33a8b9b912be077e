//! Static capability descriptors for the exposed operations
//!
//! The operation table is plain `const` metadata. Descriptors with resolved
//! defaults are built from it once, on first access, and shared afterwards.
//! `bind_arguments` applies a descriptor to caller-supplied JSON arguments.

use log::debug;
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt;

use crate::api::error::{ArcgisError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HttpMethod {
    #[serde(rename = "GET")]
    Get,
    #[serde(rename = "POST")]
    Post,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// A declared default, expressible in a `const` table
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Str(&'static str),
}

impl Literal {
    fn to_value(self) -> Value {
        match self {
            Literal::Bool(b) => Value::Bool(b),
            Literal::Int(i) => json!(i),
            Literal::Str(s) => Value::String(s.to_string()),
        }
    }
}

/// Parameter metadata as declared in the operation table
#[derive(Debug, Clone, Copy)]
pub struct ParamMeta {
    pub name: &'static str,
    pub param_type: ParamType,
    pub required: bool,
    pub default: Option<Literal>,
    pub description: &'static str,
}

/// Operation metadata as declared in the operation table
#[derive(Debug, Clone, Copy)]
pub struct OperationMeta {
    pub name: &'static str,
    pub description: &'static str,
    pub endpoint: &'static str,
    pub http_method: HttpMethod,
    pub parameters: &'static [ParamMeta],
}

/// A parameter with its effective default
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSpec {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    pub description: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapabilityDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub endpoint: &'static str,
    pub http_method: HttpMethod,
    pub parameters: Vec<ParameterSpec>,
}

/// Default used for an optional parameter that declares none
pub fn default_for(param_type: ParamType) -> Value {
    match param_type {
        ParamType::Boolean => Value::Bool(false),
        ParamType::Integer => json!(0),
        ParamType::Number => json!(0.0),
        ParamType::String => Value::String(String::new()),
        ParamType::Array | ParamType::Object => Value::Null,
    }
}

/// Resolve declared metadata into a descriptor.
///
/// Required parameters never carry a default.
pub fn describe(meta: &OperationMeta) -> CapabilityDescriptor {
    let parameters = meta
        .parameters
        .iter()
        .map(|p| ParameterSpec {
            name: p.name,
            param_type: p.param_type,
            required: p.required,
            default: if p.required {
                None
            } else {
                Some(p.default.map(Literal::to_value).unwrap_or_else(|| default_for(p.param_type)))
            },
            description: p.description,
        })
        .collect();

    CapabilityDescriptor {
        name: meta.name,
        description: meta.description,
        endpoint: meta.endpoint,
        http_method: meta.http_method,
        parameters,
    }
}

impl CapabilityDescriptor {
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Listing form: parameters keyed by name
    pub fn to_value(&self) -> Value {
        let parameters: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| {
                let mut spec = json!({
                    "type": p.param_type,
                    "description": p.description,
                    "required": p.required,
                });
                if let Some(default) = &p.default {
                    spec["default"] = default.clone();
                }
                (p.name.to_string(), spec)
            })
            .collect();

        json!({
            "name": self.name,
            "description": self.description,
            "endpoint": self.endpoint,
            "method": self.http_method,
            "parameters": parameters,
        })
    }

    /// JSON-Schema object describing the arguments
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for p in &self.parameters {
            let mut property = json!({
                "type": p.param_type,
                "description": p.description,
            });
            if let Some(default) = p.default.as_ref().filter(|d| !d.is_null()) {
                property["default"] = default.clone();
            }
            properties.insert(p.name.to_string(), property);
        }

        let required: Vec<&str> = self.parameters.iter().filter(|p| p.required).map(|p| p.name).collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Check and complete caller arguments.
    ///
    /// Missing optional parameters get their defaults, missing required ones
    /// fail, and keys the operation does not declare are dropped. Numeric and
    /// boolean values sent as strings are accepted when they parse.
    pub fn bind_arguments(&self, args: &Value) -> Result<BoundArguments> {
        let supplied = match args {
            Value::Null => Map::new(),
            Value::Object(map) => map.clone(),
            other => {
                return Err(ArcgisError::validation(
                    "arguments",
                    format!("expected an object, got {}", json_type_name(other)),
                ))
            }
        };

        for key in supplied.keys() {
            if self.parameter(key).is_none() {
                debug!("Dropping unknown argument '{}' for {}", key, self.name);
            }
        }

        let mut bound = Map::new();
        for p in &self.parameters {
            let value = match supplied.get(p.name).filter(|v| !v.is_null()) {
                Some(value) => coerce(p, value)?,
                None if p.required => {
                    return Err(ArcgisError::validation(p.name, "is required"));
                }
                None => p.default.clone().unwrap_or(Value::Null),
            };
            bound.insert(p.name.to_string(), value);
        }

        Ok(BoundArguments { values: bound })
    }
}

fn coerce(p: &ParameterSpec, value: &Value) -> Result<Value> {
    let mismatch = || {
        ArcgisError::validation(
            p.name,
            format!("expected {}, got {}", p.param_type, json_type_name(value)),
        )
    };

    match (p.param_type, value) {
        (ParamType::String, Value::String(_)) => Ok(value.clone()),
        (ParamType::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
        (ParamType::Integer, Value::Number(n)) => n.as_i64().map(|i| json!(i)).ok_or_else(mismatch),
        (ParamType::Integer, Value::String(s)) => s.trim().parse::<i64>().map(|i| json!(i)).map_err(|_| mismatch()),
        (ParamType::Number, Value::Number(_)) => Ok(value.clone()),
        (ParamType::Number, Value::String(s)) => s.trim().parse::<f64>().map(|f| json!(f)).map_err(|_| mismatch()),
        (ParamType::Boolean, Value::Bool(_)) => Ok(value.clone()),
        (ParamType::Boolean, Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(mismatch()),
        },
        (ParamType::Array, Value::Array(_)) => Ok(value.clone()),
        (ParamType::Object, Value::Object(_)) => Ok(value.clone()),
        _ => Err(mismatch()),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

static NULL: Value = Value::Null;

/// Arguments after defaults and type checks; every declared parameter is present
#[derive(Debug, Clone, PartialEq)]
pub struct BoundArguments {
    values: Map<String, Value>,
}

impl BoundArguments {
    pub fn value(&self, name: &str) -> &Value {
        self.values.get(name).unwrap_or(&NULL)
    }

    pub fn str(&self, name: &str) -> &str {
        self.value(name).as_str().unwrap_or("")
    }

    /// `None` for blank strings
    pub fn opt_str(&self, name: &str) -> Option<&str> {
        Some(self.str(name).trim()).filter(|s| !s.is_empty())
    }

    pub fn int(&self, name: &str) -> i64 {
        self.value(name).as_i64().unwrap_or(0)
    }

    pub fn bool(&self, name: &str) -> bool {
        self.value(name).as_bool().unwrap_or(false)
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }
}

const SERVICE_NAME: ParamMeta = ParamMeta {
    name: "service_name",
    param_type: ParamType::String,
    required: true,
    default: None,
    description: "Name of the service, optionally prefixed with its folder (e.g. Hosted/Parcels)",
};

const FOLDER: ParamMeta = ParamMeta {
    name: "folder",
    param_type: ParamType::String,
    required: false,
    default: Some(Literal::Str("")),
    description: "Folder containing the service (empty for the root folder)",
};

const LAYER_ID: ParamMeta = ParamMeta {
    name: "layer_id",
    param_type: ParamType::Integer,
    required: false,
    default: Some(Literal::Int(0)),
    description: "Layer ID within the service",
};

const fn optional(name: &'static str, param_type: ParamType, default: Option<Literal>, description: &'static str) -> ParamMeta {
    ParamMeta {
        name,
        param_type,
        required: false,
        default,
        description,
    }
}

const QUERY_PARAMETERS: &[ParamMeta] = &[
    SERVICE_NAME,
    FOLDER,
    LAYER_ID,
    optional("where", ParamType::String, Some(Literal::Str("1=1")), "SQL where clause; blank selects all records"),
    optional("object_ids", ParamType::Array, None, "Object IDs to return"),
    optional("geometry", ParamType::Object, None, "Geometry for a spatial filter, with spatialReference"),
    optional(
        "geometry_type",
        ParamType::String,
        Some(Literal::Str("esriGeometryEnvelope")),
        "Type of the filter geometry",
    ),
    optional(
        "spatial_rel",
        ParamType::String,
        Some(Literal::Str("esriSpatialRelIntersects")),
        "Spatial relationship between the filter geometry and features",
    ),
    optional("out_fields", ParamType::String, Some(Literal::Str("*")), "Comma-separated fields to return"),
    optional("return_geometry", ParamType::Boolean, Some(Literal::Bool(true)), "Include feature geometry"),
    optional("return_ids_only", ParamType::Boolean, None, "Return only object IDs"),
    optional("return_count_only", ParamType::Boolean, None, "Return only the feature count"),
    optional("order_by_fields", ParamType::String, None, "Sort order, e.g. \"NAME ASC\""),
    optional(
        "group_by_fields_for_statistics",
        ParamType::String,
        None,
        "Fields to group statistics by",
    ),
    optional(
        "out_statistics",
        ParamType::Array,
        None,
        "Statistics definitions (statisticType, onStatisticField, outStatisticFieldName)",
    ),
    optional("result_offset", ParamType::Integer, None, "Number of records to skip"),
    optional("result_record_count", ParamType::Integer, None, "Number of records to return; replaces max_record_count"),
    optional("return_distinct_values", ParamType::Boolean, None, "Return distinct attribute values"),
    optional("return_extent_only", ParamType::Boolean, None, "Return only the extent of matching features"),
    optional("max_record_count", ParamType::Integer, Some(Literal::Int(1000)), "Record cap when result_record_count is not set"),
];

/// Every exposed operation
pub const OPERATIONS: &[OperationMeta] = &[
    OperationMeta {
        name: "list_services",
        description: "Get all available ArcGIS services from the server (includes all folders)",
        endpoint: "/list-services",
        http_method: HttpMethod::Post,
        parameters: &[],
    },
    OperationMeta {
        name: "get_service_details",
        description: "Get detailed information about a specific ArcGIS service",
        endpoint: "/get-service-details",
        http_method: HttpMethod::Post,
        parameters: &[SERVICE_NAME, FOLDER],
    },
    OperationMeta {
        name: "query_service_layer",
        description: "Query features of a service layer with attribute, spatial and statistics filters",
        endpoint: "/query-service-layer",
        http_method: HttpMethod::Post,
        parameters: QUERY_PARAMETERS,
    },
    OperationMeta {
        name: "get_layer_info",
        description: "Get metadata (fields, geometry type, extent) of a service layer",
        endpoint: "/get-layer-info",
        http_method: HttpMethod::Post,
        parameters: &[SERVICE_NAME, FOLDER, LAYER_ID],
    },
    OperationMeta {
        name: "test_connection",
        description: "Test connection to ArcGIS Server and Portal",
        endpoint: "/test-connection",
        http_method: HttpMethod::Get,
        parameters: &[],
    },
    OperationMeta {
        name: "get_token_status",
        description: "Report whether a portal token is cached and when it expires",
        endpoint: "/token-status",
        http_method: HttpMethod::Get,
        parameters: &[],
    },
    OperationMeta {
        name: "get_server_info",
        description: "Get basic server information (version, folders, service count)",
        endpoint: "/server-info",
        http_method: HttpMethod::Get,
        parameters: &[],
    },
    OperationMeta {
        name: "get_portal_info",
        description: "Get basic portal information",
        endpoint: "/portal-info",
        http_method: HttpMethod::Get,
        parameters: &[],
    },
    OperationMeta {
        name: "get_portal_token",
        description: "Generate a one-off portal token",
        endpoint: "/get-portal-token",
        http_method: HttpMethod::Post,
        parameters: &[optional(
            "expiration",
            ParamType::Integer,
            Some(Literal::Int(60)),
            "Token lifetime in minutes",
        )],
    },
];

static DESCRIPTORS: Lazy<Vec<CapabilityDescriptor>> = Lazy::new(|| OPERATIONS.iter().map(describe).collect());

/// Descriptors for every operation, built on first use
pub fn descriptors() -> &'static [CapabilityDescriptor] {
    &DESCRIPTORS
}

pub fn find(name: &str) -> Option<&'static CapabilityDescriptor> {
    descriptors().iter().find(|d| d.name == name)
}

/// The listing payload for all operations
pub fn list_value() -> Value {
    let functions: Vec<Value> = descriptors().iter().map(|d| d.to_value()).collect();
    json!({
        "functions": functions,
        "count": functions.len(),
    })
}
