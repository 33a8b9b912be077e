//! Query result handling
//!
//! Parses layer query responses. A response carries features, a bare count,
//! an object id list or an extent depending on the `return*` flags.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub features: Vec<Value>,
    pub fields: Vec<Value>,
    pub count: Option<u64>,
    pub object_ids: Option<Vec<i64>>,
    pub object_id_field_name: Option<String>,
    pub extent: Option<Value>,
    pub geometry_type: Option<String>,
    pub exceeded_transfer_limit: bool,
    /// Metadata the client attached to the response
    pub query_metadata: Option<Value>,
    pub raw: Value,
}

impl QueryResult {
    pub fn from_json(json: Value) -> Self {
        let array = |key: &str| {
            json.get(key)
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default()
        };
        let string = |key: &str| json.get(key).and_then(|v| v.as_str()).map(|s| s.to_string());

        let object_ids = json.get("objectIds").and_then(|v| v.as_array()).map(|ids| {
            ids.iter().filter_map(|id| id.as_i64()).collect()
        });

        Self {
            features: array("features"),
            fields: array("fields"),
            count: json.get("count").and_then(|c| c.as_u64()),
            object_ids,
            object_id_field_name: string("objectIdFieldName"),
            extent: json.get("extent").cloned(),
            geometry_type: string("geometryType"),
            exceeded_transfer_limit: json
                .get("exceededTransferLimit")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            query_metadata: json.get("query_metadata").cloned(),
            raw: json,
        }
    }

    /// Attribute maps of the returned features
    pub fn records(&self) -> Vec<&Value> {
        self.features
            .iter()
            .filter_map(|feature| feature.get("attributes"))
            .collect()
    }

    /// Field names declared in `fields`, or the keys of the first record
    pub fn field_names(&self) -> Vec<String> {
        let declared: Vec<String> = self
            .fields
            .iter()
            .filter_map(|f| f.get("name").and_then(|n| n.as_str()))
            .map(|n| n.to_string())
            .collect();
        if !declared.is_empty() {
            return declared;
        }

        self.records()
            .first()
            .and_then(|r| r.as_object())
            .map(|obj| obj.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Get a specific attribute from all records
    pub fn get_field_values(&self, field_name: &str) -> Vec<Option<&Value>> {
        self.records().into_iter().map(|record| record.get(field_name)).collect()
    }

    /// Find records where an attribute matches a value
    pub fn find_by_field(&self, field_name: &str, field_value: &Value) -> Vec<&Value> {
        self.records()
            .into_iter()
            .filter(|record| record.get(field_name).map(|v| v == field_value).unwrap_or(false))
            .collect()
    }

    pub fn first(&self) -> Option<&Value> {
        self.records().into_iter().next()
    }

    /// More records exist than the server returned
    pub fn has_more(&self) -> bool {
        self.exceeded_transfer_limit
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_feature_response() {
        let result = QueryResult::from_json(json!({
            "objectIdFieldName": "OBJECTID",
            "geometryType": "esriGeometryPoint",
            "fields": [{"name": "OBJECTID"}, {"name": "NAME"}],
            "features": [
                {"attributes": {"OBJECTID": 1, "NAME": "Zoo"}, "geometry": {"x": 1.0, "y": 2.0}},
                {"attributes": {"OBJECTID": 2, "NAME": "Museum"}}
            ],
            "exceededTransferLimit": true
        }));

        assert_eq!(result.len(), 2);
        assert!(result.has_more());
        assert_eq!(result.field_names(), vec!["OBJECTID", "NAME"]);
        assert_eq!(result.get_field_values("NAME")[1], Some(&json!("Museum")));
        assert_eq!(result.find_by_field("OBJECTID", &json!(1)).len(), 1);
        assert_eq!(result.first().and_then(|r| r.get("NAME")), Some(&json!("Zoo")));
    }

    #[test]
    fn test_count_response() {
        let result = QueryResult::from_json(json!({"count": 42}));

        assert_eq!(result.count, Some(42));
        assert!(result.is_empty());
        assert!(!result.has_more());
    }

    #[test]
    fn test_ids_response() {
        let result = QueryResult::from_json(json!({"objectIdFieldName": "FID", "objectIds": [3, 5, 8]}));

        assert_eq!(result.object_ids, Some(vec![3, 5, 8]));
        assert_eq!(result.object_id_field_name.as_deref(), Some("FID"));
    }

    #[test]
    fn test_field_names_fall_back_to_attributes() {
        let result = QueryResult::from_json(json!({"features": [{"attributes": {"A": 1}}]}));
        assert_eq!(result.field_names(), vec!["A"]);
    }
}
