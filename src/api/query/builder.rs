//! QueryBuilder for fluent query construction
//!
//! Builds reusable `QuerySpec` values; execution goes through the client.

use serde_json::Value;

use super::filters::Filter;
use super::orderby::{OrderBy, OrderByClause};
use super::query_spec::{Envelope, GeometryType, OutStatistic, QuerySpec, SpatialRelationship};
use super::result::QueryResult;
use crate::api::client::ArcgisClient;
use crate::api::error::Result;

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    spec: QuerySpec,
    orderby: OrderByClause,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the where clause from raw SQL
    pub fn where_clause(mut self, clause: impl Into<String>) -> Self {
        self.spec.where_clause = clause.into();
        self
    }

    /// Set the where clause from a filter expression
    pub fn filter(self, filter: Filter) -> Self {
        self.where_clause(filter.to_sql())
    }

    /// Select specific fields
    pub fn select(mut self, fields: &[&str]) -> Self {
        self.spec.out_fields = fields.join(",");
        self
    }

    pub fn return_geometry(mut self, return_geometry: bool) -> Self {
        self.spec.return_geometry = return_geometry;
        self
    }

    pub fn ids_only(mut self) -> Self {
        self.spec.return_ids_only = true;
        self
    }

    pub fn count_only(mut self) -> Self {
        self.spec.return_count_only = true;
        self
    }

    pub fn distinct_values(mut self) -> Self {
        self.spec.return_distinct_values = true;
        self
    }

    pub fn extent_only(mut self) -> Self {
        self.spec.return_extent_only = true;
        self
    }

    /// Add ordering
    pub fn orderby(mut self, order: OrderBy) -> Self {
        self.orderby = self.orderby.add(order);
        self
    }

    pub fn group_by(mut self, fields: &[&str]) -> Self {
        self.spec.group_by_fields = Some(fields.join(","));
        self
    }

    pub fn statistic(mut self, statistic: OutStatistic) -> Self {
        self.spec.statistics.get_or_insert_with(Vec::new).push(statistic);
        self
    }

    pub fn object_ids(mut self, ids: &[i64]) -> Self {
        self.spec.object_ids = Some(ids.to_vec());
        self
    }

    pub fn geometry(mut self, geometry: Value, geometry_type: GeometryType) -> Self {
        self.spec.geometry = Some(geometry);
        self.spec.geometry_type = geometry_type;
        self
    }

    pub fn envelope(self, envelope: Envelope) -> Self {
        self.geometry(envelope.to_value(), GeometryType::Envelope)
    }

    pub fn spatial_relationship(mut self, relationship: SpatialRelationship) -> Self {
        self.spec.spatial_relationship = relationship;
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.spec.result_offset = Some(offset);
        self
    }

    /// Limit number of results
    pub fn top(mut self, count: i64) -> Self {
        self.spec.result_record_count = Some(count);
        self
    }

    pub fn max_record_count(mut self, count: u32) -> Self {
        self.spec.max_record_count = count;
        self
    }

    /// Raw parameter applied after the typed ones
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec = self.spec.with_param(key, value);
        self
    }

    /// Build the final QuerySpec (reusable)
    pub fn build(self) -> QuerySpec {
        let mut spec = self.spec;
        if let Some(orderby) = self.orderby.to_param() {
            spec.order_by_fields = Some(orderby);
        }
        spec
    }

    /// Build and execute immediately
    pub async fn execute(
        self,
        client: &ArcgisClient,
        service_name: &str,
        folder: &str,
        layer_id: u32,
    ) -> Result<QueryResult> {
        let spec = self.build();
        let raw = client.query_service_layer(service_name, folder, layer_id, &spec).await?;
        Ok(QueryResult::from_json(raw))
    }
}

// Convenience methods for common patterns
impl QueryBuilder {
    /// Count matching features without fetching them
    pub fn count_where(self, clause: impl Into<String>) -> Self {
        self.where_clause(clause).count_only().return_geometry(false)
    }

    /// Attributes only, no geometry
    pub fn attributes_only(self) -> Self {
        self.return_geometry(false)
    }

    /// One page of `page_size` records
    pub fn page(self, page: i64, page_size: i64) -> Self {
        self.offset(page * page_size).top(page_size)
    }
}
