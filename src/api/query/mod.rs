//! Layer query construction
//!
//! `QuerySpec` (reusable parameters) and `QueryBuilder` (fluent) produce the
//! parameter list; `LayerQuery` binds it to a resolved service and layer.

pub mod builder;
pub mod filters;
pub mod orderby;
pub mod query_spec;
pub mod request;
pub mod result;

pub use builder::QueryBuilder;
pub use filters::{Filter, FilterValue};
pub use orderby::OrderBy;
pub use query_spec::{Envelope, GeometryType, OutStatistic, QuerySpec, SpatialRelationship, StatisticType};
pub use request::LayerQuery;
pub use result::QueryResult;
