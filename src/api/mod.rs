//! ArcGIS Enterprise REST adapter
//!
//! Token lifecycle, catalog discovery and classification, service
//! resolution and layer query construction, behind one `ArcgisClient`.

pub mod auth;
pub mod catalog;
pub mod client;
pub mod constants;
pub mod error;
pub mod logging;
pub mod query;
pub mod resolver;
pub mod transport;

pub use auth::{Clock, SystemClock, Token, TokenManager, TokenSettings, TokenState, TokenStatus};
pub use catalog::{
    CatalogCache, CatalogFetcher, CatalogSnapshot, CatalogSummary, ClassificationRules, RawService, ServiceCategory,
    ServiceDescriptor,
};
pub use client::{ArcgisClient, ClientOptions};
pub use error::{ArcgisError, Result};
pub use logging::{ApiLogger, LogLevel, MonitoringConfig, OperationContext, OperationMetrics};
pub use query::{LayerQuery, QueryBuilder, QueryResult, QuerySpec};
pub use resolver::{ResolvedService, ServiceResolver};
pub use transport::{HttpTransport, Transport};
