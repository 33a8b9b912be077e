//! Service catalog discovery and classification
//!
//! The catalog is the flattened list of services found under the root
//! listing and every folder listing. Each fetch yields a new immutable
//! `CatalogSnapshot`; nothing here is shared mutable state except the
//! optional TTL cache.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use super::auth::TokenManager;
use super::constants::{self, DEFAULT_SERVICE_TYPE, FORMAT_PARAM};
use super::error::{ArcgisError, Result};
use super::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceCategory {
    System,
    Hosted,
    Custom,
}

impl ServiceCategory {
    pub const ALL: [ServiceCategory; 3] = [ServiceCategory::System, ServiceCategory::Hosted, ServiceCategory::Custom];

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceCategory::System => "system",
            ServiceCategory::Hosted => "hosted",
            ServiceCategory::Custom => "custom",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ServiceCategory::System => "System/Utility service",
            ServiceCategory::Hosted => "Hosted service",
            ServiceCategory::Custom => "Custom service",
        }
    }
}

impl std::str::FromStr for ServiceCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(ServiceCategory::System),
            "hosted" => Ok(ServiceCategory::Hosted),
            "custom" => Ok(ServiceCategory::Custom),
            other => Err(format!("Unknown service category: {}", other)),
        }
    }
}

/// One service as listed by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub service_type: String,
    /// Empty for services in the root folder
    pub folder: String,
    pub category: ServiceCategory,
}

impl ServiceDescriptor {
    pub fn to_value(&self) -> Value {
        json!({
            "name": self.name,
            "type": self.service_type,
            "folder": self.folder,
            "category": self.category,
            "category_description": self.category.description(),
        })
    }
}

/// A listing entry before classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawService {
    pub name: String,
    pub service_type: String,
    pub folder: String,
}

impl RawService {
    pub fn new(name: impl Into<String>, service_type: impl Into<String>, folder: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service_type: service_type.into(),
            folder: folder.into(),
        }
    }
}

/// Heuristic rules for sorting services into categories.
///
/// System rules are checked before the hosted rule. Name patterns are plain
/// substrings matched against the lowercased service name, so a custom
/// service whose name happens to contain one is reported as system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationRules {
    pub system_folders: Vec<String>,
    pub system_types: Vec<String>,
    pub system_name_patterns: Vec<String>,
    pub hosted_folder: String,
}

impl Default for ClassificationRules {
    fn default() -> Self {
        let patterns = [
            "caching", "cache", "tools", "utilities", "utility", "system", "admin", "management",
            "controller", "service", "geocoding", "printing", "raster", "symbol", "offline",
            "packaging", "sync", "validation", "version", "topographic", "production", "network",
            "location", "referencing", "parcel", "fabric", "publishing", "reporting", "scene",
            "spatial", "analysis",
        ];

        Self {
            system_folders: vec!["System".to_string(), "Utilities".to_string()],
            system_types: vec!["GPServer".to_string(), "SymbolServer".to_string()],
            system_name_patterns: patterns.iter().map(|p| p.to_string()).collect(),
            hosted_folder: "Hosted".to_string(),
        }
    }
}

impl ClassificationRules {
    pub fn classify(&self, name: &str, folder: &str, service_type: &str) -> ServiceCategory {
        if self.is_system(name, folder, service_type) {
            ServiceCategory::System
        } else if folder == self.hosted_folder {
            ServiceCategory::Hosted
        } else {
            ServiceCategory::Custom
        }
    }

    fn is_system(&self, name: &str, folder: &str, service_type: &str) -> bool {
        if self.system_folders.iter().any(|f| f == folder) {
            return true;
        }
        if self.system_types.iter().any(|t| t == service_type) {
            return true;
        }
        let name_lower = name.to_lowercase();
        self.system_name_patterns
            .iter()
            .any(|pattern| name_lower.contains(&pattern.to_lowercase()))
    }
}

/// Category counts for a snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogSummary {
    pub system_services: usize,
    pub hosted_services: usize,
    pub custom_services: usize,
    pub total: usize,
}

/// A folder whose listing could not be read during a fetch
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFolder {
    pub folder: String,
    pub error: String,
}

/// Immutable result of one catalog fetch
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    services: Vec<ServiceDescriptor>,
    skipped_folders: Vec<SkippedFolder>,
    fetched_at: DateTime<Utc>,
}

impl CatalogSnapshot {
    /// Classify and de-duplicate raw listing entries.
    ///
    /// `(folder, name)` is unique in the result; later duplicates are dropped.
    pub fn from_raw(raw: Vec<RawService>, rules: &ClassificationRules) -> Self {
        let mut seen = HashSet::new();
        let mut services = Vec::with_capacity(raw.len());

        for entry in raw {
            if !seen.insert((entry.folder.clone(), entry.name.clone())) {
                debug!("Dropping duplicate catalog entry {}/{}", entry.folder, entry.name);
                continue;
            }
            let category = rules.classify(&entry.name, &entry.folder, &entry.service_type);
            services.push(ServiceDescriptor {
                name: entry.name,
                service_type: entry.service_type,
                folder: entry.folder,
                category,
            });
        }

        Self {
            services,
            skipped_folders: Vec::new(),
            fetched_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self {
            services: Vec::new(),
            skipped_folders: Vec::new(),
            fetched_at: Utc::now(),
        }
    }

    fn with_skipped(mut self, skipped: Vec<SkippedFolder>) -> Self {
        self.skipped_folders = skipped;
        self
    }

    pub fn services(&self) -> &[ServiceDescriptor] {
        &self.services
    }

    pub fn skipped_folders(&self) -> &[SkippedFolder] {
        &self.skipped_folders
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn by_category(&self, category: ServiceCategory) -> Vec<&ServiceDescriptor> {
        self.services.iter().filter(|s| s.category == category).collect()
    }

    pub fn summary(&self) -> CatalogSummary {
        let count = |category| self.services.iter().filter(|s| s.category == category).count();
        CatalogSummary {
            system_services: count(ServiceCategory::System),
            hosted_services: count(ServiceCategory::Hosted),
            custom_services: count(ServiceCategory::Custom),
            total: self.services.len(),
        }
    }

    /// Listing payload: services, count, per-category groups and summary
    pub fn to_value(&self) -> Value {
        let services: Vec<Value> = self.services.iter().map(|s| s.to_value()).collect();
        let mut categorized = serde_json::Map::new();
        for category in ServiceCategory::ALL {
            let group: Vec<Value> = self.by_category(category).iter().map(|s| s.to_value()).collect();
            categorized.insert(category.as_str().to_string(), Value::Array(group));
        }

        let mut value = json!({
            "services": services,
            "count": self.services.len(),
            "categorized": categorized,
            "summary": self.summary(),
            "fetched_at": self.fetched_at.to_rfc3339(),
        });
        if !self.skipped_folders.is_empty() {
            value["skipped_folders"] = json!(self.skipped_folders);
        }
        value
    }
}

/// Extract the `services` array of a listing response
pub fn parse_listing(body: &Value, folder: &str) -> Vec<RawService> {
    body.get("services")
        .and_then(|s| s.as_array())
        .map(|services| {
            services
                .iter()
                .filter_map(|service| {
                    let name = service.get("name").and_then(|n| n.as_str())?;
                    let service_type = service
                        .get("type")
                        .and_then(|t| t.as_str())
                        .unwrap_or(DEFAULT_SERVICE_TYPE);
                    Some(RawService::new(name, service_type, folder))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Extract the `folders` array of a listing response
pub fn parse_folders(body: &Value) -> Vec<String> {
    body.get("folders")
        .and_then(|f| f.as_array())
        .map(|folders| {
            folders
                .iter()
                .filter_map(|f| f.as_str())
                .map(|f| f.to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Reads the root and folder listings and assembles a classified snapshot
pub struct CatalogFetcher {
    transport: Arc<dyn Transport>,
    tokens: Arc<TokenManager>,
    server_url: String,
    rules: ClassificationRules,
    timeout: Duration,
}

impl CatalogFetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: Arc<TokenManager>,
        server_url: impl Into<String>,
        rules: ClassificationRules,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            tokens,
            server_url: server_url.into(),
            rules,
            timeout,
        }
    }

    pub fn rules(&self) -> &ClassificationRules {
        &self.rules
    }

    /// GET one listing; `""` is the root. Authenticated listings carry a token.
    pub async fn fetch_listing(&self, folder: &str, authenticated: bool) -> Result<Value> {
        let url = constants::folder_endpoint(&self.server_url, folder);
        let mut params = vec![(FORMAT_PARAM.0.to_string(), FORMAT_PARAM.1.to_string())];
        if authenticated {
            let token = self.tokens.ensure_usable().await?;
            params.push((constants::params::TOKEN.to_string(), token.value().to_string()));
        }

        debug!("Fetching listing '{}' (authenticated: {})", folder, authenticated);
        let body = self.transport.get_json(&url, &params, self.timeout).await?;

        if let Some(err) = ArcgisError::from_body(&url, &body) {
            if authenticated && matches!(err, ArcgisError::Auth { .. }) {
                self.tokens.invalidate();
            }
            return Err(err);
        }
        Ok(body)
    }

    /// Raw root listing, read without a token
    pub async fn fetch_root(&self) -> Result<Value> {
        self.fetch_listing("", false).await
    }

    /// Fetch the whole catalog.
    ///
    /// The root listing must succeed. Folder listings are fetched
    /// concurrently and a failing folder is logged and left out.
    pub async fn fetch_catalog(&self) -> Result<CatalogSnapshot> {
        let root = self.fetch_listing("", true).await?;
        let mut raw = parse_listing(&root, "");
        let folders = parse_folders(&root);

        info!("Catalog root lists {} services and {} folders", raw.len(), folders.len());

        let listings = join_all(folders.iter().map(|folder| self.fetch_listing(folder, true))).await;

        let mut skipped = Vec::new();
        for (folder, listing) in folders.iter().zip(listings) {
            match listing {
                Ok(body) => {
                    let services = parse_listing(&body, folder);
                    debug!("Folder '{}' lists {} services", folder, services.len());
                    raw.extend(services);
                }
                Err(err) => {
                    warn!("Skipping folder '{}': {}", folder, err);
                    skipped.push(SkippedFolder {
                        folder: folder.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        let snapshot = CatalogSnapshot::from_raw(raw, &self.rules).with_skipped(skipped);
        let summary = snapshot.summary();
        info!(
            "Catalog assembled: {} services ({} system, {} hosted, {} custom)",
            summary.total, summary.system_services, summary.hosted_services, summary.custom_services
        );
        Ok(snapshot)
    }
}

/// Optional snapshot cache with a fixed time-to-live.
///
/// A zero TTL disables caching. Entries are never served past their TTL and
/// `invalidate` drops the current entry immediately.
#[derive(Debug)]
pub struct CatalogCache {
    ttl: Duration,
    entry: RwLock<Option<(Instant, Arc<CatalogSnapshot>)>>,
}

impl CatalogCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: RwLock::new(None),
        }
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self) -> Option<Arc<CatalogSnapshot>> {
        if !self.is_enabled() {
            return None;
        }
        let entry = self.entry.read().unwrap_or_else(|e| e.into_inner());
        match entry.as_ref() {
            Some((stored_at, snapshot)) if stored_at.elapsed() < self.ttl => Some(Arc::clone(snapshot)),
            _ => None,
        }
    }

    pub fn store(&self, snapshot: Arc<CatalogSnapshot>) {
        if self.is_enabled() {
            *self.entry.write().unwrap_or_else(|e| e.into_inner()) = Some((Instant::now(), snapshot));
        }
    }

    pub fn invalidate(&self) {
        debug!("Invalidating catalog cache");
        *self.entry.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_examples() {
        let rules = ClassificationRules::default();

        assert_eq!(rules.classify("GeocodeServer", "System", "GeocodeServer"), ServiceCategory::System);
        assert_eq!(rules.classify("TouristAttractions", "Hosted", "FeatureServer"), ServiceCategory::Hosted);
        assert_eq!(rules.classify("MyCustomApp", "", "MapServer"), ServiceCategory::Custom);
    }

    #[test]
    fn test_system_rules_take_precedence_over_hosted() {
        let rules = ClassificationRules::default();

        // Type rule
        assert_eq!(rules.classify("Buffer", "Hosted", "GPServer"), ServiceCategory::System);
        // Name pattern rule, matched case-insensitively
        assert_eq!(rules.classify("RasterTiles", "Hosted", "MapServer"), ServiceCategory::System);
    }

    #[test]
    fn test_folder_rule() {
        let rules = ClassificationRules::default();
        assert_eq!(rules.classify("Anything", "Utilities", "MapServer"), ServiceCategory::System);
    }

    #[test]
    fn test_snapshot_deduplicates_folder_name_pairs() {
        let raw = vec![
            RawService::new("Roads", "MapServer", ""),
            RawService::new("Roads", "FeatureServer", ""),
            RawService::new("Roads", "MapServer", "Transport"),
        ];

        let snapshot = CatalogSnapshot::from_raw(raw, &ClassificationRules::default());

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.services()[0].service_type, "MapServer");
        assert_eq!(snapshot.services()[1].folder, "Transport");
    }

    #[test]
    fn test_summary_counts() {
        let raw = vec![
            RawService::new("GeocodeServer", "GeocodeServer", "System"),
            RawService::new("TouristAttractions", "FeatureServer", "Hosted"),
            RawService::new("MyCustomApp", "MapServer", ""),
            RawService::new("Trails", "FeatureServer", "Hosted"),
        ];

        let summary = CatalogSnapshot::from_raw(raw, &ClassificationRules::default()).summary();

        assert_eq!(summary.system_services, 1);
        assert_eq!(summary.hosted_services, 2);
        assert_eq!(summary.custom_services, 1);
        assert_eq!(summary.total, 4);
    }

    #[test]
    fn test_parse_listing() {
        let body = json!({
            "currentVersion": 11.1,
            "folders": ["Hosted", "System"],
            "services": [
                {"name": "Hosted/TouristAttractions", "type": "FeatureServer"},
                {"name": "NoType"},
                {"type": "MapServer"}
            ]
        });

        let services = parse_listing(&body, "Hosted");

        assert_eq!(services.len(), 2);
        assert_eq!(services[0], RawService::new("Hosted/TouristAttractions", "FeatureServer", "Hosted"));
        assert_eq!(services[1].service_type, DEFAULT_SERVICE_TYPE);
        assert_eq!(parse_folders(&body), vec!["Hosted", "System"]);
    }

    #[test]
    fn test_listing_value_shape() {
        let raw = vec![RawService::new("TouristAttractions", "FeatureServer", "Hosted")];
        let value = CatalogSnapshot::from_raw(raw, &ClassificationRules::default()).to_value();

        assert_eq!(value["count"], 1);
        assert_eq!(value["services"][0]["category"], "hosted");
        assert_eq!(value["services"][0]["type"], "FeatureServer");
        assert_eq!(value["categorized"]["hosted"].as_array().unwrap().len(), 1);
        assert_eq!(value["summary"]["hosted_services"], 1);
        assert!(value.get("skipped_folders").is_none());
    }

    #[test]
    fn test_cache_disabled_never_serves() {
        let cache = CatalogCache::disabled();
        cache.store(Arc::new(CatalogSnapshot::empty()));
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_cache_serves_until_invalidated() {
        let cache = CatalogCache::new(Duration::from_secs(60));
        cache.store(Arc::new(CatalogSnapshot::empty()));
        assert!(cache.get().is_some());

        cache.invalidate();
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("Hosted".parse::<ServiceCategory>().unwrap(), ServiceCategory::Hosted);
        assert!("public".parse::<ServiceCategory>().is_err());
    }
}
