//! Service name/folder resolution against a catalog snapshot

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use log::debug;
use serde_json::{json, Value};

use super::catalog::{CatalogSnapshot, ServiceDescriptor};
use super::constants;
use super::error::{ArcgisError, Result};

/// The effective service coordinates after resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedService {
    pub name: String,
    pub folder: String,
    pub service_type: String,
    pub descriptor: ServiceDescriptor,
}

impl ResolvedService {
    /// `[folder/]name/type`, relative to the server URL
    pub fn path(&self) -> String {
        constants::service_path(&self.folder, &self.name, &self.service_type)
    }

    /// `[folder/]name`
    pub fn full_name(&self) -> String {
        if self.folder.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.folder, self.name)
        }
    }

    pub fn metadata(&self) -> Value {
        json!({
            "name": self.name,
            "folder": self.folder,
            "type": self.service_type,
            "full_path": self.full_name(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchTier {
    Path,
    Exact,
    FolderPrefixed,
    Root,
    Suffix,
}

/// Stateless resolver; the catalog is always passed in
pub struct ServiceResolver;

impl ServiceResolver {
    /// Resolve a user-supplied name and folder to a catalog entry.
    ///
    /// Tiers are tried in order and the first hit wins:
    /// a `folder/name` path, exact equality, a folder-prefixed entry name,
    /// root-only equality and finally a `/name` suffix inside the folder.
    pub fn resolve(catalog: &CatalogSnapshot, service_name: &str, folder: &str) -> Result<ResolvedService> {
        let services = catalog.services();
        let requested_folder = folder;
        let embedded = service_name.split_once('/');

        if let Some((embedded_folder, embedded_name)) = embedded {
            if let Some(entry) = services
                .iter()
                .find(|s| s.folder == embedded_folder && s.name == service_name)
            {
                return Ok(Self::resolved(entry, embedded_name, embedded_folder, MatchTier::Path));
            }
        }

        // A path-style name with a compatible folder is searched by its parts
        let (name, folder) = match embedded {
            Some((embedded_folder, embedded_name)) if folder.is_empty() || folder == embedded_folder => {
                (embedded_name, embedded_folder)
            }
            _ => (service_name, folder),
        };

        if let Some(entry) = services.iter().find(|s| s.name == name && s.folder == folder) {
            return Ok(Self::resolved(entry, name, folder, MatchTier::Exact));
        }

        let prefixed = format!("{}/{}", folder, name);
        if let Some(entry) = services.iter().find(|s| s.name == prefixed && s.folder == folder) {
            return Ok(Self::resolved(entry, name, folder, MatchTier::FolderPrefixed));
        }

        if folder.is_empty() {
            if let Some(entry) = services.iter().find(|s| s.folder.is_empty() && s.name == name) {
                return Ok(Self::resolved(entry, name, folder, MatchTier::Root));
            }
        }

        let suffix = format!("/{}", name);
        if let Some(entry) = services.iter().find(|s| s.name.ends_with(&suffix) && s.folder == folder) {
            return Ok(Self::resolved(entry, &entry.name, folder, MatchTier::Suffix));
        }

        Err(ArcgisError::not_found(service_name, requested_folder))
    }

    /// Catalog names closest to `query`, best first
    pub fn suggest(catalog: &CatalogSnapshot, query: &str, limit: usize) -> Vec<String> {
        let matcher = SkimMatcherV2::default();
        let mut scored: Vec<(i64, String)> = catalog
            .services()
            .iter()
            .filter_map(|s| {
                let candidate = qualified_name(s);
                matcher.fuzzy_match(&candidate, query).map(|score| (score, candidate))
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        scored.dedup_by(|a, b| a.1 == b.1);
        scored.into_iter().take(limit).map(|(_, name)| name).collect()
    }

    fn resolved(entry: &ServiceDescriptor, name: &str, folder: &str, tier: MatchTier) -> ResolvedService {
        let name = last_segment(name);
        debug!(
            "Resolved '{}' in folder '{}' via {:?} match on entry {}/{}",
            name, folder, tier, entry.folder, entry.name
        );

        ResolvedService {
            name: name.to_string(),
            folder: folder.to_string(),
            service_type: entry.service_type.clone(),
            descriptor: entry.clone(),
        }
    }
}

fn last_segment(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

fn qualified_name(service: &ServiceDescriptor) -> String {
    if service.folder.is_empty() || service.name.starts_with(&format!("{}/", service.folder)) {
        service.name.clone()
    } else {
        format!("{}/{}", service.folder, service.name)
    }
}
