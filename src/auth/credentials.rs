use log::info;
use std::fmt;
use std::path::Path;

use crate::api::error::{ArcgisError, Result};

pub const SERVER_URL_VAR: &str = "ARCGIS_SERVER_URL";
pub const PORTAL_URL_VAR: &str = "ARCGIS_PORTAL_URL";
pub const USERNAME_VAR: &str = "ARCGIS_USERNAME";
pub const PASSWORD_VAR: &str = "ARCGIS_PASSWORD";

/// Older deployments exported the account under these names
const LEGACY_USERNAME_VAR: &str = "MCP_USERNAME";
const LEGACY_PASSWORD_VAR: &str = "MCP_PASSWORD";

/// Server endpoints and the account used to obtain tokens.
///
/// Immutable once constructed; every field is guaranteed non-blank.
#[derive(Clone)]
pub struct Credentials {
    server_url: String,
    portal_url: String,
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(
        server_url: impl Into<String>,
        portal_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Credentials> {
        let values = [
            (SERVER_URL_VAR, server_url.into()),
            (PORTAL_URL_VAR, portal_url.into()),
            (USERNAME_VAR, username.into()),
            (PASSWORD_VAR, password.into()),
        ];

        let missing: Vec<&str> = values
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(ArcgisError::config(format!(
                "Missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        let [server_url, portal_url, username, password] = values.map(|(_, value)| value);
        Ok(Credentials {
            server_url: server_url.trim_end_matches('/').to_string(),
            portal_url: portal_url.trim_end_matches('/').to_string(),
            username,
            password,
        })
    }

    /// Build credentials from any variable lookup (environment, map, ...)
    pub fn from_lookup<F>(lookup: F) -> Result<Credentials>
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let username = present(USERNAME_VAR).or_else(|| present(LEGACY_USERNAME_VAR));
        let password = present(PASSWORD_VAR).or_else(|| present(LEGACY_PASSWORD_VAR));

        Credentials::new(
            lookup(SERVER_URL_VAR).unwrap_or_default(),
            lookup(PORTAL_URL_VAR).unwrap_or_default(),
            username.unwrap_or_default(),
            password.unwrap_or_default(),
        )
    }

    /// Read credentials from the process environment, loading `.env` first if present
    pub fn from_env() -> Result<Credentials> {
        info!("Importing credentials from environment variables");
        dotenvy::dotenv().ok();
        Credentials::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read credentials from a specific env file
    pub fn from_env_file(path: &str) -> Result<Credentials> {
        info!("Importing credentials from env file: {}", path);

        if !Path::new(path).exists() {
            return Err(ArcgisError::config(format!("Environment file not found: {}", path)));
        }

        let vars: Vec<(String, String)> = dotenvy::from_path_iter(path)
            .map_err(|e| ArcgisError::config(format!("Failed to load env file '{}': {}", path, e)))?
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| ArcgisError::config(format!("Failed to parse env file '{}': {}", path, e)))?;

        Credentials::from_lookup(|name| {
            vars.iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.clone())
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn portal_url(&self) -> &str {
        &self.portal_url
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("server_url", &self.server_url)
            .field("portal_url", &self.portal_url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_complete_credentials() {
        let creds = Credentials::from_lookup(lookup_from(&[
            (SERVER_URL_VAR, "https://gis.example.com/arcgis/rest/services/"),
            (PORTAL_URL_VAR, "https://gis.example.com"),
            (USERNAME_VAR, "gisadmin"),
            (PASSWORD_VAR, "secret"),
        ]))
        .unwrap();

        assert_eq!(creds.server_url(), "https://gis.example.com/arcgis/rest/services");
        assert_eq!(creds.username(), "gisadmin");
    }

    #[test]
    fn test_missing_fields_are_all_reported() {
        let err = Credentials::from_lookup(lookup_from(&[(SERVER_URL_VAR, "https://gis")])).unwrap_err();
        let message = err.to_string();

        assert_eq!(err.kind(), "config_error");
        assert!(message.contains(PORTAL_URL_VAR));
        assert!(message.contains(USERNAME_VAR));
        assert!(message.contains(PASSWORD_VAR));
        assert!(!message.contains(SERVER_URL_VAR));
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let err = Credentials::new("https://gis", "https://portal", "  ", "pw").unwrap_err();
        assert!(err.to_string().contains(USERNAME_VAR));
    }

    #[test]
    fn test_legacy_account_variables() {
        let creds = Credentials::from_lookup(lookup_from(&[
            (SERVER_URL_VAR, "https://gis"),
            (PORTAL_URL_VAR, "https://portal"),
            ("MCP_USERNAME", "legacy"),
            ("MCP_PASSWORD", "pw"),
        ]))
        .unwrap();
        assert_eq!(creds.username(), "legacy");
    }

    #[test]
    fn test_blank_primary_falls_back_to_legacy() {
        let creds = Credentials::from_lookup(lookup_from(&[
            (SERVER_URL_VAR, "https://gis"),
            (PORTAL_URL_VAR, "https://portal"),
            (USERNAME_VAR, ""),
            (PASSWORD_VAR, "  "),
            ("MCP_USERNAME", "legacy"),
            ("MCP_PASSWORD", "pw"),
        ]))
        .unwrap();
        assert_eq!(creds.username(), "legacy");
        assert_eq!(creds.password(), "pw");
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials::new("https://gis", "https://portal", "user", "hunter2").unwrap();
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }
}
