use crate::api::constants::{self, params};
use crate::api::resolver::ResolvedService;

use super::query_spec::QuerySpec;

/// A fully built layer query: absolute URL plus ordered parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerQuery {
    pub url: String,
    pub params: Vec<(String, String)>,
}

impl LayerQuery {
    /// `{server_url}/[folder/]name/type/{layer_id}/query` with the `QuerySpec` parameters
    pub fn build(resolved: &ResolvedService, layer_id: u32, spec: &QuerySpec, server_url: &str) -> Self {
        let path = format!("{}/{}/query", resolved.path(), layer_id);
        Self {
            url: constants::join_url(server_url, &path),
            params: spec.to_params(),
        }
    }

    /// Parameters with the token appended last
    pub fn with_token(&self, token: &str) -> Vec<(String, String)> {
        let mut with_token: Vec<(String, String)> = self
            .params
            .iter()
            .filter(|(k, _)| k != params::TOKEN)
            .cloned()
            .collect();
        with_token.push((params::TOKEN.to_string(), token.to_string()));
        with_token
    }

    /// Full GET URL with encoded parameters, as a browser would send it
    pub fn to_url(&self) -> String {
        let query: Vec<String> = self
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect();
        format!("{}?{}", self.url, query.join("&"))
    }
}
