use chrono::Utc;
use log::{debug, info, warn};
use serde_json::{json, Map, Value};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use super::auth::{Clock, SystemClock, TokenManager, TokenSettings, TokenStatus};
use super::catalog::{CatalogCache, CatalogFetcher, CatalogSnapshot, ClassificationRules};
use super::constants::{self, params, FORMAT_PARAM, METADATA_TIMEOUT, QUERY_TIMEOUT};
use super::error::{ArcgisError, Result};
use super::logging::{sanitize_params, ApiLogger, MonitoringConfig, OperationContext};
use super::query::{LayerQuery, QuerySpec};
use super::resolver::{ResolvedService, ServiceResolver};
use super::transport::{HttpTransport, Transport};
use crate::auth::Credentials;

/// Tunables for an `ArcgisClient`
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub metadata_timeout: Duration,
    pub query_timeout: Duration,
    pub token: TokenSettings,
    pub verify_tls: bool,
    /// Zero disables catalog caching
    pub catalog_cache_ttl: Duration,
    pub classification: ClassificationRules,
    pub monitoring: MonitoringConfig,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            metadata_timeout: METADATA_TIMEOUT,
            query_timeout: QUERY_TIMEOUT,
            token: TokenSettings::default(),
            verify_tls: true,
            catalog_cache_ttl: Duration::ZERO,
            classification: ClassificationRules::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

/// ArcGIS server/portal client
///
/// Every operation re-reads the catalog unless caching is enabled, resolves
/// the requested service against it and attaches a valid token.
pub struct ArcgisClient {
    credentials: Credentials,
    transport: Arc<dyn Transport>,
    tokens: Arc<TokenManager>,
    fetcher: CatalogFetcher,
    cache: CatalogCache,
    /// Snapshot the latest resolution ran against
    last_catalog: RwLock<Option<Arc<CatalogSnapshot>>>,
    logger: ApiLogger,
    options: ClientOptions,
}

impl ArcgisClient {
    /// Client over a pooled reqwest transport
    pub fn new(credentials: Credentials, options: ClientOptions) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(options.verify_tls)?);
        Ok(Self::with_transport(credentials, options, transport))
    }

    pub fn with_transport(credentials: Credentials, options: ClientOptions, transport: Arc<dyn Transport>) -> Self {
        Self::with_clock(credentials, options, transport, Arc::new(SystemClock))
    }

    pub fn with_clock(
        credentials: Credentials,
        options: ClientOptions,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let token_settings = TokenSettings {
            timeout: options.metadata_timeout,
            ..options.token.clone()
        };
        let tokens = Arc::new(TokenManager::with_clock(
            credentials.clone(),
            Arc::clone(&transport),
            token_settings,
            clock,
        ));
        let fetcher = CatalogFetcher::new(
            Arc::clone(&transport),
            Arc::clone(&tokens),
            credentials.server_url(),
            options.classification.clone(),
            options.metadata_timeout,
        );

        Self {
            credentials,
            transport,
            tokens,
            fetcher,
            cache: CatalogCache::new(options.catalog_cache_ttl),
            last_catalog: RwLock::new(None),
            logger: ApiLogger::new(options.monitoring.clone()),
            options,
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn token_manager(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Current catalog, from the cache when it is enabled and fresh
    pub async fn catalog(&self) -> Result<Arc<CatalogSnapshot>> {
        if let Some(snapshot) = self.cache.get() {
            debug!("Using cached catalog from {}", snapshot.fetched_at());
            return Ok(snapshot);
        }

        let snapshot = Arc::new(self.fetcher.fetch_catalog().await?);
        self.cache.store(Arc::clone(&snapshot));
        *self.last_catalog.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    pub fn invalidate_catalog(&self) {
        self.cache.invalidate();
    }

    pub async fn resolve(&self, service_name: &str, folder: &str) -> Result<ResolvedService> {
        let catalog = self.catalog().await?;
        ServiceResolver::resolve(&catalog, service_name, folder)
    }

    /// Names in the current catalog resembling `service_name`
    pub async fn suggest(&self, service_name: &str, limit: usize) -> Result<Vec<String>> {
        let catalog = self.catalog().await?;
        Ok(ServiceResolver::suggest(&catalog, service_name, limit))
    }

    /// Like `suggest`, but against the last catalog read instead of a new one.
    /// Empty when nothing has been read yet.
    pub fn suggest_recent(&self, service_name: &str, limit: usize) -> Vec<String> {
        let last = self.last_catalog.read().unwrap_or_else(|e| e.into_inner()).clone();
        last.map(|catalog| ServiceResolver::suggest(&catalog, service_name, limit))
            .unwrap_or_default()
    }

    pub async fn list_services(&self) -> Result<Value> {
        let ctx = self.logger.start_operation("list_services", self.credentials.server_url());
        let result = self.catalog().await.map(|catalog| catalog.to_value());
        self.finish(ctx, result)
    }

    pub async fn get_service_details(&self, service_name: &str, folder: &str) -> Result<Value> {
        let mut ctx = self.logger.start_operation("get_service_details", service_name);
        let result = async {
            let resolved = self.resolve(service_name, folder).await?;
            self.logger.add_metadata(&mut ctx, "service_path", json!(resolved.path()));

            let url = constants::join_url(self.credentials.server_url(), &resolved.path());
            let body = self.metadata_get(&ctx, &url).await?;
            Ok::<_, ArcgisError>(attach(body, "service_metadata", resolved.metadata()))
        }
        .await;
        self.finish(ctx, result)
    }

    pub async fn get_layer_info(&self, service_name: &str, folder: &str, layer_id: u32) -> Result<Value> {
        let mut ctx = self.logger.start_operation("get_layer_info", service_name);
        let result = async {
            let resolved = self.resolve(service_name, folder).await?;
            let path = format!("{}/{}", resolved.path(), layer_id);
            self.logger.add_metadata(&mut ctx, "layer_path", json!(path));

            let url = constants::join_url(self.credentials.server_url(), &path);
            let body = self.metadata_get(&ctx, &url).await?;
            let layer_metadata = json!({
                "service_name": resolved.name,
                "folder": resolved.folder,
                "service_type": resolved.service_type,
                "layer_id": layer_id,
                "timestamp": Utc::now().to_rfc3339(),
            });
            Ok::<_, ArcgisError>(attach(body, "layer_metadata", layer_metadata))
        }
        .await;
        self.finish(ctx, result)
    }

    /// Resolve the service and build its layer query without sending it
    pub async fn build_query(&self, service_name: &str, folder: &str, layer_id: u32, spec: &QuerySpec) -> Result<LayerQuery> {
        let resolved = self.resolve(service_name, folder).await?;
        Ok(LayerQuery::build(&resolved, layer_id, spec, self.credentials.server_url()))
    }

    pub async fn query_service_layer(
        &self,
        service_name: &str,
        folder: &str,
        layer_id: u32,
        spec: &QuerySpec,
    ) -> Result<Value> {
        let mut ctx = self.logger.start_operation("query_service_layer", service_name);
        let result = async {
            let resolved = self.resolve(service_name, folder).await?;
            let query = LayerQuery::build(&resolved, layer_id, spec, self.credentials.server_url());
            self.logger.add_metadata(&mut ctx, "layer_id", json!(layer_id));
            info!("Querying service layer: {}/{}", resolved.path(), layer_id);

            let token = self.tokens.ensure_usable().await?;
            let request_params = query.with_token(token.value());
            let body = self
                .send(&ctx, &query.url, &request_params, self.options.query_timeout)
                .await?;

            if let Some(err) = query_error(&body) {
                if let ArcgisError::Auth { .. } = err {
                    self.tokens.invalidate();
                }
                return Err(err);
            }

            let query_metadata = json!({
                "service_name": resolved.name,
                "folder": resolved.folder,
                "service_type": resolved.service_type,
                "layer_id": layer_id,
                "query_parameters": params_object(&query.params),
                "timestamp": Utc::now().to_rfc3339(),
            });
            Ok::<_, ArcgisError>(attach(body, "query_metadata", query_metadata))
        }
        .await;
        self.finish(ctx, result)
    }

    /// Probe the server anonymously and the portal with a one-off token.
    ///
    /// Failures are reported inside the result rather than as errors.
    pub async fn test_connection(&self) -> Value {
        let ctx = self.logger.start_operation("test_connection", self.credentials.server_url());

        let server = match self.fetcher.fetch_root().await {
            Ok(root) => json!({
                "status": "connected",
                "url": self.credentials.server_url(),
                "services_count": array_len(&root, "services"),
                "folders_count": array_len(&root, "folders"),
            }),
            Err(err) => json!({
                "status": "error",
                "url": self.credentials.server_url(),
                "error": err.to_string(),
            }),
        };

        let portal = match self.tokens.generate_token(self.options.token.lifetime_minutes).await {
            Ok(_) => json!({
                "status": "connected",
                "url": self.credentials.portal_url(),
                "token_obtained": true,
            }),
            Err(err) => json!({
                "status": "error",
                "url": self.credentials.portal_url(),
                "error": err.to_string(),
            }),
        };

        let connected = server["status"] == "connected" && portal["status"] == "connected";
        let metrics = ctx.create_metrics(connected, None, None);
        self.logger.complete_operation(&ctx, &metrics);

        json!({
            "server": server,
            "portal": portal,
            "credentials": { "configured": true },
        })
    }

    pub async fn get_server_info(&self) -> Result<Value> {
        let ctx = self.logger.start_operation("get_server_info", self.credentials.server_url());
        let result = self.fetcher.fetch_root().await.map(|root| {
            json!({
                "server_url": self.credentials.server_url(),
                "services_count": array_len(&root, "services"),
                "folders": root.get("folders").cloned().unwrap_or_else(|| json!([])),
                "server_version": root.get("currentVersion").cloned().unwrap_or_else(|| json!("unknown")),
            })
        });
        self.finish(ctx, result)
    }

    pub fn get_portal_info(&self) -> Value {
        json!({
            "portal_url": self.credentials.portal_url(),
            "credentials_configured": true,
            "token_available": self.tokens.cached_token().is_some(),
            "token_state": self.tokens.state(),
        })
    }

    pub fn token_status(&self) -> TokenStatus {
        self.tokens.status()
    }

    /// Issue a one-off token; the cached token is left alone
    pub async fn get_portal_token(&self, expiration_minutes: u32) -> Result<Value> {
        let ctx = self.logger.start_operation("get_portal_token", self.credentials.portal_url());
        let result = self.tokens.generate_token(expiration_minutes).await.map(|token| {
            json!({
                "token": token.value(),
                "issued_at": token.issued_at().to_rfc3339(),
                "expires_at": token.expires_at().to_rfc3339(),
                "expiration_minutes": expiration_minutes,
            })
        });
        self.finish(ctx, result)
    }

    /// Authenticated `f=json` GET for service and layer metadata
    async fn metadata_get(&self, ctx: &OperationContext, url: &str) -> Result<Value> {
        let token = self.tokens.ensure_usable().await?;
        let request_params = vec![
            (FORMAT_PARAM.0.to_string(), FORMAT_PARAM.1.to_string()),
            (params::TOKEN.to_string(), token.value().to_string()),
        ];
        let body = self
            .send(ctx, url, &request_params, self.options.metadata_timeout)
            .await?;

        if let Some(err) = ArcgisError::from_body(url, &body) {
            if let ArcgisError::Auth { .. } = err {
                self.tokens.invalidate();
            }
            return Err(err);
        }
        Ok(body)
    }

    async fn send(
        &self,
        ctx: &OperationContext,
        url: &str,
        request_params: &[(String, String)],
        timeout: Duration,
    ) -> Result<Value> {
        self.logger.log_request(ctx, "GET", url, request_params);
        let started = std::time::Instant::now();
        let result = self.transport.get_json(url, request_params, timeout).await;
        self.logger.log_response(ctx, result.is_ok(), started.elapsed());
        result
    }

    fn finish<T>(&self, ctx: OperationContext, result: Result<T>) -> Result<T> {
        let metrics = match &result {
            Ok(_) => ctx.create_metrics(true, Some(200), None),
            Err(err) => {
                let status = match err {
                    ArcgisError::Network { status, .. } => *status,
                    _ => None,
                };
                warn!("{} failed: {}", ctx.operation, err);
                ctx.create_metrics(false, status, Some(err.to_string()))
            }
        };
        self.logger.complete_operation(&ctx, &metrics);
        result
    }
}

/// Map an error object in a query response.
///
/// Token rejections stay authentication errors; anything else is the
/// backend refusing the query.
fn query_error(body: &Value) -> Option<ArcgisError> {
    let error = body.get("error")?;
    let code = error.get("code").and_then(|c| c.as_u64());
    let message = error
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("Unknown error")
        .to_string();

    if matches!(code, Some(498) | Some(499)) {
        return Some(ArcgisError::auth(message));
    }

    let details = error
        .get("details")
        .and_then(|d| d.as_array())
        .map(|d| d.iter().filter_map(|v| v.as_str()).map(|s| s.to_string()).collect())
        .unwrap_or_default();
    Some(ArcgisError::Query { message, details })
}

fn params_object(request_params: &[(String, String)]) -> Value {
    let map: Map<String, Value> = sanitize_params(request_params)
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();
    Value::Object(map)
}

/// Add a key to an object response; other shapes are returned untouched
fn attach(mut body: Value, key: &str, value: Value) -> Value {
    if let Some(object) = body.as_object_mut() {
        object.insert(key.to_string(), value);
    }
    body
}

fn array_len(body: &Value, key: &str) -> usize {
    body.get(key).and_then(|v| v.as_array()).map(|a| a.len()).unwrap_or(0)
}
