use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use super::constants::{
    self, DEFAULT_REFERER, DEFAULT_REFRESH_BUFFER_MINUTES, DEFAULT_TOKEN_LIFETIME_MINUTES,
    DEFAULT_TOKEN_PATH, METADATA_TIMEOUT,
};
use super::error::{ArcgisError, Result};
use super::transport::Transport;
use crate::auth::Credentials;

/// Source of the current time, swappable in tests
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A bearer token issued by the portal
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    value: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Token {
    pub fn new(value: impl Into<String>, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            issued_at,
            expires_at,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("value", &"[REDACTED]")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Lifecycle state of the cached token, derived on read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    Unissued,
    Valid,
    /// Inside the refresh buffer; the next `ensure_valid` refreshes
    NearExpiry,
    Expired,
    /// The last refresh attempt failed and no usable token is cached
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenStatus {
    pub has_token: bool,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub is_expired: bool,
    pub minutes_until_expiry: Option<i64>,
    pub current_time: DateTime<Utc>,
    pub state: TokenState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TokenSettings {
    /// Lifetime requested for proactively refreshed tokens
    pub lifetime_minutes: u32,
    pub refresh_buffer: ChronoDuration,
    pub token_path: String,
    pub referer: String,
    pub timeout: Duration,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            lifetime_minutes: DEFAULT_TOKEN_LIFETIME_MINUTES,
            refresh_buffer: ChronoDuration::minutes(DEFAULT_REFRESH_BUFFER_MINUTES),
            token_path: DEFAULT_TOKEN_PATH.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            timeout: METADATA_TIMEOUT,
        }
    }
}

/// Issues, caches and proactively refreshes the portal token.
///
/// Refresh is single-flight: callers that find the token expired queue on
/// `refresh_gate`, and whoever gets it second re-checks before issuing.
pub struct TokenManager {
    credentials: Credentials,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    settings: TokenSettings,
    cached: RwLock<Option<Token>>,
    last_error: RwLock<Option<String>>,
    refresh_gate: tokio::sync::Mutex<()>,
}

impl TokenManager {
    pub fn new(credentials: Credentials, transport: Arc<dyn Transport>, settings: TokenSettings) -> Self {
        Self::with_clock(credentials, transport, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(
        credentials: Credentials,
        transport: Arc<dyn Transport>,
        settings: TokenSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            credentials,
            transport,
            clock,
            settings,
            cached: RwLock::new(None),
            last_error: RwLock::new(None),
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Return a token that is valid beyond the refresh buffer, issuing one if needed
    pub async fn ensure_valid(&self) -> Result<Token> {
        if let Some(token) = self.fresh_token() {
            debug!("Using existing token, expires at: {}", token.expires_at);
            return Ok(token);
        }

        let _guard = self.refresh_gate.lock().await;

        // Another caller may have refreshed while we waited
        if let Some(token) = self.fresh_token() {
            debug!("Token refreshed by concurrent caller, expires at: {}", token.expires_at);
            return Ok(token);
        }

        info!("Token expired or missing, generating new token...");
        match self.request_token(self.settings.lifetime_minutes).await {
            Ok(token) => {
                info!("New token generated, expires at: {}", token.expires_at);
                *self.cached.write().unwrap_or_else(|e| e.into_inner()) = Some(token.clone());
                *self.last_error.write().unwrap_or_else(|e| e.into_inner()) = None;
                Ok(token)
            }
            Err(err) => {
                let reason = match err {
                    ArcgisError::Auth { reason } => reason,
                    other => other.to_string(),
                };
                error!("Failed to generate new token: {}", reason);
                *self.last_error.write().unwrap_or_else(|e| e.into_inner()) = Some(reason.clone());
                Err(ArcgisError::Auth { reason })
            }
        }
    }

    /// Token for an outgoing call.
    ///
    /// Like `ensure_valid`, but when the refresh fails a cached token that has
    /// not reached its real expiry is still handed out. The failure stays
    /// recorded in `state`/`status`.
    pub async fn ensure_usable(&self) -> Result<Token> {
        match self.ensure_valid().await {
            Ok(token) => Ok(token),
            Err(err) => match self.cached_token() {
                Some(token) => {
                    warn!("Token refresh failed, using cached token until {}: {}", token.expires_at, err);
                    Ok(token)
                }
                None => Err(err),
            },
        }
    }

    /// Issue a one-off token without touching the cached one
    pub async fn generate_token(&self, expiration_minutes: u32) -> Result<Token> {
        self.request_token(expiration_minutes).await
    }

    /// The cached token if it has not yet passed its real expiry.
    ///
    /// Unlike `ensure_valid` this ignores the refresh buffer and never
    /// touches the network.
    pub fn cached_token(&self) -> Option<Token> {
        let now = self.clock.now();
        self.snapshot().filter(|token| now < token.expires_at)
    }

    /// Drop the cached token so the next `ensure_valid` issues a new one
    pub fn invalidate(&self) {
        debug!("Invalidating cached token");
        *self.cached.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn state(&self) -> TokenState {
        let now = self.clock.now();
        let failed = self.last_error.read().unwrap_or_else(|e| e.into_inner()).is_some();

        match self.snapshot() {
            None if failed => TokenState::Failed,
            None => TokenState::Unissued,
            Some(token) if now < self.refresh_at(&token) => TokenState::Valid,
            Some(_) if failed => TokenState::Failed,
            Some(token) if now < token.expires_at => TokenState::NearExpiry,
            Some(_) => TokenState::Expired,
        }
    }

    pub fn status(&self) -> TokenStatus {
        let now = self.clock.now();
        let token = self.snapshot();
        let expires_at = token.as_ref().map(|t| t.expires_at);

        TokenStatus {
            has_token: token.is_some(),
            token_expires_at: expires_at,
            is_expired: !self.is_fresh(token.as_ref(), now),
            minutes_until_expiry: expires_at.map(|at| (at - now).num_minutes()),
            current_time: now,
            state: self.state(),
            last_error: self.last_error.read().unwrap_or_else(|e| e.into_inner()).clone(),
        }
    }

    fn snapshot(&self) -> Option<Token> {
        self.cached.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn fresh_token(&self) -> Option<Token> {
        let now = self.clock.now();
        self.snapshot().filter(|token| self.is_fresh(Some(token), now))
    }

    fn is_fresh(&self, token: Option<&Token>, now: DateTime<Utc>) -> bool {
        match token {
            Some(token) => now < self.refresh_at(token),
            None => false,
        }
    }

    /// When a token enters the refresh buffer
    fn refresh_at(&self, token: &Token) -> DateTime<Utc> {
        token
            .expires_at
            .checked_sub_signed(self.settings.refresh_buffer)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    async fn request_token(&self, expiration_minutes: u32) -> Result<Token> {
        let url = constants::token_endpoint(self.credentials.portal_url(), &self.settings.token_path);
        let form = vec![
            ("username".to_string(), self.credentials.username().to_string()),
            ("password".to_string(), self.credentials.password().to_string()),
            ("client".to_string(), "referer".to_string()),
            ("referer".to_string(), self.settings.referer.clone()),
            ("expiration".to_string(), expiration_minutes.to_string()),
            ("f".to_string(), "json".to_string()),
        ];

        debug!("Requesting portal token from: {}", url);
        let issued_at = self.clock.now();
        let body = self.transport.post_form(&url, &form, self.settings.timeout).await?;

        parse_token_response(&body, issued_at, expiration_minutes)
    }
}

/// Parse a `generateToken` response.
///
/// `expires` is epoch milliseconds; when it is absent the requested lifetime
/// is assumed.
fn parse_token_response(body: &Value, issued_at: DateTime<Utc>, expiration_minutes: u32) -> Result<Token> {
    if let Some(error) = body.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error");
        let details = error
            .get("details")
            .and_then(|d| d.as_array())
            .map(|d| d.iter().filter_map(|v| v.as_str()).collect::<Vec<_>>().join("; "))
            .unwrap_or_default();
        let reason = if details.is_empty() {
            message.to_string()
        } else {
            format!("{} ({})", message, details)
        };
        return Err(ArcgisError::auth(reason));
    }

    let value = body
        .get("token")
        .and_then(|t| t.as_str())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ArcgisError::auth("No token in response"))?;

    let expires_at = body
        .get("expires")
        .and_then(|e| e.as_i64())
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_else(|| issued_at + ChronoDuration::minutes(i64::from(expiration_minutes)));

    Ok(Token::new(value, issued_at, expires_at))
}
