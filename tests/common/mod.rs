//! Shared fakes for integration tests
#![allow(dead_code)]

use arcgis_cli::api::{ArcgisClient, ArcgisError, ClientOptions, Clock, Result, Transport};
use arcgis_cli::auth::Credentials;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SERVER: &str = "https://gis.example.com/arcgis/rest/services";
pub const PORTAL: &str = "https://gis.example.com";
pub const TOKEN_URL: &str = "https://gis.example.com/arcgis/sharing/rest/generateToken";

pub fn url(path: &str) -> String {
    format!("{}/{}", SERVER, path)
}

pub fn credentials() -> Credentials {
    Credentials::new(SERVER, PORTAL, "gisuser", "secret").unwrap()
}

/// In-memory transport with canned GET routes and scripted token responses.
///
/// Unscripted token requests succeed with `token-N` and no `expires`, so the
/// requested lifetime is measured from the test clock.
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<String, Result<Value>>>,
    token_responses: Mutex<VecDeque<Result<Value>>>,
    post_delay: Duration,
    get_calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
    timeouts: Mutex<Vec<(String, Duration)>>,
    token_requests: AtomicUsize,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_post_delay(mut self, delay: Duration) -> Self {
        self.post_delay = delay;
        self
    }

    pub fn route(&self, url: impl Into<String>, body: Value) {
        self.routes.lock().unwrap().insert(url.into(), Ok(body));
    }

    pub fn fail(&self, url: impl Into<String>, err: ArcgisError) {
        self.routes.lock().unwrap().insert(url.into(), Err(err));
    }

    pub fn queue_token(&self, response: Result<Value>) {
        self.token_responses.lock().unwrap().push_back(response);
    }

    pub fn token_requests(&self) -> usize {
        self.token_requests.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.get_calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.get_calls().iter().filter(|(u, _)| u == url).count()
    }

    /// Timeout passed with the most recent GET or POST to `url`
    pub fn last_timeout(&self, url: &str) -> Option<Duration> {
        self.timeouts
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(u, _)| u == url)
            .map(|(_, timeout)| *timeout)
    }

    /// Parameters of the most recent GET to `url`
    pub fn last_params(&self, url: &str) -> Option<Vec<(String, String)>> {
        self.get_calls()
            .into_iter()
            .rev()
            .find(|(u, _)| u == url)
            .map(|(_, params)| params)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get_json(&self, url: &str, params: &[(String, String)], timeout: Duration) -> Result<Value> {
        self.get_calls.lock().unwrap().push((url.to_string(), params.to_vec()));
        self.timeouts.lock().unwrap().push((url.to_string(), timeout));
        self.routes
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(ArcgisError::network(url, Some(404), "Not Found")))
    }

    async fn post_form(&self, url: &str, _form: &[(String, String)], timeout: Duration) -> Result<Value> {
        assert_eq!(url, TOKEN_URL);
        self.timeouts.lock().unwrap().push((url.to_string(), timeout));
        let n = self.token_requests.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.post_delay.is_zero() {
            tokio::time::sleep(self.post_delay).await;
        }
        let scripted = self.token_responses.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(json!({ "token": format!("token-{}", n) })))
    }
}

/// Clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()),
        }
    }

    pub fn advance(&self, by: ChronoDuration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Root with one service plus `Hosted` and `Utilities` folders
pub fn sample_catalog(transport: &FakeTransport) {
    transport.route(
        SERVER,
        json!({
            "currentVersion": 11.1,
            "folders": ["Hosted", "Utilities"],
            "services": [
                {"name": "CityZoning", "type": "MapServer"}
            ]
        }),
    );
    transport.route(
        url("Hosted"),
        json!({
            "services": [
                {"name": "Hosted/TouristAttractions", "type": "FeatureServer"},
                {"name": "Hosted/Trails", "type": "FeatureServer"}
            ]
        }),
    );
    transport.route(
        url("Utilities"),
        json!({"services": [{"name": "Utilities/PrintingTools", "type": "GPServer"}]}),
    );
}

pub fn client_with(transport: Arc<FakeTransport>, clock: Arc<ManualClock>) -> ArcgisClient {
    ArcgisClient::with_clock(credentials(), ClientOptions::default(), transport, clock)
}

pub fn client(transport: Arc<FakeTransport>) -> ArcgisClient {
    client_with(transport, Arc::new(ManualClock::new()))
}
