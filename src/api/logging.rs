//! Structured logging with correlation tracking for ArcGIS API operations
//!
//! Every adapter operation gets a correlation ID; request, response and
//! completion events are emitted as single-line JSON through the `log` facade.

use log::{debug, error, info, trace, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Monitoring and logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub correlation_ids: bool,
    pub request_logging: bool,
    pub performance_metrics: bool,
    pub log_level: LogLevel,
    /// Operations slower than this are reported with a warning
    pub slow_operation_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            correlation_ids: true,
            request_logging: true,
            performance_metrics: true,
            log_level: LogLevel::Info,
            slow_operation_ms: 5000,
        }
    }
}

impl MonitoringConfig {
    /// Silence everything except errors
    pub fn quiet() -> Self {
        Self {
            correlation_ids: false,
            request_logging: false,
            performance_metrics: false,
            log_level: LogLevel::Error,
            slow_operation_ms: u64::MAX,
        }
    }
}

/// Structured logger for API operations
#[derive(Debug, Clone)]
pub struct ApiLogger {
    config: MonitoringConfig,
}

/// Context for a single adapter operation
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub correlation_id: String,
    /// Operation name (list_services, query_service_layer, ...)
    pub operation: String,
    /// Service path or endpoint the operation targets
    pub target: String,
    pub metadata: HashMap<String, Value>,
    pub start_time: Instant,
}

#[derive(Debug, Clone)]
pub struct OperationMetrics {
    pub duration: Duration,
    pub success: bool,
    pub status_code: Option<u16>,
    pub error_message: Option<String>,
}

impl ApiLogger {
    pub fn new(config: MonitoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MonitoringConfig {
        &self.config
    }

    /// Start tracking a new operation
    pub fn start_operation(&self, operation: &str, target: &str) -> OperationContext {
        let correlation_id = if self.config.correlation_ids {
            uuid::Uuid::new_v4().to_string()
        } else {
            String::new()
        };

        let context = OperationContext {
            correlation_id,
            operation: operation.to_string(),
            target: target.to_string(),
            metadata: HashMap::new(),
            start_time: Instant::now(),
        };

        if self.config.request_logging && self.should_log(LogLevel::Info) {
            let log_data = json!({
                "event": "operation_started",
                "correlation_id": context.correlation_id,
                "operation": context.operation,
                "target": context.target,
                "timestamp": chrono::Utc::now().to_rfc3339()
            });

            info!("ArcGIS Operation Started: {}", log_data);
        }

        context
    }

    /// Log an outgoing HTTP request; credential parameters are redacted
    pub fn log_request(&self, context: &OperationContext, method: &str, url: &str, params: &[(String, String)]) {
        if !self.config.request_logging || !self.should_log(LogLevel::Debug) {
            return;
        }

        let log_data = json!({
            "event": "http_request",
            "correlation_id": context.correlation_id,
            "operation": context.operation,
            "method": method,
            "url": url,
            "params": sanitize_params(params),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        debug!("HTTP Request: {}", log_data);
    }

    pub fn log_response(&self, context: &OperationContext, success: bool, duration: Duration) {
        if !self.config.request_logging || !self.should_log(LogLevel::Debug) {
            return;
        }

        let log_data = json!({
            "event": "http_response",
            "correlation_id": context.correlation_id,
            "operation": context.operation,
            "success": success,
            "duration_ms": duration.as_millis(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        if success {
            debug!("HTTP Response: {}", log_data);
        } else {
            warn!("HTTP Response (Error): {}", log_data);
        }
    }

    /// Complete an operation and log its metrics
    pub fn complete_operation(&self, context: &OperationContext, metrics: &OperationMetrics) {
        if self.config.performance_metrics && self.should_log(LogLevel::Info) {
            let log_data = json!({
                "event": "operation_completed",
                "correlation_id": context.correlation_id,
                "operation": context.operation,
                "target": context.target,
                "duration_ms": metrics.duration.as_millis(),
                "success": metrics.success,
                "status_code": metrics.status_code,
                "error_message": metrics.error_message,
                "metadata": context.metadata,
                "timestamp": chrono::Utc::now().to_rfc3339()
            });

            if metrics.success {
                info!("ArcGIS Operation Completed: {}", log_data);
            } else {
                error!("ArcGIS Operation Failed: {}", log_data);
            }
        }

        let threshold = Duration::from_millis(self.config.slow_operation_ms);
        if metrics.is_slow(threshold) {
            self.log_performance_warning(context, metrics.duration, threshold);
        }
    }

    pub fn add_metadata(&self, context: &mut OperationContext, key: &str, value: Value) {
        if self.should_log(LogLevel::Trace) {
            trace!("Added metadata to operation {}: {} = {}", context.correlation_id, key, value);
        }

        context.metadata.insert(key.to_string(), value);
    }

    pub fn log_performance_warning(&self, context: &OperationContext, duration: Duration, threshold: Duration) {
        if !self.config.performance_metrics || !self.should_log(LogLevel::Warn) {
            return;
        }

        let log_data = json!({
            "event": "performance_warning",
            "correlation_id": context.correlation_id,
            "operation": context.operation,
            "target": context.target,
            "duration_ms": duration.as_millis(),
            "threshold_ms": threshold.as_millis(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        warn!("Slow Operation Detected: {}", log_data);
    }

    fn should_log(&self, level: LogLevel) -> bool {
        match (self.config.log_level, level) {
            (LogLevel::Error, LogLevel::Error) => true,
            (LogLevel::Warn, LogLevel::Error | LogLevel::Warn) => true,
            (LogLevel::Info, LogLevel::Error | LogLevel::Warn | LogLevel::Info) => true,
            (LogLevel::Debug, LogLevel::Error | LogLevel::Warn | LogLevel::Info | LogLevel::Debug) => true,
            (LogLevel::Trace, _) => true,
            _ => false,
        }
    }
}

/// Replace credential-bearing parameter values with a marker
pub fn sanitize_params(params: &[(String, String)]) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(key, value)| {
            let key_lower = key.to_lowercase();
            if key_lower.contains("token") || key_lower.contains("password") {
                (key.clone(), "[REDACTED]".to_string())
            } else {
                (key.clone(), value.clone())
            }
        })
        .collect()
}

impl OperationContext {
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn create_metrics(&self, success: bool, status_code: Option<u16>, error_message: Option<String>) -> OperationMetrics {
        OperationMetrics {
            duration: self.elapsed(),
            success,
            status_code,
            error_message,
        }
    }
}

impl OperationMetrics {
    pub fn is_slow(&self, threshold: Duration) -> bool {
        self.duration > threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn debug_config() -> MonitoringConfig {
        MonitoringConfig {
            log_level: LogLevel::Debug,
            ..MonitoringConfig::default()
        }
    }

    #[test]
    fn test_operation_context_creation() {
        let logger = ApiLogger::new(debug_config());
        let context = logger.start_operation("list_services", "catalog");

        assert_eq!(context.operation, "list_services");
        assert_eq!(context.target, "catalog");
        assert!(uuid::Uuid::parse_str(&context.correlation_id).is_ok());
        assert!(context.metadata.is_empty());
    }

    #[test]
    fn test_correlation_ids_disabled() {
        let logger = ApiLogger::new(MonitoringConfig::quiet());
        let context = logger.start_operation("list_services", "catalog");
        assert!(context.correlation_id.is_empty());
    }

    #[test]
    fn test_param_sanitization() {
        let params = vec![
            ("where".to_string(), "1=1".to_string()),
            ("token".to_string(), "abc123".to_string()),
            ("password".to_string(), "hunter2".to_string()),
        ];

        let sanitized = sanitize_params(&params);

        assert_eq!(sanitized[0].1, "1=1");
        assert_eq!(sanitized[1].1, "[REDACTED]");
        assert_eq!(sanitized[2].1, "[REDACTED]");
    }

    #[test]
    fn test_log_level_filtering() {
        let logger = ApiLogger::new(MonitoringConfig {
            log_level: LogLevel::Warn,
            ..MonitoringConfig::default()
        });

        assert!(logger.should_log(LogLevel::Error));
        assert!(logger.should_log(LogLevel::Warn));
        assert!(!logger.should_log(LogLevel::Info));
        assert!(!logger.should_log(LogLevel::Trace));
    }

    #[test]
    fn test_slow_operation_threshold() {
        let metrics = OperationMetrics {
            duration: Duration::from_millis(5000),
            success: true,
            status_code: Some(200),
            error_message: None,
        };

        assert!(metrics.is_slow(Duration::from_millis(3000)));
        assert!(!metrics.is_slow(Duration::from_millis(10000)));
    }

    #[test]
    fn test_monitoring_config_from_toml() {
        let config: MonitoringConfig = toml::from_str("log_level = \"debug\"\nrequest_logging = false").unwrap();
        assert_eq!(config.log_level, LogLevel::Debug);
        assert!(!config.request_logging);
        assert!(config.performance_metrics);
    }
}
