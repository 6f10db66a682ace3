// file: src/utils/telemetry.rs
// description: health checks for the verify command and timing of long operations
// reference: tracing spans and health reporting

use crate::config::LlmConfig;
use crate::database::LanceDbClient;
use crate::utils::Validator;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    fn icon(self) -> &'static str {
        match self {
            HealthStatus::Healthy => "✓",
            HealthStatus::Degraded => "⚠",
            HealthStatus::Unhealthy => "✗",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub component: String,
    pub status: HealthStatus,
    pub message: Option<String>,
    pub response_time_ms: u64,
}

impl HealthCheck {
    pub fn healthy(component: &str, response_time: Duration) -> Self {
        Self::with_status(component, HealthStatus::Healthy, None, response_time)
    }

    pub fn degraded(component: &str, message: String, response_time: Duration) -> Self {
        Self::with_status(component, HealthStatus::Degraded, Some(message), response_time)
    }

    pub fn unhealthy(component: &str, message: String, response_time: Duration) -> Self {
        Self::with_status(component, HealthStatus::Unhealthy, Some(message), response_time)
    }

    fn with_status(
        component: &str,
        status: HealthStatus,
        message: Option<String>,
        response_time: Duration,
    ) -> Self {
        Self {
            component: component.to_string(),
            status,
            message,
            response_time_ms: response_time.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub overall_status: HealthStatus,
    pub checks: Vec<HealthCheck>,
    pub timestamp: String,
    pub version: String,
}

impl HealthReport {
    pub fn new(checks: Vec<HealthCheck>, version: String) -> Self {
        let overall_status = if checks.iter().any(|c| c.status == HealthStatus::Unhealthy) {
            HealthStatus::Unhealthy
        } else if checks.iter().any(|c| c.status == HealthStatus::Degraded) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        Self {
            overall_status,
            checks,
            timestamp: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            version,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.overall_status != HealthStatus::Unhealthy
    }

    pub fn format(&self) -> String {
        let mut output = format!(
            "{} System Health: {:?}\nVersion: {}\nTimestamp: {}\n\n",
            self.overall_status.icon(),
            self.overall_status,
            self.version,
            self.timestamp
        );

        for check in &self.checks {
            output.push_str(&format!(
                "{} {} ({:?}) - {}ms",
                check.status.icon(),
                check.component,
                check.status,
                check.response_time_ms
            ));

            if let Some(ref msg) = check.message {
                output.push_str(&format!("\n  {}", msg));
            }

            output.push('\n');
        }

        output
    }
}

pub async fn check_lancedb(client: &LanceDbClient) -> HealthCheck {
    let start = Instant::now();

    if let Err(e) = client.ping().await {
        return HealthCheck::unhealthy("lancedb", e.to_string(), start.elapsed());
    }

    let mut missing = Vec::new();
    for table in client.index_tables() {
        match client.table_exists(table).await {
            Ok(true) => {}
            Ok(false) => missing.push(table),
            Err(e) => return HealthCheck::unhealthy("lancedb", e.to_string(), start.elapsed()),
        }
    }

    if missing.is_empty() {
        HealthCheck::healthy("lancedb", start.elapsed())
    } else {
        HealthCheck::degraded(
            "lancedb",
            format!("Indexes not built yet: {}", missing.join(", ")),
            start.elapsed(),
        )
    }
}

/// Only inspects configuration; no request is sent.
pub fn check_llm(config: &LlmConfig) -> HealthCheck {
    let start = Instant::now();

    if let Err(e) = Validator::validate_url(&config.base_url) {
        return HealthCheck::unhealthy("llm", e.to_string(), start.elapsed());
    }

    match config.api_key {
        Some(_) => HealthCheck::healthy("llm", start.elapsed()),
        None => HealthCheck::degraded(
            "llm",
            "No API key set; using hashed embeddings and extractive answers".to_string(),
            start.elapsed(),
        ),
    }
}

pub fn check_source_file(component: &str, path: &Path, allowed: &[&str]) -> HealthCheck {
    let start = Instant::now();

    let result = Validator::validate_file_path(path)
        .and_then(|_| Validator::validate_extension(path, allowed));

    match result {
        Ok(()) => HealthCheck::healthy(component, start.elapsed()),
        Err(e) => HealthCheck::degraded(component, e.to_string(), start.elapsed()),
    }
}

pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        info!("Starting operation: {}", operation);
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn finish(self) -> Duration {
        let elapsed = self.elapsed();
        info!(
            "Completed operation: {} in {:.2}s",
            self.operation,
            elapsed.as_secs_f64()
        );
        elapsed
    }

    pub fn warn_if_slow(&self, threshold: Duration, message: &str) {
        let elapsed = self.elapsed();
        if elapsed > threshold {
            warn!(
                "Slow operation [{}]: {} took {:.2}s (threshold: {:.2}s)",
                self.operation,
                message,
                elapsed.as_secs_f64(),
                threshold.as_secs_f64()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::utils::validation::PDF_EXTENSIONS;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_health_report_overall_status() {
        let checks = vec![
            HealthCheck::healthy("lancedb", Duration::from_millis(10)),
            HealthCheck::degraded("llm", "no key".to_string(), Duration::from_millis(1)),
        ];

        let report = HealthReport::new(checks, "0.1.0".to_string());
        assert_eq!(report.overall_status, HealthStatus::Degraded);
        assert!(report.is_healthy());
        assert!(report.format().contains("⚠ llm (Degraded) - 1ms\n  no key"));
    }

    #[test]
    fn test_unhealthy_dominates() {
        let report = HealthReport::new(
            vec![
                HealthCheck::degraded("llm", "no key".to_string(), Duration::ZERO),
                HealthCheck::unhealthy("lancedb", "down".to_string(), Duration::ZERO),
            ],
            "0.1.0".to_string(),
        );
        assert_eq!(report.overall_status, HealthStatus::Unhealthy);
        assert!(!report.is_healthy());
    }

    #[test]
    fn test_check_llm_without_key_is_degraded() {
        let mut config = Config::default_config().llm;
        config.api_key = None;
        assert_eq!(check_llm(&config).status, HealthStatus::Degraded);

        config.api_key = Some("sk-test".to_string());
        assert_eq!(check_llm(&config).status, HealthStatus::Healthy);
    }

    #[test]
    fn test_check_source_file() {
        let dir = tempdir().unwrap();
        let pdf = dir.path().join("report.pdf");

        assert_eq!(
            check_source_file("sample_pdf", &pdf, PDF_EXTENSIONS).status,
            HealthStatus::Degraded
        );

        std::fs::write(&pdf, b"%PDF-1.4").unwrap();
        assert_eq!(
            check_source_file("sample_pdf", &pdf, PDF_EXTENSIONS).status,
            HealthStatus::Healthy
        );
    }

    #[tokio::test]
    async fn test_check_lancedb_reports_missing_indexes() {
        let dir = tempdir().unwrap();
        let mut config = Config::default_config().database;
        config.uri = dir.path().join("lancedb").display().to_string();

        let client = LanceDbClient::new(config).await.unwrap();
        let check = check_lancedb(&client).await;
        assert_eq!(check.status, HealthStatus::Degraded);
        assert!(check.message.unwrap().contains("pdf_index"));
    }

    #[test]
    fn test_operation_timer() {
        let timer = OperationTimer::new("test");
        std::thread::sleep(Duration::from_millis(10));
        let elapsed = timer.finish();
        assert!(elapsed >= Duration::from_millis(10));
    }
}
