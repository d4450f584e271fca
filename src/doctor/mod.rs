//! Doctor command for system diagnostics
//!
//! Checks configuration, credentials, the upstream services and that the
//! embedder and the vector index agree on the vector dimension.

use colored::*;
use std::path::Path;

use crate::cli::config::Config;
use crate::cli::credentials::Credentials;
use crate::errors::{RagError, Result};
use crate::rag::RAGPipeline;

/// Health check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Pass,
    Warn(String),
    Fail(String),
}

/// Individual health check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
}

impl HealthCheck {
    pub fn pass(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: HealthStatus::Pass,
        }
    }

    pub fn warn(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: HealthStatus::Warn(message.into()),
        }
    }

    pub fn fail(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: HealthStatus::Fail(message.into()),
        }
    }

    /// Pass on `Ok`, fail with the error text otherwise
    pub fn from_result<T>(name: &str, result: &Result<T>) -> Self {
        match result {
            Ok(_) => Self::pass(name),
            Err(e) => Self::fail(name, e.to_string()),
        }
    }
}

/// Doctor diagnostics system
pub struct Doctor {
    config: Config,
}

impl Doctor {
    /// Create a new doctor instance
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run all health checks
    pub async fn run_diagnostics(&self) -> Vec<HealthCheck> {
        let mut checks = vec![self.check_config(), self.check_state_dir()];

        match Credentials::from_env(&self.config.index) {
            Ok(credentials) => {
                checks.push(HealthCheck::pass("Credentials"));
                checks.extend(self.check_services(&credentials).await);
            }
            Err(e) => checks.push(HealthCheck::fail("Credentials", e.to_string())),
        }

        checks
    }

    /// Check 1: configuration values
    fn check_config(&self) -> HealthCheck {
        HealthCheck::from_result("Configuration", &self.config.validate())
    }

    /// Check 2: state directory writable
    fn check_state_dir(&self) -> HealthCheck {
        check_writable(&self.config.state_dir())
    }

    /// Checks 3-5: index connection, embedding service, dimension agreement
    async fn check_services(&self, credentials: &Credentials) -> Vec<HealthCheck> {
        let pipeline = match RAGPipeline::from_config(&self.config, credentials).await {
            Ok(pipeline) => pipeline,
            Err(e) => return vec![HealthCheck::fail("Pipeline Setup", e.to_string())],
        };

        let embedding = pipeline.embedder().embed("connectivity check").await;
        let compatibility = pipeline.verify_compatibility().await;

        vec![
            HealthCheck::from_result("Embedding Service", &embedding),
            compatibility_check(&compatibility),
        ]
    }

    /// Display diagnostics results
    pub fn display_results(checks: &[HealthCheck]) {
        println!("\n{}\n", "🔍 ragbuddy System Diagnostics".bold());
        println!("{:<20} {}", "Check", "Status");
        println!("{}", "=".repeat(50));

        for check in checks {
            let status = match &check.status {
                HealthStatus::Pass => "✅ PASS".green(),
                HealthStatus::Warn(msg) => format!("⚠️  WARN: {}", msg).yellow(),
                HealthStatus::Fail(msg) => format!("❌ FAIL: {}", msg).red(),
            };
            println!("{:<20} {}", check.name, status);
        }
        println!();
    }

    /// Get overall health status
    pub fn overall_status(checks: &[HealthCheck]) -> bool {
        !checks.iter().any(|c| matches!(c.status, HealthStatus::Fail(_)))
    }
}

/// Dimension agreement between embedder and index
pub fn compatibility_check(result: &Result<usize>) -> HealthCheck {
    const NAME: &str = "Index Dimension";
    match result {
        Ok(_) => HealthCheck::pass(NAME),
        Err(RagError::DimensionMismatch { expected, actual }) => HealthCheck::fail(
            NAME,
            format!("index has {}, embedder produces {}", expected, actual),
        ),
        Err(e) => HealthCheck::fail(NAME, e.to_string()),
    }
}

fn check_writable(dir: &Path) -> HealthCheck {
    const NAME: &str = "State Directory";

    if let Err(e) = std::fs::create_dir_all(dir) {
        return HealthCheck::fail(NAME, format!("cannot create {}: {}", dir.display(), e));
    }

    let test_file = dir.join(".ragbuddy_test");
    match std::fs::write(&test_file, "test") {
        Ok(_) => {
            let _ = std::fs::remove_file(&test_file);
            HealthCheck::pass(NAME)
        }
        Err(_) => HealthCheck::warn(NAME, format!("{} is not writable", dir.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_overall_status_pass() {
        let checks = vec![
            HealthCheck::pass("Test 1"),
            HealthCheck::warn("Test 2", "warning"),
        ];
        assert!(Doctor::overall_status(&checks));
    }

    #[test]
    fn test_overall_status_fail() {
        let checks = vec![HealthCheck::pass("Test 1"), HealthCheck::fail("Test 2", "error")];
        assert!(!Doctor::overall_status(&checks));
    }

    #[test]
    fn test_compatibility_check() {
        assert_eq!(compatibility_check(&Ok(768)).status, HealthStatus::Pass);

        let mismatch = compatibility_check(&Err(RagError::DimensionMismatch {
            expected: 3072,
            actual: 768,
        }));
        assert_eq!(
            mismatch.status,
            HealthStatus::Fail("index has 3072, embedder produces 768".to_string())
        );
    }

    #[test]
    fn test_check_config_invalid_temperature() {
        let mut config = Config::default();
        config.persona.temperature = 0.9;
        let check = Doctor::new(config).check_config();
        assert!(matches!(check.status, HealthStatus::Fail(_)));
    }

    #[test]
    fn test_check_writable() {
        let temp = TempDir::new().unwrap();
        let check = check_writable(&temp.path().join("state"));
        assert_eq!(check.status, HealthStatus::Pass);
    }
}
