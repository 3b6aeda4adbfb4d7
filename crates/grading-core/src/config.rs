//! Engine configuration: defaults, TOML files and environment overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{GradingError, GradingResult};
use crate::evaluator::GeminiConfig;
use crate::job::{JobConfig, WorkerConfig};

/// Serde adapter storing a `Duration` as whole seconds.
pub mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Top-level configuration.
///
/// ```toml
/// [evaluator]
/// model = "gemini-flash-latest"
/// timeout_secs = 120
///
/// [job]
/// max_retries = 5
/// inter_stage_pause_secs = 5
///
/// [worker]
/// job_start_interval_secs = 60
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradingConfig {
    pub evaluator: GeminiConfig,
    pub job: JobConfig,
    pub worker: WorkerConfig,
}

impl GradingConfig {
    /// Defaults overridden by process environment variables.
    pub fn from_env() -> GradingResult<Self> {
        let mut config = Self::default();
        config.apply_env_from(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML file. Missing sections and fields keep their defaults.
    pub fn from_toml_file(path: &Path) -> GradingResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> GradingResult<Self> {
        toml::from_str(content).map_err(|e| GradingError::Config(e.to_string()))
    }

    /// Apply overrides from `lookup` (the environment in production).
    pub fn apply_env_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> GradingResult<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("GEMINI_API_KEY").or_else(|| get("GOOGLE_API_KEY")) {
            self.evaluator.api_key = Some(key);
        }
        if let Some(model) = get("GRADER_MODEL") {
            self.evaluator.model = model;
        }
        if let Some(url) = get("GRADER_EVALUATOR_URL") {
            self.evaluator = self.evaluator.clone().with_base_url(url.trim());
        }
        if let Some(raw) = get("GRADER_MAX_RETRIES") {
            self.job.max_retries = parse_number("GRADER_MAX_RETRIES", &raw)?;
        }
        if let Some(raw) = get("GRADER_INTER_STAGE_PAUSE_SECS") {
            self.job.inter_stage_pause =
                Duration::from_secs(parse_number("GRADER_INTER_STAGE_PAUSE_SECS", &raw)?);
        }
        if let Some(raw) = get("GRADER_JOB_START_INTERVAL_SECS") {
            self.worker.job_start_interval =
                Duration::from_secs(parse_number("GRADER_JOB_START_INTERVAL_SECS", &raw)?);
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> GradingResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| GradingError::Config(format!("{key} must be a non-negative integer, got {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let config = GradingConfig::default();
        assert_eq!(config.evaluator.model, "gemini-flash-latest");
        assert_eq!(config.job.max_retries, 5);
        assert_eq!(config.job.inter_stage_pause, Duration::from_secs(5));
        assert_eq!(config.worker.job_start_interval, Duration::from_secs(60));
        assert_eq!(config.worker.max_concurrent_jobs, 1);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = GradingConfig::default();
        config
            .apply_env_from(lookup(&[
                ("GOOGLE_API_KEY", "g-key"),
                ("GRADER_MODEL", "gemini-pro"),
                ("GRADER_MAX_RETRIES", "2"),
                ("GRADER_INTER_STAGE_PAUSE_SECS", "0"),
                ("GRADER_JOB_START_INTERVAL_SECS", " 30 "),
            ]))
            .unwrap();

        assert_eq!(config.evaluator.api_key.as_deref(), Some("g-key"));
        assert_eq!(config.evaluator.model, "gemini-pro");
        assert_eq!(config.job.max_retries, 2);
        assert!(config.job.inter_stage_pause.is_zero());
        assert_eq!(config.worker.job_start_interval, Duration::from_secs(30));
    }

    #[test]
    fn evaluator_url_override_drops_trailing_slash() {
        let mut config = GradingConfig::default();
        config
            .apply_env_from(lookup(&[("GRADER_EVALUATOR_URL", "http://localhost:8080/")]))
            .unwrap();
        assert_eq!(config.evaluator.base_url, "http://localhost:8080");
    }

    #[test]
    fn gemini_key_wins_over_google_key() {
        let mut config = GradingConfig::default();
        config
            .apply_env_from(lookup(&[
                ("GEMINI_API_KEY", "primary"),
                ("GOOGLE_API_KEY", "fallback"),
            ]))
            .unwrap();
        assert_eq!(config.evaluator.api_key.as_deref(), Some("primary"));
    }

    #[test]
    fn invalid_number_is_a_config_error() {
        let mut config = GradingConfig::default();
        let err = config
            .apply_env_from(lookup(&[("GRADER_MAX_RETRIES", "many")]))
            .unwrap_err();
        assert!(matches!(err, GradingError::Config(msg) if msg.contains("GRADER_MAX_RETRIES")));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = GradingConfig::from_toml(
            r#"
            [job]
            inter_stage_pause_secs = 0

            [worker]
            max_concurrent_jobs = 3
            "#,
        )
        .unwrap();
        assert!(config.job.inter_stage_pause.is_zero());
        assert_eq!(config.job.max_retries, 5);
        assert_eq!(config.worker.max_concurrent_jobs, 3);
        assert_eq!(config.evaluator.model, "gemini-flash-latest");
    }

    #[test]
    fn toml_file_round_trip() {
        let mut config = GradingConfig::default();
        config.job.max_retries = 7;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(toml::to_string(&config).unwrap().as_bytes())
            .unwrap();

        let loaded = GradingConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn malformed_toml_is_rejected() {
        let err = GradingConfig::from_toml("[job]\nmax_retries = \"five\"").unwrap_err();
        assert!(matches!(err, GradingError::Config(_)));
    }
}
