//! Run configuration.
//!
//! Loaded from `.json`, `.yaml` or `.yml`; CLI flags override individual
//! fields after loading.

use crate::dispatcher::DispatchMode;
use crate::plan::PipelinePlan;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Dump file, or a glob pattern matching several.
    pub input: String,

    /// Upper bound on chunks per file (further capped by the CPU count).
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Concurrent workers. Defaults to the number of chunks.
    #[serde(default)]
    pub pool_size: Option<usize>,

    /// Records per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default)]
    pub mode: DispatchMode,

    #[serde(default)]
    pub plan: PipelinePlan,

    /// Default tracing filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_max_workers() -> usize {
    16
}

fn default_batch_size() -> usize {
    250
}

fn default_log_level() -> String {
    "info".to_string()
}

impl RunConfig {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            max_workers: default_max_workers(),
            pool_size: None,
            batch_size: default_batch_size(),
            mode: DispatchMode::default(),
            plan: PipelinePlan::default(),
            log_level: default_log_level(),
        }
    }

    /// The configuration written by `generate-config`.
    pub fn sample() -> Self {
        Self {
            plan: PipelinePlan::sample(),
            ..Self::new("dumps/ol_dump_editions_*.txt")
        }
    }

    /// Load configuration from a file, picking the format from its extension.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let config = match ext {
            "json" => Self::from_json(&contents),
            "yaml" | "yml" => Self::from_yaml(&contents),
            other => bail!("unsupported config format `{other}` for {}", path.display()),
        };
        config.with_context(|| format!("load config {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    #[cfg(feature = "yaml-config")]
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    #[cfg(not(feature = "yaml-config"))]
    pub fn from_yaml(_yaml: &str) -> Result<Self> {
        bail!("YAML configuration requires the `yaml-config` feature")
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    #[cfg(feature = "yaml-config")]
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Serialize in the format implied by `path`'s extension.
    pub fn render_for(&self, path: impl AsRef<Path>) -> Result<String> {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            #[cfg(feature = "yaml-config")]
            Some("yaml" | "yml") => self.to_yaml(),
            _ => self.to_json(),
        }
    }

    /// # Errors
    /// Rejects empty inputs, zero sizes and invalid plans.
    pub fn validate(&self) -> Result<()> {
        if self.input.trim().is_empty() {
            bail!("input must not be empty");
        }
        if self.max_workers == 0 {
            bail!("max_workers must be at least 1");
        }
        if self.batch_size == 0 {
            bail!("batch_size must be at least 1");
        }
        if self.pool_size == Some(0) {
            bail!("pool_size must be at least 1");
        }
        self.plan.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_json_uses_defaults() -> Result<()> {
        let cfg = RunConfig::from_json(r#"{"input":"dump.txt"}"#)?;
        assert_eq!(cfg, RunConfig::new("dump.txt"));
        assert_eq!(cfg.batch_size, 250);
        assert_eq!(cfg.mode, DispatchMode::Processes);
        Ok(())
    }

    #[cfg(feature = "yaml-config")]
    #[test]
    fn sample_round_trips_through_yaml() -> Result<()> {
        let sample = RunConfig::sample();
        assert_eq!(RunConfig::from_yaml(&sample.to_yaml()?)?, sample);
        Ok(())
    }

    #[test]
    fn validate_rejects_zero_batch() {
        let mut cfg = RunConfig::new("dump.txt");
        cfg.batch_size = 0;
        assert!(cfg.validate().is_err());
    }
}
