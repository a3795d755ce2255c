//! 解析パイプラインの設定
//!
//! 優先順位: コマンドライン引数 > TOML ファイル > 既定値

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::PipelineError;

pub const DEFAULT_MAX_IN_FLIGHT: usize = 32;
pub const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 300;

fn default_workers() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

fn default_max_in_flight() -> usize {
    DEFAULT_MAX_IN_FLIGHT
}

fn default_drain_timeout_secs() -> u64 {
    DEFAULT_DRAIN_TIMEOUT_SECS
}

/// TOML で指定できる設定
///
/// ```toml
/// workers = 8
/// max_in_flight = 32
/// drain_timeout_secs = 300
/// max_games = 100000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalyzerConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
    #[serde(default)]
    pub max_games: Option<u64>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_in_flight: default_max_in_flight(),
            drain_timeout_secs: default_drain_timeout_secs(),
            max_games: None,
        }
    }
}

/// 検証済みの実行時オプション
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    pub workers: usize,
    pub max_in_flight: usize,
    pub drain_timeout: Duration,
    pub max_games: Option<u64>,
}

impl AnalyzerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, PipelineError> {
        toml::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
            .map_err(|e| PipelineError::Config(format!("{}: {e}", path.display())))
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.workers == 0 {
            return Err(PipelineError::Config("workers must be at least 1".to_string()));
        }
        if self.max_in_flight == 0 {
            return Err(PipelineError::Config("max_in_flight must be at least 1".to_string()));
        }
        if self.max_games == Some(0) {
            return Err(PipelineError::Config("max_games must be at least 1 when set".to_string()));
        }
        Ok(())
    }

    pub fn pipeline_options(&self) -> Result<PipelineOptions, PipelineError> {
        self.validate()?;
        Ok(PipelineOptions {
            workers: self.workers,
            max_in_flight: self.max_in_flight,
            drain_timeout: Duration::from_secs(self.drain_timeout_secs),
            max_games: self.max_games,
        })
    }
}
