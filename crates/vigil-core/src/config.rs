use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use vigil_signals::YawnConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VigilConfig {
    pub pipeline: PipelineConfig,
    pub score: ScoreConfig,
    pub yawn: YawnConfig,
}

/// Frame intake and alert-suppression tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Minimum elapsed time between two accepted frames.
    pub min_process_interval_ms: i64,
    /// Consecutive face-not-detected frames before entering `NoFace`.
    pub no_face_frame_threshold: u32,
    /// Cooldown opened when the user acknowledges a warning.
    pub cooldown_ms: i64,
    /// Trailing window for the excessive-blink rule.
    pub blink_window_ms: i64,
    /// Blink count above which the blink penalty applies.
    pub blink_count_threshold: usize,
    /// Default trailing window for recent-yawn queries.
    pub yawn_window_ms: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_process_interval_ms: 50,
            no_face_frame_threshold: 5,
            cooldown_ms: 8_000,
            blink_window_ms: 60_000,
            blink_count_threshold: 25,
            yawn_window_ms: 60_000,
        }
    }
}

/// Penalty/recovery dynamics of the score engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreConfig {
    pub yawn_penalty: u8,
    pub blink_penalty: u8,
    /// Sustained eye closure raises the score to at least this value.
    pub eye_closure_floor: u8,
    /// Recovery freeze after a yawn.
    pub hold_after_yawn_ms: i64,
    pub recover_step: u8,
    pub recover_period_ms: i64,
    /// Accelerated recovery inside the acknowledgment cooldown.
    pub fast_recover_step: u8,
    pub fast_recover_period_ms: i64,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            yawn_penalty: 10,
            blink_penalty: 10,
            eye_closure_floor: 70,
            hold_after_yawn_ms: 2_000,
            recover_step: 1,
            recover_period_ms: 1_500,
            fast_recover_step: 3,
            fast_recover_period_ms: 1_000,
        }
    }
}

impl VigilConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: VigilConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    /// Environment variables are prefixed with VIGIL_
    /// Example: VIGIL_PIPELINE_MIN_PROCESS_INTERVAL_MS=33
    pub fn from_file_with_env<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    pub(crate) fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        use std::env;

        fn parse<T: std::str::FromStr>(name: &str, val: String) -> Result<T, ConfigError> {
            val.parse()
                .map_err(|_| ConfigError::Validation(format!("Invalid {}", name)))
        }

        if let Ok(val) = env::var("VIGIL_PIPELINE_MIN_PROCESS_INTERVAL_MS") {
            self.pipeline.min_process_interval_ms =
                parse("VIGIL_PIPELINE_MIN_PROCESS_INTERVAL_MS", val)?;
        }
        if let Ok(val) = env::var("VIGIL_PIPELINE_COOLDOWN_MS") {
            self.pipeline.cooldown_ms = parse("VIGIL_PIPELINE_COOLDOWN_MS", val)?;
        }
        if let Ok(val) = env::var("VIGIL_PIPELINE_BLINK_COUNT_THRESHOLD") {
            self.pipeline.blink_count_threshold =
                parse("VIGIL_PIPELINE_BLINK_COUNT_THRESHOLD", val)?;
        }
        if let Ok(val) = env::var("VIGIL_SCORE_EYE_CLOSURE_FLOOR") {
            self.score.eye_closure_floor = parse("VIGIL_SCORE_EYE_CLOSURE_FLOOR", val)?;
        }
        if let Ok(val) = env::var("VIGIL_YAWN_OPEN_HOLD_MS") {
            self.yawn.open_hold_ms = parse("VIGIL_YAWN_OPEN_HOLD_MS", val)?;
        }
        if let Ok(val) = env::var("VIGIL_YAWN_COOLDOWN_MS") {
            self.yawn.cooldown_ms = parse("VIGIL_YAWN_COOLDOWN_MS", val)?;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.min_process_interval_ms < 0 {
            return Err(ConfigError::Validation(
                "pipeline.min_process_interval_ms must be non-negative".to_string(),
            ));
        }
        if self.pipeline.no_face_frame_threshold == 0 {
            return Err(ConfigError::Validation(
                "pipeline.no_face_frame_threshold must be > 0".to_string(),
            ));
        }
        if self.pipeline.cooldown_ms < 0 {
            return Err(ConfigError::Validation(
                "pipeline.cooldown_ms must be non-negative".to_string(),
            ));
        }
        if self.pipeline.blink_window_ms <= 0 || self.pipeline.yawn_window_ms <= 0 {
            return Err(ConfigError::Validation(
                "pipeline window sizes must be positive".to_string(),
            ));
        }

        if self.score.eye_closure_floor > 100 {
            return Err(ConfigError::Validation(
                "score.eye_closure_floor must be <= 100".to_string(),
            ));
        }
        if self.score.yawn_penalty > 100 || self.score.blink_penalty > 100 {
            return Err(ConfigError::Validation(
                "score penalties must be <= 100".to_string(),
            ));
        }
        if self.score.recover_period_ms <= 0 || self.score.fast_recover_period_ms <= 0 {
            return Err(ConfigError::Validation(
                "score recovery periods must be positive".to_string(),
            ));
        }
        if self.score.recover_step == 0 || self.score.fast_recover_step == 0 {
            return Err(ConfigError::Validation(
                "score recovery steps must be > 0".to_string(),
            ));
        }
        if self.score.hold_after_yawn_ms < 0 {
            return Err(ConfigError::Validation(
                "score.hold_after_yawn_ms must be non-negative".to_string(),
            ));
        }

        if self.yawn.alpha <= 0.0 || self.yawn.alpha > 1.0 {
            return Err(ConfigError::Validation(
                "yawn.alpha must be in (0, 1]".to_string(),
            ));
        }
        if self.yawn.baseline_alpha <= 0.0 || self.yawn.baseline_alpha >= self.yawn.alpha {
            return Err(ConfigError::Validation(
                "yawn.baseline_alpha must be in (0, alpha)".to_string(),
            ));
        }
        if self.yawn.baseline_seed <= 0.0 {
            return Err(ConfigError::Validation(
                "yawn.baseline_seed must be positive".to_string(),
            ));
        }
        if self.yawn.baseline_gate <= 1.0 {
            return Err(ConfigError::Validation(
                "yawn.baseline_gate must be > 1.0".to_string(),
            ));
        }
        if self.yawn.k_over_baseline <= 1.0 {
            return Err(ConfigError::Validation(
                "yawn.k_over_baseline must be > 1.0".to_string(),
            ));
        }
        if self.yawn.release_ratio <= 0.0 || self.yawn.release_ratio >= 1.0 {
            return Err(ConfigError::Validation(
                "yawn.release_ratio must be in (0, 1)".to_string(),
            ));
        }
        if self.yawn.open_hold_ms <= 0 || self.yawn.cooldown_ms < 0 {
            return Err(ConfigError::Validation(
                "yawn.open_hold_ms must be positive and cooldown_ms non-negative".to_string(),
            ));
        }

        Ok(())
    }

    /// Export configuration to TOML string
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = self
            .to_toml_string()
            .map_err(|e| ConfigError::Validation(format!("TOML serialization error: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }
}
