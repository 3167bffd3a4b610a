//! Gym configuration.
//!
//! Holds the deadlines, grading tolerance, reward weights and tool
//! executables shared by the adapters, the reward and the verifier.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::adapters::{Executable, DEFAULT_TIMEOUT};
use crate::error::ConfigError;
use crate::reward::RewardWeights;
use crate::tool_call::ToolName;

/// Default minimum span F1 for a verification case to pass.
pub const DEFAULT_MIN_F1: f64 = 0.95;

/// Configuration for tool execution, grading and verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GymConfig {
    /// Deadline for one tool call.
    pub timeout: Duration,
    /// Lines each span is widened by when matching.
    pub tolerance: u32,
    /// Maximum verification cases run at once.
    pub max_concurrent: usize,
    /// Minimum span F1 for a verification case to pass.
    pub min_f1: f64,
    /// Reward formula weights.
    pub weights: RewardWeights,
    /// How to launch ast-grep.
    pub ast_grep_executable: Executable,
    /// How to launch ripgrep.
    pub ripgrep_executable: Executable,
}

impl Default for GymConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            tolerance: 0,
            max_concurrent: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            min_f1: DEFAULT_MIN_F1,
            weights: RewardWeights::default(),
            ast_grep_executable: Executable::new(ToolName::StructuralSearch.default_program()),
            ripgrep_executable: Executable::new(ToolName::TextSearch.default_program()),
        }
    }
}

impl GymConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `GYM_TIMEOUT_SECS`: Tool call deadline in seconds (default: 30)
    /// - `GYM_TOLERANCE`: Span matching tolerance in lines (default: 0)
    /// - `GYM_MAX_CONCURRENT`: Concurrent verification cases (default: available parallelism)
    /// - `GYM_MIN_F1`: Pass threshold for verification (default: 0.95)
    /// - `GYM_REWARD_ALPHA`, `GYM_REWARD_BETA`, `GYM_REWARD_GAMMA`,
    ///   `GYM_REWARD_DELTA`, `GYM_REWARD_ZETA`: Reward weights
    /// - `GYM_EFFORT_PER_FP`: Effort charged per false positive (default: 0.01)
    /// - `GYM_AST_GREP_BIN`: ast-grep command, split on whitespace (default: ast-grep)
    /// - `GYM_RIPGREP_BIN`: ripgrep command, split on whitespace (default: rg)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`GymConfig::from_env`], reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("GYM_TIMEOUT_SECS") {
            let secs: f64 = parse_env_value(&val, "GYM_TIMEOUT_SECS")?;
            config.timeout = Duration::try_from_secs_f64(secs).map_err(|e| {
                ConfigError::InvalidValue {
                    key: "GYM_TIMEOUT_SECS".to_string(),
                    message: e.to_string(),
                }
            })?;
        }

        if let Some(val) = lookup("GYM_TOLERANCE") {
            config.tolerance = parse_env_value(&val, "GYM_TOLERANCE")?;
        }

        if let Some(val) = lookup("GYM_MAX_CONCURRENT") {
            config.max_concurrent = parse_env_value(&val, "GYM_MAX_CONCURRENT")?;
        }

        if let Some(val) = lookup("GYM_MIN_F1") {
            config.min_f1 = parse_env_value(&val, "GYM_MIN_F1")?;
        }

        // Reward weights
        let weights = &mut config.weights;
        for (key, slot) in [
            ("GYM_REWARD_ALPHA", &mut weights.alpha),
            ("GYM_REWARD_BETA", &mut weights.beta),
            ("GYM_REWARD_GAMMA", &mut weights.gamma),
            ("GYM_REWARD_DELTA", &mut weights.delta),
            ("GYM_REWARD_ZETA", &mut weights.zeta),
            ("GYM_EFFORT_PER_FP", &mut weights.effort_per_false_positive),
        ] {
            if let Some(val) = lookup(key) {
                *slot = parse_env_value(&val, key)?;
            }
        }

        // Tool executables
        if let Some(val) = lookup("GYM_AST_GREP_BIN") {
            config.ast_grep_executable = parse_executable(&val, "GYM_AST_GREP_BIN")?;
        }

        if let Some(val) = lookup("GYM_RIPGREP_BIN") {
            config.ripgrep_executable = parse_executable(&val, "GYM_RIPGREP_BIN")?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_concurrent must be greater than 0".to_string(),
            ));
        }

        if self.timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "timeout must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.min_f1) {
            return Err(ConfigError::ValidationFailed(
                "min_f1 must be between 0.0 and 1.0".to_string(),
            ));
        }

        for (name, value) in self.weights.entries() {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::ValidationFailed(format!(
                    "reward weight {} must be a non-negative number",
                    name
                )));
            }
        }

        if self.ast_grep_executable.program.is_empty()
            || self.ripgrep_executable.program.is_empty()
        {
            return Err(ConfigError::ValidationFailed(
                "tool executables cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Builder method to set the tool call deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder method to set the matching tolerance.
    pub fn with_tolerance(mut self, tolerance: u32) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Builder method to set verification concurrency.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Builder method to set the verification pass threshold.
    pub fn with_min_f1(mut self, min_f1: f64) -> Self {
        self.min_f1 = min_f1;
        self
    }

    /// Builder method to set reward weights.
    pub fn with_weights(mut self, weights: RewardWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Builder method to set the ast-grep executable.
    pub fn with_ast_grep_executable(mut self, executable: Executable) -> Self {
        self.ast_grep_executable = executable;
        self
    }

    /// Builder method to set the ripgrep executable.
    pub fn with_ripgrep_executable(mut self, executable: Executable) -> Self {
        self.ripgrep_executable = executable;
        self
    }
}

/// Parse an environment variable value.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

/// Parse a command line such as `npx @ast-grep/cli` into an executable.
fn parse_executable(value: &str, key: &str) -> Result<Executable, ConfigError> {
    let mut parts = value.split_whitespace();
    let program = parts.next().ok_or_else(|| ConfigError::InvalidValue {
        key: key.to_string(),
        message: "command cannot be empty".to_string(),
    })?;
    Ok(Executable::new(program).with_leading_args(parts))
}
