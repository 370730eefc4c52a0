//! Configuration for the [`HistoryManager`](crate::context::manager::HistoryManager).
//!
//! Everything has a default; override with the builder methods or struct
//! update syntax. Validation runs once, in
//! [`HistoryManager::new`](crate::context::manager::HistoryManager::new), so
//! a bad value is reported at construction instead of during a later trim.
//!
//! ```
//! use trimline::config::{Cadence, ManagerConfig};
//! use trimline::context::truncation::TruncationConfig;
//!
//! let config = ManagerConfig::default()
//!     .with_max_tokens(32_000)
//!     .with_cadence(Cadence::EveryN(4))
//!     .with_truncation(TruncationConfig::new().with_threshold(2_000));
//! assert!(config.validate().is_ok());
//!
//! let bad = ManagerConfig::default().with_cadence(Cadence::EveryN(0));
//! assert!(bad.validate().is_err());
//! ```

use crate::HistoryError;
use crate::context::trim::DEFAULT_MIN_MESSAGES;
use crate::context::truncation::TruncationConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Default token budget.
pub const DEFAULT_MAX_TOKENS: usize = 100_000;

/// Fraction of `max_tokens` targeted by the aggressive overflow trim.
pub const DEFAULT_AGGRESSIVE_TRIM_RATIO: f64 = 0.7;

// ── Generic toggle ────────────────────────────────────────────────

/// Enabled/disabled wrapper for an optional feature's configuration.
///
/// When `enabled` is `false` the feature is skipped regardless of the inner
/// values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Toggle<T: Default> {
    pub enabled: bool,
    #[serde(default)]
    pub config: T,
}

impl<T: Default> Toggle<T> {
    pub fn enabled(config: T) -> Self {
        Self {
            enabled: true,
            config,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            config: T::default(),
        }
    }

    /// The inner config when enabled.
    pub fn active(&self) -> Option<&T> {
        self.enabled.then_some(&self.config)
    }
}

impl<T: Default> Default for Toggle<T> {
    fn default() -> Self {
        Self::enabled(T::default())
    }
}

// ── Cadence ────────────────────────────────────────────────────────

/// How often the before-model-call hook trims proactively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    /// Never trim proactively; only overflow recovery touches the buffer.
    Disabled,
    /// Trim before every model call.
    #[default]
    Always,
    /// Trim when the call counter is a multiple of `n`.
    EveryN(u32),
}

impl Cadence {
    /// Whether the hook trims on the call numbered `call_counter` (1-based).
    pub fn fires_on(&self, call_counter: u64) -> bool {
        match *self {
            Cadence::Disabled => false,
            Cadence::Always => true,
            Cadence::EveryN(0) => false,
            Cadence::EveryN(n) => call_counter % u64::from(n) == 0,
        }
    }
}

impl std::fmt::Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cadence::Disabled => f.write_str("disabled"),
            Cadence::Always => f.write_str("always"),
            Cadence::EveryN(n) => write!(f, "every {n} calls"),
        }
    }
}

/// Parses `disabled`/`never`/`off`, `always`, or a positive integer `n`.
impl FromStr for Cadence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disabled" | "never" | "off" => Ok(Cadence::Disabled),
            "always" => Ok(Cadence::Always),
            other => match other.parse::<u32>() {
                Ok(0) => Err("cadence interval must be positive".to_string()),
                Ok(n) => Ok(Cadence::EveryN(n)),
                Err(_) => Err(format!(
                    "unknown cadence '{s}': expected 'disabled', 'always', or a positive integer"
                )),
            },
        }
    }
}

// ── Manager config ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Token budget for the whole buffer. Must be positive.
    pub max_tokens: usize,
    /// Proactive trim cadence.
    pub cadence: Cadence,
    /// Messages that survive any trim. Must be positive.
    pub min_messages: usize,
    /// Phase 1 of overflow recovery.
    pub truncation: Toggle<TruncationConfig>,
    /// Phase 2 target as a fraction of `max_tokens`, in `(0, 1]`.
    pub aggressive_trim_ratio: f64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            cadence: Cadence::default(),
            min_messages: DEFAULT_MIN_MESSAGES,
            truncation: Toggle::default(),
            aggressive_trim_ratio: DEFAULT_AGGRESSIVE_TRIM_RATIO,
        }
    }
}

impl ManagerConfig {
    pub fn new(max_tokens: usize) -> Self {
        Self::default().with_max_tokens(max_tokens)
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_cadence(mut self, cadence: Cadence) -> Self {
        self.cadence = cadence;
        self
    }

    pub fn with_min_messages(mut self, min_messages: usize) -> Self {
        self.min_messages = min_messages;
        self
    }

    /// Enable phase-1 truncation with the given settings.
    pub fn with_truncation(mut self, truncation: TruncationConfig) -> Self {
        self.truncation = Toggle::enabled(truncation);
        self
    }

    /// Skip straight to the aggressive trim on overflow.
    pub fn without_truncation(mut self) -> Self {
        self.truncation = Toggle::disabled();
        self
    }

    pub fn with_aggressive_trim_ratio(mut self, ratio: f64) -> Self {
        self.aggressive_trim_ratio = ratio;
        self
    }

    /// Load from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HistoryError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&json)?)
    }

    /// The phase-2 target: `floor(max_tokens * aggressive_trim_ratio)`.
    pub fn aggressive_target(&self) -> usize {
        (self.max_tokens as f64 * self.aggressive_trim_ratio).floor() as usize
    }

    pub fn validate(&self) -> Result<(), HistoryError> {
        if self.max_tokens == 0 {
            return Err(HistoryError::InvalidConfig(
                "max_tokens must be positive".into(),
            ));
        }
        if self.cadence == Cadence::EveryN(0) {
            return Err(HistoryError::InvalidConfig(
                "cadence interval must be positive".into(),
            ));
        }
        if self.min_messages == 0 {
            return Err(HistoryError::InvalidConfig(
                "min_messages must be positive".into(),
            ));
        }
        if let Some(truncation) = self.truncation.active()
            && truncation.threshold_chars == 0
        {
            return Err(HistoryError::InvalidConfig(
                "truncation threshold must be positive".into(),
            ));
        }
        if !(self.aggressive_trim_ratio > 0.0 && self.aggressive_trim_ratio <= 1.0) {
            return Err(HistoryError::InvalidConfig(format!(
                "aggressive_trim_ratio must be in (0, 1], got {}",
                self.aggressive_trim_ratio
            )));
        }
        Ok(())
    }
}
