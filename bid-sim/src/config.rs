use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::schema::NUMBER_11;

// === POLICY ===

/// Which revision of the estimator definitions to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EstimatorPolicy {
    /// Earlier revision: `price3` ungated, `price4` blends the two bid periods.
    V1,
    /// Later revision: `price3` gated, `price4` is the row minimum of the
    /// baseline and both bids.
    #[default]
    V2,
}

/// How `price4` is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Price4Rule {
    BidBlend,
    RowMin,
}

impl EstimatorPolicy {
    pub fn price4_rule(self) -> Price4Rule {
        match self {
            EstimatorPolicy::V1 => Price4Rule::BidBlend,
            EstimatorPolicy::V2 => Price4Rule::RowMin,
        }
    }

    pub fn gates_price3(self) -> bool {
        matches!(self, EstimatorPolicy::V2)
    }

    pub fn default_correction_scope(self) -> CorrectionScope {
        match self {
            EstimatorPolicy::V1 => CorrectionScope::PerRow,
            EstimatorPolicy::V2 => CorrectionScope::WholeTable,
        }
    }
}

/// Scope of the "primary estimator is zero" gate on outlier correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CorrectionScope {
    /// Gated rows keep their ratios; every other row is corrected.
    PerRow,
    /// A single gated row disables correction for the whole table.
    WholeTable,
}

// === PARAMETERS ===

/// Scalar multipliers applied to each estimator after fallback and gating.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Multipliers {
    pub price1: f64,
    pub price2: f64,
    pub price3: f64,
    pub price5: f64,
}

impl Default for Multipliers {
    fn default() -> Self {
        Self {
            price1: 1.0,
            price2: 1.0,
            price3: 1.0,
            price5: 0.5,
        }
    }
}

/// Tolerance band around the row median, as factors of the median.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Band {
    pub lower: f64,
    pub upper: f64,
}

impl Default for Band {
    fn default() -> Self {
        Self {
            lower: 0.2,
            upper: 1.8,
        }
    }
}

impl Band {
    /// True when `value` lies outside `[median * lower, median * upper]`.
    pub fn excludes(&self, value: f64, median: f64) -> bool {
        value < median * self.lower || value > median * self.upper
    }
}

/// Full run configuration. Every field has a default, so an empty TOML
/// document is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub policy: EstimatorPolicy,
    /// Overrides the policy's default correction scope when set.
    pub correction_scope: Option<CorrectionScope>,
    pub multipliers: Multipliers,
    /// Column whose missing/zero value forces gated estimators to 0.
    pub gate_column: String,
    /// Scale applied to every ratio (`s_i = min / price_i * ratio_scale`).
    pub ratio_scale: f64,
    /// Stand-in for zero divisors.
    pub epsilon: f64,
    pub band: Band,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            policy: EstimatorPolicy::default(),
            correction_scope: None,
            multipliers: Multipliers::default(),
            gate_column: NUMBER_11.to_string(),
            ratio_scale: 60.0,
            epsilon: 1e-10,
            band: Band::default(),
        }
    }
}

impl SimConfig {
    pub fn with_policy(policy: EstimatorPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn correction_scope(&self) -> CorrectionScope {
        self.correction_scope
            .unwrap_or_else(|| self.policy.default_correction_scope())
    }

    pub fn from_toml_str(s: &str) -> Result<Self, SimError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, SimError> {
        let text = std::fs::read_to_string(path).map_err(|source| SimError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}
