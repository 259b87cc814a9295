use std::fmt;

use serde::Serialize;

/// Pipeline stage a diagnostic came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Load,
    Estimators,
    Median,
    Ratios,
    Correction,
    Allocation,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Estimators => "estimators",
            Stage::Median => "median",
            Stage::Ratios => "ratios",
            Stage::Correction => "correction",
            Stage::Allocation => "allocation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recovered, non-fatal condition (absent column, degenerate value, policy
/// gate).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub stage: Stage,
    pub column: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.stage, self.column, self.message)
    }
}

/// Diagnostics collected over one run. Every push is also emitted as a
/// `warn!` event on the `diagnostic` target.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn push(&mut self, stage: Stage, column: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(
            target: "diagnostic",
            stage = stage.as_str(),
            column,
            "{message}"
        );
        self.0.push(Diagnostic {
            stage,
            column: column.to_string(),
            message,
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether any diagnostic from `stage` names `column`.
    pub fn mentions(&self, stage: Stage, column: &str) -> bool {
        self.0.iter().any(|d| d.stage == stage && d.column == column)
    }
}
