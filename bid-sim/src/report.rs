use std::fmt;

use serde::Serialize;

use crate::allocation::Ranking;
use crate::config::{CorrectionScope, EstimatorPolicy};
use crate::correction::CorrectionStats;
use crate::diagnostics::Diagnostics;
use crate::pipeline::SimOutcome;
use crate::schema::derived_columns;
use crate::table::Table;

// === DESCRIPTIVE STATISTICS ===

/// count / mean / std / min / quartiles / max of one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStats {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; NaN with fewer than two values.
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub q50: f64,
    pub q75: f64,
    pub max: f64,
}

/// Linear-interpolated quantile of sorted values.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

impl ColumnStats {
    /// Statistics over the non-missing cells of `column`. `None` when the
    /// column is absent or textual.
    pub fn of(table: &Table, column: &str) -> Option<Self> {
        let mut values: Vec<f64> = table
            .numeric(column)?
            .iter()
            .filter_map(|v| v.filter(|x| !x.is_nan()))
            .collect();
        values.sort_by(f64::total_cmp);

        let count = values.len();
        let mean = if count == 0 {
            f64::NAN
        } else {
            values.iter().sum::<f64>() / count as f64
        };
        let std = if count < 2 {
            f64::NAN
        } else {
            let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (count - 1) as f64).sqrt()
        };

        Some(Self {
            column: column.to_string(),
            count,
            mean,
            std,
            min: values.first().copied().unwrap_or(f64::NAN),
            q25: quantile(&values, 0.25),
            q50: quantile(&values, 0.5),
            q75: quantile(&values, 0.75),
            max: values.last().copied().unwrap_or(f64::NAN),
        })
    }
}

// === SUMMARY ===

/// Run summary printed after the pipeline and optionally saved as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub rows: usize,
    pub policy: EstimatorPolicy,
    pub correction_scope: CorrectionScope,
    pub correction: CorrectionStats,
    pub stats: Vec<ColumnStats>,
    pub ranking: Ranking,
    pub diagnostics: Diagnostics,
}

impl Summary {
    pub fn new(outcome: &SimOutcome, policy: EstimatorPolicy) -> Self {
        Self {
            rows: outcome.table.row_count(),
            policy,
            correction_scope: outcome.scope,
            correction: outcome.correction,
            stats: derived_columns()
                .filter_map(|c| ColumnStats::of(&outcome.table, c))
                .collect(),
            ranking: outcome.ranking.clone(),
            diagnostics: outcome.diagnostics.clone(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "rows: {}  policy: {:?}  correction scope: {:?}",
            self.rows, self.policy, self.correction_scope
        )?;
        if self.correction.table_gated {
            writeln!(
                f,
                "note: outlier correction skipped for the whole table (a row has price1 = 0)"
            )?;
        } else {
            writeln!(
                f,
                "outlier correction: {} cell(s) in {} row(s)",
                self.correction.replaced, self.correction.rows_touched
            )?;
        }

        writeln!(f, "\nDerived column statistics:")?;
        writeln!(
            f,
            "{:<8} {:>6} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12}",
            "column", "count", "mean", "std", "min", "25%", "50%", "75%", "max"
        )?;
        for s in &self.stats {
            writeln!(
                f,
                "{:<8} {:>6} {:>12.4} {:>12.4} {:>12.4} {:>12.4} {:>12.4} {:>12.4} {:>12.4}",
                s.column, s.count, s.mean, s.std, s.min, s.q25, s.q50, s.q75, s.max
            )?;
        }

        writeln!(f, "\nAllocation totals, ascending:")?;
        write!(f, "{}", self.ranking)?;

        if !self.diagnostics.is_empty() {
            writeln!(f, "\nDiagnostics:")?;
            for d in self.diagnostics.iter() {
                writeln!(f, "  {d}")?;
            }
        }
        Ok(())
    }
}
