use std::fmt;

use serde::Serialize;

use crate::diagnostics::{Diagnostics, Stage};
use crate::schema::{MEDIAN, RATIOS};
use crate::table::Table;

/// `a_i = s_i * median / sum(median)` for every row.
///
/// A zero median sum is replaced by `epsilon`. Absent inputs give all-zero
/// allocations.
pub fn allocation_columns(table: &Table, epsilon: f64, diags: &mut Diagnostics) -> [Vec<f64>; 5] {
    let rows = table.row_count();
    let ratios: Option<Vec<Vec<f64>>> = RATIOS.iter().map(|c| table.filled(c)).collect();
    let (Some(ratios), Some(median)) = (ratios, table.filled(MEDIAN)) else {
        let absent: Vec<&str> = RATIOS
            .into_iter()
            .chain(std::iter::once(MEDIAN))
            .filter(|c| !table.has_column(c))
            .collect();
        diags.push(
            Stage::Allocation,
            &absent.join(","),
            "required columns absent; allocations default to 0",
        );
        return std::array::from_fn(|_| vec![0.0; rows]);
    };

    let mut total: f64 = median.iter().sum();
    if total == 0.0 {
        total = epsilon;
    }

    std::array::from_fn(|i| {
        ratios[i]
            .iter()
            .zip(&median)
            .map(|(s, m)| s * m / total)
            .collect()
    })
}

// === RANKING ===

/// Column total of one allocation column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationTotal {
    /// `sum1..sum5`
    pub label: String,
    /// 1-based estimator number.
    pub estimator: usize,
    pub total: f64,
}

/// The five allocation totals, ascending. Ties keep estimator order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Ranking(Vec<AllocationTotal>);

impl Ranking {
    pub fn from_columns(allocations: &[Vec<f64>; 5]) -> Self {
        let mut totals: Vec<AllocationTotal> = allocations
            .iter()
            .enumerate()
            .map(|(i, col)| AllocationTotal {
                label: format!("sum{}", i + 1),
                estimator: i + 1,
                total: col.iter().sum(),
            })
            .collect();
        totals.sort_by(|a, b| a.total.total_cmp(&b.total));
        Self(totals)
    }

    pub fn entries(&self) -> &[AllocationTotal] {
        &self.0
    }

    /// Total for estimator `n` (1-based).
    pub fn total_for(&self, estimator: usize) -> Option<f64> {
        self.0
            .iter()
            .find(|t| t.estimator == estimator)
            .map(|t| t.total)
    }

    pub fn lowest(&self) -> Option<&AllocationTotal> {
        self.0.first()
    }
}

impl fmt::Display for Ranking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.0 {
            writeln!(f, "{}: {}", entry.label, entry.total)?;
        }
        Ok(())
    }
}
