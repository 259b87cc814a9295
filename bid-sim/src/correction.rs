//! Outlier correction of the ratio columns.
//!
//! A ratio whose estimator lies outside the band around the row median is
//! replaced by the smallest of its four siblings. All replacements in a row
//! read the pre-correction ratios, never an already-corrected sibling.

use serde::Serialize;

use crate::config::{Band, CorrectionScope};
use crate::diagnostics::{Diagnostics, Stage};
use crate::schema::{ESTIMATORS, MEDIAN, RATIOS};
use crate::table::Table;

/// What the correction stage did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CorrectionStats {
    /// Cells replaced across the table.
    pub replaced: usize,
    /// Rows with at least one replacement.
    pub rows_touched: usize,
    /// True when the whole-table gate skipped correction.
    pub table_gated: bool,
}

pub struct Corrected {
    pub ratios: [Vec<f64>; 5],
    pub stats: CorrectionStats,
}

/// Correct one row. Returns the new ratios and how many were replaced.
pub fn correct_row(prices: [f64; 5], median: f64, ratios: [f64; 5], band: &Band) -> ([f64; 5], usize) {
    let mut out = ratios;
    let mut replaced = 0;
    for i in 0..5 {
        if band.excludes(prices[i], median) {
            out[i] = (0..5)
                .filter(|&j| j != i)
                .map(|j| ratios[j])
                .fold(f64::INFINITY, f64::min);
            replaced += 1;
        }
    }
    (out, replaced)
}

/// Corrected `s1..s5` for the table.
///
/// Under [`CorrectionScope::WholeTable`] a single row with `price1 == 0`
/// leaves every ratio unchanged. Under [`CorrectionScope::PerRow`] only such
/// rows are left alone.
pub fn correct_outliers(
    table: &Table,
    band: &Band,
    scope: CorrectionScope,
    diags: &mut Diagnostics,
) -> Corrected {
    let rows = table.row_count();
    let prices: Option<Vec<Vec<f64>>> = ESTIMATORS.iter().map(|c| table.filled(c)).collect();
    let ratios: Option<Vec<Vec<f64>>> = RATIOS.iter().map(|c| table.filled(c)).collect();
    let median = table.filled(MEDIAN);

    let (Some(prices), Some(ratios), Some(median)) = (prices, ratios, median) else {
        let absent: Vec<&str> = ESTIMATORS
            .into_iter()
            .chain(RATIOS)
            .chain(std::iter::once(MEDIAN))
            .filter(|c| !table.has_column(c))
            .collect();
        diags.push(
            Stage::Correction,
            &absent.join(","),
            "required columns absent; ratios left uncorrected",
        );
        let ratios = std::array::from_fn(|i| table.filled(RATIOS[i]).unwrap_or_else(|| vec![0.0; rows]));
        return Corrected {
            ratios,
            stats: CorrectionStats::default(),
        };
    };

    let original: [Vec<f64>; 5] = std::array::from_fn(|i| ratios[i].clone());
    let gated_rows = prices[0].iter().filter(|p| **p == 0.0).count();

    if scope == CorrectionScope::WholeTable && gated_rows > 0 {
        diags.push(
            Stage::Correction,
            ESTIMATORS[0],
            format!(
                "{gated_rows} row(s) with zero price1; whole-table gate skipped correction \
                 (per-row scope would correct the remaining rows)"
            ),
        );
        return Corrected {
            ratios: original,
            stats: CorrectionStats {
                table_gated: true,
                ..CorrectionStats::default()
            },
        };
    }

    let mut out = original;
    let mut stats = CorrectionStats::default();
    for row in 0..rows {
        if prices[0][row] == 0.0 {
            continue;
        }
        let (corrected, replaced) = correct_row(
            std::array::from_fn(|i| prices[i][row]),
            median[row],
            std::array::from_fn(|i| ratios[i][row]),
            band,
        );
        if replaced > 0 {
            stats.replaced += replaced;
            stats.rows_touched += 1;
            for (col, value) in out.iter_mut().zip(corrected) {
                col[row] = value;
            }
        }
    }

    Corrected { ratios: out, stats }
}
