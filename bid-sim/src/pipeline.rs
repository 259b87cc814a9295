//! Five-stage simulation over a [`Table`].
//!
//! Stage order:
//! 1. Estimators (`price1..price5`)
//! 2. Median
//! 3. Ratios (`s1..s5`)
//! 4. Outlier correction (replaces `s1..s5`)
//! 5. Allocation (`a1..a5`) and ranking of the column totals
//!
//! Each stage reads the table as left by the previous one and appends its
//! columns only after computing them for every row.

use crate::allocation::{Ranking, allocation_columns};
use crate::config::{CorrectionScope, SimConfig};
use crate::correction::{CorrectionStats, correct_outliers};
use crate::diagnostics::{Diagnostics, Stage};
use crate::error::SimError;
use crate::estimators::derive_estimators;
use crate::median::row_medians;
use crate::ratios::ratio_columns;
use crate::schema::{ALLOCATIONS, ESTIMATORS, InputColumn, MEDIAN, RATIOS};
use crate::table::Table;

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct SimOutcome {
    /// Input columns plus every derived column.
    pub table: Table,
    pub ranking: Ranking,
    pub correction: CorrectionStats,
    pub scope: CorrectionScope,
    pub diagnostics: Diagnostics,
}

/// Run all five stages over `table`.
///
/// Derived columns already present in the input are recomputed and
/// replaced, so running on a previous output gives the same result as
/// running on its source columns.
pub fn simulate(mut table: Table, config: &SimConfig) -> Result<SimOutcome, SimError> {
    let mut diags = Diagnostics::default();
    let rows = table.row_count();
    let scope = config.correction_scope();

    check_inputs(&table, config, &mut diags);

    // 1. ESTIMATORS
    let estimators = derive_estimators(&table, config, &mut diags);
    for (name, values) in ESTIMATORS.into_iter().zip(estimators) {
        table.set_values(name, values)?;
    }
    stage_done(Stage::Estimators, rows);
    #[cfg(feature = "instrument")]
    record_estimates(&table);

    // 2. MEDIAN
    let medians = row_medians(&table, &mut diags);
    table.set_values(MEDIAN, medians)?;
    stage_done(Stage::Median, rows);

    // 3. RATIOS
    let ratios = ratio_columns(&table, config.ratio_scale, config.epsilon, &mut diags);
    for (name, values) in RATIOS.into_iter().zip(ratios) {
        table.set_values(name, values)?;
    }
    stage_done(Stage::Ratios, rows);
    #[cfg(feature = "instrument")]
    record_ratios(&table, "normalized");

    // 4. CORRECTION
    let corrected = correct_outliers(&table, &config.band, scope, &mut diags);
    for (name, values) in RATIOS.into_iter().zip(corrected.ratios) {
        table.set_values(name, values)?;
    }
    tracing::info!(
        target: "pipeline",
        stage = Stage::Correction.as_str(),
        rows,
        replaced = corrected.stats.replaced,
        rows_touched = corrected.stats.rows_touched,
        table_gated = corrected.stats.table_gated,
        "stage complete"
    );
    #[cfg(feature = "instrument")]
    record_ratios(&table, "corrected");

    // 5. ALLOCATION
    let allocations = allocation_columns(&table, config.epsilon, &mut diags);
    let ranking = Ranking::from_columns(&allocations);
    for (name, values) in ALLOCATIONS.into_iter().zip(allocations) {
        table.set_values(name, values)?;
    }
    stage_done(Stage::Allocation, rows);
    #[cfg(feature = "instrument")]
    record_allocations(&table);

    Ok(SimOutcome {
        table,
        ranking,
        correction: corrected.stats,
        scope,
        diagnostics: diags,
    })
}

/// Report input columns that are absent or unusable before any stage runs.
fn check_inputs(table: &Table, config: &SimConfig, diags: &mut Diagnostics) {
    let schema = table.schema();
    if !schema.has_input(InputColumn::Price) {
        diags.push(
            Stage::Load,
            InputColumn::Price.name(),
            "baseline column absent; estimators fall back to 0",
        );
    }
    let numeric_inputs = [
        InputColumn::Price,
        InputColumn::BidPrice9,
        InputColumn::BidPrice10,
        InputColumn::Number9,
        InputColumn::Number10,
    ]
    .map(InputColumn::name)
    .into_iter()
    .chain(std::iter::once(config.gate_column.as_str()));
    for name in numeric_inputs {
        if schema.has(name) && !schema.is_numeric(name) {
            diags.push(Stage::Load, name, "column is not numeric; cells read as missing");
        }
    }
    for column in schema.missing_inputs() {
        tracing::info!(target: "pipeline", column = column.name(), "input column absent");
    }
}

fn stage_done(stage: Stage, rows: usize) {
    tracing::info!(target: "pipeline", stage = stage.as_str(), rows, "stage complete");
}

// === ROW AUDIT ===

#[cfg(feature = "instrument")]
fn record_estimates(table: &Table) {
    for (row, key) in table.keys().iter().enumerate() {
        let v = |c: &str| table.num(c, row).unwrap_or(0.0);
        tracing::debug!(
            target: "estimates",
            row = row as u64,
            key = %key,
            price1 = v("price1"),
            price2 = v("price2"),
            price3 = v("price3"),
            price4 = v("price4"),
            price5 = v("price5"),
        );
    }
}

/// `stage` distinguishes pre-correction ratios from corrected ones.
#[cfg(feature = "instrument")]
fn record_ratios(table: &Table, stage: &'static str) {
    for (row, key) in table.keys().iter().enumerate() {
        let v = |c: &str| table.num(c, row).unwrap_or(0.0);
        tracing::debug!(
            target: "ratios",
            stage,
            row = row as u64,
            key = %key,
            median = v(MEDIAN),
            s1 = v("s1"),
            s2 = v("s2"),
            s3 = v("s3"),
            s4 = v("s4"),
            s5 = v("s5"),
        );
    }
}

#[cfg(feature = "instrument")]
fn record_allocations(table: &Table) {
    for (row, key) in table.keys().iter().enumerate() {
        let v = |c: &str| table.num(c, row).unwrap_or(0.0);
        tracing::debug!(
            target: "allocation",
            row = row as u64,
            key = %key,
            median = v(MEDIAN),
            a1 = v("a1"),
            a2 = v("a2"),
            a3 = v("a3"),
            a4 = v("a4"),
            a5 = v("a5"),
        );
    }
}
