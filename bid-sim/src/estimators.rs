//! Estimator derivation: five candidate price columns per row.
//!
//! Each estimator resolves missing or zero inputs through its own fallback
//! chain, so every output cell is a number. A source column that is absent
//! from the table degrades the whole estimator (to the baseline or to zeros)
//! and is reported as a diagnostic; it never stops the run.

use crate::config::{Price4Rule, SimConfig};
use crate::diagnostics::{Diagnostics, Stage};
use crate::schema::{BID_PRICE_9, BID_PRICE_10, ESTIMATORS, PRICE};
use crate::table::Table;

/// A cell counts as a usable price when it is present, not NaN and non-zero.
fn usable(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0 && !v.is_nan())
}

/// Force rows whose gate cell is missing or zero to 0. No-op when the gate
/// column is absent.
fn apply_gate(table: &Table, gate: Option<&str>, values: &mut [f64]) {
    let Some(gate) = gate.filter(|g| table.has_column(g)) else {
        return;
    };
    for (row, value) in values.iter_mut().enumerate() {
        if usable(table.num(gate, row)).is_none() {
            *value = 0.0;
        }
    }
}

fn scale(values: &mut [f64], multiplier: f64) {
    for value in values {
        *value *= multiplier;
    }
}

/// Bid price with baseline fallback (`price1`, `price2`).
///
/// Per row: the bid when usable, else the baseline when usable, else 0. If
/// the bid column is absent the baseline stands in for the whole column (or
/// zeros if it is absent too). Gating and the multiplier apply last.
pub fn bid_or_baseline(
    table: &Table,
    bid: &str,
    gate: Option<&str>,
    multiplier: f64,
    output: &str,
    diags: &mut Diagnostics,
) -> Vec<f64> {
    let rows = table.row_count();
    let mut values: Vec<f64> = if table.has_column(bid) {
        (0..rows)
            .map(|row| {
                usable(table.num(bid, row))
                    .or_else(|| usable(table.num(PRICE, row)))
                    .unwrap_or(0.0)
            })
            .collect()
    } else if let Some(baseline) = table.filled(PRICE) {
        diags.push(
            Stage::Estimators,
            bid,
            format!("column absent; {output} uses {PRICE}"),
        );
        baseline
    } else {
        diags.push(
            Stage::Estimators,
            bid,
            format!("column and {PRICE} absent; {output} defaults to 0"),
        );
        vec![0.0; rows]
    };

    apply_gate(table, gate, &mut values);
    scale(&mut values, multiplier);
    values
}

/// Scaled baseline (`price3`, `price5`). Missing baseline cells are 0.
pub fn scaled_baseline(
    table: &Table,
    gate: Option<&str>,
    multiplier: f64,
    output: &str,
    diags: &mut Diagnostics,
) -> Vec<f64> {
    let mut values = table.filled(PRICE).unwrap_or_else(|| {
        diags.push(
            Stage::Estimators,
            PRICE,
            format!("column absent; {output} defaults to 0"),
        );
        vec![0.0; table.row_count()]
    });
    apply_gate(table, gate, &mut values);
    scale(&mut values, multiplier);
    values
}

/// Blend of two bid periods (`price4`, earlier revision).
///
/// Per row: the mean when both bids are usable, the usable one when only
/// one is, the baseline when neither is, else 0. With one bid column absent
/// the other is used with baseline fallback; with both absent the baseline
/// is used directly.
pub fn bid_blend(
    table: &Table,
    first: &str,
    second: &str,
    output: &str,
    diags: &mut Diagnostics,
) -> Vec<f64> {
    let rows = table.row_count();
    let has_first = table.has_column(first);
    let has_second = table.has_column(second);

    match (has_first, has_second) {
        (false, false) => {
            diags.push(
                Stage::Estimators,
                &format!("{first},{second}"),
                format!("columns absent; {output} uses {PRICE}"),
            );
            table.filled(PRICE).unwrap_or_else(|| vec![0.0; rows])
        }
        (true, true) => (0..rows)
            .map(|row| {
                match (usable(table.num(first, row)), usable(table.num(second, row))) {
                    (Some(a), Some(b)) => (a + b) / 2.0,
                    (Some(a), None) => a,
                    (None, Some(b)) => b,
                    (None, None) => usable(table.num(PRICE, row)).unwrap_or(0.0),
                }
            })
            .collect(),
        _ => {
            let (present, absent) = if has_first { (first, second) } else { (second, first) };
            diags.push(
                Stage::Estimators,
                absent,
                format!("column absent; {output} uses {present}"),
            );
            (0..rows)
                .map(|row| {
                    usable(table.num(present, row))
                        .or_else(|| usable(table.num(PRICE, row)))
                        .unwrap_or(0.0)
                })
                .collect()
        }
    }
}

/// Row-wise minimum over `columns` (`price4`, later revision). Missing
/// cells and absent columns count as 0.
pub fn row_min(table: &Table, columns: &[&str], output: &str, diags: &mut Diagnostics) -> Vec<f64> {
    for column in columns.iter().filter(|c| !table.has_column(c)) {
        diags.push(
            Stage::Estimators,
            column,
            format!("column absent; treated as 0 in {output}"),
        );
    }
    (0..table.row_count())
        .map(|row| {
            columns
                .iter()
                .map(|c| table.num(c, row).unwrap_or(0.0))
                .fold(f64::INFINITY, f64::min)
        })
        .map(|v| if v.is_finite() { v } else { 0.0 })
        .collect()
}

/// Derive `price1..price5` under the configured policy.
pub fn derive_estimators(table: &Table, config: &SimConfig, diags: &mut Diagnostics) -> [Vec<f64>; 5] {
    let gate = Some(config.gate_column.as_str());
    let m = &config.multipliers;
    let [p1, p2, p3, p4, p5] = ESTIMATORS;

    let price1 = bid_or_baseline(table, BID_PRICE_10, gate, m.price1, p1, diags);
    let price2 = bid_or_baseline(table, BID_PRICE_9, gate, m.price2, p2, diags);
    let price3_gate = if config.policy.gates_price3() { gate } else { None };
    let price3 = scaled_baseline(table, price3_gate, m.price3, p3, diags);
    let price4 = match config.policy.price4_rule() {
        Price4Rule::BidBlend => bid_blend(table, BID_PRICE_9, BID_PRICE_10, p4, diags),
        Price4Rule::RowMin => row_min(table, &[PRICE, BID_PRICE_9, BID_PRICE_10], p4, diags),
    };
    let price5 = scaled_baseline(table, None, m.price5, p5, diags);

    [price1, price2, price3, price4, price5]
}
