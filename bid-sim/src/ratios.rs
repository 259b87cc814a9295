use crate::diagnostics::{Diagnostics, Stage};
use crate::schema::ESTIMATORS;
use crate::table::Table;

/// Ratios for one row: `min(prices) / price_i * scale`, with zero divisors
/// replaced by `epsilon`.
pub fn row_ratios(prices: [f64; 5], scale: f64, epsilon: f64) -> [f64; 5] {
    let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
    prices.map(|p| {
        let divisor = if p == 0.0 { epsilon } else { p };
        min / divisor * scale
    })
}

/// Pre-correction `s1..s5` for every row.
///
/// Rows whose `price1` is 0 get all-zero ratios. When that holds for every
/// row, the division is skipped entirely.
pub fn ratio_columns(table: &Table, scale: f64, epsilon: f64, diags: &mut Diagnostics) -> [Vec<f64>; 5] {
    let rows = table.row_count();
    let zeros = || std::array::from_fn(|_| vec![0.0; rows]);

    let columns: Option<Vec<Vec<f64>>> = ESTIMATORS.iter().map(|c| table.filled(c)).collect();
    let Some(columns) = columns else {
        let absent: Vec<&str> = ESTIMATORS
            .into_iter()
            .filter(|c| !table.has_column(c))
            .collect();
        diags.push(
            Stage::Ratios,
            &absent.join(","),
            "estimator columns absent; ratios default to 0",
        );
        return zeros();
    };

    if columns[0].iter().all(|p| *p == 0.0) {
        return zeros();
    }

    let mut out: [Vec<f64>; 5] = std::array::from_fn(|_| Vec::with_capacity(rows));
    for row in 0..rows {
        let ratios = if columns[0][row] == 0.0 {
            [0.0; 5]
        } else {
            row_ratios(std::array::from_fn(|i| columns[i][row]), scale, epsilon)
        };
        for (col, value) in out.iter_mut().zip(ratios) {
            col.push(value);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratios_scale_row_minimum_over_each_estimator() {
        let s = row_ratios([120.0, 100.0, 100.0, 120.0, 50.0], 60.0, 1e-10);
        assert_eq!(s, [25.0, 30.0, 30.0, 25.0, 60.0]);
    }

    #[test]
    fn zero_estimator_drives_every_ratio_to_zero() {
        let s = row_ratios([120.0, 100.0, 100.0, 0.0, 50.0], 60.0, 1e-10);
        assert_eq!(s, [0.0; 5]);
    }

    #[test]
    fn gated_rows_and_all_gated_tables_yield_zeros() {
        let mut table = Table::with_rows(2);
        for name in ESTIMATORS {
            table.set_values(name, vec![0.0, 10.0]).unwrap();
        }
        table.set_values("price5", vec![5.0, 5.0]).unwrap();
        let mut diags = Diagnostics::default();

        let s = ratio_columns(&table, 60.0, 1e-10, &mut diags);
        assert_eq!(s[4], vec![0.0, 60.0]);
        assert_eq!(s[0], vec![0.0, 30.0]);

        table.set_values("price1", vec![0.0, 0.0]).unwrap();
        let s = ratio_columns(&table, 60.0, 1e-10, &mut diags);
        assert!(s.iter().all(|col| col.iter().all(|v| *v == 0.0)));
        assert!(diags.is_empty());
    }
}
