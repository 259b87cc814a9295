use crate::diagnostics::{Diagnostics, Stage};
use crate::schema::ESTIMATORS;
use crate::table::Table;

/// Middle value of five, after an ascending sort.
pub fn median_of_five(mut values: [f64; 5]) -> f64 {
    values.sort_by(f64::total_cmp);
    values[2]
}

/// Per-row median of `price1..price5`.
///
/// Missing cells count as 0. A row whose `price1` is 0 gets a median of 0
/// regardless of the other estimators. If any estimator column is absent
/// the whole column is zeros.
pub fn row_medians(table: &Table, diags: &mut Diagnostics) -> Vec<f64> {
    let rows = table.row_count();
    let columns: Option<Vec<Vec<f64>>> = ESTIMATORS.iter().map(|c| table.filled(c)).collect();
    let Some(columns) = columns else {
        let absent: Vec<&str> = ESTIMATORS
            .into_iter()
            .filter(|c| !table.has_column(c))
            .collect();
        diags.push(
            Stage::Median,
            &absent.join(","),
            "estimator columns absent; median defaults to 0",
        );
        return vec![0.0; rows];
    };

    (0..rows)
        .map(|row| {
            if columns[0][row] == 0.0 {
                return 0.0;
            }
            median_of_five(std::array::from_fn(|i| columns[i][row]))
        })
        .collect()
}
