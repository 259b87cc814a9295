//! Property-based tests for pipeline invariants.
//!
//! Random bid tables (including missing cells, zeros and gated rows) are run
//! through the pipeline under both policies and both correction scopes.

use proptest::prelude::*;

use bid_sim::config::Band;
use bid_sim::diagnostics::Diagnostics;
use bid_sim::estimators::derive_estimators;
use bid_sim::median::row_medians;
use bid_sim::ratios::ratio_columns;
use bid_sim::schema::{ALLOCATIONS, ESTIMATORS, MEDIAN, RATIOS};
use bid_sim::{ColumnData, CorrectionScope, EstimatorPolicy, SimConfig, Table, simulate};

// === STRATEGIES ===

fn cell() -> impl Strategy<Value = Option<f64>> {
    prop_oneof![
        1 => Just(None),
        1 => Just(Some(0.0)),
        6 => (1.0f64..1000.0).prop_map(Some),
    ]
}

fn gate_cell() -> impl Strategy<Value = Option<f64>> {
    prop_oneof![
        1 => Just(None),
        1 => Just(Some(0.0)),
        6 => (1u32..50).prop_map(|n| Some(n as f64)),
    ]
}

fn bid_table() -> impl Strategy<Value = Table> {
    prop::collection::vec((cell(), cell(), cell(), gate_cell()), 1..24).prop_map(|rows| {
        let col = |f: fn(&(Option<f64>, Option<f64>, Option<f64>, Option<f64>)) -> Option<f64>| {
            ColumnData::Num(rows.iter().map(f).collect())
        };
        Table::from_columns([
            ("price".to_string(), col(|r| r.0)),
            ("bidprice9".to_string(), col(|r| r.1)),
            ("bidprice10".to_string(), col(|r| r.2)),
            ("number11".to_string(), col(|r| r.3)),
        ])
        .unwrap()
    })
}

fn sim_config() -> impl Strategy<Value = SimConfig> {
    (
        prop_oneof![Just(EstimatorPolicy::V1), Just(EstimatorPolicy::V2)],
        prop_oneof![Just(CorrectionScope::PerRow), Just(CorrectionScope::WholeTable)],
    )
        .prop_map(|(policy, scope)| SimConfig {
            correction_scope: Some(scope),
            ..SimConfig::with_policy(policy)
        })
}

fn col(table: &Table, name: &str) -> Vec<f64> {
    table.filled(name).unwrap()
}

/// Table after estimators and median, before ratios.
fn staged(table: &Table, config: &SimConfig) -> Table {
    let mut diags = Diagnostics::default();
    let mut staged = table.clone();
    let estimators = derive_estimators(&staged, config, &mut diags);
    for (name, values) in ESTIMATORS.into_iter().zip(estimators) {
        staged.set_values(name, values).unwrap();
    }
    let medians = row_medians(&staged, &mut diags);
    staged.set_values(MEDIAN, medians).unwrap();
    staged
}

// === PROPERTIES ===

proptest! {
    #[test]
    fn zero_primary_estimator_zeroes_median_and_ratios(table in bid_table(), config in sim_config()) {
        let out = simulate(table, &config).unwrap();
        let t = &out.table;
        let price1 = col(t, "price1");
        let median = col(t, MEDIAN);
        let ratios: Vec<Vec<f64>> = RATIOS.iter().map(|c| col(t, c)).collect();

        for row in 0..t.row_count() {
            if price1[row] == 0.0 {
                prop_assert_eq!(median[row], 0.0);
                for s in &ratios {
                    prop_assert_eq!(s[row], 0.0);
                }
            }
        }
    }

    #[test]
    fn median_is_third_of_five_for_positive_rows(table in bid_table(), config in sim_config()) {
        let out = simulate(table, &config).unwrap();
        let t = &out.table;
        let prices: Vec<Vec<f64>> = ESTIMATORS.iter().map(|c| col(t, c)).collect();
        let median = col(t, MEDIAN);

        for row in 0..t.row_count() {
            let mut values: Vec<f64> = prices.iter().map(|p| p[row]).collect();
            if values.iter().all(|v| *v > 0.0) {
                values.sort_by(f64::total_cmp);
                prop_assert_eq!(median[row], values[2]);
            }
        }
    }

    #[test]
    fn ratios_follow_row_minimum_formula(table in bid_table(), config in sim_config()) {
        let staged = staged(&table, &config);
        let mut diags = Diagnostics::default();
        let ratios = ratio_columns(&staged, config.ratio_scale, config.epsilon, &mut diags);
        let prices: Vec<Vec<f64>> = ESTIMATORS.iter().map(|c| col(&staged, c)).collect();

        for row in 0..staged.row_count() {
            if prices[0][row] == 0.0 {
                continue;
            }
            let min = prices.iter().map(|p| p[row]).fold(f64::INFINITY, f64::min);
            for (i, s) in ratios.iter().enumerate() {
                let divisor = if prices[i][row] == 0.0 { config.epsilon } else { prices[i][row] };
                prop_assert_eq!(s[row], min / divisor * config.ratio_scale);
            }
        }
    }

    #[test]
    fn rows_inside_the_band_keep_their_ratios(table in bid_table(), config in sim_config()) {
        let staged = staged(&table, &config);
        let mut diags = Diagnostics::default();
        let before = ratio_columns(&staged, config.ratio_scale, config.epsilon, &mut diags);

        let out = simulate(table, &config).unwrap();
        let t = &out.table;
        let prices: Vec<Vec<f64>> = ESTIMATORS.iter().map(|c| col(t, c)).collect();
        let median = col(t, MEDIAN);
        let after: Vec<Vec<f64>> = RATIOS.iter().map(|c| col(t, c)).collect();
        let band = Band::default();

        for row in 0..t.row_count() {
            let inside = prices.iter().all(|p| !band.excludes(p[row], median[row]));
            if inside || out.correction.table_gated {
                for i in 0..5 {
                    prop_assert_eq!(after[i][row], before[i][row]);
                }
            }
        }
    }

    #[test]
    fn allocations_follow_formula_and_stay_non_negative(table in bid_table(), config in sim_config()) {
        let out = simulate(table, &config).unwrap();
        let t = &out.table;
        let median = col(t, MEDIAN);
        let total: f64 = median.iter().sum();
        let b = if total == 0.0 { config.epsilon } else { total };

        for (s_name, a_name) in RATIOS.iter().zip(ALLOCATIONS) {
            let s = col(t, s_name);
            let a = col(t, a_name);
            for row in 0..t.row_count() {
                prop_assert_eq!(a[row], s[row] * median[row] / b);
                prop_assert!(a[row] >= 0.0);
            }
        }

        let totals: Vec<f64> = out.ranking.entries().iter().map(|e| e.total).collect();
        prop_assert_eq!(totals.len(), 5);
        prop_assert!(totals.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn pipeline_is_deterministic(table in bid_table(), config in sim_config()) {
        let first = simulate(table.clone(), &config).unwrap();
        let second = simulate(table, &config).unwrap();
        prop_assert_eq!(first.table, second.table);
        prop_assert_eq!(first.ranking, second.ranking);
    }
}
