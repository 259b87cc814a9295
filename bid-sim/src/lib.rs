//! Fair-price simulation over two bidding periods.
//!
//! A table of per-product baseline costs and period-9/period-10 bids is
//! run through five stages (estimators, median, ratios, outlier correction,
//! allocation) that append derived columns and rank the allocation totals.
//! The core works on an in-memory [`Table`]; [`io`] moves tables in and out
//! of XLSX, CSV and Parquet files.

pub mod allocation;
pub mod config;
pub mod correction;
pub mod diagnostics;
pub mod error;
pub mod estimators;
pub mod io;
pub mod keys;
pub mod median;
pub mod pipeline;
pub mod ratios;
pub mod report;
pub mod schema;
pub mod table;

pub use allocation::{AllocationTotal, Ranking};
pub use config::{Band, CorrectionScope, EstimatorPolicy, Multipliers, SimConfig};
pub use correction::CorrectionStats;
pub use diagnostics::{Diagnostic, Diagnostics, Stage};
pub use error::SimError;
pub use pipeline::{SimOutcome, simulate};
pub use report::{ColumnStats, Summary};
pub use schema::{InputColumn, Schema};
pub use table::{ColumnData, RowKey, Table};

#[cfg(feature = "instrument")]
pub use instrument;
