//! Audit recording for pipeline runs.
//!
//! A `tracing_subscriber::Layer` that turns events into column-oriented
//! tables, one table per event target. Columns are created from event
//! fields as they are first seen, so the schema follows whatever the
//! pipeline emits.
//!
//! # Usage
//!
//! ```ignore
//! // In pipeline code:
//! tracing::debug!(target: "allocation", row, median, a1, a2, a3, a4, a5);
//!
//! // In a test:
//! let capture = instrument::capture();
//! // ... run the pipeline ...
//! let log = capture.finish();
//! let allocation = &log.tables["allocation"];
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

/// A column of recorded values. Rows that did not carry the field hold the
/// type's default (zero, `false`, empty string).
#[derive(Debug, Clone)]
pub enum AuditColumn {
    U64(Vec<u64>),
    I64(Vec<i64>),
    F64(Vec<f64>),
    Bool(Vec<bool>),
    Str(Vec<String>),
}

impl AuditColumn {
    pub fn len(&self) -> usize {
        match self {
            AuditColumn::U64(v) => v.len(),
            AuditColumn::I64(v) => v.len(),
            AuditColumn::F64(v) => v.len(),
            AuditColumn::Bool(v) => v.len(),
            AuditColumn::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Numeric view of the column, if it holds numbers.
    pub fn as_f64(&self) -> Option<Vec<f64>> {
        match self {
            AuditColumn::U64(v) => Some(v.iter().map(|&x| x as f64).collect()),
            AuditColumn::I64(v) => Some(v.iter().map(|&x| x as f64).collect()),
            AuditColumn::F64(v) => Some(v.clone()),
            AuditColumn::Bool(_) | AuditColumn::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&[String]> {
        match self {
            AuditColumn::Str(v) => Some(v),
            _ => None,
        }
    }

    fn pad_to(&mut self, rows: usize) {
        let missing = rows.saturating_sub(self.len());
        if missing == 0 {
            return;
        }
        match self {
            AuditColumn::U64(v) => v.extend(std::iter::repeat_n(0, missing)),
            AuditColumn::I64(v) => v.extend(std::iter::repeat_n(0, missing)),
            AuditColumn::F64(v) => v.extend(std::iter::repeat_n(0.0, missing)),
            AuditColumn::Bool(v) => v.extend(std::iter::repeat_n(false, missing)),
            AuditColumn::Str(v) => v.extend(std::iter::repeat_n(String::new(), missing)),
        }
    }
}

/// Events for a single target, stored column-wise.
#[derive(Debug, Clone, Default)]
pub struct AuditTable {
    pub columns: HashMap<String, AuditColumn>,
    pub row_count: usize,
}

impl AuditTable {
    pub fn column(&self, name: &str) -> Option<&AuditColumn> {
        self.columns.get(name)
    }

    fn pad_columns(&mut self) {
        let rows = self.row_count;
        for col in self.columns.values_mut() {
            col.pad_to(rows);
        }
    }
}

/// All tables recorded during a capture, keyed by event target.
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    pub tables: HashMap<String, AuditTable>,
}

impl AuditLog {
    pub fn table(&self, target: &str) -> Option<&AuditTable> {
        self.tables.get(target)
    }

    /// Number of events recorded for `target` (0 when none were seen).
    pub fn count(&self, target: &str) -> usize {
        self.tables.get(target).map_or(0, |t| t.row_count)
    }
}

thread_local! {
    static LOG: RefCell<AuditLog> = RefCell::default();
}

/// Visitor writing one event's fields into the current row of a table.
struct RowVisitor<'a> {
    table: &'a mut AuditTable,
}

impl RowVisitor<'_> {
    /// Fetch or create the column for `field`. New columns are back-filled so
    /// they line up with rows recorded before the field first appeared.
    fn column(&mut self, field: &Field, empty: fn(usize) -> AuditColumn) -> &mut AuditColumn {
        let rows = self.table.row_count;
        self.table
            .columns
            .entry(field.name().to_string())
            .or_insert_with(|| empty(rows))
    }
}

impl Visit for RowVisitor<'_> {
    fn record_u64(&mut self, field: &Field, value: u64) {
        if let AuditColumn::U64(v) = self.column(field, |n| AuditColumn::U64(vec![0; n])) {
            v.push(value);
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        if let AuditColumn::I64(v) = self.column(field, |n| AuditColumn::I64(vec![0; n])) {
            v.push(value);
        }
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let AuditColumn::F64(v) = self.column(field, |n| AuditColumn::F64(vec![0.0; n])) {
            v.push(value);
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if let AuditColumn::Bool(v) = self.column(field, |n| AuditColumn::Bool(vec![false; n])) {
            v.push(value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if let AuditColumn::Str(v) =
            self.column(field, |n| AuditColumn::Str(vec![String::new(); n]))
        {
            v.push(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.record_str(field, &format!("{value:?}"));
    }
}

/// Layer that records every event at or above `max_level` verbosity into the
/// thread-local [`AuditLog`].
#[derive(Debug, Clone, Copy)]
pub struct AuditLayer {
    max_level: Level,
}

impl Default for AuditLayer {
    fn default() -> Self {
        Self {
            max_level: Level::DEBUG,
        }
    }
}

impl AuditLayer {
    pub fn with_max_level(mut self, level: Level) -> Self {
        self.max_level = level;
        self
    }
}

impl<S: Subscriber> Layer<S> for AuditLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() > self.max_level {
            return;
        }
        let target = metadata.target().to_string();

        LOG.with(|log| {
            let mut log = log.borrow_mut();
            let table = log.tables.entry(target).or_default();
            table.pad_columns();
            event.record(&mut RowVisitor {
                table: &mut *table,
            });
            table.row_count += 1;
            table.pad_columns();
        });
    }
}

/// Take everything recorded on this thread so far.
pub fn drain() -> AuditLog {
    LOG.with(|log| std::mem::take(&mut *log.borrow_mut()))
}

/// Discard everything recorded on this thread so far.
pub fn clear() {
    LOG.with(|log| *log.borrow_mut() = AuditLog::default());
}

/// Scoped capture: installs an [`AuditLayer`] as this thread's default
/// subscriber until [`Capture::finish`] (or drop).
pub struct Capture {
    _guard: tracing::subscriber::DefaultGuard,
}

impl Capture {
    pub fn finish(self) -> AuditLog {
        drop(self._guard);
        drain()
    }
}

/// Start a thread-scoped capture with a fresh log.
pub fn capture() -> Capture {
    clear();
    let subscriber = tracing_subscriber::registry().with(AuditLayer::default());
    Capture {
        _guard: tracing::subscriber::set_default(subscriber),
    }
}

// === Polars Integration ===

use polars::prelude::*;

impl AuditTable {
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let mut names: Vec<&String> = self.columns.keys().collect();
        names.sort();

        let columns = names
            .into_iter()
            .map(|name| match &self.columns[name] {
                AuditColumn::U64(v) => Column::new(name.into(), v),
                AuditColumn::I64(v) => Column::new(name.into(), v),
                AuditColumn::F64(v) => Column::new(name.into(), v),
                AuditColumn::Bool(v) => Column::new(name.into(), v),
                AuditColumn::Str(v) => Column::new(name.into(), v),
            })
            .collect();

        DataFrame::new(columns)
    }
}

impl AuditLog {
    pub fn to_dataframes(&self) -> PolarsResult<HashMap<String, DataFrame>> {
        self.tables
            .iter()
            .map(|(target, table)| Ok((target.clone(), table.to_dataframe()?)))
            .collect()
    }

    /// Write each table to `{dir}/{target}.parquet`.
    pub fn save_parquet(&self, dir: &Path) -> PolarsResult<()> {
        std::fs::create_dir_all(dir)?;
        for (target, mut df) in self.to_dataframes()? {
            let path = dir.join(format!("{}.parquet", sanitize(&target)));
            let file = std::fs::File::create(&path)?;
            ParquetWriter::new(file).finish(&mut df)?;
        }
        Ok(())
    }
}

/// Replace non-alphanumeric chars with `_` for use in file names.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
