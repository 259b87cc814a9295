use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::error::SimError;
use crate::schema::{ColumnKind, Schema};

// === ROW IDENTITY ===

/// Stable identity of a row, carried alongside the columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum RowKey {
    /// Position in the source table (0-based).
    Position(usize),
    /// Normalized product identifier.
    Product(String),
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Position(i) => write!(f, "#{i}"),
            RowKey::Product(id) => f.write_str(id),
        }
    }
}

// === COLUMNS ===

/// Cell storage for one column. `None` marks a missing cell, distinct from 0.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Num(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl ColumnData {
    /// Fully-populated numeric column.
    pub fn from_values(values: Vec<f64>) -> Self {
        ColumnData::Num(values.into_iter().map(Some).collect())
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnData::Num(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnData::Num(_) => ColumnKind::Numeric,
            ColumnData::Text(_) => ColumnKind::Text,
        }
    }

    pub fn as_num(&self) -> Option<&[Option<f64>]> {
        match self {
            ColumnData::Num(v) => Some(v),
            ColumnData::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&[Option<String>]> {
        match self {
            ColumnData::Text(v) => Some(v),
            ColumnData::Num(_) => None,
        }
    }
}

// === TABLE ===

/// Ordered rows over a named set of columns.
///
/// Column order is insertion order, so writing the table back out keeps the
/// source columns first and derived columns after them. The [`Schema`] is
/// resolved when the table is built and kept in step as columns are added.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    keys: Vec<RowKey>,
    order: Vec<String>,
    columns: HashMap<String, ColumnData>,
    schema: Schema,
}

impl Table {
    /// Empty table with `rows` positional row keys.
    pub fn with_rows(rows: usize) -> Self {
        Self {
            keys: (0..rows).map(RowKey::Position).collect(),
            order: Vec::new(),
            columns: HashMap::new(),
            schema: Schema::default(),
        }
    }

    /// Build a table from named columns. All columns must have the same
    /// length; rows get positional keys.
    pub fn from_columns(
        columns: impl IntoIterator<Item = (String, ColumnData)>,
    ) -> Result<Self, SimError> {
        let columns: Vec<_> = columns.into_iter().collect();
        let rows = columns.first().map_or(0, |(_, c)| c.len());
        let mut table = Self::with_rows(rows);
        for (name, data) in columns {
            table.push_column(name, data)?;
        }
        Ok(table)
    }

    /// Replace the row keys. The number of keys must match the row count.
    pub fn with_keys(mut self, keys: Vec<RowKey>) -> Result<Self, SimError> {
        if keys.len() != self.row_count() {
            return Err(SimError::RaggedColumn {
                column: "<row keys>".to_string(),
                expected: self.row_count(),
                found: keys.len(),
            });
        }
        self.keys = keys;
        Ok(self)
    }

    pub fn row_count(&self) -> usize {
        self.keys.len()
    }

    pub fn keys(&self) -> &[RowKey] {
        &self.keys
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Column names in output order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.schema.has(name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnData> {
        self.columns.get(name)
    }

    /// Numeric cells of `name`, or `None` if the column is absent or textual.
    pub fn numeric(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns.get(name).and_then(ColumnData::as_num)
    }

    /// Single numeric cell. Absent columns, textual columns, missing cells
    /// and NaN all read as `None`.
    pub fn num(&self, name: &str, row: usize) -> Option<f64> {
        self.numeric(name)
            .and_then(|col| col.get(row).copied().flatten())
            .filter(|v| !v.is_nan())
    }

    /// Numeric column with every missing cell resolved to 0.
    pub fn filled(&self, name: &str) -> Option<Vec<f64>> {
        self.numeric(name).map(|col| {
            col.iter()
                .map(|v| v.filter(|x| !x.is_nan()).unwrap_or(0.0))
                .collect()
        })
    }

    /// Append a column, or replace an existing one in place.
    pub fn push_column(&mut self, name: impl Into<String>, data: ColumnData) -> Result<(), SimError> {
        let name = name.into();
        if data.len() != self.row_count() {
            return Err(SimError::RaggedColumn {
                column: name,
                expected: self.row_count(),
                found: data.len(),
            });
        }
        self.schema.register(&name, data.kind());
        if self.columns.insert(name.clone(), data).is_none() {
            self.order.push(name);
        }
        Ok(())
    }

    /// Append (or replace) a fully-populated numeric column.
    pub fn set_values(&mut self, name: &str, values: Vec<f64>) -> Result<(), SimError> {
        self.push_column(name, ColumnData::from_values(values))
    }

    /// Copy of this table restricted to the named columns that exist.
    pub fn select<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Table {
        let mut out = Table {
            keys: self.keys.clone(),
            order: Vec::new(),
            columns: HashMap::new(),
            schema: Schema::default(),
        };
        for name in names {
            if let Some(data) = self.columns.get(name) {
                out.schema.register(name, data.kind());
                out.columns.insert(name.to_string(), data.clone());
                out.order.push(name.to_string());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(values: &[Option<f64>]) -> ColumnData {
        ColumnData::Num(values.to_vec())
    }

    #[test]
    fn ragged_columns_are_rejected() {
        let err = Table::from_columns([
            ("price".to_string(), num(&[Some(1.0), Some(2.0)])),
            ("bidprice9".to_string(), num(&[Some(1.0)])),
        ])
        .unwrap_err();
        assert!(matches!(err, SimError::RaggedColumn { expected: 2, found: 1, .. }));
    }

    #[test]
    fn replacing_a_column_keeps_its_position() {
        let mut table = Table::from_columns([
            ("a".to_string(), num(&[Some(1.0)])),
            ("b".to_string(), num(&[Some(2.0)])),
        ])
        .unwrap();
        table.set_values("a", vec![9.0]).unwrap();
        table.set_values("c", vec![3.0]).unwrap();

        assert_eq!(table.column_names().collect::<Vec<_>>(), ["a", "b", "c"]);
        assert_eq!(table.num("a", 0), Some(9.0));
    }

    #[test]
    fn missing_nan_and_text_cells_read_as_none() {
        let table = Table::from_columns([
            ("price".to_string(), num(&[None, Some(f64::NAN), Some(4.0)])),
            (
                "name".to_string(),
                ColumnData::Text(vec![Some("x".into()), None, None]),
            ),
        ])
        .unwrap();

        assert_eq!(table.num("price", 0), None);
        assert_eq!(table.num("price", 1), None);
        assert_eq!(table.num("price", 2), Some(4.0));
        assert_eq!(table.num("name", 0), None);
        assert_eq!(table.num("absent", 0), None);
        assert_eq!(table.filled("price"), Some(vec![0.0, 0.0, 4.0]));
    }
}
