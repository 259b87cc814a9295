use std::collections::BTreeMap;

use serde::Serialize;

// === COLUMN NAMES ===

/// Baseline reference cost.
pub const PRICE: &str = "price";
pub const BID_PRICE_9: &str = "bidprice9";
pub const BID_PRICE_10: &str = "bidprice10";
pub const NUMBER_9: &str = "number9";
pub const NUMBER_10: &str = "number10";
/// Default gating column.
pub const NUMBER_11: &str = "number11";
/// Raw product identifier, normalized into row keys at load time.
pub const NAME_ID: &str = "nameid";

pub const ESTIMATORS: [&str; 5] = ["price1", "price2", "price3", "price4", "price5"];
pub const MEDIAN: &str = "median";
pub const RATIOS: [&str; 5] = ["s1", "s2", "s3", "s4", "s5"];
pub const ALLOCATIONS: [&str; 5] = ["a1", "a2", "a3", "a4", "a5"];

/// Every column the pipeline derives, in output order.
pub fn derived_columns() -> impl Iterator<Item = &'static str> {
    ESTIMATORS
        .into_iter()
        .chain(std::iter::once(MEDIAN))
        .chain(RATIOS)
        .chain(ALLOCATIONS)
}

/// Raw input columns the pipeline knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum InputColumn {
    Price,
    BidPrice9,
    BidPrice10,
    Number9,
    Number10,
    Number11,
    NameId,
}

impl InputColumn {
    pub const ALL: [InputColumn; 7] = [
        InputColumn::Price,
        InputColumn::BidPrice9,
        InputColumn::BidPrice10,
        InputColumn::Number9,
        InputColumn::Number10,
        InputColumn::Number11,
        InputColumn::NameId,
    ];

    pub fn name(self) -> &'static str {
        match self {
            InputColumn::Price => PRICE,
            InputColumn::BidPrice9 => BID_PRICE_9,
            InputColumn::BidPrice10 => BID_PRICE_10,
            InputColumn::Number9 => NUMBER_9,
            InputColumn::Number10 => NUMBER_10,
            InputColumn::Number11 => NUMBER_11,
            InputColumn::NameId => NAME_ID,
        }
    }
}

// === SCHEMA ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnKind {
    Numeric,
    Text,
}

/// Which columns a table carries, and of what kind.
///
/// Stages ask the schema whether a column exists instead of probing cells,
/// so a column is either present for every row or absent for all of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    columns: BTreeMap<String, ColumnKind>,
}

impl Schema {
    pub(crate) fn register(&mut self, name: &str, kind: ColumnKind) {
        self.columns.insert(name.to_string(), kind);
    }

    pub fn has(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn has_input(&self, column: InputColumn) -> bool {
        self.has(column.name())
    }

    pub fn kind(&self, name: &str) -> Option<ColumnKind> {
        self.columns.get(name).copied()
    }

    /// True when `name` exists and holds numbers.
    pub fn is_numeric(&self, name: &str) -> bool {
        self.kind(name) == Some(ColumnKind::Numeric)
    }

    /// Known input columns that the table does not carry.
    pub fn missing_inputs(&self) -> Vec<InputColumn> {
        InputColumn::ALL
            .into_iter()
            .filter(|c| !self.has_input(*c))
            .collect()
    }
}
