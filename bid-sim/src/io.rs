//! Reading and writing tables.
//!
//! XLSX goes through calamine and rust_xlsxwriter; CSV and Parquet through
//! polars. The format is chosen by file extension. Cells are typed the same
//! way for every format: numbers and booleans stay numeric, text columns
//! become numeric when every non-missing cell parses as a number, and
//! everything else is text. The `nameid` column is always text.

use std::fs::File;
use std::path::{Path, PathBuf};

use calamine::{Data, Reader, Xlsx, open_workbook};
use polars::prelude::*;
use rust_xlsxwriter::{Workbook, XlsxError};
use tempfile::NamedTempFile;

use crate::error::SimError;
use crate::keys::{number_code, row_keys_from};
use crate::schema::NAME_ID;
use crate::table::{ColumnData, Table};

/// Text cells that mean "no value".
const MISSING_MARKERS: [&str; 6] = ["", "n/a", "na", "none", "nan", "null"];

/// Worksheet written to XLSX output.
pub const SHEET_NAME: &str = "SimulatedData";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Xlsx,
    Csv,
    Parquet,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Result<Self, SimError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("xlsx") => Ok(TableFormat::Xlsx),
            Some("csv") => Ok(TableFormat::Csv),
            Some("parquet") | Some("pq") => Ok(TableFormat::Parquet),
            _ => Err(SimError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            TableFormat::Xlsx => "xlsx",
            TableFormat::Csv => "csv",
            TableFormat::Parquet => "parquet",
        }
    }
}

/// `simulator<stem>.<ext>` in the working directory, keeping the input's format.
pub fn default_output_path(input: &Path) -> Result<PathBuf, SimError> {
    let format = TableFormat::from_path(input)?;
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(PathBuf::from(format!("simulator{stem}.{}", format.extension())))
}

// === READ ===

pub fn read_table(path: &Path) -> Result<Table, SimError> {
    if !path.is_file() {
        return Err(SimError::InputNotFound {
            path: path.to_path_buf(),
        });
    }
    let format = TableFormat::from_path(path)?;
    let read_err = |source| SimError::InputRead {
        path: path.to_path_buf(),
        source,
    };

    let table = match format {
        TableFormat::Xlsx => read_workbook(path)?,
        // All cells come in as text and are typed by `coerce_text`, so
        // identifiers such as `0701012400` keep their leading zeros.
        TableFormat::Csv => {
            let df = CsvReadOptions::default()
                .with_has_header(true)
                .with_infer_schema_length(Some(0))
                .try_into_reader_with_file_path(Some(path.to_path_buf()))
                .and_then(|reader| reader.finish())
                .map_err(read_err)?;
            from_frame_reading(&df, read_err)?
        }
        TableFormat::Parquet => {
            let file = File::open(path).map_err(|source| SimError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let df = ParquetReader::new(file).finish().map_err(read_err)?;
            from_frame_reading(&df, read_err)?
        }
    };

    tracing::info!(
        target: "pipeline",
        path = %path.display(),
        rows = table.row_count(),
        columns = table.column_names().count(),
        "loaded input table"
    );
    Ok(table)
}

fn from_frame_reading(
    df: &DataFrame,
    read_err: impl Fn(PolarsError) -> SimError,
) -> Result<Table, SimError> {
    table_from_frame(df).map_err(|e| match e {
        SimError::Frame(source) => read_err(source),
        other => other,
    })
}

/// Convert a DataFrame into a [`Table`], keyed by `nameid` when present.
pub fn table_from_frame(df: &DataFrame) -> Result<Table, SimError> {
    let mut table = Table::with_rows(df.height());
    for column in df.get_columns() {
        let series = column.as_materialized_series();
        let name = series.name().as_str();
        let data = if name == NAME_ID {
            identifier_data(series)?
        } else {
            column_data(series)?
        };
        table.push_column(name, data)?;
    }
    keyed(table)
}

fn keyed(table: Table) -> Result<Table, SimError> {
    match table.column(NAME_ID).map(row_keys_from) {
        Some(keys) => table.with_keys(keys),
        None => Ok(table),
    }
}

fn column_data(series: &Series) -> PolarsResult<ColumnData> {
    match series.dtype() {
        DataType::Boolean
        | DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64
        | DataType::Float32
        | DataType::Float64 => {
            let floats = series.cast(&DataType::Float64)?;
            Ok(ColumnData::Num(
                floats
                    .f64()?
                    .into_iter()
                    .map(|v| v.filter(|x| !x.is_nan()))
                    .collect(),
            ))
        }
        _ => Ok(coerce_text(text_cells(series)?)),
    }
}

fn text_cells(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    let text = series.cast(&DataType::String)?;
    Ok(text
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// The identifier column stays text. Float cells are rendered as integer
/// codes so `7.01e8` does not come back as `"701012400.0"`.
fn identifier_data(series: &Series) -> PolarsResult<ColumnData> {
    let cells = if series.dtype().is_float() {
        series
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()).map(number_code))
            .collect()
    } else {
        text_cells(series)?
    };
    Ok(identifier_cells(cells))
}

fn identifier_cells(cells: Vec<Option<String>>) -> ColumnData {
    ColumnData::Text(
        cells
            .into_iter()
            .map(|c| c.filter(|s| !is_missing_marker(s)))
            .collect(),
    )
}

fn is_missing_marker(cell: &str) -> bool {
    let cell = cell.trim();
    MISSING_MARKERS
        .iter()
        .any(|m| cell.eq_ignore_ascii_case(m))
}

/// Normalize missing markers to `None`, and turn the column numeric when
/// every remaining cell parses as a number.
fn coerce_text(cells: impl IntoIterator<Item = Option<String>>) -> ColumnData {
    let cells: Vec<Option<String>> = cells
        .into_iter()
        .map(|c| c.filter(|s| !is_missing_marker(s)))
        .collect();

    let parsed: Option<Vec<Option<f64>>> = cells
        .iter()
        .map(|c| match c {
            None => Some(None),
            Some(s) => s.trim().parse::<f64>().ok().map(Some),
        })
        .collect();

    match parsed {
        Some(values) if cells.iter().any(Option::is_some) => {
            ColumnData::Num(values.into_iter().map(|v| v.filter(|x| !x.is_nan())).collect())
        }
        _ => ColumnData::Text(cells),
    }
}

// === XLSX ===

/// First worksheet; the first row of its used range is the header.
fn read_workbook(path: &Path) -> Result<Table, SimError> {
    let workbook_err = |source| SimError::WorkbookRead {
        path: path.to_path_buf(),
        source,
    };
    let empty = || SimError::EmptyWorkbook {
        path: path.to_path_buf(),
    };

    let mut workbook: Xlsx<_> = open_workbook(path).map_err(workbook_err)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(empty)?
        .map_err(workbook_err)?;

    let mut rows = range.rows();
    let header = rows.next().ok_or_else(empty)?;
    let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); header.len()];
    let mut row_count = 0;
    for row in rows {
        for (column, cell) in columns.iter_mut().zip(row) {
            column.push(cell_text(cell));
        }
        row_count += 1;
    }

    let mut table = Table::with_rows(row_count);
    for (index, (title, cells)) in header.iter().zip(columns).enumerate() {
        let name = cell_text(title).unwrap_or_else(|| format!("column{}", index + 1));
        let data = if name == NAME_ID {
            identifier_cells(cells)
        } else {
            coerce_text(cells)
        };
        table.push_column(&name, data)?;
    }
    keyed(table)
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(u8::from(*b).to_string()),
        Data::DateTime(dt) => Some(dt.as_f64().to_string()),
    }
}

/// One worksheet, header row first, missing cells left blank.
fn table_to_workbook(table: &Table) -> Result<Workbook, XlsxError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet().set_name(SHEET_NAME)?;

    for (index, name) in table.column_names().enumerate() {
        // Out-of-range indices are rejected by the writer.
        let col = u16::try_from(index).unwrap_or(u16::MAX);
        sheet.write_string(0, col, name)?;
        match table.column(name) {
            Some(ColumnData::Num(values)) => {
                for (row, value) in values.iter().enumerate() {
                    if let Some(value) = value {
                        sheet.write_number(sheet_row(row), col, *value)?;
                    }
                }
            }
            Some(ColumnData::Text(values)) => {
                for (row, value) in values.iter().enumerate() {
                    if let Some(value) = value {
                        sheet.write_string(sheet_row(row), col, value)?;
                    }
                }
            }
            None => {}
        }
    }
    Ok(workbook)
}

/// Worksheet row for a table row, below the header.
fn sheet_row(row: usize) -> u32 {
    u32::try_from(row + 1).unwrap_or(u32::MAX)
}

// === WRITE ===

/// Convert a [`Table`] into a DataFrame, columns in table order.
pub fn table_to_frame(table: &Table) -> PolarsResult<DataFrame> {
    let columns = table
        .column_names()
        .filter_map(|name| table.column(name).map(|data| (name, data)))
        .map(|(name, data)| match data {
            ColumnData::Num(values) => Column::new(name.into(), values.as_slice()),
            ColumnData::Text(values) => {
                let cells: Vec<Option<&str>> = values.iter().map(|v| v.as_deref()).collect();
                Column::new(name.into(), cells)
            }
        })
        .collect();
    DataFrame::new(columns)
}

/// Write `table` to `path`, replacing it only once the whole file is written.
pub fn write_table(table: &Table, path: &Path) -> Result<(), SimError> {
    let format = TableFormat::from_path(path)?;
    let write_err = |source| SimError::OutputWrite {
        path: path.to_path_buf(),
        source,
    };
    let workbook_err = |source| SimError::WorkbookWrite {
        path: path.to_path_buf(),
        source,
    };

    match format {
        TableFormat::Xlsx => {
            let mut workbook = table_to_workbook(table).map_err(workbook_err)?;
            replace_file(path, |file| {
                workbook.save_to_writer(file).map_err(workbook_err)
            })?;
        }
        TableFormat::Csv => {
            let mut df = table_to_frame(table)?;
            replace_file(path, |file| {
                CsvWriter::new(file)
                    .include_header(true)
                    .finish(&mut df)
                    .map_err(write_err)
            })?;
        }
        TableFormat::Parquet => {
            let mut df = table_to_frame(table)?;
            replace_file(path, |file| {
                ParquetWriter::new(file)
                    .finish(&mut df)
                    .map(drop)
                    .map_err(write_err)
            })?;
        }
    }

    tracing::info!(
        target: "pipeline",
        path = %path.display(),
        rows = table.row_count(),
        "wrote output table"
    );
    Ok(())
}

/// Run `write` against a temporary file next to `path`, then move it into
/// place. The temporary file is removed if `write` fails.
fn replace_file(
    path: &Path,
    write: impl FnOnce(&mut File) -> Result<(), SimError>,
) -> Result<(), SimError> {
    let io_err = |source| SimError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut staged = NamedTempFile::new_in(dir).map_err(io_err)?;
    write(staged.as_file_mut())?;
    staged.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::RowKey;

    #[test]
    fn format_follows_extension() {
        assert_eq!(TableFormat::from_path(Path::new("a.CSV")).unwrap(), TableFormat::Csv);
        assert_eq!(
            TableFormat::from_path(Path::new("a.parquet")).unwrap(),
            TableFormat::Parquet
        );
        assert_eq!(TableFormat::from_path(Path::new("a.xlsx")).unwrap(), TableFormat::Xlsx);
        assert!(matches!(
            TableFormat::from_path(Path::new("a.xls")),
            Err(SimError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn default_output_keeps_stem_and_format() {
        let out = default_output_path(Path::new("/data/october.csv")).unwrap();
        assert_eq!(out, PathBuf::from("simulatoroctober.csv"));
        let out = default_output_path(Path::new("bids.xlsx")).unwrap();
        assert_eq!(out, PathBuf::from("simulatorbids.xlsx"));
    }

    #[test]
    fn missing_markers_make_text_columns_numeric() {
        let data = coerce_text(
            ["12.5", "N/A", " none ", "", "7"]
                .into_iter()
                .map(|s| Some(s.to_string())),
        );
        assert_eq!(
            data,
            ColumnData::Num(vec![Some(12.5), None, None, None, Some(7.0)])
        );
    }

    #[test]
    fn real_text_stays_text() {
        let data = coerce_text(["apple", "n/a"].into_iter().map(|s| Some(s.to_string())));
        assert_eq!(data, ColumnData::Text(vec![Some("apple".to_string()), None]));
    }

    #[test]
    fn frames_convert_with_product_keys() {
        let df = df! {
            "nameid" => ["beef-0702013500", "rice"],
            "price" => [Some(10i64), None],
            "bidprice9" => ["n/a", "8.5"],
        }
        .unwrap();
        let table = table_from_frame(&df).unwrap();

        assert_eq!(
            table.keys(),
            &[RowKey::Product("0702013500".into()), RowKey::Product("rice".into())]
        );
        assert_eq!(table.num("price", 0), Some(10.0));
        assert_eq!(table.num("price", 1), None);
        assert_eq!(table.num("bidprice9", 1), Some(8.5));

        let back = table_to_frame(&table).unwrap();
        assert_eq!(back.get_column_names_str(), ["nameid", "price", "bidprice9"]);
    }

    #[test]
    fn identifier_column_is_never_numeric() {
        let df = df! {
            "nameid" => ["0701012400", "N/A", "0702013500"],
            "price" => ["100", "90", "80"],
        }
        .unwrap();
        let table = table_from_frame(&df).unwrap();

        assert_eq!(
            table.column(NAME_ID),
            Some(&ColumnData::Text(vec![
                Some("0701012400".into()),
                None,
                Some("0702013500".into())
            ]))
        );
        assert_eq!(
            table.keys(),
            &[
                RowKey::Product("0701012400".into()),
                RowKey::Position(1),
                RowKey::Product("0702013500".into())
            ]
        );
        assert!(table.schema().is_numeric("price"));
    }

    #[test]
    fn float_identifiers_render_as_integer_codes() {
        let df = df! {
            "nameid" => [Some(701012400.0f64), None],
            "price" => [1.0f64, 2.0],
        }
        .unwrap();
        let table = table_from_frame(&df).unwrap();
        assert_eq!(
            table.column(NAME_ID),
            Some(&ColumnData::Text(vec![Some("701012400".into()), None]))
        );
    }

    #[test]
    fn workbook_cells_map_to_text() {
        assert_eq!(cell_text(&Data::Empty), None);
        assert_eq!(cell_text(&Data::Float(100.0)), Some("100".into()));
        assert_eq!(cell_text(&Data::Float(12.5)), Some("12.5".into()));
        assert_eq!(cell_text(&Data::Int(7)), Some("7".into()));
        assert_eq!(cell_text(&Data::Bool(true)), Some("1".into()));
        assert_eq!(cell_text(&Data::String("n/a".into())), Some("n/a".into()));
    }
}
