//! Tabular catalog loading
//!
//! Reads product rows from CSV or JSON-lines files into a column-typed table.
//! A column is numeric when every present cell parses as a float; anything
//! else is text. Empty cells, JSON `null` and the usual NA markers (`NaN`,
//! `N/A`, `NULL`, ...) are missing. Non-finite numbers never reach features.

use crate::error::{Result, SageError};
use crate::types::Interaction;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default row cap applied when loading from disk
pub const DEFAULT_MAX_ITEMS: usize = 5000;

/// Cell values read as missing, matched after trimming
pub const NA_VALUES: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

fn is_missing(value: &str) -> bool {
    NA_VALUES.contains(&value.trim())
}

/// Finite float value of a cell; `None` for text, NaN and infinities
fn finite_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

/// In-memory table of catalog rows
#[derive(Debug, Clone)]
pub struct Dataset {
    columns: Vec<Column>,
    column_index: HashMap<String, usize>,
    rows: Vec<Vec<Option<String>>>,
}

impl Dataset {
    /// Build a dataset from header names and raw cells
    ///
    /// Short rows are padded with missing cells, long rows truncated.
    /// Empty strings and NA markers count as missing.
    pub fn from_records(headers: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Result<Self> {
        if rows.is_empty() {
            return Err(SageError::EmptyDataset);
        }

        let width = headers.len();
        let rows: Vec<Vec<Option<String>>> = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, None);
                row.into_iter()
                    .map(|cell| cell.filter(|value| !is_missing(value)))
                    .collect()
            })
            .collect();

        let columns: Vec<Column> = headers
            .into_iter()
            .enumerate()
            .map(|(idx, name)| {
                let kind = infer_kind(rows.iter().map(|row| row[idx].as_deref()));
                Column { name, kind }
            })
            .collect();

        let column_index = columns
            .iter()
            .enumerate()
            .map(|(idx, column)| (column.name.clone(), idx))
            .collect();

        Ok(Self {
            columns,
            column_index,
            rows,
        })
    }

    /// Load a dataset from a CSV file, a JSON-lines file, or a directory
    /// containing CSV files (the first one in name order is used)
    ///
    /// # Errors
    ///
    /// - `NotFound` if the path, or a CSV inside the directory, does not exist
    /// - `UnsupportedFormat` for extensions other than csv/json/jsonl
    /// - `EmptyDataset` if no rows were read
    pub fn load(path: impl AsRef<Path>, max_items: usize) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), max_items, "Loading dataset");

        if !path.exists() {
            return Err(SageError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let file_path = if path.is_dir() {
            let csv_file = first_csv_in(path)?;
            info!(file = %csv_file.display(), "Using CSV file from dataset directory");
            csv_file
        } else {
            path.to_path_buf()
        };

        let extension = file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        let dataset = match extension.as_deref() {
            Some("csv") => Self::read_csv(&file_path, max_items)?,
            Some("json") | Some("jsonl") => Self::read_json_lines(&file_path, max_items)?,
            _ => return Err(SageError::UnsupportedFormat { path: file_path }),
        };

        info!(
            rows = dataset.n_rows(),
            columns = ?dataset.columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            "Data loaded"
        );

        Ok(dataset)
    }

    fn read_csv(path: &Path, max_items: usize) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for record in reader.records().take(max_items) {
            let record = record?;
            rows.push(record.iter().map(|cell| Some(cell.to_string())).collect());
        }

        Self::from_records(headers, rows)
    }

    fn read_json_lines(path: &Path, max_items: usize) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);

        let mut headers: Vec<String> = Vec::new();
        let mut header_index: HashMap<String, usize> = HashMap::new();
        let mut objects: Vec<Vec<(usize, Option<String>)>> = Vec::new();

        for (line_no, line) in reader.lines().enumerate() {
            if objects.len() >= max_items {
                break;
            }

            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let value: serde_json::Value =
                serde_json::from_str(&line).map_err(|source| SageError::Json {
                    line: line_no + 1,
                    source,
                })?;

            let serde_json::Value::Object(map) = value else {
                debug!(line = line_no + 1, "Skipping non-object JSON line");
                continue;
            };

            let mut cells = Vec::with_capacity(map.len());
            for (key, value) in map {
                let idx = *header_index.entry(key.clone()).or_insert_with(|| {
                    headers.push(key);
                    headers.len() - 1
                });
                cells.push((idx, json_cell(value)));
            }
            objects.push(cells);
        }

        let width = headers.len();
        let rows = objects
            .into_iter()
            .map(|cells| {
                let mut row = vec![None; width];
                for (idx, cell) in cells {
                    row[idx] = cell;
                }
                row
            })
            .collect();

        Self::from_records(headers, rows)
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.column_index.get(name).copied()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index.contains_key(name)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row)?.get(column)?.as_deref()
    }

    /// Numeric value of a cell; missing, unparseable or non-finite cells are `None`
    pub fn number(&self, row: usize, column: usize) -> Option<f64> {
        finite_number(self.cell(row, column)?)
    }

    /// Indices of numeric columns, excluding `exclude`
    pub fn numeric_columns(&self, exclude: &[&str]) -> Vec<usize> {
        self.columns_of_kind(ColumnKind::Numeric, exclude)
    }

    /// Indices of text columns, excluding `exclude`
    pub fn text_columns(&self, exclude: &[&str]) -> Vec<usize> {
        self.columns_of_kind(ColumnKind::Text, exclude)
    }

    fn columns_of_kind(&self, kind: ColumnKind, exclude: &[&str]) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, column)| column.kind == kind && !exclude.contains(&column.name.as_str()))
            .map(|(idx, _)| idx)
            .collect()
    }
}

fn infer_kind<'a>(cells: impl Iterator<Item = Option<&'a str>>) -> ColumnKind {
    let mut seen = false;
    for cell in cells.flatten() {
        if finite_number(cell).is_some() {
            seen = true;
        } else if cell.trim().parse::<f64>().is_err() {
            return ColumnKind::Text;
        }
    }

    if seen {
        ColumnKind::Numeric
    } else {
        ColumnKind::Text
    }
}

fn json_cell(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s).filter(|s| !is_missing(s)),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn first_csv_in(dir: &Path) -> Result<PathBuf> {
    let mut csv_files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    csv_files.sort();

    csv_files
        .into_iter()
        .next()
        .ok_or_else(|| SageError::NotFound {
            path: dir.join("*.csv"),
        })
}

/// Load interaction records from a CSV with `user_id,pin_id,rating` headers
pub fn load_interactions(path: impl AsRef<Path>) -> Result<Vec<Interaction>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(SageError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let mut reader = csv::Reader::from_path(path)?;
    let interactions = reader
        .deserialize::<Interaction>()
        .collect::<std::result::Result<Vec<_>, _>>()?;

    info!(count = interactions.len(), "Loaded interactions");
    Ok(interactions)
}
