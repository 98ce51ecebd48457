//! Spreadsheet storage: load the first worksheet into a [`Table`] and write a
//! [`Table`] back out as xlsx.
//!
//! Writes go to a temp file in the destination directory which is then
//! renamed over the target, so a killed process never leaves a half-written
//! checkpoint behind.

use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use thiserror::Error;
use tracing::debug;

use crate::models::{Cell, Table};

/// Errors reading or writing a table.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("No worksheet in {}", .0.display())]
    NoSheet(PathBuf),

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: XlsxError,
    },

    #[error("Table too large for xlsx: {0}")]
    TooLarge(String),

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Load the first worksheet of a workbook. The first row becomes the header.
pub fn load_table(path: &Path) -> Result<Table, TableError> {
    if !path.exists() {
        return Err(TableError::NotFound(path.to_path_buf()));
    }

    let mut workbook = open_workbook_auto(path).map_err(|source| TableError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| TableError::NoSheet(path.to_path_buf()))?
        .map_err(|source| TableError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row
            .iter()
            .enumerate()
            .map(|(i, cell)| header_name(i, cell))
            .collect(),
        None => return Ok(Table::default()),
    };

    let body = rows.map(|r| r.iter().map(cell_from_data).collect()).collect();
    let table = Table::from_rows(headers, body);

    debug!(
        "Loaded {} rows x {} columns from {}",
        table.len(),
        table.width(),
        path.display()
    );
    Ok(table)
}

/// Write a table as a single-sheet xlsx workbook, replacing `path` in full.
pub fn save_table(table: &Table, path: &Path) -> Result<(), TableError> {
    let mut workbook = build_workbook(table)?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let io_err = |source| TableError::Io {
        path: path.to_path_buf(),
        source,
    };

    let tmp = tempfile::Builder::new()
        .prefix(".reqvector-")
        .suffix(".xlsx")
        .tempfile_in(dir)
        .map_err(io_err)?;

    workbook
        .save(tmp.path())
        .map_err(|source| TableError::Write {
            path: path.to_path_buf(),
            source,
        })?;

    tmp.persist(path).map_err(|e| io_err(e.error))?;

    debug!("Saved {} rows to {}", table.len(), path.display());
    Ok(())
}

fn build_workbook(table: &Table) -> Result<Workbook, TableError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let write_err = |source| TableError::Write {
        path: PathBuf::new(),
        source,
    };
    let date_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

    for (c, header) in table.headers().iter().enumerate() {
        sheet
            .write_string(0, col_num(c)?, header.as_str())
            .map_err(write_err)?;
    }

    for (r, row) in table.rows().iter().enumerate() {
        let row_num = row_num(r + 1)?;
        for (c, cell) in row.iter().enumerate() {
            let col = col_num(c)?;
            match cell {
                Cell::Empty => {}
                Cell::Text(s) => {
                    sheet.write_string(row_num, col, s.as_str()).map_err(write_err)?;
                }
                Cell::Number(n) => {
                    sheet.write_number(row_num, col, *n).map_err(write_err)?;
                }
                Cell::Bool(b) => {
                    sheet.write_boolean(row_num, col, *b).map_err(write_err)?;
                }
                Cell::DateTime(serial) => {
                    sheet
                        .write_number_with_format(row_num, col, *serial, &date_format)
                        .map_err(write_err)?;
                }
            }
        }
    }

    Ok(workbook)
}

fn row_num(r: usize) -> Result<u32, TableError> {
    u32::try_from(r).map_err(|_| TableError::TooLarge(format!("row {}", r)))
}

fn col_num(c: usize) -> Result<u16, TableError> {
    u16::try_from(c).map_err(|_| TableError::TooLarge(format!("column {}", c)))
}

fn header_name(index: usize, cell: &Data) -> String {
    match cell {
        Data::Empty => format!("Unnamed: {}", index),
        Data::String(s) => s.trim().to_string(),
        other => cell_from_data(other).to_string(),
    }
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) if s.is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => Cell::DateTime(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Text(e.to_string()),
    }
}
