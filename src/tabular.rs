//! Tabular I/O: reading sheets as text and writing them back.
//!
//! The engine sees a workbook only through [`TabularSource`] and
//! [`TabularSink`]. Two adapters ship with the crate: [`CsvWorkbook`] (a
//! directory holding one CSV file per sheet) and [`MemoryWorkbook`].

use crate::error::TabularError;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A sheet read as text: column names plus rows aligned to them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SheetData {
    /// Build a sheet, padding short rows with empty cells
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width.max(row.len()), String::new());
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of one column, top to bottom
    pub fn column_values(&self, index: usize) -> Vec<String> {
        self.rows
            .iter()
            .map(|row| row.get(index).cloned().unwrap_or_default())
            .collect()
    }

    /// Replace every cell of a column with `f(cell)`
    pub fn rewrite_column<F>(&mut self, index: usize, mut f: F)
    where
        F: FnMut(&str) -> String,
    {
        for row in &mut self.rows {
            if let Some(cell) = row.get_mut(index) {
                *cell = f(cell);
            }
        }
    }

    /// Rows as ordered `(column, value)` pairs
    pub fn named_rows(&self) -> Vec<Vec<(&str, &str)>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row.iter())
                    .map(|(c, v)| (c.as_str(), v.as_str()))
                    .collect()
            })
            .collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Read side of a workbook
pub trait TabularSource {
    fn sheet_names(&self) -> Result<Vec<String>, TabularError>;

    fn read_sheet_columns(&self, sheet: &str) -> Result<Vec<String>, TabularError>;

    fn read_sheet_as_text(&self, sheet: &str) -> Result<SheetData, TabularError>;
}

/// Write side of a workbook. Writing a sheet replaces any earlier version of it.
pub trait TabularSink {
    fn write_sheet(&mut self, sheet: &str, data: &SheetData) -> Result<(), TabularError>;
}

// ==================== CSV directory workbook ====================

/// A workbook stored as a directory with one `<sheet>.csv` per sheet.
#[derive(Debug, Clone)]
pub struct CsvWorkbook {
    dir: PathBuf,
}

impl CsvWorkbook {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn sheet_path(&self, sheet: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", sheet))
    }

    fn open_reader(&self, sheet: &str) -> Result<csv::Reader<fs::File>, TabularError> {
        let path = self.sheet_path(sheet);
        if !path.is_file() {
            return Err(TabularError::SheetNotFound(sheet.to_string()));
        }
        Ok(csv::ReaderBuilder::new().flexible(true).from_path(path)?)
    }
}

impl TabularSource for CsvWorkbook {
    fn sheet_names(&self) -> Result<Vec<String>, TabularError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_csv = path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("csv"))
                .unwrap_or(false);
            if !is_csv {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn read_sheet_columns(&self, sheet: &str) -> Result<Vec<String>, TabularError> {
        let mut reader = self.open_reader(sheet)?;
        Ok(reader.headers()?.iter().map(str::to_string).collect())
    }

    fn read_sheet_as_text(&self, sheet: &str) -> Result<SheetData, TabularError> {
        let mut reader = self.open_reader(sheet)?;
        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let mut row: Vec<String> = record?.iter().map(str::to_string).collect();
            if row.len() > columns.len() {
                warn!(
                    "Sheet '{}' row {} has {} cells but only {} columns, extra cells dropped",
                    sheet,
                    line + 2,
                    row.len(),
                    columns.len()
                );
                row.truncate(columns.len());
            }
            rows.push(row);
        }

        debug!("Read {} rows from sheet '{}'", rows.len(), sheet);
        Ok(SheetData::new(columns, rows))
    }
}

impl TabularSink for CsvWorkbook {
    fn write_sheet(&mut self, sheet: &str, data: &SheetData) -> Result<(), TabularError> {
        fs::create_dir_all(&self.dir)?;

        let mut writer = csv::Writer::from_path(self.sheet_path(sheet))?;
        writer.write_record(&data.columns)?;
        for row in &data.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;

        debug!("Wrote {} rows to sheet '{}'", data.rows.len(), sheet);
        Ok(())
    }
}

// ==================== In-memory workbook ====================

/// Sheets held in memory; reads of selected sheets can be made to fail.
#[derive(Debug, Clone, Default)]
pub struct MemoryWorkbook {
    sheets: Vec<(String, SheetData)>,
    unreadable: HashSet<String>,
    writes: Vec<String>,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a sheet built from string slices
    pub fn with_sheet(mut self, name: &str, columns: &[&str], rows: &[&[&str]]) -> Self {
        let data = SheetData::new(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|v| v.to_string()).collect())
                .collect(),
        );
        self.put_sheet(name, data);
        self
    }

    /// Make every read of `name` fail
    pub fn with_unreadable_sheet(mut self, name: &str) -> Self {
        self.unreadable.insert(name.to_string());
        self
    }

    pub fn sheet(&self, name: &str) -> Option<&SheetData> {
        self.sheets.iter().find(|(n, _)| n == name).map(|(_, d)| d)
    }

    /// Names of sheets written so far, in write order (repeats included)
    pub fn writes(&self) -> &[String] {
        &self.writes
    }

    fn put_sheet(&mut self, name: &str, data: SheetData) {
        match self.sheets.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = data,
            None => self.sheets.push((name.to_string(), data)),
        }
    }

    fn readable(&self, sheet: &str) -> Result<&SheetData, TabularError> {
        if self.unreadable.contains(sheet) {
            return Err(TabularError::Unreadable {
                sheet: sheet.to_string(),
                reason: "sheet is marked unreadable".to_string(),
            });
        }
        self.sheet(sheet)
            .ok_or_else(|| TabularError::SheetNotFound(sheet.to_string()))
    }
}

impl TabularSource for MemoryWorkbook {
    fn sheet_names(&self) -> Result<Vec<String>, TabularError> {
        Ok(self.sheets.iter().map(|(n, _)| n.clone()).collect())
    }

    fn read_sheet_columns(&self, sheet: &str) -> Result<Vec<String>, TabularError> {
        Ok(self.readable(sheet)?.columns.clone())
    }

    fn read_sheet_as_text(&self, sheet: &str) -> Result<SheetData, TabularError> {
        self.readable(sheet).cloned()
    }
}

impl TabularSink for MemoryWorkbook {
    fn write_sheet(&mut self, sheet: &str, data: &SheetData) -> Result<(), TabularError> {
        self.put_sheet(sheet, data.clone());
        self.writes.push(sheet.to_string());
        Ok(())
    }
}
