//! Read-only helpers for choosing what to translate.

use crate::error::TabularError;
use crate::filter::should_translate;
use crate::selection::SelectionSet;
use crate::tabular::{SheetData, TabularSource};
use tracing::warn;

/// Every sheet with its column names, in source order
pub fn sheet_info(source: &dyn TabularSource) -> Result<Vec<(String, Vec<String>)>, TabularError> {
    source
        .sheet_names()?
        .into_iter()
        .map(|sheet| {
            let columns = source.read_sheet_columns(&sheet)?;
            Ok((sheet, columns))
        })
        .collect()
}

/// The first `rows` rows of a sheet
pub fn sheet_preview(
    source: &dyn TabularSource,
    sheet: &str,
    rows: usize,
) -> Result<SheetData, TabularError> {
    let mut data = source.read_sheet_as_text(sheet)?;
    data.rows.truncate(rows);
    Ok(data)
}

/// Number of cells in `columns` that would be sent for translation.
///
/// Columns missing from the sheet count zero.
pub fn estimate_sheet_volume(data: &SheetData, columns: &[String]) -> usize {
    columns
        .iter()
        .filter_map(|column| data.column_index(column))
        .map(|index| {
            data.rows
                .iter()
                .filter(|row| row.get(index).is_some_and(|cell| should_translate(cell)))
                .count()
        })
        .sum()
}

/// Translatable cells across a whole selection. Unreadable sheets count zero.
pub fn estimate_workbook_volume(source: &dyn TabularSource, selection: &SelectionSet) -> usize {
    selection
        .iter()
        .map(|entry| match source.read_sheet_as_text(&entry.sheet) {
            Ok(data) => estimate_sheet_volume(&data, &entry.columns),
            Err(e) => {
                warn!("Skipping sheet '{}' in volume estimate: {}", entry.sheet, e);
                0
            }
        })
        .sum()
}
