use crate::backend::TranslationBackend;
use crate::batch::{resolve, BatchProgress, ColumnBatchTranslator, ColumnTranslation};
use crate::client::RetryingTranslationClient;
use crate::error::TabularError;
use crate::inspect::estimate_sheet_volume;
use crate::progress::{ProgressSink, StopSignal};
use crate::state::StateStore;
use crate::tabular::{TabularSink, TabularSource};
use tracing::{error, info, warn};

/// How a single sheet ended
#[derive(Debug)]
pub enum SheetOutcome {
    /// Translated, written and marked completed in this call
    Completed,
    /// Marked completed by an earlier run; the sheet was not read
    AlreadyCompleted,
    /// Stop was requested; work done so far stays in the cache
    Stopped,
    /// Reading or writing the sheet failed; it is not marked completed
    Failed(TabularError),
}

impl SheetOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Completed | Self::AlreadyCompleted)
    }
}

/// One sheet's worth of input and output
pub struct SheetJob<'a> {
    pub sheet: &'a str,
    pub columns: &'a [String],
    pub source: &'a dyn TabularSource,
    pub sink: &'a mut dyn TabularSink,
}

/// Translates the selected columns of one sheet and records its completion.
#[derive(Debug, Clone, Default)]
pub struct IncrementalSheetProcessor {
    batcher: ColumnBatchTranslator,
}

/// Progress while column `index` of `count` starts: the first half of the budget
fn column_start_percent(index: usize, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    index as f64 / count as f64 * 50.0
}

/// Progress after `processed` of `total` translatable cells: the second half
fn cells_percent(processed: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (50.0 + processed as f64 / total as f64 * 50.0).min(100.0)
}

fn report(
    store: &mut StateStore,
    progress: &mut dyn ProgressSink,
    sheet: &str,
    percent: f64,
    message: &str,
) {
    store.set_sheet_progress(sheet, percent);
    progress.report(sheet, percent, message);
}

impl IncrementalSheetProcessor {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batcher: ColumnBatchTranslator::new(batch_size),
        }
    }

    pub fn batcher(&self) -> &ColumnBatchTranslator {
        &self.batcher
    }

    /// Translate one sheet, write it to the sink, then mark it completed.
    ///
    /// A sheet already marked completed is never read again.
    pub async fn process_sheet<B: TranslationBackend>(
        &self,
        client: &mut RetryingTranslationClient<B>,
        store: &mut StateStore,
        job: SheetJob<'_>,
        progress: &mut dyn ProgressSink,
        stop: &dyn StopSignal,
    ) -> SheetOutcome {
        let SheetJob {
            sheet,
            columns,
            source,
            sink,
        } = job;

        if store.is_sheet_completed(sheet) {
            info!("Sheet '{}' already translated, skipping", sheet);
            return SheetOutcome::AlreadyCompleted;
        }

        info!("Processing sheet '{}' ({} columns)", sheet, columns.len());

        let mut data = match source.read_sheet_as_text(sheet) {
            Ok(data) => data,
            Err(e) => {
                error!("Failed to read sheet '{}': {}", sheet, e);
                return SheetOutcome::Failed(e);
            }
        };

        let total_cells = estimate_sheet_volume(&data, columns);

        if total_cells == 0 {
            info!("Sheet '{}' has nothing to translate", sheet);
        } else {
            progress.report(sheet, 0.0, &format!("Starting sheet {}", sheet));

            let mut processed_cells = 0;
            for (col_idx, column) in columns.iter().enumerate() {
                if stop.should_stop() {
                    info!("Stopping sheet '{}' before column '{}'", sheet, column);
                    return SheetOutcome::Stopped;
                }

                let Some(index) = data.column_index(column) else {
                    warn!("Column '{}' not found in sheet '{}'", column, sheet);
                    continue;
                };

                info!("Translating column '{}'", column);
                report(
                    store,
                    progress,
                    sheet,
                    column_start_percent(col_idx, columns.len()),
                    &format!("Translating column {}", column),
                );

                let values = data.column_values(index);
                let mut column_cells = 0;
                let mut on_batch = |store: &mut StateStore, batch: BatchProgress| {
                    column_cells = batch.processed_cells;
                    let done = processed_cells + batch.processed_cells;
                    report(
                        store,
                        progress,
                        sheet,
                        cells_percent(done, total_cells),
                        &format!("Translated {}/{} cells; {}", done, total_cells, batch.stats),
                    );
                };

                let translation = self
                    .batcher
                    .translate_column(client, store, &values, stop, &mut on_batch)
                    .await;

                let mapping = match translation {
                    ColumnTranslation::Completed(mapping) => mapping,
                    ColumnTranslation::Stopped => {
                        info!("Stopping sheet '{}' during column '{}'", sheet, column);
                        return SheetOutcome::Stopped;
                    }
                };

                data.rewrite_column(index, |cell| resolve(&mapping, cell).to_string());
                processed_cells += column_cells;
            }
        }

        if let Err(e) = sink.write_sheet(sheet, &data) {
            error!("Failed to write sheet '{}': {}", sheet, e);
            return SheetOutcome::Failed(e);
        }
        store.mark_sheet_completed(sheet);
        progress.report(sheet, 100.0, &format!("Sheet '{}' translated", sheet));

        info!("Sheet '{}' completed", sheet);
        SheetOutcome::Completed
    }
}
