use crate::backend::TranslationBackend;
use crate::client::RetryingTranslationClient;
use crate::config::DEFAULT_BATCH_SIZE;
use crate::filter::should_translate;
use crate::progress::StopSignal;
use crate::state::StateStore;
use crate::stats::StatsSnapshot;
use std::collections::HashMap;
use tracing::{debug, info};

/// Cumulative progress of one column, handed to the batch callback
#[derive(Debug, Clone)]
pub struct BatchProgress {
    /// Distinct translatable values finished so far
    pub processed_units: usize,
    pub total_units: usize,
    /// Cells whose value belongs to a finished batch
    pub processed_cells: usize,
    pub stats: StatsSnapshot,
}

/// Result of translating one column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnTranslation {
    /// Every distinct value of the column mapped to its translation
    Completed(HashMap<String, String>),
    /// The stop signal was seen between batches
    Stopped,
}

/// Look up a cell in a column mapping, falling back to the cell itself.
pub fn resolve<'a>(mapping: &'a HashMap<String, String>, value: &'a str) -> &'a str {
    mapping.get(value).map(String::as_str).unwrap_or(value)
}

/// Deduplicates a column and feeds its distinct values to the client in batches.
#[derive(Debug, Clone)]
pub struct ColumnBatchTranslator {
    batch_size: usize,
}

impl Default for ColumnBatchTranslator {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl ColumnBatchTranslator {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Translate the distinct values of `values`.
    ///
    /// The stop signal is polled before every batch. `on_batch` runs after
    /// each finished batch and may write to the store.
    pub async fn translate_column<B: TranslationBackend>(
        &self,
        client: &mut RetryingTranslationClient<B>,
        store: &mut StateStore,
        values: &[String],
        stop: &dyn StopSignal,
        on_batch: &mut dyn FnMut(&mut StateStore, BatchProgress),
    ) -> ColumnTranslation {
        let mut occurrences: HashMap<&str, usize> = HashMap::new();
        let mut distinct: Vec<&str> = Vec::new();
        for value in values {
            let count = occurrences.entry(value.as_str()).or_insert(0);
            if *count == 0 {
                distinct.push(value.as_str());
            }
            *count += 1;
        }

        let mut mapping = HashMap::with_capacity(distinct.len());
        let mut pending = Vec::new();
        for value in distinct {
            if should_translate(value) {
                pending.push(value);
            } else {
                mapping.insert(value.to_string(), value.to_string());
            }
        }

        let total_units = pending.len();
        let batch_count = total_units.div_ceil(self.batch_size);
        debug!(
            "{} cells, {} distinct translatable values in {} batches",
            values.len(),
            total_units,
            batch_count
        );

        let mut processed_units = 0;
        let mut processed_cells = 0;

        for (index, batch) in pending.chunks(self.batch_size).enumerate() {
            if stop.should_stop() {
                info!(
                    "Stop requested before batch {}/{}, {} of {} values done",
                    index + 1,
                    batch_count,
                    processed_units,
                    total_units
                );
                return ColumnTranslation::Stopped;
            }

            for value in batch {
                let translated = client.translate(store, value).await;
                mapping.insert(value.to_string(), translated);
                processed_cells += occurrences.get(value).copied().unwrap_or(1);
            }
            processed_units += batch.len();

            debug!(
                "Batch {}/{} done ({}/{} values)",
                index + 1,
                batch_count,
                processed_units,
                total_units
            );
            on_batch(
                store,
                BatchProgress {
                    processed_units,
                    total_units,
                    processed_cells,
                    stats: client.stats().snapshot(),
                },
            );
        }

        ColumnTranslation::Completed(mapping)
    }
}
