use crate::backend::TranslationBackend;
use crate::client::RetryingTranslationClient;
use crate::config::EngineConfig;
use crate::progress::{ProgressSink, StopSignal};
use crate::rate_limit::RateLimiter;
use crate::selection::SelectionSet;
use crate::sheet::{IncrementalSheetProcessor, SheetJob, SheetOutcome};
use crate::state::StateStore;
use crate::stats::{SessionStatistics, StatsSnapshot};
use crate::tabular::{TabularSink, TabularSource};
use serde::Serialize;
use tracing::{error, info};

/// Overall result of a workbook run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every selected sheet is completed
    Success,
    /// Some sheets failed, at least one other is completed
    CompletedWithFailures,
    /// Every attempted sheet failed
    Failed,
    /// Stop was requested; the run can be resumed
    Stopped,
}

/// What happened to each sheet, plus the run's statistics
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Sheets translated during this run
    pub completed: Vec<String>,
    /// Sheets already completed by an earlier run
    pub skipped: Vec<String>,
    /// Sheets that failed, with the error text
    pub failed: Vec<(String, String)>,
    pub stats: StatsSnapshot,
}

impl RunReport {
    pub fn processed(&self) -> usize {
        self.completed.len() + self.skipped.len() + self.failed.len()
    }
}

/// Drives a selection of sheets through the translation pipeline.
pub struct WorkbookOrchestrator<B> {
    client: RetryingTranslationClient<B>,
    store: StateStore,
    processor: IncrementalSheetProcessor,
}

impl<B: TranslationBackend> WorkbookOrchestrator<B> {
    pub fn new(
        client: RetryingTranslationClient<B>,
        store: StateStore,
        processor: IncrementalSheetProcessor,
    ) -> Self {
        Self {
            client,
            store,
            processor,
        }
    }

    /// Wire the whole pipeline from engine settings, opening the state file.
    pub fn from_config(backend: B, config: &EngineConfig) -> Self {
        let store = StateStore::open(&config.state_file).with_flush_every(config.flush_every);
        let client = RetryingTranslationClient::new(
            backend,
            RateLimiter::new(config.requests_per_minute),
            config.retry_policy(),
        );
        Self::new(client, store, IncrementalSheetProcessor::new(config.batch_size))
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut StateStore {
        &mut self.store
    }

    pub fn stats(&self) -> &SessionStatistics {
        self.client.stats()
    }

    pub fn client(&self) -> &RetryingTranslationClient<B> {
        &self.client
    }

    /// Run every sheet of `selection` in order.
    ///
    /// Sheet failures are recorded and the run moves on; only a stop request
    /// ends it early.
    pub async fn process(
        &mut self,
        source: &dyn TabularSource,
        sink: &mut dyn TabularSink,
        selection: &SelectionSet,
        progress: &mut dyn ProgressSink,
        stop: &dyn StopSignal,
    ) -> RunReport {
        self.client.reset_stats();

        let total = selection.len();
        let mut completed = Vec::new();
        let mut skipped = Vec::new();
        let mut failed = Vec::new();

        info!("Starting translation run over {} sheets", total);

        if total == 0 {
            let stats = self.client.stats().snapshot();
            progress.report("", 100.0, &format!("Processed sheets: 0/0; {}", stats));
        }

        for entry in selection.iter() {
            let sheet = entry.sheet.as_str();

            if stop.should_stop() {
                info!("Translation stopped by request before sheet '{}'", sheet);
                return self.report(RunOutcome::Stopped, completed, skipped, failed);
            }

            let outcome = self
                .processor
                .process_sheet(
                    &mut self.client,
                    &mut self.store,
                    SheetJob {
                        sheet,
                        columns: &entry.columns,
                        source,
                        sink: &mut *sink,
                    },
                    &mut *progress,
                    stop,
                )
                .await;

            match outcome {
                SheetOutcome::Completed => completed.push(sheet.to_string()),
                SheetOutcome::AlreadyCompleted => skipped.push(sheet.to_string()),
                SheetOutcome::Stopped => {
                    info!("Translation stopped by request in sheet '{}'", sheet);
                    return self.report(RunOutcome::Stopped, completed, skipped, failed);
                }
                SheetOutcome::Failed(e) => {
                    error!("Sheet '{}' failed, continuing with the next one: {}", sheet, e);
                    failed.push((sheet.to_string(), e.to_string()));
                }
            }

            let processed = completed.len() + skipped.len() + failed.len();
            let stats = self.client.stats().snapshot();
            progress.report(
                sheet,
                processed as f64 / total as f64 * 100.0,
                &format!("Processed sheets: {}/{}; {}", processed, total, stats),
            );
        }

        let outcome = if failed.is_empty() {
            RunOutcome::Success
        } else if completed.is_empty() && skipped.is_empty() {
            RunOutcome::Failed
        } else {
            RunOutcome::CompletedWithFailures
        };

        if let Err(e) = self.store.flush() {
            error!("Failed to save translation state: {}", e);
        }

        let report = self.report(outcome, completed, skipped, failed);
        info!(
            "Translation run finished ({:?}): {} translated, {} skipped, {} failed; {}",
            report.outcome,
            report.completed.len(),
            report.skipped.len(),
            report.failed.len(),
            report.stats
        );
        report
    }

    fn report(
        &mut self,
        outcome: RunOutcome,
        completed: Vec<String>,
        skipped: Vec<String>,
        failed: Vec<(String, String)>,
    ) -> RunReport {
        if outcome == RunOutcome::Stopped {
            if let Err(e) = self.store.flush() {
                error!("Failed to save translation state: {}", e);
            }
        }
        RunReport {
            outcome,
            completed,
            skipped,
            failed,
            stats: self.client.stats().snapshot(),
        }
    }
}
