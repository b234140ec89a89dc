//! Incremental, resumable translation of spreadsheet workbooks.
//!
//! A run walks the selected sheets and columns, sends each distinct cell value
//! through a rate-limited, retrying client, and keeps a durable cache and
//! completion ledger so an interrupted run picks up where it stopped.

pub mod backend;
pub mod batch;
pub mod client;
pub mod config;
pub mod error;
pub mod filter;
pub mod inspect;
pub mod orchestrator;
pub mod progress;
pub mod rate_limit;
pub mod retry;
pub mod selection;
pub mod sheet;
pub mod state;
pub mod stats;
pub mod tabular;

pub use backend::{OpenAiBackend, TranslationBackend};
pub use client::RetryingTranslationClient;
pub use config::{BackendConfig, EngineConfig};
pub use error::{BackendError, FailureKind, TabularError};
pub use orchestrator::{RunOutcome, RunReport, WorkbookOrchestrator};
pub use progress::{NeverStop, NoProgress, ProgressSink, StopFlag, StopSignal};
pub use selection::SelectionSet;
pub use state::StateStore;
pub use tabular::{CsvWorkbook, MemoryWorkbook, SheetData, TabularSink, TabularSource};
