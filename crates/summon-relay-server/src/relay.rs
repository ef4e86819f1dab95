//! Result relay facade
//!
//! `ResultRelay` is built once at startup and shared behind an `Arc`. Store
//! and asset operations are blocking file I/O and run on the blocking pool.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use summon_relay_core::{
    AttackResult, ExecutionId, ParsedResult, RawResult, RecordMeta, RecordSummary, RelayError,
    Result, ResultRecord, ResultType, classify, normalize_payload,
};
use summon_relay_store::{
    CreatureAssets, FsResultStore, PollWindow, RelayConfig, ResultStore, poll_until,
};
use tracing::{debug, info};

use crate::processor::{CreatureRegistration, ModelExtraction, ResultProcessor};

pub const SAVED_STATUS: &str = "saved";
pub const COMPLETED_STATUS: &str = "completed";

/// Acknowledgement returned to a producer after a save
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    pub execution_id: ExecutionId,
    pub result_type: ResultType,
    pub timestamp: DateTime<Utc>,
    pub status: String,
}

impl From<RecordMeta> for SubmitReceipt {
    fn from(meta: RecordMeta) -> Self {
        Self {
            execution_id: meta.execution_id,
            result_type: meta.result_type,
            timestamp: meta.timestamp,
            status: SAVED_STATUS.into(),
        }
    }
}

/// A consumed record together with its typed projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedResult {
    #[serde(flatten)]
    pub record: ResultRecord,
    pub parsed: ParsedResult,
}

/// Outcome of saving a result and running its side effects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingReport {
    #[serde(flatten)]
    pub receipt: SubmitReceipt,
    pub processing_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creature: Option<CreatureRegistration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelExtraction>,
    pub parsed: ParsedResult,
}

/// Handle over the result queue and the processor
#[derive(Clone)]
pub struct ResultRelay {
    store: Arc<dyn ResultStore>,
    processor: ResultProcessor,
    result_poll: PollWindow,
}

impl ResultRelay {
    pub fn new(store: Arc<dyn ResultStore>, processor: ResultProcessor) -> Self {
        Self {
            store,
            processor,
            result_poll: PollWindow::result(),
        }
    }

    /// Open the file-backed store and assets described by `config`
    pub fn open(config: &RelayConfig) -> Result<Self> {
        let store = FsResultStore::open(config.results_dir())?;
        let processor = ResultProcessor::new(CreatureAssets::new(&config.assets_dir));
        Ok(Self::new(Arc::new(store), processor).with_result_poll(config.result_poll))
    }

    pub fn with_result_poll(mut self, window: PollWindow) -> Self {
        self.result_poll = window;
        self
    }

    pub fn result_poll(&self) -> PollWindow {
        self.result_poll
    }

    pub fn processor(&self) -> &ResultProcessor {
        &self.processor
    }

    /// Queue a raw result, replacing whatever was queued
    pub async fn submit(&self, raw: RawResult) -> Result<SubmitReceipt> {
        let store = self.store.clone();
        let meta = run_blocking(move || {
            let id = store.generate_execution_id();
            store.save(&id, raw)
        })
        .await?;
        Ok(meta.into())
    }

    /// Queue a typed attack result
    pub async fn submit_attack(&self, attack: AttackResult) -> Result<SubmitReceipt> {
        debug!("Attack result: {} damage", attack.damage());
        self.submit(RawResult::from(attack.to_payload())).await
    }

    /// Queue a result, then register creatures and extract models it
    /// carries. The record stays queued for the front-end.
    pub async fn submit_and_process(&self, raw: RawResult) -> Result<ProcessingReport> {
        let data = normalize_payload(raw);
        let result_type = classify(&data);
        let store = self.store.clone();
        let processor = self.processor.clone();

        run_blocking(move || {
            let id = store.generate_execution_id();
            let meta = store.save(&id, RawResult::from(data.clone()))?;

            let creature = match result_type {
                ResultType::CreatureData => Some(processor.process_creature_result(&id, &data)?),
                _ => None,
            };
            let model = match result_type {
                ResultType::ModelGeneration => Some(processor.process_model_result(&id, &data)?),
                _ => None,
            };
            let parsed = processor.process(&data, &meta.result_type);
            info!("Processed result {} ({})", id, meta.result_type);

            Ok(ProcessingReport {
                receipt: meta.into(),
                processing_status: COMPLETED_STATUS.into(),
                creature,
                model,
                parsed,
            })
        })
        .await
    }

    /// Consume the queued result, if any
    pub async fn fetch_current(&self) -> Result<Option<FetchedResult>> {
        let store = self.store.clone();
        let record = run_blocking(move || store.fetch_current()).await?;
        Ok(record.map(|record| self.parsed(record)))
    }

    /// Consume the result with this id, if it is still queued
    pub async fn fetch(&self, id: &ExecutionId) -> Result<Option<FetchedResult>> {
        let store = self.store.clone();
        let id = id.clone();
        let record = run_blocking(move || store.fetch(&id)).await?;
        Ok(record.map(|record| self.parsed(record)))
    }

    pub async fn has_result(&self) -> Result<bool> {
        let store = self.store.clone();
        run_blocking(move || store.has_result()).await
    }

    pub async fn delete(&self, id: &ExecutionId) -> Result<bool> {
        let store = self.store.clone();
        let id = id.clone();
        run_blocking(move || store.delete(&id)).await
    }

    pub async fn list(
        &self,
        limit: usize,
        result_type: Option<ResultType>,
    ) -> Result<Vec<RecordSummary>> {
        let store = self.store.clone();
        run_blocking(move || store.list(limit, result_type.as_ref())).await
    }

    /// Wait within `window` for a result to be queued, then consume it
    pub async fn wait_for_result(&self, window: PollWindow) -> Result<FetchedResult> {
        poll_until(window, "queued result", || self.fetch_current()).await
    }

    fn parsed(&self, record: ResultRecord) -> FetchedResult {
        let parsed = self.processor.process(&record.data, &record.result_type);
        FetchedResult { record, parsed }
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| RelayError::Storage(format!("blocking task failed: {}", e)))?
}
