//! The assistant session — the one context object a front end holds.
//!
//! RULES:
//!   - Built once at startup, passed explicitly, dropped at exit.
//!   - Owns the store, schema and pipeline; nothing is global.
//!   - The allow-list changes only through upload/clear calls, never
//!     during a pipeline run.

use crate::{
    config::AssistantConfig,
    error::{AssistantError, AssistantResult},
    export,
    filter::AllowList,
    history::{HistoryEntry, QueryHistory},
    pipeline::{PipelineResponse, QueryPipeline},
    schema::SchemaDescriptor,
    store::{BankStore, TabularResult},
    translator::{ChatCompletionsClient, CompletionClient, SqlTranslator},
};
use std::{io::Read, path::PathBuf};

pub struct BankAssistant {
    pub config:  AssistantConfig,
    pub store:   BankStore,
    pub schema:  SchemaDescriptor,
    pipeline:    QueryPipeline,
    allowlist:   Option<AllowList>,
    history:     QueryHistory,
    last_result: Option<TabularResult>,
}

impl BankAssistant {
    pub fn new(
        config: AssistantConfig,
        store: BankStore,
        schema: SchemaDescriptor,
        client: Box<dyn CompletionClient>,
    ) -> Self {
        let pipeline = QueryPipeline::new(
            SqlTranslator::new(client),
            config.stages,
            config.anomaly.clone(),
        );
        Self {
            history: QueryHistory::new(config.history_limit),
            config,
            store,
            schema,
            pipeline,
            allowlist: None,
            last_result: None,
        }
    }

    /// Load the datasets from `config.data_dir` and connect to the
    /// configured completion service.
    pub fn build(config: AssistantConfig) -> AssistantResult<Self> {
        let (store, schema) = BankStore::load(&config.data_dir)?;
        let client = ChatCompletionsClient::new(&config)?;
        Ok(Self::new(config, store, schema, Box::new(client)))
    }

    /// Run one question through the pipeline and record it in history.
    pub fn ask(&mut self, question: &str) -> PipelineResponse {
        let response = self.pipeline.ask(
            &self.store,
            &self.schema,
            question,
            self.allowlist.as_ref(),
        );
        self.history.record(
            question,
            response.sql.as_deref(),
            response.outcome.row_count(),
        );
        if let Some(table) = response.outcome.table() {
            self.last_result = Some(table.clone());
        }
        response
    }

    /// Re-ask the question at `index` in `recent_queries()`.
    pub fn rerun(&mut self, index: usize) -> Option<PipelineResponse> {
        let question = self.history.get(index)?.question.clone();
        Some(self.ask(&question))
    }

    // ── Allow-list ─────────────────────────────────────────────────

    pub fn upload_allowlist<R: Read>(&mut self, reader: R) -> AssistantResult<&AllowList> {
        let list = AllowList::from_csv_reader(reader)?;
        log::info!("allowlist: {} customer ids active", list.len());
        Ok(self.allowlist.insert(list))
    }

    pub fn set_allowlist(&mut self, list: AllowList) {
        self.allowlist = Some(list);
    }

    pub fn clear_allowlist(&mut self) {
        if self.allowlist.take().is_some() {
            log::info!("allowlist: cleared");
        }
    }

    pub fn allowlist(&self) -> Option<&AllowList> {
        self.allowlist.as_ref()
    }

    // ── History ────────────────────────────────────────────────────

    pub fn recent_queries(&self) -> &[HistoryEntry] {
        self.history.recent()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    // ── Export ─────────────────────────────────────────────────────

    /// Write the last successful table to `dir` as CSV.
    pub fn export_last(&self, dir: Option<PathBuf>) -> AssistantResult<PathBuf> {
        let table = self.last_result.as_ref().ok_or(AssistantError::NothingToExport)?;
        let dir = dir.unwrap_or_else(|| self.config.export_dir.clone());
        export::export_csv(table, dir)
    }
}
