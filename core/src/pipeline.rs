//! The query pipeline — one question in, one outcome out.
//!
//! EXECUTION ORDER (linear, no loops, no retries):
//!   1. Guard      — forbidden topic → DataNotAvailable (translator not called)
//!   2. Translate  — service failure → Failed(TranslationUnavailable)
//!   3. Fallback   — model said "data not available" → DataNotAvailable
//!   4. Filter     — append customer_id IN (...) when an allow-list is active
//!   5. Execute    — engine error → Failed(SqlExecution)
//!   6. Shape      — zero rows → NoResults, else Rows
//!   7. Anomalies  — advisory, when question or SQL mentions "transaction"
//!
//! RULES:
//!   - Exactly one outcome per run. A table and an error never coexist.
//!   - The allow-list is read here, never written.
//!   - Step 7 cannot change the outcome of steps 1–6.

use crate::{
    anomaly::{self, AnomalyConfig, AnomalyReport},
    config::PipelineStages,
    filter::{apply_allowlist, AllowList},
    guard::{TopicGuard, TRY_ASKING_ABOUT},
    schema::SchemaDescriptor,
    store::{BankStore, StoreError, TabularResult},
    translator::{is_fallback, SqlTranslator, TranslationUnavailable},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnavailableReason {
    ForbiddenTopic { term: String },
    OutsideSchema,
}

impl UnavailableReason {
    pub fn message(&self) -> String {
        match self {
            UnavailableReason::ForbiddenTopic { term } => {
                format!("'{term}' is not part of the banking database")
            }
            UnavailableReason::OutsideSchema => "Query outside available schema".to_string(),
        }
    }
}

/// Structured "we do not hold that data" answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataNotAvailable {
    pub reason:           UnavailableReason,
    pub try_asking_about: &'static str,
}

impl DataNotAvailable {
    fn new(reason: UnavailableReason) -> Self {
        Self { reason, try_asking_about: TRY_ASKING_ABOUT }
    }
}

/// Terminal failures, shown to the user as errors.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryFailure {
    #[error(transparent)]
    TranslationUnavailable(#[from] TranslationUnavailable),

    #[error(transparent)]
    SqlExecution(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryOutcome {
    Rows { table: TabularResult },
    NoResults { columns: Vec<String> },
    DataNotAvailable(DataNotAvailable),
    Failed { error: QueryFailure },
}

impl QueryOutcome {
    pub fn row_count(&self) -> usize {
        match self {
            QueryOutcome::Rows { table } => table.row_count(),
            _ => 0,
        }
    }

    pub fn table(&self) -> Option<&TabularResult> {
        match self {
            QueryOutcome::Rows { table } => Some(table),
            _ => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, QueryOutcome::Failed { .. })
    }
}

/// Everything one pipeline run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResponse {
    pub question:  String,
    /// SQL that was executed (or would have been), after filtering.
    pub sql:       Option<String>,
    pub outcome:   QueryOutcome,
    pub anomalies: Option<AnomalyReport>,
}

impl PipelineResponse {
    fn without_sql(question: &str, outcome: QueryOutcome) -> Self {
        Self { question: question.to_string(), sql: None, outcome, anomalies: None }
    }
}

pub struct QueryPipeline {
    guard:      TopicGuard,
    translator: SqlTranslator,
    stages:     PipelineStages,
    anomaly:    AnomalyConfig,
}

impl QueryPipeline {
    pub fn new(translator: SqlTranslator, stages: PipelineStages, anomaly: AnomalyConfig) -> Self {
        Self { guard: TopicGuard::new(), translator, stages, anomaly }
    }

    pub fn stages(&self) -> PipelineStages {
        self.stages
    }

    pub fn ask(
        &self,
        store: &BankStore,
        schema: &SchemaDescriptor,
        question: &str,
        allowlist: Option<&AllowList>,
    ) -> PipelineResponse {
        log::info!("pipeline: question={question:?}");

        // 1. Guard
        if self.stages.topic_guard {
            if let Some(term) = self.guard.check(question) {
                log::info!("pipeline: forbidden topic '{term}'");
                let reason = UnavailableReason::ForbiddenTopic { term: term.to_string() };
                return PipelineResponse::without_sql(
                    question,
                    QueryOutcome::DataNotAvailable(DataNotAvailable::new(reason)),
                );
            }
        }

        // 2. Translate
        let prompt = match allowlist {
            Some(list) => format!("{question}\n\n{}", list.prompt_context()),
            None => question.to_string(),
        };
        let generated = match self.translator.translate(&prompt, schema) {
            Ok(sql) => sql,
            Err(e) => {
                log::warn!("pipeline: {e}");
                return PipelineResponse::without_sql(
                    question,
                    QueryOutcome::Failed { error: e.into() },
                );
            }
        };
        log::debug!("pipeline: generated sql={generated:?}");

        // 3–6
        let (sql, outcome) = self.run_generated(store, generated, allowlist);

        // 7. Anomalies
        let anomalies = self.side_analysis(store, question, &sql);

        PipelineResponse {
            question: question.to_string(),
            sql: Some(sql),
            outcome,
            anomalies,
        }
    }

    fn run_generated(
        &self,
        store: &BankStore,
        generated: String,
        allowlist: Option<&AllowList>,
    ) -> (String, QueryOutcome) {
        if is_fallback(&generated) {
            log::info!("pipeline: model reports data unavailable");
            let outcome = QueryOutcome::DataNotAvailable(DataNotAvailable::new(
                UnavailableReason::OutsideSchema,
            ));
            return (generated, outcome);
        }

        let sql = apply_allowlist(&generated, allowlist.map(AllowList::ids));

        let outcome = match store.execute(&sql) {
            Err(e) => {
                log::warn!("pipeline: {e}");
                QueryOutcome::Failed { error: e.into() }
            }
            Ok(table) if table.is_empty() => {
                log::info!("pipeline: no matching rows");
                QueryOutcome::NoResults { columns: table.columns }
            }
            Ok(table) => {
                log::info!("pipeline: found {} rows", table.row_count());
                QueryOutcome::Rows { table }
            }
        };
        (sql, outcome)
    }

    fn side_analysis(&self, store: &BankStore, question: &str, sql: &str) -> Option<AnomalyReport> {
        if !self.stages.anomaly_check || !mentions_transactions(question, sql) {
            return None;
        }
        match store
            .transactions()
            .and_then(|table| anomaly::detect(&table, &self.anomaly))
        {
            Ok(report) => Some(report),
            Err(e) => {
                log::warn!("pipeline: anomaly check skipped: {e}");
                None
            }
        }
    }
}

fn mentions_transactions(question: &str, sql: &str) -> bool {
    question.to_lowercase().contains("transaction") || sql.to_lowercase().contains("transaction")
}
