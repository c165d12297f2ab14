//! Query pipeline tests — one run, one outcome.

mod common;

use bankql_core::{
    anomaly::{AnomalyConfig, AnomalyReport},
    config::PipelineStages,
    filter::AllowList,
    pipeline::{QueryFailure, QueryOutcome, QueryPipeline, UnavailableReason},
    schema::BankTable,
    translator::{SqlTranslator, FALLBACK_PHRASE},
};
use common::ScriptedClient;

fn pipeline(client: &ScriptedClient) -> QueryPipeline {
    pipeline_with(client, PipelineStages::default())
}

fn pipeline_with(client: &ScriptedClient, stages: PipelineStages) -> QueryPipeline {
    QueryPipeline::new(
        SqlTranslator::new(Box::new(client.clone())),
        stages,
        AnomalyConfig::default(),
    )
}

#[test]
fn forbidden_topic_never_reaches_translator() {
    let dir = common::write_dataset(5, false);
    let (store, schema) = common::load(&dir);
    let client = ScriptedClient::replying("SELECT * FROM customer");

    let resp = pipeline(&client).ask(&store, &schema, "What is the customer's nationality?", None);

    assert_eq!(client.call_count(), 0);
    assert!(resp.sql.is_none());
    match resp.outcome {
        QueryOutcome::DataNotAvailable(info) => {
            assert_eq!(info.reason, UnavailableReason::ForbiddenTopic { term: "nationality".into() });
            assert!(info.reason.message().contains("nationality"));
            assert_eq!(info.try_asking_about, "customers, accounts, loans, transactions");
        }
        other => panic!("expected DataNotAvailable, got {other:?}"),
    }
}

#[test]
fn disabled_guard_lets_question_through() {
    let dir = common::write_dataset(5, false);
    let (store, schema) = common::load(&dir);
    let client = ScriptedClient::replying("SELECT name FROM customer");
    let stages = PipelineStages { topic_guard: false, anomaly_check: false };

    let resp = pipeline_with(&client, stages).ask(&store, &schema, "customers by nationality", None);

    assert_eq!(client.call_count(), 1);
    assert_eq!(resp.outcome.row_count(), 5);
}

#[test]
fn fallback_phrase_becomes_outside_schema() {
    let dir = common::write_dataset(5, false);
    let (store, schema) = common::load(&dir);
    let client = ScriptedClient::replying(FALLBACK_PHRASE);

    let resp = pipeline(&client).ask(&store, &schema, "favourite colour of customers", None);

    match resp.outcome {
        QueryOutcome::DataNotAvailable(info) => {
            assert_eq!(info.reason, UnavailableReason::OutsideSchema);
            assert_eq!(info.reason.message(), "Query outside available schema");
        }
        other => panic!("expected DataNotAvailable, got {other:?}"),
    }
}

#[test]
fn translation_failure_is_surfaced() {
    let dir = common::write_dataset(5, false);
    let (store, schema) = common::load(&dir);
    let client = ScriptedClient::failing("connection refused");

    let resp = pipeline(&client).ask(&store, &schema, "list loans", None);

    assert!(resp.sql.is_none());
    match resp.outcome {
        QueryOutcome::Failed { error: QueryFailure::TranslationUnavailable(e) } => {
            assert!(e.reason.contains("connection refused"));
        }
        other => panic!("expected TranslationUnavailable, got {other:?}"),
    }
}

#[test]
fn invalid_sql_is_an_error_not_an_empty_table() {
    let dir = common::write_dataset(5, false);
    let (store, schema) = common::load(&dir);
    let client = ScriptedClient::replying("SELEC name FRM customer");

    let resp = pipeline(&client).ask(&store, &schema, "list names", None);

    assert!(resp.outcome.is_failure());
    assert!(resp.outcome.table().is_none());
    match resp.outcome {
        QueryOutcome::Failed { error: QueryFailure::SqlExecution(e) } => assert!(!e.message.is_empty()),
        other => panic!("expected SqlExecution, got {other:?}"),
    }
}

#[test]
fn generated_delete_fails_and_leaves_tables_intact() {
    let dir = common::write_dataset(5, false);
    let (store, schema) = common::load(&dir);
    let client = ScriptedClient::replying("DELETE FROM customer");

    let resp = pipeline(&client).ask(&store, &schema, "remove all customers", None);

    match &resp.outcome {
        QueryOutcome::Failed { error: QueryFailure::SqlExecution(e) } => assert!(!e.message.is_empty()),
        other => panic!("expected SqlExecution, got {other:?}"),
    }
    assert_eq!(store.row_count(BankTable::Customer).unwrap(), 5);
}

#[test]
fn generated_drop_keeps_table_queryable() {
    let dir = common::write_dataset(5, false);
    let (store, schema) = common::load(&dir);
    let client = ScriptedClient::replying("DROP TABLE loan");

    let resp = pipeline(&client).ask(&store, &schema, "drop the loans", None);

    assert!(resp.outcome.is_failure());
    let loans = store.execute("SELECT * FROM loan").unwrap();
    assert_eq!(loans.row_count(), 3);
    assert_eq!(loans.columns, schema.columns(BankTable::Loan));
}

#[test]
fn zero_rows_is_no_results_not_failure() {
    let dir = common::write_dataset(5, false);
    let (store, schema) = common::load(&dir);
    let client = ScriptedClient::replying("SELECT name FROM customer WHERE customer_id = 42");

    let resp = pipeline(&client).ask(&store, &schema, "customer 42", None);

    assert_eq!(resp.outcome, QueryOutcome::NoResults { columns: vec!["name".into()] });
    assert!(!resp.outcome.is_failure());
}

#[test]
fn rows_come_back_with_fences_stripped() {
    let dir = common::write_dataset(5, false);
    let (store, schema) = common::load(&dir);
    let client = ScriptedClient::replying("```sql\nSELECT loan_id, amount FROM loan WHERE status = 'active';\n```");

    let resp = pipeline(&client).ask(&store, &schema, "active loans", None);

    assert_eq!(resp.sql.as_deref(), Some("SELECT loan_id, amount FROM loan WHERE status = 'active';"));
    let table = resp.outcome.table().expect("rows");
    assert_eq!(table.columns, vec!["loan_id", "amount"]);
    assert_eq!(table.row_count(), 2);
}

#[test]
fn allowlist_restricts_rows_and_is_mentioned_to_model() {
    let dir = common::write_dataset(5, false);
    let (store, schema) = common::load(&dir);
    let client = ScriptedClient::replying("SELECT account_id FROM account");
    let allow = AllowList::new([1, 5]).unwrap();

    let resp = pipeline(&client).ask(&store, &schema, "all accounts", Some(&allow));

    assert_eq!(resp.sql.as_deref(), Some("SELECT account_id FROM account WHERE customer_id IN (1,5)"));
    assert_eq!(resp.outcome.row_count(), 3);
    let prompt = client.last_user_prompt().unwrap();
    assert!(prompt.starts_with("all accounts"));
    assert!(prompt.contains("customer_id IN (1,5)"));
}

#[test]
fn broken_rewrite_surfaces_as_sql_error() {
    let dir = common::write_dataset(5, false);
    let (store, schema) = common::load(&dir);
    let client = ScriptedClient::replying("SELECT account_id FROM account ORDER BY balance");
    let allow = AllowList::new([1]).unwrap();

    let resp = pipeline(&client).ask(&store, &schema, "accounts by balance", Some(&allow));

    assert!(matches!(
        resp.outcome,
        QueryOutcome::Failed { error: QueryFailure::SqlExecution(_) }
    ));
}

#[test]
fn anomaly_check_runs_only_for_transaction_questions() {
    let dir = common::write_dataset(80, true);
    let (store, schema) = common::load(&dir);

    let client = ScriptedClient::replying("SELECT name FROM customer");
    let resp = pipeline(&client).ask(&store, &schema, "customer names", None);
    assert!(resp.anomalies.is_none());

    let client = ScriptedClient::replying("SELECT COUNT(*) FROM transactions");
    let resp = pipeline(&client).ask(&store, &schema, "how many payments?", None);
    assert!(matches!(resp.anomalies, Some(AnomalyReport::Computed { .. })));
}

#[test]
fn anomaly_side_path_never_changes_primary_result() {
    let sql = "SELECT type, COUNT(*) AS n FROM transactions GROUP BY type ORDER BY type";
    for count in [10, 80] {
        let dir = common::write_dataset(count, true);
        let (store, schema) = common::load(&dir);
        let client = ScriptedClient::replying(sql);

        let with = pipeline(&client).ask(&store, &schema, "transactions per type", None);
        let without = pipeline_with(&client, PipelineStages { topic_guard: true, anomaly_check: false })
            .ask(&store, &schema, "transactions per type", None);

        assert_eq!(with.outcome, without.outcome);
        assert!(without.anomalies.is_none());
        match (count, &with.anomalies) {
            (10, Some(AnomalyReport::NotComputed { transaction_count })) => assert_eq!(*transaction_count, 11),
            (80, Some(AnomalyReport::Computed { .. })) => {}
            (_, other) => panic!("unexpected report for {count} rows: {other:?}"),
        }
    }
}

#[test]
fn anomaly_check_still_runs_after_sql_error() {
    let dir = common::write_dataset(60, false);
    let (store, schema) = common::load(&dir);
    let client = ScriptedClient::replying("SELECT nope FROM transactions");

    let resp = pipeline(&client).ask(&store, &schema, "transaction totals", None);

    assert!(resp.outcome.is_failure());
    assert!(resp.anomalies.is_some());
}
