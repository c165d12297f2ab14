//! Relational store tests: CSV loading and statement execution.

mod common;

use bankql_core::{
    error::AssistantError,
    schema::BankTable,
    store::{BankStore, Cell},
};

#[test]
fn load_creates_four_tables_and_schema() {
    let dir = common::write_dataset(12, false);
    let (store, schema) = common::load(&dir);

    assert!(schema.is_complete());
    assert_eq!(
        schema.columns(BankTable::Account),
        &["account_id", "customer_id", "account_type", "balance", "open_date"]
    );
    assert_eq!(store.row_count(BankTable::Customer).unwrap(), 5);
    assert_eq!(store.row_count(BankTable::Loan).unwrap(), 3);
    assert_eq!(store.row_count(BankTable::Transaction).unwrap(), 12);
}

#[test]
fn transaction_dataset_lives_in_transactions_table() {
    let dir = common::write_dataset(3, false);
    let (store, _) = common::load(&dir);
    let table = store.execute("SELECT COUNT(*) AS n FROM transactions").unwrap();
    assert_eq!(table.rows[0][0], Cell::Integer(3));
}

#[test]
fn numeric_columns_are_typed() {
    let dir = common::write_dataset(1, false);
    let (store, _) = common::load(&dir);
    let table = store
        .execute("SELECT customer_id, balance FROM account WHERE account_id = 12")
        .unwrap();
    assert_eq!(table.columns, vec!["customer_id", "balance"]);
    assert_eq!(table.rows[0], vec![Cell::Integer(2), Cell::Real(98000.0)]);

    // Numeric comparison works because balance is REAL, not TEXT.
    let rich = store.execute("SELECT account_id FROM account WHERE balance > 3000").unwrap();
    assert_eq!(rich.row_count(), 2);
}

#[test]
fn blank_cells_load_as_null() {
    let dir = common::write_dataset(1, false);
    let (store, _) = common::load(&dir);
    let table = store.execute("SELECT phone FROM customer WHERE customer_id = 4").unwrap();
    assert_eq!(table.rows[0][0], Cell::Null);
}

#[test]
fn syntax_error_carries_engine_message() {
    let dir = common::write_dataset(1, false);
    let (store, _) = common::load(&dir);
    let err = store.execute("SELEC * FROM customer").unwrap_err();
    assert!(!err.message.is_empty());
    assert!(err.message.contains("syntax error"), "message: {}", err.message);
}

#[test]
fn unknown_table_and_column_are_errors() {
    let dir = common::write_dataset(1, false);
    let (store, _) = common::load(&dir);
    let err = store.execute("SELECT * FROM branches").unwrap_err();
    assert!(err.message.contains("no such table"), "message: {}", err.message);
    let err = store.execute("SELECT salary FROM customer").unwrap_err();
    assert!(err.message.contains("no such column"), "message: {}", err.message);
}

#[test]
fn blank_sql_is_an_error_not_an_empty_table() {
    let store = BankStore::in_memory().unwrap();
    let err = store.execute("   ").unwrap_err();
    assert!(!err.message.is_empty());
}

#[test]
fn comment_or_semicolon_only_sql_has_no_statement() {
    let store = BankStore::in_memory().unwrap();
    for sql in ["-- no query possible", ";", " ; ;\n", "/* nothing */ ;"] {
        let err = store.execute(sql).unwrap_err();
        assert_eq!(err.message, "no SQL statement to execute", "sql: {sql:?}");
    }
}

#[test]
fn commented_select_still_runs() {
    let dir = common::write_dataset(1, false);
    let (store, _) = common::load(&dir);
    let table = store
        .execute("-- top customer\nSELECT name FROM customer WHERE customer_id = 1;")
        .unwrap();
    assert_eq!(table.row_count(), 1);
}

#[test]
fn statements_that_change_tables_are_refused() {
    let dir = common::write_dataset(3, false);
    let (store, _) = common::load(&dir);

    for sql in [
        "DELETE FROM customer",
        "DROP TABLE loan",
        "UPDATE account SET balance = 0",
        "INSERT INTO loan VALUES (999, 1, 1, 'active')",
    ] {
        let err = store.execute(sql).unwrap_err();
        assert!(err.message.contains("read-only"), "sql: {sql}, message: {}", err.message);
    }

    assert_eq!(store.row_count(BankTable::Customer).unwrap(), 5);
    assert_eq!(store.row_count(BankTable::Loan).unwrap(), 3);
    let table = store.execute("SELECT SUM(balance) FROM account").unwrap();
    assert!(table.rows[0][0].as_f64().unwrap() > 0.0);
}

#[test]
fn zero_row_query_keeps_columns() {
    let dir = common::write_dataset(1, false);
    let (store, _) = common::load(&dir);
    let table = store.execute("SELECT name FROM customer WHERE customer_id = 999").unwrap();
    assert!(table.is_empty());
    assert_eq!(table.columns, vec!["name"]);
}

#[test]
fn missing_dataset_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("customer.csv"), common::CUSTOMERS).unwrap();
    match BankStore::load(dir.path()) {
        Err(AssistantError::DatasetMissing { table, .. }) => assert_eq!(table, "account"),
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("load should fail without account.csv"),
    }
}

#[test]
fn reloading_a_table_replaces_it() {
    let dir = common::write_dataset(4, false);
    let (store, _) = common::load(&dir);
    let columns = store
        .load_table(BankTable::Loan, "loan_id,customer_id,amount,status\n200,2,10,active\n".as_bytes())
        .unwrap();
    assert_eq!(columns.len(), 4);
    assert_eq!(store.row_count(BankTable::Loan).unwrap(), 1);
}
