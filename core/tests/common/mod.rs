//! Shared fixtures: CSV datasets on disk and a scripted completion client.

#![allow(dead_code)]

use bankql_core::{
    config::AssistantConfig,
    engine::BankAssistant,
    error::AssistantResult,
    schema::SchemaDescriptor,
    store::BankStore,
    translator::CompletionClient,
};
use std::{
    fs,
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};
use tempfile::TempDir;

pub const CUSTOMERS: &str = "\
customer_id,name,date_of_birth,phone
1,Aisha Rahman,1980-04-12,555-0101
2,Ben Carter,1975-09-30,555-0102
3,Chen Wei,1992-01-05,555-0103
4,Dana Ortiz,1988-07-21,
5,Emil Novak,1969-11-02,555-0105
";

pub const ACCOUNTS: &str = "\
account_id,customer_id,account_type,balance,open_date
10,1,savings,2500.50,2019-03-01
11,1,checking,120.00,2020-06-15
12,2,savings,98000.00,2015-01-20
13,3,checking,0,2022-11-11
14,5,savings,4300.75,2018-08-08
";

pub const LOANS: &str = "\
loan_id,customer_id,amount,status
100,1,15000,active
101,3,5000,closed
102,5,250000,active
";

/// `count` ordinary transactions spread over accounts 10–14, business
/// hours, amounts 20–120. `with_outlier` adds one huge 3 a.m. payment.
pub fn transactions_csv(count: usize, with_outlier: bool) -> String {
    let mut csv = String::from("transaction_id,account_id,amount,type,date\n");
    for i in 0..count {
        let account = 10 + (i % 5);
        let amount = 20.0 + (i % 11) as f64 * 10.0;
        let kind = if i % 2 == 0 { "debit" } else { "credit" };
        let hour = 9 + (i % 8);
        let day = 1 + (i % 28);
        csv.push_str(&format!(
            "{},{account},{amount:.2},{kind},2024-03-{day:02} {hour:02}:15:00\n",
            1000 + i
        ));
    }
    if with_outlier {
        csv.push_str(&format!(
            "{},12,950000.00,debit,2024-03-15 03:05:00\n",
            1000 + count
        ));
    }
    csv
}

/// Route library logs through the test harness; `RUST_LOG` picks the level.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Write the four datasets into a fresh temp dir.
pub fn write_dataset(transaction_count: usize, with_outlier: bool) -> TempDir {
    init_logging();
    let dir = tempfile::tempdir().expect("temp dir");
    write_files(dir.path(), &transactions_csv(transaction_count, with_outlier));
    dir
}

pub fn write_files(dir: &Path, transactions: &str) {
    fs::write(dir.join("customer.csv"), CUSTOMERS).expect("customer.csv");
    fs::write(dir.join("account.csv"), ACCOUNTS).expect("account.csv");
    fs::write(dir.join("loan.csv"), LOANS).expect("loan.csv");
    fs::write(dir.join("transaction.csv"), transactions).expect("transaction.csv");
}

pub fn load(dir: &TempDir) -> (BankStore, SchemaDescriptor) {
    BankStore::load(dir.path()).expect("load dataset")
}

// ── Scripted completion client ───────────────────────────────────────────────

/// Replies with a fixed completion (or fails) and records every prompt.
#[derive(Clone)]
pub struct ScriptedClient {
    reply:   Result<String, String>,
    pub calls:   Arc<AtomicUsize>,
    pub prompts: Arc<Mutex<Vec<(String, String)>>>,
}

impl ScriptedClient {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply:   Ok(reply.to_string()),
            calls:   Arc::new(AtomicUsize::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            reply: Err(reason.to_string()),
            ..Self::replying("")
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_user_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().map(|(_, u)| u.clone())
    }

    pub fn last_system_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().map(|(s, _)| s.clone())
    }
}

impl CompletionClient for ScriptedClient {
    fn complete(&self, system: &str, user: &str) -> AssistantResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap()
            .push((system.to_string(), user.to_string()));
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(reason) => Err(anyhow::anyhow!("{reason}").into()),
        }
    }
}

/// Assistant over the fixture dataset with a scripted client.
pub fn assistant(dir: &TempDir, client: ScriptedClient) -> BankAssistant {
    let (store, schema) = load(dir);
    let mut config = AssistantConfig::default_test();
    config.data_dir = dir.path().to_path_buf();
    config.export_dir = dir.path().to_path_buf();
    BankAssistant::new(config, store, schema, Box::new(client))
}
