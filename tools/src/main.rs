//! bankql: ask natural-language questions about the banking tables.
//!
//! Usage:
//!   bankql --data-dir ./data                          (interactive)
//!   bankql --data-dir ./data --ask "top 5 balances"   (one-shot)
//!   bankql --data-dir ./data --ipc-mode               (JSON lines on stdio)
//!
//! Flags: --allowlist <csv>  --no-guard  --no-anomaly  --export

use anyhow::Result;
use bankql_core::{
    anomaly::AnomalyReport,
    config::AssistantConfig,
    engine::BankAssistant,
    guard::AVAILABLE_TOPICS,
    pipeline::{PipelineResponse, QueryOutcome},
    store::TabularResult,
};
use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// Rows printed for a result table before truncating.
const DISPLAY_ROWS: usize = 50;
/// Flagged transactions shown under the anomaly check.
const ANOMALY_PREVIEW_ROWS: usize = 10;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Ask { question: String },
    UploadAllowlist { path: String },
    ClearAllowlist,
    History,
    ClearHistory,
    Rerun { index: usize },
    Export { dir: Option<String> },
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = has_flag(&args, "--ipc-mode");
    let data_dir = string_arg(&args, "--data-dir").unwrap_or_else(|| "./data".into());

    let mut config = AssistantConfig::load(&data_dir)?;
    if has_flag(&args, "--no-guard") {
        config.stages.topic_guard = false;
    }
    if has_flag(&args, "--no-anomaly") {
        config.stages.anomaly_check = false;
    }

    if !ipc_mode {
        println!("bankql — banking SQL assistant");
        println!("  data_dir:  {}", config.data_dir.display());
        println!("  model:     {}", config.model);
        println!("  guard:     {}", config.stages.topic_guard);
        println!("  anomalies: {}", config.stages.anomaly_check);
        println!();
    }

    let mut assistant = BankAssistant::build(config)?;

    if let Some(path) = string_arg(&args, "--allowlist") {
        let file = std::fs::File::open(&path)?;
        let list = assistant.upload_allowlist(file)?;
        if !ipc_mode {
            println!("Restricting results to {} customers from {path}", list.len());
        }
    }

    if ipc_mode {
        run_ipc_loop(&mut assistant)?;
    } else if let Some(question) = string_arg(&args, "--ask") {
        let response = assistant.ask(&question);
        print_response(&response);
        if has_flag(&args, "--export") && response.outcome.table().is_some() {
            let path = assistant.export_last(None)?;
            println!("Saved: {}", path.display());
        }
    } else {
        run_interactive(&mut assistant)?;
    }

    Ok(())
}

fn run_ipc_loop(assistant: &mut BankAssistant) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("ipc: unreadable command: {e}");
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };

        let reply = match cmd {
            IpcCommand::Quit => break,
            IpcCommand::Ask { question } => serde_json::to_value(assistant.ask(&question))?,
            IpcCommand::Rerun { index } => match assistant.rerun(index) {
                Some(response) => serde_json::to_value(response)?,
                None => serde_json::json!({ "error": format!("no history entry {index}") }),
            },
            IpcCommand::UploadAllowlist { path } => {
                match std::fs::File::open(&path)
                    .map_err(Into::into)
                    .and_then(|f| assistant.upload_allowlist(f).map(|l| l.len()))
                {
                    Ok(count) => serde_json::json!({ "ok": true, "customer_ids": count }),
                    Err(e) => serde_json::json!({ "error": e.to_string() }),
                }
            }
            IpcCommand::ClearAllowlist => {
                assistant.clear_allowlist();
                serde_json::json!({ "ok": true })
            }
            IpcCommand::History => serde_json::json!({ "history": assistant.recent_queries() }),
            IpcCommand::ClearHistory => {
                assistant.clear_history();
                serde_json::json!({ "ok": true })
            }
            IpcCommand::Export { dir } => match assistant.export_last(dir.map(PathBuf::from)) {
                Ok(path) => serde_json::json!({ "ok": true, "path": path }),
                Err(e) => serde_json::json!({ "error": e.to_string() }),
            },
        };
        writeln!(stdout, "{}", reply)?;
        stdout.flush()?;
    }
    Ok(())
}

fn run_interactive(assistant: &mut BankAssistant) -> Result<()> {
    println!("Ask a question, or :help for commands.");
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut line = String::new();

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let (cmd, rest) = input.split_once(' ').unwrap_or((input, ""));
        match cmd {
            ":quit" | ":q" => break,
            ":help" => print_help(),
            ":upload" => match std::fs::File::open(rest.trim()) {
                Ok(file) => match assistant.upload_allowlist(file) {
                    Ok(list) => println!("Restricting results to {} customers", list.len()),
                    Err(e) => println!("Upload failed: {e}"),
                },
                Err(e) => println!("Cannot open {}: {e}", rest.trim()),
            },
            ":clear-allowlist" => {
                assistant.clear_allowlist();
                println!("Allow-list cleared");
            }
            ":history" => print_history(assistant),
            ":clear-history" => {
                assistant.clear_history();
                println!("History cleared");
            }
            ":rerun" => match rest.trim().parse::<usize>().ok().and_then(|i| assistant.rerun(i)) {
                Some(response) => print_response(&response),
                None => println!("No such history entry"),
            },
            ":export" => match assistant.export_last(None) {
                Ok(path) => println!("Saved: {}", path.display()),
                Err(e) => println!("{e}"),
            },
            _ => print_response(&assistant.ask(input)),
        }
    }
    Ok(())
}

fn print_help() {
    println!("  :upload <csv>       restrict results to the file's customer_id column");
    println!("  :clear-allowlist    remove the restriction");
    println!("  :history            recent queries");
    println!("  :rerun <n>          ask history entry n again");
    println!("  :export             save the last table as CSV");
    println!("  :clear-history");
    println!("  :quit");
}

fn print_history(assistant: &BankAssistant) {
    let recent = assistant.recent_queries();
    if recent.is_empty() {
        println!("(no queries yet)");
        return;
    }
    println!("=== RECENT QUERIES ===");
    for (i, entry) in recent.iter().enumerate() {
        println!("  [{i}] {}", entry.label());
        if let Some(sql) = &entry.sql {
            println!("      {sql}");
        }
    }
}

fn print_response(response: &PipelineResponse) {
    if let Some(sql) = &response.sql {
        println!("=== GENERATED SQL ===");
        println!("{sql}");
        println!();
    }

    println!("=== RESULTS ===");
    match &response.outcome {
        QueryOutcome::Rows { table } => {
            print_table(table, DISPLAY_ROWS);
            println!("({} rows)", table.row_count());
        }
        QueryOutcome::NoResults { .. } => {
            println!("No results found. Try adjusting your question.");
        }
        QueryOutcome::DataNotAvailable(info) => {
            println!("Data Not Available: {}", info.reason.message());
            println!("Try asking about: {}", info.try_asking_about);
            for topic in AVAILABLE_TOPICS {
                println!("  {}: {}", topic.group.to_uppercase(), topic.items.join(", "));
            }
        }
        QueryOutcome::Failed { error } => {
            println!("Error: {error}");
        }
    }

    if let Some(report) = &response.anomalies {
        println!();
        println!("=== QUICK ANOMALY CHECK ===");
        match report {
            AnomalyReport::NotComputed { transaction_count } => {
                println!("Not enough data for anomaly detection ({transaction_count} transactions).");
            }
            AnomalyReport::Computed { .. } if report.flagged_count() == 0 => {
                println!("No suspicious patterns found");
            }
            AnomalyReport::Computed { .. } => {
                println!("Detected {} unusual transactions", report.flagged_count());
                if let Some(preview) = report.preview(ANOMALY_PREVIEW_ROWS) {
                    print_table(&preview, ANOMALY_PREVIEW_ROWS);
                }
            }
        }
    }
    println!();
}

fn print_table(table: &TabularResult, max_rows: usize) {
    let shown: Vec<Vec<String>> = table
        .rows
        .iter()
        .take(max_rows)
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect();
    let widths: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            shown
                .iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(c.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let fmt_row = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, &w)| format!("{c:<w$}"))
            .collect::<Vec<_>>()
            .join(" | ")
    };
    println!("{}", fmt_row(&table.columns));
    println!("{}", widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-"));
    for row in &shown {
        println!("{}", fmt_row(row));
    }
    if table.row_count() > max_rows {
        println!("... {} more rows", table.row_count() - max_rows);
    }
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn string_arg(args: &[String], flag: &str) -> Option<String> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].clone())
}
