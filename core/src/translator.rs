//! SQL translator — natural language in, one SQL statement out.
//!
//! The translator owns the system prompt and the cleanup of whatever the
//! completion service sends back. It never parses or validates the SQL.
//! The service sits behind `CompletionClient` so the pipeline can run
//! against a scripted fake.

use crate::{
    config::AssistantConfig,
    error::{AssistantError, AssistantResult},
    schema::{BankTable, SchemaDescriptor},
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Exact phrase the model is told to answer with when the question
/// cannot be served from the four tables.
pub const FALLBACK_PHRASE: &str = "Data not available in current banking tables";

/// The completion service could not produce an answer.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("Translation unavailable: {reason}")]
pub struct TranslationUnavailable {
    pub reason: String,
}

/// A chat-completion backend: one system message, one user message,
/// one completion back.
pub trait CompletionClient: Send {
    fn complete(&self, system: &str, user: &str) -> AssistantResult<String>;
}

pub struct SqlTranslator {
    client: Box<dyn CompletionClient>,
}

impl SqlTranslator {
    pub fn new(client: Box<dyn CompletionClient>) -> Self {
        Self { client }
    }

    /// Ask the service for SQL answering `question`. The returned text is
    /// cleaned of markdown fences but otherwise verbatim, including the
    /// fallback phrase.
    pub fn translate(
        &self,
        question: &str,
        schema: &SchemaDescriptor,
    ) -> Result<String, TranslationUnavailable> {
        let system = build_system_prompt(schema);
        let raw = self
            .client
            .complete(&system, question)
            .map_err(|e| TranslationUnavailable { reason: e.to_string() })?;
        Ok(clean_completion(&raw))
    }
}

pub fn build_system_prompt(schema: &SchemaDescriptor) -> String {
    format!(
        "You are a strict SQL assistant for banking data stored in SQLite.\n\
         Your ONLY available tables are:\n\
         \n\
         CUSTOMER({customer})\n\
         ACCOUNT({account})\n\
         LOAN({loan})\n\
         TRANSACTIONS({transactions})\n\
         \n\
         RULES:\n\
         1. Only use these tables/columns.\n\
         2. No invented fields.\n\
         3. Follow relationships:\n   \
            - CUSTOMER.customer_id ↔ ACCOUNT.customer_id\n   \
            - ACCOUNT.account_id ↔ TRANSACTIONS.account_id\n   \
            - CUSTOMER.customer_id ↔ LOAN.customer_id\n\
         4. Return only SQL. No explanation.\n\
         5. If data is not available: respond with EXACT phrase:\n   \
            \"{FALLBACK_PHRASE}\"\n",
        customer = schema.column_list(BankTable::Customer),
        account = schema.column_list(BankTable::Account),
        loan = schema.column_list(BankTable::Loan),
        transactions = schema.column_list(BankTable::Transaction),
    )
}

/// Languages a model may tag its opening fence with.
const FENCE_TAGS: &[&str] = &["sql", "sqlite", "sqlite3", "postgresql", "mysql"];

/// Trim, then drop an opening ```` ``` ```` fence with its optional
/// language tag and a closing ```` ``` ```` fence. Either fence may be missing.
pub fn clean_completion(raw: &str) -> String {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        let tag_len = rest
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(rest.len());
        let (tag, after) = rest.split_at(tag_len);
        let own_line = after.is_empty() || after.starts_with(['\n', '\r']);
        text = if own_line || FENCE_TAGS.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            after
        } else {
            rest
        };
    }
    let text = text.trim();
    text.strip_suffix("```").unwrap_or(text).trim().to_string()
}

/// True when the completion is the model's "cannot answer" reply rather
/// than SQL.
pub fn is_fallback(completion: &str) -> bool {
    completion.to_lowercase().contains("data not available")
}

// ── HTTP client ──────────────────────────────────────────────────────────────

/// OpenAI-compatible `/chat/completions` client.
pub struct ChatCompletionsClient {
    http:    reqwest::blocking::Client,
    api_url: String,
    api_key: Option<String>,
    model:   String,
}

impl ChatCompletionsClient {
    pub fn new(config: &AssistantConfig) -> AssistantResult<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            model:   config.model.clone(),
        })
    }
}

impl CompletionClient for ChatCompletionsClient {
    fn complete(&self, system: &str, user: &str) -> AssistantResult<String> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("API key not configured"))?;

        let payload = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user }
            ],
            "n": 1
        });

        log::debug!("translator: POST {} (model={})", self.api_url, self.model);
        let resp = self
            .http
            .post(&self.api_url)
            .bearer_auth(key)
            .json(&payload)
            .send()?;

        let status = resp.status();
        let body = resp.text()?;
        read_completion(status.as_u16(), &body)
    }
}

/// Pull the first choice's message text out of a chat-completions reply.
pub fn read_completion(status: u16, body: &str) -> AssistantResult<String> {
    if !(200..300).contains(&status) {
        let truncated: String = body.chars().take(300).collect();
        log::warn!("translator: HTTP {status}: {truncated}");
        return Err(anyhow::anyhow!("HTTP {status}: {truncated}").into());
    }

    let data: serde_json::Value = serde_json::from_str(body)?;
    data["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            AssistantError::from(anyhow::anyhow!("completion response has no message content"))
        })
}
