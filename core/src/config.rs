use crate::anomaly::AnomalyConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
pub const CONFIG_FILE: &str = "bankql.json";

/// Optional pipeline stages. Both are on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineStages {
    pub topic_guard:   bool,
    pub anomaly_check: bool,
}

impl Default for PipelineStages {
    fn default() -> Self {
        Self { topic_guard: true, anomaly_check: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub data_dir:      PathBuf,
    pub api_url:       String,
    pub model:         String,
    #[serde(skip_serializing)]
    pub api_key:       Option<String>,
    pub timeout_secs:  u64,
    pub history_limit: usize,
    pub export_dir:    PathBuf,
    pub stages:        PipelineStages,
    pub anomaly:       AnomalyConfig,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            data_dir:      PathBuf::from("./data"),
            api_url:       DEFAULT_API_URL.into(),
            model:         DEFAULT_MODEL.into(),
            api_key:       None,
            timeout_secs:  30,
            history_limit: 8,
            export_dir:    PathBuf::from("."),
            stages:        PipelineStages::default(),
            anomaly:       AnomalyConfig::default(),
        }
    }
}

impl AssistantConfig {
    /// Defaults, then `<data_dir>/bankql.json` if present, then the
    /// environment. In tests, use `AssistantConfig::default_test()`.
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/{CONFIG_FILE}");
        let mut config = if std::path::Path::new(&path).exists() {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
            serde_json::from_str::<AssistantConfig>(&content)
                .map_err(|e| anyhow::anyhow!("Invalid {path}: {e}"))?
        } else {
            Self::default()
        };
        config.data_dir = PathBuf::from(data_dir);
        config.apply_env(|k| std::env::var(k).ok())?;
        Ok(config)
    }

    /// Environment overrides. `lookup` is injected so tests need not touch
    /// the process environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(key) = lookup("BANKQL_API_KEY").or_else(|| lookup("GROQ_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(model) = lookup("BANKQL_MODEL") {
            self.model = model;
        }
        if let Some(url) = lookup("BANKQL_API_URL") {
            self.api_url = url;
        }
        if let Some(secs) = lookup("BANKQL_TIMEOUT_SECS") {
            self.timeout_secs = secs
                .parse()
                .map_err(|e| anyhow::anyhow!("BANKQL_TIMEOUT_SECS={secs}: {e}"))?;
        }
        Ok(())
    }

    /// Config with hardcoded defaults for use in tests. No API key.
    pub fn default_test() -> Self {
        Self {
            data_dir: std::env::temp_dir(),
            export_dir: std::env::temp_dir(),
            timeout_secs: 5,
            ..Self::default()
        }
    }
}
