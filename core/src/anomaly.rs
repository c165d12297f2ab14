//! Anomaly detector — isolation forest over (amount, hour of day).
//!
//! RULE: Advisory only. The detector reads the transaction table and
//! returns a report; it never touches the primary query result.
//!
//! Model:
//!   - `n_trees` isolation trees, each grown on `max_samples` rows drawn
//!     without replacement, depth capped at ceil(log2(max_samples)).
//!   - Score = -2^(-E[h(x)] / c(n)); lower means more isolated.
//!   - Rows scoring below the `contamination` quantile are flagged.

use crate::{
    error::{AssistantError, AssistantResult},
    rng::DetectorRng,
    store::{Cell, TabularResult},
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Fewer transactions than this and no model is fitted.
pub const MIN_TRANSACTIONS: usize = 50;

/// Columns shown when previewing flagged rows.
pub const PREVIEW_COLUMNS: &[&str] = &["amount", "type", "date"];

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    pub contamination: f64,
    pub n_trees:       usize,
    pub max_samples:   usize,
    pub seed:          u64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            contamination: 0.1,
            n_trees:       100,
            max_samples:   256,
            seed:          42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnomalyReport {
    /// Not enough transactions to fit a model.
    NotComputed { transaction_count: usize },
    Computed {
        transaction_count: usize,
        flagged:           TabularResult,
    },
}

impl AnomalyReport {
    pub fn flagged_count(&self) -> usize {
        match self {
            AnomalyReport::NotComputed { .. }    => 0,
            AnomalyReport::Computed { flagged, .. } => flagged.row_count(),
        }
    }

    /// First `limit` flagged rows, reduced to amount / type / date.
    pub fn preview(&self, limit: usize) -> Option<TabularResult> {
        match self {
            AnomalyReport::NotComputed { .. } => None,
            AnomalyReport::Computed { flagged, .. } => {
                let mut view = flagged.project(PREVIEW_COLUMNS);
                view.rows.truncate(limit);
                Some(view)
            }
        }
    }
}

/// Flag outlying rows of the transaction table.
pub fn detect(transactions: &TabularResult, config: &AnomalyConfig) -> AssistantResult<AnomalyReport> {
    let count = transactions.row_count();
    if count < MIN_TRANSACTIONS {
        log::info!("anomaly: {count} transactions, need {MIN_TRANSACTIONS}; skipped");
        return Ok(AnomalyReport::NotComputed { transaction_count: count });
    }

    let amount_col = transactions
        .column_index("amount")
        .ok_or_else(|| AssistantError::from(anyhow::anyhow!("transactions table has no 'amount' column")))?;
    let date_col = transactions.column_index("date");

    let samples: Vec<Sample> = transactions
        .rows
        .iter()
        .map(|row| {
            let amount = row[amount_col].as_f64().unwrap_or(0.0);
            let hour = date_col
                .and_then(|i| cell_hour(&row[i]))
                .unwrap_or(0) as f64;
            [amount, hour]
        })
        .collect();

    let flags = IsolationForest::fit(&samples, config).predict(&samples, config.contamination);
    let flagged = TabularResult {
        columns: transactions.columns.clone(),
        rows: transactions
            .rows
            .iter()
            .zip(&flags)
            .filter(|(_, is_outlier)| **is_outlier)
            .map(|(row, _)| row.clone())
            .collect(),
    };

    log::info!("anomaly: detected {} unusual transactions of {count}", flagged.row_count());
    Ok(AnomalyReport::Computed { transaction_count: count, flagged })
}

fn cell_hour(cell: &Cell) -> Option<u32> {
    cell.as_str().and_then(hour_of_day)
}

/// Hour component of a date or timestamp string. Bare dates are hour 0.
pub fn hour_of_day(raw: &str) -> Option<u32> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
        "%Y/%m/%d %H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M",
    ];
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%m/%d/%Y"];

    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.hour());
    }
    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
    {
        return Some(dt.hour());
    }
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
        .map(|_| 0)
}

// ── Isolation forest ─────────────────────────────────────────────────────────

pub type Sample = [f64; 2];

#[derive(Debug)]
enum Node {
    Leaf { size: usize },
    Split {
        feature:   usize,
        threshold: f64,
        left:      Box<Node>,
        right:     Box<Node>,
    },
}

#[derive(Debug)]
pub struct IsolationForest {
    trees:       Vec<Node>,
    sample_size: usize,
}

impl IsolationForest {
    pub fn fit(data: &[Sample], config: &AnomalyConfig) -> Self {
        let sample_size = config.max_samples.min(data.len()).max(1);
        let max_depth = (sample_size as f64).log2().ceil().max(1.0) as usize;

        let trees = (0..config.n_trees)
            .map(|t| {
                let mut rng = DetectorRng::for_tree(config.seed, t as u64);
                let idx = rng.sample_indices(data.len(), sample_size);
                grow(data, idx, 0, max_depth, &mut rng)
            })
            .collect();

        Self { trees, sample_size }
    }

    /// Negated anomaly score in (-1, 0]; lower is more anomalous.
    pub fn score(&self, x: &Sample) -> f64 {
        if self.trees.is_empty() {
            return -0.5;
        }
        let mean_path = self
            .trees
            .iter()
            .map(|t| path_length(t, x, 0))
            .sum::<f64>()
            / self.trees.len() as f64;
        let norm = average_path_length(self.sample_size).max(f64::EPSILON);
        -(2f64).powf(-mean_path / norm)
    }

    /// `true` for rows below the `contamination` quantile of scores.
    pub fn predict(&self, data: &[Sample], contamination: f64) -> Vec<bool> {
        let scores: Vec<f64> = data.iter().map(|x| self.score(x)).collect();
        let offset = percentile(&scores, contamination.clamp(0.0, 0.5) * 100.0);
        scores.iter().map(|&s| s < offset).collect()
    }
}

fn grow(data: &[Sample], idx: Vec<usize>, depth: usize, max_depth: usize, rng: &mut DetectorRng) -> Node {
    if depth >= max_depth || idx.len() <= 1 {
        return Node::Leaf { size: idx.len() };
    }

    // Only features that still vary can split this node.
    let ranges: Vec<(usize, f64, f64)> = (0..2)
        .filter_map(|f| {
            let (lo, hi) = idx.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                (lo.min(data[i][f]), hi.max(data[i][f]))
            });
            (hi > lo).then_some((f, lo, hi))
        })
        .collect();
    if ranges.is_empty() {
        return Node::Leaf { size: idx.len() };
    }

    let (feature, lo, hi) = ranges[rng.next_below(ranges.len())];
    let threshold = rng.uniform(lo, hi);
    let (left, right): (Vec<usize>, Vec<usize>) = idx.into_iter().partition(|&i| data[i][feature] < threshold);

    Node::Split {
        feature,
        threshold,
        left:  Box::new(grow(data, left, depth + 1, max_depth, rng)),
        right: Box::new(grow(data, right, depth + 1, max_depth, rng)),
    }
}

fn path_length(node: &Node, x: &Sample, depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split { feature, threshold, left, right } => {
            let next = if x[*feature] < *threshold { left } else { right };
            path_length(next, x, depth + 1)
        }
    }
}

/// Expected path length of an unsuccessful BST search over `n` points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2     => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolated percentile, `q` in [0, 100].
fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}
