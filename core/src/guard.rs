//! Topic guard — blocks questions about data the bank tables do not hold.
//!
//! RULE: The guard runs before translation. A question it rejects never
//! reaches the completion service.

use serde::Serialize;

/// Denylisted topic keywords, matched as lowercase substrings.
/// The first hit in this order is the one reported.
pub const FORBIDDEN_TOPICS: &[&str] = &[
    "omani", "non omani", "oman", "nationality", "citizen", "country",
    "international", "transfer", "credit card", "visa", "mastercard",
    "salary", "employer", "job", "income", "region", "city", "address",
    "passport", "work", "travel",
];

/// Short hint shown alongside every "data not available" answer.
pub const TRY_ASKING_ABOUT: &str = "customers, accounts, loans, transactions";

/// A group of things the user can ask about.
#[derive(Debug, Clone, Serialize)]
pub struct TopicExamples {
    pub group: &'static str,
    pub items: &'static [&'static str],
}

pub const AVAILABLE_TOPICS: &[TopicExamples] = &[
    TopicExamples { group: "customer",     items: &["customer names", "date of birth", "phone numbers"] },
    TopicExamples { group: "account",      items: &["balances", "account types", "opening dates"] },
    TopicExamples { group: "loan",         items: &["loan amounts", "loan status"] },
    TopicExamples { group: "transactions", items: &["transaction amounts", "dates", "types"] },
    TopicExamples { group: "combined",     items: &["customers with balances", "loans + customer info"] },
];

#[derive(Debug, Clone, Copy, Default)]
pub struct TopicGuard;

impl TopicGuard {
    pub fn new() -> Self {
        Self
    }

    /// First forbidden term contained in `question`, case-insensitive.
    pub fn check(&self, question: &str) -> Option<&'static str> {
        let q = question.to_lowercase();
        FORBIDDEN_TOPICS.iter().copied().find(|term| q.contains(term))
    }
}
