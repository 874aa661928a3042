use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::EmptyCause;

/// Category assigned when the source carries no categorization.
pub const UNCATEGORIZED: &str = "uncategorized";

/// Canonical transaction record every extraction path converges to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(with = "iso_date")]
    pub date: NaiveDate,
    pub description: String,
    /// Negative is an outflow (expense), positive an inflow (income).
    pub amount: f64,
    pub category: String,
    /// Absent until the anomaly engine has scored the set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_anomaly: Option<bool>,
}

impl Transaction {
    pub fn new(
        date: NaiveDate,
        description: impl Into<String>,
        amount: f64,
        category: Option<String>,
    ) -> Self {
        let category = category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| UNCATEGORIZED.to_string());

        Self {
            date,
            description: description.into(),
            amount,
            category,
            is_anomaly: None,
        }
    }

    pub fn is_anomalous(&self) -> bool {
        self.is_anomaly == Some(true)
    }
}

/// Result of one extraction path: records in source order, or an empty set
/// tagged with the reason nothing was found.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionOutcome {
    pub transactions: Vec<Transaction>,
    pub empty_cause: Option<EmptyCause>,
}

impl ExtractionOutcome {
    /// Wraps whatever records survived; an empty vector is recorded as `NoRecords`.
    pub fn found(transactions: Vec<Transaction>) -> Self {
        let empty_cause = if transactions.is_empty() {
            Some(EmptyCause::NoRecords)
        } else {
            None
        };
        Self {
            transactions,
            empty_cause,
        }
    }

    pub fn empty(cause: EmptyCause) -> Self {
        Self {
            transactions: Vec::new(),
            empty_cause: Some(cause),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }
}

/// Payload returned for one processed upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub transactions: Vec<Transaction>,
    pub anomalies: Vec<Transaction>,
    pub insight: String,
}

mod iso_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}
