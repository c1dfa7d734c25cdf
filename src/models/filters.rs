use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Narrowing applied when listing visit records.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisitFilter {
    /// Whitespace-separated keywords; every one must appear in the record.
    pub keywords: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub hospital: Option<String>,
}

impl VisitFilter {
    pub fn keywords(query: impl Into<String>) -> Self {
        Self {
            keywords: Some(query.into()),
            ..Self::default()
        }
    }
}
