// Budget API response types.
// Defines the yearly expense distribution payload returned by the finance API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Yearly expense distribution, keyed by zero-padded month ("01".."12").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetPayload {
    /// Per-month data. Month payloads are passed through untouched.
    #[serde(rename = "dados_mensais", default)]
    pub monthly_data: BTreeMap<String, Value>,
    /// Months that have recorded entries.
    #[serde(rename = "meses_disponiveis", alias = "meses_disponeis", default)]
    pub available_months: Vec<String>,
    /// Historical series used by dashboard charts.
    #[serde(rename = "hist_data", default)]
    pub history: Value,
}

impl BudgetPayload {
    /// Month data for a 1-based month number.
    pub fn month(&self, month: u32) -> Option<&Value> {
        self.monthly_data.get(&month_key(month))
    }

    /// Whether a 1-based month appears in the available months list.
    pub fn has_month(&self, month: u32) -> bool {
        let key = month_key(month);
        self.available_months.iter().any(|m| *m == key)
    }
}

/// Zero-padded month key ("01".."12").
pub fn month_key(month: u32) -> String {
    format!("{:02}", month)
}
