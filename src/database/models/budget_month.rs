use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetMonth {
    pub id: i64,
    pub household_id: i64,
    pub month: NaiveDate,       // always the first day of the month
    pub notes: Option<String>,
}
