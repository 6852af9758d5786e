use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// "Extra money" held back from an income transaction without funding an envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavingsReserve {
    pub id: i64,
    pub household_id: i64,
    pub transaction_id: i64,
    pub amount: Decimal,
    pub notes: Option<String>,
}
