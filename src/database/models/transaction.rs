use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Ledger transaction as consumed from the external transaction feed.
/// Positive amounts are income, negative amounts are spending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: i64,
    pub household_id: i64,
    pub category_id: Option<i64>,
    pub amount: Decimal,
    pub transaction_date: NaiveDate,
}

/// How much of an income transaction is still free to assign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionAvailability {
    pub transaction_id: i64,
    pub amount: Decimal,
    pub assigned: Decimal,
    pub reserved: Decimal,
    pub available: Decimal,
}
