use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::EnvelopeRef;

/// Append-only audit row for cash moved between two envelopes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentTransfer {
    pub id: i64,
    pub budget_month_id: i64,
    pub source: EnvelopeRef,
    pub destination: EnvelopeRef,
    pub amount: Decimal,
    pub notes: Option<String>,
    pub created_by: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub source: EnvelopeRef,
    pub destination: EnvelopeRef,
    pub amount: Decimal,
    pub month: NaiveDate,
    pub notes: Option<String>,
    pub created_by: Option<i64>,
}
