use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::EnvelopeRef;

/// Cash from one income transaction committed to one envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomeAssignment {
    pub id: i64,
    pub budget_month_id: i64,
    pub transaction_id: i64,
    pub envelope: EnvelopeRef,
    pub amount: Decimal,
}

/// Cash from pre-existing account balances committed to one envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountBalanceAssignment {
    pub id: i64,
    pub household_id: i64,
    pub budget_month_id: i64,
    pub envelope: EnvelopeRef,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "id", rename_all = "snake_case")]
pub enum AssignmentId {
    Income(i64),
    AccountBalance(i64),
}

/// One line of an assignment request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeAmount {
    pub envelope: EnvelopeRef,
    pub amount: Decimal,
}
