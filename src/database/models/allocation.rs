use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::EnvelopeRef;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub id: i64,
    pub budget_month_id: i64,
    pub envelope: EnvelopeRef,
    pub allocated_amount: Decimal,  // the plan
    pub assigned_amount: Decimal,   // committed cash, derived from assignment and transfer rows
    pub rollup_mode: bool,
    pub notes: Option<String>,
}

impl Allocation {
    /// Plan still waiting for cash; never negative.
    pub fn need(&self) -> Decimal {
        (self.allocated_amount - self.assigned_amount).max(Decimal::ZERO)
    }
}

/// Plan-side fields of an allocation upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetAllocation {
    pub envelope: EnvelopeRef,
    pub allocated_amount: Decimal,
    pub rollup_mode: bool,
    pub notes: Option<String>,
}
