use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::SqliteConnection;
use std::collections::HashMap;

use super::allocations::budget_month_in;
use super::to_be_assigned::{compute_in, ToBeAssigned};
use super::{resolve_envelope, Ledger, LedgerError, LedgerResult};
use crate::database::db::queries;
use crate::database::models::{BudgetMonth, EnvelopeRef};
use crate::util::next_month_start;

#[derive(Debug, Clone, Serialize)]
pub struct EnvelopeSummary {
    pub allocation_id: i64,
    pub envelope: EnvelopeRef,
    pub section_id: i64,
    pub is_income: bool,
    pub rollup_mode: bool,
    pub allocated: Decimal,
    pub assigned: Decimal,
    pub spent: Decimal,
    pub available: Decimal,     // assigned - spent
    pub need: Decimal,          // max(allocated - assigned, 0)
}

#[derive(Debug, Clone, Serialize)]
pub struct BudgetSummary {
    pub budget_month: BudgetMonth,
    pub envelopes: Vec<EnvelopeSummary>,
    pub total_allocated: Decimal,
    pub total_assigned: Decimal,
    pub total_spent: Decimal,
    pub total_need: Decimal,
    pub to_be_assigned: ToBeAssigned,
}

fn spent_for(spending: &HashMap<(i64, i64), Decimal>, envelope: EnvelopeRef) -> Decimal {
    spending
        .iter()
        .filter(|((category_id, section_id), _)| match envelope {
            EnvelopeRef::Category(id) => *category_id == id,
            EnvelopeRef::Section(id) => *section_id == id,
        })
        .map(|(_, amount)| *amount)
        .sum()
}

/// Spending charged to the envelope in the month; rollups count every category of the section.
pub(crate) async fn envelope_spent(
    conn: &mut SqliteConnection,
    household_id: i64,
    envelope: EnvelopeRef,
    month: NaiveDate,
) -> LedgerResult<Decimal> {
    let spending = queries::spending_by_category(conn, household_id, month, next_month_start(month)).await?;
    Ok(spent_for(&spending, envelope))
}

pub(crate) async fn envelope_summaries(
    conn: &mut SqliteConnection,
    household_id: i64,
    budget_month: &BudgetMonth,
) -> LedgerResult<Vec<EnvelopeSummary>> {
    let allocations = queries::list_allocations(conn, budget_month.id).await?;
    let spending = queries::spending_by_category(
        conn,
        household_id,
        budget_month.month,
        next_month_start(budget_month.month),
    )
    .await?;

    let mut summaries = Vec::with_capacity(allocations.len());
    for allocation in allocations {
        let resolved = resolve_envelope(conn, household_id, allocation.envelope)
            .await
            .map_err(|e| match e {
                LedgerError::NotFound(what) => {
                    LedgerError::Internal(format!("allocation {} points at missing {what}", allocation.id))
                }
                other => other,
            })?;
        let spent = spent_for(&spending, allocation.envelope);
        summaries.push(EnvelopeSummary {
            allocation_id: allocation.id,
            envelope: allocation.envelope,
            section_id: resolved.section_id,
            is_income: resolved.is_income,
            rollup_mode: allocation.rollup_mode,
            allocated: allocation.allocated_amount,
            assigned: allocation.assigned_amount,
            spent,
            available: allocation.assigned_amount - spent,
            need: allocation.need(),
        });
    }
    Ok(summaries)
}

impl Ledger {
    pub async fn get_budget_summary(&self, household_id: i64, month: NaiveDate) -> LedgerResult<BudgetSummary> {
        let mut tx = self.begin(household_id).await?;
        let budget_month = budget_month_in(&mut tx, household_id, month).await?;
        let envelopes = envelope_summaries(&mut tx, household_id, &budget_month).await?;
        let to_be_assigned = compute_in(&mut tx, household_id, &budget_month).await?;
        tx.commit().await?;

        Ok(BudgetSummary {
            total_allocated: envelopes.iter().map(|e| e.allocated).sum(),
            total_assigned: envelopes.iter().map(|e| e.assigned).sum(),
            total_spent: envelopes.iter().map(|e| e.spent).sum(),
            total_need: envelopes.iter().filter(|e| !e.is_income).map(|e| e.need).sum(),
            budget_month,
            envelopes,
            to_be_assigned,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rollup_spending_covers_the_whole_section() {
        let mut spending = HashMap::new();
        spending.insert((1, 10), Decimal::new(25, 0));
        spending.insert((2, 10), Decimal::new(15, 0));
        spending.insert((3, 20), Decimal::new(40, 0));

        assert_eq!(spent_for(&spending, EnvelopeRef::Section(10)), Decimal::new(40, 0));
        assert_eq!(spent_for(&spending, EnvelopeRef::Category(3)), Decimal::new(40, 0));
        assert_eq!(spent_for(&spending, EnvelopeRef::Category(9)), Decimal::ZERO);
    }
}
