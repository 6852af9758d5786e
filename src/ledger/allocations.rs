use chrono::NaiveDate;
use log::{debug, info};
use rust_decimal::Decimal;
use sqlx::SqliteConnection;

use super::{
    check_rollup_rule, normalize_month, refresh_assigned, resolve_envelope, Ledger, LedgerError,
    LedgerResult, MONEY_TOLERANCE,
};
use crate::database::db::queries;
use crate::database::models::{Allocation, BudgetMonth, SetAllocation};
use crate::util::iso;

/// Fetches the household's month, creating it on first touch. A new month
/// inherits the plan of the most recent earlier month that has one.
pub(crate) async fn budget_month_in(
    conn: &mut SqliteConnection,
    household_id: i64,
    month: NaiveDate,
) -> LedgerResult<BudgetMonth> {
    let month = normalize_month(month);
    let created = queries::insert_budget_month_if_missing(conn, household_id, month).await?;
    let budget_month = queries::get_budget_month(conn, household_id, month)
        .await?
        .ok_or_else(|| LedgerError::Internal(format!("budget month {} missing after insert", iso(&month))))?;

    if created {
        match queries::find_prior_month_with_allocations(conn, household_id, month).await? {
            Some(prior_id) => {
                let copied = queries::copy_allocations(conn, prior_id, budget_month.id).await?;
                info!(
                    "household {household_id}: created {} with {copied} allocations carried forward",
                    iso(&month)
                );
            }
            None => debug!("household {household_id}: created empty month {}", iso(&month)),
        }
    }
    Ok(budget_month)
}

impl Ledger {
    pub async fn get_or_create_budget_month(&self, household_id: i64, month: NaiveDate) -> LedgerResult<BudgetMonth> {
        let mut tx = self.begin(household_id).await?;
        let budget_month = budget_month_in(&mut tx, household_id, month).await?;
        tx.commit().await?;
        Ok(budget_month)
    }

    pub async fn update_month_notes(
        &self,
        household_id: i64,
        month: NaiveDate,
        notes: Option<&str>,
    ) -> LedgerResult<BudgetMonth> {
        let mut tx = self.begin(household_id).await?;
        let mut budget_month = budget_month_in(&mut tx, household_id, month).await?;
        queries::update_month_notes(&mut tx, budget_month.id, notes).await?;
        tx.commit().await?;
        budget_month.notes = notes.map(str::to_string);
        Ok(budget_month)
    }

    /// Upserts the plan side of an allocation. Assigned cash is never touched here.
    pub async fn set_allocation(
        &self,
        household_id: i64,
        month: NaiveDate,
        plan: SetAllocation,
    ) -> LedgerResult<Allocation> {
        if plan.allocated_amount < Decimal::ZERO {
            return Err(LedgerError::bad_request(format!(
                "allocated amount cannot be negative, got {}",
                plan.allocated_amount
            )));
        }

        let mut tx = self.begin(household_id).await?;
        let resolved = resolve_envelope(&mut tx, household_id, plan.envelope).await?;
        check_rollup_rule(&resolved, plan.rollup_mode)?;

        let budget_month = budget_month_in(&mut tx, household_id, month).await?;
        match queries::get_allocation_by_envelope(&mut tx, budget_month.id, plan.envelope).await? {
            Some(existing) => queries::update_allocation_plan(&mut tx, existing.id, &plan).await?,
            None => {
                queries::insert_allocation(&mut tx, budget_month.id, &plan).await?;
            }
        }
        // keeps assigned_amount consistent with the rows even for a fresh allocation
        let allocation = refresh_assigned(&mut tx, budget_month.id, plan.envelope).await?;
        tx.commit().await?;

        info!(
            "household {household_id}: planned {} for {} in {}",
            allocation.allocated_amount,
            plan.envelope,
            iso(&budget_month.month)
        );
        Ok(allocation)
    }

    pub async fn get_allocations(&self, household_id: i64, month: NaiveDate) -> LedgerResult<Vec<Allocation>> {
        let mut tx = self.begin(household_id).await?;
        let budget_month = budget_month_in(&mut tx, household_id, month).await?;
        let allocations = queries::list_allocations(&mut tx, budget_month.id).await?;
        tx.commit().await?;
        Ok(allocations)
    }

    /// Removes an allocation that holds no assigned cash.
    pub async fn delete_allocation(&self, household_id: i64, allocation_id: i64) -> LedgerResult<()> {
        let mut tx = self.begin(household_id).await?;
        let allocation = queries::get_allocation_for_household(&mut tx, allocation_id, household_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("allocation {allocation_id}")))?;

        let held = queries::derived_assigned_amount(&mut tx, allocation.budget_month_id, allocation.envelope).await?;
        if held.abs() > MONEY_TOLERANCE {
            return Err(LedgerError::bad_request(format!(
                "allocation {allocation_id} still holds {held} of assigned cash; unassign or transfer it first"
            )));
        }

        queries::delete_allocation(&mut tx, allocation_id).await?;
        tx.commit().await?;
        info!("household {household_id}: deleted allocation {allocation_id}");
        Ok(())
    }
}
