use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::SqliteConnection;

use super::allocations::budget_month_in;
use super::{Ledger, LedgerResult};
use crate::database::db::queries;
use crate::database::models::BudgetMonth;
use crate::util::next_month_start;

/// Household cash for a month that no envelope or reserve has claimed yet,
/// with the terms it is derived from.
#[derive(Debug, Clone, Serialize)]
pub struct ToBeAssigned {
    pub month: NaiveDate,
    pub total_income: Decimal,
    pub opening_balances: Decimal,
    pub income_assigned: Decimal,
    pub account_balance_assigned: Decimal,
    pub savings_reserved: Decimal,
    pub to_be_assigned: Decimal,
}

impl ToBeAssigned {
    fn new(
        month: NaiveDate,
        total_income: Decimal,
        opening_balances: Decimal,
        income_assigned: Decimal,
        account_balance_assigned: Decimal,
        savings_reserved: Decimal,
    ) -> Self {
        Self {
            month,
            total_income,
            opening_balances,
            income_assigned,
            account_balance_assigned,
            savings_reserved,
            to_be_assigned: total_income + opening_balances
                - income_assigned
                - account_balance_assigned
                - savings_reserved,
        }
    }
}

pub(crate) async fn compute_in(
    conn: &mut SqliteConnection,
    household_id: i64,
    budget_month: &BudgetMonth,
) -> LedgerResult<ToBeAssigned> {
    let start = budget_month.month;
    let end = next_month_start(start);

    let total_income: Decimal = queries::list_income_transactions(conn, household_id, start, end)
        .await?
        .iter()
        .map(|t| t.amount)
        .sum();
    let opening_balances = queries::total_active_opening_balances(conn, household_id).await?;
    let income_assigned = queries::total_income_assigned(conn, budget_month.id).await?;
    let account_balance_assigned = queries::total_account_balance_assigned(conn, household_id).await?;
    let savings_reserved: Decimal = queries::reserved_by_transaction(conn, household_id, start, end)
        .await?
        .values()
        .copied()
        .sum();

    Ok(ToBeAssigned::new(
        start,
        total_income,
        opening_balances,
        income_assigned,
        account_balance_assigned,
        savings_reserved,
    ))
}

impl Ledger {
    pub async fn get_to_be_assigned(&self, household_id: i64, month: NaiveDate) -> LedgerResult<ToBeAssigned> {
        let mut tx = self.begin(household_id).await?;
        let budget_month = budget_month_in(&mut tx, household_id, month).await?;
        let tba = compute_in(&mut tx, household_id, &budget_month).await?;
        tx.commit().await?;
        Ok(tba)
    }
}
