//! Income assignment engine.
//!
//! Requests are funded from the month's unassigned income, oldest
//! transaction first, and fall back to household opening-balance cash only
//! once that pool runs dry. A batch shares one pool: each line draws from
//! what the lines before it left behind.

use chrono::NaiveDate;
use log::{debug, info, warn};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::SqliteConnection;
use std::collections::HashSet;

use super::allocations::budget_month_in;
use super::auto_assign::rank_for_income;
use super::pool::{Draw, IncomePool, OpeningBalancePool, PoolEntry};
use super::summary::envelope_summaries;
use super::to_be_assigned::compute_in;
use super::{
    normalize_month, refresh_assigned, require_positive, resolve_fundable, Ledger, LedgerError,
    LedgerResult, MONEY_TOLERANCE,
};
use crate::database::db::queries;
use crate::database::models::{
    AccountBalanceAssignment, Allocation, AssignmentId, BudgetMonth, EnvelopeAmount, EnvelopeRef,
    IncomeAssignment, TransactionAvailability,
};
use crate::util::{iso, month_start, next_month_start};

/// Rows written by one assignment request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AssignmentOutcome {
    pub budget_month_id: i64,
    pub income_assignments: Vec<IncomeAssignment>,
    pub account_balance_assignments: Vec<AccountBalanceAssignment>,
    pub allocations: Vec<Allocation>,
    pub total_assigned: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthAssignments {
    pub budget_month: BudgetMonth,
    pub income_assignments: Vec<IncomeAssignment>,
    pub account_balance_assignments: Vec<AccountBalanceAssignment>,
}

/// How one requested line will be funded.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopePlan {
    pub envelope: EnvelopeRef,
    pub draws: Vec<Draw>,
    pub from_opening_balance: Decimal,
}

impl EnvelopePlan {
    pub fn total(&self) -> Decimal {
        self.draws.iter().map(|d| d.amount).sum::<Decimal>() + self.from_opening_balance
    }
}

/// Plans every line against the shared pools, in listing order. Fails when
/// a line cannot be covered within a cent; nothing is written either way.
pub fn plan_batch(
    requests: &[EnvelopeAmount],
    income: &mut IncomePool,
    opening: &mut OpeningBalancePool,
) -> LedgerResult<Vec<EnvelopePlan>> {
    let requested: Decimal = requests.iter().map(|r| r.amount).sum();
    let available = income.total_available() + opening.available();
    let mut plans = Vec::with_capacity(requests.len());

    for req in requests {
        let (draws, shortfall) = income.draw(req.amount);
        let mut from_opening_balance = Decimal::ZERO;
        if shortfall > Decimal::ZERO {
            from_opening_balance = opening.take(shortfall);
            if shortfall - from_opening_balance > MONEY_TOLERANCE {
                return Err(LedgerError::InsufficientFunds { requested, available });
            }
        }
        debug!(
            "planned {} for {}: {} income draws, {} from opening balances",
            req.amount,
            req.envelope,
            draws.len(),
            from_opening_balance
        );
        plans.push(EnvelopePlan {
            envelope: req.envelope,
            draws,
            from_opening_balance,
        });
    }
    Ok(plans)
}

/// Unassigned, unreserved income dated in the month.
pub(crate) async fn load_income_pool(
    conn: &mut SqliteConnection,
    household_id: i64,
    month: NaiveDate,
) -> LedgerResult<IncomePool> {
    let (start, end) = (month_start(month), next_month_start(month));
    let transactions = queries::list_income_transactions(conn, household_id, start, end).await?;
    let assigned = queries::assigned_by_transaction(conn, household_id, start, end).await?;
    let reserved = queries::reserved_by_transaction(conn, household_id, start, end).await?;

    let entries = transactions
        .into_iter()
        .map(|t| {
            let used = assigned.get(&t.id).copied().unwrap_or_default()
                + reserved.get(&t.id).copied().unwrap_or_default();
            PoolEntry {
                transaction_id: t.id,
                transaction_date: t.transaction_date,
                available: t.amount - used,
            }
        })
        .collect();
    Ok(IncomePool::new(entries))
}

pub(crate) async fn load_opening_pool(
    conn: &mut SqliteConnection,
    household_id: i64,
) -> LedgerResult<OpeningBalancePool> {
    let balances = queries::total_active_opening_balances(conn, household_id).await?;
    let assigned = queries::total_account_balance_assigned(conn, household_id).await?;
    Ok(OpeningBalancePool::new(balances - assigned))
}

/// Validates, plans and writes a batch inside the caller's unit of work.
pub(crate) async fn assign_in(
    conn: &mut SqliteConnection,
    household_id: i64,
    budget_month: &BudgetMonth,
    requests: &[EnvelopeAmount],
    check_to_be_assigned: bool,
) -> LedgerResult<AssignmentOutcome> {
    if requests.is_empty() {
        return Err(LedgerError::bad_request("assignment batch is empty"));
    }
    for req in requests {
        require_positive(req.amount, "assignment amount")?;
        resolve_fundable(conn, household_id, req.envelope).await?;
    }

    if check_to_be_assigned {
        let requested: Decimal = requests.iter().map(|r| r.amount).sum();
        let tba = compute_in(conn, household_id, budget_month).await?;
        if requested > tba.to_be_assigned + MONEY_TOLERANCE {
            warn!(
                "household {household_id}: batch of {requested} exceeds to-be-assigned {}",
                tba.to_be_assigned
            );
            return Err(LedgerError::InsufficientFunds {
                requested,
                available: tba.to_be_assigned,
            });
        }
    }

    let mut income = load_income_pool(conn, household_id, budget_month.month).await?;
    let mut opening = load_opening_pool(conn, household_id).await?;
    let plans = plan_batch(requests, &mut income, &mut opening).map_err(|e| {
        warn!("household {household_id}: assignment rejected: {e}");
        e
    })?;

    commit_plans(conn, household_id, budget_month, &plans).await
}

async fn commit_plans(
    conn: &mut SqliteConnection,
    household_id: i64,
    budget_month: &BudgetMonth,
    plans: &[EnvelopePlan],
) -> LedgerResult<AssignmentOutcome> {
    let mut outcome = AssignmentOutcome {
        budget_month_id: budget_month.id,
        ..AssignmentOutcome::default()
    };
    let mut touched: Vec<EnvelopeRef> = Vec::new();
    let mut seen = HashSet::new();

    for plan in plans {
        for draw in &plan.draws {
            let row = queries::insert_income_assignment(
                conn,
                budget_month.id,
                draw.transaction_id,
                plan.envelope,
                draw.amount,
            )
            .await?;
            outcome.income_assignments.push(row);
        }
        if plan.from_opening_balance > Decimal::ZERO {
            let row = queries::insert_account_balance_assignment(
                conn,
                household_id,
                budget_month.id,
                plan.envelope,
                plan.from_opening_balance,
            )
            .await?;
            outcome.account_balance_assignments.push(row);
        }
        outcome.total_assigned += plan.total();
        if seen.insert(plan.envelope) {
            touched.push(plan.envelope);
        }
    }

    for envelope in touched {
        outcome.allocations.push(refresh_assigned(conn, budget_month.id, envelope).await?);
    }
    Ok(outcome)
}

impl Ledger {
    /// Commits `amount` of cash to one envelope for the month.
    pub async fn create_assignment(
        &self,
        household_id: i64,
        month: NaiveDate,
        envelope: EnvelopeRef,
        amount: Decimal,
    ) -> LedgerResult<AssignmentOutcome> {
        let mut tx = self.begin(household_id).await?;
        let budget_month = budget_month_in(&mut tx, household_id, month).await?;
        let outcome = assign_in(
            &mut tx,
            household_id,
            &budget_month,
            &[EnvelopeAmount { envelope, amount }],
            false,
        )
        .await?;
        tx.commit().await?;

        info!(
            "household {household_id}: assigned {} to {envelope} in {}",
            outcome.total_assigned,
            iso(&budget_month.month)
        );
        Ok(outcome)
    }

    /// Funds several envelopes from one shared pool. The whole batch is
    /// refused up front when it asks for more than is left to assign.
    pub async fn assign_to_categories(
        &self,
        household_id: i64,
        month: NaiveDate,
        requests: &[EnvelopeAmount],
    ) -> LedgerResult<AssignmentOutcome> {
        let mut tx = self.begin(household_id).await?;
        let budget_month = budget_month_in(&mut tx, household_id, month).await?;
        let outcome = assign_in(&mut tx, household_id, &budget_month, requests, true).await?;
        tx.commit().await?;

        info!(
            "household {household_id}: assigned {} across {} envelopes in {}",
            outcome.total_assigned,
            requests.len(),
            iso(&budget_month.month)
        );
        Ok(outcome)
    }

    /// Spreads one income transaction over underfunded envelopes: largest
    /// plans first, and among equal plans the least funded first.
    pub async fn auto_assign_income(&self, household_id: i64, transaction_id: i64) -> LedgerResult<AssignmentOutcome> {
        let mut tx = self.begin(household_id).await?;
        let transaction = queries::get_transaction(&mut tx, transaction_id, household_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("transaction {transaction_id}")))?;
        if transaction.amount <= Decimal::ZERO {
            return Err(LedgerError::bad_request(format!(
                "transaction {transaction_id} is not income"
            )));
        }

        let budget_month = budget_month_in(&mut tx, household_id, transaction.transaction_date).await?;
        let used = queries::assigned_for_transaction(&mut tx, transaction_id).await?
            + queries::reserved_for_transaction(&mut tx, transaction_id).await?;
        let mut remaining = transaction.amount - used;

        let mut outcome = AssignmentOutcome {
            budget_month_id: budget_month.id,
            ..AssignmentOutcome::default()
        };
        if remaining <= MONEY_TOLERANCE {
            debug!("transaction {transaction_id} is already fully assigned");
            tx.commit().await?;
            return Ok(outcome);
        }

        let envelopes = envelope_summaries(&mut tx, household_id, &budget_month).await?;
        let mut requests = Vec::new();
        for candidate in rank_for_income(envelopes) {
            if remaining <= Decimal::ZERO {
                break;
            }
            let amount = candidate.need.min(remaining);
            remaining -= amount;
            requests.push(EnvelopeAmount {
                envelope: candidate.envelope,
                amount,
            });
        }

        if !requests.is_empty() {
            let mut income = IncomePool::new(vec![PoolEntry {
                transaction_id,
                transaction_date: transaction.transaction_date,
                available: transaction.amount - used,
            }]);
            let mut no_opening = OpeningBalancePool::new(Decimal::ZERO);
            let plans = plan_batch(&requests, &mut income, &mut no_opening)?;
            outcome = commit_plans(&mut tx, household_id, &budget_month, &plans).await?;
        }
        tx.commit().await?;

        info!(
            "household {household_id}: auto-assigned {} of transaction {transaction_id} across {} envelopes",
            outcome.total_assigned,
            outcome.allocations.len()
        );
        Ok(outcome)
    }

    /// Removes an assignment and re-derives the allocation it funded.
    pub async fn delete_assignment(&self, household_id: i64, assignment: AssignmentId) -> LedgerResult<Allocation> {
        let mut tx = self.begin(household_id).await?;
        let (budget_month_id, envelope, amount) = match assignment {
            AssignmentId::Income(id) => {
                let row = queries::get_income_assignment(&mut tx, id, household_id)
                    .await?
                    .ok_or_else(|| LedgerError::not_found(format!("income assignment {id}")))?;
                (row.budget_month_id, row.envelope, row.amount)
            }
            AssignmentId::AccountBalance(id) => {
                let row = queries::get_account_balance_assignment(&mut tx, id, household_id)
                    .await?
                    .ok_or_else(|| LedgerError::not_found(format!("account balance assignment {id}")))?;
                (row.budget_month_id, row.envelope, row.amount)
            }
        };

        let held = queries::derived_assigned_amount(&mut tx, budget_month_id, envelope).await?;
        if held - amount < -MONEY_TOLERANCE {
            return Err(LedgerError::bad_request(format!(
                "{envelope} holds only {held}; move cash back before removing an assignment of {amount}"
            )));
        }

        match assignment {
            AssignmentId::Income(id) => queries::delete_income_assignment(&mut tx, id).await?,
            AssignmentId::AccountBalance(id) => queries::delete_account_balance_assignment(&mut tx, id).await?,
        };
        let allocation = refresh_assigned(&mut tx, budget_month_id, envelope).await?;
        tx.commit().await?;

        info!("household {household_id}: removed {assignment:?} ({amount}) from {envelope}");
        Ok(allocation)
    }

    pub async fn list_assignments(&self, household_id: i64, month: NaiveDate) -> LedgerResult<MonthAssignments> {
        let mut tx = self.begin(household_id).await?;
        let budget_month = budget_month_in(&mut tx, household_id, normalize_month(month)).await?;
        let income_assignments = queries::list_income_assignments(&mut tx, budget_month.id).await?;
        let account_balance_assignments = queries::list_account_balance_assignments(&mut tx, budget_month.id).await?;
        tx.commit().await?;
        Ok(MonthAssignments {
            budget_month,
            income_assignments,
            account_balance_assignments,
        })
    }

    pub async fn transaction_availability(
        &self,
        household_id: i64,
        transaction_id: i64,
    ) -> LedgerResult<TransactionAvailability> {
        let mut conn = self.pool.acquire().await?;
        let transaction = queries::get_transaction(&mut conn, transaction_id, household_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("transaction {transaction_id}")))?;
        let assigned = queries::assigned_for_transaction(&mut conn, transaction_id).await?;
        let reserved = queries::reserved_for_transaction(&mut conn, transaction_id).await?;
        Ok(TransactionAvailability {
            transaction_id,
            amount: transaction.amount,
            assigned,
            reserved,
            available: (transaction.amount - assigned - reserved).max(Decimal::ZERO),
        })
    }
}
