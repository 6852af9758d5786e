//! Envelope-budget ledger.
//!
//! `Ledger` is the service boundary: every public method is one atomic unit
//! of work against the SQLite store. Mutations open a database transaction
//! and first bump the household's ledger version, which takes the write lock
//! before any balance is read; an error simply drops the transaction.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{Pool, Sqlite, SqliteConnection, Transaction};

use crate::database::db::queries;
use crate::database::models::{Allocation, EnvelopeRef, SectionType, SetAllocation};
use crate::util::month_start;

pub mod allocations;
pub mod assignment;
pub mod auto_assign;
pub mod error;
pub mod pool;
pub mod reserve;
pub mod summary;
pub mod to_be_assigned;
pub mod transfer;

pub use assignment::{AssignmentOutcome, MonthAssignments};
pub use auto_assign::{AutoAssignOutcome, FillMode, FillPlan};
pub use error::{ErrorKind, LedgerError, LedgerResult};
pub use summary::{BudgetSummary, EnvelopeSummary};
pub use to_be_assigned::ToBeAssigned;
pub use transfer::TransferOutcome;

/// Cent-level tolerance for every money comparison.
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Residual need below which the FIFO walk counts an envelope as funded.
pub const FIFO_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

#[derive(Clone)]
pub struct Ledger {
    pool: Pool<Sqlite>,
}

impl Ledger {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Opens a unit of work holding the household's write lock.
    async fn begin(&self, household_id: i64) -> LedgerResult<Transaction<'static, Sqlite>> {
        let mut tx = self.pool.begin().await?;
        if !queries::lock_household(&mut tx, household_id).await? {
            return Err(LedgerError::not_found(format!("household {household_id}")));
        }
        Ok(tx)
    }
}

/// Catalog facts about an envelope that the ledger rules depend on.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ResolvedEnvelope {
    pub envelope: EnvelopeRef,
    pub section_id: i64,
    pub section_type: SectionType,
    pub is_income: bool,
}

/// Looks the envelope up in the catalog, scoped to the household.
pub(crate) async fn resolve_envelope(
    conn: &mut SqliteConnection,
    household_id: i64,
    envelope: EnvelopeRef,
) -> LedgerResult<ResolvedEnvelope> {
    match envelope {
        EnvelopeRef::Category(id) => {
            let category = queries::get_category(conn, id, household_id)
                .await?
                .ok_or_else(|| LedgerError::not_found(format!("category {id}")))?;
            Ok(ResolvedEnvelope {
                envelope,
                section_id: category.section_id,
                section_type: category.section_type,
                is_income: category.section_is_income,
            })
        }
        EnvelopeRef::Section(id) => {
            let section = queries::get_section(conn, id, household_id)
                .await?
                .ok_or_else(|| LedgerError::not_found(format!("section {id}")))?;
            Ok(ResolvedEnvelope {
                envelope,
                section_id: section.id,
                section_type: section.section_type,
                is_income: section.is_income,
            })
        }
    }
}

/// Fixed and debt sections are funded per category; flexible sections
/// only as a whole, with `rollup_mode` set.
pub(crate) fn check_rollup_rule(resolved: &ResolvedEnvelope, rollup_mode: bool) -> LedgerResult<()> {
    let wants_rollup = resolved.section_type.requires_rollup();
    match resolved.envelope {
        EnvelopeRef::Category(id) => {
            if rollup_mode {
                return Err(LedgerError::bad_request(format!(
                    "category {id} cannot use rollup mode; allocate its section instead"
                )));
            }
            if wants_rollup {
                return Err(LedgerError::bad_request(format!(
                    "category {id} belongs to flexible section {}, which must be allocated as a rollup",
                    resolved.section_id
                )));
            }
        }
        EnvelopeRef::Section(id) => {
            if !wants_rollup {
                return Err(LedgerError::bad_request(format!(
                    "{} section {id} is allocated per category and cannot use rollup mode",
                    resolved.section_type.as_str()
                )));
            }
            if !rollup_mode {
                return Err(LedgerError::bad_request(format!(
                    "flexible section {id} must be allocated with rollup mode"
                )));
            }
        }
    }
    Ok(())
}

/// Resolves the envelope and checks it may hold an allocation at all.
pub(crate) async fn resolve_fundable(
    conn: &mut SqliteConnection,
    household_id: i64,
    envelope: EnvelopeRef,
) -> LedgerResult<ResolvedEnvelope> {
    let resolved = resolve_envelope(conn, household_id, envelope).await?;
    check_rollup_rule(&resolved, envelope.is_rollup())?;
    Ok(resolved)
}

/// Returns the envelope's allocation, creating a zero-plan row when missing.
pub(crate) async fn ensure_allocation(
    conn: &mut SqliteConnection,
    budget_month_id: i64,
    envelope: EnvelopeRef,
) -> LedgerResult<Allocation> {
    if let Some(existing) = queries::get_allocation_by_envelope(conn, budget_month_id, envelope).await? {
        return Ok(existing);
    }
    let plan = SetAllocation {
        envelope,
        allocated_amount: Decimal::ZERO,
        rollup_mode: envelope.is_rollup(),
        notes: None,
    };
    queries::insert_allocation(conn, budget_month_id, &plan).await?;
    queries::get_allocation_by_envelope(conn, budget_month_id, envelope)
        .await?
        .ok_or_else(|| LedgerError::Internal(format!("allocation for {envelope} vanished after insert")))
}

/// Re-derives `assigned_amount` from assignment and transfer rows and persists it.
pub(crate) async fn refresh_assigned(
    conn: &mut SqliteConnection,
    budget_month_id: i64,
    envelope: EnvelopeRef,
) -> LedgerResult<Allocation> {
    let mut allocation = ensure_allocation(conn, budget_month_id, envelope).await?;
    let derived = queries::derived_assigned_amount(conn, budget_month_id, envelope).await?;
    if derived < -MONEY_TOLERANCE {
        return Err(LedgerError::Internal(format!(
            "{envelope} would hold negative assigned cash ({derived})"
        )));
    }
    let derived = derived.max(Decimal::ZERO);
    queries::update_assigned_amount(conn, allocation.id, derived).await?;
    allocation.assigned_amount = derived;
    Ok(allocation)
}

pub(crate) fn normalize_month(month: NaiveDate) -> NaiveDate {
    month_start(month)
}

pub(crate) fn require_positive(amount: Decimal, what: &str) -> LedgerResult<()> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::bad_request(format!("{what} must be positive, got {amount}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(envelope: EnvelopeRef, section_type: SectionType) -> ResolvedEnvelope {
        ResolvedEnvelope {
            envelope,
            section_id: 7,
            section_type,
            is_income: false,
        }
    }

    #[test]
    fn tolerances_are_a_cent_and_a_tenth_of_a_cent() {
        assert_eq!(MONEY_TOLERANCE.to_string(), "0.01");
        assert_eq!(FIFO_TOLERANCE.to_string(), "0.001");
    }

    #[test]
    fn fixed_and_debt_sections_never_roll_up() {
        for st in [SectionType::Fixed, SectionType::Debt] {
            assert!(check_rollup_rule(&resolved(EnvelopeRef::Section(7), st), true).is_err());
            assert!(check_rollup_rule(&resolved(EnvelopeRef::Category(3), st), false).is_ok());
            assert!(check_rollup_rule(&resolved(EnvelopeRef::Category(3), st), true).is_err());
        }
    }

    #[test]
    fn flexible_sections_must_roll_up() {
        let flex = SectionType::Flexible;
        assert!(check_rollup_rule(&resolved(EnvelopeRef::Section(7), flex), true).is_ok());
        assert!(check_rollup_rule(&resolved(EnvelopeRef::Section(7), flex), false).is_err());
        assert!(check_rollup_rule(&resolved(EnvelopeRef::Category(3), flex), false).is_err());
    }
}
