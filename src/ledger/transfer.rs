use chrono::NaiveDate;
use log::{info, warn};
use serde::Serialize;

use super::allocations::budget_month_in;
use super::summary::envelope_spent;
use super::{
    ensure_allocation, normalize_month, refresh_assigned, require_positive, resolve_fundable, Ledger,
    LedgerError, LedgerResult, MONEY_TOLERANCE,
};
use crate::database::db::queries;
use crate::database::models::{Allocation, AssignmentTransfer, TransferRequest};
use crate::util::iso;

#[derive(Debug, Clone, Serialize)]
pub struct TransferOutcome {
    pub transfer: AssignmentTransfer,
    pub source: Allocation,
    pub destination: Allocation,
}

impl Ledger {
    /// Moves already-assigned cash between two envelopes of the same month.
    /// Income and opening-balance assignment rows are left untouched; the
    /// audit row plus both re-derived allocations commit together.
    pub async fn transfer_money(&self, household_id: i64, req: TransferRequest) -> LedgerResult<TransferOutcome> {
        require_positive(req.amount, "transfer amount")?;
        if req.source == req.destination {
            return Err(LedgerError::bad_request(format!(
                "cannot transfer from {} to itself",
                req.source
            )));
        }
        let req = TransferRequest {
            month: normalize_month(req.month),
            ..req
        };

        let mut tx = self.begin(household_id).await?;
        resolve_fundable(&mut tx, household_id, req.source).await?;
        resolve_fundable(&mut tx, household_id, req.destination).await?;
        let budget_month = budget_month_in(&mut tx, household_id, req.month).await?;

        let source = queries::get_allocation_by_envelope(&mut tx, budget_month.id, req.source)
            .await?
            .ok_or_else(|| {
                LedgerError::not_found(format!("allocation for {} in {}", req.source, iso(&req.month)))
            })?;
        let spent = envelope_spent(&mut tx, household_id, req.source, req.month).await?;
        let available = source.assigned_amount - spent;
        if req.amount > available + MONEY_TOLERANCE {
            warn!(
                "household {household_id}: transfer of {} from {} refused, only {available} available",
                req.amount, req.source
            );
            return Err(LedgerError::InsufficientFunds {
                requested: req.amount,
                available,
            });
        }

        ensure_allocation(&mut tx, budget_month.id, req.destination).await?;
        let transfer = queries::insert_transfer(&mut tx, budget_month.id, &req).await?;
        let source = refresh_assigned(&mut tx, budget_month.id, req.source).await?;
        let destination = refresh_assigned(&mut tx, budget_month.id, req.destination).await?;
        tx.commit().await?;

        info!(
            "household {household_id}: moved {} from {} to {} in {}",
            req.amount,
            req.source,
            req.destination,
            iso(&req.month)
        );
        Ok(TransferOutcome {
            transfer,
            source,
            destination,
        })
    }

    pub async fn list_transfers(&self, household_id: i64, month: NaiveDate) -> LedgerResult<Vec<AssignmentTransfer>> {
        let mut tx = self.begin(household_id).await?;
        let budget_month = budget_month_in(&mut tx, household_id, month).await?;
        let transfers = queries::list_transfers(&mut tx, budget_month.id).await?;
        tx.commit().await?;
        Ok(transfers)
    }
}
