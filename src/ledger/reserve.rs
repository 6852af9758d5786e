//! Savings reserves: income held back as "extra money" without funding an
//! envelope. Reserved cash leaves the FIFO pool and to-be-assigned alike.

use log::info;
use rust_decimal::Decimal;

use super::{require_positive, Ledger, LedgerError, LedgerResult, MONEY_TOLERANCE};
use crate::database::db::queries;
use crate::database::models::SavingsReserve;

impl Ledger {
    pub async fn reserve_income(
        &self,
        household_id: i64,
        transaction_id: i64,
        amount: Decimal,
        notes: Option<&str>,
    ) -> LedgerResult<SavingsReserve> {
        require_positive(amount, "reserve amount")?;

        let mut tx = self.begin(household_id).await?;
        let transaction = queries::get_transaction(&mut tx, transaction_id, household_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("transaction {transaction_id}")))?;
        if transaction.amount <= Decimal::ZERO {
            return Err(LedgerError::bad_request(format!(
                "transaction {transaction_id} is not income"
            )));
        }

        let available = transaction.amount
            - queries::assigned_for_transaction(&mut tx, transaction_id).await?
            - queries::reserved_for_transaction(&mut tx, transaction_id).await?;
        if amount > available + MONEY_TOLERANCE {
            return Err(LedgerError::InsufficientFunds {
                requested: amount,
                available,
            });
        }

        let reserve = queries::insert_reserve(&mut tx, household_id, transaction_id, amount, notes).await?;
        tx.commit().await?;
        info!("household {household_id}: reserved {amount} of transaction {transaction_id}");
        Ok(reserve)
    }

    pub async fn release_reserve(&self, household_id: i64, reserve_id: i64) -> LedgerResult<SavingsReserve> {
        let mut tx = self.begin(household_id).await?;
        let reserve = queries::get_reserve(&mut tx, reserve_id, household_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("savings reserve {reserve_id}")))?;
        queries::delete_reserve(&mut tx, reserve_id).await?;
        tx.commit().await?;
        info!("household {household_id}: released reserve {reserve_id} ({})", reserve.amount);
        Ok(reserve)
    }
}
