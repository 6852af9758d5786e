//! In-memory working set for one assignment request.
//!
//! The pool is built fresh from persisted rows at the start of every
//! operation and dropped after commit; nothing here outlives a request.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::FIFO_TOLERANCE;

#[derive(Debug, Clone, PartialEq)]
pub struct PoolEntry {
    pub transaction_id: i64,
    pub transaction_date: NaiveDate,
    pub available: Decimal,
}

/// Cash taken from one income transaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Draw {
    pub transaction_id: i64,
    pub amount: Decimal,
}

/// Unassigned income for one month, oldest transaction first.
#[derive(Debug, Clone, Default)]
pub struct IncomePool {
    entries: Vec<PoolEntry>,
}

impl IncomePool {
    /// Drops fully consumed transactions and orders the rest by (date, id).
    pub fn new(mut entries: Vec<PoolEntry>) -> Self {
        entries.retain(|e| e.available > Decimal::ZERO);
        entries.sort_by(|a, b| {
            a.transaction_date
                .cmp(&b.transaction_date)
                .then(a.transaction_id.cmp(&b.transaction_id))
        });
        Self { entries }
    }

    pub fn total_available(&self) -> Decimal {
        self.entries.iter().map(|e| e.available).sum()
    }

    pub fn available_for(&self, transaction_id: i64) -> Decimal {
        self.entries
            .iter()
            .find(|e| e.transaction_id == transaction_id)
            .map(|e| e.available)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|e| e.available <= Decimal::ZERO)
    }

    /// Walks the pool oldest-first taking `min(available, need)` from each
    /// transaction. Returns the draws and whatever need is left uncovered
    /// (zero once it falls under the FIFO tolerance).
    pub fn draw(&mut self, need: Decimal) -> (Vec<Draw>, Decimal) {
        let mut remaining = need;
        let mut draws = Vec::new();

        for entry in self.entries.iter_mut() {
            if remaining <= FIFO_TOLERANCE {
                break;
            }
            if entry.available <= Decimal::ZERO {
                continue;
            }
            let take = entry.available.min(remaining);
            entry.available -= take;
            remaining -= take;
            draws.push(Draw {
                transaction_id: entry.transaction_id,
                amount: take,
            });
        }

        if remaining <= FIFO_TOLERANCE {
            remaining = Decimal::ZERO;
        }
        (draws, remaining)
    }
}

/// Household-wide opening-balance cash left to hand out.
#[derive(Debug, Clone, Copy)]
pub struct OpeningBalancePool {
    available: Decimal,
}

impl OpeningBalancePool {
    pub fn new(available: Decimal) -> Self {
        Self {
            available: available.max(Decimal::ZERO),
        }
    }

    pub fn available(&self) -> Decimal {
        self.available
    }

    /// Takes up to `amount`; returns what was actually taken.
    pub fn take(&mut self, amount: Decimal) -> Decimal {
        let taken = self.available.min(amount).max(Decimal::ZERO);
        self.available -= taken;
        taken
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn dollars(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    fn entry(id: i64, d: u32, available: Decimal) -> PoolEntry {
        PoolEntry {
            transaction_id: id,
            transaction_date: day(d),
            available,
        }
    }

    #[test]
    fn draws_oldest_transaction_first() {
        // inserted newest-first on purpose
        let mut pool = IncomePool::new(vec![entry(2, 5, dollars(100)), entry(1, 1, dollars(50))]);

        let (draws, left) = pool.draw(dollars(120));

        assert_eq!(left, Decimal::ZERO);
        assert_eq!(
            draws,
            vec![
                Draw { transaction_id: 1, amount: dollars(50) },
                Draw { transaction_id: 2, amount: dollars(70) },
            ]
        );
        assert_eq!(pool.available_for(1), Decimal::ZERO);
        assert_eq!(pool.available_for(2), dollars(30));
    }

    #[test]
    fn same_day_transactions_break_ties_by_id() {
        let mut pool = IncomePool::new(vec![entry(9, 3, dollars(10)), entry(4, 3, dollars(10))]);
        let (draws, _) = pool.draw(dollars(5));
        assert_eq!(draws[0].transaction_id, 4);
    }

    #[test]
    fn exhausted_pool_reports_shortfall() {
        let mut pool = IncomePool::new(vec![entry(1, 1, dollars(40)), entry(2, 2, Decimal::ZERO)]);
        let (draws, left) = pool.draw(dollars(55));
        assert_eq!(draws.len(), 1);
        assert_eq!(left, dollars(15));
        assert!(pool.is_empty());
    }

    #[test]
    fn sub_tolerance_residual_is_dropped() {
        let mut pool = IncomePool::new(vec![entry(1, 1, Decimal::new(9_9995, 4))]);
        let (_, left) = pool.draw(dollars(10));
        assert_eq!(left, Decimal::ZERO);
    }

    #[test]
    fn shared_pool_is_consumed_across_requests() {
        let mut pool = IncomePool::new(vec![entry(1, 1, dollars(30)), entry(2, 2, dollars(30))]);
        let (first, _) = pool.draw(dollars(40));
        let (second, _) = pool.draw(dollars(20));
        assert_eq!(first.len(), 2);
        assert_eq!(second, vec![Draw { transaction_id: 2, amount: dollars(20) }]);
        assert_eq!(pool.total_available(), Decimal::ZERO);
    }

    #[test]
    fn opening_pool_never_goes_negative() {
        let mut opening = OpeningBalancePool::new(dollars(25));
        assert_eq!(opening.take(dollars(10)), dollars(10));
        assert_eq!(opening.take(dollars(40)), dollars(15));
        assert_eq!(opening.available(), Decimal::ZERO);
        assert_eq!(OpeningBalancePool::new(dollars(-3)).available(), Decimal::ZERO);
    }

    proptest! {
        #[test]
        fn draw_never_overdraws_a_transaction(
            cents in prop::collection::vec(0i64..50_000, 1..12),
            need_cents in 0i64..400_000,
        ) {
            let entries: Vec<PoolEntry> = cents
                .iter()
                .enumerate()
                .map(|(i, c)| entry(i as i64 + 1, (i as u32 % 28) + 1, Decimal::new(*c, 2)))
                .collect();
            let before = IncomePool::new(entries.clone());
            let mut pool = before.clone();
            let need = Decimal::new(need_cents, 2);

            let (draws, left) = pool.draw(need);

            let drawn: Decimal = draws.iter().map(|d| d.amount).sum();
            prop_assert_eq!(drawn + left, need);
            prop_assert!(drawn <= before.total_available());
            for d in &draws {
                prop_assert!(d.amount > Decimal::ZERO);
                prop_assert!(d.amount <= before.available_for(d.transaction_id));
                prop_assert!(pool.available_for(d.transaction_id) >= Decimal::ZERO);
            }
        }
    }
}
