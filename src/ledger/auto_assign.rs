//! Fill-all-underfunded planning.
//!
//! When the pool covers every need, each envelope gets exactly its need.
//! Otherwise each envelope gets `need / total_need * available`, floored to
//! cents, and the cents lost to flooring go one by one to the envelopes with
//! the largest fractional remainder (ties in listing order). The plan then
//! spends the pool truncated to whole cents, never more.

use chrono::NaiveDate;
use log::{debug, info};
use rust_decimal::Decimal;
use serde::Serialize;

use super::allocations::budget_month_in;
use super::assignment::{assign_in, AssignmentOutcome};
use super::summary::{envelope_summaries, EnvelopeSummary};
use super::to_be_assigned::compute_in;
use super::{Ledger, LedgerResult};
use crate::database::models::EnvelopeAmount;
use crate::util::{floor_cents, iso};

const CENT: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FillMode {
    Nothing,
    Full,
    Proportional,
}

#[derive(Debug, Clone, Serialize)]
pub struct FillPlan {
    pub mode: FillMode,
    pub total_need: Decimal,
    pub available: Decimal,
    pub requests: Vec<EnvelopeAmount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AutoAssignOutcome {
    pub plan: FillPlan,
    pub assignments: AssignmentOutcome,
}

/// `needs` carries each underfunded envelope with its need as the amount.
pub fn plan_fill(needs: &[EnvelopeAmount], available: Decimal) -> FillPlan {
    let needs: Vec<EnvelopeAmount> = needs
        .iter()
        .copied()
        .filter(|n| n.amount > Decimal::ZERO)
        .collect();
    let total_need: Decimal = needs.iter().map(|n| n.amount).sum();

    if needs.is_empty() || available <= Decimal::ZERO {
        return FillPlan {
            mode: FillMode::Nothing,
            total_need,
            available,
            requests: Vec::new(),
        };
    }

    if available >= total_need {
        return FillPlan {
            mode: FillMode::Full,
            total_need,
            available,
            requests: needs,
        };
    }

    let shares: Vec<Decimal> = needs
        .iter()
        .map(|n| n.amount / total_need * available)
        .collect();
    let mut amounts: Vec<Decimal> = shares.iter().map(|s| floor_cents(*s)).collect();

    let target = floor_cents(available);
    let mut leftover = target - amounts.iter().copied().sum::<Decimal>();

    let mut order: Vec<usize> = (0..needs.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = shares[a] - amounts[a];
        let rb = shares[b] - amounts[b];
        rb.cmp(&ra).then(a.cmp(&b))
    });
    for i in order {
        if leftover < CENT {
            break;
        }
        if amounts[i] + CENT <= needs[i].amount {
            amounts[i] += CENT;
            leftover -= CENT;
        }
    }

    let requests = needs
        .iter()
        .zip(amounts)
        .filter(|(_, amount)| *amount > Decimal::ZERO)
        .map(|(n, amount)| EnvelopeAmount {
            envelope: n.envelope,
            amount,
        })
        .collect();

    FillPlan {
        mode: FillMode::Proportional,
        total_need,
        available,
        requests,
    }
}

/// Underfunded, non-income envelopes in the order one income event funds
/// them: larger plans first, then the least assigned.
pub fn rank_for_income(envelopes: Vec<EnvelopeSummary>) -> Vec<EnvelopeSummary> {
    let mut ranked: Vec<EnvelopeSummary> = envelopes
        .into_iter()
        .filter(|e| !e.is_income && e.need > Decimal::ZERO)
        .collect();
    ranked.sort_by(|a, b| {
        b.allocated
            .cmp(&a.allocated)
            .then(a.assigned.cmp(&b.assigned))
    });
    ranked
}

impl Ledger {
    /// Funds every underfunded envelope in the month from to-be-assigned cash,
    /// fully when it suffices and proportionally otherwise, as one batch.
    pub async fn auto_assign_all(&self, household_id: i64, month: NaiveDate) -> LedgerResult<AutoAssignOutcome> {
        let mut tx = self.begin(household_id).await?;
        let budget_month = budget_month_in(&mut tx, household_id, month).await?;

        let needs: Vec<EnvelopeAmount> = envelope_summaries(&mut tx, household_id, &budget_month)
            .await?
            .into_iter()
            .filter(|e| !e.is_income && e.need > Decimal::ZERO)
            .map(|e| EnvelopeAmount {
                envelope: e.envelope,
                amount: e.need,
            })
            .collect();
        let tba = compute_in(&mut tx, household_id, &budget_month).await?;
        let plan = plan_fill(&needs, tba.to_be_assigned);
        debug!(
            "household {household_id}: fill plan {:?} for need {} with {} available",
            plan.mode, plan.total_need, plan.available
        );

        let assignments = if plan.requests.is_empty() {
            AssignmentOutcome {
                budget_month_id: budget_month.id,
                ..AssignmentOutcome::default()
            }
        } else {
            assign_in(&mut tx, household_id, &budget_month, &plan.requests, true).await?
        };
        tx.commit().await?;

        info!(
            "household {household_id}: auto-assign for {} funded {} envelopes with {} ({:?})",
            iso(&budget_month.month),
            assignments.allocations.len(),
            assignments.total_assigned,
            plan.mode
        );
        Ok(AutoAssignOutcome { plan, assignments })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::EnvelopeRef;
    use proptest::prelude::*;

    fn d(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    fn need(category: i64, amount: Decimal) -> EnvelopeAmount {
        EnvelopeAmount {
            envelope: EnvelopeRef::Category(category),
            amount,
        }
    }

    fn amounts(plan: &FillPlan) -> Vec<Decimal> {
        plan.requests.iter().map(|r| r.amount).collect()
    }

    #[test]
    fn enough_cash_funds_every_need_exactly() {
        let plan = plan_fill(&[need(1, d(30)), need(2, d(70))], d(100));
        assert_eq!(plan.mode, FillMode::Full);
        assert_eq!(amounts(&plan), vec![d(30), d(70)]);
    }

    #[test]
    fn short_cash_is_split_in_proportion() {
        let plan = plan_fill(&[need(1, d(30)), need(2, d(70))], d(50));
        assert_eq!(plan.mode, FillMode::Proportional);
        assert_eq!(amounts(&plan), vec![d(15), d(35)]);
    }

    #[test]
    fn leftover_cents_go_to_largest_remainders() {
        // 10 / 3 = 3.333.. each; one cent is left after flooring
        let plan = plan_fill(&[need(1, d(10)), need(2, d(10)), need(3, d(10))], d(10));
        assert_eq!(
            amounts(&plan),
            vec![Decimal::new(334, 2), Decimal::new(333, 2), Decimal::new(333, 2)]
        );
        assert_eq!(amounts(&plan).iter().copied().sum::<Decimal>(), d(10));
    }

    #[test]
    fn nothing_to_do_without_need_or_cash() {
        assert_eq!(plan_fill(&[], d(100)).mode, FillMode::Nothing);
        assert_eq!(plan_fill(&[need(1, d(5))], Decimal::ZERO).mode, FillMode::Nothing);
        assert_eq!(plan_fill(&[need(1, d(5))], d(-20)).mode, FillMode::Nothing);
        assert_eq!(plan_fill(&[need(1, Decimal::ZERO)], d(20)).mode, FillMode::Nothing);
    }

    fn summary(id: i64, allocated: i64, assigned: i64, is_income: bool) -> EnvelopeSummary {
        EnvelopeSummary {
            allocation_id: id,
            envelope: EnvelopeRef::Category(id),
            section_id: 1,
            is_income,
            rollup_mode: false,
            allocated: d(allocated),
            assigned: d(assigned),
            spent: Decimal::ZERO,
            available: d(assigned),
            need: (d(allocated) - d(assigned)).max(Decimal::ZERO),
        }
    }

    #[test]
    fn income_ranking_prefers_large_plans_then_least_funded() {
        let ranked = rank_for_income(vec![
            summary(1, 100, 0, false),
            summary(2, 300, 50, false),
            summary(3, 300, 10, false),
            summary(4, 500, 500, false), // fully funded
            summary(5, 900, 0, true),    // income placeholder
        ]);
        let ids: Vec<i64> = ranked.iter().map(|e| e.allocation_id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    proptest! {
        #[test]
        fn proportional_plan_never_exceeds_pool_or_need(
            need_cents in prop::collection::vec(1i64..100_000, 1..10),
            available_cents in 1i64..500_000,
        ) {
            let needs: Vec<EnvelopeAmount> = need_cents
                .iter()
                .enumerate()
                .map(|(i, c)| need(i as i64, Decimal::new(*c, 2)))
                .collect();
            let available = Decimal::new(available_cents, 2);
            let plan = plan_fill(&needs, available);

            let total: Decimal = plan.requests.iter().map(|r| r.amount).sum();
            prop_assert!(total <= available);
            for r in &plan.requests {
                let EnvelopeRef::Category(i) = r.envelope else { unreachable!() };
                prop_assert!(r.amount <= needs[i as usize].amount);
                prop_assert!(r.amount > Decimal::ZERO);
            }
            if plan.mode == FillMode::Proportional {
                prop_assert_eq!(total, floor_cents(available));
            }
        }
    }
}
