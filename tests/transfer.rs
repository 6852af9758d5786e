mod common;

use common::{date, money, Fixture};
use household_budget::database::models::{AssignmentId, EnvelopeRef, SectionType, TransferRequest};
use household_budget::{ErrorKind, LedgerError};
use rust_decimal::Decimal;

fn request(source: EnvelopeRef, destination: EnvelopeRef, amount: &str) -> TransferRequest {
    TransferRequest {
        source,
        destination,
        amount: money(amount),
        month: date("2025-01-01"),
        notes: None,
        created_by: None,
    }
}

struct Groceries {
    fx: Fixture,
    groceries: EnvelopeRef,
    dining: EnvelopeRef,
    income_row: i64,
}

// Groceries holds 50 of assigned cash with 10 already spent.
async fn groceries_with_cash() -> Groceries {
    let fx = Fixture::new().await;
    let food = fx.section("Food", SectionType::Fixed).await;
    let groceries_id = fx.category(food, "Groceries").await;
    let dining = EnvelopeRef::Category(fx.category(food, "Dining").await);
    let groceries = EnvelopeRef::Category(groceries_id);
    fx.income("2025-01-01", "200").await;
    let outcome = fx
        .ledger
        .create_assignment(fx.household_id, date("2025-01-01"), groceries, money("50"))
        .await
        .unwrap();
    fx.spend(groceries_id, "2025-01-08", "10").await;
    Groceries {
        income_row: outcome.income_assignments[0].id,
        fx,
        groceries,
        dining,
    }
}

#[tokio::test]
async fn transfer_moves_cash_and_records_one_row() {
    let Groceries { fx, groceries, dining, .. } = groceries_with_cash().await;

    let outcome = fx
        .ledger
        .transfer_money(
            fx.household_id,
            TransferRequest {
                notes: Some("eating out more".into()),
                created_by: Some(3),
                ..request(groceries, dining, "20")
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome.source.assigned_amount, money("30"));
    assert_eq!(outcome.destination.assigned_amount, money("20"));
    assert_eq!(outcome.destination.allocated_amount, Decimal::ZERO);
    assert_eq!(outcome.transfer.amount, money("20"));

    let transfers = fx.ledger.list_transfers(fx.household_id, date("2025-01-31")).await.unwrap();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].source, groceries);
    assert_eq!(transfers[0].destination, dining);
    assert_eq!(transfers[0].notes.as_deref(), Some("eating out more"));
    assert_eq!(transfers[0].created_by, Some(3));

    // assignment rows are untouched by the move
    assert_eq!(fx.count("income_assignments").await, 1);
    let tba = fx.ledger.get_to_be_assigned(fx.household_id, date("2025-01-01")).await.unwrap();
    assert_eq!(tba.to_be_assigned, money("150"));
}

#[tokio::test]
async fn transfer_is_capped_by_unspent_cash() {
    let Groceries { fx, groceries, dining, .. } = groceries_with_cash().await;

    let err = fx
        .ledger
        .transfer_money(fx.household_id, request(groceries, dining, "41"))
        .await
        .unwrap_err();
    match err {
        LedgerError::InsufficientFunds { requested, available } => {
            assert_eq!(requested, money("41"));
            assert_eq!(available, money("40"));
        }
        other => panic!("unexpected error {other:?}"),
    }

    let allocations = fx.ledger.get_allocations(fx.household_id, date("2025-01-01")).await.unwrap();
    assert_eq!(allocations.len(), 1);
    assert_eq!(allocations[0].assigned_amount, money("50"));
    assert_eq!(fx.count("assignment_transfers").await, 0);

    fx.ledger
        .transfer_money(fx.household_id, request(groceries, dining, "40"))
        .await
        .unwrap();
}

#[tokio::test]
async fn malformed_transfers_are_rejected() {
    let Groceries { fx, groceries, dining, .. } = groceries_with_cash().await;

    let err = fx
        .ledger
        .transfer_money(fx.household_id, request(groceries, groceries, "5"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);

    let err = fx
        .ledger
        .transfer_money(fx.household_id, request(groceries, dining, "-5"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);

    // dining has no allocation in January yet
    let err = fx
        .ledger
        .transfer_money(fx.household_id, request(dining, groceries, "5"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = fx
        .ledger
        .transfer_money(fx.household_id, request(groceries, EnvelopeRef::Category(31_337), "5"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(fx.count("assignment_transfers").await, 0);
}

#[tokio::test]
async fn cash_moved_away_blocks_unassigning_its_source() {
    let Groceries { fx, groceries, dining, income_row } = groceries_with_cash().await;
    fx.ledger
        .transfer_money(fx.household_id, request(groceries, dining, "20"))
        .await
        .unwrap();

    let err = fx
        .ledger
        .delete_assignment(fx.household_id, AssignmentId::Income(income_row))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);

    // moving it back makes the assignment removable again
    fx.ledger
        .transfer_money(fx.household_id, request(dining, groceries, "20"))
        .await
        .unwrap();
    let allocation = fx
        .ledger
        .delete_assignment(fx.household_id, AssignmentId::Income(income_row))
        .await
        .unwrap();
    assert_eq!(allocation.assigned_amount, Decimal::ZERO);
}
