use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use std::collections::HashMap;

use crate::database::models::{
    Account, AccountBalanceAssignment, Allocation, AssignmentTransfer, BudgetMonth, Category, EnvelopeRef,
    IncomeAssignment, LedgerTransaction, SavingsReserve, Section, SectionType, SetAllocation,
    TransferRequest,
};
use crate::util::{iso, parse_iso};

/*
SQL for the envelope ledger. Every function takes a bare connection so the
ledger can run several of them inside one database transaction.
Money is stored as TEXT and summed here in Rust, never in SQL.
 */

/*========== Row decoding =========== */

fn decimal_col(row: &SqliteRow, col: &str) -> Result<Decimal, sqlx::Error> {
    let text: String = row.try_get(col)?;
    Decimal::from_str_exact(&text)
        .map_err(|e| sqlx::Error::Decode(format!("Invalid Decimal format for {col}: {e}").into()))
}

fn date_col(row: &SqliteRow, col: &str) -> Result<NaiveDate, sqlx::Error> {
    let text: String = row.try_get(col)?;
    // the feed may carry "YYYY-MM-DD HH:MM:SS"; only the date part matters here
    parse_iso(text.get(..10).unwrap_or(&text))
        .ok_or_else(|| sqlx::Error::Decode(format!("Invalid date format for {col}: {text}").into()))
}

fn envelope_cols(row: &SqliteRow, category_col: &str, section_col: &str) -> Result<EnvelopeRef, sqlx::Error> {
    let category_id: Option<i64> = row.try_get(category_col)?;
    let section_id: Option<i64> = row.try_get(section_col)?;
    EnvelopeRef::from_columns(category_id, section_id).ok_or_else(|| {
        sqlx::Error::Decode(
            format!("{category_col}/{section_col} must reference exactly one envelope").into(),
        )
    })
}

fn sum_amounts(rows: &[SqliteRow], col: &str) -> Result<Decimal, sqlx::Error> {
    let mut total = Decimal::ZERO;
    for row in rows {
        total += decimal_col(row, col)?;
    }
    Ok(total)
}

fn section_type_col(row: &SqliteRow, col: &str) -> Result<SectionType, sqlx::Error> {
    let text: String = row.try_get(col)?;
    SectionType::parse(&text)
        .ok_or_else(|| sqlx::Error::Decode(format!("Unknown section type: {text}").into()))
}

/*========== Household Queries =========== */

// Bumps the household's ledger version. Run first inside every mutation so the
// write lock is held before any pool balance is read.
pub async fn lock_household(conn: &mut SqliteConnection, household_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE households
        SET ledger_version = ledger_version + 1
        WHERE id = ?
        "#,
    )
    .bind(household_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/*========== Catalog Queries (read-only) =========== */

pub async fn get_section(
    conn: &mut SqliteConnection,
    section_id: i64,
    household_id: i64,
) -> Result<Option<Section>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT id, household_id, name, section_type, is_income
        FROM sections
        WHERE id = ? AND household_id = ?
        "#,
    )
    .bind(section_id)
    .bind(household_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(map_section).transpose()
}

fn map_section(row: &SqliteRow) -> Result<Section, sqlx::Error> {
    Ok(Section {
        id: row.try_get("id")?,
        household_id: row.try_get("household_id")?,
        name: row.try_get("name")?,
        section_type: section_type_col(row, "section_type")?,
        is_income: row.try_get("is_income")?,
    })
}

pub async fn get_category(
    conn: &mut SqliteConnection,
    category_id: i64,
    household_id: i64,
) -> Result<Option<Category>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT c.id, c.household_id, c.section_id, c.name,
               s.section_type, s.is_income
        FROM categories c
        JOIN sections s ON s.id = c.section_id
        WHERE c.id = ? AND c.household_id = ?
        "#,
    )
    .bind(category_id)
    .bind(household_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(map_category).transpose()
}

fn map_category(row: &SqliteRow) -> Result<Category, sqlx::Error> {
    Ok(Category {
        id: row.try_get("id")?,
        household_id: row.try_get("household_id")?,
        section_id: row.try_get("section_id")?,
        name: row.try_get("name")?,
        section_type: section_type_col(row, "section_type")?,
        section_is_income: row.try_get("is_income")?,
    })
}

/*========== Account Queries =========== */

fn map_account(row: &SqliteRow) -> Result<Account, sqlx::Error> {
    Ok(Account {
        id: row.try_get("id")?,
        household_id: row.try_get("household_id")?,
        name: row.try_get("name")?,
        opening_balance: decimal_col(row, "opening_balance")?,
        is_active: row.try_get("is_active")?,
    })
}

pub async fn list_active_accounts(
    conn: &mut SqliteConnection,
    household_id: i64,
) -> Result<Vec<Account>, sqlx::Error> {
    sqlx::query(
        r#"
        SELECT id, household_id, name, opening_balance, is_active
        FROM accounts
        WHERE household_id = ? AND is_active = 1
        ORDER BY id ASC
        "#,
    )
    .bind(household_id)
    .fetch_all(&mut *conn)
    .await?
    .iter()
    .map(map_account)
    .collect::<Result<Vec<Account>, sqlx::Error>>()
}

pub async fn total_active_opening_balances(
    conn: &mut SqliteConnection,
    household_id: i64,
) -> Result<Decimal, sqlx::Error> {
    let accounts = list_active_accounts(conn, household_id).await?;
    Ok(accounts.iter().map(|a| a.opening_balance).sum())
}

/*========== Transaction Queries (external feed, read-only) =========== */

fn map_transaction(row: &SqliteRow) -> Result<LedgerTransaction, sqlx::Error> {
    Ok(LedgerTransaction {
        id: row.try_get("id")?,
        household_id: row.try_get("household_id")?,
        category_id: row.try_get("category_id")?,
        amount: decimal_col(row, "amount")?,
        transaction_date: date_col(row, "transaction_date")?,
    })
}

pub async fn get_transaction(
    conn: &mut SqliteConnection,
    transaction_id: i64,
    household_id: i64,
) -> Result<Option<LedgerTransaction>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT id, household_id, category_id, amount, transaction_date
        FROM transactions
        WHERE id = ? AND household_id = ?
        "#,
    )
    .bind(transaction_id)
    .bind(household_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(map_transaction).transpose()
}

// All transactions dated in [start, end), oldest first.
pub async fn list_transactions_in_range(
    conn: &mut SqliteConnection,
    household_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<LedgerTransaction>, sqlx::Error> {
    sqlx::query(
        r#"
        SELECT id, household_id, category_id, amount, transaction_date
        FROM transactions
        WHERE household_id = ? AND transaction_date >= ? AND transaction_date < ?
        ORDER BY transaction_date ASC, id ASC
        "#,
    )
    .bind(household_id)
    .bind(iso(&start))
    .bind(iso(&end))
    .fetch_all(&mut *conn)
    .await?
    .iter()
    .map(map_transaction)
    .collect::<Result<Vec<LedgerTransaction>, sqlx::Error>>()
}

pub async fn list_income_transactions(
    conn: &mut SqliteConnection,
    household_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<LedgerTransaction>, sqlx::Error> {
    let all = list_transactions_in_range(conn, household_id, start, end).await?;
    Ok(all.into_iter().filter(|t| t.amount > Decimal::ZERO).collect())
}

/// Spending in [start, end) keyed by (category_id, section_id), as positive amounts.
pub async fn spending_by_category(
    conn: &mut SqliteConnection,
    household_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<HashMap<(i64, i64), Decimal>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT t.category_id, c.section_id, t.amount
        FROM transactions t
        JOIN categories c ON c.id = t.category_id
        WHERE t.household_id = ? AND t.transaction_date >= ? AND t.transaction_date < ?
        "#,
    )
    .bind(household_id)
    .bind(iso(&start))
    .bind(iso(&end))
    .fetch_all(&mut *conn)
    .await?;

    let mut spent: HashMap<(i64, i64), Decimal> = HashMap::new();
    for row in &rows {
        let amount = decimal_col(row, "amount")?;
        if amount < Decimal::ZERO {
            let key: (i64, i64) = (row.try_get("category_id")?, row.try_get("section_id")?);
            *spent.entry(key).or_insert(Decimal::ZERO) -= amount;
        }
    }
    Ok(spent)
}

/*========== Budget Month Queries =========== */

fn map_budget_month(row: &SqliteRow) -> Result<BudgetMonth, sqlx::Error> {
    Ok(BudgetMonth {
        id: row.try_get("id")?,
        household_id: row.try_get("household_id")?,
        month: date_col(row, "month")?,
        notes: row.try_get("notes")?,
    })
}

// Returns true when the row was created by this call.
pub async fn insert_budget_month_if_missing(
    conn: &mut SqliteConnection,
    household_id: i64,
    month: NaiveDate,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO budget_months (household_id, month)
        VALUES (?, ?)
        "#,
    )
    .bind(household_id)
    .bind(iso(&month))
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_budget_month(
    conn: &mut SqliteConnection,
    household_id: i64,
    month: NaiveDate,
) -> Result<Option<BudgetMonth>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT id, household_id, month, notes
        FROM budget_months
        WHERE household_id = ? AND month = ?
        "#,
    )
    .bind(household_id)
    .bind(iso(&month))
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(map_budget_month).transpose()
}

pub async fn find_prior_month_with_allocations(
    conn: &mut SqliteConnection,
    household_id: i64,
    month: NaiveDate,
) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT bm.id
        FROM budget_months bm
        WHERE bm.household_id = ? AND bm.month < ?
          AND EXISTS (SELECT 1 FROM allocations a WHERE a.budget_month_id = bm.id)
        ORDER BY bm.month DESC
        LIMIT 1
        "#,
    )
    .bind(household_id)
    .bind(iso(&month))
    .fetch_optional(&mut *conn)
    .await
}

// Copies the plan side only; assigned cash starts at zero in the new month.
pub async fn copy_allocations(
    conn: &mut SqliteConnection,
    from_month_id: i64,
    to_month_id: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO allocations (
            budget_month_id, category_id, section_id,
            allocated_amount, assigned_amount, rollup_mode, notes
        )
        SELECT ?, category_id, section_id, allocated_amount, '0', rollup_mode, notes
        FROM allocations
        WHERE budget_month_id = ?
        "#,
    )
    .bind(to_month_id)
    .bind(from_month_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

pub async fn update_month_notes(
    conn: &mut SqliteConnection,
    budget_month_id: i64,
    notes: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE budget_months SET notes = ? WHERE id = ?")
        .bind(notes)
        .bind(budget_month_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/*========== Allocation Queries =========== */

const ALLOCATION_COLUMNS: &str = "a.id, a.budget_month_id, a.category_id, a.section_id, \
     a.allocated_amount, a.assigned_amount, a.rollup_mode, a.notes";

fn map_allocation(row: &SqliteRow) -> Result<Allocation, sqlx::Error> {
    Ok(Allocation {
        id: row.try_get("id")?,
        budget_month_id: row.try_get("budget_month_id")?,
        envelope: envelope_cols(row, "category_id", "section_id")?,
        allocated_amount: decimal_col(row, "allocated_amount")?,
        assigned_amount: decimal_col(row, "assigned_amount")?,
        rollup_mode: row.try_get("rollup_mode")?,
        notes: row.try_get("notes")?,
    })
}

pub async fn list_allocations(
    conn: &mut SqliteConnection,
    budget_month_id: i64,
) -> Result<Vec<Allocation>, sqlx::Error> {
    sqlx::query(&format!(
        "SELECT {ALLOCATION_COLUMNS} FROM allocations a WHERE a.budget_month_id = ? ORDER BY a.id ASC"
    ))
    .bind(budget_month_id)
    .fetch_all(&mut *conn)
    .await?
    .iter()
    .map(map_allocation)
    .collect::<Result<Vec<Allocation>, sqlx::Error>>()
}

pub async fn get_allocation_by_envelope(
    conn: &mut SqliteConnection,
    budget_month_id: i64,
    envelope: EnvelopeRef,
) -> Result<Option<Allocation>, sqlx::Error> {
    let (category_id, section_id) = envelope.columns();
    let row = sqlx::query(&format!(
        "SELECT {ALLOCATION_COLUMNS} FROM allocations a \
         WHERE a.budget_month_id = ? AND a.category_id IS ? AND a.section_id IS ?"
    ))
    .bind(budget_month_id)
    .bind(category_id)
    .bind(section_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(map_allocation).transpose()
}

// Ownership is checked through the allocation's budget month.
pub async fn get_allocation_for_household(
    conn: &mut SqliteConnection,
    allocation_id: i64,
    household_id: i64,
) -> Result<Option<Allocation>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {ALLOCATION_COLUMNS} FROM allocations a \
         JOIN budget_months bm ON bm.id = a.budget_month_id \
         WHERE a.id = ? AND bm.household_id = ?"
    ))
    .bind(allocation_id)
    .bind(household_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(map_allocation).transpose()
}

pub async fn insert_allocation(
    conn: &mut SqliteConnection,
    budget_month_id: i64,
    plan: &SetAllocation,
) -> Result<i64, sqlx::Error> {
    let (category_id, section_id) = plan.envelope.columns();
    let row = sqlx::query(
        r#"
        INSERT INTO allocations (
            budget_month_id, category_id, section_id,
            allocated_amount, assigned_amount, rollup_mode, notes
        )
        VALUES (?, ?, ?, ?, '0', ?, ?)
        RETURNING id
        "#,
    )
    .bind(budget_month_id)
    .bind(category_id)
    .bind(section_id)
    .bind(plan.allocated_amount.to_string())
    .bind(plan.rollup_mode)
    .bind(plan.notes.as_deref())
    .fetch_one(&mut *conn)
    .await?;

    row.try_get("id")
}

pub async fn update_allocation_plan(
    conn: &mut SqliteConnection,
    allocation_id: i64,
    plan: &SetAllocation,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE allocations
        SET allocated_amount = ?, rollup_mode = ?, notes = ?
        WHERE id = ?
        "#,
    )
    .bind(plan.allocated_amount.to_string())
    .bind(plan.rollup_mode)
    .bind(plan.notes.as_deref())
    .bind(allocation_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// Cash side only. The value is always a freshly derived aggregate.
pub async fn update_assigned_amount(
    conn: &mut SqliteConnection,
    allocation_id: i64,
    assigned_amount: Decimal,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE allocations SET assigned_amount = ? WHERE id = ?")
        .bind(assigned_amount.to_string())
        .bind(allocation_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn delete_allocation(conn: &mut SqliteConnection, allocation_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM allocations WHERE id = ?")
        .bind(allocation_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/*========== Income Assignment Queries =========== */

fn map_income_assignment(row: &SqliteRow) -> Result<IncomeAssignment, sqlx::Error> {
    Ok(IncomeAssignment {
        id: row.try_get("id")?,
        budget_month_id: row.try_get("budget_month_id")?,
        transaction_id: row.try_get("transaction_id")?,
        envelope: envelope_cols(row, "category_id", "section_id")?,
        amount: decimal_col(row, "amount")?,
    })
}

pub async fn insert_income_assignment(
    conn: &mut SqliteConnection,
    budget_month_id: i64,
    transaction_id: i64,
    envelope: EnvelopeRef,
    amount: Decimal,
) -> Result<IncomeAssignment, sqlx::Error> {
    let (category_id, section_id) = envelope.columns();
    let row = sqlx::query(
        r#"
        INSERT INTO income_assignments (budget_month_id, transaction_id, category_id, section_id, amount)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id, budget_month_id, transaction_id, category_id, section_id, amount
        "#,
    )
    .bind(budget_month_id)
    .bind(transaction_id)
    .bind(category_id)
    .bind(section_id)
    .bind(amount.to_string())
    .fetch_one(&mut *conn)
    .await?;

    map_income_assignment(&row)
}

pub async fn get_income_assignment(
    conn: &mut SqliteConnection,
    assignment_id: i64,
    household_id: i64,
) -> Result<Option<IncomeAssignment>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT ia.id, ia.budget_month_id, ia.transaction_id, ia.category_id, ia.section_id, ia.amount
        FROM income_assignments ia
        JOIN budget_months bm ON bm.id = ia.budget_month_id
        WHERE ia.id = ? AND bm.household_id = ?
        "#,
    )
    .bind(assignment_id)
    .bind(household_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(map_income_assignment).transpose()
}

pub async fn list_income_assignments(
    conn: &mut SqliteConnection,
    budget_month_id: i64,
) -> Result<Vec<IncomeAssignment>, sqlx::Error> {
    sqlx::query(
        r#"
        SELECT id, budget_month_id, transaction_id, category_id, section_id, amount
        FROM income_assignments
        WHERE budget_month_id = ?
        ORDER BY id ASC
        "#,
    )
    .bind(budget_month_id)
    .fetch_all(&mut *conn)
    .await?
    .iter()
    .map(map_income_assignment)
    .collect::<Result<Vec<IncomeAssignment>, sqlx::Error>>()
}

pub async fn delete_income_assignment(conn: &mut SqliteConnection, assignment_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM income_assignments WHERE id = ?")
        .bind(assignment_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn assigned_for_transaction(
    conn: &mut SqliteConnection,
    transaction_id: i64,
) -> Result<Decimal, sqlx::Error> {
    let rows = sqlx::query("SELECT amount FROM income_assignments WHERE transaction_id = ?")
        .bind(transaction_id)
        .fetch_all(&mut *conn)
        .await?;
    sum_amounts(&rows, "amount")
}

/// Assigned totals per transaction, for transactions dated in [start, end).
pub async fn assigned_by_transaction(
    conn: &mut SqliteConnection,
    household_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<HashMap<i64, Decimal>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT ia.transaction_id, ia.amount
        FROM income_assignments ia
        JOIN transactions t ON t.id = ia.transaction_id
        WHERE t.household_id = ? AND t.transaction_date >= ? AND t.transaction_date < ?
        "#,
    )
    .bind(household_id)
    .bind(iso(&start))
    .bind(iso(&end))
    .fetch_all(&mut *conn)
    .await?;

    totals_by_transaction(&rows)
}

fn totals_by_transaction(rows: &[SqliteRow]) -> Result<HashMap<i64, Decimal>, sqlx::Error> {
    let mut totals: HashMap<i64, Decimal> = HashMap::new();
    for row in rows {
        let id: i64 = row.try_get("transaction_id")?;
        *totals.entry(id).or_insert(Decimal::ZERO) += decimal_col(row, "amount")?;
    }
    Ok(totals)
}

pub async fn total_income_assigned(
    conn: &mut SqliteConnection,
    budget_month_id: i64,
) -> Result<Decimal, sqlx::Error> {
    let rows = sqlx::query("SELECT amount FROM income_assignments WHERE budget_month_id = ?")
        .bind(budget_month_id)
        .fetch_all(&mut *conn)
        .await?;
    sum_amounts(&rows, "amount")
}

/*========== Account Balance Assignment Queries =========== */

fn map_account_balance_assignment(row: &SqliteRow) -> Result<AccountBalanceAssignment, sqlx::Error> {
    Ok(AccountBalanceAssignment {
        id: row.try_get("id")?,
        household_id: row.try_get("household_id")?,
        budget_month_id: row.try_get("budget_month_id")?,
        envelope: envelope_cols(row, "category_id", "section_id")?,
        amount: decimal_col(row, "amount")?,
    })
}

pub async fn insert_account_balance_assignment(
    conn: &mut SqliteConnection,
    household_id: i64,
    budget_month_id: i64,
    envelope: EnvelopeRef,
    amount: Decimal,
) -> Result<AccountBalanceAssignment, sqlx::Error> {
    let (category_id, section_id) = envelope.columns();
    let row = sqlx::query(
        r#"
        INSERT INTO account_balance_assignments (household_id, budget_month_id, category_id, section_id, amount)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id, household_id, budget_month_id, category_id, section_id, amount
        "#,
    )
    .bind(household_id)
    .bind(budget_month_id)
    .bind(category_id)
    .bind(section_id)
    .bind(amount.to_string())
    .fetch_one(&mut *conn)
    .await?;

    map_account_balance_assignment(&row)
}

pub async fn get_account_balance_assignment(
    conn: &mut SqliteConnection,
    assignment_id: i64,
    household_id: i64,
) -> Result<Option<AccountBalanceAssignment>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT id, household_id, budget_month_id, category_id, section_id, amount
        FROM account_balance_assignments
        WHERE id = ? AND household_id = ?
        "#,
    )
    .bind(assignment_id)
    .bind(household_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(map_account_balance_assignment).transpose()
}

pub async fn list_account_balance_assignments(
    conn: &mut SqliteConnection,
    budget_month_id: i64,
) -> Result<Vec<AccountBalanceAssignment>, sqlx::Error> {
    sqlx::query(
        r#"
        SELECT id, household_id, budget_month_id, category_id, section_id, amount
        FROM account_balance_assignments
        WHERE budget_month_id = ?
        ORDER BY id ASC
        "#,
    )
    .bind(budget_month_id)
    .fetch_all(&mut *conn)
    .await?
    .iter()
    .map(map_account_balance_assignment)
    .collect::<Result<Vec<AccountBalanceAssignment>, sqlx::Error>>()
}

pub async fn delete_account_balance_assignment(
    conn: &mut SqliteConnection,
    assignment_id: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM account_balance_assignments WHERE id = ?")
        .bind(assignment_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

// Opening-balance cash is one-shot, so this spans every month.
pub async fn total_account_balance_assigned(
    conn: &mut SqliteConnection,
    household_id: i64,
) -> Result<Decimal, sqlx::Error> {
    let rows = sqlx::query("SELECT amount FROM account_balance_assignments WHERE household_id = ?")
        .bind(household_id)
        .fetch_all(&mut *conn)
        .await?;
    sum_amounts(&rows, "amount")
}

/*========== Transfer Queries =========== */

fn map_transfer(row: &SqliteRow) -> Result<AssignmentTransfer, sqlx::Error> {
    Ok(AssignmentTransfer {
        id: row.try_get("id")?,
        budget_month_id: row.try_get("budget_month_id")?,
        source: envelope_cols(row, "from_category_id", "from_section_id")?,
        destination: envelope_cols(row, "to_category_id", "to_section_id")?,
        amount: decimal_col(row, "amount")?,
        notes: row.try_get("notes")?,
        created_by: row.try_get("created_by")?,
    })
}

pub async fn insert_transfer(
    conn: &mut SqliteConnection,
    budget_month_id: i64,
    req: &TransferRequest,
) -> Result<AssignmentTransfer, sqlx::Error> {
    let (from_category_id, from_section_id) = req.source.columns();
    let (to_category_id, to_section_id) = req.destination.columns();
    let row = sqlx::query(
        r#"
        INSERT INTO assignment_transfers (
            budget_month_id, from_category_id, from_section_id,
            to_category_id, to_section_id, amount, notes, created_by
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id, budget_month_id, from_category_id, from_section_id,
                  to_category_id, to_section_id, amount, notes, created_by
        "#,
    )
    .bind(budget_month_id)
    .bind(from_category_id)
    .bind(from_section_id)
    .bind(to_category_id)
    .bind(to_section_id)
    .bind(req.amount.to_string())
    .bind(req.notes.as_deref())
    .bind(req.created_by)
    .fetch_one(&mut *conn)
    .await?;

    map_transfer(&row)
}

pub async fn list_transfers(
    conn: &mut SqliteConnection,
    budget_month_id: i64,
) -> Result<Vec<AssignmentTransfer>, sqlx::Error> {
    sqlx::query(
        r#"
        SELECT id, budget_month_id, from_category_id, from_section_id,
               to_category_id, to_section_id, amount, notes, created_by
        FROM assignment_transfers
        WHERE budget_month_id = ?
        ORDER BY id ASC
        "#,
    )
    .bind(budget_month_id)
    .fetch_all(&mut *conn)
    .await?
    .iter()
    .map(map_transfer)
    .collect::<Result<Vec<AssignmentTransfer>, sqlx::Error>>()
}

/*========== Derived Assigned Amount =========== */

async fn envelope_sum(
    conn: &mut SqliteConnection,
    sql: &str,
    budget_month_id: i64,
    envelope: EnvelopeRef,
) -> Result<Decimal, sqlx::Error> {
    let (category_id, section_id) = envelope.columns();
    let rows = sqlx::query(sql)
        .bind(budget_month_id)
        .bind(category_id)
        .bind(section_id)
        .fetch_all(&mut *conn)
        .await?;
    sum_amounts(&rows, "amount")
}

/// income + opening balance + transfers in - transfers out, for one envelope in one month.
pub async fn derived_assigned_amount(
    conn: &mut SqliteConnection,
    budget_month_id: i64,
    envelope: EnvelopeRef,
) -> Result<Decimal, sqlx::Error> {
    let income = envelope_sum(
        conn,
        "SELECT amount FROM income_assignments \
         WHERE budget_month_id = ? AND category_id IS ? AND section_id IS ?",
        budget_month_id,
        envelope,
    )
    .await?;
    let opening = envelope_sum(
        conn,
        "SELECT amount FROM account_balance_assignments \
         WHERE budget_month_id = ? AND category_id IS ? AND section_id IS ?",
        budget_month_id,
        envelope,
    )
    .await?;
    let transfers_in = envelope_sum(
        conn,
        "SELECT amount FROM assignment_transfers \
         WHERE budget_month_id = ? AND to_category_id IS ? AND to_section_id IS ?",
        budget_month_id,
        envelope,
    )
    .await?;
    let transfers_out = envelope_sum(
        conn,
        "SELECT amount FROM assignment_transfers \
         WHERE budget_month_id = ? AND from_category_id IS ? AND from_section_id IS ?",
        budget_month_id,
        envelope,
    )
    .await?;

    Ok(income + opening + transfers_in - transfers_out)
}

/*========== Savings Reserve Queries =========== */

fn map_reserve(row: &SqliteRow) -> Result<SavingsReserve, sqlx::Error> {
    Ok(SavingsReserve {
        id: row.try_get("id")?,
        household_id: row.try_get("household_id")?,
        transaction_id: row.try_get("transaction_id")?,
        amount: decimal_col(row, "amount")?,
        notes: row.try_get("notes")?,
    })
}

pub async fn insert_reserve(
    conn: &mut SqliteConnection,
    household_id: i64,
    transaction_id: i64,
    amount: Decimal,
    notes: Option<&str>,
) -> Result<SavingsReserve, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO income_reserves (household_id, transaction_id, amount, notes)
        VALUES (?, ?, ?, ?)
        RETURNING id, household_id, transaction_id, amount, notes
        "#,
    )
    .bind(household_id)
    .bind(transaction_id)
    .bind(amount.to_string())
    .bind(notes)
    .fetch_one(&mut *conn)
    .await?;

    map_reserve(&row)
}

pub async fn get_reserve(
    conn: &mut SqliteConnection,
    reserve_id: i64,
    household_id: i64,
) -> Result<Option<SavingsReserve>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT id, household_id, transaction_id, amount, notes
        FROM income_reserves
        WHERE id = ? AND household_id = ?
        "#,
    )
    .bind(reserve_id)
    .bind(household_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(map_reserve).transpose()
}

pub async fn delete_reserve(conn: &mut SqliteConnection, reserve_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM income_reserves WHERE id = ?")
        .bind(reserve_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn reserved_for_transaction(
    conn: &mut SqliteConnection,
    transaction_id: i64,
) -> Result<Decimal, sqlx::Error> {
    let rows = sqlx::query("SELECT amount FROM income_reserves WHERE transaction_id = ?")
        .bind(transaction_id)
        .fetch_all(&mut *conn)
        .await?;
    sum_amounts(&rows, "amount")
}

/// Reserved totals per transaction, for transactions dated in [start, end).
pub async fn reserved_by_transaction(
    conn: &mut SqliteConnection,
    household_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<HashMap<i64, Decimal>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT r.transaction_id, r.amount
        FROM income_reserves r
        JOIN transactions t ON t.id = r.transaction_id
        WHERE r.household_id = ? AND t.transaction_date >= ? AND t.transaction_date < ?
        "#,
    )
    .bind(household_id)
    .bind(iso(&start))
    .bind(iso(&end))
    .fetch_all(&mut *conn)
    .await?;

    totals_by_transaction(&rows)
}
