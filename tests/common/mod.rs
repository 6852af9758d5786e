#![allow(dead_code)]

use chrono::NaiveDate;
use household_budget::database::db::{connection, migrate};
use household_budget::database::models::SectionType;
use household_budget::Ledger;
use rust_decimal::Decimal;
use sqlx::{Pool, Row, Sqlite};
use tempfile::TempDir;

/// A fresh ledger database with one household. Catalog, account and
/// transaction rows belong to other services, so they are written directly.
pub struct Fixture {
    pub pool: Pool<Sqlite>,
    pub ledger: Ledger,
    pub household_id: i64,
    _dir: TempDir,
}

pub fn money(s: &str) -> Decimal {
    Decimal::from_str_exact(s).expect("valid decimal literal")
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid date literal")
}

impl Fixture {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let url = format!("sqlite://{}", dir.path().join("ledger.db").display());
        let pool = connection::get_db_pool(&connection::DbConfig::with_url(url))
            .await
            .expect("open pool");
        migrate::run_migrations(&pool).await.expect("run migrations");

        let household_id = insert_household(&pool, "Home").await;
        Self {
            ledger: Ledger::new(pool.clone()),
            pool,
            household_id,
            _dir: dir,
        }
    }

    pub async fn other_household(&self) -> i64 {
        insert_household(&self.pool, "Neighbours").await
    }

    pub async fn section(&self, name: &str, section_type: SectionType) -> i64 {
        self.section_for(self.household_id, name, section_type, false).await
    }

    pub async fn income_section(&self) -> i64 {
        self.section_for(self.household_id, "Income", SectionType::Fixed, true).await
    }

    pub async fn section_for(&self, household_id: i64, name: &str, section_type: SectionType, is_income: bool) -> i64 {
        sqlx::query("INSERT INTO sections (household_id, name, section_type, is_income) VALUES (?, ?, ?, ?) RETURNING id")
            .bind(household_id)
            .bind(name)
            .bind(section_type.as_str())
            .bind(is_income)
            .fetch_one(&self.pool)
            .await
            .expect("insert section")
            .get("id")
    }

    pub async fn category(&self, section_id: i64, name: &str) -> i64 {
        self.category_for(self.household_id, section_id, name).await
    }

    pub async fn category_for(&self, household_id: i64, section_id: i64, name: &str) -> i64 {
        sqlx::query("INSERT INTO categories (household_id, section_id, name) VALUES (?, ?, ?) RETURNING id")
            .bind(household_id)
            .bind(section_id)
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .expect("insert category")
            .get("id")
    }

    pub async fn account(&self, opening_balance: &str) -> i64 {
        sqlx::query("INSERT INTO accounts (household_id, name, opening_balance) VALUES (?, 'Chequing', ?) RETURNING id")
            .bind(self.household_id)
            .bind(opening_balance)
            .fetch_one(&self.pool)
            .await
            .expect("insert account")
            .get("id")
    }

    /// Positive ledger transaction (income) on the given date.
    pub async fn income(&self, on: &str, amount: &str) -> i64 {
        self.transaction(None, on, amount).await
    }

    /// Spending is stored as a negative amount against a category.
    pub async fn spend(&self, category_id: i64, on: &str, amount: &str) -> i64 {
        self.transaction(Some(category_id), on, &format!("-{amount}")).await
    }

    async fn transaction(&self, category_id: Option<i64>, on: &str, amount: &str) -> i64 {
        sqlx::query(
            "INSERT INTO transactions (household_id, category_id, amount, transaction_date) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(self.household_id)
        .bind(category_id)
        .bind(amount)
        .bind(on)
        .fetch_one(&self.pool)
        .await
        .expect("insert transaction")
        .get("id")
    }

    /// Sum of income assignment rows drawn from one transaction.
    pub async fn assigned_from(&self, transaction_id: i64) -> Decimal {
        self.ledger
            .transaction_availability(self.household_id, transaction_id)
            .await
            .expect("transaction availability")
            .assigned
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await
            .expect("count rows")
    }
}

async fn insert_household(pool: &Pool<Sqlite>, name: &str) -> i64 {
    sqlx::query("INSERT INTO households (name) VALUES (?) RETURNING id")
        .bind(name)
        .fetch_one(pool)
        .await
        .expect("insert household")
        .get("id")
}
