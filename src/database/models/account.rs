use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub household_id: i64,
    pub name: String,               // account name defined by user (cash/RBC chequing)
    pub opening_balance: Decimal,   // cash that existed before the ledger started
    pub is_active: bool,
}
