pub mod database;
pub mod ledger;
pub mod util;

pub use database::models::EnvelopeRef;
pub use ledger::{ErrorKind, Ledger, LedgerError, LedgerResult};
