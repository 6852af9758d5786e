pub mod account;
pub mod allocation;
pub mod assignment;
pub mod budget_month;
pub mod category;
pub mod envelope;
pub mod reserve;
pub mod section;
pub mod transaction;
pub mod transfer;

pub use account::Account;
pub use allocation::{Allocation, SetAllocation};
pub use assignment::{AccountBalanceAssignment, AssignmentId, EnvelopeAmount, IncomeAssignment};
pub use budget_month::BudgetMonth;
pub use category::Category;
pub use envelope::EnvelopeRef;
pub use reserve::SavingsReserve;
pub use section::{Section, SectionType};
pub use transaction::{LedgerTransaction, TransactionAvailability};
pub use transfer::{AssignmentTransfer, TransferRequest};
