//! Personal finance ledger engine.
//!
//! The crate owns the business logic for accounts, categories, transactions
//! and budgets of a single-user-per-row finance application:
//!
//! - balances are never stored: they are derived on every read from the
//!   account's initial balance plus the fold of its transactions
//! - transfers are persisted as two mirrored rows (source OUT / target IN)
//!   sharing a group id, and installment plans as N rows whose amounts sum
//!   exactly to the requested total
//! - every multi-row write commits atomically or not at all
//!
//! The HTTP layer is not part of this crate. Callers hand in already-parsed
//! commands plus an authenticated user id, and receive plain view structs or
//! a typed [`LedgerError`].

pub use accounts::{AccountTotals, AccountView};
pub use budgets::BudgetView;
pub use categories::{CategoryNode, CategoryView};
pub use commands::{CreateTransactionCmd, UpdateTransactionCmd};
pub use error::LedgerError;
pub use money::Amount;
pub use ops::{Ledger, LedgerBuilder, PaginationMeta, TransactionListFilter};
pub use schedule::{Installment, installment_schedule};
pub use transactions::{GroupKind, TransactionKind, TransactionView, TransferDirection};

mod accounts;
mod budgets;
mod categories;
mod commands;
mod error;
mod money;
mod ops;
mod schedule;
mod transactions;

type LedgerResult<T> = Result<T, LedgerError>;
