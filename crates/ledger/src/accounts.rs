//! Account entity and derived read views.
//!
//! An account never stores its balance. Reads derive it from the initial
//! balance plus the fold of the account's transactions (see
//! [`AccountTotals`]).

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::transactions::{TransactionKind, TransferDirection};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    pub kind: String,
    pub initial_balance_minor: i64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Per-account transaction totals, all in minor units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountTotals {
    pub income_minor: i64,
    pub expense_minor: i64,
    pub transfer_in_minor: i64,
    pub transfer_out_minor: i64,
    pub transfer_net_minor: i64,
}

impl AccountTotals {
    /// Folds one `(kind, direction, sum)` aggregation row into the totals.
    ///
    /// Transfer rows without a direction are classified by the sign of the
    /// amount: non-negative counts as an inflow, negative as an outflow of
    /// the absolute value.
    pub(crate) fn apply(
        &mut self,
        kind: TransactionKind,
        direction: Option<TransferDirection>,
        sum_minor: i64,
    ) {
        match kind {
            TransactionKind::Income => self.income_minor += sum_minor,
            TransactionKind::Expense => self.expense_minor += sum_minor,
            TransactionKind::Transfer => match direction {
                Some(TransferDirection::In) => self.transfer_in_minor += sum_minor,
                Some(TransferDirection::Out) => self.transfer_out_minor += sum_minor,
                None if sum_minor >= 0 => self.transfer_in_minor += sum_minor,
                None => self.transfer_out_minor += sum_minor.abs(),
            },
        }
        self.transfer_net_minor = self.transfer_in_minor - self.transfer_out_minor;
    }

    /// Derived balance: `initial + income + transferIn - expense - transferOut`.
    pub(crate) fn balance(&self, initial_balance_minor: i64) -> i64 {
        initial_balance_minor + self.income_minor + self.transfer_in_minor
            - self.expense_minor
            - self.transfer_out_minor
    }
}

/// Read view of an account with its derived balance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccountView {
    pub id: i32,
    pub name: String,
    pub kind: String,
    pub initial_balance_minor: i64,
    pub created_at: DateTime<Utc>,
    pub balance_minor: i64,
    pub totals: AccountTotals,
}

impl AccountView {
    pub(crate) fn from_model(model: Model, totals: AccountTotals) -> Self {
        let balance_minor = totals.balance(model.initial_balance_minor);
        Self {
            id: model.id,
            name: model.name,
            kind: model.kind,
            initial_balance_minor: model.initial_balance_minor,
            created_at: model.created_at,
            balance_minor,
            totals,
        }
    }
}
