//! Transaction entity, the enums stored in its text columns, and the read
//! view returned by the operations layer.
//!
//! Transfers and installment plans are persisted as groups of plain rows
//! sharing a `group_id`; the entity itself has no notion of a group beyond
//! those two columns.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub account_id: i32,
    pub category_id: Option<i32>,
    pub kind: String,
    pub amount_minor: i64,
    pub occurred_at: DateTimeUtc,
    pub notes: Option<String>,
    /// JSON array of normalized tags, e.g. `["food","travel"]`.
    pub tags: String,
    pub attachment_url: Option<String>,
    pub recurrence_rule: Option<String>,
    pub transfer_direction: Option<String>,
    pub target_account_id: Option<i32>,
    pub group_id: Option<String>,
    pub group_kind: Option<String>,
    pub installments_total: Option<i32>,
    pub installment_number: Option<i32>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountId",
        to = "super::accounts::Column::Id"
    )]
    Account,
    #[sea_orm(
        belongs_to = "super::categories::Entity",
        from = "Column::CategoryId",
        to = "super::categories::Column::Id"
    )]
    Category,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl Related<super::categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
    Transfer,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Transfer => "transfer",
        }
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            "transfer" => Ok(Self::Transfer),
            other => Err(LedgerError::Conflict(format!(
                "unknown transaction kind '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of a transfer pair a row records.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    In,
    Out,
}

impl TransferDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

impl TryFrom<&str> for TransferDirection {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "in" => Ok(Self::In),
            "out" => Ok(Self::Out),
            other => Err(LedgerError::Conflict(format!(
                "unknown transfer direction '{other}'"
            ))),
        }
    }
}

/// Why a set of rows shares a `group_id`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    Transfer,
    Installment,
}

impl GroupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transfer => "transfer",
            Self::Installment => "installment",
        }
    }
}

impl TryFrom<&str> for GroupKind {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "transfer" => Ok(Self::Transfer),
            "installment" => Ok(Self::Installment),
            other => Err(LedgerError::Conflict(format!("unknown group kind '{other}'"))),
        }
    }
}

/// Read view of a single transaction row with names resolved and tags
/// decoded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionView {
    pub id: i32,
    pub account_id: i32,
    pub account_name: Option<String>,
    pub category_id: Option<i32>,
    pub category_name: Option<String>,
    pub kind: TransactionKind,
    pub amount_minor: i64,
    pub occurred_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub attachment_url: Option<String>,
    pub recurrence_rule: Option<String>,
    pub transfer_direction: Option<TransferDirection>,
    pub target_account_id: Option<i32>,
    pub group_id: Option<String>,
    pub group_kind: Option<GroupKind>,
    pub installments_total: Option<i32>,
    pub installment_number: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl TransactionView {
    pub(crate) fn from_parts(
        model: Model,
        account_name: Option<String>,
        category_name: Option<String>,
    ) -> Result<Self, LedgerError> {
        let kind = TransactionKind::try_from(model.kind.as_str())?;
        let transfer_direction = model
            .transfer_direction
            .as_deref()
            .map(TransferDirection::try_from)
            .transpose()?;
        let group_kind = model
            .group_kind
            .as_deref()
            .map(GroupKind::try_from)
            .transpose()?;
        Ok(Self {
            id: model.id,
            account_id: model.account_id,
            account_name,
            category_id: model.category_id,
            category_name,
            kind,
            amount_minor: model.amount_minor,
            occurred_at: model.occurred_at,
            notes: model.notes,
            tags: decode_tags(&model.tags),
            attachment_url: model.attachment_url,
            recurrence_rule: model.recurrence_rule,
            transfer_direction,
            target_account_id: model.target_account_id,
            group_id: model.group_id,
            group_kind,
            installments_total: model.installments_total,
            installment_number: model.installment_number,
            created_at: model.created_at,
        })
    }
}

pub(crate) fn encode_tags(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_owned())
}

pub(crate) fn decode_tags(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}
