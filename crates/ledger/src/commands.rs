//! Command structs for ledger write operations.
//!
//! These types group parameters for transaction creation and update,
//! keeping call sites readable and avoiding long argument lists.

use chrono::{DateTime, Utc};

use crate::transactions::TransactionKind;

/// Create a transaction (or, for transfers and installment plans, a group
/// of rows).
#[derive(Clone, Debug)]
pub struct CreateTransactionCmd {
    pub user_id: i32,
    pub kind: TransactionKind,
    pub account_id: i32,
    pub target_account_id: Option<i32>,
    pub category_id: Option<i32>,
    pub amount_minor: i64,
    pub occurred_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub attachment_url: Option<String>,
    pub recurrence_rule: Option<String>,
    pub installments_total: Option<u32>,
    pub installment_number: Option<i32>,
}

impl CreateTransactionCmd {
    #[must_use]
    pub fn new(
        user_id: i32,
        kind: TransactionKind,
        account_id: i32,
        amount_minor: i64,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            kind,
            account_id,
            target_account_id: None,
            category_id: None,
            amount_minor,
            occurred_at,
            notes: None,
            tags: Vec::new(),
            attachment_url: None,
            recurrence_rule: None,
            installments_total: None,
            installment_number: None,
        }
    }

    #[must_use]
    pub fn target_account_id(mut self, target_account_id: i32) -> Self {
        self.target_account_id = Some(target_account_id);
        self
    }

    #[must_use]
    pub fn category_id(mut self, category_id: i32) -> Self {
        self.category_id = Some(category_id);
        self
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    #[must_use]
    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    #[must_use]
    pub fn attachment_url(mut self, url: impl Into<String>) -> Self {
        self.attachment_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn recurrence_rule(mut self, rule: impl Into<String>) -> Self {
        self.recurrence_rule = Some(rule.into());
        self
    }

    #[must_use]
    pub fn installments_total(mut self, total: u32) -> Self {
        self.installments_total = Some(total);
        self
    }

    #[must_use]
    pub fn installment_number(mut self, number: i32) -> Self {
        self.installment_number = Some(number);
        self
    }
}

/// Patch an existing transaction. `None` fields are left untouched;
/// `category_id` uses a double option so the category can be cleared.
#[derive(Clone, Debug, Default)]
pub struct UpdateTransactionCmd {
    pub kind: Option<TransactionKind>,
    pub account_id: Option<i32>,
    pub target_account_id: Option<i32>,
    pub category_id: Option<Option<i32>>,
    pub amount_minor: Option<i64>,
    pub occurred_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
    pub attachment_url: Option<String>,
    pub recurrence_rule: Option<String>,
    pub installments_total: Option<i32>,
    pub installment_number: Option<i32>,
}

impl UpdateTransactionCmd {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn kind(mut self, kind: TransactionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn account_id(mut self, account_id: i32) -> Self {
        self.account_id = Some(account_id);
        self
    }

    #[must_use]
    pub fn target_account_id(mut self, target_account_id: i32) -> Self {
        self.target_account_id = Some(target_account_id);
        self
    }

    #[must_use]
    pub fn category_id(mut self, category_id: Option<i32>) -> Self {
        self.category_id = Some(category_id);
        self
    }

    #[must_use]
    pub fn amount_minor(mut self, amount_minor: i64) -> Self {
        self.amount_minor = Some(amount_minor);
        self
    }

    #[must_use]
    pub fn occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(occurred_at);
        self
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    #[must_use]
    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    #[must_use]
    pub fn attachment_url(mut self, url: impl Into<String>) -> Self {
        self.attachment_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn recurrence_rule(mut self, rule: impl Into<String>) -> Self {
        self.recurrence_rule = Some(rule.into());
        self
    }

    #[must_use]
    pub fn installments_total(mut self, total: i32) -> Self {
        self.installments_total = Some(total);
        self
    }

    #[must_use]
    pub fn installment_number(mut self, number: i32) -> Self {
        self.installment_number = Some(number);
        self
    }

    /// Names of the fields a transfer group refuses to patch, for the
    /// conflict message. Empty when the patch is metadata-only.
    pub(crate) fn transfer_disallowed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.kind.is_some() {
            fields.push("type");
        }
        if self.amount_minor.is_some() {
            fields.push("amount");
        }
        if self.account_id.is_some() {
            fields.push("accountId");
        }
        if self.category_id.is_some() {
            fields.push("categoryId");
        }
        if self.target_account_id.is_some() {
            fields.push("targetAccountId");
        }
        if self.installments_total.is_some() {
            fields.push("installmentsTotal");
        }
        if self.installment_number.is_some() {
            fields.push("installmentNumber");
        }
        fields
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.kind.is_none()
            && self.account_id.is_none()
            && self.target_account_id.is_none()
            && self.category_id.is_none()
            && self.amount_minor.is_none()
            && self.occurred_at.is_none()
            && self.notes.is_none()
            && self.tags.is_none()
            && self.attachment_url.is_none()
            && self.recurrence_rule.is_none()
            && self.installments_total.is_none()
            && self.installment_number.is_none()
    }
}
