//! Transaction listing and the grouped write protocol.
//!
//! Transfers always persist as mirrored row pairs and installment plans as
//! one row per installment, so every multi-row write runs inside a single
//! DB transaction.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, Condition, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait, prelude::*, sea_query,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    CreateTransactionCmd, LedgerError, LedgerResult, UpdateTransactionCmd, accounts, categories,
    schedule::installment_schedule, transactions,
    transactions::{GroupKind, TransactionKind, TransactionView, TransferDirection, encode_tags},
};

use super::{Ledger, normalize_optional_text, normalize_tags, with_tx};

const DEFAULT_PAGE_SIZE: u64 = 20;
const MAX_PAGE_SIZE: u64 = 100;

/// Filters for listing transactions.
///
/// `from` and `to` are both inclusive, in UTC. Amount bounds are inclusive
/// too.
#[derive(Clone, Debug, Default)]
pub struct TransactionListFilter {
    /// If present, acts as an allow-list of kinds to return.
    pub kinds: Option<Vec<TransactionKind>>,
    pub account_id: Option<i32>,
    pub category_id: Option<i32>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub min_amount_minor: Option<i64>,
    pub max_amount_minor: Option<i64>,
    /// Tag allow-list: a row matches when it carries any of these tags.
    pub tags: Option<Vec<String>>,
    /// Substring search over notes, attachment URLs, account and category
    /// names, plus an exact match on the normalized tag.
    pub query: Option<String>,
    /// 1-based page number, defaults to 1.
    pub page: Option<u64>,
    /// Defaults to 20, capped at 100.
    pub page_size: Option<u64>,
}

/// Pagination envelope returned alongside a listing page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
    pub page_count: u64,
}

fn validate_list_filter(filter: &TransactionListFilter) -> LedgerResult<()> {
    if let (Some(from), Some(to)) = (filter.from, filter.to)
        && from > to
    {
        return Err(LedgerError::Conflict(
            "invalid range: from must be <= to".to_string(),
        ));
    }
    if filter.kinds.as_ref().is_some_and(|k| k.is_empty()) {
        return Err(LedgerError::Conflict("kinds must not be empty".to_string()));
    }
    if let (Some(min), Some(max)) = (filter.min_amount_minor, filter.max_amount_minor)
        && min > max
    {
        return Err(LedgerError::Conflict(
            "invalid range: minAmount must be <= maxAmount".to_string(),
        ));
    }
    Ok(())
}

fn page_bounds(filter: &TransactionListFilter) -> (u64, u64) {
    let page = filter.page.unwrap_or(1).max(1);
    let page_size = filter
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    (page, page_size)
}

fn apply_filters(
    select: Select<transactions::Entity>,
    user_id: i32,
    filter: &TransactionListFilter,
) -> Select<transactions::Entity> {
    let mut select = select.filter(transactions::Column::UserId.eq(user_id));
    if let Some(kinds) = &filter.kinds {
        let kinds: Vec<&str> = kinds.iter().map(TransactionKind::as_str).collect();
        select = select.filter(transactions::Column::Kind.is_in(kinds));
    }
    if let Some(account_id) = filter.account_id {
        select = select.filter(transactions::Column::AccountId.eq(account_id));
    }
    if let Some(category_id) = filter.category_id {
        select = select.filter(transactions::Column::CategoryId.eq(category_id));
    }
    if let Some(from) = filter.from {
        select = select.filter(transactions::Column::OccurredAt.gte(from));
    }
    if let Some(to) = filter.to {
        select = select.filter(transactions::Column::OccurredAt.lte(to));
    }
    if let Some(min) = filter.min_amount_minor {
        select = select.filter(transactions::Column::AmountMinor.gte(min));
    }
    if let Some(max) = filter.max_amount_minor {
        select = select.filter(transactions::Column::AmountMinor.lte(max));
    }
    if let Some(tags) = &filter.tags {
        // Tags are stored as a JSON array; matching the quoted tag substring
        // is exact because normalized tags never contain quotes.
        let mut any_tag = Condition::any();
        for tag in normalize_tags(tags) {
            any_tag = any_tag.add(transactions::Column::Tags.contains(format!("\"{tag}\"")));
        }
        select = select.filter(any_tag);
    }
    if let Some(query) = filter.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        // Free-text search also covers the account name, the category name
        // and the normalized tag, matched through subqueries so the listing
        // stays a single-table select.
        let matching_accounts = sea_query::Query::select()
            .column(accounts::Column::Id)
            .from(accounts::Entity)
            .and_where(accounts::Column::UserId.eq(user_id))
            .and_where(accounts::Column::Name.contains(query))
            .to_owned();
        let matching_categories = sea_query::Query::select()
            .column(categories::Column::Id)
            .from(categories::Entity)
            .and_where(categories::Column::UserId.eq(user_id))
            .and_where(categories::Column::Name.contains(query))
            .to_owned();
        select = select.filter(
            Condition::any()
                .add(transactions::Column::Notes.contains(query))
                .add(transactions::Column::AttachmentUrl.contains(query))
                .add(
                    transactions::Column::Tags
                        .contains(format!("\"{}\"", query.to_lowercase())),
                )
                .add(transactions::Column::AccountId.in_subquery(matching_accounts))
                .add(transactions::Column::CategoryId.in_subquery(matching_categories)),
        );
    }
    select
}

impl Ledger {
    /// One page of the user's transactions, newest first.
    pub async fn list_transactions(
        &self,
        user_id: i32,
        filter: &TransactionListFilter,
    ) -> LedgerResult<(Vec<TransactionView>, PaginationMeta)> {
        validate_list_filter(filter)?;
        let (page, page_size) = page_bounds(filter);

        let select = apply_filters(transactions::Entity::find(), user_id, filter);
        let total = select.clone().count(&self.database).await?;
        let models = select
            .order_by_desc(transactions::Column::OccurredAt)
            .order_by_desc(transactions::Column::Id)
            .offset((page - 1) * page_size)
            .limit(page_size)
            .all(&self.database)
            .await?;

        let account_names = self.account_names(&models).await?;
        let category_names = self.category_names(&models).await?;
        let items = models
            .into_iter()
            .map(|model| {
                let account_name = account_names.get(&model.account_id).cloned();
                let category_name = model
                    .category_id
                    .and_then(|id| category_names.get(&id).cloned());
                TransactionView::from_parts(model, account_name, category_name)
            })
            .collect::<LedgerResult<Vec<_>>>()?;

        let meta = PaginationMeta {
            page,
            page_size,
            total,
            page_count: total.div_ceil(page_size).max(1),
        };
        Ok((items, meta))
    }

    pub async fn get_transaction(
        &self,
        user_id: i32,
        transaction_id: i32,
    ) -> LedgerResult<TransactionView> {
        let model = transactions::Entity::find_by_id(transaction_id)
            .filter(transactions::Column::UserId.eq(user_id))
            .one(&self.database)
            .await?
            .ok_or_else(|| LedgerError::NotFound("transaction".to_string()))?;
        self.transaction_view(model).await
    }

    /// Creates one transaction, or a whole group when the command describes
    /// a transfer or an installment plan.
    ///
    /// Returns the view of the first row (the first source row for
    /// transfers, the first installment for plans).
    pub async fn create_transaction(
        &self,
        cmd: CreateTransactionCmd,
    ) -> LedgerResult<TransactionView> {
        if cmd.amount_minor <= 0 {
            return Err(LedgerError::Conflict(
                "amount must be greater than zero".to_string(),
            ));
        }

        let installment_count = cmd.installments_total.filter(|total| *total > 1);
        let is_plan = installment_count.is_some();
        if is_plan && cmd.installment_number.is_some_and(|n| n != 1) {
            return Err(LedgerError::Conflict(
                "provide only installmentsTotal or set installmentNumber to 1 when creating an installment plan"
                    .to_string(),
            ));
        }

        let schedule = installment_schedule(
            cmd.amount_minor,
            installment_count.unwrap_or(1),
            cmd.occurred_at,
        )?;
        let tags = encode_tags(&normalize_tags(&cmd.tags));
        let notes = normalize_optional_text(cmd.notes.as_deref());
        let attachment_url = normalize_optional_text(cmd.attachment_url.as_deref());
        let recurrence_rule = normalize_optional_text(cmd.recurrence_rule.as_deref());
        // Non-plan rows carry the caller's installment fields verbatim, so a
        // single imported installment can say "3 of 12".
        let stored_total = installment_count
            .map(|total| i32::try_from(total).unwrap_or(i32::MAX))
            .or_else(|| cmd.installments_total.map(|total| i32::try_from(total).unwrap_or(i32::MAX)));

        let model = with_tx!(self, |db_tx| {
            self.require_account(&db_tx, cmd.user_id, cmd.account_id)
                .await?;
            // Transfers drop the category on persist, but a foreign id still
            // has to fail rather than vanish silently.
            if let Some(category_id) = cmd.category_id {
                self.require_category(&db_tx, cmd.user_id, category_id)
                    .await?;
            }

            if cmd.kind == TransactionKind::Transfer {
                let target_account_id = cmd.target_account_id.ok_or_else(|| {
                    LedgerError::Conflict("transfers require targetAccountId".to_string())
                })?;
                if target_account_id == cmd.account_id {
                    return Err(LedgerError::Conflict(
                        "transfers require different source and target accounts".to_string(),
                    ));
                }
                self.require_account(&db_tx, cmd.user_id, target_account_id)
                    .await?;

                let group_id = Uuid::new_v4().to_string();
                let mut first_source: Option<transactions::Model> = None;
                for installment in &schedule {
                    let number = if is_plan {
                        Some(i32::try_from(installment.number).unwrap_or(i32::MAX))
                    } else {
                        cmd.installment_number
                    };
                    let base = transactions::ActiveModel {
                        user_id: ActiveValue::Set(cmd.user_id),
                        kind: ActiveValue::Set(TransactionKind::Transfer.as_str().to_string()),
                        category_id: ActiveValue::Set(None),
                        amount_minor: ActiveValue::Set(installment.amount_minor),
                        occurred_at: ActiveValue::Set(installment.occurred_at),
                        notes: ActiveValue::Set(notes.clone()),
                        tags: ActiveValue::Set(tags.clone()),
                        attachment_url: ActiveValue::Set(attachment_url.clone()),
                        recurrence_rule: ActiveValue::Set(recurrence_rule.clone()),
                        installments_total: ActiveValue::Set(stored_total),
                        installment_number: ActiveValue::Set(number),
                        group_id: ActiveValue::Set(Some(group_id.clone())),
                        group_kind: ActiveValue::Set(Some(
                            GroupKind::Transfer.as_str().to_string(),
                        )),
                        created_at: ActiveValue::Set(Utc::now()),
                        ..Default::default()
                    };

                    let mut source = base.clone();
                    source.account_id = ActiveValue::Set(cmd.account_id);
                    source.target_account_id = ActiveValue::Set(Some(target_account_id));
                    source.transfer_direction =
                        ActiveValue::Set(Some(TransferDirection::Out.as_str().to_string()));
                    let source = source
                        .insert(&db_tx)
                        .await
                        .map_err(|err| LedgerError::on_write(err, "transaction"))?;

                    let mut mirror = base;
                    mirror.account_id = ActiveValue::Set(target_account_id);
                    mirror.target_account_id = ActiveValue::Set(Some(cmd.account_id));
                    mirror.transfer_direction =
                        ActiveValue::Set(Some(TransferDirection::In.as_str().to_string()));
                    mirror
                        .insert(&db_tx)
                        .await
                        .map_err(|err| LedgerError::on_write(err, "transaction"))?;

                    first_source.get_or_insert(source);
                }

                tracing::debug!(
                    user_id = cmd.user_id,
                    %group_id,
                    rows = schedule.len() * 2,
                    "transfer group created"
                );
                first_source.ok_or_else(|| {
                    LedgerError::Conflict("transfer produced no installments".to_string())
                })
            } else {
                let group_id = is_plan.then(|| Uuid::new_v4().to_string());
                let group_kind = is_plan.then(|| GroupKind::Installment.as_str().to_string());
                let mut first: Option<transactions::Model> = None;
                for installment in &schedule {
                    let number = if is_plan {
                        Some(i32::try_from(installment.number).unwrap_or(i32::MAX))
                    } else {
                        cmd.installment_number
                    };
                    let row = transactions::ActiveModel {
                        user_id: ActiveValue::Set(cmd.user_id),
                        kind: ActiveValue::Set(cmd.kind.as_str().to_string()),
                        account_id: ActiveValue::Set(cmd.account_id),
                        category_id: ActiveValue::Set(cmd.category_id),
                        amount_minor: ActiveValue::Set(installment.amount_minor),
                        occurred_at: ActiveValue::Set(installment.occurred_at),
                        notes: ActiveValue::Set(notes.clone()),
                        tags: ActiveValue::Set(tags.clone()),
                        attachment_url: ActiveValue::Set(attachment_url.clone()),
                        recurrence_rule: ActiveValue::Set(recurrence_rule.clone()),
                        installments_total: ActiveValue::Set(stored_total),
                        installment_number: ActiveValue::Set(number),
                        group_id: ActiveValue::Set(group_id.clone()),
                        group_kind: ActiveValue::Set(group_kind.clone()),
                        created_at: ActiveValue::Set(Utc::now()),
                        ..Default::default()
                    }
                    .insert(&db_tx)
                    .await
                    .map_err(|err| LedgerError::on_write(err, "transaction"))?;
                    first.get_or_insert(row);
                }

                if let Some(group_id) = &group_id {
                    tracing::debug!(
                        user_id = cmd.user_id,
                        %group_id,
                        rows = schedule.len(),
                        "installment plan created"
                    );
                }
                first.ok_or_else(|| {
                    LedgerError::Conflict("transaction produced no installments".to_string())
                })
            }
        });

        self.transaction_view(model?).await
    }

    /// Patches one transaction. Rows of a transfer group accept metadata
    /// only (notes, tags, attachment URL, occurred-at, recurrence) and the
    /// patch is applied to every row of the group; anything else must be
    /// deleted and recreated.
    pub async fn update_transaction(
        &self,
        user_id: i32,
        transaction_id: i32,
        cmd: UpdateTransactionCmd,
    ) -> LedgerResult<TransactionView> {
        let result: LedgerResult<()> = with_tx!(self, |db_tx| {
            let existing = transactions::Entity::find_by_id(transaction_id)
                .filter(transactions::Column::UserId.eq(user_id))
                .one(&db_tx)
                .await?
                .ok_or_else(|| LedgerError::NotFound("transaction".to_string()))?;

            if let Some(account_id) = cmd.account_id {
                self.require_account(&db_tx, user_id, account_id).await?;
            }
            if let Some(target_account_id) = cmd.target_account_id {
                self.require_account(&db_tx, user_id, target_account_id)
                    .await?;
            }
            if let Some(Some(category_id)) = cmd.category_id {
                self.require_category(&db_tx, user_id, category_id).await?;
            }

            if existing.group_kind.as_deref() == Some(GroupKind::Transfer.as_str()) {
                let disallowed = cmd.transfer_disallowed_fields();
                if !disallowed.is_empty() {
                    return Err(LedgerError::Conflict(format!(
                        "transfers can only update metadata (notes, tags, attachmentUrl, occurredAt, recurrence); delete and recreate to change {}",
                        disallowed.join(", ")
                    )));
                }

                // An empty patch is a no-op read-back.
                if !cmd.is_empty() {
                    let mut patch = transactions::ActiveModel {
                        ..Default::default()
                    };
                    if let Some(notes) = &cmd.notes {
                        patch.notes = ActiveValue::Set(normalize_optional_text(Some(notes)));
                    }
                    if let Some(url) = &cmd.attachment_url {
                        patch.attachment_url =
                            ActiveValue::Set(normalize_optional_text(Some(url)));
                    }
                    if let Some(rule) = &cmd.recurrence_rule {
                        patch.recurrence_rule =
                            ActiveValue::Set(normalize_optional_text(Some(rule)));
                    }
                    if let Some(occurred_at) = cmd.occurred_at {
                        patch.occurred_at = ActiveValue::Set(occurred_at);
                    }
                    if let Some(tags) = &cmd.tags {
                        patch.tags = ActiveValue::Set(encode_tags(&normalize_tags(tags)));
                    }

                    transactions::Entity::update_many()
                        .set(patch)
                        .filter(transactions::Column::UserId.eq(user_id))
                        .filter(transactions::Column::GroupId.eq(existing.group_id.clone()))
                        .exec(&db_tx)
                        .await?;
                    tracing::debug!(
                        user_id,
                        group_id = existing.group_id.as_deref().unwrap_or(""),
                        "transfer metadata updated"
                    );
                }
                Ok(())
            } else {
                let mut patch = transactions::ActiveModel {
                    id: ActiveValue::Set(transaction_id),
                    ..Default::default()
                };
                if let Some(kind) = cmd.kind {
                    patch.kind = ActiveValue::Set(kind.as_str().to_string());
                }
                if let Some(account_id) = cmd.account_id {
                    patch.account_id = ActiveValue::Set(account_id);
                }
                if let Some(target_account_id) = cmd.target_account_id {
                    patch.target_account_id = ActiveValue::Set(Some(target_account_id));
                }
                if let Some(category_id) = cmd.category_id {
                    patch.category_id = ActiveValue::Set(category_id);
                }
                if let Some(amount_minor) = cmd.amount_minor {
                    if amount_minor <= 0 {
                        return Err(LedgerError::Conflict(
                            "amount must be greater than zero".to_string(),
                        ));
                    }
                    patch.amount_minor = ActiveValue::Set(amount_minor);
                }
                if let Some(occurred_at) = cmd.occurred_at {
                    patch.occurred_at = ActiveValue::Set(occurred_at);
                }
                if let Some(notes) = &cmd.notes {
                    patch.notes = ActiveValue::Set(normalize_optional_text(Some(notes)));
                }
                if let Some(url) = &cmd.attachment_url {
                    patch.attachment_url = ActiveValue::Set(normalize_optional_text(Some(url)));
                }
                if let Some(rule) = &cmd.recurrence_rule {
                    patch.recurrence_rule = ActiveValue::Set(normalize_optional_text(Some(rule)));
                }
                if let Some(tags) = &cmd.tags {
                    patch.tags = ActiveValue::Set(encode_tags(&normalize_tags(tags)));
                }
                if let Some(total) = cmd.installments_total {
                    patch.installments_total = ActiveValue::Set(Some(total));
                }
                if let Some(number) = cmd.installment_number {
                    patch.installment_number = ActiveValue::Set(Some(number));
                }
                patch
                    .update(&db_tx)
                    .await
                    .map_err(|err| LedgerError::on_write(err, "transaction"))?;
                Ok(())
            }
        });
        result?;

        self.get_transaction(user_id, transaction_id).await
    }

    /// Deleting any row of a transfer removes the whole mirrored group;
    /// deleting an installment removes that row alone and leaves its
    /// siblings in place.
    pub async fn delete_transaction(&self, user_id: i32, transaction_id: i32) -> LedgerResult<()> {
        with_tx!(self, |db_tx| {
            let existing = transactions::Entity::find_by_id(transaction_id)
                .filter(transactions::Column::UserId.eq(user_id))
                .one(&db_tx)
                .await?
                .ok_or_else(|| LedgerError::NotFound("transaction".to_string()))?;

            if existing.group_kind.as_deref() == Some(GroupKind::Transfer.as_str()) {
                transactions::Entity::delete_many()
                    .filter(transactions::Column::UserId.eq(user_id))
                    .filter(transactions::Column::GroupId.eq(existing.group_id.clone()))
                    .exec(&db_tx)
                    .await?;
                tracing::debug!(
                    user_id,
                    group_id = existing.group_id.as_deref().unwrap_or(""),
                    "transfer group deleted"
                );
            } else {
                transactions::Entity::delete_by_id(transaction_id)
                    .exec(&db_tx)
                    .await?;
                tracing::debug!(user_id, transaction_id, "transaction deleted");
            }
            Ok(())
        })
    }

    async fn transaction_view(&self, model: transactions::Model) -> LedgerResult<TransactionView> {
        let account_name = accounts::Entity::find_by_id(model.account_id)
            .one(&self.database)
            .await?
            .map(|account| account.name);
        let category_name = match model.category_id {
            Some(category_id) => categories::Entity::find_by_id(category_id)
                .one(&self.database)
                .await?
                .map(|category| category.name),
            None => None,
        };
        TransactionView::from_parts(model, account_name, category_name)
    }

    async fn account_names(
        &self,
        models: &[transactions::Model],
    ) -> LedgerResult<HashMap<i32, String>> {
        let ids: HashSet<i32> = models.iter().map(|model| model.account_id).collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = accounts::Entity::find()
            .filter(accounts::Column::Id.is_in(ids))
            .all(&self.database)
            .await?;
        Ok(rows.into_iter().map(|row| (row.id, row.name)).collect())
    }

    async fn category_names(
        &self,
        models: &[transactions::Model],
    ) -> LedgerResult<HashMap<i32, String>> {
        let ids: HashSet<i32> = models
            .iter()
            .filter_map(|model| model.category_id)
            .collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = categories::Entity::find()
            .filter(categories::Column::Id.is_in(ids))
            .all(&self.database)
            .await?;
        Ok(rows.into_iter().map(|row| (row.id, row.name)).collect())
    }
}
