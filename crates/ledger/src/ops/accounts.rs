use std::collections::HashMap;

use sea_orm::{
    ActiveValue, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*,
    sea_query::Expr,
};

use crate::{
    LedgerError, LedgerResult, accounts,
    accounts::{AccountTotals, AccountView},
    transactions,
    transactions::{TransactionKind, TransferDirection},
};

use super::{Ledger, normalize_required_name, with_tx};

impl Ledger {
    /// Lists the user's accounts with balances derived in one grouped
    /// aggregation query instead of a per-account scan.
    pub async fn list_accounts(&self, user_id: i32) -> LedgerResult<Vec<AccountView>> {
        let models: Vec<accounts::Model> = accounts::Entity::find()
            .filter(accounts::Column::UserId.eq(user_id))
            .order_by_asc(accounts::Column::CreatedAt)
            .order_by_asc(accounts::Column::Id)
            .all(&self.database)
            .await?;

        let mut totals = self.account_totals(user_id).await?;
        Ok(models
            .into_iter()
            .map(|model| {
                let account_totals = totals.remove(&model.id).unwrap_or_default();
                AccountView::from_model(model, account_totals)
            })
            .collect())
    }

    pub async fn get_account(&self, user_id: i32, account_id: i32) -> LedgerResult<AccountView> {
        let model = accounts::Entity::find_by_id(account_id)
            .filter(accounts::Column::UserId.eq(user_id))
            .one(&self.database)
            .await?
            .ok_or_else(|| LedgerError::NotFound("account".to_string()))?;

        let mut totals = self.account_totals(user_id).await?;
        let account_totals = totals.remove(&account_id).unwrap_or_default();
        Ok(AccountView::from_model(model, account_totals))
    }

    pub async fn create_account(
        &self,
        user_id: i32,
        name: &str,
        kind: &str,
        initial_balance_minor: i64,
    ) -> LedgerResult<AccountView> {
        let name = normalize_required_name(name, "account")?;
        let kind = normalize_required_name(kind, "account kind")?;
        let model = accounts::ActiveModel {
            user_id: ActiveValue::Set(user_id),
            name: ActiveValue::Set(name),
            kind: ActiveValue::Set(kind),
            initial_balance_minor: ActiveValue::Set(initial_balance_minor),
            created_at: ActiveValue::Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(&self.database)
        .await
        .map_err(|err| LedgerError::on_write(err, "account"))?;

        tracing::debug!(account_id = model.id, user_id, "account created");
        Ok(AccountView::from_model(model, AccountTotals::default()))
    }

    pub async fn update_account(
        &self,
        user_id: i32,
        account_id: i32,
        name: Option<&str>,
        kind: Option<&str>,
        initial_balance_minor: Option<i64>,
    ) -> LedgerResult<AccountView> {
        let result: LedgerResult<()> = with_tx!(self, |db_tx| {
            self.require_account(&db_tx, user_id, account_id).await?;
            let mut model = accounts::ActiveModel {
                id: ActiveValue::Set(account_id),
                ..Default::default()
            };
            if let Some(name) = name {
                model.name = ActiveValue::Set(normalize_required_name(name, "account")?);
            }
            if let Some(kind) = kind {
                model.kind = ActiveValue::Set(normalize_required_name(kind, "account kind")?);
            }
            if let Some(initial) = initial_balance_minor {
                model.initial_balance_minor = ActiveValue::Set(initial);
            }
            model
                .update(&db_tx)
                .await
                .map_err(|err| LedgerError::on_write(err, "account"))?;
            Ok(())
        });
        result?;

        self.get_account(user_id, account_id).await
    }

    pub async fn delete_account(&self, user_id: i32, account_id: i32) -> LedgerResult<()> {
        with_tx!(self, |db_tx| {
            self.require_account(&db_tx, user_id, account_id).await?;
            accounts::Entity::delete_by_id(account_id).exec(&db_tx).await?;
            tracing::debug!(account_id, user_id, "account deleted");
            Ok(())
        })
    }

    /// One row per `(account, kind, direction)` triple; the fold into
    /// [`AccountTotals`] handles direction-less transfer rows by sign.
    async fn account_totals(&self, user_id: i32) -> LedgerResult<HashMap<i32, AccountTotals>> {
        let rows: Vec<(i32, String, Option<String>, Option<i64>)> = transactions::Entity::find()
            .select_only()
            .column(transactions::Column::AccountId)
            .column(transactions::Column::Kind)
            .column(transactions::Column::TransferDirection)
            .column_as(Expr::col(transactions::Column::AmountMinor).sum(), "total")
            .filter(transactions::Column::UserId.eq(user_id))
            .group_by(transactions::Column::AccountId)
            .group_by(transactions::Column::Kind)
            .group_by(transactions::Column::TransferDirection)
            .into_tuple()
            .all(&self.database)
            .await?;

        let mut totals: HashMap<i32, AccountTotals> = HashMap::new();
        for (account_id, kind, direction, sum) in rows {
            let kind = TransactionKind::try_from(kind.as_str())?;
            let direction = direction
                .as_deref()
                .map(TransferDirection::try_from)
                .transpose()?;
            totals
                .entry(account_id)
                .or_default()
                .apply(kind, direction, sum.unwrap_or(0));
        }
        Ok(totals)
    }
}
