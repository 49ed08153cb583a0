use std::collections::HashMap;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use sea_orm::{
    ActiveValue, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*,
    sea_query::Expr,
};

use crate::{
    LedgerError, LedgerResult, budgets, budgets::BudgetView, categories, transactions,
    transactions::TransactionKind,
};

use super::{Ledger, with_tx};

fn month_start(year: i32, month: i32) -> LedgerResult<DateTime<Utc>> {
    let month = u32::try_from(month)
        .ok()
        .filter(|m| (1..=12).contains(m))
        .ok_or_else(|| {
            LedgerError::Conflict(format!("month must be between 1 and 12, got {month}"))
        })?;
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| LedgerError::Conflict(format!("invalid budget period {year}-{month:02}")))
}

fn next_month_start(year: i32, month: i32) -> LedgerResult<DateTime<Utc>> {
    if month == 12 {
        month_start(year + 1, 1)
    } else {
        month_start(year, month + 1)
    }
}

impl Ledger {
    /// Lists the user's budgets with actuals computed by a single expense
    /// scan over the `[earliest month, latest month)` window, bucketed by
    /// `(category, year, month)`.
    pub async fn list_budgets(&self, user_id: i32) -> LedgerResult<Vec<BudgetView>> {
        let rows: Vec<(budgets::Model, Option<categories::Model>)> = budgets::Entity::find()
            .find_also_related(categories::Entity)
            .filter(budgets::Column::UserId.eq(user_id))
            .order_by_desc(budgets::Column::Year)
            .order_by_desc(budgets::Column::Month)
            .all(&self.database)
            .await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut window_start: Option<DateTime<Utc>> = None;
        let mut window_end: Option<DateTime<Utc>> = None;
        for (budget, _) in &rows {
            let start = month_start(budget.year, budget.month)?;
            let end = next_month_start(budget.year, budget.month)?;
            window_start = Some(window_start.map_or(start, |s| s.min(start)));
            window_end = Some(window_end.map_or(end, |e| e.max(end)));
        }

        let mut spent: HashMap<(i32, i32, i32), i64> = HashMap::new();
        if let (Some(start), Some(end)) = (window_start, window_end) {
            let expenses: Vec<(Option<i32>, i64, DateTime<Utc>)> = transactions::Entity::find()
                .select_only()
                .column(transactions::Column::CategoryId)
                .column(transactions::Column::AmountMinor)
                .column(transactions::Column::OccurredAt)
                .filter(transactions::Column::UserId.eq(user_id))
                .filter(transactions::Column::Kind.eq(TransactionKind::Expense.as_str()))
                .filter(transactions::Column::OccurredAt.gte(start))
                .filter(transactions::Column::OccurredAt.lt(end))
                .into_tuple()
                .all(&self.database)
                .await?;

            for (category_id, amount_minor, occurred_at) in expenses {
                let Some(category_id) = category_id else {
                    continue;
                };
                let key = (
                    category_id,
                    occurred_at.year(),
                    occurred_at.month() as i32,
                );
                *spent.entry(key).or_insert(0) += amount_minor;
            }
        }

        Ok(rows
            .into_iter()
            .map(|(budget, category)| {
                let key = (budget.category_id, budget.year, budget.month);
                let spent_minor = spent.get(&key).copied().unwrap_or(0);
                BudgetView::from_parts(budget, category.map(|c| c.name), spent_minor)
            })
            .collect())
    }

    pub async fn get_budget(&self, user_id: i32, budget_id: i32) -> LedgerResult<BudgetView> {
        let (budget, category) = budgets::Entity::find_by_id(budget_id)
            .find_also_related(categories::Entity)
            .filter(budgets::Column::UserId.eq(user_id))
            .one(&self.database)
            .await?
            .ok_or_else(|| LedgerError::NotFound("budget".to_string()))?;

        let spent_minor = self
            .spent_in_month(user_id, budget.category_id, budget.year, budget.month)
            .await?;
        Ok(BudgetView::from_parts(
            budget,
            category.map(|c| c.name),
            spent_minor,
        ))
    }

    pub async fn create_budget(
        &self,
        user_id: i32,
        category_id: i32,
        year: i32,
        month: i32,
        limit_minor: i64,
    ) -> LedgerResult<BudgetView> {
        month_start(year, month)?;
        if limit_minor <= 0 {
            return Err(LedgerError::Conflict(
                "budget limit must be greater than zero".to_string(),
            ));
        }

        let model = with_tx!(self, |db_tx| {
            self.require_category(&db_tx, user_id, category_id).await?;
            budgets::ActiveModel {
                user_id: ActiveValue::Set(user_id),
                category_id: ActiveValue::Set(category_id),
                year: ActiveValue::Set(year),
                month: ActiveValue::Set(month),
                limit_minor: ActiveValue::Set(limit_minor),
                created_at: ActiveValue::Set(Utc::now()),
                ..Default::default()
            }
            .insert(&db_tx)
            .await
            .map_err(|err| LedgerError::on_write(err, "budget"))
        });
        let model = model?;

        tracing::debug!(budget_id = model.id, user_id, "budget created");
        self.get_budget(user_id, model.id).await
    }

    pub async fn update_budget(
        &self,
        user_id: i32,
        budget_id: i32,
        limit_minor: Option<i64>,
        year: Option<i32>,
        month: Option<i32>,
    ) -> LedgerResult<BudgetView> {
        let result: LedgerResult<()> = with_tx!(self, |db_tx| {
            self.require_budget(&db_tx, user_id, budget_id).await?;
            let current = budgets::Entity::find_by_id(budget_id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| LedgerError::NotFound("budget".to_string()))?;

            let year = year.unwrap_or(current.year);
            let month = month.unwrap_or(current.month);
            month_start(year, month)?;

            let mut model = budgets::ActiveModel {
                id: ActiveValue::Set(budget_id),
                year: ActiveValue::Set(year),
                month: ActiveValue::Set(month),
                ..Default::default()
            };
            if let Some(limit) = limit_minor {
                if limit <= 0 {
                    return Err(LedgerError::Conflict(
                        "budget limit must be greater than zero".to_string(),
                    ));
                }
                model.limit_minor = ActiveValue::Set(limit);
            }
            model
                .update(&db_tx)
                .await
                .map_err(|err| LedgerError::on_write(err, "budget"))?;
            Ok(())
        });
        result?;

        self.get_budget(user_id, budget_id).await
    }

    pub async fn delete_budget(&self, user_id: i32, budget_id: i32) -> LedgerResult<()> {
        with_tx!(self, |db_tx| {
            self.require_budget(&db_tx, user_id, budget_id).await?;
            budgets::Entity::delete_by_id(budget_id).exec(&db_tx).await?;
            tracing::debug!(budget_id, user_id, "budget deleted");
            Ok(())
        })
    }

    async fn spent_in_month(
        &self,
        user_id: i32,
        category_id: i32,
        year: i32,
        month: i32,
    ) -> LedgerResult<i64> {
        let start = month_start(year, month)?;
        let end = next_month_start(year, month)?;
        let total: Option<Option<i64>> = transactions::Entity::find()
            .select_only()
            .column_as(Expr::col(transactions::Column::AmountMinor).sum(), "total")
            .filter(transactions::Column::UserId.eq(user_id))
            .filter(transactions::Column::CategoryId.eq(category_id))
            .filter(transactions::Column::Kind.eq(TransactionKind::Expense.as_str()))
            .filter(transactions::Column::OccurredAt.gte(start))
            .filter(transactions::Column::OccurredAt.lt(end))
            .into_tuple()
            .one(&self.database)
            .await?;
        Ok(total.flatten().unwrap_or(0))
    }
}
