use std::collections::HashSet;
use std::time::Instant;

use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};

use crate::{
    LedgerError, LedgerResult, categories,
    categories::{CategoryNode, CategoryView, build_tree},
};

use super::{CATEGORY_TREE_TTL, Ledger, normalize_required_name, with_tx};

impl Ledger {
    pub async fn list_categories(&self, user_id: i32) -> LedgerResult<Vec<CategoryView>> {
        let rows = self.category_rows(user_id).await?;
        Ok(rows.into_iter().map(CategoryView::from).collect())
    }

    /// Nested category tree for one user, served from a per-user cache for
    /// up to a minute. Category writes through this instance invalidate the
    /// entry immediately.
    pub async fn category_tree(&self, user_id: i32) -> LedgerResult<Vec<CategoryNode>> {
        if let Some(cached) = self.cached_tree(user_id) {
            return Ok(cached);
        }

        let rows = self.category_rows(user_id).await?;
        let tree = build_tree(rows);
        if let Ok(mut cache) = self.category_trees.lock() {
            cache.insert(user_id, (Instant::now(), tree.clone()));
        }
        Ok(tree)
    }

    pub async fn create_category(
        &self,
        user_id: i32,
        name: &str,
        parent_id: Option<i32>,
    ) -> LedgerResult<CategoryView> {
        let name = normalize_required_name(name, "category")?;
        let model = with_tx!(self, |db_tx| {
            if let Some(parent_id) = parent_id {
                self.require_category(&db_tx, user_id, parent_id).await?;
            }
            categories::ActiveModel {
                user_id: ActiveValue::Set(user_id),
                name: ActiveValue::Set(name),
                parent_id: ActiveValue::Set(parent_id),
                created_at: ActiveValue::Set(chrono::Utc::now()),
                ..Default::default()
            }
            .insert(&db_tx)
            .await
            .map_err(|err| LedgerError::on_write(err, "category"))
        });
        let model = model?;

        self.invalidate_tree(user_id);
        tracing::debug!(category_id = model.id, user_id, "category created");
        Ok(CategoryView::from(model))
    }

    pub async fn update_category(
        &self,
        user_id: i32,
        category_id: i32,
        name: Option<&str>,
        parent_id: Option<Option<i32>>,
    ) -> LedgerResult<CategoryView> {
        let model = with_tx!(self, |db_tx| {
            self.require_category(&db_tx, user_id, category_id).await?;

            let mut model = categories::ActiveModel {
                id: ActiveValue::Set(category_id),
                ..Default::default()
            };
            if let Some(name) = name {
                model.name = ActiveValue::Set(normalize_required_name(name, "category")?);
            }
            if let Some(new_parent) = parent_id {
                if let Some(parent) = new_parent {
                    self.require_category(&db_tx, user_id, parent).await?;
                    self.reject_cycle(&db_tx, user_id, category_id, parent)
                        .await?;
                }
                model.parent_id = ActiveValue::Set(new_parent);
            }
            model
                .update(&db_tx)
                .await
                .map_err(|err| LedgerError::on_write(err, "category"))
        });
        let model = model?;

        self.invalidate_tree(user_id);
        Ok(CategoryView::from(model))
    }

    async fn category_rows(&self, user_id: i32) -> LedgerResult<Vec<categories::Model>> {
        categories::Entity::find()
            .filter(categories::Column::UserId.eq(user_id))
            .order_by_asc(categories::Column::Name)
            .all(&self.database)
            .await
            .map_err(Into::into)
    }

    pub async fn delete_category(&self, user_id: i32, category_id: i32) -> LedgerResult<()> {
        let result: LedgerResult<()> = with_tx!(self, |db_tx| {
            self.require_category(&db_tx, user_id, category_id).await?;
            categories::Entity::delete_by_id(category_id)
                .exec(&db_tx)
                .await?;
            tracing::debug!(category_id, user_id, "category deleted");
            Ok(())
        });
        result?;

        self.invalidate_tree(user_id);
        Ok(())
    }

    /// Walks the ancestor chain of the proposed parent; finding the category
    /// itself means the reparent would close a loop.
    async fn reject_cycle(
        &self,
        db: &DatabaseTransaction,
        user_id: i32,
        category_id: i32,
        new_parent: i32,
    ) -> LedgerResult<()> {
        if new_parent == category_id {
            return Err(LedgerError::Conflict(
                "category cannot be its own parent".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let mut cursor = Some(new_parent);
        while let Some(current) = cursor {
            if current == category_id {
                return Err(LedgerError::Conflict(
                    "category parent would create a cycle".to_string(),
                ));
            }
            if !seen.insert(current) {
                break;
            }
            cursor = categories::Entity::find_by_id(current)
                .filter(categories::Column::UserId.eq(user_id))
                .one(db)
                .await?
                .and_then(|model| model.parent_id);
        }
        Ok(())
    }

    fn cached_tree(&self, user_id: i32) -> Option<Vec<CategoryNode>> {
        let cache = self.category_trees.lock().ok()?;
        let (stored_at, tree) = cache.get(&user_id)?;
        (stored_at.elapsed() < CATEGORY_TREE_TTL).then(|| tree.clone())
    }

    fn invalidate_tree(&self, user_id: i32) {
        if let Ok(mut cache) = self.category_trees.lock() {
            cache.remove(&user_id);
        }
    }
}
