use sea_orm::{DatabaseTransaction, QueryFilter, prelude::*};

use crate::{LedgerError, LedgerResult, accounts, budgets, categories};

use super::Ledger;

/// Generates `_exists_for_user` and `require_` methods for a target entity.
///
/// Every read and write goes through one of these guards; a row owned by
/// another user is indistinguishable from a missing row.
macro_rules! impl_owned_by_user {
    ($exists_fn:ident, $require_fn:ident, $entity:path, $user_col:expr, $err_msg:literal) => {
        async fn $exists_fn(
            &self,
            db: &DatabaseTransaction,
            user_id: i32,
            target_id: i32,
        ) -> LedgerResult<bool> {
            <$entity>::find_by_id(target_id)
                .filter($user_col.eq(user_id))
                .one(db)
                .await
                .map(|model| model.is_some())
                .map_err(Into::into)
        }

        pub(super) async fn $require_fn(
            &self,
            db: &DatabaseTransaction,
            user_id: i32,
            target_id: i32,
        ) -> LedgerResult<()> {
            if !self.$exists_fn(db, user_id, target_id).await? {
                return Err(LedgerError::NotFound($err_msg.to_string()));
            }
            Ok(())
        }
    };
}

impl Ledger {
    impl_owned_by_user!(
        account_exists_for_user,
        require_account,
        accounts::Entity,
        accounts::Column::UserId,
        "account"
    );

    impl_owned_by_user!(
        category_exists_for_user,
        require_category,
        categories::Entity,
        categories::Column::UserId,
        "category"
    );

    impl_owned_by_user!(
        budget_exists_for_user,
        require_budget,
        budgets::Entity,
        budgets::Column::UserId,
        "budget"
    );
}
