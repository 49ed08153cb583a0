//! Budget entity and the read view with spent-so-far actuals.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "budgets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub category_id: i32,
    pub year: i32,
    pub month: i32,
    pub limit_minor: i64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::categories::Entity",
        from = "Column::CategoryId",
        to = "super::categories::Column::Id"
    )]
    Category,
}

impl Related<super::categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Read view of a budget with the expense total actually spent in its
/// month.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BudgetView {
    pub id: i32,
    pub category_id: i32,
    pub category_name: Option<String>,
    pub year: i32,
    pub month: i32,
    pub limit_minor: i64,
    pub spent_minor: i64,
    pub remaining_minor: i64,
    pub created_at: DateTime<Utc>,
}

impl BudgetView {
    pub(crate) fn from_parts(
        model: Model,
        category_name: Option<String>,
        spent_minor: i64,
    ) -> Self {
        Self {
            id: model.id,
            category_id: model.category_id,
            category_name,
            year: model.year,
            month: model.month,
            limit_minor: model.limit_minor,
            spent_minor,
            remaining_minor: model.limit_minor - spent_minor,
            created_at: model.created_at,
        }
    }
}
