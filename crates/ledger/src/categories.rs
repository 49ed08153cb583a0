//! Category entity and the nested tree view.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    pub parent_id: Option<i32>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::ParentId",
        to = "Column::Id"
    )]
    Parent,
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Flat read view of a single category.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryView {
    pub id: i32,
    pub name: String,
    pub parent_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl From<Model> for CategoryView {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            parent_id: model.parent_id,
            created_at: model.created_at,
        }
    }
}

/// One node of the per-user category tree, children sorted by name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryNode {
    pub id: i32,
    pub name: String,
    pub parent_id: Option<i32>,
    pub children: Vec<CategoryNode>,
}

/// Assembles flat category rows into root-level trees.
///
/// Rows whose parent is missing from the slice are treated as roots, so a
/// partial listing still produces a usable forest.
pub(crate) fn build_tree(mut rows: Vec<Model>) -> Vec<CategoryNode> {
    rows.sort_by(|a, b| a.name.cmp(&b.name));
    let ids: std::collections::HashSet<i32> = rows.iter().map(|row| row.id).collect();
    let mut children: std::collections::HashMap<i32, Vec<Model>> = std::collections::HashMap::new();
    let mut roots = Vec::new();
    for row in rows {
        match row.parent_id {
            Some(parent) if ids.contains(&parent) => {
                children.entry(parent).or_default().push(row);
            }
            _ => roots.push(row),
        }
    }
    roots
        .into_iter()
        .map(|row| assemble(row, &mut children))
        .collect()
}

fn assemble(
    row: Model,
    children: &mut std::collections::HashMap<i32, Vec<Model>>,
) -> CategoryNode {
    let own = children.remove(&row.id).unwrap_or_default();
    CategoryNode {
        id: row.id,
        name: row.name,
        parent_id: row.parent_id,
        children: own.into_iter().map(|child| assemble(child, children)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(id: i32, name: &str, parent_id: Option<i32>) -> Model {
        Model {
            id,
            user_id: 1,
            name: name.to_owned(),
            parent_id,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn nests_children_under_parents() {
        let tree = build_tree(vec![
            row(1, "home", None),
            row(2, "utilities", Some(1)),
            row(3, "rent", Some(1)),
            row(4, "travel", None),
        ]);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].name, "home");
        let child_names: Vec<&str> =
            tree[0].children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(child_names, ["rent", "utilities"]);
        assert!(tree[1].children.is_empty());
    }

    #[test]
    fn orphaned_parent_reference_becomes_root() {
        let tree = build_tree(vec![row(5, "stray", Some(99))]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].id, 5);
    }
}
