use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use sea_orm::DatabaseConnection;

use crate::categories::CategoryNode;
use crate::{LedgerError, LedgerResult};

mod access;
mod accounts;
mod budgets;
mod categories;
mod transactions;

pub use transactions::{PaginationMeta, TransactionListFilter};

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

const CATEGORY_TREE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct Ledger {
    database: DatabaseConnection,
    category_trees: Mutex<HashMap<i32, (Instant, Vec<CategoryNode>)>>,
}

impl Ledger {
    /// Return a builder for `Ledger`. Help to build the struct.
    pub fn builder() -> LedgerBuilder {
        LedgerBuilder::default()
    }
}

fn normalize_required_name(value: &str, label: &str) -> LedgerResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::Conflict(format!(
            "{label} name must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Trim, lowercase, drop empties and deduplicate, preserving first-seen
/// order.
fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tags.iter()
        .map(|tag| tag.trim().to_lowercase())
        .filter(|tag| !tag.is_empty())
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}

/// The builder for `Ledger`
#[derive(Default)]
pub struct LedgerBuilder {
    database: DatabaseConnection,
}

impl LedgerBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> LedgerBuilder {
        self.database = db;
        self
    }

    /// Construct `Ledger`
    pub async fn build(self) -> LedgerResult<Ledger> {
        Ok(Ledger {
            database: self.database,
            category_trees: Mutex::new(HashMap::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::normalize_tags;

    #[test]
    fn tags_are_trimmed_lowercased_and_deduplicated() {
        let raw = vec![
            "  Food ".to_owned(),
            "TRAVEL".to_owned(),
            String::new(),
            "food".to_owned(),
            "   ".to_owned(),
        ];
        assert_eq!(normalize_tags(&raw), ["food", "travel"]);
    }
}
