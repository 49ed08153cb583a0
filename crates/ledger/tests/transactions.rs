use chrono::{Datelike, TimeZone, Utc};
use sea_orm::{ConnectionTrait, Database, Statement};

use ledger::{
    CreateTransactionCmd, Ledger, LedgerError, TransactionKind, TransactionListFilter,
    TransferDirection, UpdateTransactionCmd,
};
use migration::MigratorTrait;

const ALICE: i32 = 1;
const BOB: i32 = 2;

async fn ledger_with_db() -> Ledger {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let backend = db.get_database_backend();
    for email in ["alice@example.com", "bob@example.com"] {
        db.execute(Statement::from_sql_and_values(
            backend,
            "INSERT INTO users (email, created_at) VALUES (?, ?)",
            vec![email.into(), "2026-01-01 00:00:00".into()],
        ))
        .await
        .unwrap();
    }
    Ledger::builder().database(db).build().await.unwrap()
}

async fn account(ledger: &Ledger, user_id: i32, name: &str) -> i32 {
    ledger
        .create_account(user_id, name, "checking", 0)
        .await
        .unwrap()
        .id
}

fn all_rows_filter() -> TransactionListFilter {
    TransactionListFilter {
        page_size: Some(100),
        ..Default::default()
    }
}

#[tokio::test]
async fn transfer_creates_mirrored_pair() {
    let ledger = ledger_with_db().await;
    let source = account(&ledger, ALICE, "Checking").await;
    let target = account(&ledger, ALICE, "Savings").await;

    let occurred_at = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
    let view = ledger
        .create_transaction(
            CreateTransactionCmd::new(ALICE, TransactionKind::Transfer, source, 5_000, occurred_at)
                .target_account_id(target)
                .notes("monthly sweep"),
        )
        .await
        .unwrap();

    assert_eq!(view.transfer_direction, Some(TransferDirection::Out));
    assert_eq!(view.account_id, source);
    assert_eq!(view.target_account_id, Some(target));
    assert!(view.group_id.is_some());
    assert_eq!(view.category_id, None);

    let (rows, meta) = ledger
        .list_transactions(ALICE, &all_rows_filter())
        .await
        .unwrap();
    assert_eq!(meta.total, 2);
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.group_id == view.group_id));
    assert!(rows.iter().all(|row| row.amount_minor == 5_000));
    let incoming = rows
        .iter()
        .find(|row| row.transfer_direction == Some(TransferDirection::In))
        .unwrap();
    assert_eq!(incoming.account_id, target);
    assert_eq!(incoming.target_account_id, Some(source));
}

#[tokio::test]
async fn transfer_requires_distinct_target() {
    let ledger = ledger_with_db().await;
    let source = account(&ledger, ALICE, "Checking").await;

    let missing_target = ledger
        .create_transaction(CreateTransactionCmd::new(
            ALICE,
            TransactionKind::Transfer,
            source,
            1_000,
            Utc::now(),
        ))
        .await;
    assert!(matches!(missing_target, Err(LedgerError::Conflict(_))));

    let same_target = ledger
        .create_transaction(
            CreateTransactionCmd::new(ALICE, TransactionKind::Transfer, source, 1_000, Utc::now())
                .target_account_id(source),
        )
        .await;
    assert!(matches!(same_target, Err(LedgerError::Conflict(_))));
}

#[tokio::test]
async fn installment_transfer_writes_two_rows_per_installment() {
    let ledger = ledger_with_db().await;
    let source = account(&ledger, ALICE, "Checking").await;
    let target = account(&ledger, ALICE, "Savings").await;

    let occurred_at = Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap();
    ledger
        .create_transaction(
            CreateTransactionCmd::new(
                ALICE,
                TransactionKind::Transfer,
                source,
                10_000,
                occurred_at,
            )
            .target_account_id(target)
            .installments_total(3),
        )
        .await
        .unwrap();

    let (rows, _) = ledger
        .list_transactions(ALICE, &all_rows_filter())
        .await
        .unwrap();
    assert_eq!(rows.len(), 6);
    let out_total: i64 = rows
        .iter()
        .filter(|row| row.transfer_direction == Some(TransferDirection::Out))
        .map(|row| row.amount_minor)
        .sum();
    assert_eq!(out_total, 10_000);
    let months: Vec<u32> = rows.iter().map(|row| row.occurred_at.month()).collect();
    assert!(months.contains(&1) && months.contains(&2) && months.contains(&3));
}

#[tokio::test]
async fn installment_plan_conserves_total_and_advances_months() {
    let ledger = ledger_with_db().await;
    let account_id = account(&ledger, ALICE, "Checking").await;

    let occurred_at = Utc.with_ymd_and_hms(2026, 11, 5, 0, 0, 0).unwrap();
    let first = ledger
        .create_transaction(
            CreateTransactionCmd::new(
                ALICE,
                TransactionKind::Expense,
                account_id,
                10_000,
                occurred_at,
            )
            .installments_total(3),
        )
        .await
        .unwrap();
    assert_eq!(first.amount_minor, 3_334);
    assert_eq!(first.installment_number, Some(1));
    assert_eq!(first.installments_total, Some(3));

    let (rows, _) = ledger
        .list_transactions(ALICE, &all_rows_filter())
        .await
        .unwrap();
    assert_eq!(rows.len(), 3);
    let total: i64 = rows.iter().map(|row| row.amount_minor).sum();
    assert_eq!(total, 10_000);
    // Window crosses a year boundary: Nov, Dec, Jan.
    let mut year_months: Vec<(i32, u32)> = rows
        .iter()
        .map(|row| (row.occurred_at.year(), row.occurred_at.month()))
        .collect();
    year_months.sort_unstable();
    assert_eq!(year_months, [(2026, 11), (2026, 12), (2027, 1)]);
    assert!(rows.iter().all(|row| row.group_id == first.group_id));
}

#[tokio::test]
async fn plan_rejects_explicit_installment_number() {
    let ledger = ledger_with_db().await;
    let account_id = account(&ledger, ALICE, "Checking").await;

    let result = ledger
        .create_transaction(
            CreateTransactionCmd::new(
                ALICE,
                TransactionKind::Expense,
                account_id,
                9_000,
                Utc::now(),
            )
            .installments_total(3)
            .installment_number(2),
        )
        .await;
    assert!(matches!(result, Err(LedgerError::Conflict(_))));
}

#[tokio::test]
async fn single_row_keeps_installment_fields_verbatim() {
    let ledger = ledger_with_db().await;
    let account_id = account(&ledger, ALICE, "Checking").await;

    let view = ledger
        .create_transaction(
            CreateTransactionCmd::new(
                ALICE,
                TransactionKind::Expense,
                account_id,
                2_500,
                Utc::now(),
            )
            .installments_total(12)
            .installment_number(3),
        )
        .await;
    // installments_total of 12 with an explicit number describes one row of
    // an externally managed plan only when total <= 1; 12 > 1 makes it a
    // plan, so the explicit number must be rejected.
    assert!(matches!(view, Err(LedgerError::Conflict(_))));

    let lone = ledger
        .create_transaction(
            CreateTransactionCmd::new(
                ALICE,
                TransactionKind::Expense,
                account_id,
                2_500,
                Utc::now(),
            )
            .installments_total(1)
            .installment_number(3),
        )
        .await
        .unwrap();
    assert_eq!(lone.installments_total, Some(1));
    assert_eq!(lone.installment_number, Some(3));
    assert_eq!(lone.group_id, None);
}

#[tokio::test]
async fn transfer_rejects_foreign_category() {
    let ledger = ledger_with_db().await;
    let source = account(&ledger, ALICE, "Checking").await;
    let target = account(&ledger, ALICE, "Savings").await;
    let bob_category = ledger.create_category(BOB, "Groceries", None).await.unwrap();

    // The category never lands on a transfer row, but a foreign id still has
    // to fail instead of being dropped on the floor.
    let result = ledger
        .create_transaction(
            CreateTransactionCmd::new(ALICE, TransactionKind::Transfer, source, 2_000, Utc::now())
                .target_account_id(target)
                .category_id(bob_category.id),
        )
        .await;
    assert!(matches!(result, Err(LedgerError::NotFound(_))));

    let own_category = ledger.create_category(ALICE, "Savings goals", None).await.unwrap();
    let view = ledger
        .create_transaction(
            CreateTransactionCmd::new(ALICE, TransactionKind::Transfer, source, 2_000, Utc::now())
                .target_account_id(target)
                .category_id(own_category.id),
        )
        .await
        .unwrap();
    assert_eq!(view.category_id, None);
}

#[tokio::test]
async fn transfer_update_is_metadata_only() {
    let ledger = ledger_with_db().await;
    let source = account(&ledger, ALICE, "Checking").await;
    let target = account(&ledger, ALICE, "Savings").await;

    let view = ledger
        .create_transaction(
            CreateTransactionCmd::new(ALICE, TransactionKind::Transfer, source, 4_000, Utc::now())
                .target_account_id(target),
        )
        .await
        .unwrap();

    let amount_patch = ledger
        .update_transaction(ALICE, view.id, UpdateTransactionCmd::new().amount_minor(9_999))
        .await;
    assert!(matches!(amount_patch, Err(LedgerError::Conflict(_))));

    ledger
        .update_transaction(
            ALICE,
            view.id,
            UpdateTransactionCmd::new()
                .notes("rent split")
                .tags(vec!["Rent".to_owned(), "rent".to_owned()]),
        )
        .await
        .unwrap();

    let (rows, _) = ledger
        .list_transactions(ALICE, &all_rows_filter())
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    for row in rows {
        assert_eq!(row.notes.as_deref(), Some("rent split"));
        assert_eq!(row.tags, ["rent"]);
        assert_eq!(row.amount_minor, 4_000);
    }
}

#[tokio::test]
async fn empty_transfer_patch_is_a_no_op() {
    let ledger = ledger_with_db().await;
    let source = account(&ledger, ALICE, "Checking").await;
    let target = account(&ledger, ALICE, "Savings").await;

    let view = ledger
        .create_transaction(
            CreateTransactionCmd::new(ALICE, TransactionKind::Transfer, source, 4_000, Utc::now())
                .target_account_id(target)
                .notes("keep me"),
        )
        .await
        .unwrap();

    let unchanged = ledger
        .update_transaction(ALICE, view.id, UpdateTransactionCmd::new())
        .await
        .unwrap();
    assert_eq!(unchanged.notes.as_deref(), Some("keep me"));
}

#[tokio::test]
async fn transfer_delete_cascades_to_the_whole_group() {
    let ledger = ledger_with_db().await;
    let source = account(&ledger, ALICE, "Checking").await;
    let target = account(&ledger, ALICE, "Savings").await;

    let transfer = ledger
        .create_transaction(
            CreateTransactionCmd::new(ALICE, TransactionKind::Transfer, source, 7_000, Utc::now())
                .target_account_id(target)
                .installments_total(2),
        )
        .await
        .unwrap();

    ledger.delete_transaction(ALICE, transfer.id).await.unwrap();

    let (rows, _) = ledger
        .list_transactions(ALICE, &all_rows_filter())
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn installment_delete_leaves_siblings() {
    let ledger = ledger_with_db().await;
    let account_id = account(&ledger, ALICE, "Checking").await;

    let first = ledger
        .create_transaction(
            CreateTransactionCmd::new(
                ALICE,
                TransactionKind::Expense,
                account_id,
                9_000,
                Utc::now(),
            )
            .installments_total(3),
        )
        .await
        .unwrap();

    ledger.delete_transaction(ALICE, first.id).await.unwrap();

    let (rows, _) = ledger
        .list_transactions(ALICE, &all_rows_filter())
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.id != first.id));
    assert!(rows.iter().all(|row| row.group_id == first.group_id));
}

#[tokio::test]
async fn single_row_update_patches_fields() {
    let ledger = ledger_with_db().await;
    let account_id = account(&ledger, ALICE, "Checking").await;
    let groceries = ledger
        .create_category(ALICE, "Groceries", None)
        .await
        .unwrap();

    let view = ledger
        .create_transaction(
            CreateTransactionCmd::new(
                ALICE,
                TransactionKind::Expense,
                account_id,
                1_500,
                Utc::now(),
            )
            .category_id(groceries.id),
        )
        .await
        .unwrap();

    let updated = ledger
        .update_transaction(
            ALICE,
            view.id,
            UpdateTransactionCmd::new()
                .amount_minor(1_800)
                .category_id(None)
                .notes("corrected"),
        )
        .await
        .unwrap();
    assert_eq!(updated.amount_minor, 1_800);
    assert_eq!(updated.category_id, None);
    assert_eq!(updated.notes.as_deref(), Some("corrected"));

    let rejected = ledger
        .update_transaction(ALICE, view.id, UpdateTransactionCmd::new().amount_minor(0))
        .await;
    assert!(matches!(rejected, Err(LedgerError::Conflict(_))));
}

#[tokio::test]
async fn update_rejects_foreign_target_account() {
    let ledger = ledger_with_db().await;
    let alice_account = account(&ledger, ALICE, "Checking").await;
    let alice_savings = account(&ledger, ALICE, "Savings").await;
    let bob_account = account(&ledger, BOB, "Checking").await;

    let view = ledger
        .create_transaction(CreateTransactionCmd::new(
            ALICE,
            TransactionKind::Expense,
            alice_account,
            1_200,
            Utc::now(),
        ))
        .await
        .unwrap();

    let foreign = ledger
        .update_transaction(
            ALICE,
            view.id,
            UpdateTransactionCmd::new().target_account_id(bob_account),
        )
        .await;
    assert!(matches!(foreign, Err(LedgerError::NotFound(_))));

    let updated = ledger
        .update_transaction(
            ALICE,
            view.id,
            UpdateTransactionCmd::new().target_account_id(alice_savings),
        )
        .await
        .unwrap();
    assert_eq!(updated.target_account_id, Some(alice_savings));
}

#[tokio::test]
async fn rows_are_invisible_across_users() {
    let ledger = ledger_with_db().await;
    let alice_account = account(&ledger, ALICE, "Checking").await;
    let bob_account = account(&ledger, BOB, "Checking").await;

    let view = ledger
        .create_transaction(CreateTransactionCmd::new(
            ALICE,
            TransactionKind::Income,
            alice_account,
            3_000,
            Utc::now(),
        ))
        .await
        .unwrap();

    assert!(matches!(
        ledger.get_transaction(BOB, view.id).await,
        Err(LedgerError::NotFound(_))
    ));
    assert!(matches!(
        ledger
            .update_transaction(BOB, view.id, UpdateTransactionCmd::new().notes("nope"))
            .await,
        Err(LedgerError::NotFound(_))
    ));
    assert!(matches!(
        ledger.delete_transaction(BOB, view.id).await,
        Err(LedgerError::NotFound(_))
    ));

    // Writing into another user's account fails the ownership guard too.
    let cross_account = ledger
        .create_transaction(CreateTransactionCmd::new(
            ALICE,
            TransactionKind::Income,
            bob_account,
            3_000,
            Utc::now(),
        ))
        .await;
    assert!(matches!(cross_account, Err(LedgerError::NotFound(_))));
}

#[tokio::test]
async fn listing_filters_and_paginates() {
    let ledger = ledger_with_db().await;
    let account_id = account(&ledger, ALICE, "Checking").await;

    for (amount, day) in [(1_000, 1), (2_000, 2), (3_000, 3)] {
        ledger
            .create_transaction(CreateTransactionCmd::new(
                ALICE,
                TransactionKind::Expense,
                account_id,
                amount,
                Utc.with_ymd_and_hms(2026, 5, day, 12, 0, 0).unwrap(),
            ))
            .await
            .unwrap();
    }
    ledger
        .create_transaction(
            CreateTransactionCmd::new(
                ALICE,
                TransactionKind::Income,
                account_id,
                50_000,
                Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap(),
            )
            .tags(vec!["Salary".to_owned()]),
        )
        .await
        .unwrap();

    let expenses = TransactionListFilter {
        kinds: Some(vec![TransactionKind::Expense]),
        min_amount_minor: Some(2_000),
        ..Default::default()
    };
    let (rows, meta) = ledger.list_transactions(ALICE, &expenses).await.unwrap();
    assert_eq!(meta.total, 2);
    assert!(rows.iter().all(|row| row.kind == TransactionKind::Expense));
    // Newest first.
    assert_eq!(rows[0].amount_minor, 3_000);

    let tagged = TransactionListFilter {
        tags: Some(vec!["salary".to_owned()]),
        ..Default::default()
    };
    let (rows, _) = ledger.list_transactions(ALICE, &tagged).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, TransactionKind::Income);

    let paged = TransactionListFilter {
        page: Some(2),
        page_size: Some(3),
        ..Default::default()
    };
    let (rows, meta) = ledger.list_transactions(ALICE, &paged).await.unwrap();
    assert_eq!(meta.total, 4);
    assert_eq!(meta.page_count, 2);
    assert_eq!(rows.len(), 1);

    let inverted = TransactionListFilter {
        from: Some(Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap()),
        to: Some(Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap()),
        ..Default::default()
    };
    assert!(ledger.list_transactions(ALICE, &inverted).await.is_err());
}

#[tokio::test]
async fn free_text_search_covers_names_and_tags() {
    let ledger = ledger_with_db().await;
    let checking = account(&ledger, ALICE, "Checking").await;
    let groceries = ledger
        .create_category(ALICE, "Groceries", None)
        .await
        .unwrap();

    ledger
        .create_transaction(
            CreateTransactionCmd::new(ALICE, TransactionKind::Expense, checking, 3_000, Utc::now())
                .category_id(groceries.id),
        )
        .await
        .unwrap();
    ledger
        .create_transaction(
            CreateTransactionCmd::new(ALICE, TransactionKind::Income, checking, 50_000, Utc::now())
                .tags(vec!["Salary".to_owned()]),
        )
        .await
        .unwrap();
    ledger
        .create_transaction(
            CreateTransactionCmd::new(ALICE, TransactionKind::Expense, checking, 450, Utc::now())
                .notes("coffee beans"),
        )
        .await
        .unwrap();

    let search = |text: &str| TransactionListFilter {
        query: Some(text.to_owned()),
        ..Default::default()
    };

    let (rows, _) = ledger
        .list_transactions(ALICE, &search("grocer"))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].category_id, Some(groceries.id));

    let (rows, _) = ledger
        .list_transactions(ALICE, &search("Salary"))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, TransactionKind::Income);

    let (rows, _) = ledger
        .list_transactions(ALICE, &search("coffee"))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].amount_minor, 450);

    // The account name reaches every row on that account.
    let (rows, _) = ledger
        .list_transactions(ALICE, &search("Check"))
        .await
        .unwrap();
    assert_eq!(rows.len(), 3);
}

#[tokio::test]
async fn amount_must_be_positive() {
    let ledger = ledger_with_db().await;
    let account_id = account(&ledger, ALICE, "Checking").await;

    for amount in [0, -500] {
        let result = ledger
            .create_transaction(CreateTransactionCmd::new(
                ALICE,
                TransactionKind::Expense,
                account_id,
                amount,
                Utc::now(),
            ))
            .await;
        assert!(matches!(result, Err(LedgerError::Conflict(_))));
    }
}
