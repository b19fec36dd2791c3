use archive_importer::ImportError;
use archive_importer::import::{MessageIngestor, SchemaProvisioner, TableAction, TopicRegistrar};
use archive_importer::models::ArchiveMessage;
use archive_importer::test_support::{TestDatabase, TestDatabaseError};
use serde_json::json;
use sqlx::PgPool;

async fn provision() -> Option<TestDatabase> {
    match TestDatabase::new_from_env().await {
        Ok(db) => Some(db),
        Err(TestDatabaseError::Container(err)) => {
            eprintln!("skipping schema integration test: no database available ({err})");
            None
        }
        Err(err) => panic!("failed to provision test database: {err:?}"),
    }
}

async fn primary_key_count(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM information_schema.table_constraints WHERE table_schema = 'public' AND table_name = $1 AND constraint_type = 'PRIMARY KEY'",
    )
    .bind(table)
    .fetch_one(pool)
    .await
    .expect("constraint lookup succeeded")
}

#[tokio::test]
async fn ensure_schema_creates_missing_tables_then_keeps_them() {
    let Some(test_db) = provision().await else {
        return;
    };
    let pool = test_db.pool_clone();
    let provisioner = SchemaProvisioner::new(&pool);

    let report = provisioner.ensure_schema(false).await;
    assert_eq!(report.failures(), 0);
    for table in ["messages", "topics", "attachments"] {
        assert_eq!(report.action(table), Some(TableAction::Created), "{table}");
        assert!(provisioner.table_exists(table).await.expect("exists check"));
    }

    let report = provisioner.ensure_schema(false).await;
    for table in ["messages", "topics", "attachments"] {
        assert_eq!(report.action(table), Some(TableAction::Kept), "{table}");
    }

    assert_eq!(primary_key_count(&pool, "messages").await, 1);
    assert_eq!(primary_key_count(&pool, "attachments").await, 1);
    assert_eq!(primary_key_count(&pool, "topics").await, 0);

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn truncate_restarts_internal_ids_at_one() {
    let Some(test_db) = provision().await else {
        return;
    };
    let pool = test_db.pool_clone();
    let provisioner = SchemaProvisioner::new(&pool);
    provisioner.ensure_schema(false).await;

    let ingestor = MessageIngestor::new(&pool);
    let message = ArchiveMessage::from_value(json!({
        "topicId": 1,
        "msgId": 10,
        "subject": "Hello"
    }))
    .expect("message decodes");
    for _ in 0..3 {
        ingestor.insert(&message).await.expect("message insert");
    }
    TopicRegistrar::new(&pool)
        .register_if_new("1", Some("Hello"))
        .await
        .expect("topic insert");
    TopicRegistrar::new(&pool)
        .register_if_new("2", Some("Second"))
        .await
        .expect("topic insert");

    let report = provisioner.ensure_schema(true).await;
    assert_eq!(report.failures(), 0);
    for table in ["messages", "topics", "attachments"] {
        assert_eq!(report.action(table), Some(TableAction::Truncated), "{table}");
    }

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
        .fetch_one(&pool)
        .await
        .expect("count messages");
    assert_eq!(remaining, 0);

    let first_id = ingestor.insert(&message).await.expect("message insert");
    assert_eq!(first_id, 1);

    let outcome = TopicRegistrar::new(&pool)
        .register_if_new("3", Some("Fresh"))
        .await
        .expect("topic insert");
    assert_eq!(
        outcome,
        archive_importer::import::TopicOutcome::Registered { internal_id: 1 }
    );

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn failure_on_one_table_does_not_block_the_others() {
    let Some(test_db) = provision().await else {
        return;
    };
    let pool = test_db.pool_clone();

    // Squat on the topics sequence name so creating the topics table fails.
    sqlx::query("CREATE SEQUENCE public.topics_internaltopicid_seq")
        .execute(&pool)
        .await
        .expect("create conflicting sequence");

    let provisioner = SchemaProvisioner::new(&pool);
    let report = provisioner.ensure_schema(false).await;

    assert_eq!(report.failures(), 1);
    assert_eq!(report.action("messages"), Some(TableAction::Created));
    assert_eq!(report.action("attachments"), Some(TableAction::Created));

    let topics_result = report
        .tables
        .iter()
        .find(|(name, _)| *name == "topics")
        .map(|(_, result)| result)
        .expect("topics entry present");
    assert!(matches!(
        topics_result,
        Err(ImportError::Schema { table: "topics", .. })
    ));

    // The failed creation was rolled back as a whole.
    assert!(!provisioner.table_exists("topics").await.expect("exists check"));

    test_db.close().await.expect("failed to drop test database");
}
