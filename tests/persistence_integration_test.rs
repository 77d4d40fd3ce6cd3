//! Upsert, watermark and failure-containment behaviour against PostgreSQL.
//!
//! Requires `DATABASE_URL`; run with `cargo test --features test-db`.
#![cfg(feature = "test-db")]

use serde_json::json;
use sqlx::PgPool;

use zendb::database::Persistence;
use zendb::models::{
    CustomFieldValue, Entity, EntityKind, Groups, Ticket, TicketData, UnixTime,
};

fn group(id: i64, name: &str, updated_at: i64) -> Groups {
    Groups {
        id,
        name: Some(name.to_string()),
        created_at: UnixTime(1),
        updated_at: UnixTime(updated_at),
    }
}

fn ticket(id: i64, status: Option<&str>, updated_at: i64) -> Ticket {
    Ticket {
        id,
        subject: Some(format!("Ticket {id}")),
        status: status.map(str::to_string),
        updated_at: UnixTime(updated_at),
        ..Default::default()
    }
}

async fn count(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM \"{table}\""))
        .fetch_one(pool)
        .await
        .unwrap()
}

#[sqlx::test(migrations = "./migrations")]
async fn test_import_twice_takes_update_path(pool: PgPool) {
    let persistence = Persistence::new(pool.clone());
    let batch = vec![group(1, "Support", 10), group(2, "Billing", 20)];

    let first = persistence.import(batch.clone()).await.unwrap();
    assert_eq!(first.inserted, 2);
    assert_eq!(first.updated, 0);

    let second = persistence.import(batch).await.unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.updated, 2);

    assert_eq!(count(&pool, "groups").await, 2);
    let name: String = sqlx::query_scalar(r#"SELECT "name" FROM "groups" WHERE "id" = 2"#)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(name, "Billing");
    assert!(persistence.errors().is_empty());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_update_path_overwrites_values(pool: PgPool) {
    let persistence = Persistence::new(pool.clone());
    persistence.import(vec![group(5, "Old", 1)]).await.unwrap();
    persistence.import(vec![group(5, "New", 2)]).await.unwrap();

    let (name, updated_at): (String, i64) =
        sqlx::query_as(r#"SELECT "name", "updated_at" FROM "groups" WHERE "id" = 5"#)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(name, "New");
    assert_eq!(updated_at, 2);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_failed_record_does_not_abort_batch(pool: PgPool) {
    let persistence = Persistence::new(pool.clone());
    let batch = vec![
        ticket(1, Some("open"), 100),
        ticket(2, None, 900),
        ticket(3, Some("solved"), 300),
    ];

    let summary = persistence.import(batch).await.unwrap();
    assert_eq!(summary.inserted, 2);
    assert_eq!(summary.failed, 1);
    // The failed record's timestamp does not count
    assert_eq!(summary.watermark, Some(300));

    assert_eq!(count(&pool, "ticket").await, 2);

    let failures = persistence.errors().drain();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].table, "ticket");
    match &failures[0].record {
        Some(Entity::Ticket(t)) => assert_eq!(t.id, 2),
        other => panic!("unexpected failed record {other:?}"),
    }
    assert_eq!(persistence.fetch_offset("ticket").await.unwrap(), 300);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_watermark_never_decreases(pool: PgPool) {
    let persistence = Persistence::new(pool.clone());
    assert_eq!(persistence.fetch_offset("ticket").await.unwrap(), 0);

    persistence
        .import(vec![ticket(1, Some("open"), 500)])
        .await
        .unwrap();
    assert_eq!(persistence.fetch_offset("ticket").await.unwrap(), 500);

    persistence
        .import(vec![ticket(2, Some("open"), 200)])
        .await
        .unwrap();
    assert_eq!(persistence.fetch_offset("ticket").await.unwrap(), 500);

    persistence.commit_sequence("ticket", 100).await.unwrap();
    assert_eq!(persistence.fetch_offset("ticket").await.unwrap(), 500);

    persistence.commit_sequence("ticket", 800).await.unwrap();
    assert_eq!(persistence.fetch_offset("ticket").await.unwrap(), 800);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_groups_watermark_is_the_highest_id(pool: PgPool) {
    let persistence = Persistence::new(pool.clone());
    persistence
        .import(vec![group(30, "a", 0), group(7, "b", 0), group(12, "c", 0)])
        .await
        .unwrap();
    assert_eq!(persistence.fetch_offset("groups").await.unwrap(), 30);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_transforms_can_drop_and_rewrite(pool: PgPool) {
    let persistence = Persistence::new(pool.clone());
    persistence.register_transformation(EntityKind::Groups, |entity| match entity {
        Entity::Groups(g) if g.id == 2 => None,
        Entity::Groups(mut g) => {
            g.name = g.name.map(|n| n.to_uppercase());
            Some(Entity::Groups(g))
        }
        other => Some(other),
    });

    let summary = persistence
        .import(vec![group(1, "support", 0), group(2, "hidden", 0)])
        .await
        .unwrap();
    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.dropped, 1);

    let name: String = sqlx::query_scalar(r#"SELECT "name" FROM "groups" WHERE "id" = 1"#)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(name, "SUPPORT");
    assert_eq!(count(&pool, "groups").await, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_custom_field_values_upsert_on_composite_key(pool: PgPool) {
    let persistence = Persistence::new(pool.clone());
    let value = |field_id: i64, value: serde_json::Value| {
        TicketData::from(CustomFieldValue {
            object_id: 42,
            field_id,
            title: Some(format!("Field {field_id}")),
            value,
            transformed: None,
        })
    };

    persistence
        .import(vec![value(1, json!("low")), value(2, json!(3))])
        .await
        .unwrap();
    let summary = persistence
        .import(vec![value(1, json!("high"))])
        .await
        .unwrap();
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.watermark, None);

    let stored: String = sqlx::query_scalar(
        r#"SELECT "value" FROM "ticketdata" WHERE "object_id" = 42 AND "field_id" = 1"#,
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(stored, "high");
    assert_eq!(count(&pool, "ticketdata").await, 2);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_empty_batch_writes_nothing(pool: PgPool) {
    let persistence = Persistence::new(pool.clone());
    let summary = persistence.import::<Ticket>(Vec::new()).await.unwrap();
    assert_eq!(summary.written(), 0);
    assert_eq!(persistence.fetch_offset("ticket").await.unwrap(), 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_exec_raw_runs_statements(pool: PgPool) {
    let persistence = Persistence::new(pool.clone());
    persistence
        .import(vec![group(1, "a", 0), group(2, "b", 0)])
        .await
        .unwrap();

    let affected = persistence
        .exec_raw(r#"DELETE FROM "groups" WHERE "id" = 1"#)
        .await
        .unwrap();
    assert_eq!(affected, 1);
    assert_eq!(count(&pool, "groups").await, 1);
}
