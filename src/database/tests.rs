use super::*;
use crate::database::models::SessionStatus;
use anyhow::Result;
use std::collections::HashSet;
use tempfile::TempDir;

async fn create_test_database() -> Result<(TempDir, Database)> {
    let temp_dir = TempDir::new()?;
    let database = Database::initialize_from_config_dir(temp_dir.path()).await?;
    Ok((temp_dir, database))
}

#[tokio::test]
async fn integration_schema_migration() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
    )
    .fetch_all(database.pool())
    .await?;

    let expected_tables: HashSet<&'static str> = [
        "sessions",
        "interactions",
        "documents",
        "user_profiles",
        "analytics_events",
        "_sqlx_migrations",
    ]
    .into_iter()
    .collect();

    let actual_tables: HashSet<&str> = tables.iter().map(|t| t.as_str()).collect();
    assert_eq!(actual_tables, expected_tables);

    Ok(())
}

#[tokio::test]
async fn integration_foreign_key_cascade_on_session_delete() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    let session = database.create_session("s1").await?;
    database
        .record_interaction(NewInteraction {
            session_id: session.id.clone(),
            role: models::InteractionRole::User,
            content: "hello".to_string(),
            rag_used: false,
            documents_referenced: vec![],
        })
        .await?;

    sqlx::query("DELETE FROM sessions WHERE id = ?")
        .bind(&session.id)
        .execute(database.pool())
        .await?;

    assert_eq!(database.interaction_count("s1").await?, 0);
    Ok(())
}

#[tokio::test]
async fn integration_orphan_interaction_rejected() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    let result = database
        .record_interaction(NewInteraction {
            session_id: "no-such-session".to_string(),
            role: models::InteractionRole::User,
            content: "hello".to_string(),
            rag_used: false,
            documents_referenced: vec![],
        })
        .await;

    assert!(result.is_err());
    Ok(())
}

#[tokio::test]
async fn in_memory_database_migrates() -> Result<()> {
    let database = Database::in_memory().await?;
    let session = database.create_session("mem").await?;
    assert_eq!(session.status, SessionStatus::Active);
    Ok(())
}
