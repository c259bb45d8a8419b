use super::*;
use crate::config::{GeminiConfig, SessionConfig};
use anyhow::Result;

async fn manager() -> Result<SessionManager> {
    let db = Database::in_memory().await?;
    Ok(SessionManager::new(db, SessionConfig::default()))
}

/// Client pointed at a closed local port, with a single attempt so failure
/// paths stay fast.
fn unreachable_gemini() -> GeminiClient {
    let config = GeminiConfig {
        endpoint: "http://127.0.0.1:9".to_string(),
        ..GeminiConfig::default()
    };
    #[allow(clippy::unwrap_used)]
    GeminiClient::with_api_key(&config, "test-key".to_string())
        .unwrap()
        .with_retry_attempts(1)
}

fn full_info() -> UserInfo {
    UserInfo {
        name: Some("Ada".to_string()),
        email: Some("Ada@Example.com".to_string()),
        purpose: Some("evaluation".to_string()),
    }
}

#[tokio::test]
async fn new_session_requires_user_info() -> Result<()> {
    let manager = manager().await?;
    let session = manager.create_session().await?;

    assert_eq!(session.status, SessionStatus::Active);
    assert!(manager.is_user_info_required(&session));
    Ok(())
}

#[tokio::test]
async fn collect_user_info_rejects_missing_fields() -> Result<()> {
    let manager = manager().await?;
    let session = manager.create_session().await?;

    let err = manager
        .collect_user_info(
            &session.id,
            UserInfo {
                name: Some("Ada".to_string()),
                email: None,
                purpose: Some("  ".to_string()),
            },
        )
        .await
        .unwrap_err();

    match err {
        RagError::Validation(message) => {
            assert!(message.contains("email"));
            assert!(message.contains("purpose"));
            assert!(!message.contains("name"));
        }
        other => panic!("expected validation error, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn collect_user_info_rejects_malformed_email() -> Result<()> {
    let manager = manager().await?;
    let session = manager.create_session().await?;

    let err = manager
        .collect_user_info(
            &session.id,
            UserInfo {
                name: Some("Ada".to_string()),
                email: Some("not-an-email".to_string()),
                purpose: Some("evaluation".to_string()),
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, RagError::Validation(_)));
    Ok(())
}

#[tokio::test]
async fn collect_user_info_opens_gate_and_builds_profile() -> Result<()> {
    let manager = manager().await?;
    let session = manager.create_session().await?;

    let updated = manager.collect_user_info(&session.id, full_info()).await?;
    assert!(updated.user_info_collected);
    assert!(!manager.is_user_info_required(&updated));
    // Email is normalized to lowercase.
    assert_eq!(updated.user_email.as_deref(), Some("ada@example.com"));

    let profile = manager
        .db
        .get_user_profile("ada@example.com")
        .await?
        .unwrap();
    assert_eq!(profile.session_count, 1);
    Ok(())
}

#[tokio::test]
async fn resubmitting_user_info_overwrites_previous_values() -> Result<()> {
    let manager = manager().await?;
    let session = manager.create_session().await?;

    manager.collect_user_info(&session.id, full_info()).await?;
    let updated = manager
        .collect_user_info(
            &session.id,
            UserInfo {
                name: Some("Ada Lovelace".to_string()),
                email: Some("ada@example.com".to_string()),
                purpose: Some("purchase".to_string()),
            },
        )
        .await?;

    assert_eq!(updated.user_name.as_deref(), Some("Ada Lovelace"));
    assert_eq!(updated.user_purpose.as_deref(), Some("purchase"));

    // Resubmission within one session is not a new visit.
    let profile = manager
        .db
        .get_user_profile("ada@example.com")
        .await?
        .unwrap();
    assert_eq!(profile.session_count, 1);
    Ok(())
}

#[tokio::test]
async fn returning_user_profile_counts_sessions_across_visits() -> Result<()> {
    let manager = manager().await?;

    let first = manager.create_session().await?;
    manager.collect_user_info(&first.id, full_info()).await?;

    let second = manager.create_session().await?;
    manager.collect_user_info(&second.id, full_info()).await?;

    let profile = manager
        .db
        .get_user_profile("ada@example.com")
        .await?
        .unwrap();
    assert_eq!(profile.session_count, 2);
    Ok(())
}

#[tokio::test]
async fn history_respects_window_and_order() -> Result<()> {
    let db = Database::in_memory().await?;
    let manager = SessionManager::new(
        db,
        SessionConfig {
            history_window: 2,
            ..SessionConfig::default()
        },
    );
    let session = manager.create_session().await?;

    for n in 0..4 {
        manager
            .record_interaction(
                &session.id,
                InteractionRole::User,
                &format!("message {}", n),
                false,
                vec![],
            )
            .await?;
    }

    let history = manager.conversation_history(&session.id).await?;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].content, "message 2");
    assert_eq!(history[1].content, "message 3");
    Ok(())
}

#[tokio::test]
async fn end_session_without_transcript_skips_summary() -> Result<()> {
    let manager = manager().await?;
    let session = manager.create_session().await?;

    let ended = manager
        .end_session(&session.id, &unreachable_gemini(), None)
        .await?;
    assert_eq!(ended.status, SessionStatus::Completed);
    assert!(ended.summary.is_none());
    Ok(())
}

#[tokio::test]
async fn end_session_survives_summary_failure() -> Result<()> {
    let manager = manager().await?;
    let session = manager.create_session().await?;
    manager
        .record_interaction(&session.id, InteractionRole::User, "hello", false, vec![])
        .await?;

    let ended = manager
        .end_session(&session.id, &unreachable_gemini(), None)
        .await?;
    assert_eq!(ended.status, SessionStatus::Completed);
    assert!(ended.summary.is_none());
    Ok(())
}

#[tokio::test]
async fn ending_twice_is_idempotent() -> Result<()> {
    let manager = manager().await?;
    let session = manager.create_session().await?;
    let client = unreachable_gemini();

    let first = manager.end_session(&session.id, &client, None).await?;
    let second = manager.end_session(&session.id, &client, None).await?;

    assert_eq!(first.status, SessionStatus::Completed);
    assert_eq!(second.status, SessionStatus::Completed);
    assert_eq!(first.ended_at, second.ended_at);
    Ok(())
}

#[tokio::test]
async fn ended_session_rejects_further_activity() -> Result<()> {
    let manager = manager().await?;
    let session = manager.create_session().await?;
    manager
        .end_session(&session.id, &unreachable_gemini(), None)
        .await?;

    let err = manager.ensure_active(&session.id).await.unwrap_err();
    assert!(matches!(err, RagError::Validation(_)));
    Ok(())
}

#[tokio::test]
async fn cleanup_expires_stale_sessions() -> Result<()> {
    let manager = manager().await?;
    let session = manager.create_session().await?;

    let old = Utc::now().naive_utc() - Duration::hours(2);
    sqlx::query("UPDATE sessions SET last_activity = ? WHERE id = ?")
        .bind(old)
        .bind(&session.id)
        .execute(manager.db.pool())
        .await?;

    assert_eq!(manager.cleanup_expired().await?, 1);
    assert_eq!(manager.cleanup_expired().await?, 0);

    let err = manager.ensure_active(&session.id).await.unwrap_err();
    assert!(matches!(err, RagError::Validation(_)));
    Ok(())
}

#[test]
fn summary_prompt_includes_both_speakers() {
    let transcript = vec![
        Interaction {
            id: 1,
            session_id: "s1".to_string(),
            role: InteractionRole::User,
            content: "What is the refund policy?".to_string(),
            rag_used: false,
            documents_referenced: "[]".to_string(),
            created_at: Utc::now().naive_utc(),
        },
        Interaction {
            id: 2,
            session_id: "s1".to_string(),
            role: InteractionRole::Assistant,
            content: "Refunds are available within 30 days.".to_string(),
            rag_used: true,
            documents_referenced: "[\"doc-1\"]".to_string(),
            created_at: Utc::now().naive_utc(),
        },
    ];

    let prompt = summary_prompt(&transcript);
    assert!(prompt.contains("User: What is the refund policy?"));
    assert!(prompt.contains("Assistant: Refunds are available within 30 days."));
}
