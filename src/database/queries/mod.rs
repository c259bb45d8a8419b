
use super::models::*;
use anyhow::{Context, Result};
use chrono::{NaiveDateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

pub struct SessionQueries;

impl SessionQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, id: &str) -> Result<Session> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            "INSERT INTO sessions (id, status, created_at, last_activity) VALUES (?, ?, ?, ?)",
        )
        .bind(id)
        .bind(SessionStatus::Active)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create session")?;

        Self::get(pool, id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created session"))
    }

    #[inline]
    pub async fn get(pool: &SqlitePool, id: &str) -> Result<Option<Session>> {
        sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to get session by id")
    }

    #[inline]
    pub async fn list(pool: &SqlitePool) -> Result<Vec<Session>> {
        sqlx::query_as::<_, Session>("SELECT * FROM sessions ORDER BY created_at DESC")
            .fetch_all(pool)
            .await
            .context("Failed to list sessions")
    }

    /// Bump the inactivity clock.
    #[inline]
    pub async fn touch(pool: &SqlitePool, id: &str) -> Result<()> {
        sqlx::query("UPDATE sessions SET last_activity = ? WHERE id = ?")
            .bind(Utc::now().naive_utc())
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to update session activity")?;
        Ok(())
    }

    #[inline]
    pub async fn set_user_info(
        pool: &SqlitePool,
        id: &str,
        name: &str,
        email: &str,
        purpose: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE sessions SET user_name = ?, user_email = ?, user_purpose = ?, \
             user_info_collected = 1, last_activity = ? WHERE id = ?",
        )
        .bind(name)
        .bind(email)
        .bind(purpose)
        .bind(Utc::now().naive_utc())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to store user info")?;
        Ok(())
    }

    /// Transition active -> completed. Returns false when the session was
    /// already in a terminal state, making repeated end calls idempotent.
    #[inline]
    pub async fn complete(pool: &SqlitePool, id: &str, summary: Option<&str>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE sessions SET status = ?, summary = ?, ended_at = ? \
             WHERE id = ? AND status = ?",
        )
        .bind(SessionStatus::Completed)
        .bind(summary)
        .bind(Utc::now().naive_utc())
        .bind(id)
        .bind(SessionStatus::Active)
        .execute(pool)
        .await
        .context("Failed to complete session")?;

        Ok(result.rows_affected() > 0)
    }

    /// Claim the right to send the end-of-session email. The flag flips at
    /// most once per session regardless of how many callers race here.
    #[inline]
    pub async fn claim_email(pool: &SqlitePool, id: &str) -> Result<bool> {
        let result =
            sqlx::query("UPDATE sessions SET email_sent = 1 WHERE id = ? AND email_sent = 0")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to claim session email")?;
        Ok(result.rows_affected() > 0)
    }

    /// Sweep sessions whose last activity predates the cutoff. Returns the
    /// number of sessions expired.
    #[inline]
    pub async fn expire_inactive(pool: &SqlitePool, cutoff: NaiveDateTime) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE sessions SET status = ?, ended_at = ? \
             WHERE status = ? AND last_activity < ?",
        )
        .bind(SessionStatus::Expired)
        .bind(Utc::now().naive_utc())
        .bind(SessionStatus::Active)
        .bind(cutoff)
        .execute(pool)
        .await
        .context("Failed to expire inactive sessions")?;

        let expired = result.rows_affected();
        if expired > 0 {
            debug!("Expired {} inactive sessions", expired);
        }
        Ok(expired)
    }
}

pub struct InteractionQueries;

impl InteractionQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, new: NewInteraction) -> Result<Interaction> {
        let documents = serde_json::to_string(&new.documents_referenced)
            .context("Failed to encode referenced documents")?;
        let id = sqlx::query(
            "INSERT INTO interactions (session_id, role, content, rag_used, \
             documents_referenced, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&new.session_id)
        .bind(new.role)
        .bind(&new.content)
        .bind(new.rag_used)
        .bind(&documents)
        .bind(Utc::now().naive_utc())
        .execute(pool)
        .await
        .context("Failed to record interaction")?
        .last_insert_rowid();

        sqlx::query_as::<_, Interaction>("SELECT * FROM interactions WHERE id = ?")
            .bind(id)
            .fetch_one(pool)
            .await
            .context("Failed to retrieve recorded interaction")
    }

    #[inline]
    pub async fn list_for_session(
        pool: &SqlitePool,
        session_id: &str,
    ) -> Result<Vec<Interaction>> {
        sqlx::query_as::<_, Interaction>(
            "SELECT * FROM interactions WHERE session_id = ? ORDER BY id ASC",
        )
        .bind(session_id)
        .fetch_all(pool)
        .await
        .context("Failed to list interactions")
    }

    /// The `limit` most recent interactions, returned oldest first.
    #[inline]
    pub async fn recent_for_session(
        pool: &SqlitePool,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<Interaction>> {
        let mut rows = sqlx::query_as::<_, Interaction>(
            "SELECT * FROM interactions WHERE session_id = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(session_id)
        .bind(limit as i64)
        .fetch_all(pool)
        .await
        .context("Failed to fetch recent interactions")?;

        rows.reverse();
        Ok(rows)
    }

    #[inline]
    pub async fn count_for_session(pool: &SqlitePool, session_id: &str) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM interactions WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_one(pool)
        .await
        .context("Failed to count interactions")
    }
}

pub struct DocumentQueries;

impl DocumentQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, row: &DocumentRow) -> Result<()> {
        sqlx::query(
            "INSERT INTO documents (id, session_id, file_name, file_type, file_size, \
             chunk_count, vector_stored, extracted, upload_time) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.session_id)
        .bind(&row.file_name)
        .bind(&row.file_type)
        .bind(row.file_size)
        .bind(row.chunk_count)
        .bind(row.vector_stored)
        .bind(row.extracted)
        .bind(row.upload_time)
        .execute(pool)
        .await
        .context("Failed to insert document")?;
        Ok(())
    }

    #[inline]
    pub async fn get(pool: &SqlitePool, id: &str) -> Result<Option<DocumentRow>> {
        sqlx::query_as::<_, DocumentRow>("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to get document")
    }

    #[inline]
    pub async fn list_for_session(
        pool: &SqlitePool,
        session_id: &str,
    ) -> Result<Vec<DocumentRow>> {
        sqlx::query_as::<_, DocumentRow>(
            "SELECT * FROM documents WHERE session_id = ? ORDER BY upload_time ASC",
        )
        .bind(session_id)
        .fetch_all(pool)
        .await
        .context("Failed to list session documents")
    }

    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<DocumentRow>> {
        sqlx::query_as::<_, DocumentRow>("SELECT * FROM documents ORDER BY upload_time ASC")
            .fetch_all(pool)
            .await
            .context("Failed to list documents")
    }

    #[inline]
    pub async fn mark_vector_stored(pool: &SqlitePool, id: &str) -> Result<()> {
        sqlx::query("UPDATE documents SET vector_stored = 1 WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to mark document vectors stored")?;
        Ok(())
    }

    /// Returns false when the document does not exist.
    #[inline]
    pub async fn delete(pool: &SqlitePool, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to delete document")?;
        Ok(result.rows_affected() > 0)
    }
}

pub struct UserProfileQueries;

impl UserProfileQueries {
    /// Insert or refresh a profile keyed by email. Name and purpose are
    /// overwritten with the latest values; the session count only moves when
    /// `count_session` is set, so resubmitted info does not inflate it.
    #[inline]
    pub async fn upsert(
        pool: &SqlitePool,
        email: &str,
        name: &str,
        purpose: Option<&str>,
        count_session: bool,
    ) -> Result<UserProfile> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            "INSERT INTO user_profiles (email, name, purpose, session_count, first_seen, last_seen) \
             VALUES (?, ?, ?, 1, ?, ?) \
             ON CONFLICT (email) DO UPDATE SET \
               name = excluded.name, \
               purpose = excluded.purpose, \
               session_count = session_count + ?, \
               last_seen = excluded.last_seen",
        )
        .bind(email)
        .bind(name)
        .bind(purpose)
        .bind(now)
        .bind(now)
        .bind(i64::from(count_session))
        .execute(pool)
        .await
        .context("Failed to upsert user profile")?;

        Self::get(pool, email)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve upserted profile"))
    }

    #[inline]
    pub async fn get(pool: &SqlitePool, email: &str) -> Result<Option<UserProfile>> {
        sqlx::query_as::<_, UserProfile>("SELECT * FROM user_profiles WHERE email = ?")
            .bind(email)
            .fetch_optional(pool)
            .await
            .context("Failed to get user profile")
    }
}

pub struct AnalyticsQueries;

impl AnalyticsQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, event: NewAnalyticsEvent) -> Result<()> {
        sqlx::query(
            "INSERT INTO analytics_events (event_type, session_id, created_at, duration_ms, \
             success, rag_used, detail) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(event.event_type)
        .bind(&event.session_id)
        .bind(Utc::now().naive_utc())
        .bind(event.duration_ms)
        .bind(event.success)
        .bind(event.rag_used)
        .bind(&event.detail)
        .execute(pool)
        .await
        .context("Failed to record analytics event")?;
        Ok(())
    }

    #[inline]
    pub async fn list_since(
        pool: &SqlitePool,
        event_type: EventType,
        since: NaiveDateTime,
    ) -> Result<Vec<AnalyticsEvent>> {
        sqlx::query_as::<_, AnalyticsEvent>(
            "SELECT * FROM analytics_events WHERE event_type = ? AND created_at >= ? \
             ORDER BY created_at ASC",
        )
        .bind(event_type)
        .bind(since)
        .fetch_all(pool)
        .await
        .context("Failed to list analytics events")
    }
}
