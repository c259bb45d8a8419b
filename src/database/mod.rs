//! SQLite persistence for sessions, transcripts, document metadata, user
//! profiles, and analytics events. Vectors live in the vector backend;
//! this layer is the system of record for everything else.

#[cfg(test)]
mod tests;

pub mod models;
pub mod queries;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::database::models::{
    AnalyticsEvent, DocumentRow, EventType, Interaction, NewAnalyticsEvent, NewInteraction,
    Session, UserProfile,
};
use crate::database::queries::{
    AnalyticsQueries, DocumentQueries, InteractionQueries, SessionQueries, UserProfileQueries,
};

pub type DbPool = Pool<Sqlite>;

#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    #[inline]
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    /// Private in-memory database, used by tests.
    #[inline]
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .foreign_keys(true);

        // A single connection keeps every query on the same in-memory db.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to create in-memory database")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    #[inline]
    pub async fn initialize_from_config_dir(config_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        Self::new(config_dir.join("ragchat.db")).await
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    // Session operations
    #[inline]
    pub async fn create_session(&self, id: &str) -> Result<Session> {
        SessionQueries::create(&self.pool, id).await
    }

    #[inline]
    pub async fn get_session(&self, id: &str) -> Result<Option<Session>> {
        SessionQueries::get(&self.pool, id).await
    }

    #[inline]
    pub async fn list_sessions(&self) -> Result<Vec<Session>> {
        SessionQueries::list(&self.pool).await
    }

    #[inline]
    pub async fn touch_session(&self, id: &str) -> Result<()> {
        SessionQueries::touch(&self.pool, id).await
    }

    #[inline]
    pub async fn set_session_user_info(
        &self,
        id: &str,
        name: &str,
        email: &str,
        purpose: Option<&str>,
    ) -> Result<()> {
        SessionQueries::set_user_info(&self.pool, id, name, email, purpose).await
    }

    #[inline]
    pub async fn complete_session(&self, id: &str, summary: Option<&str>) -> Result<bool> {
        SessionQueries::complete(&self.pool, id, summary).await
    }

    #[inline]
    pub async fn claim_session_email(&self, id: &str) -> Result<bool> {
        SessionQueries::claim_email(&self.pool, id).await
    }

    #[inline]
    pub async fn expire_sessions_before(&self, cutoff: NaiveDateTime) -> Result<u64> {
        SessionQueries::expire_inactive(&self.pool, cutoff).await
    }

    // Interaction operations
    #[inline]
    pub async fn record_interaction(&self, new: NewInteraction) -> Result<Interaction> {
        InteractionQueries::create(&self.pool, new).await
    }

    #[inline]
    pub async fn session_transcript(&self, session_id: &str) -> Result<Vec<Interaction>> {
        InteractionQueries::list_for_session(&self.pool, session_id).await
    }

    #[inline]
    pub async fn recent_interactions(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<Interaction>> {
        InteractionQueries::recent_for_session(&self.pool, session_id, limit).await
    }

    #[inline]
    pub async fn interaction_count(&self, session_id: &str) -> Result<i64> {
        InteractionQueries::count_for_session(&self.pool, session_id).await
    }

    // Document operations
    #[inline]
    pub async fn insert_document(&self, row: &DocumentRow) -> Result<()> {
        DocumentQueries::create(&self.pool, row).await
    }

    #[inline]
    pub async fn get_document(&self, id: &str) -> Result<Option<DocumentRow>> {
        DocumentQueries::get(&self.pool, id).await
    }

    #[inline]
    pub async fn session_documents(&self, session_id: &str) -> Result<Vec<DocumentRow>> {
        DocumentQueries::list_for_session(&self.pool, session_id).await
    }

    #[inline]
    pub async fn list_documents(&self) -> Result<Vec<DocumentRow>> {
        DocumentQueries::list_all(&self.pool).await
    }

    #[inline]
    pub async fn mark_document_vector_stored(&self, id: &str) -> Result<()> {
        DocumentQueries::mark_vector_stored(&self.pool, id).await
    }

    #[inline]
    pub async fn delete_document(&self, id: &str) -> Result<bool> {
        DocumentQueries::delete(&self.pool, id).await
    }

    // User profile operations
    #[inline]
    pub async fn upsert_user_profile(
        &self,
        email: &str,
        name: &str,
        purpose: Option<&str>,
        count_session: bool,
    ) -> Result<UserProfile> {
        UserProfileQueries::upsert(&self.pool, email, name, purpose, count_session).await
    }

    #[inline]
    pub async fn get_user_profile(&self, email: &str) -> Result<Option<UserProfile>> {
        UserProfileQueries::get(&self.pool, email).await
    }

    // Analytics operations
    #[inline]
    pub async fn record_event(&self, event: NewAnalyticsEvent) -> Result<()> {
        AnalyticsQueries::create(&self.pool, event).await
    }

    #[inline]
    pub async fn events_since(
        &self,
        event_type: EventType,
        since: NaiveDateTime,
    ) -> Result<Vec<AnalyticsEvent>> {
        AnalyticsQueries::list_since(&self.pool, event_type, since).await
    }

    #[inline]
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
