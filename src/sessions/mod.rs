//! Session lifecycle: creation, user info collection, transcript recording,
//! explicit completion with summary and email, and inactivity expiry.

#[cfg(test)]
mod tests;

use chrono::{Duration, Utc};
use fancy_regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::database::Database;
use crate::database::models::{
    Interaction, InteractionRole, NewInteraction, Session, SessionStatus,
};
use crate::email::EmailClient;
use crate::gemini::{ChatTurn, GeminiClient, Role};
use crate::{RagError, Result};

fn email_regex() -> &'static Regex {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    EMAIL_REGEX.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
    })
}

/// User details collected before the first substantive exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInfo {
    pub name: Option<String>,
    pub email: Option<String>,
    pub purpose: Option<String>,
}

pub struct SessionManager {
    db: Database,
    config: SessionConfig,
}

impl SessionManager {
    #[inline]
    pub fn new(db: Database, config: SessionConfig) -> Self {
        Self { db, config }
    }

    #[inline]
    pub async fn create_session(&self) -> Result<Session> {
        let id = Uuid::new_v4().to_string();
        let session = self.db.create_session(&id).await?;
        info!("Created session {}", session.id);
        Ok(session)
    }

    /// Fetch a session, failing on unknown ids and terminal states.
    #[inline]
    pub async fn ensure_active(&self, session_id: &str) -> Result<Session> {
        let session = self
            .db
            .get_session(session_id)
            .await?
            .ok_or_else(|| RagError::Validation(format!("Unknown session: {}", session_id)))?;

        match session.status {
            SessionStatus::Active => Ok(session),
            SessionStatus::Completed | SessionStatus::Expired => Err(RagError::Validation(
                format!("Session {} has ended ({})", session_id, session.status),
            )),
        }
    }

    /// Whether the gate in front of substantive chat is still closed.
    #[inline]
    pub fn is_user_info_required(&self, session: &Session) -> bool {
        !self.config.required_fields.is_empty() && !session.user_info_collected
    }

    /// Validate and store user info, and maintain the recurring-user profile
    /// keyed by email. Resubmitting overwrites the earlier values.
    #[inline]
    pub async fn collect_user_info(&self, session_id: &str, info: UserInfo) -> Result<Session> {
        let session = self.ensure_active(session_id).await?;
        let first_collection = !session.user_info_collected;

        let missing: Vec<&str> = self
            .config
            .required_fields
            .iter()
            .map(String::as_str)
            .filter(|field| match *field {
                "name" => info.name.as_deref().is_none_or(|v| v.trim().is_empty()),
                "email" => info.email.as_deref().is_none_or(|v| v.trim().is_empty()),
                "purpose" => info.purpose.as_deref().is_none_or(|v| v.trim().is_empty()),
                _ => false,
            })
            .collect();
        if !missing.is_empty() {
            return Err(RagError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        let name = info.name.as_deref().unwrap_or("").trim().to_string();
        let email = info.email.as_deref().unwrap_or("").trim().to_lowercase();
        let purpose = info
            .purpose
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(ToString::to_string);

        if !email.is_empty() {
            let valid = email_regex().is_match(&email).unwrap_or(false);
            if !valid {
                return Err(RagError::Validation(format!(
                    "Invalid email address: {}",
                    email
                )));
            }
        }

        self.db
            .set_session_user_info(session_id, &name, &email, purpose.as_deref())
            .await?;

        if !email.is_empty() {
            let profile = self
                .db
                .upsert_user_profile(&email, &name, purpose.as_deref(), first_collection)
                .await?;
            debug!(
                "User profile {} now at {} sessions",
                profile.email, profile.session_count
            );
        }

        self.ensure_active(session_id).await
    }

    /// Append a message to the transcript and bump the inactivity clock.
    /// The transcript is append-only.
    #[inline]
    pub async fn record_interaction(
        &self,
        session_id: &str,
        role: InteractionRole,
        content: &str,
        rag_used: bool,
        documents_referenced: Vec<String>,
    ) -> Result<Interaction> {
        let interaction = self
            .db
            .record_interaction(NewInteraction {
                session_id: session_id.to_string(),
                role,
                content: content.to_string(),
                rag_used,
                documents_referenced,
            })
            .await?;
        self.db.touch_session(session_id).await?;
        Ok(interaction)
    }

    /// Recent transcript turns shaped for the generation API, bounded by
    /// the configured history window.
    #[inline]
    pub async fn conversation_history(&self, session_id: &str) -> Result<Vec<ChatTurn>> {
        let interactions = self
            .db
            .recent_interactions(session_id, self.config.history_window)
            .await?;

        Ok(interactions
            .into_iter()
            .map(|i| ChatTurn {
                role: match i.role {
                    InteractionRole::User => Role::User,
                    InteractionRole::Assistant => Role::Model,
                },
                content: i.content,
            })
            .collect())
    }

    #[inline]
    pub async fn transcript(&self, session_id: &str) -> Result<Vec<Interaction>> {
        Ok(self.db.session_transcript(session_id).await?)
    }

    /// End a session: generate a summary, transition to completed, and send
    /// the summary email at most once. Calling again on an ended session
    /// returns it unchanged. Summary and email failures degrade the result
    /// but never fail the end itself.
    #[inline]
    pub async fn end_session(
        &self,
        session_id: &str,
        gemini: &GeminiClient,
        email_client: Option<&EmailClient>,
    ) -> Result<Session> {
        let session = self
            .db
            .get_session(session_id)
            .await?
            .ok_or_else(|| RagError::Validation(format!("Unknown session: {}", session_id)))?;

        if session.status != SessionStatus::Active {
            debug!("Session {} already ended, nothing to do", session_id);
            return Ok(session);
        }

        let transcript = self.db.session_transcript(session_id).await?;
        let summary = if transcript.is_empty() {
            None
        } else {
            match gemini.generate_text(&summary_prompt(&transcript)) {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!("Summary generation failed for {}: {}", session_id, e);
                    None
                }
            }
        };

        let transitioned = self
            .db
            .complete_session(session_id, summary.as_deref())
            .await?;
        if !transitioned {
            // Lost the race to another caller; return whatever state won.
            return self.db.get_session(session_id).await?.ok_or_else(|| {
                RagError::Validation(format!("Unknown session: {}", session_id))
            });
        }
        info!("Session {} completed", session_id);

        let session = self
            .db
            .get_session(session_id)
            .await?
            .ok_or_else(|| RagError::Validation(format!("Unknown session: {}", session_id)))?;

        if let Some(client) = email_client {
            if session.user_email.is_some() && self.db.claim_session_email(session_id).await? {
                match client
                    .session_summary_message(&session, &transcript)
                    .and_then(|message| client.send(&message))
                {
                    Ok(message_id) => {
                        info!("Summary email {} sent for session {}", message_id, session_id);
                    }
                    Err(e) => warn!("Summary email failed for session {}: {}", session_id, e),
                }
            }
        }

        Ok(session)
    }

    /// Expire sessions idle longer than the configured timeout. Returns the
    /// number of sessions swept.
    #[inline]
    pub async fn cleanup_expired(&self) -> Result<u64> {
        let cutoff = Utc::now().naive_utc() - Duration::minutes(self.config.timeout_minutes);
        Ok(self.db.expire_sessions_before(cutoff).await?)
    }

    #[inline]
    pub async fn list_sessions(&self) -> Result<Vec<Session>> {
        Ok(self.db.list_sessions().await?)
    }
}

fn summary_prompt(transcript: &[Interaction]) -> String {
    let mut prompt = String::from(
        "Summarize the following support conversation in two or three sentences. \
         Focus on what the user wanted and what was resolved.\n\n",
    );
    for interaction in transcript {
        let speaker = match interaction.role {
            InteractionRole::User => "User",
            InteractionRole::Assistant => "Assistant",
        };
        prompt.push_str(&format!("{}: {}\n", speaker, interaction.content));
    }
    prompt
}
