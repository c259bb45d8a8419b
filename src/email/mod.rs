//! Outbound email over a Resend-compatible REST API. Used for the
//! end-of-session summary; delivery failures are reported but never fail
//! the operation that triggered them.


use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::EmailConfig;
use crate::database::models::{Interaction, Session};
use crate::{RagError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

#[derive(Deserialize)]
struct SendResponse {
    #[serde(default)]
    id: String,
}

pub struct EmailClient {
    endpoint: String,
    api_key: String,
    from_address: String,
    agent: ureq::Agent,
}

impl EmailClient {
    #[inline]
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                RagError::Config(format!(
                    "Email API key not found in environment variable {}",
                    config.api_key_env
                ))
            })?;

        Ok(Self::with_api_key(config, api_key))
    }

    /// Construct with an explicit key, bypassing the environment lookup.
    #[inline]
    pub fn with_api_key(config: &EmailConfig, api_key: String) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            api_key,
            from_address: config.from_address.clone(),
            agent: ureq::Agent::config_builder()
                .timeout_global(Some(REQUEST_TIMEOUT))
                .build()
                .into(),
        }
    }

    /// Deliver a message, returning the provider-assigned message id.
    #[inline]
    pub fn send(&self, message: &EmailMessage) -> Result<String> {
        debug!("Sending email to {:?}: {}", message.to, message.subject);

        let body = serde_json::to_string(message)
            .context("Failed to encode email message")
            .map_err(|e| RagError::Delivery(e.to_string()))?;

        let result = self
            .agent
            .post(&self.endpoint)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .send(body.as_str());

        match result {
            Ok(mut response) => {
                let body = response.body_mut().read_to_string().unwrap_or_default();
                let message_id = serde_json::from_str::<SendResponse>(&body)
                    .map(|r| r.id)
                    .unwrap_or_default();
                info!("Email delivered to {:?} ({})", message.to, message_id);
                Ok(message_id)
            }
            Err(ureq::Error::StatusCode(code)) => {
                warn!("Email provider rejected message: HTTP {}", code);
                Err(RagError::Delivery(
                    anyhow!("Email provider returned HTTP {}", code).to_string(),
                ))
            }
            Err(e) => {
                warn!("Email delivery failed: {}", e);
                Err(RagError::Delivery(e.to_string()))
            }
        }
    }

    /// Compose the end-of-session summary message for the session's user.
    #[inline]
    pub fn session_summary_message(
        &self,
        session: &Session,
        transcript: &[Interaction],
    ) -> Result<EmailMessage> {
        let email = session.user_email.clone().ok_or_else(|| {
            RagError::Delivery("Session has no user email on record".to_string())
        })?;
        let name = session.user_name.as_deref().unwrap_or("there");

        Ok(EmailMessage {
            from: self.from_address.clone(),
            to: vec![email],
            subject: "Your conversation summary".to_string(),
            html: render_summary_html(name, session, transcript),
        })
    }
}

fn render_summary_html(name: &str, session: &Session, transcript: &[Interaction]) -> String {
    let summary = session
        .summary
        .as_deref()
        .unwrap_or("No summary was generated for this conversation.");

    let mut html = String::new();
    html.push_str("<html><body>");
    html.push_str(&format!("<p>Hi {},</p>", escape_html(name)));
    html.push_str("<p>Thanks for chatting with us. Here is a summary of your session:</p>");
    html.push_str(&format!("<blockquote>{}</blockquote>", escape_html(summary)));
    html.push_str(&format!(
        "<p>The conversation covered {} messages.</p>",
        transcript.len()
    ));
    if let Some(purpose) = &session.user_purpose {
        html.push_str(&format!(
            "<p>Stated purpose: {}</p>",
            escape_html(purpose)
        ));
    }
    html.push_str("<p>Best regards,<br/>The team</p>");
    html.push_str("</body></html>");
    html
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
