//! Usage analytics: append-only event tracking plus daily aggregation.
//! Reports always return exactly the requested number of day buckets,
//! zero-filled where nothing happened, oldest first.


use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::Result;
use crate::database::Database;
use crate::database::models::{AnalyticsEvent, EventType, NewAnalyticsEvent};

pub struct Analytics {
    db: Database,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyConversations {
    pub date: NaiveDate,
    pub messages: u64,
    pub rag_messages: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyVoice {
    pub date: NaiveDate,
    pub uses: u64,
    pub total_duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPerformance {
    pub date: NaiveDate,
    pub requests: u64,
    pub avg_duration_ms: f64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyEngagement {
    pub date: NaiveDate,
    pub events: u64,
}

impl Analytics {
    #[inline]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[inline]
    pub async fn track_conversation(&self, session_id: &str, rag_used: bool) -> Result<()> {
        let mut event = NewAnalyticsEvent::new(EventType::Conversation);
        event.session_id = Some(session_id.to_string());
        event.rag_used = Some(rag_used);
        self.db.record_event(event).await?;
        Ok(())
    }

    #[inline]
    pub async fn track_voice_usage(&self, session_id: &str, duration_ms: i64) -> Result<()> {
        let mut event = NewAnalyticsEvent::new(EventType::Voice);
        event.session_id = Some(session_id.to_string());
        event.duration_ms = Some(duration_ms);
        self.db.record_event(event).await?;
        Ok(())
    }

    #[inline]
    pub async fn track_ai_performance(
        &self,
        session_id: &str,
        duration_ms: i64,
        success: bool,
    ) -> Result<()> {
        let mut event = NewAnalyticsEvent::new(EventType::AiPerformance);
        event.session_id = Some(session_id.to_string());
        event.duration_ms = Some(duration_ms);
        event.success = Some(success);
        self.db.record_event(event).await?;
        Ok(())
    }

    #[inline]
    pub async fn track_engagement(&self, session_id: &str, detail: &str) -> Result<()> {
        let mut event = NewAnalyticsEvent::new(EventType::Engagement);
        event.session_id = Some(session_id.to_string());
        event.detail = Some(detail.to_string());
        self.db.record_event(event).await?;
        Ok(())
    }

    #[inline]
    pub async fn conversation_data(&self, days: u32) -> Result<Vec<DailyConversations>> {
        let events = self.events_window(EventType::Conversation, days).await?;
        Ok(aggregate_daily(days, &events, |date, day_events| {
            DailyConversations {
                date,
                messages: day_events.len() as u64,
                rag_messages: day_events
                    .iter()
                    .filter(|e| e.rag_used == Some(true))
                    .count() as u64,
            }
        }))
    }

    #[inline]
    pub async fn voice_data(&self, days: u32) -> Result<Vec<DailyVoice>> {
        let events = self.events_window(EventType::Voice, days).await?;
        Ok(aggregate_daily(days, &events, |date, day_events| DailyVoice {
            date,
            uses: day_events.len() as u64,
            total_duration_ms: day_events
                .iter()
                .filter_map(|e| e.duration_ms)
                .filter(|d| *d > 0)
                .sum::<i64>() as u64,
        }))
    }

    #[inline]
    pub async fn performance_data(&self, days: u32) -> Result<Vec<DailyPerformance>> {
        let events = self.events_window(EventType::AiPerformance, days).await?;
        Ok(aggregate_daily(days, &events, |date, day_events| {
            let requests = day_events.len() as u64;
            let durations: Vec<i64> = day_events.iter().filter_map(|e| e.duration_ms).collect();
            let successes = day_events
                .iter()
                .filter(|e| e.success == Some(true))
                .count();

            // Empty days report zeroes rather than NaN.
            let avg_duration_ms = if durations.is_empty() {
                0.0
            } else {
                durations.iter().sum::<i64>() as f64 / durations.len() as f64
            };
            let success_rate = if requests == 0 {
                0.0
            } else {
                successes as f64 / requests as f64
            };

            DailyPerformance {
                date,
                requests,
                avg_duration_ms,
                success_rate,
            }
        }))
    }

    #[inline]
    pub async fn engagement_data(&self, days: u32) -> Result<Vec<DailyEngagement>> {
        let events = self.events_window(EventType::Engagement, days).await?;
        Ok(aggregate_daily(days, &events, |date, day_events| {
            DailyEngagement {
                date,
                events: day_events.len() as u64,
            }
        }))
    }

    async fn events_window(&self, event_type: EventType, days: u32) -> Result<Vec<AnalyticsEvent>> {
        let since = window_start(days).and_hms_opt(0, 0, 0).unwrap_or_default();
        let events = self.db.events_since(event_type, since).await?;
        debug!(
            "Loaded {} {:?} events over {} days",
            events.len(),
            event_type,
            days
        );
        Ok(events)
    }
}

fn window_start(days: u32) -> NaiveDate {
    let span = i64::from(days.saturating_sub(1));
    Utc::now().date_naive() - Duration::days(span)
}

/// Bucket events by calendar day over the trailing window. The result has
/// exactly `days` entries ending today, zero-filled via the builder.
fn aggregate_daily<T>(
    days: u32,
    events: &[AnalyticsEvent],
    build: impl Fn(NaiveDate, &[&AnalyticsEvent]) -> T,
) -> Vec<T> {
    let start = window_start(days);

    let mut by_day: HashMap<NaiveDate, Vec<&AnalyticsEvent>> = HashMap::new();
    for event in events {
        by_day.entry(event.created_at.date()).or_default().push(event);
    }

    (0..i64::from(days))
        .map(|offset| {
            let date = start + Duration::days(offset);
            let day_events = by_day.get(&date).map(Vec::as_slice).unwrap_or(&[]);
            build(date, day_events)
        })
        .collect()
}
