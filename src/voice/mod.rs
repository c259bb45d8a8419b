//! Voice capability seams: speech recognition produces a transcript event
//! stream, speech synthesis speaks responses, and the bridge wires final
//! transcripts into the chat pipeline. Engines are pluggable behind the
//! two traits; shipped implementations cover scripted input (for tests and
//! demos) and silent output.

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::Result;
use crate::rag::{ChatOptions, RagEngine};

/// Incremental recognition output. Partials are display-only; only finals
/// reach the chat pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEvent {
    Partial(String),
    Final(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoiceOptions {
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl Default for VoiceOptions {
    #[inline]
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Begin recognition. The stream ends when the speaker stops or the
    /// recognizer is stopped.
    async fn start(&self) -> Result<mpsc::Receiver<TranscriptEvent>>;

    async fn stop(&self) -> Result<()>;
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn speak(&self, text: &str, options: &VoiceOptions) -> Result<()>;

    /// Cut off any in-progress speech.
    async fn stop(&self) -> Result<()>;
}

/// Replays a fixed list of utterances as final transcripts.
pub struct ScriptedRecognizer {
    utterances: Vec<String>,
}

impl ScriptedRecognizer {
    #[inline]
    pub fn new(utterances: Vec<String>) -> Self {
        Self { utterances }
    }
}

#[async_trait]
impl SpeechRecognizer for ScriptedRecognizer {
    async fn start(&self) -> Result<mpsc::Receiver<TranscriptEvent>> {
        let (tx, rx) = mpsc::channel(16);
        let utterances = self.utterances.clone();
        tokio::spawn(async move {
            for utterance in utterances {
                if tx.send(TranscriptEvent::Final(utterance)).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }
}

/// Discards speech output. Stands in where no audio device exists.
#[derive(Debug, Default)]
pub struct NullSynthesizer;

#[async_trait]
impl SpeechSynthesizer for NullSynthesizer {
    async fn speak(&self, text: &str, _options: &VoiceOptions) -> Result<()> {
        debug!("Discarding synthesized speech ({} chars)", text.len());
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }
}

/// Connects recognition to chat to synthesis for one session.
pub struct VoiceBridge<'a> {
    engine: &'a RagEngine,
    options: VoiceOptions,
}

impl<'a> VoiceBridge<'a> {
    #[inline]
    pub fn new(engine: &'a RagEngine, options: VoiceOptions) -> Self {
        Self { engine, options }
    }

    /// Drive the loop until the transcript stream ends. Returns the number
    /// of completed exchanges. A failed chat turn is spoken as an apology
    /// and the loop continues; voice usage is tracked per exchange.
    #[inline]
    pub async fn run(
        &self,
        session_id: &str,
        recognizer: &dyn SpeechRecognizer,
        synthesizer: &dyn SpeechSynthesizer,
    ) -> Result<usize> {
        let mut events = recognizer.start().await?;
        let mut exchanges = 0usize;

        while let Some(event) = events.recv().await {
            let text = match event {
                TranscriptEvent::Partial(partial) => {
                    debug!("Partial transcript: {}", partial);
                    continue;
                }
                TranscriptEvent::Final(text) => text,
            };
            if text.trim().is_empty() {
                continue;
            }

            let started = Instant::now();
            let reply = match self
                .engine
                .chat(session_id, &text, &ChatOptions::default())
                .await
            {
                Ok(outcome) => outcome.response,
                Err(e) => {
                    warn!("Voice chat turn failed: {}", e);
                    "Sorry, I could not process that. Please try again.".to_string()
                }
            };

            synthesizer.speak(&reply, &self.options).await?;
            self.engine
                .analytics()
                .track_voice_usage(session_id, started.elapsed().as_millis() as i64)
                .await?;
            exchanges += 1;
        }

        recognizer.stop().await?;
        synthesizer.stop().await?;
        info!(
            "Voice session {} finished after {} exchanges",
            session_id, exchanges
        );
        Ok(exchanges)
    }
}
