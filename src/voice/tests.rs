use super::*;
use std::sync::Mutex;

/// Captures spoken text for assertions.
#[derive(Default)]
struct CapturingSynthesizer {
    spoken: Mutex<Vec<String>>,
}

#[async_trait]
impl SpeechSynthesizer for CapturingSynthesizer {
    async fn speak(&self, text: &str, _options: &VoiceOptions) -> Result<()> {
        if let Ok(mut spoken) = self.spoken.lock() {
            spoken.push(text.to_string());
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn scripted_recognizer_emits_finals_in_order() {
    let recognizer = ScriptedRecognizer::new(vec![
        "first utterance".to_string(),
        "second utterance".to_string(),
    ]);

    let mut events = recognizer.start().await.unwrap();
    assert_eq!(
        events.recv().await,
        Some(TranscriptEvent::Final("first utterance".to_string()))
    );
    assert_eq!(
        events.recv().await,
        Some(TranscriptEvent::Final("second utterance".to_string()))
    );
    assert_eq!(events.recv().await, None);
}

#[tokio::test]
async fn null_synthesizer_accepts_any_text() {
    let synthesizer = NullSynthesizer;
    synthesizer
        .speak("hello", &VoiceOptions::default())
        .await
        .unwrap();
    synthesizer.stop().await.unwrap();
}

#[test]
fn voice_options_default_to_unity() {
    let options = VoiceOptions::default();
    assert_eq!(options.rate, 1.0);
    assert_eq!(options.pitch, 1.0);
    assert_eq!(options.volume, 1.0);
}

#[tokio::test]
async fn bridge_speaks_apology_when_chat_fails() {
    // An engine with no sessions: every chat call fails validation, and
    // the bridge must keep going and speak a fallback line.
    let config = crate::config::Config::default();
    let db = crate::database::Database::in_memory().await.unwrap();
    let gemini = crate::gemini::GeminiClient::with_api_key(&config.gemini, "k".to_string()).unwrap();
    let embedder =
        crate::gemini::GeminiClient::with_api_key(&config.gemini, "k".to_string()).unwrap();
    let vectors = crate::vector::VectorIndex::from_config(&config, embedder).unwrap();
    let engine = RagEngine::with_components(&config, db, gemini, vectors, None);

    let recognizer = ScriptedRecognizer::new(vec!["hello there".to_string()]);
    let synthesizer = CapturingSynthesizer::default();
    let bridge = VoiceBridge::new(&engine, VoiceOptions::default());

    let exchanges = bridge
        .run("missing-session", &recognizer, &synthesizer)
        .await
        .unwrap();

    assert_eq!(exchanges, 1);
    let spoken = synthesizer.spoken.lock().unwrap();
    assert_eq!(spoken.len(), 1);
    assert!(spoken[0].contains("Sorry"));
}

#[tokio::test]
async fn bridge_skips_empty_finals() {
    let config = crate::config::Config::default();
    let db = crate::database::Database::in_memory().await.unwrap();
    let gemini = crate::gemini::GeminiClient::with_api_key(&config.gemini, "k".to_string()).unwrap();
    let embedder =
        crate::gemini::GeminiClient::with_api_key(&config.gemini, "k".to_string()).unwrap();
    let vectors = crate::vector::VectorIndex::from_config(&config, embedder).unwrap();
    let engine = RagEngine::with_components(&config, db, gemini, vectors, None);

    let recognizer = ScriptedRecognizer::new(vec!["   ".to_string()]);
    let synthesizer = CapturingSynthesizer::default();
    let bridge = VoiceBridge::new(&engine, VoiceOptions::default());

    let exchanges = bridge
        .run("missing-session", &recognizer, &synthesizer)
        .await
        .unwrap();

    assert_eq!(exchanges, 0);
    assert!(synthesizer.spoken.lock().unwrap().is_empty());
}
