use super::*;

fn config(chunk_size: usize, overlap: usize) -> ChunkingConfig {
    ChunkingConfig {
        chunk_size,
        overlap,
    }
}

#[test]
fn empty_text_produces_zero_chunks() {
    let chunks = chunk_text("doc1", "", &ChunkingConfig::default());
    assert!(chunks.is_empty());

    let chunks = chunk_text("doc1", "   \n\n  \t ", &ChunkingConfig::default());
    assert!(chunks.is_empty());
}

#[test]
fn short_text_is_a_single_chunk() {
    let chunks = chunk_text("doc1", "Hello world.", &ChunkingConfig::default());
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, "Hello world.");
    assert_eq!(chunks[0].start_index, 0);
    assert_eq!(chunks[0].id, "doc1_chunk_0");
}

#[test]
fn chunking_is_deterministic() {
    let text = "The quick brown fox jumps over the lazy dog. ".repeat(100);
    let cfg = config(1000, 200);

    let first = chunk_text("doc1", &text, &cfg);
    let second = chunk_text("doc1", &text, &cfg);
    assert_eq!(first, second);
}

#[test]
fn three_chunks_for_2500_chars() {
    // 2500 characters with sentence separators throughout.
    let text = "abcdefghi ".repeat(250);
    assert_eq!(text.len(), 2500);
    let chunks = chunk_text("doc1", &text, &config(1000, 200));

    assert_eq!(chunks.len(), 3);
    for chunk in &chunks {
        assert!(chunk.text.chars().count() <= 1000);
    }
}

#[test]
fn windows_overlap_by_configured_amount() {
    let text = "x".repeat(2500);
    let chunks = chunk_text("doc1", &text, &config(1000, 200));

    assert_eq!(chunks.len(), 3);
    for pair in chunks.windows(2) {
        assert_eq!(pair[1].start_index, pair[0].end_index - 200);
        // Shared text: tail of one chunk equals head of the next.
        let tail: String = pair[0].text.chars().rev().take(200).collect();
        let head: String = pair[1].text.chars().take(200).collect();
        let tail_forward: String = tail.chars().rev().collect();
        assert_eq!(tail_forward, head);
    }
}

#[test]
fn spans_cover_the_cleaned_text() {
    let text = "Sentences go here. More prose follows. ".repeat(80);
    let cleaned = clean_text(&text);
    let total_chars = cleaned.chars().count();
    let chunks = chunk_text("doc1", &text, &config(1000, 200));

    assert_eq!(chunks[0].start_index, 0);
    assert_eq!(chunks.last().expect("chunks exist").end_index, total_chars);
    for pair in chunks.windows(2) {
        // No gap larger than the overlap between consecutive spans.
        assert!(pair[1].start_index <= pair[0].end_index);
    }
}

#[test]
fn prefers_paragraph_separator_over_word_boundary() {
    let mut text = "a".repeat(600);
    text.push_str("\n\n");
    text.push_str(&"b ".repeat(400));
    let chunks = chunk_text("doc1", &text, &config(1000, 200));

    // The first cut should land just past the paragraph break rather than
    // splitting the run of "b " words at the 1000-char mark.
    assert_eq!(chunks[0].end_index, 602);
    assert!(chunks[0].text.trim_end().ends_with('a'));
}

#[test]
fn chunk_indices_and_ids_are_sequential() {
    let text = "word ".repeat(600);
    let chunks = chunk_text("mydoc", &text, &config(500, 100));

    assert!(chunks.len() > 2);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_index, i);
        assert_eq!(chunk.id, format!("mydoc_chunk_{}", i));
        assert_eq!(chunk.document_id, "mydoc");
    }
}

#[test]
fn forward_progress_with_pathological_separators() {
    // Separators appear only inside the overlap zone; the chunker must not
    // loop or move backward.
    let mut text = String::new();
    for _ in 0..20 {
        text.push_str(&"z".repeat(90));
        text.push(' ');
    }
    let chunks = chunk_text("doc1", &text, &config(100, 80));

    let mut prev_start = None;
    for chunk in &chunks {
        if let Some(prev) = prev_start {
            assert!(chunk.start_index > prev);
        }
        prev_start = Some(chunk.start_index);
    }
}

#[test]
fn clean_text_normalizes_whitespace() {
    let raw = "Hello\t\tworld  again\r\nNext\r\n\r\n\r\n\r\nFar";
    let cleaned = clean_text(raw);
    assert_eq!(cleaned, "Hello world again\nNext\n\nFar");
}

#[test]
fn handles_multibyte_characters() {
    let text = "héllo wörld ünïcode ".repeat(100);
    let chunks = chunk_text("doc1", &text, &config(300, 50));

    assert!(!chunks.is_empty());
    let cleaned = clean_text(&text);
    let total_chars = cleaned.chars().count();
    for chunk in &chunks {
        assert!(chunk.end_index <= total_chars);
        assert_eq!(
            chunk.text.chars().count(),
            chunk.end_index - chunk.start_index
        );
    }
}
