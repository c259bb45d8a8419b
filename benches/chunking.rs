use criterion::{Criterion, criterion_group, criterion_main};
use ragchat::documents::chunking::{ChunkingConfig, chunk_text, clean_text};
use std::hint::black_box;

fn sample_document() -> String {
    let paragraph = "Retrieval augmented generation combines a search step with \
a language model. Relevant passages are fetched from an index and placed in \
front of the question so the model can ground its answer in them.\n\n\
Chunking decides the granularity of that index. Chunks that are too small \
lose surrounding context, while chunks that are too large dilute the match \
signal and crowd out other passages from the prompt.\n\n";
    paragraph.repeat(200)
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let document = sample_document();
    let config = ChunkingConfig::default();

    c.bench_function("clean_text", |b| {
        b.iter(|| clean_text(black_box(&document)))
    });
    c.bench_function("chunk_text", |b| {
        b.iter(|| chunk_text(black_box("doc-1"), black_box(&document), black_box(&config)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
