//! Benchmarks for the hot paths on the ingest path: chunking, embedding
//! batches, and ANN vector search.
//!
//! Run with: `cargo bench --package omni-core`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tempfile::tempdir;

use omni_core::chunker::chunk_elements;
use omni_core::config::{Config, EmbeddingConfig};
use omni_core::embedder::Embedder;
use omni_core::parser::StructuralElement;
use omni_core::types::{ChunkKind, Visibility};
use omni_core::vector::VectorIndex;

fn synthetic_element(index: usize, body_lines: usize) -> StructuralElement {
    let mut content = format!("fn handler_{index}(req: Request) -> Response {{\n");
    for line in 0..body_lines {
        content.push_str(&format!("    let v{line} = req.field({line});\n"));
    }
    content.push_str("    Response::ok(v0)\n}\n");

    StructuralElement {
        symbol_path: format!("module::handler_{index}"),
        name: format!("handler_{index}"),
        kind: ChunkKind::Function,
        visibility: Visibility::Public,
        line_start: 1,
        line_end: body_lines as u32 + 2,
        content,
        doc_comment: None,
        references: Vec::new(),
    }
}

fn bench_chunking(c: &mut Criterion) {
    let dir = tempdir().expect("tempdir");
    let config = Config::defaults(dir.path());

    let mut group = c.benchmark_group("chunk_elements");
    for &n in &[10usize, 100, 500] {
        let elements: Vec<StructuralElement> =
            (0..n).map(|i| synthetic_element(i, 20)).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &elements, |b, elements| {
            b.iter(|| black_box(chunk_elements(elements, 1, &config)));
        });
    }
    group.finish();
}

fn bench_embedding_batch(c: &mut Criterion) {
    // `degraded()` never loads the ONNX model (which needs a downloaded
    // `.onnx` file), so this measures the dispatch/allocation overhead of
    // `embed_batch` at increasing batch sizes rather than inference latency.
    let embedder = Embedder::degraded(&EmbeddingConfig::default());

    let mut group = c.benchmark_group("embed_batch");
    for &n in &[8usize, 32, 128] {
        let texts: Vec<String> = (0..n).map(|i| format!("fn handler_{i}() {{}}")).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &texts, |b, texts| {
            let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            b.iter(|| black_box(embedder.embed_batch(&refs)));
        });
    }
    group.finish();
}

fn random_unit_vector(dimensions: usize, seed: u64) -> Vec<f32> {
    let mut state = seed;
    let mut v = Vec::with_capacity(dimensions);
    for _ in 0..dimensions {
        state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
        let f = ((state >> 33) as f64 / u32::MAX as f64) as f32 - 0.5;
        v.push(f);
    }
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

fn bench_vector_search(c: &mut Criterion) {
    const DIM: usize = 384;

    let mut group = c.benchmark_group("vector_ann_search");
    for &n in &[1_000usize, 10_000] {
        let dir = tempdir().expect("tempdir");
        let mut index = VectorIndex::open(&dir.path().join("bench.vec"), DIM).expect("open index");
        for i in 0..n {
            index
                .add(i as u64, &random_unit_vector(DIM, i as u64))
                .expect("add");
        }
        let query = random_unit_vector(DIM, 999_999);

        group.bench_with_input(BenchmarkId::from_parameter(n), &index, |b, index| {
            b.iter(|| black_box(index.search(&query, 10).expect("search")));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_chunking, bench_embedding_batch, bench_vector_search);
criterion_main!(benches);
