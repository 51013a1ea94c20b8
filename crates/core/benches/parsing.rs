use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use xxkcd_core::{Archive, HtmlTree, TreeParser, fix_encoding};

fn bench_tree_parse(c: &mut Criterion) {
    let archive = std::fs::read_to_string("tests/fixtures/archive.html").unwrap();
    let article = std::fs::read_to_string("tests/fixtures/article.html").unwrap();
    let large = archive.repeat(50);

    let mut group = c.benchmark_group("tree_parse");

    group.bench_with_input(BenchmarkId::new("article", article.len()), &article, |b, html| {
        b.iter(|| HtmlTree::parse(black_box(html)))
    });

    group.bench_with_input(BenchmarkId::new("archive_x50", large.len()), &large, |b, html| {
        let mut parser = TreeParser::new();
        b.iter(|| parser.parse(black_box(html)))
    });

    group.finish();
}

fn bench_archive(c: &mut Criterion) {
    let archive = std::fs::read_to_string("tests/fixtures/archive.html").unwrap();

    c.bench_function("archive_parse", |b| b.iter(|| Archive::parse(black_box(&archive))));
}

fn bench_fix_encoding(c: &mut Criterion) {
    let mut mangled = "¡play games! Kryptonite™ Clichéd".to_string();
    for _ in 0..4 {
        mangled = mangled.bytes().map(char::from).collect();
    }
    let plain = "I wrote 20 short programs in Python yesterday. It was wonderful.".repeat(10);

    let mut group = c.benchmark_group("fix_encoding");
    group.bench_function("mangled", |b| b.iter(|| fix_encoding(black_box(&mangled))));
    group.bench_function("plain", |b| b.iter(|| fix_encoding(black_box(&plain))));
    group.finish();
}

criterion_group!(benches, bench_tree_parse, bench_archive, bench_fix_encoding);
criterion_main!(benches);
