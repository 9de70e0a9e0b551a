//! Staging benchmarks

use bloom_epub_core::staging::names::{adjusted_file_name, to_valid_xml_id};
use bloom_epub_core::visibility::StaticOracle;
use bloom_epub_core::{Book, Collaborators, EpubAssembler, EpubOptions, NullProgress};
use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::Arc;

const PAGE_COUNT: usize = 24;

fn book_html() -> String {
    let pages: String = (1..=PAGE_COUNT)
        .map(|n| {
            format!(
                r#"<div class="bloom-page numberedPage A5Portrait"><div class="marginBox"><div class="bloom-translationGroup"><div class="bloom-editable bloom-content1" lang="en">Page {n} of the story.</div><div class="bloom-editable" lang="fr">Page {n} de l'histoire.</div></div></div></div>"#
            )
        })
        .collect();
    format!(
        r#"<html><head><title>Bench</title></head><body><div id="bloomDataDiv"><div data-book="bookTitle" lang="en">Bench</div></div>{}</body></html>"#,
        pages
    )
}

fn naming_benchmark(c: &mut Criterion) {
    let references = [
        "images/my picture (1).png",
        "audio/i0f3e2c1a-7d5b.mp3",
        "a+b&c.jpg",
        "पुस्तक.png",
    ];
    c.bench_function("adjusted_file_name", |b| {
        b.iter(|| {
            for reference in references {
                std::hint::black_box(adjusted_file_name(std::hint::black_box(reference)));
            }
        })
    });
    c.bench_function("to_valid_xml_id", |b| {
        b.iter(|| std::hint::black_box(to_valid_xml_id(std::hint::black_box("1 cover:image"))))
    });
}

fn staging_benchmark(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("temp dir");
    let folder = dir.path().join("Bench");
    std::fs::create_dir_all(&folder).expect("book folder");
    std::fs::write(folder.join("Bench.htm"), book_html()).expect("book file");
    std::fs::write(folder.join("thumbnail.png"), b"png").expect("thumbnail");
    let book = Book::load(&folder).expect("load book");

    let options = EpubOptions::new()
        .with_staging_root(dir.path().join("staging"))
        .without_system_fonts();
    let collaborators =
        Collaborators::new(Arc::new(StaticOracle::new())).with_progress(Arc::new(NullProgress));
    let assembler = EpubAssembler::new(options, collaborators);

    c.bench_function("stage_24_pages", |b| {
        b.iter(|| std::hint::black_box(assembler.stage(&book).expect("stage")))
    });
}

criterion_group!(benches, naming_benchmark, staging_benchmark);
criterion_main!(benches);
