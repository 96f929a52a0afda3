//! Benchmarks for the hot paths of a download: quality negotiation,
//! progress line parsing and session record replacement.
//!
//! Run with: cargo bench --bench formats_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use dlweb::download::extractor::{FormatVariant, MediaInfo};
use dlweb::download::formats::select_formats;
use dlweb::download::progress::{ProgressRecord, ProgressStatus};
use dlweb::download::ytdlp::parse_output_line;
use dlweb::storage::SessionStore;

const HEIGHTS: [u64; 8] = [144, 240, 360, 480, 720, 1080, 1440, 2160];

/// Metadata shaped like a typical YouTube listing: several codecs per height
/// plus audio-only tracks.
fn media_info(variants: usize) -> MediaInfo {
    let formats = (0..variants)
        .map(|i| {
            let audio_only = i % 5 == 0;
            FormatVariant {
                format_id: i.to_string(),
                ext: Some(if i % 2 == 0 { "mp4" } else { "webm" }.to_string()),
                height: if audio_only { None } else { Some(HEIGHTS[i % HEIGHTS.len()]) },
                vcodec: Some(if audio_only { "none" } else { "avc1" }.to_string()),
                filesize: Some((i as u64 + 1) * 1_000_000),
                filesize_approx: None,
            }
        })
        .collect();

    MediaInfo {
        title: Some("Benchmark".to_string()),
        formats,
        ..MediaInfo::default()
    }
}

fn benchmark_select_formats(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_formats");

    for size in [10, 50, 200].iter() {
        let info = media_info(*size);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &info, |b, info| {
            b.iter(|| select_formats(black_box(info)));
        });
    }

    group.finish();
}

fn benchmark_parse_progress_line(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_output_line");

    group.bench_function("template", |b| {
        let line = "[dlweb-progress] downloading 5242880 10485760 NA 1048576.5 5";
        b.iter(|| parse_output_line(black_box(line)));
    });
    group.bench_function("plain_download", |b| {
        let line = "[download]  45.2% of ~ 10.00MiB at  1.00MiB/s ETA 00:05";
        b.iter(|| parse_output_line(black_box(line)));
    });
    group.bench_function("other", |b| {
        let line = "[youtube] abc: Downloading webpage";
        b.iter(|| parse_output_line(black_box(line)));
    });

    group.finish();
}

fn benchmark_session_updates(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_set");

    for sessions_count in [1, 100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(sessions_count),
            sessions_count,
            |b, &sessions_count| {
                let store = SessionStore::new();
                let ids: Vec<String> = (0..sessions_count).map(|_| store.create()).collect();
                let mut tick = 0u64;
                b.iter(|| {
                    tick += 1;
                    let record = ProgressRecord {
                        status: ProgressStatus::Downloading,
                        percentage: (tick % 1000) as f64 / 10.0,
                        downloaded: tick,
                        total: 1000,
                        ..ProgressRecord::starting()
                    };
                    let id = &ids[(tick as usize) % ids.len()];
                    black_box(store.set(id, record))
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_select_formats,
    benchmark_parse_progress_line,
    benchmark_session_updates
);
criterion_main!(benches);
