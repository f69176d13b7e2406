use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::io::{Cursor, Read, Write};

use xz_pipe::{CancelToken, XzOptions, XzReader, XzWriter};

fn generate_compressible_data(size: usize) -> Vec<u8> {
    let pattern = b"The quick brown fox jumps over the lazy dog. ";
    let mut data = Vec::with_capacity(size);
    while data.len() < size {
        data.extend_from_slice(pattern);
    }
    data.truncate(size);
    data
}

fn compress(data: &[u8], level: u32) -> Vec<u8> {
    let opts = XzOptions::new().level(level).unwrap().library_only();
    let mut writer = XzWriter::with_options(CancelToken::new(), Vec::new(), opts).unwrap();
    writer.write_all(data).unwrap();
    writer.finish().unwrap()
}

fn bench_compress(c: &mut Criterion) {
    let size = 256 * 1024;
    let data = generate_compressible_data(size);

    let mut group = c.benchmark_group("compress_library");
    group.throughput(Throughput::Bytes(size as u64));
    for level in [XzOptions::FAST, XzOptions::DEFAULT] {
        group.bench_with_input(BenchmarkId::new("level", level), &data, |b, data| {
            b.iter(|| black_box(compress(black_box(data), level)));
        });
    }
    group.finish();
}

fn bench_decompress(c: &mut Criterion) {
    let size = 256 * 1024;
    let data = generate_compressible_data(size);
    let compressed = compress(&data, XzOptions::DEFAULT);

    let mut group = c.benchmark_group("decompress_library");
    group.throughput(Throughput::Bytes(size as u64));
    group.bench_with_input(
        BenchmarkId::new("payload", size),
        &compressed,
        |b, compressed| {
            b.iter(|| {
                let opts = XzOptions::new().library_only();
                let mut reader = XzReader::with_options(
                    CancelToken::new(),
                    Cursor::new(compressed.clone()),
                    opts,
                )
                .unwrap();
                let mut out = Vec::new();
                reader.read_to_end(&mut out).unwrap();
                black_box(out)
            });
        },
    );
    group.finish();
}

criterion_group!(benches, bench_compress, bench_decompress);
criterion_main!(benches);
