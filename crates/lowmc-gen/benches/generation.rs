use criterion::{criterion_group, criterion_main, Criterion};

use lowmc_gen::{
    build_artifact, sample_reference_instance, ArtifactConfig, BitStream, InstanceParams,
    KeyScheduleReducer, PackedMatrix, WordWidth,
};

fn bench_sampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("sampling");
    group.sample_size(10);
    group.bench_function("bitstream_4096", |b| {
        b.iter(|| BitStream::new().take(4096).filter(|bit| *bit).count());
    });
    group.bench_function("instance_128_128_20", |b| {
        b.iter(|| sample_reference_instance(InstanceParams::LOWMC_128_128_20).unwrap());
    });
    group.finish();
}

fn bench_reduction(c: &mut Criterion) {
    let instance = sample_reference_instance(InstanceParams::LOWMC_128_128_20)
        .unwrap()
        .oriented();

    let mut group = c.benchmark_group("reduction");
    group.sample_size(10);
    group.bench_function("reduce_128_128_20", |b| {
        b.iter(|| KeyScheduleReducer::new(10).reduce(&instance).unwrap());
    });
    group.finish();
}

fn bench_packing(c: &mut Criterion) {
    let instance = sample_reference_instance(InstanceParams::LOWMC_128_128_20).unwrap();
    let layer = &instance.linear_layers()[0];

    let mut group = c.benchmark_group("packing");
    group.bench_function("encode_transposed_w64", |b| {
        b.iter(|| PackedMatrix::encode_transposed(layer, WordWidth::W64));
    });
    group.bench_function("encode_w8", |b| {
        b.iter(|| PackedMatrix::encode(layer, WordWidth::W8));
    });
    group.sample_size(10);
    group.bench_function("build_artifact_reduced", |b| {
        b.iter(|| build_artifact(&instance, &ArtifactConfig::default()).unwrap());
    });
    group.finish();
}

criterion_group!(benches, bench_sampling, bench_reduction, bench_packing);
criterion_main!(benches);
