use criterion::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;

use avmd::bench::*;

criterion_group!(kernels, bench_sad_16x16, bench_sad_64x64, bench_dct_8x8, bench_dct_32x32);

fn random_pels(ra: &mut ChaChaRng, n: usize) -> Vec<u16> {
    (0..n).map(|_| ra.gen_range(0, 256)).collect()
}

fn bench_sad(c: &mut Criterion, name: &str, size: usize) {
    let mut ra = ChaChaRng::from_seed([0; 32]);
    let src = random_pels(&mut ra, size * size);
    let pred = random_pels(&mut ra, size * size);

    c.bench_function(name, move |b| b.iter(|| sad(size, size, &src, size, &pred, size)));
}

fn bench_sad_16x16(c: &mut Criterion) {
    bench_sad(c, "bench_sad_16x16", 16);
}

fn bench_sad_64x64(c: &mut Criterion) {
    bench_sad(c, "bench_sad_64x64", 64);
}

fn bench_dct(c: &mut Criterion, name: &str, size: usize) {
    let mut ra = ChaChaRng::from_seed([0; 32]);
    let residual: Vec<i32> = (0..size * size).map(|_| ra.gen_range(-255, 256)).collect();
    let pred = random_pels(&mut ra, size * size);
    let mut coeff = vec![0i32; size * size];
    let mut recon = vec![0u16; size * size];

    c.bench_function(name, move |b| {
        b.iter(|| dct_round_trip(&residual, &mut coeff, &pred, &mut recon, size, size))
    });
}

fn bench_dct_8x8(c: &mut Criterion) {
    bench_dct(c, "bench_dct_8x8", 8);
}

fn bench_dct_32x32(c: &mut Criterion) {
    bench_dct(c, "bench_dct_32x32", 32);
}
