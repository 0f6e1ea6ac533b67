use criterion::*;

cfg_if::cfg_if! {
    if #[cfg(feature="bench")] {
        mod kernels;
        mod md;

        criterion_main!(kernels::kernels, md::md);
    } else {
        fn bench_no_op(_: &mut Criterion) {
        }
        criterion_group!(
            no_op,
            bench_no_op,
        );
        criterion_main!(no_op);
    }
}
