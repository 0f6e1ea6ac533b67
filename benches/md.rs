use std::sync::Arc;

use criterion::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;

use avmd::api::*;

criterion_group! {
    name = md;
    config = Criterion::default().sample_size(10);
    targets = bench_md_intra_64x64, bench_md_inter_64x64
}

fn noise_frame(ra: &mut ChaChaRng, w: usize, h: usize) -> Frame<pel> {
    let mut f = Frame::new(w, h);
    for p in f.planes.iter_mut() {
        for y in 0..p.cfg.height {
            for x in 0..p.cfg.width {
                p.set(x, y, ra.gen_range(0, 256));
            }
        }
    }
    f
}

fn config() -> EncoderConfig {
    EncoderConfig {
        width: 64,
        height: 64,
        preset: 8,
        ..Default::default()
    }
}

fn bench_md_intra_64x64(c: &mut Criterion) {
    let mut ra = ChaChaRng::from_seed([0; 32]);
    let frame = noise_frame(&mut ra, 64, 64);
    let mut ctx = Context::new(&config()).unwrap();

    c.bench_function("bench_md_intra_64x64", move |b| {
        b.iter(|| ctx.encode_picture(PictureInput::intra(frame.clone())).unwrap())
    });
}

fn bench_md_inter_64x64(c: &mut Criterion) {
    let mut ra = ChaChaRng::from_seed([1; 32]);
    let mut reference = noise_frame(&mut ra, 64, 64);
    reference.pad();
    let frame = noise_frame(&mut ra, 64, 64);
    let mut refs = ReferenceList::new();
    refs.set(0, 0, ReferencePicture::new(Arc::new(reference), 0, true));
    let mut ctx = Context::new(&config()).unwrap();

    c.bench_function("bench_md_inter_64x64", move |b| {
        b.iter(|| {
            ctx.encode_picture(PictureInput::inter(frame.clone(), refs.clone()))
                .unwrap()
        })
    });
}
