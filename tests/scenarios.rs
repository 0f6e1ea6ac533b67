use std::sync::Arc;

use interpolate_name::interpolate_test;
use pretty_assertions::assert_eq;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;

use avmd::api::*;

fn flat_frame(w: usize, h: usize, v: pel) -> Frame<pel> {
    let mut f = Frame::new(w, h);
    for p in f.planes.iter_mut() {
        p.fill(v);
    }
    f
}

fn noise_frame(seed: u8, w: usize, h: usize) -> Frame<pel> {
    let mut ra = ChaChaRng::from_seed([seed; 32]);
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

fn reference(mut frame: Frame<pel>) -> ReferenceList {
    frame.pad();
    let mut refs = ReferenceList::new();
    refs.set(0, 0, ReferencePicture::new(Arc::new(frame), 0, true));
    refs
}

fn config(width: usize, height: usize, sb_size: usize) -> EncoderConfig {
    EncoderConfig {
        width,
        height,
        sb_size,
        preset: 8,
        ..Default::default()
    }
}

fn assert_tiled(decision: &PictureDecision) {
    let (w, h) = (decision.width, decision.height);
    let mut hits = vec![0u32; w * h];
    for b in decision.blocks() {
        assert!(b.x + b.width <= w && b.y + b.height <= h, "leaf {}x{} at ({}, {})", b.width, b.height, b.x, b.y);
        for y in b.y..b.y + b.height {
            for x in b.x..b.x + b.width {
                hits[y * w + x] += 1;
            }
        }
    }
    assert!(hits.iter().all(|&n| n == 1));
}

#[test]
fn static_flat_block_is_inter_skip() {
    let mut ctx = Context::new(&config(64, 64, 64)).unwrap();
    let refs = reference(flat_frame(64, 64, 90));
    let out = ctx
        .encode_picture(PictureInput::inter(flat_frame(64, 64, 90), refs))
        .unwrap();

    assert_tiled(&out.decision);
    let b = out.decision.block_at(0, 0).unwrap();
    assert!(b.is_inter(), "{:?}", b.mode);
    assert_eq!(b.mv(), Some(MotionVector::zero()));
    assert!(b.skip);
    assert_eq!((b.y_nonzero, b.uv_nonzero), (0, 0));
    for b in out.decision.blocks() {
        assert!(b.skip);
        assert_eq!(b.y_nonzero + b.uv_nonzero, 0);
    }
    for y in 0..64 {
        for x in 0..64 {
            assert_eq!(out.recon.planes[0].p(x, y), 90);
        }
    }
}

#[test]
fn horizontal_stripes_pick_horizontal_intra() {
    let (w, h) = (128, 8);
    let mut ra = ChaChaRng::from_seed([7; 32]);
    let stripes: Vec<pel> = (0..h).map(|_| ra.gen_range(40, 180)).collect();
    let mut src = flat_frame(w, h, 128);
    for y in 0..h {
        for x in 0..w {
            src.planes[0].set(x, y, stripes[y] + (x % 8) as pel * 6);
        }
    }

    let mut ctx = Context::new(&config(w, h, 64)).unwrap();
    let refs = reference(noise_frame(3, w, h));
    let out = ctx.encode_picture(PictureInput::inter(src, refs)).unwrap();

    assert_tiled(&out.decision);
    let b = out.decision.block_at(72, 4).unwrap();
    assert!(!b.is_inter(), "{:?}", b.mode);
    let horizontal = [
        PredictionMode::H_PRED,
        PredictionMode::D157_PRED,
        PredictionMode::D203_PRED,
    ];
    assert!(horizontal.contains(&b.prediction_mode()), "{:?}", b.mode);
    assert!(b.y_nonzero > 0);
}

#[interpolate_test(sb64_intra, 64, false)]
#[interpolate_test(sb64_inter, 64, true)]
#[interpolate_test(sb128_intra, 128, false)]
fn boundary_blocks_never_straddle(sb_size: usize, inter: bool) {
    let (w, h) = (80, 80);
    let mut ctx = Context::new(&config(w, h, sb_size)).unwrap();
    let src = noise_frame(1, w, h);
    let input = if inter {
        PictureInput::inter(src, reference(noise_frame(2, w, h)))
    } else {
        PictureInput::intra(src)
    };
    let out = ctx.encode_picture(input).unwrap();

    assert_tiled(&out.decision);
    let per_side = (w + sb_size - 1) / sb_size;
    assert_eq!(out.decision.superblocks.len(), per_side * per_side);
    // the 16x16 squares along the edge are inside and remain codable
    assert!(out.decision.block_at(64, 64).is_some());
}

#[test]
fn superblocks_decided_one_at_a_time() {
    let cfg = config(128, 64, 64);
    let src = noise_frame(5, 128, 64);

    let mut whole = Context::new(&cfg).unwrap();
    let expected = whole.encode_picture(PictureInput::intra(src.clone())).unwrap();

    let mut ctx = Context::new(&cfg).unwrap();
    ctx.start_picture(PictureInput::intra(src)).unwrap();
    let left = ctx.encode_superblock(0, 0).unwrap();
    let right = ctx.encode_superblock(1, 0).unwrap();
    let out = ctx.finish_picture().unwrap();

    assert_eq!(out.decision, expected.decision);
    assert_eq!(left.cost + right.cost, expected.decision.total_cost());
}

#[test]
fn reconstruction_serves_as_reference() {
    let cfg = config(64, 64, 64);
    let src = noise_frame(9, 64, 64);
    let mut ctx = Context::new(&cfg).unwrap();

    let key = ctx.encode_picture(PictureInput::intra(src.clone())).unwrap();
    let key_cost = key.decision.total_cost();
    let mut refs = ReferenceList::new();
    refs.set(0, 0, key.into_reference(0, true));

    let next = ctx.encode_picture(PictureInput::inter(src, refs)).unwrap();
    assert_tiled(&next.decision);
    assert!(next.decision.total_cost() < key_cost);
    assert!(next.decision.blocks().any(|b| b.is_inter()));
}
