use std::fmt;

pub mod config;
pub mod decision;
pub mod error;
pub mod frame;
pub mod reference;

pub use config::*;
pub use decision::*;
pub use error::*;
pub use frame::{Frame, Pixel, Plane};
pub use reference::*;

pub use crate::def::{
    pel, CandClass, MotionVector, PartitionShape, PredictionMode, RefFrame, MAX_REF_IDX,
    MAX_SB_SIZE, REF_LIST_CNT,
};
pub use crate::enc::hme::{MeResult, MeSbResults};

use crate::def::Y_C;
use crate::enc::hme::motion_estimate_sb;
use crate::enc::mode::mode_decision_sb;
use crate::enc::{MdCtx, PictureCtx};

use log::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureType {
    /// only intra candidates are considered
    Intra,
    /// intra and inter candidates, at least one reference required
    Inter,
}

impl fmt::Display for PictureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PictureType::Intra => write!(f, "I"),
            PictureType::Inter => write!(f, "P"),
        }
    }
}

impl Default for PictureType {
    fn default() -> Self {
        PictureType::Intra
    }
}

/// One picture handed to the mode decision.
pub struct PictureInput {
    pub frame: Frame<pel>,
    pub picture_type: PictureType,
    pub refs: ReferenceList,
    /// later pictures will predict from this one
    pub used_as_reference: bool,
    /// quantizer index of the picture; the configured one when `None`
    pub qindex: Option<u8>,
}

impl PictureInput {
    pub fn intra(frame: Frame<pel>) -> Self {
        PictureInput {
            frame,
            picture_type: PictureType::Intra,
            refs: ReferenceList::new(),
            used_as_reference: true,
            qindex: None,
        }
    }

    pub fn inter(frame: Frame<pel>, refs: ReferenceList) -> Self {
        PictureInput {
            frame,
            picture_type: PictureType::Inter,
            refs,
            used_as_reference: true,
            qindex: None,
        }
    }
}

/// Everything produced for a fully decided picture.
pub struct EncodedPicture {
    pub decision: PictureDecision,
    /// padded reconstruction
    pub recon: Frame<pel>,
}

impl EncodedPicture {
    /// Turns the picture into a reference for later pictures.
    pub fn into_reference(self, poc: u64, intra_only: bool) -> ReferencePicture {
        let mvs = self.decision.temporal_mvs();
        ReferencePicture::new(std::sync::Arc::new(self.recon), poc, intra_only).with_temporal_mvs(mvs)
    }
}

/// Mode-decision session. One picture is in flight at a time; superblocks of
/// that picture are decided in raster order.
pub struct Context {
    md: MdCtx,
    pic: Option<PictureCtx>,
}

impl Context {
    pub fn new(cfg: &EncoderConfig) -> Result<Self, MdError> {
        Context::with_settings(cfg, EncoderSettings::from_preset(cfg.preset))
    }

    pub fn with_settings(cfg: &EncoderConfig, settings: EncoderSettings) -> Result<Self, MdError> {
        let md = MdCtx::new(*cfg, settings).map_err(|e| {
            error!("cannot create mode decision context: {}", e);
            e
        })?;
        info!(
            "mode decision {}x{} bd {} sb {} preset {} q {}",
            cfg.width, cfg.height, cfg.bit_depth, cfg.sb_size, cfg.preset, cfg.qindex
        );
        Ok(Context { md, pic: None })
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.md.cfg
    }

    pub fn settings(&self) -> &EncoderSettings {
        &self.md.settings
    }

    /// Starts a new picture; a picture still in flight is dropped.
    pub fn start_picture(&mut self, input: PictureInput) -> Result<(), MdError> {
        let cfg = self.md.cfg;
        let PictureInput {
            frame,
            picture_type,
            refs,
            used_as_reference,
            qindex,
        } = input;

        if frame.width() != cfg.width || frame.height() != cfg.height {
            error!(
                "picture is {}x{}, session is {}x{}",
                frame.width(),
                frame.height(),
                cfg.width,
                cfg.height
            );
            return Err(MdError::FrameDimensionMismatch(
                frame.width(),
                frame.height(),
                cfg.width,
                cfg.height,
            ));
        }

        let is_inter = picture_type == PictureType::Inter;
        if is_inter {
            if refs.is_empty() {
                error!("inter picture without any reference");
                return Err(MdError::MissingReference);
            }
            for rf in refs.available() {
                if let Some(r) = refs.get_ref(rf) {
                    if r.frame.width() != cfg.width || r.frame.height() != cfg.height {
                        return Err(MdError::FrameDimensionMismatch(
                            r.frame.width(),
                            r.frame.height(),
                            cfg.width,
                            cfg.height,
                        ));
                    }
                }
            }
        }

        let qindex = qindex.unwrap_or(cfg.qindex);
        let mut src = frame;
        src.pad();
        let recon = Frame::try_new(cfg.width, cfg.height)?;
        let sb_count = cfg.sb_cols() * cfg.sb_rows();
        let mut sb_coded = Vec::new();
        sb_coded
            .try_reserve_exact(sb_count)
            .map_err(|_| MdError::OutOfMemory("superblock map"))?;
        sb_coded.resize(sb_count, false);

        self.md.init_picture(qindex);
        self.pic = Some(PictureCtx {
            src,
            refs: if is_inter { refs } else { ReferenceList::new() },
            is_inter,
            used_as_reference,
            qindex,
            recon,
            decision: PictureDecision {
                width: cfg.width,
                height: cfg.height,
                superblocks: Vec::with_capacity(sb_count),
            },
            sb_coded,
        });
        debug!("start {} picture q {}", picture_type, qindex);
        Ok(())
    }

    /// Decides one superblock, running the coarse motion search first.
    pub fn encode_superblock(&mut self, sb_col: usize, sb_row: usize) -> Result<SuperblockDecision, MdError> {
        let pic = self.pic.as_ref().ok_or(MdError::NoPicture)?;
        let cfg = &self.md.cfg;
        if sb_col >= cfg.sb_cols() || sb_row >= cfg.sb_rows() {
            return Err(MdError::SuperblockOutOfRange(sb_col, sb_row));
        }
        let me = if pic.is_inter {
            motion_estimate_sb(
                &pic.src.planes[Y_C],
                &pic.refs,
                sb_col * cfg.sb_size,
                sb_row * cfg.sb_size,
                cfg.sb_size,
                self.md.settings.me.coarse_search_range,
                cfg.bit_depth,
            )
        } else {
            MeSbResults::new(cfg.sb_size)
        };
        self.encode_superblock_with_me(sb_col, sb_row, &me)
    }

    /// Decides one superblock from caller-provided coarse motion.
    pub fn encode_superblock_with_me(
        &mut self,
        sb_col: usize,
        sb_row: usize,
        me: &MeSbResults,
    ) -> Result<SuperblockDecision, MdError> {
        let cfg = self.md.cfg;
        if sb_col >= cfg.sb_cols() || sb_row >= cfg.sb_rows() {
            return Err(MdError::SuperblockOutOfRange(sb_col, sb_row));
        }
        if me.sb_size() != cfg.sb_size {
            return Err(MdError::InvalidConfig("motion results of another superblock size"));
        }
        let pic = self.pic.as_mut().ok_or(MdError::NoPicture)?;

        let (sb_x, sb_y) = (sb_col * cfg.sb_size, sb_row * cfg.sb_size);
        let sb = mode_decision_sb(&mut self.md, pic, me, sb_x, sb_y);

        let idx = sb_row * cfg.sb_cols() + sb_col;
        if pic.sb_coded[idx] {
            pic.decision.superblocks.retain(|s| s.x != sb_x || s.y != sb_y);
        }
        pic.sb_coded[idx] = true;
        pic.decision.superblocks.push(sb.clone());
        Ok(sb)
    }

    /// Decisions so far for the picture in flight.
    pub fn decision(&self) -> Option<&PictureDecision> {
        self.pic.as_ref().map(|p| &p.decision)
    }

    /// Reconstruction so far for the picture in flight.
    pub fn recon(&self) -> Option<&Frame<pel>> {
        self.pic.as_ref().map(|p| &p.recon)
    }

    /// Ends the picture in flight.
    pub fn finish_picture(&mut self) -> Result<EncodedPicture, MdError> {
        let pic = self.pic.take().ok_or(MdError::NoPicture)?;
        let coded = pic.sb_coded.iter().filter(|&&c| c).count();
        if coded != pic.sb_coded.len() {
            debug!("picture finished with {}/{} superblocks", coded, pic.sb_coded.len());
        }
        let mut recon = pic.recon;
        recon.pad();
        debug!("picture cost {}", pic.decision.total_cost());
        Ok(EncodedPicture {
            decision: pic.decision,
            recon,
        })
    }

    /// Decides every superblock of `input` in raster order.
    pub fn encode_picture(&mut self, input: PictureInput) -> Result<EncodedPicture, MdError> {
        self.start_picture(input)?;
        let (cols, rows) = (self.md.cfg.sb_cols(), self.md.cfg.sb_rows());
        for sb_row in 0..rows {
            for sb_col in 0..cols {
                self.encode_superblock(sb_col, sb_row)?;
            }
        }
        self.finish_picture()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn flat(w: usize, h: usize, v: pel) -> Frame<pel> {
        let mut f = Frame::new(w, h);
        for p in f.planes.iter_mut() {
            p.fill(v);
        }
        f
    }

    #[test]
    fn context_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Context>();
    }

    #[test]
    fn superblock_before_picture_fails() {
        let mut ctx = Context::new(&EncoderConfig::default()).unwrap();
        assert_eq!(ctx.encode_superblock(0, 0).unwrap_err(), MdError::NoPicture);
        assert!(ctx.finish_picture().is_err());
    }

    #[test]
    fn picture_checks() {
        let cfg = EncoderConfig {
            width: 32,
            height: 32,
            ..Default::default()
        };
        let mut ctx = Context::new(&cfg).unwrap();
        assert_eq!(
            ctx.start_picture(PictureInput::intra(flat(16, 32, 0))).unwrap_err(),
            MdError::FrameDimensionMismatch(16, 32, 32, 32)
        );
        assert_eq!(
            ctx.start_picture(PictureInput::inter(flat(32, 32, 0), ReferenceList::new()))
                .unwrap_err(),
            MdError::MissingReference
        );
        ctx.start_picture(PictureInput::intra(flat(32, 32, 0))).unwrap();
        assert_eq!(
            ctx.encode_superblock(1, 0).unwrap_err(),
            MdError::SuperblockOutOfRange(1, 0)
        );
    }

    #[test]
    fn flat_intra_picture() {
        let cfg = EncoderConfig {
            width: 32,
            height: 32,
            preset: 8,
            ..Default::default()
        };
        let mut ctx = Context::new(&cfg).unwrap();
        let out = ctx.encode_picture(PictureInput::intra(flat(32, 32, 128))).unwrap();
        let area: usize = out.decision.blocks().map(|b| b.width * b.height).sum();
        assert_eq!(area, 32 * 32);
        assert!(out.decision.blocks().all(|b| !b.is_inter()));
        for y in 0..32 {
            for x in 0..32 {
                assert_eq!(out.recon.planes[Y_C].p(x, y), 128);
            }
        }
    }
}
