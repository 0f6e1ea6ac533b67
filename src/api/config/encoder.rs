use crate::api::MdError;
use crate::def::*;

pub const MAX_QINDEX: u8 = 255;
pub const MAX_PRESET: u8 = 8;

// Encoder settings which impact the mode decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncoderConfig {
    // Width of the frames in pixels.
    pub width: usize,
    // Height of the frames in pixels.
    pub height: usize,
    // Bit depth, 8 or 10.
    pub bit_depth: usize,
    // The base quantizer index (0..=255).
    pub qindex: u8,
    // Superblock side, 64 or 128.
    pub sb_size: usize,
    // Speed preset, 0 (slowest) to 8 (fastest).
    pub preset: u8,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        EncoderConfig {
            width: 64,
            height: 64,
            bit_depth: 8,
            qindex: 100,
            sb_size: 64,
            preset: 6,
        }
    }
}

impl EncoderConfig {
    pub fn validate(&self) -> Result<(), MdError> {
        if self.width == 0 || self.height == 0 {
            return Err(MdError::InvalidConfig("picture dimensions must be non-zero"));
        }
        if self.width > 16384 || self.height > 16384 {
            return Err(MdError::InvalidConfig("picture dimensions exceed 16384"));
        }
        if self.bit_depth != 8 && self.bit_depth != 10 {
            return Err(MdError::InvalidConfig("bit depth must be 8 or 10"));
        }
        if self.sb_size != 64 && self.sb_size != MAX_SB_SIZE {
            return Err(MdError::UnsupportedSuperblockSize(self.sb_size));
        }
        if self.preset > MAX_PRESET {
            return Err(MdError::InvalidConfig("preset must be within 0..=8"));
        }
        Ok(())
    }

    /// Picture dimensions rounded up to the minimum block size.
    pub fn aligned_width(&self) -> usize {
        (self.width + MIN_BLOCK_SIZE - 1) & !(MIN_BLOCK_SIZE - 1)
    }

    pub fn aligned_height(&self) -> usize {
        (self.height + MIN_BLOCK_SIZE - 1) & !(MIN_BLOCK_SIZE - 1)
    }

    pub fn sb_cols(&self) -> usize {
        (self.width + self.sb_size - 1) / self.sb_size
    }

    pub fn sb_rows(&self) -> usize {
        (self.height + self.sb_size - 1) / self.sb_size
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_bad_configs() {
        let mut cfg = EncoderConfig::default();
        assert!(cfg.validate().is_ok());
        cfg.sb_size = 32;
        assert_eq!(cfg.validate(), Err(MdError::UnsupportedSuperblockSize(32)));
        cfg.sb_size = 64;
        cfg.bit_depth = 12;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn superblock_grid() {
        let cfg = EncoderConfig {
            width: 130,
            height: 64,
            ..Default::default()
        };
        assert_eq!(cfg.sb_cols(), 3);
        assert_eq!(cfg.sb_rows(), 1);
        assert_eq!(cfg.aligned_width(), 136);
    }
}
