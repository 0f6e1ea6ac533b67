use thiserror::Error;

/// Errors returned by the mode-decision entry points.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MdError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("unsupported superblock size {0}")]
    UnsupportedSuperblockSize(usize),
    #[error("out of memory allocating {0}")]
    OutOfMemory(&'static str),
    #[error("no picture has been started")]
    NoPicture,
    #[error("superblock ({0}, {1}) is outside the picture")]
    SuperblockOutOfRange(usize, usize),
    #[error("frame is {0}x{1}, expected {2}x{3}")]
    FrameDimensionMismatch(usize, usize, usize, usize),
    #[error("inter picture without any reference")]
    MissingReference,
}
