mod encoder;
mod speed;

pub use encoder::*;
pub use speed::*;
