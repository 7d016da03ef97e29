//! Decoding and encoding backed by libav.

use ffmpeg_next as ffmpeg;

mod encoder;
pub use encoder::*;

mod scaler;
pub use scaler::*;

mod source;
pub use source::*;

/// Initializes libav and limits its own logging to errors. Safe to call more than once.
pub fn init() -> Result<(), ffmpeg::Error> {
    ffmpeg::init()?;
    ffmpeg::util::log::set_level(ffmpeg::util::log::Level::Error);
    Ok(())
}
