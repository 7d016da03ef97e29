//! Reframes side-by-side stereo video: one eye is cropped out of every frame, resampled to a fixed
//! size, encoded as HEVC, and written either as a raw Annex B stream or as fragmented MP4.
//!
//! The decoder and encoder backends built on libav are available with the `ffmpeg` feature.

pub mod cli;
pub use cli::*;

pub mod config;
pub use config::*;

pub mod error;
pub use error::{Error, Result};

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;

pub mod pipeline;
pub use pipeline::*;

pub mod planar;
pub use planar::*;

pub mod resample;
pub use resample::*;

pub mod roi;
pub use roi::*;

pub mod sink;
pub use sink::*;

pub mod source;
pub use source::*;

pub mod timestamp;
pub use timestamp::*;
