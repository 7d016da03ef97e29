use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::{
    config::{EncoderProfile, PipelineConfig, DEFAULT_OUTPUT_SIZE},
    resample::Interpolation,
    roi::Eye,
    sink::is_container_path,
    timestamp::RateMode,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum RateArg {
    /// Drop every other input frame and halve the output frame rate.
    #[value(alias = "skip")]
    Decimate,
}

/// Extracts one eye of a side-by-side stereo video, resizes it, and encodes it as HEVC. Output
/// files ending in .mp4 are written as fragmented MP4, anything else as a raw Annex B stream.
#[derive(Debug, Parser)]
#[command(name = "stereo-reframe", version)]
pub struct Cli {
    pub input: PathBuf,

    pub output: PathBuf,

    #[arg(value_enum)]
    pub rate: Option<RateArg>,

    /// Output width and height.
    #[arg(long)]
    pub size: Option<usize>,

    /// Output width, overriding --size.
    #[arg(long)]
    pub width: Option<usize>,

    /// Output height, overriding --size.
    #[arg(long)]
    pub height: Option<usize>,

    /// Input frame rate.
    #[arg(long, default_value_t = 50)]
    pub frame_rate: u32,

    /// Ticks per second of output timestamps.
    #[arg(long, default_value_t = 48000)]
    pub timescale: u32,

    #[arg(long, value_enum, default_value_t = EncoderProfile::Quality)]
    pub profile: EncoderProfile,

    #[arg(long, value_enum, default_value_t = Interpolation::Bicubic)]
    pub interpolation: Interpolation,

    #[arg(long, value_enum, default_value_t = Eye::Left)]
    pub eye: Eye,
}

impl Cli {
    pub fn rate_mode(&self) -> RateMode {
        match self.rate {
            Some(RateArg::Decimate) => RateMode::Decimated,
            None => RateMode::Full,
        }
    }

    pub fn writes_container(&self) -> bool {
        is_container_path(&self.output)
    }

    /// Builds the pipeline configuration for an input of the given dimensions.
    pub fn pipeline_config(&self, source_width: usize, source_height: usize) -> PipelineConfig {
        let size = self.size.unwrap_or(DEFAULT_OUTPUT_SIZE);
        PipelineConfig::default()
            .with_source_size(source_width, source_height)
            .with_output_size(self.width.unwrap_or(size), self.height.unwrap_or(size))
            .with_eye(self.eye)
            .with_frame_rate(self.frame_rate)
            .with_ticks_per_second(self.timescale)
            .with_rate_mode(self.rate_mode())
            .with_profile(self.profile)
            .with_interpolation(self.interpolation)
    }
}
