use crate::{
    error::{Error, Result},
    resample::{validate_geometry, Interpolation},
    roi::{Eye, RegionOfInterest},
    sink::StreamConfig,
    timestamp::{RateMode, TimestampPolicy},
};

pub const DEFAULT_SOURCE_WIDTH: usize = 5760;
pub const DEFAULT_SOURCE_HEIGHT: usize = 2880;
pub const DEFAULT_OUTPUT_SIZE: usize = 200;
pub const DEFAULT_FRAME_RATE: u32 = 50;
pub const DEFAULT_TICKS_PER_SECOND: u32 = 48000;
pub const DEFAULT_KEYFRAME_INTERVAL: u32 = 120;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum EncoderProfile {
    /// Real-time oriented: no lookahead, no B-frames, a single reference.
    Fast,
    /// Slower, rate-controlled encoding with B-frames and psychovisual tuning.
    #[default]
    Quality,
}

/// Everything the encoder is configured with before the first frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncoderConfig {
    pub width: u32,
    pub height: u32,
    /// Output frame rate as a fraction.
    pub frame_rate: (u32, u32),
    pub ticks_per_second: u32,
    pub keyframe_min: u32,
    pub keyframe_max: u32,
    pub closed_gop: bool,
    pub repeat_headers: bool,
    pub profile: EncoderProfile,
}

impl EncoderConfig {
    pub fn preset(&self) -> &'static str {
        match self.profile {
            EncoderProfile::Fast => "ultrafast",
            EncoderProfile::Quality => "medium",
        }
    }

    pub fn tune(&self) -> Option<&'static str> {
        match self.profile {
            EncoderProfile::Fast => Some("zerolatency"),
            EncoderProfile::Quality => None,
        }
    }

    pub fn b_frames(&self) -> u32 {
        match self.profile {
            EncoderProfile::Fast => 0,
            EncoderProfile::Quality => 3,
        }
    }

    pub fn references(&self) -> u32 {
        match self.profile {
            EncoderProfile::Fast => 1,
            EncoderProfile::Quality => 3,
        }
    }

    /// Average bitrate in kbit/s, or `None` for the preset's default rate control.
    pub fn bitrate_kbps(&self) -> Option<u32> {
        match self.profile {
            EncoderProfile::Fast => None,
            EncoderProfile::Quality => Some(3000),
        }
    }

    /// The libx265 parameter string. The GOP structure is always spelled out so presets and tunes
    /// can't override it.
    pub fn x265_params(&self) -> String {
        let mut params = vec![
            format!("keyint={}", self.keyframe_max),
            format!("min-keyint={}", self.keyframe_min),
            format!("open-gop={}", !self.closed_gop as u8),
            format!("repeat-headers={}", self.repeat_headers as u8),
            "annexb=1".to_string(),
            format!("bframes={}", self.b_frames()),
            format!("ref={}", self.references()),
        ];
        match self.profile {
            EncoderProfile::Fast => params.push("rc-lookahead=0".to_string()),
            EncoderProfile::Quality => params.extend(
                [
                    "rc-lookahead=20",
                    "qpmin=17",
                    "qpmax=37",
                    "psy-rd=1.0",
                    "psy-rdoq=1.0",
                    "wpp=1",
                    "frame-threads=4",
                ]
                .map(String::from),
            ),
        }
        if let Some(kbps) = self.bitrate_kbps() {
            params.push(format!("bitrate={}", kbps));
        }
        params.join(":")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    pub source_width: usize,
    pub source_height: usize,
    pub eye: Eye,
    pub output_width: usize,
    pub output_height: usize,
    /// The input frame rate in frames per second.
    pub frame_rate: u32,
    pub ticks_per_second: u32,
    pub rate_mode: RateMode,
    pub profile: EncoderProfile,
    pub interpolation: Interpolation,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_width: DEFAULT_SOURCE_WIDTH,
            source_height: DEFAULT_SOURCE_HEIGHT,
            eye: Eye::Left,
            output_width: DEFAULT_OUTPUT_SIZE,
            output_height: DEFAULT_OUTPUT_SIZE,
            frame_rate: DEFAULT_FRAME_RATE,
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,
            rate_mode: RateMode::Full,
            profile: EncoderProfile::default(),
            interpolation: Interpolation::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_source_size(self, source_width: usize, source_height: usize) -> Self {
        Self {
            source_width,
            source_height,
            ..self
        }
    }

    pub fn with_output_size(self, output_width: usize, output_height: usize) -> Self {
        Self {
            output_width,
            output_height,
            ..self
        }
    }

    pub fn with_eye(self, eye: Eye) -> Self {
        Self { eye, ..self }
    }

    pub fn with_frame_rate(self, frame_rate: u32) -> Self {
        Self { frame_rate, ..self }
    }

    pub fn with_ticks_per_second(self, ticks_per_second: u32) -> Self {
        Self { ticks_per_second, ..self }
    }

    pub fn with_rate_mode(self, rate_mode: RateMode) -> Self {
        Self { rate_mode, ..self }
    }

    pub fn with_profile(self, profile: EncoderProfile) -> Self {
        Self { profile, ..self }
    }

    pub fn with_interpolation(self, interpolation: Interpolation) -> Self {
        Self { interpolation, ..self }
    }

    /// The half of the source frame that is kept.
    pub fn roi(&self) -> RegionOfInterest {
        RegionOfInterest::eye(self.eye, self.source_width, self.source_height)
    }

    pub fn timestamp_policy(&self) -> Result<TimestampPolicy> {
        TimestampPolicy::new(self.ticks_per_second, self.frame_rate, self.rate_mode)
    }

    fn output_dimensions(&self) -> Result<(u32, u32)> {
        match (u32::try_from(self.output_width), u32::try_from(self.output_height)) {
            (Ok(w), Ok(h)) => Ok((w, h)),
            _ => Err(Error::config(format!("output size {}x{} is too large", self.output_width, self.output_height))),
        }
    }

    pub fn encoder_config(&self) -> Result<EncoderConfig> {
        let (width, height) = self.output_dimensions()?;
        Ok(EncoderConfig {
            width,
            height,
            frame_rate: self.timestamp_policy()?.output_frame_rate(),
            ticks_per_second: self.ticks_per_second,
            keyframe_min: 1,
            keyframe_max: DEFAULT_KEYFRAME_INTERVAL,
            closed_gop: true,
            repeat_headers: true,
            profile: self.profile,
        })
    }

    /// Checks the geometry, the timestamp policy and the container stream description, everything
    /// the pipeline would otherwise only reject once its output exists.
    pub fn validate(&self) -> Result<()> {
        validate_geometry(
            (self.source_width, self.source_height),
            &self.roi(),
            (self.output_width, self.output_height),
        )?;
        self.stream_config()?;
        Ok(())
    }

    /// The container stream description, without extradata.
    pub fn stream_config(&self) -> Result<StreamConfig> {
        let (width, height) = self.output_dimensions()?;
        let increment = self.timestamp_policy()?.increment();
        let frame_duration = u32::try_from(increment).map_err(|_| Error::config(format!("frame duration {} is too large", increment)))?;
        Ok(StreamConfig::default()
            .with_dimensions(width, height)
            .with_timescale(self.ticks_per_second)
            .with_frame_duration(frame_duration))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(RegionOfInterest::new(0, 0, 2880, 2880), config.roi());
        assert_eq!(960, config.timestamp_policy().unwrap().increment());

        let encoder = config.encoder_config().unwrap();
        assert_eq!((200, 200), (encoder.width, encoder.height));
        assert_eq!((50, 1), encoder.frame_rate);
        assert_eq!(1, encoder.keyframe_min);
        assert_eq!(120, encoder.keyframe_max);
        assert!(encoder.closed_gop);
        assert!(encoder.repeat_headers);

        let stream = config.stream_config().unwrap();
        assert_eq!(StreamConfig::default(), stream);
    }

    #[test]
    fn test_decimated_encoder_rate() {
        let config = PipelineConfig::default().with_rate_mode(RateMode::Decimated).with_eye(Eye::Right);
        assert_eq!(RegionOfInterest::new(2880, 0, 2880, 2880), config.roi());
        assert_eq!((25, 1), config.encoder_config().unwrap().frame_rate);
        assert_eq!(1920, config.stream_config().unwrap().frame_duration);
    }

    #[test]
    fn test_invalid_rate() {
        let config = PipelineConfig::default().with_frame_rate(7);
        assert!(matches!(config.encoder_config(), Err(Error::Config { .. })));
        assert!(matches!(config.stream_config(), Err(Error::Config { .. })));
    }

    #[test]
    fn test_validate() {
        assert!(PipelineConfig::default().validate().is_ok());
        assert!(PipelineConfig::default().with_source_size(640, 320).with_eye(Eye::Right).validate().is_ok());
        for config in [
            PipelineConfig::default().with_output_size(201, 200),
            PipelineConfig::default().with_output_size(0, 200),
            PipelineConfig::default().with_source_size(2, 2),
            PipelineConfig::default().with_frame_rate(7),
            PipelineConfig::default().with_ticks_per_second(0),
        ] {
            assert!(matches!(config.validate(), Err(Error::Config { .. })), "{:?}", config);
        }
    }

    #[test]
    fn test_profiles() {
        let fast = PipelineConfig::default().with_profile(EncoderProfile::Fast).encoder_config().unwrap();
        assert_eq!("ultrafast", fast.preset());
        assert_eq!(Some("zerolatency"), fast.tune());
        assert_eq!(None, fast.bitrate_kbps());
        assert_eq!(
            "keyint=120:min-keyint=1:open-gop=0:repeat-headers=1:annexb=1:bframes=0:ref=1:rc-lookahead=0",
            fast.x265_params()
        );

        let quality = PipelineConfig::default().encoder_config().unwrap();
        assert_eq!("medium", quality.preset());
        assert_eq!(None, quality.tune());
        assert_eq!(Some(3000), quality.bitrate_kbps());
        assert_eq!(3, quality.b_frames());
        assert_eq!(3, quality.references());
        let params = quality.x265_params();
        assert!(params.starts_with("keyint=120:min-keyint=1:open-gop=0:repeat-headers=1:annexb=1:bframes=3:ref=3:"));
        for param in ["rc-lookahead=20", "bitrate=3000", "qpmin=17", "qpmax=37", "psy-rd=1.0", "psy-rdoq=1.0", "wpp=1", "frame-threads=4"] {
            assert!(params.contains(param), "missing {}", param);
        }
    }
}
