use std::fmt;

use av_traits::{EncodedFrameType, VideoEncoder, VideoEncoderInput};
use tracing::{debug, info, warn};

use crate::{
    config::PipelineConfig,
    error::{Error, Result},
    planar::PlanarImage,
    resample::Resampler,
    sink::{BootstrapMetadata, Sink, UnitWriter},
    source::FrameSource,
    timestamp::{Decimator, Timestamp, TimestampPolicy},
};

const PROGRESS_INTERVAL: u64 = 10;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Frames delivered by the source with the expected dimensions.
    pub input_frames: u64,
    /// Input frames discarded by decimation.
    pub dropped_frames: u64,
    /// Frames that failed to decode or had the wrong dimensions.
    pub skipped_frames: u64,
    /// Frames submitted to the encoder.
    pub encoded_frames: u64,
    /// Access units returned while frames were being submitted.
    pub emitted_units: u64,
    /// Access units returned while draining the encoder.
    pub flushed_units: u64,
    pub bytes_written: u64,
}

impl PipelineStats {
    pub fn units_written(&self) -> u64 {
        self.emitted_units + self.flushed_units
    }
}

fn encode_error<E: fmt::Display>(e: E) -> Error {
    Error::Encode { message: e.to_string() }
}

struct Stages<S, E> {
    source: S,
    encoder: E,
    resampler: Resampler,
    policy: TimestampPolicy,
    decimator: Decimator,
    output: PlanarImage<Vec<u8>>,
    source_size: (usize, usize),
    last_timestamp: Option<Timestamp>,
    stats: PipelineStats,
}

/// Drives frames from a source through the resampler and encoder into a sink.
pub struct Pipeline<S, E, K> {
    stages: Stages<S, E>,
    sink: K,
}

impl<S, E, K> Pipeline<S, E, K>
where
    S: FrameSource,
    E: VideoEncoder<Context = Timestamp>,
    E::Error: fmt::Display,
    K: Sink,
{
    /// Validates the configuration against the source and prepares the resampler. Nothing is read,
    /// encoded, or written until `run` is called.
    pub fn new(config: PipelineConfig, source: S, encoder: E, sink: K) -> Result<Self> {
        let info = source.stream_info();
        let source_size = (config.source_width, config.source_height);
        if (info.width, info.height) != source_size {
            return Err(Error::config(format!(
                "input is {}x{} but {}x{} was configured",
                info.width, info.height, config.source_width, config.source_height
            )));
        }
        let policy = config.timestamp_policy()?;
        let output_size = (config.output_width, config.output_height);
        let resampler = Resampler::new(config.interpolation, source_size, config.roi(), output_size)?;

        Ok(Self {
            stages: Stages {
                source,
                encoder,
                resampler,
                policy,
                decimator: Decimator::new(config.rate_mode),
                output: PlanarImage::new(output_size.0, output_size.1),
                source_size,
                last_timestamp: None,
                stats: PipelineStats::default(),
            },
            sink,
        })
    }

    /// Processes the whole input. If encoding or writing fails after the stream header has been
    /// written, the writer is still closed before the error is returned.
    pub fn run(self) -> Result<PipelineStats> {
        let Self { mut stages, sink } = self;

        let headers = stages.encoder.headers().map_err(encode_error)?;
        let metadata = BootstrapMetadata::new(headers)?;
        let mut writer = sink.write_bootstrap(&metadata)?;
        info!(
            increment = stages.policy.increment(),
            mode = ?stages.policy.mode(),
            "using timestamp increment of {} units per frame",
            stages.policy.increment()
        );

        if let Err(e) = stages.process(&mut writer) {
            if let Err(close_error) = writer.close() {
                warn!(error = %close_error, "unable to close output after failure");
            }
            return Err(e);
        }

        let summary = writer.close()?;
        let mut stats = stages.stats;
        stats.bytes_written = summary.bytes_written;
        info!(
            input_frames = stats.input_frames,
            dropped_frames = stats.dropped_frames,
            skipped_frames = stats.skipped_frames,
            units = stats.units_written(),
            bytes = stats.bytes_written,
            "processed {} frames out of {} input frames",
            stats.encoded_frames,
            stats.input_frames
        );
        Ok(stats)
    }
}

impl<S, E> Stages<S, E>
where
    S: FrameSource,
    E: VideoEncoder<Context = Timestamp>,
    E::Error: fmt::Display,
{
    fn process<W: UnitWriter>(&mut self, writer: &mut W) -> Result<()> {
        loop {
            let frame = match self.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) if e.is_transient() => {
                    warn!(error = %e, "skipping input frame");
                    self.stats.skipped_frames += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if (frame.image.width(), frame.image.height()) != self.source_size {
                warn!(
                    width = frame.image.width(),
                    height = frame.image.height(),
                    "skipping input frame with unexpected dimensions"
                );
                self.stats.skipped_frames += 1;
                continue;
            }

            let input_index = self.decimator.input_count();
            self.stats.input_frames += 1;
            if !self.decimator.keep() {
                debug!(input_index, pts = ?frame.pts, "skipping input frame {}", input_index);
                self.stats.dropped_frames += 1;
                continue;
            }

            self.resampler.resample(&frame.image, &mut self.output)?;

            let output_index = self.stats.encoded_frames;
            let timestamp = self.policy.next_timestamp(output_index);
            let frame_type = match output_index {
                0 => EncodedFrameType::Key,
                _ => EncodedFrameType::Auto,
            };
            debug!(input_index, pts = ?frame.pts, %timestamp, "encoding frame");

            let output = self
                .encoder
                .encode(VideoEncoderInput {
                    frame: &self.output,
                    pts: timestamp.0,
                    frame_type,
                    context: timestamp,
                })
                .map_err(encode_error)?;
            self.stats.encoded_frames += 1;

            if let Some(output) = output {
                writer.write_unit(&output.frame, output.context)?;
                self.last_timestamp = Some(output.context);
                self.stats.emitted_units += 1;
            }

            if self.stats.encoded_frames % PROGRESS_INTERVAL == 0 {
                info!("processed {} frames", self.stats.encoded_frames);
            }
        }

        while let Some(output) = self.encoder.flush().map_err(encode_error)? {
            let timestamp = match self.last_timestamp {
                Some(last) => self.policy.after(last),
                None => self.policy.next_timestamp(0),
            };
            debug!(%timestamp, "writing flushed unit");
            writer.write_unit(&output.frame, timestamp)?;
            self.last_timestamp = Some(timestamp);
            self.stats.flushed_units += 1;
        }
        Ok(())
    }
}
