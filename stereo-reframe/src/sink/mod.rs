//! Destinations for the encoded stream. A sink receives the stream's bootstrap metadata exactly
//! once, which turns it into a writer that accepts access units until it is closed.

use std::path::Path;

use av_traits::EncodedVideoFrame;
use snafu::Snafu;

use crate::timestamp::Timestamp;

mod container;
pub use container::*;

mod raw;
pub use raw::*;

#[derive(Debug, Snafu)]
pub enum SinkError {
    #[snafu(context(false), display("io error: {source}"))]
    Io { source: std::io::Error },
    #[snafu(context(false), display("muxer error: {source}"))]
    Muxer { source: mpeg4::Error },
    #[snafu(display("invalid bootstrap metadata: {message}"))]
    Bootstrap { message: String },
}

pub type Result<T> = core::result::Result<T, SinkError>;

/// The parameter set NAL units that a decoder needs before the first access unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootstrapMetadata {
    nal_units: Vec<Vec<u8>>,
}

impl BootstrapMetadata {
    pub fn new(nal_units: Vec<Vec<u8>>) -> Result<Self> {
        if nal_units.is_empty() {
            return Err(SinkError::Bootstrap {
                message: "no parameter sets".to_string(),
            });
        }
        if nal_units.iter().any(|nalu| nalu.is_empty()) {
            return Err(SinkError::Bootstrap {
                message: "empty nal unit".to_string(),
            });
        }
        Ok(Self { nal_units })
    }

    pub fn nal_units(&self) -> &[Vec<u8>] {
        &self.nal_units
    }

    /// Each unit preceded by its 4-byte big-endian length, as stored in container extradata.
    pub fn length_prefixed(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.nal_units.iter().map(|nalu| nalu.len() + 4).sum());
        for nalu in &self.nal_units {
            write_length_prefixed(&mut buf, nalu);
        }
        buf
    }
}

fn write_length_prefixed(buf: &mut Vec<u8>, nalu: &[u8]) {
    buf.extend_from_slice(&(nalu.len() as u32).to_be_bytes());
    buf.extend_from_slice(nalu);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SinkSummary {
    pub units_written: u64,
    pub bytes_written: u64,
}

pub trait Sink {
    type Writer: UnitWriter;

    /// Writes the stream header. Consuming the sink guarantees this happens once, before any
    /// access unit.
    fn write_bootstrap(self, metadata: &BootstrapMetadata) -> Result<Self::Writer>;
}

pub trait UnitWriter {
    fn write_unit(&mut self, unit: &EncodedVideoFrame, timestamp: Timestamp) -> Result<()>;

    /// Finalizes the output. Writers dropped without being closed log a warning.
    fn close(self) -> Result<SinkSummary>;
}

/// Describes the single video stream given to a muxer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamConfig {
    pub width: u32,
    pub height: u32,
    /// Ticks per second of packet timestamps.
    pub timescale: u32,
    pub frame_duration: u32,
    /// Length-prefixed parameter sets.
    pub extradata: Vec<u8>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            width: 200,
            height: 200,
            timescale: 48000,
            frame_duration: 960,
            extradata: Vec::new(),
        }
    }
}

impl StreamConfig {
    pub fn with_dimensions(self, width: u32, height: u32) -> Self {
        Self { width, height, ..self }
    }

    pub fn with_timescale(self, timescale: u32) -> Self {
        Self { timescale, ..self }
    }

    pub fn with_frame_duration(self, frame_duration: u32) -> Self {
        Self { frame_duration, ..self }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    /// Length-prefixed NAL units.
    pub data: Vec<u8>,
    pub pts: i64,
    pub dts: i64,
    pub is_keyframe: bool,
}

/// A container format writer for a single video stream.
pub trait Muxer {
    /// Writes the container header. Called once, before any packet.
    fn open(&mut self, config: StreamConfig) -> Result<()>;

    fn write_packet(&mut self, packet: Packet) -> Result<()>;

    /// Writes the trailer and returns the total number of bytes written.
    fn finish(&mut self) -> Result<u64>;
}

/// Returns true if the path names a file that should be written as a container.
pub fn is_container_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("mp4"))
}

/// Either of the two output formats, chosen at runtime.
pub enum OutputSink<W, M> {
    Raw(RawSink<W>),
    Container(ContainerSink<M>),
}

pub enum OutputWriter<W: std::io::Write, M: Muxer> {
    Raw(RawWriter<W>),
    Container(ContainerWriter<M>),
}

impl<W: std::io::Write, M: Muxer> Sink for OutputSink<W, M> {
    type Writer = OutputWriter<W, M>;

    fn write_bootstrap(self, metadata: &BootstrapMetadata) -> Result<Self::Writer> {
        Ok(match self {
            Self::Raw(sink) => OutputWriter::Raw(sink.write_bootstrap(metadata)?),
            Self::Container(sink) => OutputWriter::Container(sink.write_bootstrap(metadata)?),
        })
    }
}

impl<W: std::io::Write, M: Muxer> UnitWriter for OutputWriter<W, M> {
    fn write_unit(&mut self, unit: &EncodedVideoFrame, timestamp: Timestamp) -> Result<()> {
        match self {
            Self::Raw(writer) => writer.write_unit(unit, timestamp),
            Self::Container(writer) => writer.write_unit(unit, timestamp),
        }
    }

    fn close(self) -> Result<SinkSummary> {
        match self {
            Self::Raw(writer) => writer.close(),
            Self::Container(writer) => writer.close(),
        }
    }
}
