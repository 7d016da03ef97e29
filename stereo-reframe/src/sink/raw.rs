use std::io::Write;

use av_traits::EncodedVideoFrame;

use super::{BootstrapMetadata, Result, Sink, SinkSummary, UnitWriter};
use crate::timestamp::Timestamp;

const START_CODE: [u8; 4] = [0, 0, 0, 1];

/// Writes an Annex B elementary stream. Timestamps and keyframe flags aren't represented.
pub struct RawSink<W> {
    writer: W,
}

impl<W: Write> RawSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

pub struct RawWriter<W: Write> {
    writer: W,
    units_written: u64,
    bytes_written: u64,
    closed: bool,
}

impl<W: Write> RawWriter<W> {
    fn write_nal_units(&mut self, nal_units: &[Vec<u8>]) -> Result<()> {
        for nalu in nal_units {
            self.writer.write_all(&START_CODE)?;
            self.writer.write_all(nalu)?;
            self.bytes_written += (START_CODE.len() + nalu.len()) as u64;
        }
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }
}

impl<W: Write> Sink for RawSink<W> {
    type Writer = RawWriter<W>;

    fn write_bootstrap(self, metadata: &BootstrapMetadata) -> Result<RawWriter<W>> {
        let mut writer = RawWriter {
            writer: self.writer,
            units_written: 0,
            bytes_written: 0,
            closed: false,
        };
        writer.write_nal_units(metadata.nal_units())?;
        Ok(writer)
    }
}

impl<W: Write> UnitWriter for RawWriter<W> {
    fn write_unit(&mut self, unit: &EncodedVideoFrame, _timestamp: Timestamp) -> Result<()> {
        self.write_nal_units(&unit.nal_units)?;
        self.units_written += 1;
        Ok(())
    }

    fn close(mut self) -> Result<SinkSummary> {
        self.closed = true;
        self.writer.flush()?;
        Ok(SinkSummary {
            units_written: self.units_written,
            bytes_written: self.bytes_written,
        })
    }
}

impl<W: Write> Drop for RawWriter<W> {
    fn drop(&mut self) {
        if !self.closed {
            tracing::warn!(units = self.units_written, "raw writer dropped without being closed");
        }
    }
}
