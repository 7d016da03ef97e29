use std::io::Write;

use av_traits::EncodedVideoFrame;
use mpeg4::{FragmentedMp4Writer, HVCDecoderConfigurationRecord, Sample, TrackConfig};

use super::{write_length_prefixed, BootstrapMetadata, Muxer, Packet, Result, Sink, SinkError, SinkSummary, StreamConfig, UnitWriter};
use crate::timestamp::Timestamp;

/// Wraps the stream in a container. Parameter sets become the stream's extradata and every
/// access unit becomes one timestamped packet.
pub struct ContainerSink<M> {
    muxer: M,
    config: StreamConfig,
}

impl<M: Muxer> ContainerSink<M> {
    /// The config's extradata is replaced by the bootstrap metadata.
    pub fn new(muxer: M, config: StreamConfig) -> Self {
        Self { muxer, config }
    }
}

pub struct ContainerWriter<M: Muxer> {
    muxer: M,
    units_written: u64,
    closed: bool,
}

impl<M: Muxer> ContainerWriter<M> {
    pub fn muxer(&self) -> &M {
        &self.muxer
    }
}

impl<M: Muxer> Sink for ContainerSink<M> {
    type Writer = ContainerWriter<M>;

    fn write_bootstrap(mut self, metadata: &BootstrapMetadata) -> Result<ContainerWriter<M>> {
        self.config.extradata = metadata.length_prefixed();
        self.muxer.open(self.config)?;
        Ok(ContainerWriter {
            muxer: self.muxer,
            units_written: 0,
            closed: false,
        })
    }
}

impl<M: Muxer> UnitWriter for ContainerWriter<M> {
    fn write_unit(&mut self, unit: &EncodedVideoFrame, timestamp: Timestamp) -> Result<()> {
        let mut data = Vec::with_capacity(unit.payload_len() + 4 * unit.nal_units.len());
        let mut is_keyframe = false;
        for nalu in &unit.nal_units {
            is_keyframe |= h265::nal_unit_type(nalu).map_or(false, h265::is_irap);
            write_length_prefixed(&mut data, nalu);
        }
        self.muxer.write_packet(Packet {
            data,
            pts: timestamp.0,
            dts: timestamp.0,
            is_keyframe,
        })?;
        self.units_written += 1;
        Ok(())
    }

    fn close(mut self) -> Result<SinkSummary> {
        self.closed = true;
        let bytes_written = self.muxer.finish()?;
        Ok(SinkSummary {
            units_written: self.units_written,
            bytes_written,
        })
    }
}

impl<M: Muxer> Drop for ContainerWriter<M> {
    fn drop(&mut self) {
        if !self.closed {
            tracing::warn!(units = self.units_written, "container writer dropped without being closed, output will lack its trailer");
        }
    }
}

fn dimension(value: u32, name: &str) -> Result<u16> {
    u16::try_from(value).map_err(|_| SinkError::Bootstrap {
        message: format!("{} {} is too large for the container", name, value),
    })
}

impl<W: Write> Muxer for FragmentedMp4Writer<W> {
    fn open(&mut self, config: StreamConfig) -> Result<()> {
        let parameter_sets = h265::iterate_hvcc(&config.extradata, 4).map(|nalu| nalu.to_vec()).collect();
        let decoder_configuration = HVCDecoderConfigurationRecord::from_parameter_sets(parameter_sets)?;
        self.write_init_segment(TrackConfig {
            width: dimension(config.width, "width")?,
            height: dimension(config.height, "height")?,
            timescale: config.timescale,
            default_sample_duration: config.frame_duration,
            decoder_configuration,
        })?;
        Ok(())
    }

    fn write_packet(&mut self, packet: Packet) -> Result<()> {
        self.write_sample(Sample {
            data: packet.data,
            dts: packet.dts,
            pts: packet.pts,
            is_sync: packet.is_keyframe,
        })?;
        Ok(())
    }

    fn finish(&mut self) -> Result<u64> {
        Ok(FragmentedMp4Writer::finish(self)?)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const VPS: &[u8] = &[
        0x40, 0x01, 0x0c, 0x01, 0xff, 0xff, 0x01, 0x60, 0x00, 0x00, 0x03, 0x00, 0xb0, 0x00, 0x00, 0x03, 0x00, 0x00, 0x03, 0x00, 0x99, 0x17, 0x02, 0x40,
    ];
    const SPS: &[u8] = &[
        0x42, 0x01, 0x01, 0x01, 0x60, 0x00, 0x00, 0x03, 0x00, 0xb0, 0x00, 0x00, 0x03, 0x00, 0x00, 0x03, 0x00, 0x99, 0xa0, 0x03, 0xc0, 0x80, 0x11, 0x07,
        0xcb, 0x88, 0x17, 0xb9, 0x16, 0x45, 0x2f, 0xfc, 0xb9, 0xfc, 0x4f, 0xe8, 0x80,
    ];
    const PPS: &[u8] = &[0x44, 0x01, 0xc0, 0x72, 0xf0, 0x53, 0x24];

    #[derive(Debug, PartialEq)]
    enum Call {
        Open(StreamConfig),
        Packet(Packet),
        Finish,
    }

    #[derive(Default)]
    struct RecordingMuxer {
        calls: Vec<Call>,
    }

    impl Muxer for RecordingMuxer {
        fn open(&mut self, config: StreamConfig) -> Result<()> {
            self.calls.push(Call::Open(config));
            Ok(())
        }

        fn write_packet(&mut self, packet: Packet) -> Result<()> {
            self.calls.push(Call::Packet(packet));
            Ok(())
        }

        fn finish(&mut self) -> Result<u64> {
            self.calls.push(Call::Finish);
            Ok(1234)
        }
    }

    fn bootstrap() -> BootstrapMetadata {
        BootstrapMetadata::new(vec![VPS.to_vec(), SPS.to_vec(), PPS.to_vec()]).unwrap()
    }

    fn unit(nal_units: &[&[u8]]) -> EncodedVideoFrame {
        EncodedVideoFrame {
            nal_units: nal_units.iter().map(|nalu| nalu.to_vec()).collect(),
            is_keyframe: false,
        }
    }

    #[test]
    fn test_container_sink_call_order() {
        let config = StreamConfig::default().with_timescale(48000).with_frame_duration(1920);
        let mut writer = ContainerSink::new(RecordingMuxer::default(), config.clone()).write_bootstrap(&bootstrap()).unwrap();
        writer.write_unit(&unit(&[&[0x26, 0x01, 0xaa], &[0x4e, 0x01, 0x05]]), Timestamp(0)).unwrap();
        writer.write_unit(&unit(&[&[0x02, 0x01, 0xbb]]), Timestamp(1920)).unwrap();
        // CRA
        writer.write_unit(&unit(&[&[0x2a, 0x01, 0xcc]]), Timestamp(3840)).unwrap();

        assert_eq!(4, writer.muxer().calls.len());
        match &writer.muxer().calls[0] {
            Call::Open(open) => {
                assert_eq!(bootstrap().length_prefixed(), open.extradata);
                assert_eq!(1920, open.frame_duration);
            }
            call => panic!("unexpected first call: {:?}", call),
        }
        assert_eq!(
            Call::Packet(Packet {
                data: vec![0, 0, 0, 3, 0x26, 0x01, 0xaa, 0, 0, 0, 3, 0x4e, 0x01, 0x05],
                pts: 0,
                dts: 0,
                is_keyframe: true,
            }),
            writer.muxer().calls[1]
        );
        assert_eq!(
            Call::Packet(Packet {
                data: vec![0, 0, 0, 3, 0x02, 0x01, 0xbb],
                pts: 1920,
                dts: 1920,
                is_keyframe: false,
            }),
            writer.muxer().calls[2]
        );
        assert!(matches!(&writer.muxer().calls[3], Call::Packet(Packet { is_keyframe: true, pts: 3840, .. })));
        assert_eq!(1, writer.muxer().calls.iter().filter(|call| matches!(call, Call::Open(_))).count());

        let summary = writer.close().unwrap();
        assert_eq!(3, summary.units_written);
        assert_eq!(1234, summary.bytes_written);
    }

    #[test]
    fn test_fragmented_mp4_muxer() {
        let config = StreamConfig::default().with_dimensions(200, 200);
        let mut writer = ContainerSink::new(FragmentedMp4Writer::new(Vec::new()), config)
            .write_bootstrap(&bootstrap())
            .unwrap();
        let init_size = writer.muxer().bytes_written();
        assert!(init_size > 0);
        assert_eq!(init_size, writer.muxer().get_ref().len() as u64);

        writer.write_unit(&unit(&[&[0x26, 0x01, 0xaa]]), Timestamp(0)).unwrap();
        writer.write_unit(&unit(&[&[0x02, 0x01, 0xbb]]), Timestamp(960)).unwrap();
        let summary = writer.close().unwrap();
        assert_eq!(2, summary.units_written);
        assert!(summary.bytes_written > init_size);
    }

    #[test]
    fn test_fragmented_mp4_muxer_rejects_bad_extradata() {
        let mut muxer = FragmentedMp4Writer::new(Vec::new());
        let config = StreamConfig {
            extradata: BootstrapMetadata::new(vec![VPS.to_vec(), PPS.to_vec()]).unwrap().length_prefixed(),
            ..StreamConfig::default()
        };
        assert!(matches!(muxer.open(config), Err(SinkError::Muxer { .. })));

        let config = StreamConfig {
            extradata: bootstrap().length_prefixed(),
            ..StreamConfig::default().with_dimensions(70000, 200)
        };
        assert!(matches!(muxer.open(config), Err(SinkError::Bootstrap { .. })));
    }

    #[test]
    fn test_timestamps_must_increase() {
        let mut writer = ContainerSink::new(FragmentedMp4Writer::new(Vec::new()), StreamConfig::default())
            .write_bootstrap(&bootstrap())
            .unwrap();
        writer.write_unit(&unit(&[&[0x26, 0x01, 0xaa]]), Timestamp(960)).unwrap();
        assert!(matches!(
            writer.write_unit(&unit(&[&[0x02, 0x01, 0xbb]]), Timestamp(960)),
            Err(SinkError::Muxer { .. })
        ));
        writer.close().unwrap();
    }
}
