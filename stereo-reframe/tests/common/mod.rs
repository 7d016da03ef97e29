#![allow(dead_code)]

use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use av_traits::{EncodedFrameType, EncodedVideoFrame, VideoEncoder, VideoEncoderInput, VideoEncoderOutput};
use stereo_reframe::Timestamp;

pub const VPS: &[u8] = &[
    0x40, 0x01, 0x0c, 0x01, 0xff, 0xff, 0x01, 0x60, 0x00, 0x00, 0x03, 0x00, 0xb0, 0x00, 0x00, 0x03, 0x00, 0x00, 0x03, 0x00, 0x99, 0x17, 0x02, 0x40,
];
pub const SPS: &[u8] = &[
    0x42, 0x01, 0x01, 0x01, 0x60, 0x00, 0x00, 0x03, 0x00, 0xb0, 0x00, 0x00, 0x03, 0x00, 0x00, 0x03, 0x00, 0x99, 0xa0, 0x03, 0xc0, 0x80, 0x11, 0x07,
    0xcb, 0x88, 0x17, 0xb9, 0x16, 0x45, 0x2f, 0xfc, 0xb9, 0xfc, 0x4f, 0xe8, 0x80,
];
pub const PPS: &[u8] = &[0x44, 0x01, 0xc0, 0x72, 0xf0, 0x53, 0x24];

const IDR_W_RADL: u8 = 19;
const TRAIL_R: u8 = 1;

/// Everything the fake encoder was asked to do, shared with the test after the pipeline consumes
/// the encoder.
#[derive(Debug, Default)]
pub struct EncoderLog {
    pub submitted: Vec<(i64, EncodedFrameType)>,
    pub flush_calls: usize,
}

/// A deterministic stand-in for an HEVC encoder. Each frame becomes one slice NAL unit that
/// carries the frame's top-left luma sample, and output lags input by `delay` frames.
pub struct FakeHevcEncoder {
    delay: usize,
    keyframe_interval: usize,
    pending: VecDeque<EncodedVideoFrame>,
    last_context: Option<Timestamp>,
    log: Rc<RefCell<EncoderLog>>,
}

impl FakeHevcEncoder {
    pub fn new(delay: usize) -> (Self, Rc<RefCell<EncoderLog>>) {
        let log = Rc::new(RefCell::new(EncoderLog::default()));
        (
            Self {
                delay,
                keyframe_interval: 120,
                pending: VecDeque::new(),
                last_context: None,
                log: log.clone(),
            },
            log,
        )
    }

    pub fn with_keyframe_interval(self, keyframe_interval: usize) -> Self {
        Self { keyframe_interval, ..self }
    }

    fn slice(nal_unit_type: u8, sample: u8) -> Vec<u8> {
        // keep the payload free of start code prefixes
        vec![nal_unit_type << 1, 0x01, 0x80 | (sample >> 1), 0xaa]
    }
}

impl VideoEncoder for FakeHevcEncoder {
    type Context = Timestamp;
    type Error = String;

    fn headers(&mut self) -> Result<Vec<Vec<u8>>, String> {
        Ok(vec![VPS.to_vec(), SPS.to_vec(), PPS.to_vec()])
    }

    fn encode(&mut self, input: VideoEncoderInput<'_, Timestamp>) -> Result<Option<VideoEncoderOutput<Timestamp>>, String> {
        let index = {
            let mut log = self.log.borrow_mut();
            log.submitted.push((input.pts, input.frame_type));
            log.submitted.len() - 1
        };
        let is_keyframe = input.frame_type == EncodedFrameType::Key || index % self.keyframe_interval == 0;
        let sample = input.frame.samples(0).first().copied().unwrap_or_default();
        let nal_unit_type = if is_keyframe { IDR_W_RADL } else { TRAIL_R };
        self.pending.push_back(EncodedVideoFrame {
            nal_units: vec![Self::slice(nal_unit_type, sample)],
            is_keyframe,
        });
        self.last_context = Some(input.context);

        if self.pending.len() > self.delay {
            return Ok(self.pending.pop_front().map(|frame| VideoEncoderOutput {
                frame,
                context: input.context,
            }));
        }
        Ok(None)
    }

    fn flush(&mut self) -> Result<Option<VideoEncoderOutput<Timestamp>>, String> {
        self.log.borrow_mut().flush_calls += 1;
        let context = self.last_context.unwrap_or_default();
        Ok(self.pending.pop_front().map(|frame| VideoEncoderOutput { frame, context }))
    }
}
