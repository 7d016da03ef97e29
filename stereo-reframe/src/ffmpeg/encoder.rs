use std::collections::VecDeque;

use av_traits::{EncodedFrameType, EncodedVideoFrame, RawVideoFrame, VideoEncoder, VideoEncoderInput, VideoEncoderOutput};
use ffmpeg_next as ffmpeg;
use ffmpeg::{format::Pixel, util::error::EAGAIN, Dictionary, Rational};
use snafu::Snafu;

use crate::{config::EncoderConfig, planar::plane_dimensions};

const ENCODER_NAME: &str = "libx265";

#[derive(Debug, Snafu)]
pub enum FfmpegError {
    #[snafu(display("{ENCODER_NAME} encoder not available"))]
    EncoderNotFound,
    #[snafu(context(false), display("ffmpeg error: {source}"))]
    Ffmpeg { source: ffmpeg::Error },
    #[snafu(display("invalid encoder parameter: {message}"))]
    InvalidParameter { message: String },
    #[snafu(display("encoder produced no parameter sets"))]
    MissingHeaders,
    #[snafu(display("input plane {plane} is smaller than the configured frame"))]
    ShortPlane { plane: usize },
}

type Result<T> = core::result::Result<T, FfmpegError>;

fn as_i32(value: u32, what: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| FfmpegError::InvalidParameter {
        message: format!("{} {} is out of range", what, value),
    })
}

/// Encoded units that haven't been handed out yet. Each one leaves paired with the context of the
/// most recent submission at the time it leaves.
struct OutputQueue<C> {
    pending: VecDeque<EncodedVideoFrame>,
    last_context: Option<C>,
}

impl<C: Clone> OutputQueue<C> {
    fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            last_context: None,
        }
    }

    fn push(&mut self, frame: EncodedVideoFrame) {
        self.pending.push_back(frame);
    }

    fn set_context(&mut self, context: C) {
        self.last_context = Some(context);
    }

    fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn pop(&mut self) -> Option<VideoEncoderOutput<C>> {
        let context = self.last_context.clone()?;
        let frame = self.pending.pop_front()?;
        Some(VideoEncoderOutput { frame, context })
    }
}

/// Encodes 8-bit 4:2:0 frames to HEVC with libx265. Parameter sets are available before the
/// first frame and are also repeated in-band at every keyframe.
pub struct FfmpegHevcEncoder<C> {
    encoder: ffmpeg::encoder::Video,
    width: u32,
    height: u32,
    headers: Vec<Vec<u8>>,
    output: OutputQueue<C>,
    flushing: bool,
}

impl<C: Clone> FfmpegHevcEncoder<C> {
    pub fn new(config: &EncoderConfig) -> Result<Self> {
        super::init()?;
        let codec = ffmpeg::encoder::find_by_name(ENCODER_NAME).ok_or(FfmpegError::EncoderNotFound)?;
        let mut encoder = ffmpeg::codec::context::Context::new_with_codec(codec).encoder().video()?;

        let (rate_num, rate_den) = config.frame_rate;
        encoder.set_width(config.width);
        encoder.set_height(config.height);
        encoder.set_format(Pixel::YUV420P);
        encoder.set_frame_rate(Some(Rational::new(as_i32(rate_num, "frame rate")?, as_i32(rate_den, "frame rate")?)));
        encoder.set_time_base(Rational::new(1, as_i32(config.ticks_per_second, "timescale")?));
        encoder.set_gop(config.keyframe_max);
        encoder.set_max_b_frames(config.b_frames() as usize);
        encoder.set_flags(ffmpeg::codec::Flags::GLOBAL_HEADER);

        let mut options = Dictionary::new();
        options.set("preset", config.preset());
        if let Some(tune) = config.tune() {
            options.set("tune", tune);
        }
        options.set("forced-idr", "1");
        options.set("x265-params", &config.x265_params());
        tracing::debug!(preset = config.preset(), params = %config.x265_params(), "opening {}", ENCODER_NAME);

        let encoder = encoder.open_with(options).map_err(|e| FfmpegError::InvalidParameter {
            message: format!("{} rejected the configuration: {}", ENCODER_NAME, e),
        })?;

        // with global headers requested, libx265 exports its parameter sets as Annex B extradata
        let extradata = unsafe {
            let context = encoder.as_ptr();
            match (*context).extradata.is_null() || (*context).extradata_size <= 0 {
                true => Vec::new(),
                false => std::slice::from_raw_parts((*context).extradata, (*context).extradata_size as usize).to_vec(),
            }
        };
        let headers: Vec<Vec<u8>> = h265::iterate_annex_b(&extradata).map(|nalu| nalu.to_vec()).collect();
        if headers.is_empty() {
            return Err(FfmpegError::MissingHeaders);
        }

        Ok(Self {
            encoder,
            width: config.width,
            height: config.height,
            headers,
            output: OutputQueue::new(),
            flushing: false,
        })
    }

    fn receive_packets(&mut self) -> Result<()> {
        loop {
            let mut packet = ffmpeg::Packet::empty();
            match self.encoder.receive_packet(&mut packet) {
                Ok(()) => {
                    let data = packet.data().unwrap_or_default();
                    self.output.push(EncodedVideoFrame {
                        nal_units: h265::iterate_annex_b(data).map(|nalu| nalu.to_vec()).collect(),
                        is_keyframe: packet.is_key(),
                    });
                }
                Err(ffmpeg::Error::Other { errno }) if errno == EAGAIN => return Ok(()),
                Err(ffmpeg::Error::Eof) => return Ok(()),
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn copy_frame(&self, input: &dyn RawVideoFrame<u8>) -> Result<ffmpeg::frame::Video> {
        let mut frame = ffmpeg::frame::Video::new(Pixel::YUV420P, self.width, self.height);
        for plane in 0..3 {
            let (width, height) = plane_dimensions(plane, self.width as usize, self.height as usize);
            let (src, src_stride) = (input.samples(plane), input.stride(plane));
            let dst_stride = frame.stride(plane);
            let rows = frame.data_mut(plane).chunks_mut(dst_stride).zip(src.chunks(src_stride)).take(height);
            let mut copied = 0;
            for (dst_row, src_row) in rows {
                if src_row.len() < width {
                    return Err(FfmpegError::ShortPlane { plane });
                }
                dst_row[..width].copy_from_slice(&src_row[..width]);
                copied += 1;
            }
            if copied < height {
                return Err(FfmpegError::ShortPlane { plane });
            }
        }
        Ok(frame)
    }
}

impl<C: Clone> VideoEncoder for FfmpegHevcEncoder<C> {
    type Context = C;
    type Error = FfmpegError;

    fn headers(&mut self) -> Result<Vec<Vec<u8>>> {
        Ok(self.headers.clone())
    }

    /// Submits one frame and returns at most one encoded unit. libx265 can emit several packets
    /// in response to a single frame; only the oldest is returned and the rest stay queued for
    /// later `encode` or `flush` calls, so output keeps decode order but may lag input by more
    /// than the encoder's own delay. A queued unit carries the context of the call that returns
    /// it, not of the frame that produced it.
    fn encode(&mut self, input: VideoEncoderInput<'_, C>) -> Result<Option<VideoEncoderOutput<C>>> {
        let mut frame = self.copy_frame(input.frame)?;
        frame.set_pts(Some(input.pts));
        frame.set_kind(match input.frame_type {
            EncodedFrameType::Key => ffmpeg::picture::Type::I,
            EncodedFrameType::Auto => ffmpeg::picture::Type::None,
        });
        self.encoder.send_frame(&frame)?;
        self.output.set_context(input.context);
        self.receive_packets()?;
        Ok(self.output.pop())
    }

    fn flush(&mut self) -> Result<Option<VideoEncoderOutput<C>>> {
        if !self.flushing {
            self.encoder.send_eof()?;
            self.flushing = true;
        }
        if self.output.is_empty() {
            self.receive_packets()?;
        }
        Ok(self.output.pop())
    }
}
