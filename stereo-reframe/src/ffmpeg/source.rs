use std::path::Path;

use ffmpeg_next as ffmpeg;
use ffmpeg::{format::Pixel, software::scaling, util::error::EAGAIN};

use crate::{
    planar::PlanarImage,
    source::{FrameSource, SourceError, SourceFrame, StreamInfo},
};

/// Decodes the best video stream of any input libav can demux. Frames that aren't 8-bit 4:2:0
/// are converted at their decoded size.
pub struct FfmpegSource {
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::decoder::Video,
    scaler: Option<(Pixel, u32, u32, scaling::Context)>,
    decoded: ffmpeg::frame::Video,
    converted: ffmpeg::frame::Video,
    info: StreamInfo,
    eof_sent: bool,
}

fn open_error(e: impl ToString) -> SourceError {
    SourceError::Open { message: e.to_string() }
}

impl FfmpegSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        super::init().map_err(open_error)?;
        let input = ffmpeg::format::input(path).map_err(|e| SourceError::Open {
            message: format!("{}: {}", path.display(), e),
        })?;

        let (stream_index, parameters, frame_rate) = {
            let stream = input.streams().best(ffmpeg::media::Type::Video).ok_or_else(|| SourceError::Open {
                message: format!("{} has no video stream", path.display()),
            })?;
            let rate = stream.avg_frame_rate();
            let frame_rate = match (u32::try_from(rate.numerator()), u32::try_from(rate.denominator())) {
                (Ok(num), Ok(den)) if num > 0 && den > 0 => Some((num, den)),
                _ => None,
            };
            (stream.index(), stream.parameters(), frame_rate)
        };

        let decoder = ffmpeg::codec::context::Context::from_parameters(parameters)
            .and_then(|context| context.decoder().video())
            .map_err(open_error)?;

        let info = StreamInfo {
            width: decoder.width() as usize,
            height: decoder.height() as usize,
            frame_rate,
        };
        tracing::info!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            format = ?decoder.format(),
            "opened input"
        );

        Ok(Self {
            input,
            stream_index,
            decoder,
            scaler: None,
            decoded: ffmpeg::frame::Video::empty(),
            converted: ffmpeg::frame::Video::empty(),
            info,
            eof_sent: false,
        })
    }

    /// Fills `self.decoded` with the next frame. Returns false at the end of the stream.
    fn decode_next(&mut self) -> Result<bool, SourceError> {
        loop {
            match self.decoder.receive_frame(&mut self.decoded) {
                Ok(()) => return Ok(true),
                Err(ffmpeg::Error::Eof) => return Ok(false),
                Err(ffmpeg::Error::Other { errno }) if errno == EAGAIN => {}
                Err(e) => {
                    return Err(SourceError::Decode { message: e.to_string() });
                }
            }

            if self.eof_sent {
                return Ok(false);
            }

            let mut packet = ffmpeg::Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() != self.stream_index {
                        continue;
                    }
                    // a corrupt packet only costs its own frame
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        return Err(SourceError::Decode { message: e.to_string() });
                    }
                }
                Err(ffmpeg::Error::Eof) => {
                    self.decoder.send_eof().map_err(|e| SourceError::Read { message: e.to_string() })?;
                    self.eof_sent = true;
                }
                Err(e) => return Err(SourceError::Read { message: e.to_string() }),
            }
        }
    }

    fn convert(&mut self) -> Result<(), SourceError> {
        let (format, width, height) = (self.decoded.format(), self.decoded.width(), self.decoded.height());
        let reuse = matches!(&self.scaler, Some((f, w, h, _)) if (*f, *w, *h) == (format, width, height));
        if !reuse {
            let context = scaling::Context::get(format, width, height, Pixel::YUV420P, width, height, scaling::Flags::BILINEAR)
                .map_err(|e| SourceError::Decode { message: e.to_string() })?;
            tracing::debug!(?format, width, height, "converting input frames to yuv420p");
            self.scaler = Some((format, width, height, context));
        }
        if let Some((_, _, _, context)) = &mut self.scaler {
            context
                .run(&self.decoded, &mut self.converted)
                .map_err(|e| SourceError::Decode { message: e.to_string() })?;
        }
        Ok(())
    }
}

fn to_planar(frame: &ffmpeg::frame::Video) -> Result<PlanarImage<&[u8]>, SourceError> {
    Ok(PlanarImage::from_planes(
        frame.width() as usize,
        frame.height() as usize,
        [(frame.data(0), frame.stride(0)), (frame.data(1), frame.stride(1)), (frame.data(2), frame.stride(2))],
    )?)
}

impl FrameSource for FfmpegSource {
    fn stream_info(&self) -> StreamInfo {
        self.info
    }

    fn next_frame(&mut self) -> Result<Option<SourceFrame<'_>>, SourceError> {
        if !self.decode_next()? {
            return Ok(None);
        }
        let pts = self.decoded.timestamp().or_else(|| self.decoded.pts());
        let frame = match self.decoded.format() {
            Pixel::YUV420P | Pixel::YUVJ420P => &self.decoded,
            _ => {
                self.convert()?;
                &self.converted
            }
        };
        Ok(Some(SourceFrame {
            image: to_planar(frame)?,
            pts,
        }))
    }
}
