use alloc::vec::Vec;

pub trait RawVideoFrame<S> {
    /// The samples that make up one plane of the frame's image. Typically this consists of 3
    /// Y/U/V planes of `u8`s, each row beginning `stride(plane)` samples after the previous one.
    fn samples(&self, plane: usize) -> &[S];

    /// The distance, in samples, between the starts of two consecutive rows of the given plane.
    fn stride(&self, plane: usize) -> usize;
}

/// Hints to the encoder about how a submitted frame should be coded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EncodedFrameType {
    /// Let the encoder decide.
    #[default]
    Auto,
    /// Code the frame as an independently decodable (IDR) picture.
    Key,
}

/// One compressed picture. NAL units are stored without start codes or length prefixes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncodedVideoFrame {
    pub nal_units: Vec<Vec<u8>>,
    pub is_keyframe: bool,
}

impl EncodedVideoFrame {
    /// The total payload size, excluding any framing.
    pub fn payload_len(&self) -> usize {
        self.nal_units.iter().map(|nalu| nalu.len()).sum()
    }
}

pub struct VideoEncoderInput<'a, C> {
    pub frame: &'a dyn RawVideoFrame<u8>,
    /// Presentation timestamp, in the encoder's configured time base.
    pub pts: i64,
    pub frame_type: EncodedFrameType,
    pub context: C,
}

pub struct VideoEncoderOutput<C> {
    pub frame: EncodedVideoFrame,
    /// The context of the most recently submitted input at the time this frame was emitted.
    pub context: C,
}

/// Implements basic video encoding behavior. Arbitrary context associated with each frame can be
/// passed through video encoders.
///
/// Typical usage should look like this:
///
/// ```
/// # use av_traits::{EncodedFrameType, RawVideoFrame, VideoEncoder, VideoEncoderInput};
/// fn encode<'a, S, E>(source: S, mut encoder: E) -> Result<(), E::Error>
///     where S: Iterator<Item = &'a dyn RawVideoFrame<u8>>,
///     E: VideoEncoder<Context = ()>
/// {
///     let _parameter_sets = encoder.headers()?;
///
///     for (i, frame) in source.enumerate() {
///         let frame_type = if i == 0 { EncodedFrameType::Key } else { EncodedFrameType::Auto };
///         if let Some(output) = encoder.encode(VideoEncoderInput { frame, pts: i as _, frame_type, context: () })? {
///             // do something with output.frame
///         }
///     }
///
///     while let Some(output) = encoder.flush()? {
///         // do something with output.frame
///     }
///
///     Ok(())
/// }
/// ```
pub trait VideoEncoder {
    type Context;
    type Error;

    /// Returns the stream's parameter sets (e.g. VPS, SPS and PPS). This may be called before any
    /// frame has been submitted.
    fn headers(&mut self) -> Result<Vec<Vec<u8>>, Self::Error>;

    /// Sends a frame to the encoder. This may block while the encoder performs encoding. The
    /// encoder copies what it needs from the frame before returning.
    ///
    /// `None` may be returned at the start of a session to allow for delayed encoder output (e.g.
    /// for B-frames or lookahead RC).
    ///
    /// Because output may be delayed, the returned frame is not necessarily the same as the input
    /// frame.
    fn encode(&mut self, input: VideoEncoderInput<'_, Self::Context>) -> Result<Option<VideoEncoderOutput<Self::Context>>, Self::Error>;

    /// Indicates to the encoder that no more input will be provided and it should emit any delayed
    /// frames. This should be invoked until no more frames are returned.
    fn flush(&mut self) -> Result<Option<VideoEncoderOutput<Self::Context>>, Self::Error>;
}
