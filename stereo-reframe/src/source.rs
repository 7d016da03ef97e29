use snafu::Snafu;

use crate::planar::{LayoutError, PlanarImage, PLANE_COUNT};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SourceError {
    #[snafu(display("unable to open input: {message}"))]
    Open { message: String },
    #[snafu(display("unable to read input: {message}"))]
    Read { message: String },
    #[snafu(display("unable to decode frame: {message}"))]
    Decode { message: String },
    #[snafu(context(false), display("decoded frame has an unexpected layout: {source}"))]
    Layout { source: LayoutError },
}

impl SourceError {
    /// Transient errors affect a single frame. The source can keep producing frames after one.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::Layout { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamInfo {
    pub width: usize,
    pub height: usize,
    /// The nominal frame rate, if the input declares one.
    pub frame_rate: Option<(u32, u32)>,
}

/// One decoded frame, borrowed from the source until the next call.
pub struct SourceFrame<'a> {
    pub image: PlanarImage<&'a [u8]>,
    /// The input's own timestamp. Output timing never depends on it.
    pub pts: Option<i64>,
}

pub trait FrameSource {
    fn stream_info(&self) -> StreamInfo;

    /// Returns the next frame in decode order, or `None` once the input is exhausted.
    fn next_frame(&mut self) -> Result<Option<SourceFrame<'_>>, SourceError>;
}

/// Produces side-by-side frames where each eye has its own constant chroma and a luma gradient.
/// Frames listed as corrupt yield a decode error in place of the frame.
pub struct SyntheticSource {
    image: PlanarImage<Vec<u8>>,
    frame_rate: (u32, u32),
    frame_count: u64,
    produced: u64,
    corrupt_frames: Vec<u64>,
}

impl SyntheticSource {
    pub fn new(width: usize, height: usize, frame_count: u64) -> Self {
        let mut image = PlanarImage::new(width, height);
        for plane in 0..PLANE_COUNT {
            let target = image.plane_mut(plane);
            let half = target.width() / 2;
            for y in 0..target.height() {
                let row = target.row_mut(y);
                for (x, sample) in row.iter_mut().enumerate() {
                    *sample = match (plane, x < half) {
                        (0, _) => ((x % half.max(1)) * 255 / half.max(1)) as u8,
                        (_, true) => 96,
                        (_, false) => 160,
                    };
                }
            }
        }
        Self {
            image,
            frame_rate: (50, 1),
            frame_count,
            produced: 0,
            corrupt_frames: Vec::new(),
        }
    }

    pub fn with_frame_rate(self, num: u32, den: u32) -> Self {
        Self {
            frame_rate: (num, den),
            ..self
        }
    }

    pub fn with_corrupt_frames(self, corrupt_frames: Vec<u64>) -> Self {
        Self { corrupt_frames, ..self }
    }
}

impl FrameSource for SyntheticSource {
    fn stream_info(&self) -> StreamInfo {
        StreamInfo {
            width: self.image.width(),
            height: self.image.height(),
            frame_rate: Some(self.frame_rate),
        }
    }

    fn next_frame(&mut self) -> Result<Option<SourceFrame<'_>>, SourceError> {
        if self.produced >= self.frame_count {
            return Ok(None);
        }
        let index = self.produced;
        self.produced += 1;
        if self.corrupt_frames.contains(&index) {
            return DecodeSnafu {
                message: format!("synthetic corruption at frame {}", index),
            }
            .fail();
        }

        // stamp the frame index into the top-left luma sample so frames differ
        if self.image.height() > 0 && self.image.width() > 0 {
            self.image.plane_mut(0).row_mut(0)[0] = index as u8;
        }
        Ok(Some(SourceFrame {
            image: self.image.as_borrowed(),
            pts: Some(index as i64),
        }))
    }
}
