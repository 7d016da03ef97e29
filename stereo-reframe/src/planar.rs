use av_traits::RawVideoFrame;
use snafu::Snafu;

use crate::roi::RegionOfInterest;

/// The number of planes in a 4:2:0 image: Y, Cb, and Cr.
pub const PLANE_COUNT: usize = 3;

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum LayoutError {
    #[snafu(display("plane {plane} stride {stride} is less than its width {width}"))]
    StrideTooSmall { plane: usize, stride: usize, width: usize },
    #[snafu(display("plane {plane} holds {len} bytes but {required} are required"))]
    BufferTooSmall { plane: usize, len: usize, required: usize },
    #[snafu(display("plane {plane} is {width}x{height} but {expected_width}x{expected_height} was expected"))]
    PlaneSizeMismatch {
        plane: usize,
        width: usize,
        height: usize,
        expected_width: usize,
        expected_height: usize,
    },
}

/// One plane of 8-bit samples.
#[derive(Clone, Debug)]
pub struct Plane<T> {
    data: T,
    width: usize,
    height: usize,
    stride: usize,
}

fn required_len(width: usize, height: usize, stride: usize) -> usize {
    match height {
        0 => 0,
        _ => stride * (height - 1) + width,
    }
}

impl<T: AsRef<[u8]>> Plane<T> {
    fn with_layout(plane: usize, data: T, width: usize, height: usize, stride: usize) -> Result<Self, LayoutError> {
        if stride < width {
            return Err(LayoutError::StrideTooSmall { plane, stride, width });
        }
        let required = required_len(width, height, stride);
        let len = data.as_ref().len();
        if len < required {
            return Err(LayoutError::BufferTooSmall { plane, len, required });
        }
        Ok(Self { data, width, height, stride })
    }

    pub fn new(data: T, width: usize, height: usize, stride: usize) -> Result<Self, LayoutError> {
        Self::with_layout(0, data, width, height, stride)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    /// Returns the `width` samples of row `y`.
    ///
    /// Panics if `y` is out of bounds.
    pub fn row(&self, y: usize) -> &[u8] {
        assert!(y < self.height, "row {} out of bounds for plane of height {}", y, self.height);
        let start = y * self.stride;
        &self.data.as_ref()[start..start + self.width]
    }

    pub fn sample(&self, x: usize, y: usize) -> u8 {
        self.row(y)[x]
    }

    /// Returns a view of the given region, or `None` if it doesn't lie entirely within the plane.
    pub fn region(&self, roi: &RegionOfInterest) -> Option<PlaneRegion<'_>> {
        if !roi.fits_within(self.width, self.height) {
            return None;
        }
        Some(PlaneRegion {
            data: self.data.as_ref(),
            stride: self.stride,
            x: roi.x,
            y: roi.y,
            width: roi.width,
            height: roi.height,
        })
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Plane<T> {
    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        assert!(y < self.height, "row {} out of bounds for plane of height {}", y, self.height);
        let start = y * self.stride;
        &mut self.data.as_mut()[start..start + self.width]
    }

    pub fn fill(&mut self, value: u8) {
        for y in 0..self.height {
            self.row_mut(y).fill(value);
        }
    }
}

/// A read-only window into a plane. Coordinates are relative to the window's origin.
#[derive(Clone, Copy, Debug)]
pub struct PlaneRegion<'a> {
    data: &'a [u8],
    stride: usize,
    x: usize,
    y: usize,
    width: usize,
    height: usize,
}

impl<'a> PlaneRegion<'a> {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn row(&self, y: usize) -> &'a [u8] {
        assert!(y < self.height, "row {} out of bounds for region of height {}", y, self.height);
        let start = (self.y + y) * self.stride + self.x;
        &self.data[start..start + self.width]
    }
}

/// An 8-bit 4:2:0 image. The chroma planes are half the luma width and height, rounded down.
#[derive(Clone, Debug)]
pub struct PlanarImage<T> {
    planes: [Plane<T>; PLANE_COUNT],
}

/// Returns the dimensions of the given plane of a 4:2:0 image.
pub fn plane_dimensions(plane: usize, width: usize, height: usize) -> (usize, usize) {
    match plane {
        0 => (width, height),
        _ => (width / 2, height / 2),
    }
}

impl<T: AsRef<[u8]>> PlanarImage<T> {
    /// Wraps three planes of the given strides. Each plane's dimensions are derived from the luma
    /// dimensions.
    pub fn from_planes(width: usize, height: usize, planes: [(T, usize); PLANE_COUNT]) -> Result<Self, LayoutError> {
        let [y, u, v] = planes;
        let plane = |index: usize, (data, stride): (T, usize)| {
            let (w, h) = plane_dimensions(index, width, height);
            Plane::with_layout(index, data, w, h, stride)
        };
        Ok(Self {
            planes: [plane(0, y)?, plane(1, u)?, plane(2, v)?],
        })
    }

    pub fn width(&self) -> usize {
        self.planes[0].width
    }

    pub fn height(&self) -> usize {
        self.planes[0].height
    }

    pub fn plane(&self, index: usize) -> &Plane<T> {
        &self.planes[index]
    }

    pub fn planes(&self) -> &[Plane<T>; PLANE_COUNT] {
        &self.planes
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> PlanarImage<T> {
    pub fn plane_mut(&mut self, index: usize) -> &mut Plane<T> {
        &mut self.planes[index]
    }
}

impl PlanarImage<Vec<u8>> {
    /// Allocates a tightly packed image with every plane zeroed.
    pub fn new(width: usize, height: usize) -> Self {
        let plane = |index: usize| {
            let (w, h) = plane_dimensions(index, width, height);
            Plane {
                data: vec![0; w * h],
                width: w,
                height: h,
                stride: w,
            }
        };
        Self {
            planes: [plane(0), plane(1), plane(2)],
        }
    }

    /// Allocates a tightly packed image with each plane set to a constant value.
    pub fn filled(width: usize, height: usize, values: [u8; PLANE_COUNT]) -> Self {
        let mut image = Self::new(width, height);
        for (plane, value) in image.planes.iter_mut().zip(values) {
            plane.fill(value);
        }
        image
    }

    pub fn as_borrowed(&self) -> PlanarImage<&[u8]> {
        fn plane(p: &Plane<Vec<u8>>) -> Plane<&[u8]> {
            Plane {
                data: p.data.as_slice(),
                width: p.width,
                height: p.height,
                stride: p.stride,
            }
        }
        PlanarImage {
            planes: [plane(&self.planes[0]), plane(&self.planes[1]), plane(&self.planes[2])],
        }
    }
}

impl<T: AsRef<[u8]>> RawVideoFrame<u8> for PlanarImage<T> {
    fn samples(&self, plane: usize) -> &[u8] {
        self.planes[plane].data()
    }

    fn stride(&self, plane: usize) -> usize {
        self.planes[plane].stride
    }
}
