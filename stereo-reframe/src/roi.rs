/// Selects one half of a side-by-side stereo frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Eye {
    #[default]
    Left,
    Right,
}

/// A rectangle in luma sample coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegionOfInterest {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl RegionOfInterest {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self { x, y, width, height }
    }

    /// The full height of the left or right half of a side-by-side frame.
    pub fn eye(eye: Eye, frame_width: usize, frame_height: usize) -> Self {
        let width = frame_width / 2;
        let x = match eye {
            Eye::Left => 0,
            Eye::Right => width,
        };
        Self::new(x, 0, width, frame_height)
    }

    /// The corresponding region of a 4:2:0 chroma plane.
    pub fn chroma(&self) -> Self {
        Self::new(self.x / 2, self.y / 2, self.width / 2, self.height / 2)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn fits_within(&self, width: usize, height: usize) -> bool {
        self.x.checked_add(self.width).map_or(false, |right| right <= width) && self.y.checked_add(self.height).map_or(false, |bottom| bottom <= height)
    }
}
