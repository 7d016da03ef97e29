use super::PlaneScaler;
use crate::{
    error::Result,
    planar::{Plane, PlaneRegion},
};

const FRACTION_BITS: u32 = 11;
const ONE: u32 = 1 << FRACTION_BITS;
const ROUNDING: u32 = 1 << (2 * FRACTION_BITS - 1);

/// The two neighbouring source samples for one destination coordinate, and the weight of the
/// second in units of `1 / ONE`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Tap {
    i0: usize,
    i1: usize,
    frac: u32,
}

fn taps(src_extent: usize, dst_extent: usize) -> Vec<Tap> {
    let (src, dst) = (src_extent as u64, dst_extent as u64);
    (0..dst)
        .map(|d| {
            let position = d * src;
            let floor = (position / dst) as usize;
            let frac = (((position % dst) << FRACTION_BITS) / dst) as u32;
            let i0 = floor.min(src_extent - 1);
            Tap {
                i0,
                i1: (i0 + 1).min(src_extent - 1),
                frac,
            }
        })
        .collect()
}

/// Maps destination `(x, y)` to source `(x * src_w / dst_w, y * src_h / dst_h)` and blends the
/// four surrounding samples in fixed point. Taps beyond the last row or column repeat it.
pub struct BilinearScaler {
    columns: Vec<Tap>,
    rows: Vec<Tap>,
}

impl BilinearScaler {
    /// All extents must be non-zero.
    pub fn new(src_width: usize, src_height: usize, dst_width: usize, dst_height: usize) -> Self {
        Self {
            columns: taps(src_width, dst_width),
            rows: taps(src_height, dst_height),
        }
    }
}

impl PlaneScaler for BilinearScaler {
    fn scale(&mut self, src: &PlaneRegion<'_>, dst: &mut Plane<Vec<u8>>) -> Result<()> {
        for (y, row) in self.rows.iter().enumerate() {
            let (top, bottom) = (src.row(row.i0), src.row(row.i1));
            for (sample, column) in dst.row_mut(y).iter_mut().zip(&self.columns) {
                let lerp = |line: &[u8]| line[column.i0] as u32 * (ONE - column.frac) + line[column.i1] as u32 * column.frac;
                let value = lerp(top) * (ONE - row.frac) + lerp(bottom) * row.frac;
                *sample = ((value + ROUNDING) >> (2 * FRACTION_BITS)) as u8;
            }
        }
        Ok(())
    }
}
