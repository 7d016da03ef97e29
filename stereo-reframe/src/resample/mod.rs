//! Crops a region out of each plane of a source image and resamples it to the output size.

mod bilinear;
pub use bilinear::*;

use crate::{
    error::{Error, Result},
    planar::{plane_dimensions, PlanarImage, Plane, PlaneRegion, PLANE_COUNT},
    roi::RegionOfInterest,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Interpolation {
    #[default]
    Bilinear,
    /// Resampled by libswscale, so only available with the `ffmpeg` feature.
    Bicubic,
}

/// Resamples one plane region into a destination plane, overwriting every destination sample.
/// Implementations precompute their coordinate tables for fixed source and destination extents.
pub trait PlaneScaler {
    fn scale(&mut self, src: &PlaneRegion<'_>, dst: &mut Plane<Vec<u8>>) -> Result<()>;
}

enum Scaler {
    Bilinear(BilinearScaler),
    #[cfg(feature = "ffmpeg")]
    Swscale(crate::ffmpeg::SwscalePlaneScaler),
}

impl Scaler {
    fn new(interpolation: Interpolation, src: &RegionOfInterest, dst_width: usize, dst_height: usize) -> Result<Self> {
        match interpolation {
            Interpolation::Bilinear => Ok(Self::Bilinear(BilinearScaler::new(src.width, src.height, dst_width, dst_height))),
            #[cfg(feature = "ffmpeg")]
            Interpolation::Bicubic => Ok(Self::Swscale(crate::ffmpeg::SwscalePlaneScaler::bicubic(
                src.width, src.height, dst_width, dst_height,
            )?)),
            #[cfg(not(feature = "ffmpeg"))]
            Interpolation::Bicubic => Err(Error::config("bicubic interpolation requires the ffmpeg feature")),
        }
    }
}

impl PlaneScaler for Scaler {
    fn scale(&mut self, src: &PlaneRegion<'_>, dst: &mut Plane<Vec<u8>>) -> Result<()> {
        match self {
            Self::Bilinear(scaler) => scaler.scale(src, dst),
            #[cfg(feature = "ffmpeg")]
            Self::Swscale(scaler) => scaler.scale(src, dst),
        }
    }
}

/// Checks that `roi` lies within the source and is non-empty in every plane, and that the
/// destination dimensions are even and non-zero.
pub fn validate_geometry(source_size: (usize, usize), roi: &RegionOfInterest, dest_size: (usize, usize)) -> Result<()> {
    let (dest_width, dest_height) = dest_size;
    if dest_width == 0 || dest_height == 0 || dest_width % 2 != 0 || dest_height % 2 != 0 {
        return Err(Error::config(format!("output dimensions must be even and non-zero, got {}x{}", dest_width, dest_height)));
    }
    if !roi.fits_within(source_size.0, source_size.1) {
        return Err(Error::config(format!("region {:?} does not fit within {}x{} source", roi, source_size.0, source_size.1)));
    }
    if roi.chroma().is_empty() {
        return Err(Error::config(format!("region {:?} is empty in the chroma planes", roi)));
    }
    Ok(())
}

pub struct Resampler {
    interpolation: Interpolation,
    source_size: (usize, usize),
    dest_size: (usize, usize),
    regions: [RegionOfInterest; PLANE_COUNT],
    scalers: [Scaler; PLANE_COUNT],
}

impl Resampler {
    /// Validates the geometry with [`validate_geometry`] and builds a scaler for each plane.
    pub fn new(interpolation: Interpolation, source_size: (usize, usize), roi: RegionOfInterest, dest_size: (usize, usize)) -> Result<Self> {
        validate_geometry(source_size, &roi, dest_size)?;

        let regions = [roi, roi.chroma(), roi.chroma()];
        let scaler = |plane: usize| {
            let (w, h) = plane_dimensions(plane, dest_size.0, dest_size.1);
            Scaler::new(interpolation, &regions[plane], w, h)
        };
        let scalers = [scaler(0)?, scaler(1)?, scaler(2)?];
        Ok(Self {
            interpolation,
            source_size,
            dest_size,
            regions,
            scalers,
        })
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    /// Overwrites `dest` with the resampled region of `source`. Both images must have the sizes
    /// the resampler was built for.
    pub fn resample<T: AsRef<[u8]>>(&mut self, source: &PlanarImage<T>, dest: &mut PlanarImage<Vec<u8>>) -> Result<()> {
        if (source.width(), source.height()) != self.source_size {
            return Err(Error::config(format!(
                "source frame is {}x{} but the resampler expects {}x{}",
                source.width(),
                source.height(),
                self.source_size.0,
                self.source_size.1
            )));
        }
        if (dest.width(), dest.height()) != self.dest_size {
            return Err(Error::config(format!(
                "output frame is {}x{} but the resampler expects {}x{}",
                dest.width(),
                dest.height(),
                self.dest_size.0,
                self.dest_size.1
            )));
        }

        for (plane, (scaler, roi)) in self.scalers.iter_mut().zip(&self.regions).enumerate() {
            let region = source
                .plane(plane)
                .region(roi)
                .ok_or_else(|| Error::config(format!("region {:?} is outside plane {}", roi, plane)))?;
            scaler.scale(&region, dest.plane_mut(plane))?;
        }
        Ok(())
    }
}
