use ffmpeg_next as ffmpeg;

use ffmpeg::{format::Pixel, frame, software::scaling};

use crate::{
    error::{Error, Result},
    planar::{Plane, PlaneRegion},
    resample::PlaneScaler,
};

/// Resamples a single plane with libswscale by treating it as an 8-bit grayscale image. The
/// staging frames are allocated once, so each call only copies rows in and out.
pub struct SwscalePlaneScaler {
    context: scaling::Context,
    input: frame::Video,
    output: frame::Video,
}

fn dimension(value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::config(format!("plane dimension {} is too large", value)))
}

impl SwscalePlaneScaler {
    pub fn new(flags: scaling::Flags, src_width: usize, src_height: usize, dst_width: usize, dst_height: usize) -> Result<Self> {
        let (sw, sh) = (dimension(src_width)?, dimension(src_height)?);
        let (dw, dh) = (dimension(dst_width)?, dimension(dst_height)?);
        let context = scaling::Context::get(Pixel::GRAY8, sw, sh, Pixel::GRAY8, dw, dh, flags)
            .map_err(|e| Error::config(format!("unable to scale {}x{} to {}x{}: {}", sw, sh, dw, dh, e)))?;
        Ok(Self {
            context,
            input: frame::Video::new(Pixel::GRAY8, sw, sh),
            output: frame::Video::new(Pixel::GRAY8, dw, dh),
        })
    }

    pub fn bicubic(src_width: usize, src_height: usize, dst_width: usize, dst_height: usize) -> Result<Self> {
        Self::new(
            scaling::Flags::BICUBIC | scaling::Flags::ACCURATE_RND,
            src_width,
            src_height,
            dst_width,
            dst_height,
        )
    }
}

impl PlaneScaler for SwscalePlaneScaler {
    fn scale(&mut self, src: &PlaneRegion<'_>, dst: &mut Plane<Vec<u8>>) -> Result<()> {
        let input_size = (self.input.width() as usize, self.input.height() as usize);
        let output_size = (self.output.width() as usize, self.output.height() as usize);
        if (src.width(), src.height()) != input_size || (dst.width(), dst.height()) != output_size {
            return Err(Error::Resample {
                message: format!(
                    "scaler built for {}x{} to {}x{} was given {}x{} to {}x{}",
                    input_size.0,
                    input_size.1,
                    output_size.0,
                    output_size.1,
                    src.width(),
                    src.height(),
                    dst.width(),
                    dst.height()
                ),
            });
        }

        let (width, stride) = (input_size.0, self.input.stride(0));
        let data = self.input.data_mut(0);
        for y in 0..src.height() {
            data[y * stride..y * stride + width].copy_from_slice(src.row(y));
        }

        self.context
            .run(&self.input, &mut self.output)
            .map_err(|e| Error::Resample { message: e.to_string() })?;

        let (width, stride) = (output_size.0, self.output.stride(0));
        let data = self.output.data(0);
        for y in 0..dst.height() {
            dst.row_mut(y).copy_from_slice(&data[y * stride..y * stride + width]);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{planar::PlanarImage, roi::RegionOfInterest};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn scale(src: &PlanarImage<Vec<u8>>, dst_width: usize, dst_height: usize) -> PlanarImage<Vec<u8>> {
        let mut dst = PlanarImage::new(dst_width, dst_height);
        let plane = src.plane(0);
        let region = plane.region(&RegionOfInterest::new(0, 0, plane.width(), plane.height())).unwrap();
        SwscalePlaneScaler::bicubic(plane.width(), plane.height(), dst_width, dst_height)
            .unwrap()
            .scale(&region, dst.plane_mut(0))
            .unwrap();
        dst
    }

    #[test]
    fn test_uniform() {
        for (src, dst) in [((37, 23), (200, 200)), ((2880, 2880), (200, 200)), ((64, 64), (2, 2))] {
            for value in [0, 1, 127, 254, 255] {
                let image = PlanarImage::filled(src.0, src.1, [value, 0, 0]);
                let out = scale(&image, dst.0, dst.1);
                assert!(out.plane(0).data().iter().all(|&s| s == value), "{:?} -> {:?} value {}", src, dst, value);
            }
        }
    }

    #[test]
    fn test_identity() {
        let mut rng = StdRng::seed_from_u64(0xb1c0);
        let mut image = PlanarImage::new(24, 16);
        for y in 0..16 {
            rng.fill(image.plane_mut(0).row_mut(y));
        }
        let out = scale(&image, 24, 16);
        for y in 0..16 {
            assert_eq!(image.plane(0).row(y), out.plane(0).row(y));
        }
    }

    #[test]
    fn test_hard_edge_clamps_overshoot() {
        let mut image = PlanarImage::new(8, 4);
        for y in 0..4 {
            image.plane_mut(0).row_mut(y)[4..].fill(255);
        }
        let out = scale(&image, 32, 4);
        for y in 0..4 {
            let row = out.plane(0).row(y);
            assert_eq!(0, row[0]);
            assert_eq!(255, row[31]);
            assert!(row.windows(2).all(|pair| pair[0] <= pair[1]), "{:?}", row);
        }
    }

    #[test]
    fn test_reads_only_the_region() {
        let mut image = PlanarImage::new(32, 8);
        for y in 0..8 {
            let row = image.plane_mut(0).row_mut(y);
            row[..16].fill(40);
            row[16..].fill(220);
        }
        let plane = image.plane(0);
        let mut dst = PlanarImage::new(6, 6);
        let mut scaler = SwscalePlaneScaler::bicubic(16, 8, 6, 6).unwrap();
        scaler.scale(&plane.region(&RegionOfInterest::new(16, 0, 16, 8)).unwrap(), dst.plane_mut(0)).unwrap();
        assert!(dst.plane(0).data().iter().all(|&s| s == 220));
        scaler.scale(&plane.region(&RegionOfInterest::new(0, 0, 16, 8)).unwrap(), dst.plane_mut(0)).unwrap();
        assert!(dst.plane(0).data().iter().all(|&s| s == 40));
    }

    #[test]
    fn test_rejects_mismatched_region() {
        let image = PlanarImage::new(16, 16);
        let plane = image.plane(0);
        let mut dst = PlanarImage::new(6, 6);
        let mut scaler = SwscalePlaneScaler::bicubic(16, 8, 6, 6).unwrap();
        let region = plane.region(&RegionOfInterest::new(0, 0, 16, 16)).unwrap();
        assert!(matches!(scaler.scale(&region, dst.plane_mut(0)), Err(Error::Resample { .. })));
    }
}
