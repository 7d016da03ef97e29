//! Benchmarks resampling one eye of a full-size stereo frame down to the default output size.

use criterion::{criterion_group, criterion_main, Criterion};
use stereo_reframe::{Eye, Interpolation, PlanarImage, RegionOfInterest, Resampler};

const SOURCE: (usize, usize) = (5760, 2880);
const OUTPUT: (usize, usize) = (200, 200);

fn criterion_benchmark(c: &mut Criterion) {
    let mut source = PlanarImage::filled(SOURCE.0, SOURCE.1, [16, 128, 128]);
    for (i, sample) in source.plane_mut(0).row_mut(0).iter_mut().enumerate() {
        *sample = (i % 251) as u8;
    }
    let roi = RegionOfInterest::eye(Eye::Left, SOURCE.0, SOURCE.1);
    let mut output = PlanarImage::new(OUTPUT.0, OUTPUT.1);

    let mut g = c.benchmark_group("resample");
    let mut interpolations = vec![Interpolation::Bilinear];
    if cfg!(feature = "ffmpeg") {
        interpolations.push(Interpolation::Bicubic);
    }
    for interpolation in interpolations {
        let mut resampler = Resampler::new(interpolation, SOURCE, roi, OUTPUT).unwrap();
        g.bench_function(format!("{:?}", interpolation), |b| {
            b.iter(|| resampler.resample(&source, &mut output).unwrap());
        });
    }
    g.warm_up_time(std::time::Duration::from_secs(1));
    g.sampling_mode(criterion::SamplingMode::Flat);
    g.sample_size(10);
    g.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
