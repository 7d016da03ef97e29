use std::fmt;

use crate::error::{Error, Result};

/// A presentation time in ticks of the configured timescale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub i64);

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RateMode {
    /// Every input frame is encoded at the input frame rate.
    #[default]
    Full,
    /// Every other input frame is dropped and the output runs at half the input frame rate.
    Decimated,
}

/// Derives output timestamps purely from the output frame index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimestampPolicy {
    ticks_per_second: u32,
    frame_rate: u32,
    mode: RateMode,
    increment: i64,
}

impl TimestampPolicy {
    /// Fails unless the per-frame increment is a whole number of ticks.
    pub fn new(ticks_per_second: u32, frame_rate: u32, mode: RateMode) -> Result<Self> {
        if ticks_per_second == 0 || frame_rate == 0 {
            return Err(Error::config(format!(
                "timescale and frame rate must be non-zero, got {} and {}",
                ticks_per_second, frame_rate
            )));
        }
        let ticks = match mode {
            RateMode::Full => ticks_per_second as i64,
            RateMode::Decimated => 2 * ticks_per_second as i64,
        };
        if ticks % frame_rate as i64 != 0 {
            return Err(Error::config(format!(
                "{:?} rate at {} fps does not divide a {} tick timescale evenly",
                mode, frame_rate, ticks_per_second
            )));
        }
        Ok(Self {
            ticks_per_second,
            frame_rate,
            mode,
            increment: ticks / frame_rate as i64,
        })
    }

    pub fn increment(&self) -> i64 {
        self.increment
    }

    pub fn ticks_per_second(&self) -> u32 {
        self.ticks_per_second
    }

    pub fn mode(&self) -> RateMode {
        self.mode
    }

    /// The output frame rate as a fraction.
    pub fn output_frame_rate(&self) -> (u32, u32) {
        match self.mode {
            RateMode::Full => (self.frame_rate, 1),
            RateMode::Decimated if self.frame_rate % 2 == 0 => (self.frame_rate / 2, 1),
            RateMode::Decimated => (self.frame_rate, 2),
        }
    }

    pub fn next_timestamp(&self, output_frame_index: u64) -> Timestamp {
        Timestamp(output_frame_index as i64 * self.increment)
    }

    /// The timestamp one frame after `ts`.
    pub fn after(&self, ts: Timestamp) -> Timestamp {
        Timestamp(ts.0 + self.increment)
    }
}

/// Decides which input frames are kept. In decimated mode, frames with an odd input index are
/// dropped.
#[derive(Clone, Debug)]
pub struct Decimator {
    mode: RateMode,
    input_count: u64,
}

impl Decimator {
    pub fn new(mode: RateMode) -> Self {
        Self { mode, input_count: 0 }
    }

    /// Counts one input frame and returns whether it should be encoded.
    pub fn keep(&mut self) -> bool {
        let index = self.input_count;
        self.input_count += 1;
        match self.mode {
            RateMode::Full => true,
            RateMode::Decimated => index % 2 == 0,
        }
    }

    /// The number of input frames seen so far.
    pub fn input_count(&self) -> u64 {
        self.input_count
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_full_rate() {
        let policy = TimestampPolicy::new(48000, 50, RateMode::Full).unwrap();
        assert_eq!(960, policy.increment());
        assert_eq!((50, 1), policy.output_frame_rate());
        let timestamps: Vec<_> = (0..5).map(|i| policy.next_timestamp(i).0).collect();
        assert_eq!(vec![0, 960, 1920, 2880, 3840], timestamps);
        assert_eq!(Timestamp(4800), policy.after(Timestamp(3840)));
    }

    #[test]
    fn test_decimated_rate() {
        let policy = TimestampPolicy::new(48000, 50, RateMode::Decimated).unwrap();
        assert_eq!(1920, policy.increment());
        assert_eq!((25, 1), policy.output_frame_rate());
        let timestamps: Vec<_> = (0..5).map(|i| policy.next_timestamp(i).0).collect();
        assert_eq!(vec![0, 1920, 3840, 5760, 7680], timestamps);

        let policy = TimestampPolicy::new(90000, 25, RateMode::Decimated).unwrap();
        assert_eq!(7200, policy.increment());
        assert_eq!((25, 2), policy.output_frame_rate());
    }

    #[test]
    fn test_no_drift() {
        let policy = TimestampPolicy::new(48000, 50, RateMode::Full).unwrap();
        let mut ts = policy.next_timestamp(0);
        for i in 1..100_000u64 {
            ts = policy.after(ts);
            assert_eq!(policy.next_timestamp(i), ts);
        }
    }

    #[test]
    fn test_invalid_rates() {
        assert!(TimestampPolicy::new(48000, 0, RateMode::Full).is_err());
        assert!(TimestampPolicy::new(0, 50, RateMode::Full).is_err());
        assert!(TimestampPolicy::new(48000, 7, RateMode::Full).is_err());
        assert!(TimestampPolicy::new(90000, 60, RateMode::Decimated).is_ok());
        assert!(TimestampPolicy::new(1000, 3, RateMode::Decimated).is_err());
    }

    #[test]
    fn test_decimator() {
        let mut full = Decimator::new(RateMode::Full);
        assert!((0..10).all(|_| full.keep()));
        assert_eq!(10, full.input_count());

        let mut decimated = Decimator::new(RateMode::Decimated);
        let kept: Vec<_> = (0..10).map(|_| decimated.keep()).collect();
        assert_eq!(vec![true, false, true, false, true, false, true, false, true, false], kept);
        assert_eq!(10, decimated.input_count());
    }
}
