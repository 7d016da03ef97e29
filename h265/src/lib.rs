pub mod bitstream;
pub use bitstream::*;

pub mod nal_unit;
pub use nal_unit::*;

pub mod profile_tier_level;
pub use profile_tier_level::*;

pub mod sequence_parameter_set;
pub use sequence_parameter_set::*;

pub mod syntax_elements;
pub use syntax_elements::*;

/// Iterates over NAL units that are each preceded by a big-endian length of `nalu_length_size`
/// bytes, as found in MP4 samples and `hvcC` records. Iteration stops at the first truncated unit.
pub struct HVCCIter<'a> {
    buf: &'a [u8],
    nalu_length_size: usize,
}

pub fn iterate_hvcc<T: AsRef<[u8]> + ?Sized>(buf: &T, nalu_length_size: usize) -> HVCCIter<'_> {
    HVCCIter {
        buf: buf.as_ref(),
        nalu_length_size,
    }
}

impl<'a> Iterator for HVCCIter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.nalu_length_size == 0 || self.buf.len() < self.nalu_length_size {
            return None;
        }

        let (prefix, rest) = self.buf.split_at(self.nalu_length_size);
        let len = prefix.iter().fold(0usize, |len, b| len << 8 | *b as usize);
        if rest.len() < len {
            return None;
        }

        let (ret, rest) = rest.split_at(len);
        self.buf = rest;
        Some(ret)
    }
}

/// Iterates over NAL units separated by three or four byte start codes. Leading bytes before the
/// first start code must be zero, otherwise iteration yields nothing.
pub struct AnnexBIter<'a> {
    buf: &'a [u8],
}

pub fn iterate_annex_b<T: AsRef<[u8]> + ?Sized>(buf: &T) -> AnnexBIter<'_> {
    AnnexBIter { buf: buf.as_ref() }
}

impl<'a> Iterator for AnnexBIter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        // skip zero_byte / leading_zero_8bits up to the start code
        let mut pos = 0;
        loop {
            match self.buf.get(pos..pos + 3) {
                Some([0, 0, 1]) => break,
                Some([0, _, _]) => pos += 1,
                _ => {
                    self.buf = &[];
                    return None;
                }
            }
        }

        let nalu = &self.buf[pos + 3..];
        let end = nalu.windows(3).position(|w| w[0] == 0 && w[1] == 0 && w[2] <= 1).unwrap_or(nalu.len());
        self.buf = &nalu[end..];
        Some(&nalu[..end])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_iterate_annex_b() {
        let data = [0x00, 0x00, 0x00, 0x01, 0x40, 0x01, 0x0c, 0x00, 0x00, 0x01, 0x42, 0x01, 0x00, 0x00, 0x00, 0x01, 0x26];
        let expected: Vec<&[u8]> = vec![&[0x40, 0x01, 0x0c], &[0x42, 0x01], &[0x26]];
        assert_eq!(expected, iterate_annex_b(&data).collect::<Vec<&[u8]>>());
    }

    #[test]
    fn test_iterate_annex_b_garbage() {
        assert_eq!(iterate_annex_b(&[0x01, 0x00, 0x00, 0x01, 0x26]).count(), 0);
        assert_eq!(iterate_annex_b(&[0x00, 0x00]).count(), 0);
        assert_eq!(iterate_annex_b(&[0u8; 0]).count(), 0);
    }

    #[test]
    fn test_iterate_annex_b_emulation_prevention() {
        // 00 00 03 is not a start code and stays inside the unit
        let data = [0x00, 0x00, 0x01, 0x42, 0x00, 0x00, 0x03, 0x01];
        let expected: Vec<&[u8]> = vec![&[0x42, 0x00, 0x00, 0x03, 0x01]];
        assert_eq!(expected, iterate_annex_b(&data).collect::<Vec<&[u8]>>());
    }

    #[test]
    fn test_iterate_hvcc() {
        let data = [0x00, 0x00, 0x00, 0x03, 0x01, 0x02, 0x03, 0x00, 0x00, 0x00, 0x01, 0x04];
        let expected: Vec<&[u8]> = vec![&[0x01, 0x02, 0x03], &[0x04]];
        assert_eq!(expected, iterate_hvcc(&data, 4).collect::<Vec<&[u8]>>());

        let truncated = [0x00, 0x02, 0x01];
        assert_eq!(iterate_hvcc(&truncated, 2).count(), 0);
    }
}
