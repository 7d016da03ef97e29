use std::io;

/// A big-endian bit reader over an RBSP.
pub struct Bitstream<T> {
    inner: T,
    bit_offset: usize,
}

impl<T: AsRef<[u8]>> Bitstream<T> {
    pub fn new(inner: T) -> Self {
        Self { inner, bit_offset: 0 }
    }

    pub fn bits_remaining(&self) -> usize {
        self.inner.as_ref().len() * 8 - self.bit_offset
    }

    pub fn byte_aligned(&self) -> bool {
        self.bit_offset % 8 == 0
    }

    /// Peeks at up to 64 bits without consuming them.
    pub fn next_bits(&self, n: usize) -> Option<u64> {
        if n > 64 || self.bits_remaining() < n {
            return None;
        }
        let data = self.inner.as_ref();
        let mut ret = 0u64;
        for i in 0..n {
            let bit = self.bit_offset + i;
            ret = (ret << 1) | ((data[bit / 8] >> (7 - bit % 8)) & 1) as u64;
        }
        Some(ret)
    }

    pub fn read_bits(&mut self, n: usize) -> io::Result<u64> {
        let ret = self.next_bits(n).ok_or_else(unexpected_eof)?;
        self.bit_offset += n;
        Ok(ret)
    }

    /// Skips `n` bits, which may be more than 64.
    pub fn skip_bits(&mut self, n: usize) -> io::Result<()> {
        if self.bits_remaining() < n {
            return Err(unexpected_eof());
        }
        self.bit_offset += n;
        Ok(())
    }

    pub fn decode<V: Decode>(&mut self, v: &mut V) -> io::Result<()> {
        *v = V::decode(self)?;
        Ok(())
    }
}

fn unexpected_eof() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "unexpected end of bitstream")
}

pub trait Decode: Sized {
    fn decode<T: AsRef<[u8]>>(bs: &mut Bitstream<T>) -> io::Result<Self>;
}

/// Decodes a sequence of syntax elements in order, stopping at the first error.
#[macro_export]
macro_rules! decode {
    ($b:expr, $e:expr) => {{
        $b.decode($e)
    }};
    ($b:expr, $e:expr, $($r:expr),+) => {
        decode!($b, $e).and_then(|_| decode!($b, $($r),+))
    };
}

#[cfg(test)]
mod test {
    use super::{super::syntax_elements::*, *};

    #[test]
    fn test_decode() {
        let mut bs = Bitstream::new(&[0xb4]);
        let mut a = U1::default();
        let mut b = U3::default();
        let mut c = U4::default();
        decode!(bs, &mut a, &mut b, &mut c).unwrap();
        assert_eq!(a.0, 1);
        assert_eq!(b.0, 3);
        assert_eq!(c.0, 4);
        assert_eq!(bs.bits_remaining(), 0);
    }

    #[test]
    fn test_skip_bits() {
        let mut bs = Bitstream::new(vec![0u8; 12]);
        bs.skip_bits(88).unwrap();
        assert_eq!(bs.bits_remaining(), 8);
        assert!(bs.byte_aligned());
        assert!(bs.skip_bits(9).is_err());
        assert_eq!(bs.bits_remaining(), 8);
    }

    #[test]
    fn test_next_bits() {
        let bs = Bitstream::new(&[0x80, 0x01]);
        assert_eq!(bs.next_bits(1), Some(1));
        assert_eq!(bs.next_bits(16), Some(0x8001));
        assert_eq!(bs.next_bits(17), None);
    }
}
