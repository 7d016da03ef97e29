use super::{Bitstream, Decode};

use std::io;

// ITU-T H.265, 11/2019, 7.2
macro_rules! define_syntax_element_u {
    ($e:ident, $t:tt, $n:literal) => {
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
        pub struct $e(pub $t);

        impl Decode for $e {
            fn decode<T: AsRef<[u8]>>(bs: &mut Bitstream<T>) -> io::Result<Self> {
                Ok(Self(bs.read_bits($n)? as _))
            }
        }
    };
}

define_syntax_element_u!(U1, u8, 1);
define_syntax_element_u!(U2, u8, 2);
define_syntax_element_u!(U3, u8, 3);
define_syntax_element_u!(U4, u8, 4);
define_syntax_element_u!(U5, u8, 5);
define_syntax_element_u!(U6, u8, 6);
define_syntax_element_u!(U8, u8, 8);
define_syntax_element_u!(U32, u32, 32);
define_syntax_element_u!(U48, u64, 48);

define_syntax_element_u!(F1, u8, 1);

// ITU-T H.265, 11/2019, 9.2
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UE(pub u64);

impl Decode for UE {
    fn decode<T: AsRef<[u8]>>(bs: &mut Bitstream<T>) -> io::Result<Self> {
        let mut leading_zero_bits = 0;
        while bs.read_bits(1)? == 0 {
            leading_zero_bits += 1;
            if leading_zero_bits > 32 {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "exp-golomb code too long"));
            }
        }
        Ok(Self(bs.read_bits(leading_zero_bits)? + (1 << leading_zero_bits) - 1))
    }
}
