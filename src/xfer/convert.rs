//! Byte-order conversion primitives.
//!
//! A [`Convert`] names the representation used by whoever wrote a buffer:
//! byte order plus the width of a "long". `B32` is big-endian with 32-bit
//! longs, `L64` little-endian with 64-bit longs, and so on. Ints are always
//! 32-bit, floats and doubles IEEE 754.

use crate::error::{FlowError, FlowResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Big,
    Little,
}

impl ByteOrder {
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convert {
    B32,
    B64,
    L32,
    L64,
}

impl Convert {
    /// This machine's representation.
    pub fn native() -> Self {
        match ByteOrder::native() {
            ByteOrder::Big => Convert::B64,
            ByteOrder::Little => Convert::L64,
        }
    }

    pub fn byte_order(self) -> ByteOrder {
        match self {
            Convert::B32 | Convert::B64 => ByteOrder::Big,
            Convert::L32 | Convert::L64 => ByteOrder::Little,
        }
    }

    /// Bytes in a long.
    pub fn long_size(self) -> usize {
        match self {
            Convert::B32 | Convert::L32 => 4,
            Convert::B64 | Convert::L64 => 8,
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            Convert::B32 => 0,
            Convert::B64 => 1,
            Convert::L32 => 2,
            Convert::L64 => 3,
        }
    }

    pub fn from_tag(tag: u8) -> FlowResult<Self> {
        match tag {
            0 => Ok(Convert::B32),
            1 => Ok(Convert::B64),
            2 => Ok(Convert::L32),
            3 => Ok(Convert::L64),
            other => Err(FlowError::Wire(format!("unknown byte-order tag {}", other))),
        }
    }

    fn big(self) -> bool {
        self.byte_order() == ByteOrder::Big
    }

    pub fn put_int(self, out: &mut Vec<u8>, v: i32) {
        if self.big() {
            out.extend_from_slice(&v.to_be_bytes());
        } else {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }

    /// Fails when a 32-bit long cannot hold `v`.
    pub fn put_long(self, out: &mut Vec<u8>, v: i64) -> FlowResult<()> {
        if self.long_size() == 4 {
            let narrow = i32::try_from(v)
                .map_err(|_| FlowError::Wire(format!("{} does not fit a 32-bit long", v)))?;
            self.put_int(out, narrow);
        } else if self.big() {
            out.extend_from_slice(&v.to_be_bytes());
        } else {
            out.extend_from_slice(&v.to_le_bytes());
        }
        Ok(())
    }

    pub fn put_float(self, out: &mut Vec<u8>, v: f32) {
        self.put_int(out, v.to_bits() as i32);
    }

    pub fn put_double(self, out: &mut Vec<u8>, v: f64) {
        let bits = v.to_bits().to_be_bytes();
        if self.big() {
            out.extend_from_slice(&bits);
        } else {
            out.extend(bits.iter().rev());
        }
    }

    pub fn get_int(self, bytes: [u8; 4]) -> i32 {
        if self.big() {
            i32::from_be_bytes(bytes)
        } else {
            i32::from_le_bytes(bytes)
        }
    }

    /// `bytes` must be exactly `long_size()` long.
    pub fn get_long(self, bytes: &[u8]) -> FlowResult<i64> {
        match (bytes.len(), self.long_size()) {
            (4, 4) => Ok(self.get_int([bytes[0], bytes[1], bytes[2], bytes[3]]) as i64),
            (8, 8) => {
                let mut b = [0u8; 8];
                b.copy_from_slice(bytes);
                Ok(if self.big() {
                    i64::from_be_bytes(b)
                } else {
                    i64::from_le_bytes(b)
                })
            }
            (n, want) => Err(FlowError::Wire(format!("long needs {} bytes, got {}", want, n))),
        }
    }

    pub fn get_float(self, bytes: [u8; 4]) -> f32 {
        f32::from_bits(self.get_int(bytes) as u32)
    }

    pub fn get_double(self, bytes: [u8; 8]) -> f64 {
        if self.big() {
            f64::from_be_bytes(bytes)
        } else {
            f64::from_le_bytes(bytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_layouts() {
        let mut big = Vec::new();
        Convert::B32.put_int(&mut big, 0x0102_0304);
        assert_eq!(big, vec![1, 2, 3, 4]);

        let mut little = Vec::new();
        Convert::L64.put_int(&mut little, 0x0102_0304);
        assert_eq!(little, vec![4, 3, 2, 1]);
        assert_eq!(Convert::L64.get_int([4, 3, 2, 1]), 0x0102_0304);
    }

    #[test]
    fn test_long_width() {
        let mut out = Vec::new();
        Convert::B32.put_long(&mut out, -2).unwrap();
        assert_eq!(out.len(), 4);
        assert_eq!(Convert::B32.get_long(&out).unwrap(), -2);

        assert!(Convert::L32.put_long(&mut out, i64::MAX).is_err());
        assert!(Convert::L64.get_long(&[0; 4]).is_err());
    }

    #[test]
    fn test_double_is_reversed_between_orders() {
        let mut b = Vec::new();
        let mut l = Vec::new();
        Convert::B64.put_double(&mut b, 1.5);
        Convert::L64.put_double(&mut l, 1.5);
        let reversed: Vec<u8> = b.iter().rev().copied().collect();
        assert_eq!(reversed, l);

        let mut arr = [0u8; 8];
        arr.copy_from_slice(&l);
        assert_eq!(Convert::L64.get_double(arr), 1.5);
    }

    #[test]
    fn test_tags() {
        for c in [Convert::B32, Convert::B64, Convert::L32, Convert::L64] {
            assert_eq!(Convert::from_tag(c.tag()).unwrap(), c);
        }
        assert!(Convert::from_tag(9).is_err());
        assert_eq!(Convert::native().long_size(), 8);
    }
}
