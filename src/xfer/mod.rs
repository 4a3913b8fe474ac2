//! Message buffers for crossing process boundaries.
//!
//! Every buffer starts with one tag byte naming the writer's [`Convert`]
//! representation, so a reader on any machine decodes it correctly without
//! the two sides agreeing on byte order in advance.

pub mod convert;

pub use convert::{ByteOrder, Convert};

use crate::error::{FlowError, FlowResult};

pub struct MessageWriter {
    convert: Convert,
    buf: Vec<u8>,
}

impl MessageWriter {
    pub fn new(convert: Convert) -> Self {
        Self {
            convert,
            buf: vec![convert.tag()],
        }
    }

    pub fn native() -> Self {
        Self::new(Convert::native())
    }

    pub fn write_int(&mut self, v: i32) {
        self.convert.put_int(&mut self.buf, v);
    }

    pub fn write_long(&mut self, v: i64) -> FlowResult<()> {
        self.convert.put_long(&mut self.buf, v)
    }

    /// A length or count, written as a long.
    pub fn write_len(&mut self, n: usize) -> FlowResult<()> {
        let v = i64::try_from(n).map_err(|_| FlowError::Wire(format!("length {} too large", n)))?;
        self.write_long(v)
    }

    pub fn write_float(&mut self, v: f32) {
        self.convert.put_float(&mut self.buf, v);
    }

    pub fn write_double(&mut self, v: f64) {
        self.convert.put_double(&mut self.buf, v);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.len() <= 1
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

pub struct MessageReader<'a> {
    convert: Convert,
    buf: &'a [u8],
    pos: usize,
}

impl<'a> MessageReader<'a> {
    pub fn new(buf: &'a [u8]) -> FlowResult<Self> {
        let tag = *buf
            .first()
            .ok_or_else(|| FlowError::Wire("empty message".to_string()))?;
        Ok(Self {
            convert: Convert::from_tag(tag)?,
            buf,
            pos: 1,
        })
    }

    /// Representation the sender used.
    pub fn convert(&self) -> Convert {
        self.convert
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> FlowResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(FlowError::Wire(format!(
                "truncated message: need {} bytes at offset {}, have {}",
                n,
                self.pos,
                self.remaining()
            )));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn take4(&mut self) -> FlowResult<[u8; 4]> {
        let b = self.take(4)?;
        Ok([b[0], b[1], b[2], b[3]])
    }

    pub fn read_int(&mut self) -> FlowResult<i32> {
        let b = self.take4()?;
        Ok(self.convert.get_int(b))
    }

    pub fn read_long(&mut self) -> FlowResult<i64> {
        let n = self.convert.long_size();
        let b = self.take(n)?;
        self.convert.get_long(b)
    }

    pub fn read_len(&mut self) -> FlowResult<usize> {
        let v = self.read_long()?;
        usize::try_from(v).map_err(|_| FlowError::Wire(format!("negative length {}", v)))
    }

    pub fn read_float(&mut self) -> FlowResult<f32> {
        let b = self.take4()?;
        Ok(self.convert.get_float(b))
    }

    pub fn read_double(&mut self) -> FlowResult<f64> {
        let b = self.take(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(self.convert.get_double(arr))
    }

    /// Fail unless `count` items of `item_size` bytes could still follow.
    pub fn ensure_available(&self, count: usize, item_size: usize) -> FlowResult<()> {
        match count.checked_mul(item_size) {
            Some(n) if n <= self.remaining() => Ok(()),
            _ => Err(FlowError::Wire(format!(
                "message claims {} items but only {} bytes remain",
                count,
                self.remaining()
            ))),
        }
    }

    pub fn expect_end(&self) -> FlowResult<()> {
        if self.remaining() == 0 {
            Ok(())
        } else {
            Err(FlowError::Wire(format!("{} trailing bytes", self.remaining())))
        }
    }
}

/// Types that cross the process boundary.
pub trait Wire: Sized {
    fn encode(&self, w: &mut MessageWriter) -> FlowResult<()>;

    fn decode(r: &mut MessageReader) -> FlowResult<Self>;

    fn to_bytes_with(&self, convert: Convert) -> FlowResult<Vec<u8>> {
        let mut w = MessageWriter::new(convert);
        self.encode(&mut w)?;
        Ok(w.finish())
    }

    fn to_bytes(&self) -> FlowResult<Vec<u8>> {
        self.to_bytes_with(Convert::native())
    }

    fn from_bytes(bytes: &[u8]) -> FlowResult<Self> {
        let mut r = MessageReader::new(bytes)?;
        let value = Self::decode(&mut r)?;
        r.expect_end()?;
        Ok(value)
    }
}

impl Wire for Vec<f64> {
    fn encode(&self, w: &mut MessageWriter) -> FlowResult<()> {
        w.write_len(self.len())?;
        for &v in self {
            w.write_double(v);
        }
        Ok(())
    }

    fn decode(r: &mut MessageReader) -> FlowResult<Self> {
        let n = r.read_len()?;
        r.ensure_available(n, 8)?;
        (0..n).map(|_| r.read_double()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_follows_writer_order() {
        for convert in [Convert::B32, Convert::B64, Convert::L32, Convert::L64] {
            let bytes = vec![1.0, -2.5, f64::INFINITY].to_bytes_with(convert).unwrap();
            assert_eq!(bytes[0], convert.tag());
            let back = Vec::<f64>::from_bytes(&bytes).unwrap();
            assert_eq!(back, vec![1.0, -2.5, f64::INFINITY]);
        }
    }

    #[test]
    fn test_truncated_buffer() {
        let bytes = vec![1.0, 2.0].to_bytes().unwrap();
        let err = Vec::<f64>::from_bytes(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, FlowError::Wire(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_lying_length_rejected() {
        let mut w = MessageWriter::native();
        w.write_len(1_000_000).unwrap();
        w.write_double(1.0);
        assert!(Vec::<f64>::from_bytes(&w.finish()).is_err());
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = Vec::<f64>::new().to_bytes().unwrap();
        bytes.push(0);
        assert!(Vec::<f64>::from_bytes(&bytes).is_err());
        assert!(MessageReader::new(&[]).is_err());
    }

    #[test]
    fn test_mixed_fields() {
        let mut w = MessageWriter::new(Convert::B32);
        w.write_int(-7);
        w.write_long(123_456).unwrap();
        w.write_float(0.5);
        let bytes = w.finish();

        let mut r = MessageReader::new(&bytes).unwrap();
        assert_eq!(r.convert(), Convert::B32);
        assert_eq!(r.read_int().unwrap(), -7);
        assert_eq!(r.read_long().unwrap(), 123_456);
        assert_eq!(r.read_float().unwrap(), 0.5);
        r.expect_end().unwrap();
    }
}
