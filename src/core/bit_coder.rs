#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReaderErr {
    #[error("Not enough data to read the value.")]
    NotEnoughData,
}

/// Little-endian reader over a byte source.
pub trait ByteReader {
    fn read_u8(&mut self) -> Result<u8, ReaderErr>;
    fn read_u16(&mut self) -> Result<u16, ReaderErr> {
        let out = [
            self.read_u8()?,
            self.read_u8()?
        ];
        Ok(u16::from_le_bytes(out))
    }
    fn read_u32(&mut self) -> Result<u32, ReaderErr> {
        let out = [
            self.read_u8()?,
            self.read_u8()?,
            self.read_u8()?,
            self.read_u8()?
        ];
        Ok(u32::from_le_bytes(out))
    }
    fn read_u64(&mut self) -> Result<u64, ReaderErr> {
        let lo = self.read_u32()? as u64;
        let hi = self.read_u32()? as u64;
        Ok(lo | (hi << 32))
    }
    fn read_i16(&mut self) -> Result<i16, ReaderErr> {
        Ok(self.read_u16()? as i16)
    }
    fn read_i32(&mut self) -> Result<i32, ReaderErr> {
        Ok(self.read_u32()? as i32)
    }
    fn read_i64(&mut self) -> Result<i64, ReaderErr> {
        Ok(self.read_u64()? as i64)
    }
    fn read_f32(&mut self) -> Result<f32, ReaderErr> {
        Ok(f32::from_bits(self.read_u32()?))
    }
    /// Reads exactly `N` bytes.
    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ReaderErr> {
        let mut out = [0_u8; N];
        for b in out.iter_mut() {
            *b = self.read_u8()?;
        }
        Ok(out)
    }
}

/// Cursor over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct SliceReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn new_at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Borrows the next `len` bytes and advances past them.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8], ReaderErr> {
        if self.remaining() < len {
            return Err(ReaderErr::NotEnoughData);
        }
        let out = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }
}

impl ByteReader for SliceReader<'_> {
    fn read_u8(&mut self) -> Result<u8, ReaderErr> {
        let out = *self.data.get(self.pos).ok_or(ReaderErr::NotEnoughData)?;
        self.pos += 1;
        Ok(out)
    }

    fn read_u16(&mut self) -> Result<u16, ReaderErr> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    fn read_u32(&mut self) -> Result<u32, ReaderErr> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    fn read_u64(&mut self) -> Result<u64, ReaderErr> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ReaderErr> {
        let bytes = self.take(N)?;
        let mut out = [0_u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }
}

/// Little-endian writer.
pub trait ByteWriter: Sized {
    fn write_u8(&mut self, value: u8);
    fn write_u16(&mut self, value: u16) {
        self.write_u8(value as u8);
        self.write_u8((value >> 8) as u8);
    }
    fn write_u32(&mut self, value: u32) {
        self.write_u16(value as u16);
        self.write_u16((value >> 16) as u16);
    }
    fn write_u64(&mut self, value: u64) {
        self.write_u32(value as u32);
        self.write_u32((value >> 32) as u32);
    }
    fn write_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.write_u8(b);
        }
    }
}

impl ByteWriter for Vec<u8> {
    fn write_u8(&mut self, value: u8) {
        self.push(value);
    }

    fn write_u16(&mut self, value: u16) {
        self.extend_from_slice(&value.to_le_bytes());
    }

    fn write_u32(&mut self, value: u32) {
        self.extend_from_slice(&value.to_le_bytes());
    }

    fn write_u64(&mut self, value: u64) {
        self.extend_from_slice(&value.to_le_bytes());
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

/// Writes `value` into a fixed-size field, padding with nulls. The value is truncated so that
/// at least one terminating null remains.
pub fn write_fixed_str<W: ByteWriter>(writer: &mut W, value: &str, field_len: usize) {
    let bytes = value.as_bytes();
    let len = bytes.len().min(field_len.saturating_sub(1));
    writer.write_bytes(&bytes[..len]);
    for _ in len..field_len {
        writer.write_u8(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_write_little_endian() {
        let mut buf = Vec::new();
        buf.write_u16(0xBEEF);
        buf.write_u32(0xDEADBEEF);
        buf.write_u64(u64::MAX - 1);
        assert_eq!(&buf[..2], &[0xEF, 0xBE]);

        let mut reader = SliceReader::new(&buf);
        assert_eq!(reader.read_u16().unwrap(), 0xBEEF);
        assert_eq!(reader.read_u32().unwrap(), 0xDEADBEEF);
        assert_eq!(reader.read_i64().unwrap(), -2);
        assert_eq!(reader.remaining(), 0);
        assert_eq!(reader.read_u8(), Err(ReaderErr::NotEnoughData));
    }

    #[test]
    fn signed_and_float() {
        let mut buf = Vec::new();
        buf.write_u16((-2_i16) as u16);
        buf.write_u32(1.5_f32.to_bits());
        let mut reader = SliceReader::new(&buf);
        assert_eq!(reader.read_i16().unwrap(), -2);
        assert_eq!(reader.read_f32().unwrap(), 1.5);
    }

    #[test]
    fn take_does_not_advance_on_failure() {
        let data = [1_u8, 2, 3];
        let mut reader = SliceReader::new(&data);
        assert!(reader.take(4).is_err());
        assert_eq!(reader.position(), 0);
        assert_eq!(reader.take(2).unwrap(), &[1, 2]);
    }

    #[test]
    fn fixed_str_is_null_padded() {
        let mut buf = Vec::new();
        write_fixed_str(&mut buf, "abc", 8);
        assert_eq!(buf, b"abc\0\0\0\0\0");

        let mut buf = Vec::new();
        write_fixed_str(&mut buf, "abcdefgh", 4);
        assert_eq!(buf, b"abc\0");
    }
}
