use std::fmt::Debug;

/// Index of a texture plate within a processed output.
pub type PlateIdx = usize;

/// Index of a mesh part within a processed output.
pub type PartIdx = usize;

pub trait ConfigType {
    fn default() -> Self;
}

/// Scalar type a decoded vertex component can be promoted to.
pub trait DataValue: Copy + Default + Debug + PartialEq + PartialOrd {
    fn from_i16(value: i16) -> Self;
    fn from_f32(value: f32) -> Self;
}

impl DataValue for f32 {
    fn from_i16(value: i16) -> Self {
        value as f32
    }
    fn from_f32(value: f32) -> Self {
        value
    }
}

impl DataValue for f64 {
    fn from_i16(value: i16) -> Self {
        value as f64
    }
    fn from_f32(value: f32) -> Self {
        value as f64
    }
}

/// Reads a fixed-size, null-terminated string field. Bytes after the first null are ignored;
/// a field without a null terminator is taken whole.
pub(crate) fn read_fixed_str(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_str_stops_at_null() {
        let mut field = [0_u8; 16];
        field[..5].copy_from_slice(b"hello");
        field[6] = b'x';
        assert_eq!(read_fixed_str(&field), "hello");
    }

    #[test]
    fn fixed_str_without_null() {
        assert_eq!(read_fixed_str(b"abcd"), "abcd");
    }

    #[test]
    fn promote_shorts() {
        assert_eq!(f64::from_i16(-32768), -32768.0);
        assert_eq!(f32::from_f32(0.25), 0.25);
    }
}
