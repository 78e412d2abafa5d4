use std::fmt;
use std::str::FromStr;

use crate::core::bit_coder::{ByteReader, SliceReader};
use crate::core::shared::DataValue;

#[remain::sorted]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Err {
    #[error("Unsupported vertex format: {0}")]
    UnsupportedVertexFormat(String),
    #[error("Vertex stride must be non-zero.")]
    ZeroStride,
}

/// Record layouts a vertex element can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Short2,
    Short4,
    Float2,
    Float4,
}

impl VertexFormat {
    pub const SHORT2_TAG: &'static str = "_vertex_format_attribute_short2";
    pub const SHORT4_TAG: &'static str = "_vertex_format_attribute_short4";
    pub const FLOAT2_TAG: &'static str = "_vertex_format_attribute_float2";
    pub const FLOAT4_TAG: &'static str = "_vertex_format_attribute_float4";

    pub fn as_tag(self) -> &'static str {
        match self {
            VertexFormat::Short2 => Self::SHORT2_TAG,
            VertexFormat::Short4 => Self::SHORT4_TAG,
            VertexFormat::Float2 => Self::FLOAT2_TAG,
            VertexFormat::Float4 => Self::FLOAT4_TAG,
        }
    }

    /// Number of components per record.
    pub fn width(self) -> usize {
        match self {
            VertexFormat::Short2 | VertexFormat::Float2 => 2,
            VertexFormat::Short4 | VertexFormat::Float4 => 4,
        }
    }

    /// Size of one record in bytes.
    pub fn record_len(self) -> usize {
        match self {
            VertexFormat::Short2 => 4,
            VertexFormat::Short4 | VertexFormat::Float2 => 8,
            VertexFormat::Float4 => 16,
        }
    }

    fn read_component<T: DataValue>(self, reader: &mut SliceReader<'_>) -> T {
        // Callers check that a full record fits before reading it.
        match self {
            VertexFormat::Short2 | VertexFormat::Short4 => {
                T::from_i16(reader.read_i16().unwrap_or_default())
            }
            VertexFormat::Float2 | VertexFormat::Float4 => {
                T::from_f32(reader.read_f32().unwrap_or_default())
            }
        }
    }
}

impl FromStr for VertexFormat {
    type Err = Err;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag {
            Self::SHORT2_TAG => Ok(VertexFormat::Short2),
            Self::SHORT4_TAG => Ok(VertexFormat::Short4),
            Self::FLOAT2_TAG => Ok(VertexFormat::Float2),
            Self::FLOAT4_TAG => Ok(VertexFormat::Float4),
            _ => Err(Err::UnsupportedVertexFormat(tag.to_string())),
        }
    }
}

impl fmt::Display for VertexFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// Decoded records of a vertex element, stored flat with a fixed number of components per record.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexStream<T> {
    width: usize,
    values: Vec<T>,
}

impl<T: DataValue> VertexStream<T> {
    pub fn empty(width: usize) -> Self {
        Self { width, values: Vec::new() }
    }

    /// Number of components per record.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        if self.width == 0 {
            0
        } else {
            self.values.len() / self.width
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, idx: usize) -> Option<&[T]> {
        let start = idx.checked_mul(self.width)?;
        self.values.get(start..start.checked_add(self.width)?)
    }
}

/// Decodes every record of `format` found at `offset`, `offset + stride`, ... while a full record
/// still fits in `buffer`.
pub fn decode_as<T: DataValue>(
    buffer: &[u8],
    format: VertexFormat,
    offset: usize,
    stride: usize,
) -> Result<VertexStream<T>, Err> {
    if stride == 0 {
        return Err(Err::ZeroStride);
    }
    let width = format.width();
    let record_len = format.record_len();
    let num_records = match offset.checked_add(record_len) {
        Some(end) if end <= buffer.len() => (buffer.len() - end) / stride + 1,
        _ => 0,
    };

    let mut values = Vec::with_capacity(num_records * width);
    for i in 0..num_records {
        let mut reader = SliceReader::new_at(buffer, offset + i * stride);
        for _ in 0..width {
            values.push(format.read_component::<T>(&mut reader));
        }
    }
    Ok(VertexStream { width, values })
}

/// Decodes a vertex element identified by its format tag, promoting components to `f64`.
pub fn decode(
    buffer: &[u8],
    format: &str,
    offset: usize,
    stride: usize,
) -> Result<VertexStream<f64>, Err> {
    decode_as(buffer, format.parse()?, offset, stride)
}

/// Decodes a 2-wide texture coordinate element, promoting components to `f32`.
pub fn decode_tex_coords(
    buffer: &[u8],
    format: &str,
    offset: usize,
    stride: usize,
) -> Result<VertexStream<f32>, Err> {
    match format.parse()? {
        f @ (VertexFormat::Short2 | VertexFormat::Float2) => decode_as(buffer, f, offset, stride),
        _ => Err(Err::UnsupportedVertexFormat(format.to_string())),
    }
}

/// Maps a signed 16-bit texture coordinate onto `[-1, 1]`.
pub fn normalize16(value: f32) -> f32 {
    (value / i16::MAX as f32).max(-1.0)
}
