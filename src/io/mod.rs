/// Binary container parsing and writing.
pub mod container;

/// Texture lookup, sniffing and raster output.
pub mod texture_io;

pub mod collada;
pub mod stl;
pub mod usd;
