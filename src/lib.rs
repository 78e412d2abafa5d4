// lib.rs

/// Contains the container parser and the writers for COLLADA, USD, STL and texture files.
pub mod io;

/// Defines the geometry decoders: vertex codec, render metadata, mesh reconstruction and
/// texture plate compositing.
pub mod decode;

/// Contains the shared definitions, the byte coders and the processed output.
pub mod core;

/// Contains the most commonly used traits, types, and objects.
pub mod prelude {
    pub use crate::core::bit_coder::{ByteReader, ByteWriter, SliceReader};
    pub use crate::core::material::{explode, PbrChannelSet, PbrConfig};
    pub use crate::core::scene::{MeshPart, ProcessedOutput};
    pub use crate::core::shared::ConfigType;
    pub use crate::core::texture::{ImageFormat, PlateKind, TexturePlate};
    pub use crate::decode::{self, process_geometries, process_geometry, GeometryReport};
    pub use crate::io::collada::ColladaWriter;
    pub use crate::io::container::{self, Container, ContainerWriter};
    pub use crate::io::stl::StlWriter;
    pub use crate::io::texture_io::{DirTextureSource, MemoryTextureSource, TextureSource};
    pub use crate::io::usd::UsdWriter;
}
