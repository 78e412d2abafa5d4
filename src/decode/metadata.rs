//! Typed view of the `render_metadata.js` payload found in geometry bundles.
//! Keys not listed here are ignored.

use serde::Deserialize;

use crate::core::texture::PlateKind;

#[remain::sorted]
#[derive(Debug, thiserror::Error)]
pub enum Err {
    #[error("Render metadata is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

pub fn parse(bytes: &[u8]) -> Result<RenderMetadata, Err> {
    Ok(serde_json::from_slice(bytes)?)
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RenderMetadata {
    pub render_model: RenderModel,
    #[serde(default)]
    pub texture_plates: Vec<TexturePlates>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RenderModel {
    #[serde(default)]
    pub render_meshes: Vec<RenderMesh>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RenderMesh {
    #[serde(default)]
    pub vertex_buffers: Vec<VertexBufferRef>,
    #[serde(default)]
    pub stage_part_vertex_stream_layout_definitions: Vec<LayoutDefinition>,
    pub index_buffer: BufferRef,
    #[serde(default)]
    pub stage_part_list: Vec<StagePart>,
    #[serde(default)]
    pub texcoord_offset: [f64; 2],
    #[serde(default = "unit_scale")]
    pub texcoord_scale: [f64; 2],
}

impl RenderMesh {
    /// Vertex stream formats of the first layout definition, paired by index with
    /// `vertex_buffers`.
    pub fn stream_formats(&self) -> &[StreamFormat] {
        self.stage_part_vertex_stream_layout_definitions
            .first()
            .map(|d| d.formats.as_slice())
            .unwrap_or(&[])
    }
}

fn unit_scale() -> [f64; 2] {
    [1.0, 1.0]
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VertexBufferRef {
    pub file_name: String,
    pub stride_byte_size: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BufferRef {
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LayoutDefinition {
    #[serde(default)]
    pub formats: Vec<StreamFormat>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StreamFormat {
    pub stride: usize,
    #[serde(default)]
    pub elements: Vec<VertexElement>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VertexElement {
    #[serde(rename = "type")]
    pub format: String,
    pub semantic: String,
    #[serde(default)]
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StagePart {
    pub start_index: usize,
    pub index_count: usize,
    pub primitive_type: i64,
    #[serde(default)]
    pub lod_category: LodCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct LodCategory {
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TexturePlates {
    pub plate_set: PlateSet,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct PlateSet {
    pub diffuse: Option<PlateDescription>,
    pub normal: Option<PlateDescription>,
    pub gearstack: Option<PlateDescription>,
}

impl PlateSet {
    pub fn get(&self, kind: PlateKind) -> Option<&PlateDescription> {
        match kind {
            PlateKind::Diffuse => self.diffuse.as_ref(),
            PlateKind::Normal => self.normal.as_ref(),
            PlateKind::Gearstack => self.gearstack.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlateDescription {
    pub plate_index: usize,
    #[serde(default)]
    pub plate_size: Vec<u32>,
    #[serde(default)]
    pub texture_placements: Vec<TexturePlacement>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TexturePlacement {
    pub texture_size_x: u32,
    pub texture_size_y: u32,
    pub position_x: u32,
    pub position_y: u32,
    pub texture_tag_name: String,
}
