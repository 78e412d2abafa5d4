use crate::core::scene::ProcessedOutput;
use crate::core::shared::ConfigType;
use crate::io::container::{Container, RENDER_METADATA_FILE};
use crate::io::texture_io::TextureSource;

pub mod metadata;
pub mod mesh;
pub mod plate;
pub mod vertex;

/// Reconstructs every mesh of a geometry bundle and composites its texture plates into `output`.
///
/// A mesh entry that fails to reconstruct is logged, recorded in the returned report and skipped;
/// the remaining entries are still processed. Missing or malformed render metadata and plate errors
/// abort the bundle, in which case none of its parts are added to `output`. Plates composited
/// before a plate error stay in their tables.
pub fn process_geometry(
    container: &Container,
    source: &dyn TextureSource,
    output: &mut ProcessedOutput,
    cfg: &Config,
) -> Result<GeometryReport, Err> {
    let file = container
        .get_file(&cfg.metadata_file_name)
        .ok_or_else(|| Err::MissingMetadata(cfg.metadata_file_name.clone()))?;
    let metadata = metadata::parse(file.data)?;
    tracing::info!("Successfully parsed render metadata of {}", container.name());

    let meshes = &metadata.render_model.render_meshes;
    tracing::info!("Found {} meshes", meshes.len());

    let mut parts = Vec::new();
    let mut report = GeometryReport::default();
    for (mesh_index, mesh) in meshes.iter().enumerate() {
        match mesh::reconstruct(mesh, container, cfg) {
            Ok(mesh_parts) => parts.extend(mesh_parts),
            Err(error) => {
                let name = container.name();
                tracing::error!("Failed to process mesh {} of {}: {}", mesh_index, name, error);
                report.failed_meshes.push(MeshFailure { mesh_index, error });
            }
        }
    }

    let plate_index = plate::composite(&metadata.texture_plates, source, output)?;

    let first_new = output.num_parts();
    report.parts_added = parts.len();
    for part in parts {
        output.push_part(part);
    }
    output.assign_plate_from(first_new, plate_index);
    tracing::info!("Position length: {}", output.num_parts());
    tracing::info!("Found plate indices: {:?}", output.plate_index_of);

    Ok(report)
}

/// Runs `process_geometry` over several bundles of the same asset into one output. Stops at the
/// first bundle that fails; bundles processed before it stay in `output`.
pub fn process_geometries(
    containers: &[Container],
    source: &dyn TextureSource,
    output: &mut ProcessedOutput,
    cfg: &Config,
) -> Result<Vec<GeometryReport>, Err> {
    containers
        .iter()
        .map(|c| process_geometry(c, source, output, cfg))
        .collect()
}

/// Outcome of processing one geometry bundle.
#[derive(Debug, Clone, Default)]
pub struct GeometryReport {
    pub parts_added: usize,
    pub failed_meshes: Vec<MeshFailure>,
}

impl GeometryReport {
    pub fn is_complete(&self) -> bool {
        self.failed_meshes.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct MeshFailure {
    pub mesh_index: usize,
    pub error: mesh::Err,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Fail on unsupported vertex formats instead of treating the element as absent.
    pub strict_vertex_formats: bool,
    /// Stage parts with a coarser lod category are dropped.
    pub max_lod_category: i64,
    pub metadata_file_name: String,
}

impl ConfigType for Config {
    fn default() -> Self {
        Self {
            strict_vertex_formats: false,
            max_lod_category: 1,
            metadata_file_name: RENDER_METADATA_FILE.to_string(),
        }
    }
}

#[remain::sorted]
#[derive(thiserror::Error, Debug)]
pub enum Err {
    #[error("Render metadata error: {0}")]
    MetadataError(#[from] metadata::Err),
    #[error("Geometry bundle has no '{0}' file.")]
    MissingMetadata(String),
    #[error("Texture plate error: {0}")]
    PlateError(#[from] plate::Err),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bit_coder::ByteWriter;
    use crate::io::container::{self, ContainerWriter};
    use crate::io::texture_io::MemoryTextureSource;
    use serde_json::json;

    fn bundle(metadata: serde_json::Value) -> Container {
        let mut vb = Vec::new();
        for v in [[0_i16, 0, 0], [1, 0, 0], [0, 1, 0]] {
            for c in [v[0], v[1], v[2], 0, 0, 0, 1, 0] {
                vb.write_u16(c as u16);
            }
        }
        let mut ib = Vec::new();
        for i in [0_i16, 1, 2] {
            ib.write_u16(i as u16);
        }
        let mut writer = ContainerWriter::new(*b"tgxm", "geometry");
        writer
            .add_file(RENDER_METADATA_FILE, metadata.to_string().into_bytes())
            .add_file("vb0", vb)
            .add_file("ib0", ib);
        container::parse(writer.write()).unwrap()
    }

    fn mesh(stride: usize) -> serde_json::Value {
        json!({
            "vertex_buffers": [{ "file_name": "vb0", "stride_byte_size": stride }],
            "stage_part_vertex_stream_layout_definitions": [{
                "formats": [{
                    "stride": 16,
                    "elements": [
                        {
                            "type": "_vertex_format_attribute_short4",
                            "semantic": "_tfx_vb_semantic_position",
                            "offset": 0
                        },
                        {
                            "type": "_vertex_format_attribute_short4",
                            "semantic": "_tfx_vb_semantic_normal",
                            "offset": 8
                        }
                    ]
                }]
            }],
            "index_buffer": { "file_name": "ib0" },
            "stage_part_list": [{ "start_index": 0, "index_count": 3, "primitive_type": 3 }]
        })
    }

    #[test]
    fn failing_mesh_does_not_stop_others() {
        let container = bundle(json!({
            "render_model": { "render_meshes": [mesh(16), mesh(12), mesh(16)] },
            "texture_plates": [{
                "plate_set": { "diffuse": { "plate_index": 0, "plate_size": [4, 4] } }
            }]
        }));
        let mut output = ProcessedOutput::new();
        let source = MemoryTextureSource::new();
        let report =
            process_geometry(&container, &source, &mut output, &Config::default()).unwrap();
        assert_eq!(report.parts_added, 2);
        assert_eq!(report.failed_meshes.len(), 1);
        assert_eq!(report.failed_meshes[0].mesh_index, 1);
        assert!(!report.is_complete());
        assert_eq!(output.plate_index_of, vec![Some(0), Some(0)]);
        let plate = output.plate(crate::core::texture::PlateKind::Diffuse, 0).unwrap();
        assert_eq!(plate.name(), "blank-0_diffuse.png");
    }

    #[test]
    fn geometries_share_one_output() {
        let first = bundle(json!({
            "render_model": { "render_meshes": [mesh(16)] },
            "texture_plates": [{
                "plate_set": { "diffuse": { "plate_index": 0, "plate_size": [4, 4] } }
            }]
        }));
        let second = bundle(json!({
            "render_model": { "render_meshes": [mesh(16)] }
        }));
        let mut output = ProcessedOutput::new();
        let source = MemoryTextureSource::new();
        let reports =
            process_geometries(&[first, second], &source, &mut output, &Config::default()).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(output.plate_index_of, vec![Some(0), None]);
    }

    #[test]
    fn plate_error_adds_no_parts() {
        let first = bundle(json!({
            "render_model": { "render_meshes": [mesh(16)] }
        }));
        let broken = bundle(json!({
            "render_model": { "render_meshes": [mesh(16), mesh(16)] },
            "texture_plates": [{
                "plate_set": { "diffuse": { "plate_index": 0, "plate_size": [4] } }
            }]
        }));
        let mut output = ProcessedOutput::new();
        let source = MemoryTextureSource::new();
        let err = process_geometries(&[first, broken], &source, &mut output, &Config::default())
            .unwrap_err();
        assert!(matches!(err, Err::PlateError(plate::Err::InvalidPlateSize { .. })));
        assert_eq!(output.num_parts(), 1);
        assert_eq!(output.plate_index_of, vec![None]);
    }

    #[test]
    fn missing_metadata() {
        let mut writer = ContainerWriter::new(*b"tgxm", "geometry");
        writer.add_file("vb0", vec![0_u8; 4]);
        let container = container::parse(writer.write()).unwrap();
        let source = MemoryTextureSource::new();
        let mut output = ProcessedOutput::new();
        let err =
            process_geometry(&container, &source, &mut output, &Config::default()).unwrap_err();
        assert!(matches!(err, Err::MissingMetadata(name) if name == RENDER_METADATA_FILE));
    }
}
