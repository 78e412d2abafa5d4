use crate::core::scene::MeshPart;
use crate::core::shared::DataValue;
use crate::decode::metadata::{RenderMesh, StagePart};
use crate::decode::vertex::{self, normalize16, VertexFormat, VertexStream};
use crate::decode::Config;
use crate::io::container::Container;

pub const SEMANTIC_POSITION: &str = "_tfx_vb_semantic_position";
pub const SEMANTIC_NORMAL: &str = "_tfx_vb_semantic_normal";
pub const SEMANTIC_TEXCOORD: &str = "_tfx_vb_semantic_texcoord";

/// Independent triangles, three indices each.
pub const PRIMITIVE_TRIANGLE_LIST: i64 = 3;
/// Triangle strip, one new index per triangle.
pub const PRIMITIVE_TRIANGLE_STRIP: i64 = 5;

#[remain::sorted]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Err {
    #[error("Index buffer slot {index} is outside the index buffer of length {len}.")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("The {semantic} stream has {width} components per vertex, but 3 are required.")]
    InsufficientComponents { semantic: &'static str, width: usize },
    #[error("Vertex buffer {index} has no matching stream layout.")]
    MissingLayout { index: usize },
    #[error("Missing geometry file by name: {0}")]
    MissingNamedFile(String),
    #[error("Index value {value} is outside the positions array of length {len}.")]
    PositionIndexOutOfBounds { value: i64, len: usize },
    #[error("Vertex buffer {index} has stride {buffer} but its layout declares stride {layout}.")]
    StrideMismatch { index: usize, layout: usize, buffer: usize },
    #[error("Index value {value} is outside the texture coordinate array of length {len}.")]
    TexcoordIndexOutOfBounds { value: i64, len: usize },
    #[error("Positions ({positions}) and normals ({normals}) must be non-empty and equally long.")]
    VertexArrayMismatch { positions: usize, normals: usize },
    #[error("Vertex decoding error: {0}")]
    VertexError(#[from] vertex::Err),
}

/// Per-vertex streams gathered from every vertex buffer of a mesh.
#[derive(Debug, Clone)]
struct MeshStreams {
    positions: VertexStream<f64>,
    normals: VertexStream<f64>,
    texcoords: VertexStream<f32>,
    adjustments: VertexStream<f32>,
}

/// Per-mesh texture coordinate transform.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TexcoordTransform {
    offset: [f64; 2],
    scale: [f64; 2],
}

/// Reconstructs every retained stage part of `mesh`. Any error aborts the whole mesh, so either all
/// of its parts are returned or none.
pub fn reconstruct(
    mesh: &RenderMesh,
    container: &Container,
    cfg: &Config,
) -> Result<Vec<MeshPart>, Err> {
    let streams = read_streams(mesh, container, cfg)?;
    let index_buffer = read_index_buffer(&mesh.index_buffer.file_name, container)?;
    let transform = TexcoordTransform {
        offset: mesh.texcoord_offset,
        scale: mesh.texcoord_scale,
    };
    tracing::debug!("Found texcoord offsets: {:?}", transform.offset);
    tracing::debug!("Found texcoord scales: {:?}", transform.scale);

    let stage_parts = &mesh.stage_part_list;
    tracing::info!("Found {} stage parts", stage_parts.len());

    let mut parts = Vec::new();
    for (i, part) in stage_parts.iter().enumerate() {
        if is_duplicate(&stage_parts[..i], part) {
            tracing::debug!("Skipping duplicated stage part {}", i);
            continue;
        }
        if part.lod_category.value > cfg.max_lod_category {
            let lod = part.lod_category.value;
            tracing::debug!("Skipping stage part {} with lod category {}", i, lod);
            continue;
        }
        if let Some(out) = triangulate(part, &index_buffer, &streams, transform)? {
            parts.push(out);
        }
    }
    Ok(parts)
}

/// A stage part repeats an earlier one when either its start index or its index count matches.
fn is_duplicate(earlier: &[StagePart], part: &StagePart) -> bool {
    earlier
        .iter()
        .any(|p| p.start_index == part.start_index || p.index_count == part.index_count)
}

fn read_streams(
    mesh: &RenderMesh,
    container: &Container,
    cfg: &Config,
) -> Result<MeshStreams, Err> {
    let mut positions = VertexStream::empty(4);
    let mut normals = VertexStream::empty(4);
    let mut texcoords = VertexStream::empty(2);
    let mut adjustments = VertexStream::empty(2);

    let layouts = mesh.stream_formats();
    for (index, vertex_buffer) in mesh.vertex_buffers.iter().enumerate() {
        let layout = layouts.get(index).ok_or(Err::MissingLayout { index })?;
        if layout.stride != vertex_buffer.stride_byte_size {
            return Err(Err::StrideMismatch {
                index,
                layout: layout.stride,
                buffer: vertex_buffer.stride_byte_size,
            });
        }

        let data = container
            .get_file(&vertex_buffer.file_name)
            .ok_or_else(|| Err::MissingNamedFile(vertex_buffer.file_name.clone()))?
            .data;
        tracing::info!("Reading data from file: {}", vertex_buffer.file_name);

        for element in &layout.elements {
            let (format, offset, stride) = (element.format.as_str(), element.offset, layout.stride);
            match element.semantic.as_str() {
                SEMANTIC_POSITION => {
                    positions = tolerate(vertex::decode(data, format, offset, stride), 4, cfg)?;
                    tracing::debug!("Found positions: {}", positions.len());
                }
                SEMANTIC_NORMAL => {
                    normals = tolerate(vertex::decode(data, format, offset, stride), 4, cfg)?;
                    tracing::debug!("Found normals: {}", normals.len());
                }
                SEMANTIC_TEXCOORD if format == VertexFormat::FLOAT2_TAG => {
                    let decoded = vertex::decode_tex_coords(data, format, offset, stride);
                    adjustments = tolerate(decoded, 2, cfg)?;
                    tracing::debug!("Found adjustments: {}", adjustments.len());
                }
                SEMANTIC_TEXCOORD => {
                    let decoded = vertex::decode_tex_coords(data, format, offset, stride);
                    texcoords = tolerate(decoded, 2, cfg)?;
                    tracing::debug!("Found texcoords: {}", texcoords.len());
                }
                other => tracing::warn!("Unhandled semantic: {}", other),
            }
        }
    }

    if positions.is_empty() || normals.is_empty() || positions.len() != normals.len() {
        return Err(Err::VertexArrayMismatch {
            positions: positions.len(),
            normals: normals.len(),
        });
    }
    for (semantic, stream) in [(SEMANTIC_POSITION, &positions), (SEMANTIC_NORMAL, &normals)] {
        if stream.width() < 3 {
            return Err(Err::InsufficientComponents { semantic, width: stream.width() });
        }
    }

    Ok(MeshStreams { positions, normals, texcoords, adjustments })
}

/// Downgrades an unsupported vertex format to an empty stream unless strict decoding is requested.
fn tolerate<T: DataValue>(
    result: Result<VertexStream<T>, vertex::Err>,
    width: usize,
    cfg: &Config,
) -> Result<VertexStream<T>, Err> {
    match result {
        Err(vertex::Err::UnsupportedVertexFormat(format)) if !cfg.strict_vertex_formats => {
            tracing::warn!("Found unknown vertex type: {}", format);
            Ok(VertexStream::empty(width))
        }
        other => Ok(other?),
    }
}

fn read_index_buffer(file_name: &str, container: &Container) -> Result<Vec<i16>, Err> {
    let data = container
        .get_file(file_name)
        .ok_or_else(|| Err::MissingNamedFile(file_name.to_string()))?
        .data;
    Ok(data
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]))
        .collect())
}

/// Expands one stage part into a mesh part. Returns `None` for primitive types other than
/// triangle lists and strips.
fn triangulate(
    part: &StagePart,
    index_buffer: &[i16],
    streams: &MeshStreams,
    transform: TexcoordTransform,
) -> Result<Option<MeshPart>, Err> {
    let start = part.start_index;
    let (count, step) = match part.primitive_type {
        PRIMITIVE_TRIANGLE_LIST => (part.index_count, 3),
        PRIMITIVE_TRIANGLE_STRIP => (part.index_count.saturating_sub(2), 1),
        other => {
            tracing::warn!("Unknown primitive type {}, skipping this part", other);
            return Ok(None);
        }
    };

    let mut out = MeshPart::new();
    for j in (0..count).step_by(step) {
        let mut slots = [0_usize; 3];
        let mut values = [0_i16; 3];
        for k in 0..3 {
            let index = start + j + k;
            values[k] = *index_buffer.get(index).ok_or_else(|| {
                tracing::error!(
                    "Current index is outside the bounds of the index buffer: want={}, actual={}",
                    index,
                    index_buffer.len()
                );
                Err::IndexOutOfBounds { index, len: index_buffer.len() }
            })?;
            slots[k] = index;
        }

        // lines and points
        if values[0] == values[1] || values[0] == values[2] || values[1] == values[2] {
            continue;
        }

        let order = if part.primitive_type == PRIMITIVE_TRIANGLE_LIST || j & 1 == 1 {
            [2, 1, 0]
        } else {
            [0, 1, 2]
        };
        for k in order {
            push_corner(&mut out, values[k], streams, transform)?;
        }
    }
    Ok(Some(out))
}

fn push_corner(
    out: &mut MeshPart,
    value: i16,
    streams: &MeshStreams,
    transform: TexcoordTransform,
) -> Result<(), Err> {
    let num_positions = streams.positions.len();
    let corner = usize::try_from(value)
        .ok()
        .and_then(|idx| Some((streams.positions.get(idx)?, streams.normals.get(idx)?)));
    let Some((position, normal)) = corner else {
        tracing::error!(
            "Index buffer value is outside the bounds of the positions array: want={}, actual={}",
            value,
            num_positions
        );
        return Err(Err::PositionIndexOutOfBounds { value: value as i64, len: num_positions });
    };

    let texcoord = if streams.texcoords.is_empty() {
        None
    } else {
        Some(texcoord_of(value, streams, transform)?)
    };

    out.push_corner(
        [position[0], position[1], position[2]],
        [normal[0], normal[1], normal[2]],
        texcoord,
    );
    Ok(())
}

fn texcoord_of(
    value: i16,
    streams: &MeshStreams,
    transform: TexcoordTransform,
) -> Result<[f32; 2], Err> {
    // non-negative, checked against the positions first
    let idx = value as usize;
    let raw = streams.texcoords.get(idx).ok_or(Err::TexcoordIndexOutOfBounds {
        value: value as i64,
        len: streams.texcoords.len(),
    })?;
    let adjustment = streams.adjustments.get(idx);

    let mut out = [0.0_f32; 2];
    for l in 0..2 {
        let adjust = adjustment.map(|a| a[l]).unwrap_or(1.0);
        let (scale, offset) = (transform.scale[l] as f32, transform.offset[l] as f32);
        out[l] = normalize16(raw[l]) * scale * adjust + offset;
    }
    Ok(out)
}
