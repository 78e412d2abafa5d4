use std::collections::BTreeMap;

use crate::core::material::PbrChannelSet;
use crate::core::shared::{PartIdx, PlateIdx};
use crate::core::texture::{PlateKind, PlateTable, TexturePlate};

/// One reconstructed sub-mesh with fully expanded per-corner streams.
///
/// `positions` and `normals` hold three components per corner and three corners per triangle, so
/// both always have a length divisible by 9. `texcoords` holds two components per corner, or is
/// empty when the mesh carried no texture coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshPart {
    pub positions: Vec<f64>,
    pub normals: Vec<f64>,
    pub texcoords: Vec<f32>,
}

impl MeshPart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_triangles(&self) -> usize {
        self.positions.len() / 9
    }

    pub fn num_corners(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn has_texcoords(&self) -> bool {
        !self.texcoords.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Positions and normals match and hold whole triangles, and texcoords are absent or cover
    /// every corner.
    pub fn is_well_formed(&self) -> bool {
        let texcoords_ok =
            self.texcoords.is_empty() || self.texcoords.len() * 3 == self.positions.len() * 2;
        self.positions.len() == self.normals.len() && self.positions.len() % 9 == 0 && texcoords_ok
    }

    pub(crate) fn push_corner(
        &mut self,
        position: [f64; 3],
        normal: [f64; 3],
        texcoord: Option<[f32; 2]>,
    ) {
        self.positions.extend_from_slice(&position);
        self.normals.extend_from_slice(&normal);
        if let Some(texcoord) = texcoord {
            self.texcoords.extend_from_slice(&texcoord);
        }
    }
}

/// Everything one asset run produces: mesh parts, their plate assignment and the plate tables.
/// Writers only ever read from it.
#[derive(Debug, Clone, Default)]
pub struct ProcessedOutput {
    pub parts: Vec<MeshPart>,
    /// Parallel to `parts`.
    pub plate_index_of: Vec<Option<PlateIdx>>,
    pub diffuse: PlateTable,
    pub normal: PlateTable,
    pub gearstack: PlateTable,
    /// Filled when gearstack plates are exploded for output.
    pub pbr: BTreeMap<PlateIdx, PbrChannelSet>,
}

impl ProcessedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_parts(&self) -> usize {
        self.parts.len()
    }

    /// Appends a part that has not been assigned a plate yet.
    pub fn push_part(&mut self, part: MeshPart) -> PartIdx {
        self.parts.push(part);
        self.plate_index_of.push(None);
        self.parts.len() - 1
    }

    /// Assigns `plate_index` to every part from `first` onwards.
    pub fn assign_plate_from(&mut self, first: PartIdx, plate_index: Option<PlateIdx>) {
        for slot in self.plate_index_of.iter_mut().skip(first) {
            *slot = plate_index;
        }
    }

    pub fn plates(&self, kind: PlateKind) -> &PlateTable {
        match kind {
            PlateKind::Diffuse => &self.diffuse,
            PlateKind::Normal => &self.normal,
            PlateKind::Gearstack => &self.gearstack,
        }
    }

    pub fn plates_mut(&mut self, kind: PlateKind) -> &mut PlateTable {
        match kind {
            PlateKind::Diffuse => &mut self.diffuse,
            PlateKind::Normal => &mut self.normal,
            PlateKind::Gearstack => &mut self.gearstack,
        }
    }

    pub fn plate(&self, kind: PlateKind, plate_index: PlateIdx) -> Option<&TexturePlate> {
        self.plates(kind).get(&plate_index)
    }

    /// The diffuse plate assigned to a part, if any.
    pub fn plate_of_part(&self, part: PartIdx) -> Option<&TexturePlate> {
        let plate_index = (*self.plate_index_of.get(part)?)?;
        self.diffuse.get(&plate_index)
    }
}
