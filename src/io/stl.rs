use std::io::Write;

use crate::core::scene::ProcessedOutput;
use crate::core::shared::ConfigType;

#[remain::sorted]
#[derive(Debug, thiserror::Error)]
pub enum Err {
    #[error("Nothing to write, the output has no mesh parts.")]
    EmptyOutput,
    #[error("Mesh part {0} does not hold whole triangles.")]
    PartialTriangle(usize),
    #[error("std io Error: {0}")]
    StdIoError(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Prefix of every solid name. Part `i` is written as `{solid_name}_{i}`.
    pub solid_name: String,
}

impl ConfigType for Config {
    fn default() -> Self {
        Self {
            solid_name: "model".to_string(),
        }
    }
}

/// Writes every part as its own ASCII STL solid. Facet normals are left at zero.
pub struct StlWriter {
    cfg: Config,
}

impl StlWriter {
    pub fn new(cfg: Config) -> Self {
        Self { cfg }
    }

    pub fn write(&self, output: &ProcessedOutput, buf_out: &mut Vec<u8>) -> Result<(), Err> {
        if output.parts.is_empty() {
            return Err(Err::EmptyOutput);
        }

        for (i, part) in output.parts.iter().enumerate() {
            if part.positions.len() % 9 != 0 {
                return Err(Err::PartialTriangle(i));
            }
            let name = format!("{}_{}", self.cfg.solid_name, i);
            writeln!(buf_out, "solid {}", name)?;
            for triangle in part.positions.chunks_exact(9) {
                writeln!(buf_out, "facet normal 0.0 0.0 0.0")?;
                writeln!(buf_out, "  outer loop")?;
                for v in triangle.chunks_exact(3) {
                    writeln!(buf_out, "    vertex {:.9} {:.9} {:.9}", v[0], v[1], v[2])?;
                }
                writeln!(buf_out, "  endloop")?;
                writeln!(buf_out, "endfacet")?;
            }
            writeln!(buf_out, "endsolid {}", name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scene::MeshPart;

    #[test]
    fn one_solid_per_part() {
        let mut output = ProcessedOutput::new();
        for _ in 0..2 {
            let mut part = MeshPart::new();
            for p in [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.5, 0.25]] {
                part.push_corner(p, [0.0, 0.0, 1.0], None);
            }
            output.push_part(part);
        }

        let mut buf = Vec::new();
        StlWriter::new(Config::default()).write(&output, &mut buf).unwrap();
        let doc = String::from_utf8(buf).unwrap();
        assert!(doc.starts_with("solid model_0\nfacet normal 0.0 0.0 0.0\n  outer loop\n"));
        assert!(doc.contains("    vertex 0.000000000 0.500000000 0.250000000\n"));
        assert!(doc.contains("endsolid model_0\nsolid model_1\n"));
        assert_eq!(doc.matches("endfacet").count(), 2);
    }

    #[test]
    fn rejects_partial_triangles() {
        let mut output = ProcessedOutput::new();
        output.push_part(MeshPart {
            positions: vec![0.0; 6],
            normals: vec![0.0; 6],
            texcoords: Vec::new(),
        });
        let mut buf = Vec::new();
        let err = StlWriter::new(Config::default()).write(&output, &mut buf).unwrap_err();
        assert!(matches!(err, Err::PartialTriangle(0)));
    }
}
