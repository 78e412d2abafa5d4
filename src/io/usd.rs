//! ASCII USD (`.usda`) writer for processed output.

use std::io::Write;

use crate::core::scene::{MeshPart, ProcessedOutput};
use crate::core::shared::{ConfigType, PlateIdx};
use crate::core::texture::{PlateKind, TexturePlate, TextureUtils};

pub const FALLBACK_MATERIAL_ID: &str = "lambert1";
const TEXCOORD_PRIMVAR: &str = "Texture_uv";

#[remain::sorted]
#[derive(Debug, thiserror::Error)]
pub enum Err {
    #[error("Nothing to write, the output has no mesh parts.")]
    EmptyOutput,
    #[error("Mesh part {0} has mismatched position, normal or texture coordinate streams.")]
    MismatchedStreams(usize),
    #[error("std io Error: {0}")]
    StdIoError(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Factor applied to every point.
    pub position_scale: f64,
    /// Wire the ambient occlusion, metalness, roughness and emissive channels into each material.
    pub include_pbr_textures: bool,
    pub root_prim_name: String,
    pub doc: String,
}

impl ConfigType for Config {
    fn default() -> Self {
        Self {
            position_scale: 100.0,
            include_pbr_textures: true,
            root_prim_name: "Model".to_string(),
            doc: "Generated by tgx-oxide".to_string(),
        }
    }
}

/// Material prim name of the plate with the given index.
pub fn material_id(plate_index: PlateIdx) -> String {
    format!("Material{}", plate_index)
}

pub struct UsdWriter {
    cfg: Config,
}

impl UsdWriter {
    pub fn new(cfg: Config) -> Self {
        Self { cfg }
    }

    pub fn write(&self, output: &ProcessedOutput, buf_out: &mut Vec<u8>) -> Result<(), Err> {
        if output.parts.is_empty() {
            return Err(Err::EmptyOutput);
        }
        for (i, part) in output.parts.iter().enumerate() {
            if !part.is_well_formed() {
                return Err(Err::MismatchedStreams(i));
            }
        }

        self.write_header(buf_out)?;
        self.write_materials(output, buf_out)?;

        writeln!(buf_out, "def Xform \"{}\"", self.cfg.root_prim_name)?;
        writeln!(buf_out, "{{")?;
        for (i, part) in output.parts.iter().enumerate() {
            let material = output
                .plate_of_part(i)
                .map(|p| material_id(p.plate_index()))
                .unwrap_or_else(|| FALLBACK_MATERIAL_ID.to_string());
            self.write_mesh(i, part, &material, buf_out)?;
        }
        writeln!(buf_out, "}}")?;
        tracing::info!("Wrote USD stage with {} meshes", output.num_parts());
        Ok(())
    }

    fn write_header(&self, buf_out: &mut Vec<u8>) -> Result<(), Err> {
        writeln!(buf_out, "#usda 1.0")?;
        writeln!(buf_out, "(")?;
        writeln!(buf_out, "    doc = \"\"\"{}\"\"\"", self.cfg.doc)?;
        writeln!(buf_out)?;
        writeln!(buf_out, "    endTimeCode = 200")?;
        writeln!(buf_out, "    startTimeCode = 1")?;
        writeln!(buf_out, "    timeCodesPerSecond = 24")?;
        writeln!(buf_out, "    upAxis = \"Z\"")?;
        writeln!(buf_out, ")")?;
        writeln!(buf_out)?;
        Ok(())
    }

    fn write_materials(&self, output: &ProcessedOutput, buf_out: &mut Vec<u8>) -> Result<(), Err> {
        writeln!(buf_out, "def Scope \"Materials\"")?;
        writeln!(buf_out, "{{")?;
        for plate in output.diffuse.values() {
            let idx = plate.plate_index();
            tracing::debug!("Writing material for plate {}", plate.name());
            let gearstack = output
                .plate(PlateKind::Gearstack, idx)
                .filter(|_| self.cfg.include_pbr_textures);
            let normal = output.plate(PlateKind::Normal, idx);
            self.write_material(&material_id(idx), plate, gearstack, normal, buf_out)?;
        }
        writeln!(buf_out, "    def Material \"{}\"", FALLBACK_MATERIAL_ID)?;
        writeln!(buf_out, "    {{")?;
        writeln!(buf_out, "        color3f inputs:displayColor = (0.5, 0.5, 0.5)")?;
        writeln!(buf_out, "    }}")?;
        writeln!(buf_out, "}}")?;
        writeln!(buf_out)?;
        Ok(())
    }

    fn write_material(
        &self,
        mat_id: &str,
        diffuse: &TexturePlate,
        gearstack: Option<&TexturePlate>,
        normal: Option<&TexturePlate>,
        buf_out: &mut Vec<u8>,
    ) -> Result<(), Err> {
        let path = format!("/Materials/{}", mat_id);
        writeln!(buf_out, "    def Material \"{}\"", mat_id)?;
        writeln!(buf_out, "    {{")?;
        writeln!(buf_out, "        token inputs:frame:stPrimvarName = \"{}\"", TEXCOORD_PRIMVAR)?;
        for output in ["displacement", "surface"] {
            writeln!(
                buf_out,
                "        token outputs:{output}.connect = <{path}/pbrMat.outputs:{output}>"
            )?;
        }
        writeln!(buf_out)?;

        writeln!(buf_out, "        def Shader \"pbrMat\"")?;
        writeln!(buf_out, "        {{")?;
        writeln!(buf_out, "            uniform token info:id = \"UsdPreviewSurface\"")?;
        writeln!(buf_out, "            float inputs:clearcoat = 0")?;
        writeln!(buf_out, "            float inputs:clearcoatRoughness = 0")?;
        connect(buf_out, &path, "color3f", "diffuseColor", "color_map", "rgb")?;
        writeln!(buf_out, "            float inputs:displacement = 0")?;
        if gearstack.is_some() {
            connect(buf_out, &path, "color3f", "emissive", "emissive_map", "r")?;
        }
        writeln!(buf_out, "            float inputs:ior = 1.5")?;
        if gearstack.is_some() {
            connect(buf_out, &path, "float", "metallic", "metallic_map", "r")?;
        }
        if normal.is_some() {
            connect(buf_out, &path, "normal3f", "normal", "normal_map", "rgb")?;
        }
        if gearstack.is_some() {
            connect(buf_out, &path, "float", "occlusion", "ao_map", "r")?;
        }
        writeln!(buf_out, "            float inputs:opacity = 1")?;
        if gearstack.is_some() {
            connect(buf_out, &path, "float", "roughness", "roughness_map", "r")?;
        }
        writeln!(buf_out, "            color3f inputs:specularColor = (1, 1, 1)")?;
        writeln!(buf_out, "            int inputs:useSpecularWorkflow = 0")?;
        writeln!(buf_out, "            token outputs:displacement")?;
        writeln!(buf_out, "            token outputs:surface")?;
        writeln!(buf_out, "        }}")?;
        writeln!(buf_out)?;

        texture_shader(buf_out, &path, "color_map", diffuse.name(), "float3 outputs:rgb")?;

        writeln!(buf_out, "        def Shader \"Primvar\"")?;
        writeln!(buf_out, "        {{")?;
        writeln!(buf_out, "            uniform token info:id = \"UsdPrimvarReader_float2\"")?;
        writeln!(buf_out, "            float2 inputs:default = (0, 0)")?;
        writeln!(
            buf_out,
            "            token inputs:varname.connect = <{}.inputs:frame:stPrimvarName>",
            path
        )?;
        writeln!(buf_out, "            float2 outputs:result")?;
        writeln!(buf_out, "        }}")?;

        if let Some(normal) = normal {
            writeln!(buf_out)?;
            texture_shader(buf_out, &path, "normal_map", normal.name(), "normal3f outputs:rgb")?;
        }

        if let Some(gearstack) = gearstack {
            for (shader, channel) in [
                ("ao_map", "AO"),
                ("metallic_map", "metalness"),
                ("roughness_map", "roughness"),
                ("emissive_map", "emissive"),
            ] {
                writeln!(buf_out)?;
                let file = TextureUtils::channel_name(gearstack.name(), channel);
                texture_shader(buf_out, &path, shader, &file, "float outputs:r")?;
            }
        }
        writeln!(buf_out, "    }}")?;
        writeln!(buf_out)?;
        Ok(())
    }

    fn write_mesh(
        &self,
        index: usize,
        part: &MeshPart,
        material: &str,
        buf_out: &mut Vec<u8>,
    ) -> Result<(), Err> {
        let scale = self.cfg.position_scale;
        tracing::debug!("Triangle Count: {}", part.num_triangles());

        writeln!(buf_out)?;
        writeln!(buf_out, "    def Mesh \"{}Piece{}\"", self.cfg.root_prim_name, index)?;
        writeln!(buf_out, "    {{")?;
        let counts = join(vec!["3"; part.num_triangles()]);
        writeln!(buf_out, "        int[] faceVertexCounts = [{}]", counts)?;
        writeln!(buf_out, "        int[] faceVertexIndices = [{}]", join(0..part.num_corners()))?;
        writeln!(buf_out, "        rel material:binding = </Materials/{}>", material)?;

        let points = part
            .positions
            .chunks_exact(3)
            .map(|p| format!("({:.6}, {:.6}, {:.6})", p[0] * scale, p[1] * scale, p[2] * scale));
        writeln!(buf_out, "        point3f[] points = [{}]", join(points))?;

        let normals = part
            .normals
            .chunks_exact(3)
            .map(|n| format!("({:.6}, {:.6}, {:.6})", n[0], n[1], n[2]));
        writeln!(buf_out, "        normal3f[] primvars:normals = [{}] (", join(normals))?;
        writeln!(buf_out, "            interpolation = \"vertex\"")?;
        writeln!(buf_out, "        )")?;
        let normal_indices = join(0..part.normals.len() / 3);
        writeln!(buf_out, "        int[] primvars:normals:indices = [{}]", normal_indices)?;

        if part.has_texcoords() {
            let texcoords = part
                .texcoords
                .chunks_exact(2)
                .map(|t| format!("({:.6}, {:.6})", t[0], t[1]));
            let texcoords = join(texcoords);
            let primvar = TEXCOORD_PRIMVAR;
            writeln!(buf_out, "        float2[] primvars:{} = [{}] (", primvar, texcoords)?;
            writeln!(buf_out, "            interpolation = \"faceVarying\"")?;
            writeln!(buf_out, "        )")?;
            writeln!(
                buf_out,
                "        int[] primvars:{}:indices = [{}]",
                TEXCOORD_PRIMVAR,
                join(0..part.texcoords.len() / 2)
            )?;
        }
        writeln!(buf_out, "    }}")?;
        Ok(())
    }
}

/// One `inputs:<input>.connect` line of the preview surface, wired to `<shader>.outputs:<output>`.
fn connect(
    buf_out: &mut Vec<u8>,
    path: &str,
    ty: &str,
    input: &str,
    shader: &str,
    output: &str,
) -> Result<(), Err> {
    writeln!(
        buf_out,
        "            {} inputs:{}.connect = <{}/{}.outputs:{}>",
        ty, input, path, shader, output
    )?;
    Ok(())
}

fn texture_shader(
    buf_out: &mut Vec<u8>,
    path: &str,
    shader: &str,
    file: &str,
    output: &str,
) -> Result<(), Err> {
    writeln!(buf_out, "        def Shader \"{}\"", shader)?;
    writeln!(buf_out, "        {{")?;
    writeln!(buf_out, "            uniform token info:id = \"UsdUVTexture\"")?;
    writeln!(buf_out, "            float4 inputs:default = (0, 0, 0, 1)")?;
    writeln!(buf_out, "            asset inputs:file = @{}@", file)?;
    writeln!(buf_out, "            float2 inputs:st.connect = <{}/Primvar.outputs:result>", path)?;
    writeln!(buf_out, "            token inputs:wrapS = \"repeat\"")?;
    writeln!(buf_out, "            token inputs:wrapT = \"repeat\"")?;
    writeln!(buf_out, "            {}", output)?;
    writeln!(buf_out, "        }}")?;
    Ok(())
}

fn join<I>(items: I) -> String
where
    I: IntoIterator,
    I::Item: ToString,
{
    items.into_iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> MeshPart {
        let mut part = MeshPart::new();
        let corners = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ];
        for p in corners {
            part.push_corner(p, [0.0, 0.0, 1.0], Some([0.5, 0.25]));
        }
        part
    }

    fn render(output: &ProcessedOutput, cfg: Config) -> String {
        let mut buf = Vec::new();
        UsdWriter::new(cfg).write(output, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn plated_output() -> ProcessedOutput {
        let mut output = ProcessedOutput::new();
        output.push_part(quad());
        output.assign_plate_from(0, Some(1));
        let plate = |name: &str, kind| TexturePlate::new(name.to_string(), kind, 1, (2, 2));
        let diffuse = plate("rock_diffuse.png", PlateKind::Diffuse);
        let gearstack = plate("rock_gearstack.png", PlateKind::Gearstack);
        output.diffuse.insert(1, diffuse);
        output.gearstack.insert(1, gearstack);
        output
    }

    #[test]
    fn mesh_and_materials() {
        let doc = render(&plated_output(), Config::default());
        assert!(doc.starts_with("#usda 1.0\n"));
        assert!(doc.contains("upAxis = \"Z\""));
        assert!(doc.contains("def Material \"Material1\""));
        assert!(doc.contains("asset inputs:file = @rock_diffuse.png@"));
        assert!(doc.contains("asset inputs:file = @rock_AO.png@"));
        assert!(doc.contains("asset inputs:file = @rock_metalness.png@"));
        assert!(doc.contains("asset inputs:file = @rock_roughness.png@"));
        assert!(doc.contains("asset inputs:file = @rock_emissive.png@"));
        assert!(!doc.contains("normal_map"));
        assert!(doc.contains("def Material \"lambert1\""));
        assert!(doc.contains("int[] faceVertexCounts = [3, 3]"));
        assert!(doc.contains("int[] faceVertexIndices = [0, 1, 2, 3, 4, 5]"));
        assert!(doc.contains("rel material:binding = </Materials/Material1>"));
        assert!(doc.contains("points = [(0.000000, 0.000000, 0.000000), (100.000000, 0.0"));
        assert!(doc.contains("surface.connect = </Materials/Material1/pbrMat.outputs:surface>"));
        assert!(doc.contains("inputs:occlusion.connect = </Materials/Material1/ao_map.outputs:r>"));
        assert!(doc.contains("int[] primvars:Texture_uv:indices = [0, 1, 2, 3, 4, 5]"));
        assert!(doc.trim_end().ends_with('}'));
    }

    #[test]
    fn normal_plate_adds_normal_map() {
        let mut output = plated_output();
        let normal = TexturePlate::new("rock_normal.png".to_string(), PlateKind::Normal, 1, (2, 2));
        output.normal.insert(1, normal);
        let doc = render(&output, Config::default());
        assert!(doc.contains("def Shader \"normal_map\""));
        assert!(doc.contains("normal.connect = </Materials/Material1/normal_map.outputs:rgb>"));
    }

    #[test]
    fn pbr_textures_disabled() {
        let cfg = Config {
            include_pbr_textures: false,
            position_scale: 1.0,
            ..Config::default()
        };
        let doc = render(&plated_output(), cfg);
        assert!(!doc.contains("ao_map"));
        assert!(!doc.contains("metallic.connect"));
        assert!(doc.contains("(1.000000, 0.000000, 0.000000)"));
    }

    #[test]
    fn unplated_part_binds_fallback() {
        let mut output = ProcessedOutput::new();
        output.push_part(quad());
        let doc = render(&output, Config::default());
        assert!(doc.contains("rel material:binding = </Materials/lambert1>"));
        assert!(!doc.contains("Material0"));
    }

    #[test]
    fn rejects_empty_output() {
        let mut buf = Vec::new();
        let err = UsdWriter::new(Config::default())
            .write(&ProcessedOutput::new(), &mut buf)
            .unwrap_err();
        assert!(matches!(err, Err::EmptyOutput));
    }
}
