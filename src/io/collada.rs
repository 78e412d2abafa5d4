//! COLLADA 1.4.1 writer for processed output.
//!
//! Every mesh part becomes one geometry with fully expanded position, normal and texture
//! coordinate sources; corner `i` of the part is vertex `i`, so no index deduplication happens.

use std::io::Write;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::core::scene::ProcessedOutput;
use crate::core::shared::ConfigType;
use crate::core::texture::TexturePlate;

pub const COLLADA_NAMESPACE: &str = "http://www.collada.org/2005/11/COLLADASchema";
pub const FALLBACK_MATERIAL_ID: &str = "fallback_material";
const FALLBACK_EFFECT_ID: &str = "effect_fallback";
const SCENE_ID: &str = "scene1";

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
    /// Sample the diffuse plate in each effect. Without textures effects use a flat color and
    /// geometries carry no texture coordinate source.
    pub include_textures: bool,
    pub publishing_tool: String,
    /// Timestamp written to `created` and `modified`. The current time is used when unset.
    pub timestamp: Option<DateTime<Utc>>,
}

impl ConfigType for Config {
    fn default() -> Self {
        Self {
            include_textures: true,
            publishing_tool: "tgx-oxide".to_string(),
            timestamp: None,
        }
    }
}

/// Geometry identifier of part `i`.
pub fn geometry_id(part: usize) -> String {
    format!("3054293897-0_{}_1", part * 3 + 1)
}

pub struct ColladaWriter {
    cfg: Config,
}

impl ColladaWriter {
    pub fn new(cfg: Config) -> Self {
        Self { cfg }
    }

    /// Serializes `output` into `buf_out`.
    pub fn write(&self, output: &ProcessedOutput, buf_out: &mut Vec<u8>) -> Result<(), Err> {
        if output.parts.is_empty() {
            return Err(Err::EmptyOutput);
        }
        for (i, part) in output.parts.iter().enumerate() {
            if !part.is_well_formed() {
                return Err(Err::MismatchedStreams(i));
            }
        }

        let mut xml = XmlWriter::new(buf_out);
        writeln!(xml.buf, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
        xml.open("COLLADA", &[("xmlns", COLLADA_NAMESPACE), ("version", "1.4.1")])?;

        self.write_asset(&mut xml)?;
        self.write_library_images(&mut xml, output)?;
        self.write_library_effects(&mut xml, output)?;
        self.write_library_materials(&mut xml, output)?;
        let geometry_ids = self.write_library_geometries(&mut xml, output)?;
        self.write_library_visual_scenes(&mut xml, output, &geometry_ids)?;

        xml.open("scene", &[])?;
        xml.empty("instance_visual_scene", &[("url", &format!("#{}", SCENE_ID))])?;
        xml.close("scene")?;
        xml.close("COLLADA")?;
        tracing::info!("Wrote COLLADA document with {} geometries", geometry_ids.len());
        Ok(())
    }

    fn write_asset(&self, xml: &mut XmlWriter<'_>) -> Result<(), Err> {
        let timestamp = self
            .cfg
            .timestamp
            .unwrap_or_else(Utc::now)
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        xml.open("asset", &[])?;
        xml.open("contributor", &[])?;
        xml.leaf("publishing_tool", &[], &self.cfg.publishing_tool)?;
        xml.close("contributor")?;
        xml.leaf("created", &[], &timestamp)?;
        xml.leaf("modified", &[], &timestamp)?;
        xml.leaf("up_axis", &[], "Y_UP")?;
        xml.close("asset")
    }

    fn write_library_images(
        &self,
        xml: &mut XmlWriter<'_>,
        output: &ProcessedOutput,
    ) -> Result<(), Err> {
        xml.open("library_images", &[])?;
        for plate in output.diffuse.values() {
            xml.open("image", &[("id", &plate.image_library_id())])?;
            xml.leaf("init_from", &[], plate.name())?;
            xml.close("image")?;
        }
        xml.close("library_images")
    }

    fn write_library_effects(
        &self,
        xml: &mut XmlWriter<'_>,
        output: &ProcessedOutput,
    ) -> Result<(), Err> {
        xml.open("library_effects", &[])?;
        for plate in output.diffuse.values() {
            self.write_plate_effect(xml, plate)?;
        }
        if needs_fallback(output) {
            xml.open("effect", &[("id", FALLBACK_EFFECT_ID)])?;
            xml.open("profile_COMMON", &[])?;
            xml.open("technique", &[("sid", "common")])?;
            xml.open("lambert", &[])?;
            color(xml, "diffuse", "0.5 0.5 0.5 1")?;
            xml.close("lambert")?;
            xml.close("technique")?;
            xml.close("profile_COMMON")?;
            xml.close("effect")?;
        }
        xml.close("library_effects")
    }

    fn write_plate_effect(&self, xml: &mut XmlWriter<'_>, plate: &TexturePlate) -> Result<(), Err> {
        let idx = plate.plate_index();
        let surface_sid = format!("ID2_image{}_surface", idx);
        let sampler_sid = format!("ID2_image{}", idx);

        xml.open("effect", &[("id", &plate.effect_id())])?;
        xml.open("profile_COMMON", &[])?;

        xml.open("newparam", &[("sid", &surface_sid)])?;
        xml.open("surface", &[("type", "2D")])?;
        xml.leaf("init_from", &[], &plate.image_library_id())?;
        xml.close("surface")?;
        xml.close("newparam")?;

        xml.open("newparam", &[("sid", &sampler_sid)])?;
        xml.open("sampler2D", &[])?;
        xml.leaf("source", &[], &surface_sid)?;
        xml.leaf("wrap_s", &[], "WRAP")?;
        xml.leaf("wrap_t", &[], "WRAP")?;
        xml.leaf("minfilter", &[], "LINEAR")?;
        xml.leaf("magfilter", &[], "LINEAR")?;
        xml.leaf("mipfilter", &[], "LINEAR")?;
        xml.close("sampler2D")?;
        xml.close("newparam")?;

        xml.open("technique", &[("sid", "common")])?;
        xml.open("blinn", &[])?;
        color(xml, "ambient", "1 1 1 1")?;
        if self.cfg.include_textures {
            xml.open("diffuse", &[])?;
            xml.empty("texture", &[("texture", &sampler_sid), ("texcoord", "CHANNEL2")])?;
            xml.close("diffuse")?;
        } else {
            color(xml, "diffuse", "1 0.7 0.5 1")?;
        }
        color(xml, "specular", "0.496564 0.496564 0.496564 1")?;
        float(xml, "shininess", "0.022516")?;
        color(xml, "reflective", "0 0 0 1")?;
        xml.open("transparent", &[("opaque", "A_ONE")])?;
        xml.leaf("color", &[], "0.998203 1 1 1")?;
        xml.close("transparent")?;
        float(xml, "transparency", "1")?;
        float(xml, "index_of_refraction", "1")?;
        xml.close("blinn")?;
        xml.close("technique")?;
        xml.close("profile_COMMON")?;

        xml.open("extra", &[])?;
        xml.open("technique", &[])?;
        xml.leaf("litPerPixel", &[], "1")?;
        xml.leaf("ambient_diffuse_lock", &[], "1")?;
        xml.open("intensities", &[])?;
        float(xml, "emission", "0.5")?;
        xml.close("intensities")?;
        xml.close("technique")?;
        xml.close("extra")?;
        xml.close("effect")
    }

    fn write_library_materials(
        &self,
        xml: &mut XmlWriter<'_>,
        output: &ProcessedOutput,
    ) -> Result<(), Err> {
        xml.open("library_materials", &[])?;
        for plate in output.diffuse.values() {
            let id = plate.material_id();
            xml.open("material", &[("id", &id), ("name", &id)])?;
            xml.empty("instance_effect", &[("url", &format!("#{}", plate.effect_id()))])?;
            xml.close("material")?;
        }
        if needs_fallback(output) {
            xml.open("material", &[("id", FALLBACK_MATERIAL_ID), ("name", FALLBACK_MATERIAL_ID)])?;
            xml.empty("instance_effect", &[("url", &format!("#{}", FALLBACK_EFFECT_ID))])?;
            xml.close("material")?;
        }
        xml.close("library_materials")
    }

    fn write_library_geometries(
        &self,
        xml: &mut XmlWriter<'_>,
        output: &ProcessedOutput,
    ) -> Result<Vec<String>, Err> {
        xml.open("library_geometries", &[])?;
        let mut geometry_ids = Vec::with_capacity(output.parts.len());
        for (i, part) in output.parts.iter().enumerate() {
            let geometry_id = geometry_id(i);
            let position_source = format!("geometrySource{}", i * 3 + 1);
            let normal_source = format!("geometrySource{}", i * 3 + 2);
            let texcoord_source = format!("geometrySource{}", i * 3 + 3);
            let vertices_id = format!("{}-vertices", position_source);
            let with_texcoords = self.cfg.include_textures && part.has_texcoords();
            tracing::debug!("Pos list length = {}", part.positions.len());

            xml.open("geometry", &[("id", &geometry_id), ("name", &geometry_id)])?;
            xml.open("mesh", &[])?;
            source(xml, &position_source, i * 3 + 1, &part.positions, &["X", "Y", "Z"])?;
            source(xml, &normal_source, i * 3 + 2, &part.normals, &["X", "Y", "Z"])?;
            if with_texcoords {
                source(xml, &texcoord_source, i * 3 + 3, &part.texcoords, &["S", "T"])?;
            }

            let position_url = format!("#{}", position_source);
            let normal_url = format!("#{}", normal_source);
            xml.open("vertices", &[("id", &vertices_id)])?;
            xml.empty("input", &[("semantic", "POSITION"), ("source", &position_url)])?;
            xml.empty("input", &[("semantic", "NORMAL"), ("source", &normal_url)])?;
            xml.close("vertices")?;

            let count = part.num_triangles().to_string();
            xml.open("triangles", &[("count", &count), ("material", &geometry_id)])?;
            let vertices_url = format!("#{}", vertices_id);
            xml.empty(
                "input",
                &[("semantic", "VERTEX"), ("offset", "0"), ("source", &vertices_url)],
            )?;
            xml.empty(
                "input",
                &[("semantic", "NORMAL"), ("offset", "0"), ("source", &normal_url)],
            )?;
            if with_texcoords {
                xml.empty(
                    "input",
                    &[
                        ("semantic", "TEXCOORD"),
                        ("offset", "0"),
                        ("source", &format!("#{}", texcoord_source)),
                        ("set", "1"),
                    ],
                )?;
            }
            let indices = (0..part.num_corners())
                .map(|i| i.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            xml.leaf("p", &[], &indices)?;
            xml.close("triangles")?;

            xml.close("mesh")?;
            xml.close("geometry")?;
            geometry_ids.push(geometry_id);
        }
        xml.close("library_geometries")?;
        Ok(geometry_ids)
    }

    fn write_library_visual_scenes(
        &self,
        xml: &mut XmlWriter<'_>,
        output: &ProcessedOutput,
        geometry_ids: &[String],
    ) -> Result<(), Err> {
        xml.open("library_visual_scenes", &[])?;
        xml.open("visual_scene", &[("id", SCENE_ID)])?;
        for (i, geometry_id) in geometry_ids.iter().enumerate() {
            let material = output
                .plate_of_part(i)
                .map(|p| p.material_id())
                .unwrap_or_else(|| FALLBACK_MATERIAL_ID.to_string());
            tracing::debug!("Geometry {} bound to material {}", geometry_id, material);

            let node_id = format!("node{}", i);
            let node_name = format!("node-{}", geometry_id);
            xml.open("node", &[("id", &node_id), ("name", &node_name)])?;
            xml.open("instance_geometry", &[("url", &format!("#{}", geometry_id))])?;
            xml.open("bind_material", &[])?;
            xml.open("technique_common", &[])?;
            xml.open(
                "instance_material",
                &[("symbol", geometry_id.as_str()), ("target", &format!("#{}", material))],
            )?;
            xml.empty(
                "bind_vertex_input",
                &[("semantic", "CHANNEL2"), ("input_semantic", "TEXCOORD"), ("input_set", "1")],
            )?;
            xml.close("instance_material")?;
            xml.close("technique_common")?;
            xml.close("bind_material")?;
            xml.close("instance_geometry")?;
            xml.close("node")?;
        }
        xml.close("visual_scene")?;
        xml.close("library_visual_scenes")
    }
}

fn needs_fallback(output: &ProcessedOutput) -> bool {
    (0..output.parts.len()).any(|i| output.plate_of_part(i).is_none())
}

fn color(xml: &mut XmlWriter<'_>, name: &str, value: &str) -> Result<(), Err> {
    xml.open(name, &[])?;
    xml.leaf("color", &[], value)?;
    xml.close(name)
}

fn float(xml: &mut XmlWriter<'_>, name: &str, value: &str) -> Result<(), Err> {
    xml.open(name, &[])?;
    xml.leaf("float", &[], value)?;
    xml.close(name)
}

fn source<T: std::fmt::Display>(
    xml: &mut XmlWriter<'_>,
    id: &str,
    array_number: usize,
    values: &[T],
    params: &[&str],
) -> Result<(), Err> {
    let array_id = format!("ID{}-array", array_number);
    let text = values.iter().map(|v| format!("{:.6}", v)).collect::<Vec<_>>().join(" ");
    xml.open("source", &[("id", id)])?;
    xml.leaf("float_array", &[("id", &array_id), ("count", &values.len().to_string())], &text)?;
    xml.open("technique_common", &[])?;
    xml.open(
        "accessor",
        &[
            ("source", &format!("#{}", array_id)),
            ("count", &(values.len() / params.len()).to_string()),
            ("stride", &params.len().to_string()),
        ],
    )?;
    for param in params {
        xml.empty("param", &[("name", *param), ("type", "float")])?;
    }
    xml.close("accessor")?;
    xml.close("technique_common")?;
    xml.close("source")
}

/// Minimal indenting XML emitter.
struct XmlWriter<'a> {
    buf: &'a mut Vec<u8>,
    depth: usize,
}

impl<'a> XmlWriter<'a> {
    fn new(buf: &'a mut Vec<u8>) -> Self {
        Self { buf, depth: 0 }
    }

    fn start_tag(&mut self, name: &str, attrs: &[(&str, &str)]) -> std::io::Result<()> {
        write!(self.buf, "{:width$}<{}", "", name, width = self.depth * 2)?;
        for (key, value) in attrs {
            write!(self.buf, " {}=\"{}\"", key, escape(value))?;
        }
        Ok(())
    }

    fn open(&mut self, name: &str, attrs: &[(&str, &str)]) -> std::io::Result<()> {
        self.start_tag(name, attrs)?;
        writeln!(self.buf, ">")?;
        self.depth += 1;
        Ok(())
    }

    fn close(&mut self, name: &str) -> Result<(), Err> {
        self.depth = self.depth.saturating_sub(1);
        writeln!(self.buf, "{:width$}</{}>", "", name, width = self.depth * 2)?;
        Ok(())
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> std::io::Result<()> {
        self.start_tag(name, attrs)?;
        writeln!(self.buf, "/>")
    }

    fn leaf(&mut self, name: &str, attrs: &[(&str, &str)], text: &str) -> std::io::Result<()> {
        self.start_tag(name, attrs)?;
        writeln!(self.buf, ">{}</{}>", escape(text), name)
    }
}

fn escape(text: &str) -> std::borrow::Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return std::borrow::Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    std::borrow::Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scene::MeshPart;
    use crate::core::texture::PlateKind;
    use chrono::TimeZone;

    fn triangle() -> MeshPart {
        let mut part = MeshPart::new();
        for p in [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
            part.push_corner(p, [0.0, 0.0, 1.0], Some([0.25, 0.75]));
        }
        part
    }

    fn writer() -> ColladaWriter {
        ColladaWriter::new(Config {
            timestamp: Some(Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap()),
            ..Config::default()
        })
    }

    fn render(output: &ProcessedOutput) -> String {
        let mut buf = Vec::new();
        writer().write(output, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn textured_triangle() {
        let mut output = ProcessedOutput::new();
        output.push_part(triangle());
        output.assign_plate_from(0, Some(3));
        let name = "rock_diffuse.png".to_string();
        let plate = TexturePlate::new(name, PlateKind::Diffuse, 3, (2, 2));
        output.diffuse.insert(3, plate);

        let doc = render(&output);
        assert!(doc.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(doc.contains(
            r#"<COLLADA xmlns="http://www.collada.org/2005/11/COLLADASchema" version="1.4.1">"#
        ));
        assert!(doc.contains("<created>2020-01-02T03:04:05Z</created>"));
        assert!(doc.contains(r#"<image id="image3">"#));
        assert!(doc.contains("<init_from>rock_diffuse.png</init_from>"));
        assert!(doc.contains(r#"<effect id="effect_lambert3">"#));
        assert!(doc.contains(r#"<newparam sid="ID2_image3_surface">"#));
        assert!(doc.contains(r#"<texture texture="ID2_image3" texcoord="CHANNEL2"/>"#));
        assert!(doc.contains(r#"<material id="lambert3" name="lambert3">"#));
        assert!(doc.contains(r#"<geometry id="3054293897-0_1_1" name="3054293897-0_1_1">"#));
        assert!(doc.contains(
            r#"<float_array id="ID1-array" count="9">0.000000 0.000000 0.000000 1.000000"#
        ));
        assert!(doc.contains(r#"<float_array id="ID3-array" count="6">0.250000 0.750000"#));
        assert!(doc.contains(r#"<triangles count="1" material="3054293897-0_1_1">"#));
        assert!(doc.contains("<p>0 1 2</p>"));
        let binding = r##"<instance_material symbol="3054293897-0_1_1" target="#lambert3">"##;
        assert!(doc.contains(binding));
        assert!(doc.contains(r##"<instance_visual_scene url="#scene1"/>"##));
        assert!(!doc.contains(FALLBACK_MATERIAL_ID));
        assert!(doc.trim_end().ends_with("</COLLADA>"));
    }

    #[test]
    fn unplated_part_uses_fallback() {
        let mut output = ProcessedOutput::new();
        output.push_part(triangle());
        output.push_part(triangle());
        let doc = render(&output);
        assert!(doc.contains(r#"<material id="fallback_material" name="fallback_material">"#));
        assert!(doc.contains(r##"target="#fallback_material""##));
        assert!(doc.contains(r#"<geometry id="3054293897-0_4_1" name="3054293897-0_4_1">"#));
        assert!(doc.contains(r#"<node id="node1" name="node-3054293897-0_4_1">"#));
    }

    #[test]
    fn textures_disabled() {
        let mut output = ProcessedOutput::new();
        output.push_part(triangle());
        output.assign_plate_from(0, Some(0));
        output
            .diffuse
            .insert(0, TexturePlate::new("a.png".to_string(), PlateKind::Diffuse, 0, (1, 1)));
        let mut buf = Vec::new();
        ColladaWriter::new(Config { include_textures: false, ..Config::default() })
            .write(&output, &mut buf)
            .unwrap();
        let doc = String::from_utf8(buf).unwrap();
        assert!(doc.contains("<color>1 0.7 0.5 1</color>"));
        assert!(!doc.contains("TEXCOORD\" offset"));
        assert!(!doc.contains("ID3-array"));
    }

    #[test]
    fn rejects_bad_output() {
        let mut buf = Vec::new();
        assert!(matches!(writer().write(&ProcessedOutput::new(), &mut buf), Err(Err::EmptyOutput)));

        let mut output = ProcessedOutput::new();
        let mut part = triangle();
        part.normals.pop();
        output.push_part(part);
        assert!(matches!(writer().write(&output, &mut buf), Err(Err::MismatchedStreams(0))));
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape("a<b>&\"c'"), "a&lt;b&gt;&amp;&quot;c&apos;");
        assert!(matches!(escape("plain"), std::borrow::Cow::Borrowed(_)));
    }
}
