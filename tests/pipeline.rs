use std::io::Cursor;

use image::{Rgba, RgbaImage};
use serde_json::json;
use tgx_oxide::io::{collada, stl, texture_io, usd};
use tgx_oxide::prelude::*;

fn png(color: [u8; 4]) -> Vec<u8> {
    let mut bytes = Vec::new();
    RgbaImage::from_pixel(2, 2, Rgba(color))
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

fn texture_bundle() -> Container {
    let mut writer = ContainerWriter::new(*b"tgxm", "textures");
    writer
        .add_file("rock", png([200, 100, 50, 255]))
        .add_file("metal", png([147, 255, 200, 147]));
    container::parse(writer.write()).unwrap()
}

fn element(format: &str, semantic: &str, offset: usize) -> serde_json::Value {
    json!({
        "type": format!("_vertex_format_attribute_{}", format),
        "semantic": format!("_tfx_vb_semantic_{}", semantic),
        "offset": offset
    })
}

fn geometry_bundle() -> Container {
    let mut vb = Vec::new();
    for (p, t) in [([0_i16, 0, 0], [0_i16, 0]), ([1, 0, 0], [32767, 0]), ([0, 1, 0], [0, 32767])] {
        for v in [p[0], p[1], p[2], 1, 0, 0, 1, 0, t[0], t[1]] {
            vb.write_u16(v as u16);
        }
    }
    let mut ib = Vec::new();
    for i in [0_i16, 1, 2] {
        ib.write_u16(i as u16);
    }

    let placement = |tag: &str| {
        json!({
            "plate_index": 0,
            "plate_size": [4, 4],
            "texture_placements": [{
                "texture_size_x": 2, "texture_size_y": 2,
                "position_x": 0, "position_y": 0,
                "texture_tag_name": tag
            }]
        })
    };
    let metadata = json!({
        "render_model": { "render_meshes": [{
            "vertex_buffers": [{ "file_name": "vb0", "stride_byte_size": 20 }],
            "stage_part_vertex_stream_layout_definitions": [{
                "formats": [{
                    "stride": 20,
                    "elements": [
                        element("short4", "position", 0),
                        element("short4", "normal", 8),
                        element("short2", "texcoord", 16)
                    ]
                }]
            }],
            "index_buffer": { "file_name": "ib0" },
            "stage_part_list": [{ "start_index": 0, "index_count": 3, "primitive_type": 3 }]
        }]},
        "texture_plates": [{ "plate_set": {
            "diffuse": placement("rock"),
            "gearstack": placement("metal")
        }}]
    });

    let mut writer = ContainerWriter::new(*b"tgxm", "geometry");
    writer
        .add_file(container::RENDER_METADATA_FILE, metadata.to_string().into_bytes())
        .add_file("vb0", vb)
        .add_file("ib0", ib);
    container::parse(writer.write()).unwrap()
}

fn process(textures: &dyn TextureSource) -> ProcessedOutput {
    let mut output = ProcessedOutput::new();
    let cfg = decode::Config::default();
    let reports = process_geometries(&[geometry_bundle()], textures, &mut output, &cfg).unwrap();
    assert!(reports.iter().all(GeometryReport::is_complete));
    output
}

#[test]
fn single_triangle_to_collada() {
    let output = process(&MemoryTextureSource::from_container(&texture_bundle()));
    assert_eq!(output.num_parts(), 1);
    let part = &output.parts[0];
    assert_eq!(part.positions.len(), 9);
    assert_eq!(part.positions.len(), part.normals.len());
    assert_eq!(part.texcoords, vec![0.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
    assert_eq!(output.plate_index_of, vec![Some(0)]);

    let mut buf = Vec::new();
    ColladaWriter::new(collada::Config::default()).write(&output, &mut buf).unwrap();
    let doc = String::from_utf8(buf).unwrap();
    assert!(doc.contains(r#"<triangles count="1""#));
    assert!(doc.contains("<init_from>rock_diffuse.png</init_from>"));
    assert!(doc.contains(r##"target="#lambert0""##));
}

#[test]
fn extracted_textures_feed_every_writer() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path();
    let extracted = texture_io::extract_textures(&texture_bundle(), dir.join("src")).unwrap();
    assert_eq!(extracted.len(), 2);
    assert!(dir.join("src").join("rock.png").exists());

    let mut output = process(&DirTextureSource::new(dir.join("src")));

    let mut usd_doc = Vec::new();
    UsdWriter::new(usd::Config::default()).write(&output, &mut usd_doc).unwrap();
    let usd_doc = String::from_utf8(usd_doc).unwrap();
    assert!(usd_doc.contains("rel material:binding = </Materials/Material0>"));
    assert!(usd_doc.contains("asset inputs:file = @metal_roughness.png@"));

    let mut stl_doc = Vec::new();
    StlWriter::new(stl::Config::default()).write(&output, &mut stl_doc).unwrap();
    let stl_doc = String::from_utf8(stl_doc).unwrap();
    assert_eq!(stl_doc.matches("facet normal").count(), 1);
    assert!(stl_doc.contains("vertex 0.000000000 1.000000000 0.000000000"));

    let written =
        texture_io::write_textures(&mut output, dir.join("out"), &PbrConfig::default()).unwrap();
    assert_eq!(written.len(), 5);
    let names = [
        "rock_diffuse.png",
        "metal_AO.png",
        "metal_metalness.png",
        "metal_roughness.png",
        "metal_emissive.png",
    ];
    for name in names {
        assert!(dir.join("out").join(name).exists(), "{} missing", name);
    }
    assert_eq!(output.pbr[&0].dimensions(), (4, 4));
}

#[test]
fn bundle_survives_round_trip() {
    let bundle = geometry_bundle();
    assert_eq!(bundle.name(), "geometry");
    assert_eq!(bundle.file_count(), 3);

    let mut writer = ContainerWriter::new(bundle.extension(), bundle.name());
    for file in bundle.files() {
        writer.add_file(file.name, file.data.to_vec());
    }
    let copy = container::parse(writer.write()).unwrap();
    assert_eq!(copy.buffer(), bundle.buffer());
}
