use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tgx_oxide::io::{collada, stl, texture_io, usd};
use tgx_oxide::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tgx-cli")]
#[command(about = "A CLI tool for converting TGX geometry and texture bundles")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write every image of one or more texture bundles to a directory
    ExtractTextures {
        /// Texture bundle paths
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Reconstruct geometry bundles into a scene file plus its texture plates
    Convert {
        /// Geometry bundle paths, processed into a single output
        #[arg(short, long, required = true, num_args = 1..)]
        geometry: Vec<PathBuf>,

        /// Directory holding the extracted source textures
        #[arg(short, long)]
        textures: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        #[arg(short, long, value_enum, default_value_t = Format::Dae)]
        format: Format,

        /// File stem of the scene file
        #[arg(long, default_value = "model")]
        name: String,

        /// Reject unknown vertex formats instead of skipping them
        #[arg(long)]
        strict: bool,
    },
    /// Split a gearstack image into AO, metalness, roughness and emissive images
    Explode {
        /// Gearstack image path
        #[arg(short, long)]
        input: PathBuf,

        /// Output path prefix, `<prefix>_<channel>.<ext>` is written per channel
        #[arg(short, long)]
        prefix: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Dae,
    Usda,
    Stl,
}

impl Format {
    fn extension(self) -> &'static str {
        match self {
            Format::Dae => "dae",
            Format::Usda => "usda",
            Format::Stl => "stl",
        }
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    match cli.command {
        Command::ExtractTextures { input, output } => extract(&input, &output),
        Command::Convert {
            geometry,
            textures,
            output,
            format,
            name,
            strict,
        } => convert(&geometry, &textures, &output, format, &name, strict),
        Command::Explode { input, prefix } => {
            let (_, written) = texture_io::explode_file(&input, &prefix, &PbrConfig::default())
                .with_context(|| format!("Failed to explode {}", input.display()))?;
            println!("Wrote {} channel images", written.len());
            Ok(())
        }
    }
}

fn load(path: &Path) -> Result<Container> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    container::parse(bytes).with_context(|| format!("Failed to parse bundle {}", path.display()))
}

fn extract(inputs: &[PathBuf], output: &Path) -> Result<()> {
    let mut count = 0;
    for input in inputs {
        let bundle = load(input)?;
        count += texture_io::extract_textures(&bundle, output)?.len();
    }
    println!("Extracted {} textures to {}", count, output.display());
    Ok(())
}

fn convert(
    geometry: &[PathBuf],
    textures: &Path,
    output_dir: &Path,
    format: Format,
    name: &str,
    strict: bool,
) -> Result<()> {
    let containers = geometry.iter().map(|p| load(p)).collect::<Result<Vec<_>>>()?;
    let cfg = decode::Config {
        strict_vertex_formats: strict,
        ..decode::Config::default()
    };

    let mut output = ProcessedOutput::new();
    let source = DirTextureSource::new(textures);
    let reports = process_geometries(&containers, &source, &mut output, &cfg)?;
    for (path, report) in geometry.iter().zip(&reports) {
        if !report.is_complete() {
            tracing::warn!(
                "{}: {} meshes failed, {} parts kept",
                path.display(),
                report.failed_meshes.len(),
                report.parts_added
            );
        }
    }

    let mut buf = Vec::new();
    match format {
        Format::Dae => ColladaWriter::new(collada::Config::default()).write(&output, &mut buf)?,
        Format::Usda => {
            let cfg = usd::Config {
                root_prim_name: name.to_string(),
                ..usd::Config::default()
            };
            UsdWriter::new(cfg).write(&output, &mut buf)?
        }
        Format::Stl => {
            let cfg = stl::Config {
                solid_name: name.to_string(),
            };
            StlWriter::new(cfg).write(&output, &mut buf)?
        }
    }

    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(format!("{}.{}", name, format.extension()));
    std::fs::write(&path, buf).with_context(|| format!("Failed to write {}", path.display()))?;
    let written = texture_io::write_textures(&mut output, output_dir, &PbrConfig::default())?;

    println!(
        "Wrote {} with {} parts and {} textures",
        path.display(),
        output.num_parts(),
        written.len()
    );
    Ok(())
}
