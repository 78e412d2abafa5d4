//! Texture I/O: image sniffing, extraction of texture bundles, source lookup for the plate
//! compositor and raster output of composited plates.

use std::fs;
use std::path::{Path, PathBuf};

use image::{DynamicImage, RgbaImage};
use indexmap::IndexMap;

use crate::core::material::{explode, PbrChannelSet, PbrConfig};
use crate::core::scene::ProcessedOutput;
use crate::core::texture::{ImageFormat, TexturePlate, TextureUtils};
use crate::io::container::Container;

#[remain::sorted]
#[derive(Debug, thiserror::Error)]
pub enum Err {
    #[error("Image Error: {0}")]
    ImageError(#[from] image::ImageError),
    #[error("IO Error on '{path}': {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Texture '{0}' is not known to this source.")]
    UnknownTexture(String),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> Err + '_ {
    move |source| Err::IoError { path: path.to_path_buf(), source }
}

/// Returns the image format of an encoded texture stored in buffer.
/// ImageFormat::None is returned for unknown image formats.
pub fn image_format_from_buffer(buffer: &[u8]) -> ImageFormat {
    if buffer.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        return ImageFormat::Png;
    }
    if buffer.starts_with(&[0xFF, 0xD8]) {
        return ImageFormat::Jpeg;
    }
    ImageFormat::None
}

/// Lookup of source textures by tag name.
pub trait TextureSource {
    /// Names of every texture matching `tag`, i.e. named `<tag>.<anything>`.
    fn find(&self, tag: &str) -> Result<Vec<String>, Err>;

    /// Encoded bytes of a texture returned by `find`.
    fn read(&self, name: &str) -> Result<Vec<u8>, Err>;
}

fn matches_tag(file_name: &str, tag: &str) -> bool {
    file_name
        .strip_prefix(tag)
        .is_some_and(|rest| rest.starts_with('.'))
}

/// Textures previously extracted into a directory.
#[derive(Debug, Clone)]
pub struct DirTextureSource {
    dir: PathBuf,
}

impl DirTextureSource {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }
}

impl TextureSource for DirTextureSource {
    fn find(&self, tag: &str) -> Result<Vec<String>, Err> {
        tracing::info!("Looking for texture {}.* in {}", tag, self.dir.display());
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(io_err(&self.dir))? {
            let entry = entry.map_err(io_err(&self.dir))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if matches_tag(&name, tag) {
                out.push(name);
            }
        }
        out.sort();
        Ok(out)
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, Err> {
        let path = self.dir.join(name);
        fs::read(&path).map_err(io_err(&path))
    }
}

/// Encoded textures held in memory, keyed by file name.
#[derive(Debug, Clone, Default)]
pub struct MemoryTextureSource {
    files: IndexMap<String, Vec<u8>>,
}

impl MemoryTextureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, data: Vec<u8>) {
        self.files.insert(name.into(), data);
    }

    /// Adds an image encoded as PNG under `<tag>.png`.
    pub fn insert_png(&mut self, tag: &str, img: &RgbaImage) -> Result<(), Err> {
        let mut data = std::io::Cursor::new(Vec::new());
        img.write_to(&mut data, image::ImageFormat::Png)?;
        self.insert(format!("{}.png", tag), data.into_inner());
        Ok(())
    }

    /// Every file of a texture bundle, named `<name><ext>` as `extract_textures` would write them.
    pub fn from_container(container: &Container) -> Self {
        let mut out = Self::new();
        for texture in container.texture_files() {
            out.insert(format!("{}{}", texture.name, texture.extension()), texture.data.to_vec());
        }
        out
    }
}

impl TextureSource for MemoryTextureSource {
    fn find(&self, tag: &str) -> Result<Vec<String>, Err> {
        Ok(self
            .files
            .keys()
            .filter(|name| matches_tag(name, tag))
            .cloned()
            .collect())
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, Err> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| Err::UnknownTexture(name.to_string()))
    }
}

/// Writes every file of a texture bundle to `dir/<name><ext>`, skipping files that already exist.
/// Returns the paths written.
pub fn extract_textures<P: AsRef<Path>>(
    container: &Container,
    dir: P,
) -> Result<Vec<PathBuf>, Err> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).map_err(io_err(dir))?;

    let mut written = Vec::new();
    for texture in container.texture_files() {
        let path = dir.join(format!("{}{}", texture.name, texture.extension()));
        if path.exists() {
            tracing::debug!("Texture {} already extracted", path.display());
            continue;
        }
        fs::write(&path, texture.data).map_err(io_err(&path))?;
        written.push(path);
    }
    tracing::info!("Extracted {} textures from {}", written.len(), container.name());
    Ok(written)
}

/// Writes diffuse and normal plates as they are and every gearstack plate as its four PBR channel
/// images. The exploded channel sets are stored in `output.pbr`. Returns the paths written.
pub fn write_textures<P: AsRef<Path>>(
    output: &mut ProcessedOutput,
    dir: P,
    cfg: &PbrConfig,
) -> Result<Vec<PathBuf>, Err> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).map_err(io_err(dir))?;

    let mut written = Vec::new();
    for plate in output.diffuse.values().chain(output.normal.values()) {
        written.push(write_plate(plate, dir)?);
    }

    let exploded = output
        .gearstack
        .iter()
        .map(|(idx, plate)| (*idx, plate.name().to_string(), explode(plate.canvas(), cfg)))
        .collect::<Vec<_>>();
    for (idx, name, pbr) in exploded {
        tracing::info!("Setting pbr texture of index: {}", idx);
        for (channel, img) in pbr.named_channels() {
            let path = dir.join(TextureUtils::channel_name(&name, channel));
            write_image(img, &path)?;
            written.push(path);
        }
        output.pbr.insert(idx, pbr);
    }
    Ok(written)
}

fn write_plate(plate: &TexturePlate, dir: &Path) -> Result<PathBuf, Err> {
    let path = dir.join(plate.name());
    tracing::debug!("Writing {} plate {}", plate.kind().as_str(), plate.plate_index());
    write_image(plate.canvas(), &path)?;
    Ok(path)
}

/// Encodes `img` flipped vertically, as PNG when the file name ends in "png" and as JPEG otherwise.
pub fn write_image(img: &RgbaImage, path: &Path) -> Result<(), Err> {
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let flipped = image::imageops::flip_vertical(img);
    if TextureUtils::is_png_name(&name) {
        tracing::info!("Writing texture file, with format=png, to: {}", path.display());
        flipped.save_with_format(path, image::ImageFormat::Png)?;
    } else {
        tracing::info!("Writing texture file, with format=jpeg, to: {}", path.display());
        let rgb = DynamicImage::ImageRgba8(flipped).to_rgb8();
        rgb.save_with_format(path, image::ImageFormat::Jpeg)?;
    }
    Ok(())
}

/// Decodes an encoded texture, reporting the format it was stored in.
pub fn decode_image(data: &[u8]) -> Result<(RgbaImage, ImageFormat), Err> {
    let format = image::guess_format(data)
        .map(ImageFormat::from_image_format)
        .unwrap_or(ImageFormat::None);
    let img = image::load_from_memory(data)?.to_rgba8();
    Ok((img, format))
}

/// Explodes a gearstack image on disk and writes `<prefix>_<channel>.<format>` for each channel,
/// keeping the input's format. Returns the channel set and the paths written.
pub fn explode_file<P: AsRef<Path>>(
    path: P,
    prefix: &str,
    cfg: &PbrConfig,
) -> Result<(PbrChannelSet, Vec<PathBuf>), Err> {
    let path = path.as_ref();
    let data = fs::read(path).map_err(io_err(path))?;
    let (img, format) = decode_image(&data)?;
    tracing::debug!("Decoded image with format: {:?}", format);

    let extension = if path.to_string_lossy().ends_with("png") { "png" } else { "jpeg" };
    let pbr = explode(&img, cfg);
    let mut written = Vec::new();
    for (channel, channel_img) in pbr.named_channels() {
        let out = PathBuf::from(format!("{}_{}.{}", prefix, channel, extension));
        if extension == "png" {
            channel_img.save_with_format(&out, image::ImageFormat::Png)?;
        } else {
            DynamicImage::ImageRgba8(channel_img.clone())
                .to_rgb8()
                .save_with_format(&out, image::ImageFormat::Jpeg)?;
        }
        written.push(out);
    }
    Ok((pbr, written))
}
