//! Reader and writer for the packed TGX bundle layout shared by geometry and texture bundles.
//!
//! Layout (all integers little-endian):
//! ```text
//! extension      [u8; 4]
//! version        i32
//! header_size    i32
//! file_count     i32
//! name           [u8; 256], null-terminated
//! directory      file_count * { name: [u8; 256], start: i64, length: i64 }
//! data           blobs addressed by absolute (start, length)
//! ```

use std::ops::Range;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::core::bit_coder::{write_fixed_str, ByteReader, ByteWriter, ReaderErr, SliceReader};
use crate::core::shared::read_fixed_str;
use crate::core::texture::ImageFormat;
use crate::io::texture_io::image_format_from_buffer;

/// Size of the fixed header region.
pub const HEADER_LEN: usize = 272;
/// Size of a single directory entry.
pub const ENTRY_LEN: usize = 272;
/// Size of every null-terminated name field.
pub const NAME_LEN: usize = 256;

/// Name of the sub-file holding the JSON mesh and plate description in geometry bundles.
pub const RENDER_METADATA_FILE: &str = "render_metadata.js";

#[remain::sorted]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Err {
    #[error("File '{name}' spans {start}..{start}+{length}, past the {buffer_len}-byte bundle.")]
    TruncatedData {
        name: String,
        start: i64,
        length: i64,
        buffer_len: usize,
    },
    #[error("Directory entry {index} could not be read in full.")]
    TruncatedDirectory { index: usize },
    #[error("Bundle is shorter than the 272-byte header.")]
    TruncatedHeader,
}

/// Directory entry after validation. `range` always lies within the owning buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedFile {
    pub name: String,
    pub range: Range<usize>,
}

/// Borrowed view of one named sub-file.
#[derive(Debug, Clone, Copy)]
pub struct FileView<'a> {
    pub name: &'a str,
    pub data: &'a [u8],
}

/// A sub-file of a texture bundle together with its sniffed image format.
#[derive(Debug, Clone, Copy)]
pub struct TextureFile<'a> {
    pub name: &'a str,
    pub data: &'a [u8],
    pub format: ImageFormat,
}

impl TextureFile<'_> {
    /// File extension matching the sniffed format, including the leading dot.
    pub fn extension(&self) -> &'static str {
        self.format.extension()
    }
}

/// A parsed bundle. The byte buffer is shared; every named file is a view into it.
#[derive(Debug, Clone)]
pub struct Container {
    extension: [u8; 4],
    version: i32,
    header_size: i32,
    name: String,
    files: Vec<NamedFile>,
    lookup: IndexMap<String, usize>,
    data: Arc<[u8]>,
}

impl Container {
    /// The four-byte extension tag, stored verbatim.
    pub fn extension(&self) -> [u8; 4] {
        self.extension
    }

    pub fn extension_str(&self) -> String {
        read_fixed_str(&self.extension)
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn header_size(&self) -> i32 {
        self.header_size
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn entries(&self) -> &[NamedFile] {
        &self.files
    }

    /// The shared buffer the container was parsed from.
    pub fn buffer(&self) -> &Arc<[u8]> {
        &self.data
    }

    /// Looks up a sub-file by name. When several entries share a name, the first one wins.
    pub fn get_file(&self, name: &str) -> Option<FileView<'_>> {
        let idx = *self.lookup.get(name)?;
        Some(self.view(idx))
    }

    pub fn files(&self) -> impl Iterator<Item = FileView<'_>> {
        (0..self.files.len()).map(move |i| self.view(i))
    }

    /// Every sub-file with its sniffed image format. Unrecognized magic bytes are logged and
    /// reported as `ImageFormat::None`.
    pub fn texture_files(&self) -> Vec<TextureFile<'_>> {
        self.files()
            .map(|f| {
                let format = image_format_from_buffer(f.data);
                if format == ImageFormat::None {
                    tracing::warn!("Unknown image magic in '{}' of '{}'", f.name, self.name);
                }
                TextureFile { name: f.name, data: f.data, format }
            })
            .collect()
    }

    fn view(&self, idx: usize) -> FileView<'_> {
        let file = &self.files[idx];
        FileView {
            name: &file.name,
            data: &self.data[file.range.clone()],
        }
    }
}

/// Parses a bundle, taking ownership of its bytes.
pub fn parse<B: Into<Arc<[u8]>>>(bytes: B) -> Result<Container, Err> {
    let data: Arc<[u8]> = bytes.into();
    if data.len() < HEADER_LEN {
        return Err(Err::TruncatedHeader);
    }

    let mut reader = SliceReader::new(&data);
    let extension = reader.read_array::<4>().map_err(|_| Err::TruncatedHeader)?;
    let version = reader.read_i32().map_err(|_| Err::TruncatedHeader)?;
    let header_size = reader.read_i32().map_err(|_| Err::TruncatedHeader)?;
    let file_count = reader.read_i32().map_err(|_| Err::TruncatedHeader)?;
    let name = read_fixed_str(reader.take(NAME_LEN).map_err(|_| Err::TruncatedHeader)?);

    if file_count < 0 {
        return Err(Err::TruncatedDirectory { index: 0 });
    }
    let file_count = file_count as usize;
    tracing::debug!("Bundle '{}' declares {} files", name, file_count);

    let mut directory = Vec::with_capacity(file_count.min(data.len() / ENTRY_LEN));
    for index in 0..file_count {
        let entry = read_entry(&mut reader)
            .map_err(|_| Err::TruncatedDirectory { index })?;
        directory.push(entry);
    }

    let mut files = Vec::with_capacity(directory.len());
    let mut lookup = IndexMap::new();
    for (file_name, start, length) in directory {
        let range = checked_range(start, length, data.len()).ok_or_else(|| Err::TruncatedData {
            name: file_name.clone(),
            start,
            length,
            buffer_len: data.len(),
        })?;

        lookup.entry(file_name.clone()).or_insert(files.len());
        files.push(NamedFile { name: file_name, range });
    }

    Ok(Container {
        extension,
        version,
        header_size,
        name,
        files,
        lookup,
        data,
    })
}

fn read_entry(reader: &mut SliceReader<'_>) -> Result<(String, i64, i64), ReaderErr> {
    let name = read_fixed_str(reader.take(NAME_LEN)?);
    let start = reader.read_i64()?;
    let length = reader.read_i64()?;
    Ok((name, start, length))
}

fn checked_range(start: i64, length: i64, buffer_len: usize) -> Option<Range<usize>> {
    let start = usize::try_from(start).ok()?;
    let length = usize::try_from(length).ok()?;
    let end = start.checked_add(length)?;
    (end <= buffer_len).then_some(start..end)
}

/// Serializes bundles in the layout `parse` reads. Blobs are packed in insertion order directly
/// after the directory.
#[derive(Debug, Clone)]
pub struct ContainerWriter {
    extension: [u8; 4],
    version: i32,
    name: String,
    files: Vec<(String, Vec<u8>)>,
}

impl ContainerWriter {
    pub fn new(extension: [u8; 4], name: impl Into<String>) -> Self {
        Self {
            extension,
            version: 0,
            name: name.into(),
            files: Vec::new(),
        }
    }

    pub fn version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    pub fn add_file(&mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> &mut Self {
        self.files.push((name.into(), data.into()));
        self
    }

    pub fn write(&self) -> Vec<u8> {
        let directory_end = HEADER_LEN + ENTRY_LEN * self.files.len();
        let data_len: usize = self.files.iter().map(|(_, d)| d.len()).sum();
        let mut out = Vec::with_capacity(directory_end + data_len);

        out.write_bytes(&self.extension);
        out.write_u32(self.version as u32);
        out.write_u32(HEADER_LEN as u32);
        out.write_u32(self.files.len() as u32);
        write_fixed_str(&mut out, &self.name, NAME_LEN);

        let mut offset = directory_end;
        for (name, data) in &self.files {
            write_fixed_str(&mut out, name, NAME_LEN);
            out.write_u64(offset as u64);
            out.write_u64(data.len() as u64);
            offset += data.len();
        }
        for (_, data) in &self.files {
            out.write_bytes(data);
        }
        out
    }
}
