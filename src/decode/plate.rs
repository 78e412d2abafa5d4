use crate::core::scene::ProcessedOutput;
use crate::core::shared::PlateIdx;
use crate::core::texture::{PlateKind, TexturePlate, TextureUtils};
use crate::decode::metadata::{PlateDescription, TexturePlacement, TexturePlates};
use crate::io::texture_io::{self, decode_image, TextureSource};

/// Largest accepted plate width or height.
pub const MAX_PLATE_DIMENSION: u32 = 16384;

#[remain::sorted]
#[derive(Debug, thiserror::Error)]
pub enum Err {
    #[error("Expected exactly one texture matching '{tag}', found {matches}.")]
    AmbiguousOrMissingTexture { tag: String, matches: usize },
    #[error("Plate size of the {kind} plate has {len} entries, expected 2.")]
    InvalidPlateSize { kind: &'static str, len: usize },
    #[error("The {kind} plate is {width}x{height}, larger than 16384 on a side.")]
    PlateTooLarge { kind: &'static str, width: u32, height: u32 },
    #[error("Texture source error: {0}")]
    TextureSourceError(#[from] texture_io::Err),
    #[error("Found {0} texture plate sets, at most one is supported.")]
    TooManyTexturePlates(usize),
}

/// Composites every plate kind of the geometry's plate set into `output`.
///
/// Returns the diffuse plate index the geometry's parts should be assigned, or `None` when the
/// geometry carries no plate set or no diffuse plate.
pub fn composite(
    texture_plates: &[TexturePlates],
    source: &dyn TextureSource,
    output: &mut ProcessedOutput,
) -> Result<Option<PlateIdx>, Err> {
    tracing::info!("Found {} plates", texture_plates.len());
    let plate_set = match texture_plates {
        [] => {
            tracing::warn!("Found 0 plates in this render file");
            return Ok(None);
        }
        [one] => &one.plate_set,
        many => return Err(Err::TooManyTexturePlates(many.len())),
    };

    for kind in PlateKind::ALL {
        if let Some(description) = plate_set.get(kind) {
            composite_plate(kind, description, source, output)?;
        }
    }
    Ok(plate_set.diffuse.as_ref().map(|d| d.plate_index))
}

fn composite_plate(
    kind: PlateKind,
    description: &PlateDescription,
    source: &dyn TextureSource,
    output: &mut ProcessedOutput,
) -> Result<(), Err> {
    let plate_index = description.plate_index;
    let size = match description.plate_size.as_slice() {
        [w, h, ..] => (*w, *h),
        other => {
            return Err(Err::InvalidPlateSize {
                kind: kind.as_str(),
                len: other.len(),
            })
        }
    };
    if size.0 > MAX_PLATE_DIMENSION || size.1 > MAX_PLATE_DIMENSION {
        return Err(Err::PlateTooLarge {
            kind: kind.as_str(),
            width: size.0,
            height: size.1,
        });
    }

    if description.texture_placements.is_empty() {
        // no textures to plate, keep the default fill
        output.plates_mut(kind).entry(plate_index).or_insert_with(|| {
            let name = TextureUtils::blank_plate_name(plate_index, kind);
            TexturePlate::new(name, kind, plate_index, size)
        });
        return Ok(());
    }

    for placement in &description.texture_placements {
        place(kind, plate_index, size, placement, source, output)?;
    }
    Ok(())
}

fn place(
    kind: PlateKind,
    plate_index: PlateIdx,
    size: (u32, u32),
    placement: &TexturePlacement,
    source: &dyn TextureSource,
    output: &mut ProcessedOutput,
) -> Result<(), Err> {
    let tag = &placement.texture_tag_name;
    let matches = source.find(tag)?;
    let [name] = matches.as_slice() else {
        tracing::error!("Found {} texture files matching name {}", matches.len(), tag);
        return Err(Err::AmbiguousOrMissingTexture {
            tag: tag.clone(),
            matches: matches.len(),
        });
    };

    let (img, format) = decode_image(&source.read(name)?)?;
    tracing::debug!("Successfully decoded image with format: {:?}", format);

    let plate = output.plates_mut(kind).entry(plate_index).or_insert_with(|| {
        let name = TextureUtils::plate_name(tag, kind, format);
        TexturePlate::new(name, kind, plate_index, size)
    });
    plate.place(
        &img,
        (placement.position_x, placement.position_y),
        (placement.texture_size_x, placement.texture_size_y),
    );
    Ok(())
}
