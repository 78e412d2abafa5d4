use std::collections::BTreeMap;

use image::{Rgba, RgbaImage};

use crate::core::shared::PlateIdx;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum ImageFormat {
    None,
    Png,
    Jpeg,
}

impl ImageFormat {
    /// File extension with the leading dot. Empty for `ImageFormat::None`.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => ".png",
            ImageFormat::Jpeg => ".jpg",
            ImageFormat::None => "",
        }
    }

    /// Short format name used in plate file names, e.g. `rock_diffuse.png`.
    pub fn format_name(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::None => "",
        }
    }

    pub fn from_image_format(format: image::ImageFormat) -> Self {
        match format {
            image::ImageFormat::Png => ImageFormat::Png,
            image::ImageFormat::Jpeg => ImageFormat::Jpeg,
            _ => ImageFormat::None,
        }
    }
}

/// The three parallel plate kinds that exist per plate index.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, PartialOrd, Ord)]
pub enum PlateKind {
    Diffuse,
    Normal,
    Gearstack,
}

impl PlateKind {
    pub const ALL: [PlateKind; 3] = [PlateKind::Diffuse, PlateKind::Normal, PlateKind::Gearstack];

    /// Key of this kind in a plate set, also used as the plate file name suffix.
    pub fn as_str(self) -> &'static str {
        match self {
            PlateKind::Diffuse => "diffuse",
            PlateKind::Normal => "normal",
            PlateKind::Gearstack => "gearstack",
        }
    }

    /// Fill color of a freshly allocated plate.
    pub fn default_fill(self) -> Rgba<u8> {
        match self {
            PlateKind::Diffuse => Rgba([0, 0, 0, 255]),
            PlateKind::Normal => Rgba([128, 128, 255, 255]),
            PlateKind::Gearstack => Rgba([0, 0, 0, 0]),
        }
    }
}

/// A texture atlas for one plate index and kind.
#[derive(Clone, Debug, PartialEq)]
pub struct TexturePlate {
    name: String,
    kind: PlateKind,
    plate_index: PlateIdx,
    canvas: RgbaImage,
}

impl TexturePlate {
    /// Allocates a plate of `size` filled with the kind's default color.
    pub fn new(name: String, kind: PlateKind, plate_index: PlateIdx, size: (u32, u32)) -> Self {
        let canvas = RgbaImage::from_pixel(size.0, size.1, kind.default_fill());
        Self { name, kind, plate_index, canvas }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PlateKind {
        self.kind
    }

    pub fn plate_index(&self) -> PlateIdx {
        self.plate_index
    }

    pub fn size(&self) -> (u32, u32) {
        self.canvas.dimensions()
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn material_id(&self) -> String {
        TextureUtils::material_id(self.plate_index)
    }

    pub fn image_library_id(&self) -> String {
        TextureUtils::image_library_id(self.plate_index)
    }

    pub fn effect_id(&self) -> String {
        TextureUtils::effect_id(self.plate_index)
    }

    /// Copies `source` onto the canvas with its top-left corner at `position`, replacing the
    /// destination pixels. The copied region is at most `size` and is clipped to both images.
    pub fn place(&mut self, source: &RgbaImage, position: (u32, u32), size: (u32, u32)) {
        let (canvas_w, canvas_h) = self.canvas.dimensions();
        let width = size.0.min(source.width()).min(canvas_w.saturating_sub(position.0));
        let height = size.1.min(source.height()).min(canvas_h.saturating_sub(position.1));
        for y in 0..height {
            for x in 0..width {
                let pixel = *source.get_pixel(x, y);
                self.canvas.put_pixel(position.0 + x, position.1 + y, pixel);
            }
        }
    }
}

/// Plates of one kind keyed by plate index, iterated in index order.
pub type PlateTable = BTreeMap<PlateIdx, TexturePlate>;

// Helper struct implementing naming utilities shared by the compositor and the writers.
pub struct TextureUtils;

impl TextureUtils {
    pub fn material_id(plate_index: PlateIdx) -> String {
        format!("lambert{}", plate_index)
    }

    pub fn image_library_id(plate_index: PlateIdx) -> String {
        format!("image{}", plate_index)
    }

    pub fn effect_id(plate_index: PlateIdx) -> String {
        format!("effect_lambert{}", plate_index)
    }

    /// Name of a plate composited from the texture tagged `tag`.
    pub fn plate_name(tag: &str, kind: PlateKind, format: ImageFormat) -> String {
        format!("{}_{}.{}", tag, kind.as_str(), format.format_name())
    }

    /// Name of a plate that received no placement.
    pub fn blank_plate_name(plate_index: PlateIdx, kind: PlateKind) -> String {
        format!("blank-{}_{}.png", plate_index, kind.as_str())
    }

    /// Replaces every "gearstack" in a plate name with `channel`, e.g. `rock_gearstack.png`
    /// becomes `rock_AO.png`.
    pub fn channel_name(gearstack_name: &str, channel: &str) -> String {
        gearstack_name.replace(PlateKind::Gearstack.as_str(), channel)
    }

    /// Whether a file with this name is encoded as PNG. Every other name is encoded as JPEG.
    pub fn is_png_name(name: &str) -> bool {
        name.ends_with("png")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_fills() {
        let diffuse = TexturePlate::new("d".to_string(), PlateKind::Diffuse, 0, (4, 4));
        assert!(diffuse.canvas().pixels().all(|p| *p == Rgba([0, 0, 0, 255])));

        let gearstack = TexturePlate::new("g".to_string(), PlateKind::Gearstack, 0, (4, 4));
        assert!(gearstack.canvas().pixels().all(|p| *p == Rgba([0, 0, 0, 0])));

        let normal = TexturePlate::new("n".to_string(), PlateKind::Normal, 0, (2, 3));
        assert_eq!(normal.size(), (2, 3));
        assert!(normal.canvas().pixels().all(|p| *p == Rgba([128, 128, 255, 255])));
    }

    #[test]
    fn identifiers_follow_plate_index() {
        let plate = TexturePlate::new("x".to_string(), PlateKind::Diffuse, 7, (1, 1));
        assert_eq!(plate.material_id(), "lambert7");
        assert_eq!(plate.image_library_id(), "image7");
        assert_eq!(plate.effect_id(), "effect_lambert7");
    }

    #[test]
    fn place_replaces_and_clips() {
        let mut plate = TexturePlate::new("x".to_string(), PlateKind::Gearstack, 0, (4, 4));
        let source = RgbaImage::from_pixel(3, 3, Rgba([10, 20, 30, 0]));
        plate.place(&source, (2, 1), (3, 3));

        // Fully transparent source pixels still replace the destination.
        assert_eq!(*plate.canvas().get_pixel(2, 1), Rgba([10, 20, 30, 0]));
        assert_eq!(*plate.canvas().get_pixel(3, 3), Rgba([10, 20, 30, 0]));
        assert_eq!(*plate.canvas().get_pixel(1, 1), Rgba([0, 0, 0, 0]));
        assert_eq!(*plate.canvas().get_pixel(2, 0), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn place_respects_requested_size() {
        let mut plate = TexturePlate::new("x".to_string(), PlateKind::Diffuse, 0, (4, 4));
        let source = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]));
        plate.place(&source, (0, 0), (2, 1));
        let white = plate.canvas().pixels().filter(|p| p.0 == [255, 255, 255, 255]).count();
        assert_eq!(white, 2);
    }

    #[test]
    fn names() {
        let name = TextureUtils::plate_name("rock", PlateKind::Normal, ImageFormat::Jpeg);
        assert_eq!(name, "rock_normal.jpeg");
        let name = TextureUtils::blank_plate_name(2, PlateKind::Gearstack);
        assert_eq!(name, "blank-2_gearstack.png");
        assert_eq!(TextureUtils::channel_name("rock_gearstack.png", "AO"), "rock_AO.png");
        assert!(TextureUtils::is_png_name("rock_AO.png"));
        assert!(!TextureUtils::is_png_name("rock_AO.jpeg"));
    }
}
