use image::{Rgba, RgbaImage};

use crate::core::shared::ConfigType;

/// Constants used to unpack a gearstack image. The defaults were fitted against sample assets
/// and can be tuned per asset family.
#[derive(Debug, Clone, PartialEq)]
pub struct PbrConfig {
    pub invert_ao: bool,
    pub invert_roughness: bool,
    pub invert_metalness: bool,
    /// Bits of the alpha channel that carry metalness.
    pub metalness_mask: u8,
    /// Number of metalness levels packed into the masked bits.
    pub metalness_levels: f64,
    /// Blue values at or below this floor carry no emission.
    pub emissive_floor: u8,
}

impl ConfigType for PbrConfig {
    fn default() -> Self {
        Self {
            invert_ao: true,
            invert_roughness: true,
            invert_metalness: false,
            metalness_mask: 0x1F,
            metalness_levels: 32.0,
            emissive_floor: 40,
        }
    }
}

/// Grayscale PBR channels decoded from one gearstack image. Each image stores the channel value
/// in R, G and B with an opaque alpha.
#[derive(Debug, Clone, PartialEq)]
pub struct PbrChannelSet {
    pub ambient_occlusion: RgbaImage,
    pub metalness: RgbaImage,
    pub roughness: RgbaImage,
    pub emissive: RgbaImage,
}

impl PbrChannelSet {
    /// Channel images paired with the name substituted for "gearstack" in output file names.
    pub fn named_channels(&self) -> [(&'static str, &RgbaImage); 4] {
        [
            ("AO", &self.ambient_occlusion),
            ("metalness", &self.metalness),
            ("roughness", &self.roughness),
            ("emissive", &self.emissive),
        ]
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.ambient_occlusion.dimensions()
    }
}

/// Splits a gearstack into its PBR channels.
pub fn explode(gearstack: &RgbaImage, cfg: &PbrConfig) -> PbrChannelSet {
    let (width, height) = gearstack.dimensions();
    let mut ambient_occlusion = RgbaImage::new(width, height);
    let mut metalness = RgbaImage::new(width, height);
    let mut roughness = RgbaImage::new(width, height);
    let mut emissive = RgbaImage::new(width, height);

    for (x, y, pixel) in gearstack.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        ambient_occlusion.put_pixel(x, y, gray(invert_if(r, cfg.invert_ao)));
        metalness.put_pixel(x, y, gray(invert_if(metalness_of(a, cfg), cfg.invert_metalness)));
        roughness.put_pixel(x, y, gray(invert_if(g, cfg.invert_roughness)));
        emissive.put_pixel(x, y, gray(emissive_of(b, cfg)));
    }

    PbrChannelSet {
        ambient_occlusion,
        metalness,
        roughness,
        emissive,
    }
}

fn metalness_of(alpha: u8, cfg: &PbrConfig) -> u8 {
    let masked = alpha & cfg.metalness_mask;
    ((masked as f64 / cfg.metalness_levels) * 255.0).clamp(0.0, 255.0) as u8
}

fn emissive_of(blue: u8, cfg: &PbrConfig) -> u8 {
    let floor = cfg.emissive_floor as f64;
    let span = 255.0 - floor;
    if span <= 0.0 {
        return 0;
    }
    (255.0 * (blue as f64 - floor) / span).clamp(0.0, 255.0) as u8
}

fn invert_if(value: u8, invert: bool) -> u8 {
    if invert {
        255 - value
    } else {
        value
    }
}

fn gray(value: u8) -> Rgba<u8> {
    Rgba([value, value, value, 255])
}
