//! Surface and texture descriptors, and the record of what TMEM holds.

/// Pixel storage of an output surface.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PixelDepth {
    Bits16,
    Bits32,
}

impl PixelDepth {
    /// Format/size field of the set-color-image and set-texture-image
    /// commands (RGBA at this depth).
    pub(crate) fn format_field(self) -> u32 {
        match self {
            PixelDepth::Bits16 => 0x0010_0000,
            PixelDepth::Bits32 => 0x0018_0000,
        }
    }
}

/// An output color buffer in RDRAM, as handed over by the display layer.
/// The driver only points the rasterizer at it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Surface {
    pub addr: u32,
    pub width: u16,
    pub height: u16,
    pub depth: PixelDepth,
}

/// Pixel format of a texture asset.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TexFormat {
    Rgba16,
    Rgba32,
    /// 4-bit color-indexed; two pixels per byte.
    Ci4,
    /// 8-bit color-indexed.
    Ci8,
}

impl TexFormat {
    /// Color-indexed formats load through the palette path and sample
    /// through the color lookup table.
    pub fn is_palette(self) -> bool {
        matches!(self, TexFormat::Ci4 | TexFormat::Ci8)
    }

    /// Bytes of pixel data for a `width x height` image in this format.
    pub fn data_len(self, width: u32, height: u32) -> u32 {
        match self {
            TexFormat::Rgba16 => width * height * 2,
            TexFormat::Rgba32 => width * height * 4,
            TexFormat::Ci8 => width * height,
            TexFormat::Ci4 => (width * height) >> 1,
        }
    }
}

/// A texture asset resident in RDRAM.
///
/// `center_x`/`center_y` are the asset's declared pivot for centered
/// draws; `trim` is the count of blank left columns the asset pipeline
/// stripped, re-applied when positioning around the pivot.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Texture {
    /// Physical address of the pixel data.
    pub data: u32,
    pub width: u16,
    pub height: u16,
    pub format: TexFormat,
    pub center_x: u8,
    pub center_y: u8,
    pub trim: u8,
}

impl Texture {
    pub fn data_len(&self) -> u32 {
        self.format.data_len(self.width as u32, self.height as u32)
    }
}

/// What TMEM holds right now. A single slot, overwritten wholesale by
/// every load; every subsequent textured draw is measured against it.
///
/// `width`/`height` store the extent minus one, the way the load commands
/// encode tile sizes. `real_width`/`real_height` are the power-of-two
/// footprint actually programmed into the tile.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TextureSlot {
    /// Texture-space origin of the loaded region, in 1/32-pixel steps.
    pub s: u16,
    pub t: u16,
    pub width: u16,
    pub height: u16,
    pub real_width: u16,
    pub real_height: u16,
    pub center_x: u8,
    pub center_y: u8,
    pub trim: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_len_per_format() {
        assert_eq!(TexFormat::Rgba16.data_len(32, 32), 2048);
        assert_eq!(TexFormat::Rgba32.data_len(32, 32), 4096);
        assert_eq!(TexFormat::Ci8.data_len(32, 32), 1024);
        assert_eq!(TexFormat::Ci4.data_len(32, 32), 512);
    }

    #[test]
    fn palette_formats() {
        assert!(TexFormat::Ci4.is_palette());
        assert!(TexFormat::Ci8.is_palette());
        assert!(!TexFormat::Rgba16.is_palette());
        assert!(!TexFormat::Rgba32.is_palette());
    }
}
