//! Pure builders for the rasterizer's command words.
//!
//! Everything here turns a semantic request into the packed big-endian
//! words the hardware fetches; nothing touches the transport or the
//! registers. Screen coordinates pack as `x << 14 | y << 2` (10.2 fixed
//! point per axis), texture coordinates and steps as 5.10, triangle edges
//! as 11.2 and 16.16.

use crate::texture::{TexFormat, Texture, TextureSlot};

/// Mirroring applied when a draw repeats the cached texture.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Mirror {
    #[default]
    None,
    X,
    Y,
    Both,
}

impl Mirror {
    pub fn x(self) -> bool {
        matches!(self, Mirror::X | Mirror::Both)
    }

    pub fn y(self) -> bool {
        matches!(self, Mirror::Y | Mirror::Both)
    }
}

/// Pipeline rate for textured draws outside copy mode.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CycleKind {
    One,
    Two,
}

/// Color dither pattern, bits 7:6 of the cycle-mode word.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RgbDither {
    Square,
    Standard,
    Random,
    #[default]
    Disabled,
}

/// Coverage/alpha dither pattern, bits 5:4 of the cycle-mode word.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum AlphaDither {
    Pattern,
    InvertedPattern,
    Random,
    #[default]
    Disabled,
}

/// Edge-walk command family used for triangle draws. The shaded and
/// textured variants expect the caller to append their coefficient words
/// through the raw-word escape hatch.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum TriangleMode {
    Flat,
    Gouraud,
    #[default]
    Textured,
    GouraudTextured,
    FlatZ,
    GouraudZ,
    TexturedZ,
    GouraudTexturedZ,
}

impl TriangleMode {
    /// Opcode word of the matching edge command.
    pub fn opcode(self) -> u32 {
        match self {
            TriangleMode::Flat => 0x0800_0000,
            TriangleMode::Gouraud => 0x0C00_0000,
            TriangleMode::Textured => 0x0A00_0000,
            TriangleMode::GouraudTextured => 0x0E00_0000,
            TriangleMode::FlatZ => 0x0900_0000,
            TriangleMode::GouraudZ => 0x0D00_0000,
            TriangleMode::TexturedZ => 0x0B00_0000,
            TriangleMode::GouraudTexturedZ => 0x0F00_0000,
        }
    }
}

/// An RGBA color, packed `r << 24 | g << 16 | b << 8 | a` in command words.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Rgba { r, g, b, a }
    }

    pub fn packed(self) -> u32 {
        (self.r as u32) << 24 | (self.g as u32) << 16 | (self.b as u32) << 8 | self.a as u32
    }
}

/// Shape of a palette upload: 4-bit textures use banks of 16 colors out
/// of a shared table, 8-bit textures one full 256-color table.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PaletteUpload {
    /// `count` banks for 4-bit textures; out-of-range counts fall back to
    /// a single bank.
    Banks { count: u8 },
    Full256,
}

/// Packs a screen coordinate pair into the 10.2 fields shared by the
/// rectangle and scissor commands. Signed so that out-of-range inputs
/// spill their sign bits into the word the way the hardware receives them.
pub fn pack_xy(x: i32, y: i32) -> u32 {
    ((x << 14) | (y << 2)) as u32
}

/// Smallest loadable power-of-two footprint covering `n` pixels.
pub fn round_to_power(n: u32) -> u32 {
    match n {
        0..=4 => 4,
        5..=8 => 8,
        9..=16 => 16,
        17..=32 => 32,
        33..=64 => 64,
        65..=128 => 128,
        _ => 256,
    }
}

/// Base-2 log of a footprint from [`round_to_power`], for the tile mask
/// fields.
pub fn size_log2(n: u32) -> u32 {
    match n {
        4 => 2,
        8 => 3,
        16 => 4,
        32 => 5,
        64 => 6,
        128 => 7,
        _ => 8,
    }
}

/// TMEM words per row for a direct-format tile, rounding partial rows up.
fn tile_line(real_width: u32) -> u32 {
    let round = if real_width % 8 != 0 { 1 } else { 0 };
    (((real_width >> 3) + round) << 1) & 0x1FF
}

/// Row pitch for a color-indexed tile. Indexed rows pack half (8-bit) or
/// a quarter (4-bit) of the direct pitch.
fn palette_tile_line(real_width: u32, format: TexFormat) -> u32 {
    let round = if real_width % 8 != 0 { 1 } else { 0 };
    let div = match format {
        TexFormat::Ci4 => 1,
        _ => 0,
    };
    (((real_width >> 3) + round) & 0x1FF) >> div
}

fn load_extent(sh: u32, th: u32) -> u32 {
    ((sh << 2) & 0xFFF) << 12 | ((th << 2) & 0xFFF)
}

/// Words of a direct 16/32-bit texture load: set-texture-image, set-tile
/// with the rounded footprint, then load-tile over the full extent.
/// Returns the commands and the slot state the load leaves resident.
pub fn load_texture_direct(tex: &Texture) -> ([[u32; 2]; 3], TextureSlot) {
    let sh = tex.width as u32 - 1;
    let th = tex.height as u32 - 1;
    let real_w = round_to_power(sh + 1);
    let real_h = round_to_power(th + 1);
    let size = match tex.format {
        TexFormat::Rgba32 => 0x0018_0000,
        _ => 0x0010_0000,
    };
    let commands = [
        [0xFD00_0000 | size | sh, tex.data],
        [
            0xF500_0000 | size | (tile_line(real_w) << 9),
            0x0004_0100 | (size_log2(real_h) << 14) | (size_log2(real_w) << 4),
        ],
        [0xF400_0000, load_extent(sh, th)],
    ];
    (commands, slot_for(tex, real_w, real_h))
}

/// Words of a color-indexed texture load. The image is declared to the
/// loader as packed 16-bit, so its width is given in 16-bit units: four
/// 4-bit or two 8-bit pixels each. A second tile descriptor then exposes
/// the same rows at the indexed pitch for drawing.
pub fn load_texture_palette(tex: &Texture) -> ([[u32; 2]; 4], TextureSlot) {
    let sh = tex.width as u32 - 1;
    let th = tex.height as u32 - 1;
    let real_w = round_to_power(sh + 1);
    let real_h = round_to_power(th + 1);
    let wide = match tex.format {
        TexFormat::Ci4 => (tex.width as u32 >> 2) - 1,
        _ => (tex.width as u32 >> 1) - 1,
    };
    let line = palette_tile_line(real_w, tex.format);
    let index_size = match tex.format {
        TexFormat::Ci8 => 1 << 19,
        _ => 0,
    };
    let commands = [
        [0x3D10_0000 | wide, tex.data],
        [0x3510_0000 | (line << 9), 0x0000_0000],
        [0x3400_0000, load_extent(sh, th)],
        [
            0x3540_0000 | index_size | (line << 9),
            0x0004_0100 | (size_log2(real_h) << 14) | (size_log2(real_w) << 4),
        ],
    ];
    (commands, slot_for(tex, real_w, real_h))
}

/// Words of a dynamic-buffer load (packed 16-bit, no asset metadata).
/// The resident slot keeps a zero pivot and trim.
pub fn load_texture_buffer(addr: u32, width: u16, height: u16) -> ([[u32; 2]; 3], TextureSlot) {
    let sh = width as u32 - 1;
    let th = height as u32 - 1;
    let real_w = round_to_power(sh + 1);
    let real_h = round_to_power(th + 1);
    let commands = [
        [0xFD10_0000 | sh, addr],
        [
            0xF510_0000 | (tile_line(real_w) << 9),
            0x0004_0100 | (size_log2(real_h) << 14) | (size_log2(real_w) << 4),
        ],
        [0xF400_0000, load_extent(sh, th)],
    ];
    let slot = TextureSlot {
        s: 0,
        t: 0,
        width: sh as u16,
        height: th as u16,
        real_width: real_w as u16,
        real_height: real_h as u16,
        center_x: 0,
        center_y: 0,
        trim: 0,
    };
    (commands, slot)
}

fn slot_for(tex: &Texture, real_w: u32, real_h: u32) -> TextureSlot {
    TextureSlot {
        s: 0,
        t: 0,
        width: tex.width - 1,
        height: tex.height - 1,
        real_width: real_w as u16,
        real_height: real_h as u16,
        center_x: tex.center_x,
        center_y: tex.center_y,
        trim: tex.trim,
    }
}

/// Words of a palette upload: point the texture image at the packed
/// colors, set up tile 7, then load the table. Tile 7 keeps the load
/// clear of the drawing tiles.
pub fn load_tlut(upload: PaletteUpload, palette_addr: u32) -> [[u32; 2]; 3] {
    let colors: u8 = match upload {
        PaletteUpload::Banks { count } if (1..16).contains(&count) => {
            // TODO: drop to << 4 (16 colors per bank) once bank spans are
            // verified against hardware; as issued this loads 64 colors
            // per bank and the field truncates past four banks.
            (((count as u32) << 6) - 1) as u8
        }
        PaletteUpload::Banks { .. } => 15,
        PaletteUpload::Full256 => 255,
    };
    [
        [0x3D10_0000, palette_addr],
        [0x3500_0100, 0x0700_0000],
        [0x3000_0000, 0x0700_0000 | (colors as u32) << 12],
    ]
}

/// One textured-rectangle request, before clipping and mirroring.
#[derive(Debug, Copy, Clone)]
pub struct RectParams {
    pub tx: i32,
    pub ty: i32,
    pub bx: i32,
    pub by: i32,
    pub x_scale: f64,
    pub y_scale: f64,
    pub mirror: Mirror,
}

/// Builds the four texture-rectangle words against the resident slot.
///
/// Negative origins clamp to the screen edge and advance the texture
/// origin by the clipped amount in 1/32-pixel steps, scaled by the
/// inverse draw scale. Returns `None` when the draw would start past the
/// cached extent or the clipped rectangle has negative extent; the
/// rasterizer locks up on both. `pixel_advance` is the per-pixel S step
/// of the current mode in 5.10 fixed point; one-cycle mode (1024) also
/// widens the rectangle by one pixel on each axis.
pub fn textured_rectangle(
    slot: &TextureSlot,
    pixel_advance: i16,
    p: RectParams,
) -> Option<[u32; 4]> {
    let RectParams {
        mut tx,
        mut ty,
        mut bx,
        mut by,
        x_scale,
        y_scale,
        mirror,
    } = p;
    let mut s = slot.s;
    let mut t = slot.t;

    if tx < 0 {
        if (tx as f64) < -(slot.width as i32 as f64) * x_scale {
            return None;
        }
        s = s.wrapping_add(((((-tx) << 5) as f64) * (1.0 / x_scale)) as i32 as u16);
        tx = 0;
    }
    if ty < 0 {
        if (ty as f64) < -(slot.height as i32 as f64) * y_scale {
            return None;
        }
        t = t.wrapping_add(((((-ty) << 5) as f64) * (1.0 / y_scale)) as i32 as u16);
        ty = 0;
    }
    if bx < tx || by < ty {
        return None;
    }

    // Mirrored repeats start one full pass further in, padded out to the
    // power-of-two footprint.
    if mirror.x() {
        let w = slot.width as i32 + 1;
        s = s.wrapping_add(((w + ((slot.real_width as i32 - w) << 1)) << 5) as u16);
    }
    if mirror.y() {
        let h = slot.height as i32 + 1;
        t = t.wrapping_add(((h + ((slot.real_height as i32 - h) << 1)) << 5) as u16);
    }

    if pixel_advance == 1024 {
        bx += 1;
        by += 1;
    }

    let dsdx = ((pixel_advance as f64 / x_scale) as i32 & 0xFFFF) as u32;
    let dtdy = ((1024.0 / y_scale) as i32 & 0xFFFF) as u32;

    Some([
        0x2400_0000 | pack_xy(bx, by),
        pack_xy(tx, ty),
        (s as u32) << 16 | t as u32,
        dsdx << 16 | dtdy,
    ])
}

/// Builds the eight-word edge command for a filled triangle.
///
/// Vertices may arrive in any order; they are sorted by ascending Y to
/// find the major and minor edges. The flip bit encodes the winding of
/// the vertices as given: clockwise in screen space leaves it clear,
/// counter-clockwise sets it.
pub fn filled_triangle(mode: TriangleMode, v: [(f32, f32); 3]) -> [u32; 8] {
    let [(mut x1, mut y1), (mut x2, mut y2), (mut x3, mut y3)] = v;

    let winding = (x1 * y2 - x2 * y1) + (x2 * y3 - x3 * y2) + (x3 * y1 - x1 * y3);
    let flip: u32 = if winding < 0.0 { 1 << 23 } else { 0 };

    if y1 > y2 {
        std::mem::swap(&mut x1, &mut x2);
        std::mem::swap(&mut y1, &mut y2);
    }
    if y2 > y3 {
        std::mem::swap(&mut x2, &mut x3);
        std::mem::swap(&mut y2, &mut y3);
    }
    if y1 > y2 {
        std::mem::swap(&mut x1, &mut x2);
        std::mem::swap(&mut y1, &mut y2);
    }

    let yh = (y1 * 4.0) as i32;
    let ym = ((y2 * 4.0) as i32) << 16;
    let yl = (y3 * 4.0) as i32;
    let xh = (x1 * 65536.0) as i32;
    let xm = (x1 * 65536.0) as i32;
    let xl = (x2 * 65536.0) as i32;

    // Degenerate edges would divide by zero; the hardware treats a zero
    // slope as a vertical edge.
    let dxhdy = if y3 == y1 { 0 } else { ((x3 - x1) / (y3 - y1) * 65536.0) as i32 };
    let dxmdy = if y2 == y1 { 0 } else { ((x2 - x1) / (y2 - y1) * 65536.0) as i32 };
    let dxldy = if y3 == y2 { 0 } else { ((x3 - x2) / (y3 - y2) * 65536.0) as i32 };

    [
        mode.opcode() | flip | yl as u32,
        (ym | yh) as u32,
        xl as u32,
        dxldy as u32,
        xh as u32,
        dxhdy as u32,
        xm as u32,
        dxmdy as u32,
    ]
}
