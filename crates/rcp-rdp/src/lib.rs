//! Driver for the rasterizer half of the co-processor.
//!
//! Drawing requests are packed into command words by [`cmd`], staged in a
//! ring buffer in RDRAM by [`ring`], and handed to the hardware through
//! the display-processor register port. The driver itself is the [`Rdp`]
//! state machine: it tracks the attached output surface, the texture
//! resident in TMEM, and the pipeline mode bits that draws depend on.
//!
//! Completion is interrupt-driven: [`Rdp::detach`] issues a full-sync
//! barrier and parks the caller until the platform layer reports the
//! completion interrupt through the cloneable [`DpInterrupt`] handle.

#![forbid(unsafe_code)]

pub mod cmd;
pub mod ring;
pub mod texture;

use std::sync::{Arc, Condvar, Mutex};

use rcp_hw::{DpPort, Rdram};

use crate::ring::CommandRing;

pub use crate::cmd::{
    AlphaDither, CycleKind, Mirror, PaletteUpload, RectParams, Rgba, RgbDither, TriangleMode,
};
pub use crate::ring::{RING_CAPACITY, RING_SLACK};
pub use crate::texture::{PixelDepth, Surface, TexFormat, Texture, TextureSlot};

/// Pipeline barrier strength, strongest first.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SyncKind {
    /// Drain everything and raise the completion interrupt.
    Full,
    /// Wait for the pipeline before reconfiguring it.
    Pipe,
    /// Wait for a tile's samplers before retargeting the tile.
    Tile,
    /// Wait for a texture load before drawing with it.
    Load,
}

impl SyncKind {
    pub fn opcode(self) -> u32 {
        match self {
            SyncKind::Full => 0xE900_0000,
            SyncKind::Pipe => 0xE700_0000,
            SyncKind::Tile => 0xE800_0000,
            SyncKind::Load => 0xE600_0000,
        }
    }
}

/// Whether texture loads write the CPU cache back over the pixel data
/// before the hardware fetches it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum FlushStrategy {
    /// Caller guarantees coherency (uncached writes or pre-flushed assets).
    DontFlush,
    #[default]
    Automatic,
}

struct SyncState {
    pending: u32,
    connected: bool,
}

struct SyncShared {
    state: Mutex<SyncState>,
    cond: Condvar,
}

/// Completion-interrupt handle for the rasterizer driver.
///
/// Cloneable and callable from any thread. The platform layer calls
/// [`DpInterrupt::raise`] from its interrupt context whenever the
/// full-sync completion interrupt fires; [`Rdp::detach`] consumes the
/// notification. Raising after [`Rdp::close`] is a no-op.
#[derive(Clone)]
pub struct DpInterrupt {
    shared: Arc<SyncShared>,
}

impl DpInterrupt {
    pub fn raise(&self) {
        let mut state = self.shared.state.lock().unwrap();
        if state.connected {
            state.pending += 1;
            self.shared.cond.notify_all();
        }
    }
}

/// Driver state for the rasterizer.
///
/// One instance owns the register port and the ring buffer; every public
/// method queues complete commands and kicks them immediately, so the
/// hardware never observes a half-written command.
pub struct Rdp<D: DpPort, M: Rdram> {
    dp: D,
    mem: M,
    ring: CommandRing,
    slot: TextureSlot,
    attached: Option<Surface>,
    flush: FlushStrategy,
    /// Per-pixel S advance of the current mode in 5.10 fixed point: 4096
    /// in copy mode, 1024 in one-cycle, 512 in two-cycle.
    pixel_advance: i16,
    filter: bool,
    alpha_blend: bool,
    palette_mode: bool,
    atomic_primitive: bool,
    rgb_dither: RgbDither,
    alpha_dither: AlphaDither,
    triangle_mode: TriangleMode,
    /// Running Y offset for stacked centered draws, and the extra pixel
    /// accumulator that keeps scaled stacks seamless.
    stack_offset: i16,
    stack_extra: u16,
    sync_full: Arc<SyncShared>,
}

impl<D: DpPort, M: Rdram> Rdp<D, M> {
    /// Brings the rasterizer up: unmasks the completion interrupt and
    /// seeds the primitive color, which powers up as garbage.
    ///
    /// `ring_base` is the physical address of the command ring; the
    /// caller reserves [`RING_CAPACITY`] bytes there.
    pub fn new(dp: D, mem: M, ring_base: u32) -> (Self, DpInterrupt) {
        let shared = Arc::new(SyncShared {
            state: Mutex::new(SyncState {
                pending: 0,
                connected: true,
            }),
            cond: Condvar::new(),
        });
        let mut rdp = Rdp {
            dp,
            mem,
            ring: CommandRing::new(ring_base),
            slot: TextureSlot::default(),
            attached: None,
            flush: FlushStrategy::Automatic,
            pixel_advance: 4096,
            filter: false,
            alpha_blend: false,
            palette_mode: false,
            atomic_primitive: true,
            rgb_dither: RgbDither::Disabled,
            alpha_dither: AlphaDither::Disabled,
            triangle_mode: TriangleMode::Textured,
            stack_offset: 0,
            stack_extra: 0,
            sync_full: shared.clone(),
        };
        rdp.dp.set_interrupt(true);
        rdp.set_prim_color(Rgba::WHITE);
        (rdp, DpInterrupt { shared })
    }

    /// Masks the completion interrupt and disconnects the interrupt
    /// handle; later raises are dropped.
    pub fn close(mut self) {
        self.dp.set_interrupt(false);
        self.sync_full.state.lock().unwrap().connected = false;
    }

    fn submit(&mut self, words: &[u32]) {
        for &word in words {
            self.ring.queue(&self.mem, word);
        }
        self.ring.send(&mut self.dp, &self.mem);
    }

    /// Points the rasterizer at an output surface. Draws land there until
    /// the next attach or [`Rdp::detach`].
    pub fn attach(&mut self, surface: &Surface) {
        self.submit(&[
            0xFF00_0000 | surface.depth.format_field() | (surface.width as u32 - 1),
            surface.addr,
        ]);
        self.attached = Some(*surface);
    }

    /// Releases the attached surface once the rasterizer has drained.
    ///
    /// Issues the strongest barrier and parks the caller until the
    /// completion interrupt arrives through [`DpInterrupt::raise`]. With
    /// interrupt delivery masked the wait is skipped and ordering is on
    /// the caller.
    pub fn detach(&mut self) {
        self.sync_full.state.lock().unwrap().pending = 0;
        self.sync(SyncKind::Full);
        if self.dp.interrupts_enabled() {
            let mut state = self.sync_full.state.lock().unwrap();
            while state.pending == 0 {
                state = self.sync_full.cond.wait(state).unwrap();
            }
        }
        self.sync_full.state.lock().unwrap().pending = 0;
        self.attached = None;
    }

    /// Emits a pipeline barrier.
    pub fn sync(&mut self, kind: SyncKind) {
        self.submit(&[kind.opcode(), 0]);
    }

    /// Restricts drawing to a screen rectangle.
    pub fn set_clipping(&mut self, tx: u32, ty: u32, bx: u32, by: u32) {
        self.submit(&[0xED00_0000 | (tx << 14) | (ty << 2), (bx << 14) | (by << 2)]);
    }

    /// Opens the clip rectangle to the full attached surface. Without an
    /// attached surface there is nothing to size against; the call is
    /// dropped.
    pub fn set_default_clipping(&mut self) {
        match self.attached {
            Some(surface) => {
                self.set_clipping(0, 0, surface.width as u32, surface.height as u32)
            }
            None => tracing::debug!("default clip requested with no surface attached"),
        }
    }

    /// Fill mode: rectangles paint the fill color.
    pub fn enable_primitive_fill(&mut self) {
        self.submit(&[0xEFB0_00FF, 0x0000_4000]);
    }

    /// Fill mode variant that runs the blender, for translucent fills.
    pub fn enable_blend_fill(&mut self) {
        self.submit(&[0xEF00_00FF, 0x8000_0000]);
    }

    /// Copy mode: textured rectangles stamp TMEM texels four per clock,
    /// with no filtering or blending.
    pub fn enable_texture_copy(&mut self) {
        self.submit(&[
            0xEF20_00FF
                | (self.atomic_primitive as u32) << 23
                | (self.palette_mode as u32) << 15,
            0x0000_4001,
        ]);
        self.pixel_advance = 4096;
    }

    /// Full pipeline at one or two clocks per pixel, assembling the mode
    /// word from the accumulated toggles, then a matching color-combiner
    /// setup.
    pub fn set_cycle(&mut self, kind: CycleKind) {
        let (cycle, advance) = match kind {
            CycleKind::One => (0u32, 1024),
            CycleKind::Two => (1, 512),
        };
        self.pixel_advance = advance;
        self.submit(&[
            0x2F00_0800
                | (self.atomic_primitive as u32) << 23
                | cycle << 20
                | (self.palette_mode as u32) << 15
                | (self.filter as u32) << 13
                | (self.rgb_dither as u32) << 6
                | (self.alpha_dither as u32) << 4,
            0x0040_4040,
        ]);
        self.submit(&[0x3C00_0061, 0x082C_01C0 | self.alpha_bits()]);
    }

    fn alpha_bits(&self) -> u32 {
        if self.alpha_blend {
            0x3F
        } else {
            0
        }
    }

    /// Bilinear filtering for scaled draws; takes effect at the next
    /// [`Rdp::set_cycle`].
    pub fn set_filter(&mut self, enabled: bool) {
        self.filter = enabled;
    }

    /// Alpha blending for subsequent combiner setups.
    pub fn set_alpha_blend(&mut self, enabled: bool) {
        self.alpha_blend = enabled;
    }

    /// Routes texel fetches through the color lookup table; takes effect
    /// at the next mode change.
    pub fn set_palette_mode(&mut self, enabled: bool) {
        self.palette_mode = enabled;
    }

    /// Serializes primitives that touch the same pixels. On by default;
    /// turning it off is faster and flickers on overlap.
    pub fn set_atomic_primitive(&mut self, enabled: bool) {
        self.atomic_primitive = enabled;
    }

    pub fn set_rgb_dither(&mut self, dither: RgbDither) {
        self.rgb_dither = dither;
    }

    pub fn set_alpha_dither(&mut self, dither: AlphaDither) {
        self.alpha_dither = dither;
    }

    /// Combiner preset: add texel color to the framebuffer.
    pub fn additive_blending(&mut self) {
        self.submit(&[0x3C00_0061, 0x082C_017F]);
    }

    /// Combiner preset: scale texel color by the primitive color.
    pub fn intensify(&mut self) {
        self.submit(&[0x3C00_00C1, 0x032C_00C0 | self.alpha_bits()]);
    }

    /// Combiner preset: replace texel color with the primitive color,
    /// keeping texel alpha as the mask.
    pub fn silhouette(&mut self) {
        self.submit(&[0x3C00_0063, 0x082C_01C0 | self.alpha_bits()]);
    }

    /// Combiner preset: modulate by hardware noise, everywhere when
    /// `full`, otherwise only where the texel participates.
    pub fn noise(&mut self, full: bool) {
        let select = if full { 3 } else { 1 };
        self.submit(&[0x3C00_00E0 | select, 0x082C_01C0 | self.alpha_bits()]);
    }

    /// Color painted by fill-mode rectangles, already packed for the
    /// attached surface's depth (twice 5551 at 16 bits, 8888 at 32).
    pub fn set_fill_color(&mut self, packed: u32) {
        self.submit(&[0xF700_0000, packed]);
    }

    /// Primitive color, the combiner presets' scale input.
    pub fn set_prim_color(&mut self, color: Rgba) {
        self.submit(&[0x3A00_0000, color.packed()]);
    }

    /// Blend color, used by the blender in fill-blend and two-cycle modes.
    pub fn set_blend_color(&mut self, color: Rgba) {
        self.submit(&[0x3900_0000, color.packed()]);
    }

    /// Whether texture loads flush the CPU cache over the pixels first.
    pub fn set_flush_strategy(&mut self, strategy: FlushStrategy) {
        self.flush = strategy;
    }

    /// Loads a texture into TMEM, replacing whatever was resident.
    /// Color-indexed formats take the palette path; the palette itself is
    /// loaded separately through [`Rdp::load_palette`].
    pub fn load_texture(&mut self, tex: &Texture) {
        if self.flush == FlushStrategy::Automatic {
            self.mem.writeback(tex.data, tex.data_len());
        }
        if tex.format.is_palette() {
            let (commands, slot) = cmd::load_texture_palette(tex);
            for command in commands {
                self.submit(&command);
            }
            self.slot = slot;
        } else {
            let (commands, slot) = cmd::load_texture_direct(tex);
            for command in commands {
                self.submit(&command);
            }
            self.slot = slot;
        }
    }

    /// Loads a dynamically generated packed 16-bit buffer into TMEM. No
    /// cache flush is issued; generated pixels are expected to be written
    /// uncached.
    pub fn load_texture_buffer(&mut self, addr: u32, width: u16, height: u16) {
        let (commands, slot) = cmd::load_texture_buffer(addr, width, height);
        for command in commands {
            self.submit(&command);
        }
        self.slot = slot;
    }

    /// Uploads a color table for indexed textures.
    pub fn load_palette(&mut self, upload: PaletteUpload, palette_addr: u32) {
        if self.flush == FlushStrategy::Automatic {
            let len = match upload {
                PaletteUpload::Banks { count } if (1..16).contains(&count) => {
                    (count as u32) << 5
                }
                PaletteUpload::Banks { .. } => 32,
                PaletteUpload::Full256 => 512,
            };
            self.mem.writeback(palette_addr, len);
        }
        for command in cmd::load_tlut(upload, palette_addr) {
            self.submit(&command);
        }
    }

    /// Draws the resident texture into a screen rectangle at 1:1 scale.
    pub fn draw_textured_rectangle(&mut self, tx: i32, ty: i32, bx: i32, by: i32, mirror: Mirror) {
        self.draw_textured_rectangle_scaled(tx, ty, bx, by, 1.0, 1.0, mirror);
    }

    /// Draws the resident texture into a screen rectangle, stretching it
    /// by the given factors. Draws that cannot be encoded safely are
    /// skipped.
    pub fn draw_textured_rectangle_scaled(
        &mut self,
        tx: i32,
        ty: i32,
        bx: i32,
        by: i32,
        x_scale: f64,
        y_scale: f64,
        mirror: Mirror,
    ) {
        let params = RectParams {
            tx,
            ty,
            bx,
            by,
            x_scale,
            y_scale,
            mirror,
        };
        match cmd::textured_rectangle(&self.slot, self.pixel_advance, params) {
            Some(words) => self.submit(&words),
            None => tracing::debug!(?params, "textured rectangle fully clipped; skipped"),
        }
    }

    /// Draws the resident texture at its natural size.
    pub fn draw_sprite(&mut self, x: i32, y: i32, mirror: Mirror) {
        self.draw_textured_rectangle_scaled(
            x,
            y,
            x + self.slot.width as i32,
            y + self.slot.height as i32,
            1.0,
            1.0,
            mirror,
        );
    }

    /// Draws the resident texture scaled, rounding the extent to the
    /// nearest pixel.
    pub fn draw_sprite_scaled(&mut self, x: i32, y: i32, x_scale: f32, y_scale: f32, mirror: Mirror) {
        let new_width = ((self.slot.width as f32 * x_scale) as f64 + 0.5) as i32;
        let new_height = ((self.slot.height as f32 * y_scale) as f64 + 0.5) as i32;
        self.draw_textured_rectangle_scaled(
            x,
            y,
            x + new_width,
            y + new_height,
            x_scale as f64,
            y_scale as f64,
            mirror,
        );
    }

    /// Draws the resident texture positioned by its pivot instead of its
    /// corner. `center` overrides the pivot baked into the asset;
    /// mirroring repositions around the opposite edge so the pivot stays
    /// put on screen.
    ///
    /// With `stack` set, consecutive calls advance a running Y offset by
    /// one texture height per draw (upward when Y-mirrored), so tall
    /// images split into TMEM-sized strips can be drawn slot by slot.
    /// The first non-stacked call resets the offset.
    pub fn draw_sprite_centered(
        &mut self,
        x: i32,
        y: i32,
        mirror: Mirror,
        center: Option<(i32, i32)>,
        stack: bool,
    ) {
        let (cp_x, cp_y) = center.unwrap_or((self.slot.center_x as i32, self.slot.center_y as i32));
        let cp_x = cp_x - self.slot.trim as i32;

        let mut x = x;
        let mut y = y;
        if mirror.x() {
            x -= self.slot.width as i32 - cp_x - 1;
        } else {
            x -= cp_x;
        }
        let next_line: i16;
        if mirror.y() {
            y -= self.slot.height as i32 - cp_y;
            next_line = -(self.slot.height as i16) - 1;
        } else {
            y -= cp_y;
            next_line = self.slot.height as i16 + 1;
        }

        let line = self.stack_offset as i32;
        self.draw_textured_rectangle_scaled(
            x,
            y + line,
            x + self.slot.width as i32,
            y + self.slot.height as i32 + line,
            1.0,
            1.0,
            mirror,
        );

        if stack {
            self.stack_offset = self.stack_offset.wrapping_add(next_line);
        } else {
            self.stack_offset = 0;
        }
    }

    /// Scaled variant of [`Rdp::draw_sprite_centered`]. The pivot scales
    /// with the draw; stacking accumulates an extra pixel per strip to
    /// absorb the rounding that scaling introduces between strips.
    pub fn draw_sprite_centered_scaled(
        &mut self,
        x: i32,
        y: i32,
        x_scale: f32,
        y_scale: f32,
        mirror: Mirror,
        center: Option<(i32, i32)>,
        stack: bool,
    ) {
        let (cp_x, cp_y) = center.unwrap_or((self.slot.center_x as i32, self.slot.center_y as i32));
        let cp_x = cp_x - self.slot.trim as i32;

        let cp_x1 = (cp_x as f32 * x_scale) as i32;
        let cp_y1 = (cp_y as f32 * y_scale - (y_scale - 1.0)) as i32;
        let mut new_width = ((self.slot.width as f32 * x_scale) as f64 + 0.5) as i32;
        let mut new_height = ((self.slot.height as f32 * y_scale) as f64 + 0.5) as i32;
        let mut scaled_line = (self.stack_offset as f32 * y_scale) as i32;

        if y_scale > 1.0 {
            new_height = (new_height as f32 + (y_scale - 1.0)) as i32;
        }
        if x_scale > 1.0 {
            new_width = (new_width as f32 + (x_scale - 1.0)) as i32;
        }

        let mut x = x;
        let mut y = y;
        if mirror.x() {
            x -= new_width - cp_x1 - 1;
        } else {
            x -= cp_x1;
        }
        let next_line: i16;
        if mirror.y() {
            y -= new_height - cp_y1;
            next_line = -(self.slot.height as i16);
            scaled_line -= self.stack_extra as i32;
        } else {
            y -= cp_y1;
            next_line = self.slot.height as i16;
            scaled_line += self.stack_extra as i32;
        }

        self.draw_textured_rectangle_scaled(
            x,
            y + scaled_line,
            x + new_width,
            y + new_height + scaled_line,
            x_scale as f64,
            y_scale as f64,
            mirror,
        );

        if stack {
            self.stack_offset = self.stack_offset.wrapping_add(next_line);
            self.stack_extra = self.stack_extra.wrapping_add(1);
        } else {
            self.stack_offset = 0;
            self.stack_extra = 0;
        }
    }

    /// Paints a rectangle with the fill color. Origins clamp to the
    /// screen edge; the bottom-right corner is trusted.
    pub fn draw_filled_rectangle(&mut self, tx: i32, ty: i32, bx: i32, by: i32) {
        let tx = tx.max(0);
        let ty = ty.max(0);
        self.submit(&[0xF600_0000 | cmd::pack_xy(bx, by), cmd::pack_xy(tx, ty)]);
    }

    /// Selects the edge-command family used by triangle draws.
    pub fn set_triangle_mode(&mut self, mode: TriangleMode) {
        self.triangle_mode = mode;
    }

    /// Draws a filled triangle; vertices may be in any winding.
    pub fn draw_filled_triangle(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x3: f32, y3: f32) {
        let words = cmd::filled_triangle(self.triangle_mode, [(x1, y1), (x2, y2), (x3, y3)]);
        self.submit(&words);
    }

    /// Appends a raw word to the in-flight command, for commands the
    /// driver has no builder for.
    pub fn queue_word(&mut self, word: u32) {
        self.ring.queue(&self.mem, word);
    }

    /// Sends whatever [`Rdp::queue_word`] accumulated.
    pub fn flush(&mut self) {
        self.ring.send(&mut self.dp, &self.mem);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    use pretty_assertions::assert_eq;
    use rcp_hw::{FakeDp, VecRdram};

    use super::*;

    const RING_BASE: u32 = 0x0010_0000;

    fn fresh() -> (Rdp<FakeDp, VecRdram>, DpInterrupt, FakeDp, VecRdram) {
        let mem = VecRdram::new(0x0020_0000);
        let dp = FakeDp::with_rdram(mem.clone());
        let (rdp, interrupt) = Rdp::new(dp.clone(), mem.clone(), RING_BASE);
        (rdp, interrupt, dp, mem)
    }

    #[test]
    fn bring_up_unmasks_the_interrupt_and_seeds_prim_color() {
        let (_rdp, _interrupt, dp, _mem) = fresh();
        assert!(dp.interrupt_mask());
        assert_eq!(dp.take_streams(), vec![vec![0x3A00_0000, 0xFFFF_FFFF]]);
    }

    #[test]
    fn close_masks_the_interrupt() {
        let (rdp, interrupt, dp, _mem) = fresh();
        rdp.close();
        assert!(!dp.interrupt_mask());
        // Late interrupts are dropped, not queued against a dead driver.
        interrupt.raise();
    }

    #[test]
    fn detach_parks_until_the_completion_interrupt() {
        let (mut rdp, interrupt, dp, _mem) = fresh();
        dp.take_streams();

        // Keep raising until the wait is over; detach clears stale
        // notifications before it parks, so a single early raise could be
        // consumed by the reset.
        let done = Arc::new(AtomicBool::new(false));
        let raiser = {
            let done = done.clone();
            thread::spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    interrupt.raise();
                    thread::yield_now();
                }
            })
        };
        rdp.detach();
        done.store(true, Ordering::Relaxed);
        raiser.join().unwrap();

        assert_eq!(dp.take_streams(), vec![vec![0xE900_0000, 0]]);
    }

    #[test]
    fn detach_skips_the_wait_when_interrupts_are_masked() {
        let (mut rdp, _interrupt, dp, _mem) = fresh();
        dp.set_interrupts_enabled(false);
        dp.take_streams();

        rdp.detach();

        assert_eq!(dp.take_streams(), vec![vec![0xE900_0000, 0]]);
    }

    #[test]
    fn default_clipping_needs_a_surface() {
        let (mut rdp, _interrupt, dp, _mem) = fresh();
        dp.take_streams();

        rdp.set_default_clipping();
        assert_eq!(dp.take_streams(), Vec::<Vec<u32>>::new());

        rdp.attach(&Surface {
            addr: 0x0008_0000,
            width: 320,
            height: 240,
            depth: texture::PixelDepth::Bits16,
        });
        rdp.set_default_clipping();
        let streams = dp.take_streams();
        assert_eq!(
            streams,
            vec![
                vec![0xFF10_013F, 0x0008_0000],
                vec![0xED00_0000, (320 << 14) | (240 << 2)],
            ]
        );
    }

    #[test]
    fn stacked_draws_advance_by_texture_height() {
        let (mut rdp, _interrupt, dp, mem) = fresh();
        rdp.load_texture_buffer(0x0030_0000, 32, 32);
        rdp.enable_texture_copy();
        dp.take_streams();
        mem.take_writebacks();

        rdp.draw_sprite_centered(100, 100, Mirror::None, Some((0, 0)), true);
        rdp.draw_sprite_centered(100, 100, Mirror::None, Some((0, 0)), true);
        rdp.draw_sprite_centered(100, 100, Mirror::None, Some((0, 0)), false);

        let streams = dp.take_streams();
        assert_eq!(streams.len(), 3);
        // Slot height is 31, so each stacked strip starts 32 rows lower.
        assert_eq!(streams[0][1], cmd::pack_xy(100, 100));
        assert_eq!(streams[1][1], cmd::pack_xy(100, 132));
        assert_eq!(streams[2][1], cmd::pack_xy(100, 164));

        // The non-stacked call reset the offset.
        rdp.draw_sprite_centered(100, 100, Mirror::None, Some((0, 0)), false);
        assert_eq!(dp.take_streams()[0][1], cmd::pack_xy(100, 100));
    }
}
