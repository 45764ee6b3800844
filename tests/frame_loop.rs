//! One frame of work driven through both halves of the co-processor
//! against the fake register ports, sharing a single RDRAM: a microcode
//! job on the vector unit, then a clear and a sprite on the rasterizer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use pretty_assertions::assert_eq;
use rcp_hw::{FakeDp, FakeSp, Rdram, VecRdram};
use rcp_rdp::{Mirror, PixelDepth, Rdp, Surface, TexFormat, Texture};
use rcp_rsp::{JobState, Rsp};

const LIB_ADDR: u32 = 0x0003_0000;
const SCREEN_ADDR: u32 = 0x0008_0000;
const RING_BASE: u32 = 0x0010_0000;
const SPRITE_ADDR: u32 = 0x0030_0000;
const STAGE_ADDR: u32 = 0x0040_0000;

fn put_u32(image: &mut [u8], at: usize, v: u32) {
    image[at..at + 4].copy_from_slice(&v.to_be_bytes());
}

/// A minimal library image: one "graphics" module with one entry.
fn library_image() -> Vec<u8> {
    let mut image = vec![0u8; 0x2000];
    put_u32(&mut image, 0x1000, 0x1100);
    put_u32(&mut image, 0x1004, 0x1180);
    image[0x1100..0x1109].copy_from_slice(b"graphics\0");
    put_u32(&mut image, 0x1180, 0x1080);
    image
}

#[test]
fn frame_loop_runs_both_units() {
    let mem = VecRdram::new(0x0080_0000);
    mem.write(LIB_ADDR, &library_image()).unwrap();

    let sp = FakeSp::new(mem.clone());
    let (rsp, sp_interrupt) = Rsp::new(sp.clone());
    rsp.load_library(LIB_ADDR);

    let dp = FakeDp::with_rdram(mem.clone());
    let (mut rdp, dp_interrupt) = Rdp::new(dp.clone(), mem.clone(), RING_BASE);

    // Geometry pass on the vector unit.
    let entry = rsp.module_entry("graphics", 0).unwrap();
    let job = rsp.new_job(entry, &[SCREEN_ADDR, 320, 240]).unwrap();
    let worker = {
        let sp = sp.clone();
        thread::spawn(move || {
            while !sp.running() {
                thread::yield_now();
            }
            sp.finish_job();
            sp_interrupt.raise();
        })
    };
    rsp.run_job(job).unwrap();
    worker.join().unwrap();
    assert_eq!(sp.pc(), 0x1080);
    assert_eq!(rsp.job_state(job), Ok(JobState::Idle));
    rsp.dispose_job(job).unwrap();

    // Raster pass: clear the frame, one sprite, retire.
    dp.take_streams();
    rdp.attach(&Surface {
        addr: SCREEN_ADDR,
        width: 320,
        height: 240,
        depth: PixelDepth::Bits16,
    });
    rdp.set_default_clipping();
    rdp.enable_primitive_fill();
    rdp.set_fill_color(0xF801_F801);
    rdp.draw_filled_rectangle(0, 0, 319, 239);
    rdp.enable_texture_copy();
    rdp.load_texture(&Texture {
        data: SPRITE_ADDR,
        width: 32,
        height: 32,
        format: TexFormat::Rgba16,
        center_x: 0,
        center_y: 0,
        trim: 0,
    });
    rdp.draw_sprite(40, 50, Mirror::None);

    // Detach parks on the completion interrupt; feed it from a thread.
    let done = Arc::new(AtomicBool::new(false));
    let raiser = {
        let done = done.clone();
        thread::spawn(move || {
            while !done.load(Ordering::SeqCst) {
                dp_interrupt.raise();
                thread::yield_now();
            }
        })
    };
    rdp.detach();
    done.store(true, Ordering::SeqCst);
    raiser.join().unwrap();

    let streams = dp.take_streams();
    assert_eq!(streams[0], vec![0xFF10_013F, SCREEN_ADDR]);
    assert!(streams.iter().any(|s| s[0] == 0xF700_0000));
    assert_eq!(streams.last().unwrap(), &vec![0xE900_0000, 0]);
    assert!(mem
        .take_writebacks()
        .iter()
        .any(|&(addr, len)| addr == SPRITE_ADDR && len == 2048));

    rdp.close();
    rsp.close();
    assert!(!dp.interrupt_mask());
    assert!(!sp.interrupt_mask());
}

#[test]
fn vector_unit_stages_pixels_the_rasterizer_draws() {
    let mem = VecRdram::new(0x0080_0000);
    let sp = FakeSp::new(mem.clone());
    let (rsp, _sp_interrupt) = Rsp::new(sp.clone());
    let dp = FakeDp::with_rdram(mem.clone());
    let (mut rdp, _dp_interrupt) = Rdp::new(dp.clone(), mem.clone(), RING_BASE);

    // Bounce a tile of pixels through SP memory into the staging buffer.
    let pixels: Vec<u8> = (0u8..64).collect();
    mem.write(0x0002_0000, &pixels).unwrap();
    rsp.dma_to_sp(0x200, 0x0002_0000, 64);
    rsp.wait_dma();
    rsp.dma_to_dram(0x200, STAGE_ADDR, 64);
    let mut staged = vec![0u8; 64];
    mem.read(STAGE_ADDR, &mut staged).unwrap();
    assert_eq!(staged, pixels);

    // Draw straight out of the staging buffer.
    dp.take_streams();
    rdp.attach(&Surface {
        addr: SCREEN_ADDR,
        width: 320,
        height: 240,
        depth: PixelDepth::Bits16,
    });
    rdp.enable_texture_copy();
    rdp.load_texture_buffer(STAGE_ADDR, 64, 32);
    rdp.draw_sprite(0, 0, Mirror::None);

    let streams = dp.take_streams();
    assert_eq!(
        streams[2],
        vec![0xFD10_003F, STAGE_ADDR],
        "buffer image descriptor"
    );
    let rect = streams.last().unwrap();
    assert_eq!(rect[0], 0x2400_0000 | (63 << 14) | (31 << 2));
    assert_eq!(rect[1], 0);
    assert_eq!(rect[3], (4096 << 16) | 1024);
}
