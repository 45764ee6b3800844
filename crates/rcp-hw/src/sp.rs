//! Vector-unit ("SP") control registers, DMA length encodings, and port
//! trait.

use bitflags::bitflags;

/// Physical base of the SP DMA/status register block.
pub const SP_REG_BASE: u32 = 0x0404_0000;
/// Physical address of the SP program counter register.
pub const SP_PC_REG: u32 = 0x0408_0000;
/// Physical base of SP memory in the CPU's address map.
pub const SP_MEM_BASE: u32 = 0x0400_0000;

/// SP memory is 4KB of data memory followed by 4KB of instruction memory,
/// addressed as one window; bit 12 of an offset selects IMEM.
pub const SP_DMEM_LEN: u32 = 0x1000;
pub const SP_IMEM_OFFSET: u32 = 0x1000;
pub const SP_MEM_LEN: u32 = 0x2000;
pub const SP_MEM_OFFSET_MASK: u32 = 0x1FFF;

/// DMA endpoints must be 8-byte aligned; one transfer moves at most 4KB.
pub const SP_DMA_ALIGN: u32 = 8;
pub const SP_DMA_MAX: u32 = 0x1000;

bitflags! {
    /// SP status register, read side.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct SpStatus: u32 {
        const HALTED = 1 << 0;
        const BROKE = 1 << 1;
        const DMA_BUSY = 1 << 2;
        const DMA_FULL = 1 << 3;
        const IO_FULL = 1 << 4;
        const SINGLE_STEP = 1 << 5;
        const INTR_ON_BREAK = 1 << 6;
        const SIG0 = 1 << 7;
        const SIG1 = 1 << 8;
        const SIG2 = 1 << 9;
        const SIG3 = 1 << 10;
        const SIG4 = 1 << 11;
        const SIG5 = 1 << 12;
        const SIG6 = 1 << 13;
        const SIG7 = 1 << 14;
    }
}

impl SpStatus {
    /// True when the unit is not executing: halted outright or stopped on a
    /// break instruction. Job dispatch is legal only in this state.
    pub fn stopped(self) -> bool {
        self.intersects(Self::HALTED | Self::BROKE)
    }
}

bitflags! {
    /// SP status register, write side. Bits come in clear/set command pairs;
    /// zero bits leave the corresponding state untouched.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct SpStatusWrite: u32 {
        const CLR_HALT = 1 << 0;
        const SET_HALT = 1 << 1;
        const CLR_BROKE = 1 << 2;
        const CLR_INTR = 1 << 3;
        const SET_INTR = 1 << 4;
        const CLR_SSTEP = 1 << 5;
        const SET_SSTEP = 1 << 6;
        const CLR_INTR_BREAK = 1 << 7;
        const SET_INTR_BREAK = 1 << 8;
        const CLR_SIG0 = 1 << 9;
        const SET_SIG0 = 1 << 10;
        const CLR_SIG1 = 1 << 11;
        const SET_SIG1 = 1 << 12;
        const CLR_SIG2 = 1 << 13;
        const SET_SIG2 = 1 << 14;
        const CLR_SIG3 = 1 << 15;
        const SET_SIG3 = 1 << 16;
        const CLR_SIG4 = 1 << 17;
        const SET_SIG4 = 1 << 18;
        const CLR_SIG5 = 1 << 19;
        const SET_SIG5 = 1 << 20;
        const CLR_SIG6 = 1 << 21;
        const SET_SIG6 = 1 << 22;
        const CLR_SIG7 = 1 << 23;
        const SET_SIG7 = 1 << 24;
    }
}

impl SpStatusWrite {
    /// Halt the unit and acknowledge a break: set halt; clear broke, the
    /// pending interrupt, and the interrupt-on-break enable.
    pub fn halt_and_acknowledge() -> Self {
        Self::SET_HALT | Self::CLR_BROKE | Self::CLR_INTR | Self::CLR_INTR_BREAK
    }

    /// Start dispatched microcode: clear halt and single-step, enable the
    /// interrupt on break, clear every signal bit.
    pub fn start_with_break_interrupt() -> Self {
        Self::CLR_HALT
            | Self::CLR_SSTEP
            | Self::SET_INTR_BREAK
            | Self::CLR_SIG0
            | Self::CLR_SIG1
            | Self::CLR_SIG2
            | Self::CLR_SIG3
            | Self::CLR_SIG4
            | Self::CLR_SIG5
            | Self::CLR_SIG6
            | Self::CLR_SIG7
    }
}

/// Encodes a plain byte length for the SP DMA length registers.
///
/// `len` must be in `1..=4096`; the field holds `len - 1` in twelve bits.
pub fn dma_len(len: u32) -> u32 {
    debug_assert!((1..=SP_DMA_MAX).contains(&len));
    (len - 1) & 0x0FFF
}

/// Encodes a strided block transfer: `height` rows of `width` pixels at
/// `bpp` bytes each, skipping `(pitch - width) * bpp` bytes between rows on
/// the DRAM side.
///
/// `width` must not exceed `pitch`, `height` must be in `1..=256`, and a
/// row (`width * bpp` bytes) in `1..=4096`; the count fields hold their
/// value minus one.
pub fn dma_block_len(pitch: u32, width: u32, height: u32, bpp: u32) -> u32 {
    debug_assert!(width <= pitch);
    debug_assert!((1..=256).contains(&height));
    debug_assert!((1..=SP_DMA_MAX).contains(&(width * bpp)));
    ((pitch - width) * bpp << 20) | ((height - 1) << 12) | (width * bpp - 1)
}

/// Decoded view of a DMA length register, used by transfer engines.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DmaLen {
    /// Bytes moved per row.
    pub span: u32,
    /// Number of rows.
    pub rows: u32,
    /// Bytes skipped between rows on the DRAM side.
    pub skip: u32,
}

impl DmaLen {
    pub fn decode(reg: u32) -> Self {
        DmaLen {
            span: (reg & 0x0FFF) + 1,
            rows: ((reg >> 12) & 0xFF) + 1,
            skip: (reg >> 20) & 0x0FFF,
        }
    }

    /// Total bytes landing in SP memory.
    pub fn mem_bytes(self) -> u32 {
        self.span * self.rows
    }
}

/// CPU-side access to the SP control block and its memory window.
///
/// Implementations must issue register writes in call order; bare-metal
/// ports separate consecutive MMIO writes with a full memory barrier.
pub trait SpPort {
    fn status(&self) -> SpStatus;

    fn write_status(&mut self, w: SpStatusWrite);

    /// Program counter, as an IMEM-relative SP memory offset.
    fn set_pc(&mut self, pc: u32);

    fn dma_busy(&self) -> bool;

    fn dma_full(&self) -> bool;

    /// Program a DRAM-to-SP-memory transfer. `len_reg` is a value built by
    /// [`dma_len`] or [`dma_block_len`]; the transfer starts immediately.
    fn dma_read(&mut self, mem_offset: u32, dram_addr: u32, len_reg: u32);

    /// Program an SP-memory-to-DRAM transfer.
    fn dma_write(&mut self, mem_offset: u32, dram_addr: u32, len_reg: u32);

    /// Test-and-set of the hardware semaphore. Returns true if this call
    /// acquired it (the register read zero).
    fn semaphore_acquire(&mut self) -> bool;

    fn semaphore_release(&mut self);

    /// Direct CPU read from the 8KB SP memory window.
    fn mem_read(&self, offset: u32, dst: &mut [u8]);

    /// Direct CPU write into the 8KB SP memory window.
    fn mem_write(&mut self, offset: u32, src: &[u8]);

    /// Masks or unmasks the break interrupt at the CPU side.
    fn set_interrupt(&mut self, enabled: bool);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_word_encodings() {
        assert_eq!(SpStatusWrite::halt_and_acknowledge().bits(), 0x0000_008E);
        assert_eq!(
            SpStatusWrite::start_with_break_interrupt().bits(),
            0x00AA_AB21
        );
    }

    #[test]
    fn stopped_means_halted_or_broke() {
        assert!(SpStatus::HALTED.stopped());
        assert!(SpStatus::BROKE.stopped());
        assert!((SpStatus::HALTED | SpStatus::BROKE).stopped());
        assert!(!(SpStatus::DMA_BUSY | SpStatus::SIG3).stopped());
        assert_eq!((SpStatus::HALTED | SpStatus::BROKE).bits(), 3);
    }

    #[test]
    fn plain_length_encoding() {
        assert_eq!(dma_len(8), 7);
        assert_eq!(dma_len(0x1000), 0xFFF);
        let d = DmaLen::decode(dma_len(64));
        assert_eq!(d, DmaLen { span: 64, rows: 1, skip: 0 });
        assert_eq!(d.mem_bytes(), 64);
    }

    #[test]
    fn block_length_encoding_round_trips() {
        // 320px-wide source, 64px sub-rectangle, 16 rows, 2 bytes per pixel.
        let reg = dma_block_len(320, 64, 16, 2);
        let d = DmaLen::decode(reg);
        assert_eq!(
            d,
            DmaLen {
                span: 128,
                rows: 16,
                skip: (320 - 64) * 2,
            }
        );
        assert_eq!(d.mem_bytes(), 128 * 16);
    }
}
