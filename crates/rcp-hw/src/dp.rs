//! Rasterizer command-unit ("DP") registers and port trait.

use bitflags::bitflags;

/// Physical base of the DP command-unit register block.
pub const DP_REG_BASE: u32 = 0x0410_0000;

/// Byte offsets of the four registers the drivers touch. `START`/`END`
/// bound the command range to fetch; writing `END` kicks the transfer.
pub const DP_REG_START: u32 = 0x00;
pub const DP_REG_END: u32 = 0x04;
pub const DP_REG_CURRENT: u32 = 0x08;
pub const DP_REG_STATUS: u32 = 0x0C;

/// The kick registers latch only these address bits; the segment tag and
/// sub-8-byte bits are ignored by hardware.
pub const DP_ADDR_MASK: u32 = 0x00FF_FFF8;

bitflags! {
    /// DP status register, read side.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct DpStatus: u32 {
        const XBUS_DMEM_DMA = 1 << 0;
        const FREEZE = 1 << 1;
        const FLUSH = 1 << 2;
        const START_GCLK = 1 << 3;
        const TMEM_BUSY = 1 << 4;
        const PIPE_BUSY = 1 << 5;
        const CMD_BUSY = 1 << 6;
        const CBUF_READY = 1 << 7;
        const DMA_BUSY = 1 << 8;
        const END_VALID = 1 << 9;
        const START_VALID = 1 << 10;
    }
}

impl DpStatus {
    /// True while a previously kicked command range has not been fully
    /// accepted. `START`/`END` must not be rewritten until this clears.
    pub fn transfer_pending(self) -> bool {
        self.intersects(Self::END_VALID | Self::START_VALID)
    }
}

bitflags! {
    /// DP status register, write side. Bits act as clear/set commands;
    /// zero bits leave the corresponding state untouched.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct DpStatusWrite: u32 {
        const CLR_XBUS_DMEM_DMA = 1 << 0;
        const SET_XBUS_DMEM_DMA = 1 << 1;
        const CLR_FREEZE = 1 << 2;
        const SET_FREEZE = 1 << 3;
        const CLR_FLUSH = 1 << 4;
        const SET_FLUSH = 1 << 5;
    }
}

impl DpStatusWrite {
    /// Control word written ahead of every kick: take the unit out of XBUS
    /// mode and release any freeze/flush so it fetches from main memory.
    pub fn reset_for_kick() -> Self {
        Self::CLR_XBUS_DMEM_DMA | Self::CLR_FREEZE | Self::CLR_FLUSH
    }
}

/// CPU-side access to the DP command unit.
///
/// Implementations must issue register writes in call order; bare-metal
/// ports separate consecutive MMIO writes with a full memory barrier.
pub trait DpPort {
    fn status(&self) -> DpStatus;

    fn write_status(&mut self, w: DpStatusWrite);

    /// Physical start address of the next command range.
    fn write_start(&mut self, addr: u32);

    /// Physical end address (exclusive). Writing it starts the fetch.
    fn write_end(&mut self, addr: u32);

    /// Masks or unmasks the full-sync completion interrupt.
    fn set_interrupt(&mut self, enabled: bool);

    /// Whether completion interrupts can currently reach the CPU at all.
    /// When false, waiting on the completion flag would never return.
    fn interrupts_enabled(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kick_reset_word_encoding() {
        assert_eq!(DpStatusWrite::reset_for_kick().bits(), 0x15);
    }

    #[test]
    fn transfer_pending_tracks_the_valid_bits() {
        assert!(DpStatus::START_VALID.transfer_pending());
        assert!(DpStatus::END_VALID.transfer_pending());
        assert!((DpStatus::END_VALID | DpStatus::PIPE_BUSY).transfer_pending());
        assert_eq!(
            (DpStatus::END_VALID | DpStatus::START_VALID).bits(),
            0x600
        );
        assert!(!DpStatus::from_bits_retain(0x1FF).transfer_pending());
    }

    #[test]
    fn kick_registers_mask_the_segment_tag() {
        assert_eq!(0xA010_0408 & DP_ADDR_MASK, 0x0010_0408);
        assert_eq!(0xA010_040F & DP_ADDR_MASK, 0x0010_0408);
    }
}
