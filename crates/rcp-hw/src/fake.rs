//! In-memory port doubles for driver tests.
//!
//! Both fakes are cloneable handles over shared state, so a test can keep a
//! handle while the driver owns another. They record register traffic for
//! assertion and move DMA bytes immediately; they do not simulate command
//! execution. Out-of-range transfers panic, which in a test double means the
//! test itself is wrong.

use std::sync::{Arc, Mutex};

use crate::dp::{DpPort, DpStatus, DpStatusWrite, DP_ADDR_MASK};
use crate::rdram::{Rdram, VecRdram};
use crate::sp::{
    DmaLen, SpPort, SpStatus, SpStatusWrite, SP_MEM_LEN, SP_MEM_OFFSET_MASK,
};

/// Rasterizer command-unit double.
///
/// Records every status write and kick. Given a [`VecRdram`], it also
/// harvests the kicked byte range into a decoded word stream at the moment
/// of the kick, exactly as the hardware fetch would observe memory. The
/// status register can be programmed to report a pending transfer for the
/// next N polls to exercise busy-wait loops deterministically.
#[derive(Clone)]
pub struct FakeDp {
    inner: Arc<Mutex<FakeDpInner>>,
}

struct FakeDpInner {
    base_status: DpStatus,
    busy_polls: u32,
    status_writes: Vec<DpStatusWrite>,
    start: u32,
    kicks: Vec<(u32, u32)>,
    streams: Vec<Vec<u32>>,
    rdram: Option<VecRdram>,
    interrupt_mask: bool,
    interrupts_enabled: bool,
}

impl FakeDp {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A double that harvests kicked command ranges out of `rdram`.
    pub fn with_rdram(rdram: VecRdram) -> Self {
        Self::build(Some(rdram))
    }

    fn build(rdram: Option<VecRdram>) -> Self {
        FakeDp {
            inner: Arc::new(Mutex::new(FakeDpInner {
                base_status: DpStatus::empty(),
                busy_polls: 0,
                status_writes: Vec::new(),
                start: 0,
                kicks: Vec::new(),
                streams: Vec::new(),
                rdram,
                interrupt_mask: false,
                interrupts_enabled: true,
            })),
        }
    }

    /// Report a pending transfer for the next `n` status polls.
    pub fn set_busy_polls(&self, n: u32) {
        self.inner.lock().unwrap().busy_polls = n;
    }

    pub fn busy_polls_left(&self) -> u32 {
        self.inner.lock().unwrap().busy_polls
    }

    /// Answer for [`DpPort::interrupts_enabled`].
    pub fn set_interrupts_enabled(&self, enabled: bool) {
        self.inner.lock().unwrap().interrupts_enabled = enabled;
    }

    /// Raw `(start, end)` register values, in kick order.
    pub fn take_kicks(&self) -> Vec<(u32, u32)> {
        std::mem::take(&mut self.inner.lock().unwrap().kicks)
    }

    /// Decoded big-endian words of each kicked range, in kick order.
    /// Empty unless constructed via [`FakeDp::with_rdram`].
    pub fn take_streams(&self) -> Vec<Vec<u32>> {
        std::mem::take(&mut self.inner.lock().unwrap().streams)
    }

    pub fn take_status_writes(&self) -> Vec<DpStatusWrite> {
        std::mem::take(&mut self.inner.lock().unwrap().status_writes)
    }

    pub fn interrupt_mask(&self) -> bool {
        self.inner.lock().unwrap().interrupt_mask
    }
}

impl Default for FakeDp {
    fn default() -> Self {
        Self::new()
    }
}

impl DpPort for FakeDp {
    fn status(&self) -> DpStatus {
        let mut inner = self.inner.lock().unwrap();
        if inner.busy_polls > 0 {
            inner.busy_polls -= 1;
            inner.base_status | DpStatus::END_VALID | DpStatus::DMA_BUSY
        } else {
            inner.base_status
        }
    }

    fn write_status(&mut self, w: DpStatusWrite) {
        self.inner.lock().unwrap().status_writes.push(w);
    }

    fn write_start(&mut self, addr: u32) {
        self.inner.lock().unwrap().start = addr;
    }

    fn write_end(&mut self, addr: u32) {
        let mut inner = self.inner.lock().unwrap();
        let start = inner.start;
        inner.kicks.push((start, addr));
        if let Some(rdram) = inner.rdram.clone() {
            let mut words = Vec::new();
            let mut at = start & DP_ADDR_MASK;
            let end = addr & DP_ADDR_MASK;
            while at < end {
                words.push(rdram.u32_at(at));
                at += 4;
            }
            inner.streams.push(words);
        }
    }

    fn set_interrupt(&mut self, enabled: bool) {
        self.inner.lock().unwrap().interrupt_mask = enabled;
    }

    fn interrupts_enabled(&self) -> bool {
        self.inner.lock().unwrap().interrupts_enabled
    }
}

/// Recorded SP DMA programming, in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpDma {
    /// DRAM into SP memory.
    ToMem {
        mem_offset: u32,
        dram_addr: u32,
        len_reg: u32,
    },
    /// SP memory into DRAM.
    ToDram {
        mem_offset: u32,
        dram_addr: u32,
        len_reg: u32,
    },
}

/// Vector-unit control-block double.
///
/// Models the status register bit-accurately under set/clear writes, an 8KB
/// SP memory, the PC register, the semaphore, and immediate DMA against a
/// shared [`VecRdram`]. It never executes microcode; tests call
/// [`FakeSp::finish_job`] to flip the status the way a break instruction
/// would, then deliver the interrupt through the driver's handle.
#[derive(Clone)]
pub struct FakeSp {
    inner: Arc<Mutex<FakeSpInner>>,
}

struct FakeSpInner {
    status: SpStatus,
    pc: u32,
    mem: Vec<u8>,
    rdram: VecRdram,
    semaphore: bool,
    dma_busy_polls: u32,
    dma_full_polls: u32,
    status_writes: Vec<SpStatusWrite>,
    dmas: Vec<SpDma>,
    interrupt_mask: bool,
}

impl FakeSp {
    /// Powers up halted, like the hardware.
    pub fn new(rdram: VecRdram) -> Self {
        FakeSp {
            inner: Arc::new(Mutex::new(FakeSpInner {
                status: SpStatus::HALTED,
                pc: 0,
                mem: vec![0u8; SP_MEM_LEN as usize],
                rdram,
                semaphore: false,
                dma_busy_polls: 0,
                dma_full_polls: 0,
                status_writes: Vec::new(),
                dmas: Vec::new(),
                interrupt_mask: false,
            })),
        }
    }

    /// What executing a break instruction does: halt and raise `BROKE`.
    pub fn finish_job(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.status |= SpStatus::HALTED | SpStatus::BROKE;
    }

    pub fn running(&self) -> bool {
        !self.inner.lock().unwrap().status.stopped()
    }

    pub fn pc(&self) -> u32 {
        self.inner.lock().unwrap().pc
    }

    /// Test-side write into SP memory (module tables, canned microcode).
    pub fn load_mem(&self, offset: u32, bytes: &[u8]) {
        let mut inner = self.inner.lock().unwrap();
        let at = offset as usize;
        inner.mem[at..at + bytes.len()].copy_from_slice(bytes);
    }

    pub fn peek_mem(&self, offset: u32, len: usize) -> Vec<u8> {
        let inner = self.inner.lock().unwrap();
        inner.mem[offset as usize..offset as usize + len].to_vec()
    }

    /// Report DMA busy for the next `n` polls.
    pub fn set_dma_busy_polls(&self, n: u32) {
        self.inner.lock().unwrap().dma_busy_polls = n;
    }

    /// Report the DMA queue full for the next `n` polls.
    pub fn set_dma_full_polls(&self, n: u32) {
        self.inner.lock().unwrap().dma_full_polls = n;
    }

    pub fn take_status_writes(&self) -> Vec<SpStatusWrite> {
        std::mem::take(&mut self.inner.lock().unwrap().status_writes)
    }

    pub fn take_dmas(&self) -> Vec<SpDma> {
        std::mem::take(&mut self.inner.lock().unwrap().dmas)
    }

    pub fn interrupt_mask(&self) -> bool {
        self.inner.lock().unwrap().interrupt_mask
    }

    pub fn semaphore_held(&self) -> bool {
        self.inner.lock().unwrap().semaphore
    }
}

impl FakeSpInner {
    fn apply_status_write(&mut self, w: SpStatusWrite) {
        let mut clear = SpStatus::empty();
        let mut set = SpStatus::empty();
        let pairs = [
            (SpStatusWrite::CLR_HALT, SpStatusWrite::SET_HALT, SpStatus::HALTED),
            (SpStatusWrite::CLR_SSTEP, SpStatusWrite::SET_SSTEP, SpStatus::SINGLE_STEP),
            (
                SpStatusWrite::CLR_INTR_BREAK,
                SpStatusWrite::SET_INTR_BREAK,
                SpStatus::INTR_ON_BREAK,
            ),
            (SpStatusWrite::CLR_SIG0, SpStatusWrite::SET_SIG0, SpStatus::SIG0),
            (SpStatusWrite::CLR_SIG1, SpStatusWrite::SET_SIG1, SpStatus::SIG1),
            (SpStatusWrite::CLR_SIG2, SpStatusWrite::SET_SIG2, SpStatus::SIG2),
            (SpStatusWrite::CLR_SIG3, SpStatusWrite::SET_SIG3, SpStatus::SIG3),
            (SpStatusWrite::CLR_SIG4, SpStatusWrite::SET_SIG4, SpStatus::SIG4),
            (SpStatusWrite::CLR_SIG5, SpStatusWrite::SET_SIG5, SpStatus::SIG5),
            (SpStatusWrite::CLR_SIG6, SpStatusWrite::SET_SIG6, SpStatus::SIG6),
            (SpStatusWrite::CLR_SIG7, SpStatusWrite::SET_SIG7, SpStatus::SIG7),
        ];
        for (clr, st, bit) in pairs {
            if w.contains(clr) {
                clear |= bit;
            }
            if w.contains(st) {
                set |= bit;
            }
        }
        if w.contains(SpStatusWrite::CLR_BROKE) {
            clear |= SpStatus::BROKE;
        }
        self.status = (self.status - clear) | set;
    }

    fn dma(&mut self, to_mem: bool, mem_offset: u32, dram_addr: u32, len_reg: u32) {
        let offset = (mem_offset & SP_MEM_OFFSET_MASK) as usize;
        let len = DmaLen::decode(len_reg);
        let span = len.span as usize;
        for row in 0..len.rows {
            let mem_at = offset + row as usize * span;
            let dram_at = dram_addr + row * (len.span + len.skip);
            if to_mem {
                let dst = &mut self.mem[mem_at..mem_at + span];
                self.rdram.read(dram_at, dst).unwrap();
            } else {
                let src = &self.mem[mem_at..mem_at + span];
                self.rdram.write(dram_at, src).unwrap();
            }
        }
    }
}

impl SpPort for FakeSp {
    fn status(&self) -> SpStatus {
        self.inner.lock().unwrap().status
    }

    fn write_status(&mut self, w: SpStatusWrite) {
        let mut inner = self.inner.lock().unwrap();
        inner.status_writes.push(w);
        inner.apply_status_write(w);
    }

    fn set_pc(&mut self, pc: u32) {
        self.inner.lock().unwrap().pc = pc;
    }

    fn dma_busy(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.dma_busy_polls > 0 {
            inner.dma_busy_polls -= 1;
            true
        } else {
            false
        }
    }

    fn dma_full(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.dma_full_polls > 0 {
            inner.dma_full_polls -= 1;
            true
        } else {
            false
        }
    }

    fn dma_read(&mut self, mem_offset: u32, dram_addr: u32, len_reg: u32) {
        let mut inner = self.inner.lock().unwrap();
        inner.dmas.push(SpDma::ToMem {
            mem_offset,
            dram_addr,
            len_reg,
        });
        inner.dma(true, mem_offset, dram_addr, len_reg);
    }

    fn dma_write(&mut self, mem_offset: u32, dram_addr: u32, len_reg: u32) {
        let mut inner = self.inner.lock().unwrap();
        inner.dmas.push(SpDma::ToDram {
            mem_offset,
            dram_addr,
            len_reg,
        });
        inner.dma(false, mem_offset, dram_addr, len_reg);
    }

    fn semaphore_acquire(&mut self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.semaphore {
            false
        } else {
            inner.semaphore = true;
            true
        }
    }

    fn semaphore_release(&mut self) {
        self.inner.lock().unwrap().semaphore = false;
    }

    fn mem_read(&self, offset: u32, dst: &mut [u8]) {
        let inner = self.inner.lock().unwrap();
        let at = offset as usize;
        dst.copy_from_slice(&inner.mem[at..at + dst.len()]);
    }

    fn mem_write(&mut self, offset: u32, src: &[u8]) {
        let mut inner = self.inner.lock().unwrap();
        let at = offset as usize;
        inner.mem[at..at + src.len()].copy_from_slice(src);
    }

    fn set_interrupt(&mut self, enabled: bool) {
        self.inner.lock().unwrap().interrupt_mask = enabled;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::sp::{dma_block_len, dma_len, SP_IMEM_OFFSET};

    #[test]
    fn dp_busy_polls_drain() {
        let dp = FakeDp::new();
        dp.set_busy_polls(2);
        assert!(dp.status().transfer_pending());
        assert!(dp.status().transfer_pending());
        assert!(!dp.status().transfer_pending());
    }

    #[test]
    fn dp_harvests_kicked_ranges() {
        let rdram = VecRdram::new(0x100);
        rdram.write(0x10, &0xE900_0000u32.to_be_bytes()).unwrap();
        rdram.write(0x14, &0u32.to_be_bytes()).unwrap();
        let mut dp = FakeDp::with_rdram(rdram);
        dp.write_start(0xA000_0010);
        dp.write_end(0xA000_0018);
        assert_eq!(dp.take_kicks(), vec![(0xA000_0010, 0xA000_0018)]);
        assert_eq!(dp.take_streams(), vec![vec![0xE900_0000, 0]]);
    }

    #[test]
    fn sp_status_writes_apply_bit_pairs() {
        let mut sp = FakeSp::new(VecRdram::new(0));
        assert!(sp.status().contains(SpStatus::HALTED));
        sp.write_status(SpStatusWrite::start_with_break_interrupt());
        assert!(!sp.status().stopped());
        assert!(sp.status().contains(SpStatus::INTR_ON_BREAK));
        sp.finish_job();
        assert!(sp.status().contains(SpStatus::BROKE));
        sp.write_status(SpStatusWrite::halt_and_acknowledge());
        let s = sp.status();
        assert!(s.contains(SpStatus::HALTED));
        assert!(!s.contains(SpStatus::BROKE));
        assert!(!s.contains(SpStatus::INTR_ON_BREAK));
    }

    #[test]
    fn sp_dma_moves_bytes_both_ways() {
        let rdram = VecRdram::new(0x100);
        rdram.write(0, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        let mut sp = FakeSp::new(rdram.clone());
        sp.dma_read(SP_IMEM_OFFSET, 0, dma_len(8));
        assert_eq!(sp.peek_mem(SP_IMEM_OFFSET, 8), [1, 2, 3, 4, 5, 6, 7, 8]);
        sp.dma_write(SP_IMEM_OFFSET, 0x40, dma_len(8));
        let mut out = [0u8; 8];
        rdram.read(0x40, &mut out).unwrap();
        assert_eq!(out, [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn sp_block_dma_skips_between_rows() {
        let rdram = VecRdram::new(0x100);
        // Two rows of 4 bytes with a 4-byte gap between them in DRAM.
        rdram.write(0, &[1, 2, 3, 4]).unwrap();
        rdram.write(8, &[5, 6, 7, 8]).unwrap();
        let mut sp = FakeSp::new(rdram);
        sp.dma_read(0, 0, dma_block_len(4, 2, 2, 2));
        assert_eq!(sp.peek_mem(0, 8), [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn sp_semaphore_is_test_and_set() {
        let mut sp = FakeSp::new(VecRdram::new(0));
        assert!(sp.semaphore_acquire());
        assert!(!sp.semaphore_acquire());
        sp.semaphore_release();
        assert!(sp.semaphore_acquire());
    }
}
