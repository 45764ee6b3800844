//! Main-memory seam shared between the CPU and the co-processors.

use std::sync::{Arc, Mutex, RwLock};

use thiserror::Error;

/// Segment tag OR'd into addresses handed to co-processor DMA registers.
/// The devices themselves mask it off; the drivers reproduce it because the
/// register values are part of the observable hand-off contract.
pub const UNCACHED_BASE: u32 = 0xA000_0000;

/// Tags a physical address for a DMA kick register.
pub fn uncached(addr: u32) -> u32 {
    addr | UNCACHED_BASE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("rdram access out of range: addr={addr:#010x} len={len:#x}")]
pub struct RdramError {
    pub addr: u32,
    pub len: usize,
}

/// Byte-addressed main memory as the drivers see it.
///
/// Addresses are physical. Multi-byte values stored for co-processor
/// consumption (command words, argument words) are big-endian, matching the
/// console's byte order.
pub trait Rdram {
    fn read(&self, addr: u32, dst: &mut [u8]) -> Result<(), RdramError>;

    fn write(&self, addr: u32, src: &[u8]) -> Result<(), RdramError>;

    /// Write the CPU data cache back over `[addr, addr + len)` so the bytes
    /// become visible to co-processor DMA. Omitting this before a hand-off
    /// is a data race against hardware. Hosted implementations may no-op.
    fn writeback(&self, addr: u32, len: u32);
}

/// Plain `Vec`-backed memory for tests and hosted runs.
///
/// Clones share the same storage, so a driver, a port fake, and the test
/// body all observe one memory. `writeback` ranges are recorded for
/// assertion instead of touching any cache.
#[derive(Debug, Clone)]
pub struct VecRdram {
    mem: Arc<RwLock<Vec<u8>>>,
    writebacks: Arc<Mutex<Vec<(u32, u32)>>>,
}

impl VecRdram {
    pub fn new(len: usize) -> Self {
        VecRdram {
            mem: Arc::new(RwLock::new(vec![0u8; len])),
            writebacks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn len(&self) -> usize {
        self.mem.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Big-endian word read, for decoding queued command streams.
    pub fn u32_at(&self, addr: u32) -> u32 {
        let mut b = [0u8; 4];
        self.read(addr, &mut b).unwrap();
        u32::from_be_bytes(b)
    }

    /// Drains the recorded `(addr, len)` writeback ranges.
    pub fn take_writebacks(&self) -> Vec<(u32, u32)> {
        std::mem::take(&mut self.writebacks.lock().unwrap())
    }

    fn check(&self, addr: u32, len: usize) -> Result<usize, RdramError> {
        let start = addr as usize;
        let end = start.checked_add(len).ok_or(RdramError { addr, len })?;
        if end > self.mem.read().unwrap().len() {
            return Err(RdramError { addr, len });
        }
        Ok(start)
    }
}

impl Rdram for VecRdram {
    fn read(&self, addr: u32, dst: &mut [u8]) -> Result<(), RdramError> {
        let start = self.check(addr, dst.len())?;
        dst.copy_from_slice(&self.mem.read().unwrap()[start..start + dst.len()]);
        Ok(())
    }

    fn write(&self, addr: u32, src: &[u8]) -> Result<(), RdramError> {
        let start = self.check(addr, src.len())?;
        self.mem.write().unwrap()[start..start + src.len()].copy_from_slice(src);
        Ok(())
    }

    fn writeback(&self, addr: u32, len: u32) {
        self.writebacks.lock().unwrap().push((addr, len));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_storage() {
        let a = VecRdram::new(64);
        let b = a.clone();
        a.write(8, &[1, 2, 3, 4]).unwrap();
        let mut out = [0u8; 4];
        b.read(8, &mut out).unwrap();
        assert_eq!(out, [1, 2, 3, 4]);
    }

    #[test]
    fn out_of_range_access_is_an_error() {
        let m = VecRdram::new(16);
        let mut buf = [0u8; 8];
        assert_eq!(
            m.read(12, &mut buf),
            Err(RdramError { addr: 12, len: 8 })
        );
        assert_eq!(m.write(16, &buf), Err(RdramError { addr: 16, len: 8 }));
        assert!(m.write(8, &buf).is_ok());
    }

    #[test]
    fn writeback_ranges_are_recorded() {
        let m = VecRdram::new(64);
        m.writeback(0, 16);
        m.writeback(32, 8);
        assert_eq!(m.take_writebacks(), vec![(0, 16), (32, 8)]);
        assert!(m.take_writebacks().is_empty());
    }

    #[test]
    fn words_are_big_endian() {
        let m = VecRdram::new(8);
        m.write(0, &0xDEAD_BEEFu32.to_be_bytes()).unwrap();
        assert_eq!(m.u32_at(0), 0xDEAD_BEEF);
        let mut raw = [0u8; 4];
        m.read(0, &mut raw).unwrap();
        assert_eq!(raw, [0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn uncached_tag() {
        assert_eq!(uncached(0x0010_0000), 0xA010_0000);
    }
}
