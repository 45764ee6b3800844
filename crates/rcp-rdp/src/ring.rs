//! Circular command staging area in RDRAM.
//!
//! Commands are assembled word by word at the `end` cursor and handed to the
//! rasterizer as one `[start, end)` range per kick. The region never wraps a
//! command: a send that advances past `capacity - slack` resets both cursors
//! to zero, so the reserved slack must cover the largest single command.

use rcp_hw::{uncached, DpPort, DpStatusWrite, Rdram};

/// Size in bytes of the staging region.
pub const RING_CAPACITY: u32 = 4096;

/// Bytes reserved at the top of the region. Commands may extend into the
/// slack, but the cursors reset to zero on the next send once they do.
pub const RING_SLACK: u32 = 1024;

/// Cursor state over a caller-provided RDRAM region of [`RING_CAPACITY`]
/// bytes. The base must be 8-byte aligned; the DP latches only bits
/// `[23:3]` of the kick addresses.
#[derive(Debug)]
pub struct CommandRing {
    base: u32,
    start: u32,
    end: u32,
}

impl CommandRing {
    pub fn new(base: u32) -> Self {
        CommandRing {
            base,
            start: 0,
            end: 0,
        }
    }

    /// Bytes of the command assembled so far.
    pub fn pending_bytes(&self) -> u32 {
        self.end - self.start
    }

    /// Appends one big-endian word to the in-flight command.
    ///
    /// A word that does not fit is dropped outright and the command it
    /// belonged to goes out truncated. The rasterizer has no framing to
    /// recover from that, so oversized commands are a caller bug; the drop
    /// is logged but deliberately not surfaced as an error.
    pub fn queue(&mut self, mem: &impl Rdram, word: u32) {
        if self.pending_bytes() + 4 >= RING_CAPACITY {
            tracing::warn!(word, "command ring full; word dropped");
            return;
        }
        if let Err(err) = mem.write(self.base + self.end, &word.to_be_bytes()) {
            tracing::warn!("command ring backing store fault: {err}");
            return;
        }
        self.end += 4;
    }

    /// Hands the in-flight command to the rasterizer and opens the next one.
    ///
    /// No-op while the command is empty. Otherwise writes the CPU cache back
    /// over exactly the queued range, waits out any previously kicked range,
    /// clears the DP's XBUS/freeze/flush state, waits again, then writes the
    /// start and end kick registers with uncached-tagged addresses.
    pub fn send(&mut self, dp: &mut impl DpPort, mem: &impl Rdram) {
        if self.pending_bytes() == 0 {
            return;
        }

        mem.writeback(self.base + self.start, self.pending_bytes());

        while dp.status().transfer_pending() {}

        dp.write_status(DpStatusWrite::reset_for_kick());

        // The clear above can re-arm the fetch unit; settle it before the
        // kick so the start write cannot be swallowed.
        while dp.status().transfer_pending() {}

        dp.write_start(uncached(self.base) + self.start);
        dp.write_end(uncached(self.base) + self.end);

        if self.end > RING_CAPACITY - RING_SLACK {
            // Reset before a later command could be split by wraparound.
            self.start = 0;
            self.end = 0;
        } else {
            self.start = self.end;
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rcp_hw::{FakeDp, VecRdram};

    use super::*;

    const BASE: u32 = 0x0010_0000;

    fn ring_setup() -> (CommandRing, FakeDp, VecRdram) {
        let mem = VecRdram::new(0x20_0000);
        let dp = FakeDp::with_rdram(mem.clone());
        (CommandRing::new(BASE), dp, mem)
    }

    #[test]
    fn empty_send_touches_nothing() {
        let (mut ring, mut dp, mem) = ring_setup();
        ring.send(&mut dp, &mem);
        assert_eq!(dp.take_kicks(), vec![]);
        assert_eq!(dp.take_status_writes(), vec![]);
        assert_eq!(mem.take_writebacks(), vec![]);
    }

    #[test]
    fn send_kicks_the_exact_uncached_range() {
        let (mut ring, mut dp, mem) = ring_setup();
        ring.queue(&mem, 0xE900_0000);
        ring.queue(&mem, 0);
        ring.send(&mut dp, &mem);

        assert_eq!(mem.take_writebacks(), vec![(BASE, 8)]);
        assert_eq!(dp.take_kicks(), vec![(0xA010_0000, 0xA010_0008)]);
        assert_eq!(dp.take_streams(), vec![vec![0xE900_0000, 0]]);
        assert_eq!(
            dp.take_status_writes(),
            vec![DpStatusWrite::reset_for_kick()]
        );

        // Next command opens where the previous one ended.
        ring.queue(&mem, 0xE700_0000);
        ring.queue(&mem, 0);
        ring.send(&mut dp, &mem);
        assert_eq!(mem.take_writebacks(), vec![(BASE + 8, 8)]);
        assert_eq!(dp.take_kicks(), vec![(0xA010_0008, 0xA010_0010)]);
    }

    #[test]
    fn send_drains_pending_transfers_first() {
        let (mut ring, mut dp, mem) = ring_setup();
        dp.set_busy_polls(5);
        ring.queue(&mem, 0xF700_0000);
        ring.queue(&mem, 0xFFFF_FFFF);
        ring.send(&mut dp, &mem);
        assert_eq!(dp.busy_polls_left(), 0);
        assert_eq!(dp.take_kicks().len(), 1);
    }

    #[test]
    fn cursors_reset_once_past_the_slack_boundary() {
        let (mut ring, mut dp, mem) = ring_setup();
        // Fill right up to the slack boundary in four commands.
        for _ in 0..4 {
            for _ in 0..192 {
                ring.queue(&mem, 0x1111_1111);
            }
            ring.send(&mut dp, &mem);
        }
        assert_eq!(ring.start, RING_CAPACITY - RING_SLACK);

        // The next command crosses it and forces the reset.
        ring.queue(&mem, 0x2222_2222);
        ring.queue(&mem, 0x3333_3333);
        ring.send(&mut dp, &mem);
        assert_eq!((ring.start, ring.end), (0, 0));

        let kicks = dp.take_kicks();
        assert_eq!(kicks[4], (0xA010_0000 + 3072, 0xA010_0000 + 3080));

        // And the following command begins at offset zero again.
        ring.queue(&mem, 0x4444_4444);
        ring.queue(&mem, 0x5555_5555);
        ring.send(&mut dp, &mem);
        assert_eq!(dp.take_kicks(), vec![(0xA010_0000, 0xA010_0008)]);
    }

    #[test]
    fn overflowing_word_is_dropped_without_corrupting_the_command() {
        let (mut ring, _dp, mem) = ring_setup();
        for i in 0..1023 {
            ring.queue(&mem, i);
        }
        assert_eq!(ring.pending_bytes(), 4092);

        // 4092 + 4 >= 4096: rejected, cursors untouched.
        ring.queue(&mem, 0xDEAD_BEEF);
        assert_eq!(ring.pending_bytes(), 4092);
        assert_eq!(mem.u32_at(BASE), 0);
        assert_eq!(mem.u32_at(BASE + 4088), 1022);
    }

    #[test]
    fn backing_store_fault_drops_the_word() {
        let mem = VecRdram::new(16);
        let mut ring = CommandRing::new(0);
        ring.queue(&mem, 1);
        ring.queue(&mem, 2);
        ring.queue(&mem, 3);
        ring.queue(&mem, 4);
        ring.queue(&mem, 5); // lands at offset 16, out of range
        assert_eq!(ring.pending_bytes(), 16);
        assert_eq!(mem.u32_at(12), 4);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn pending_range_never_exceeds_capacity(
            words in prop::collection::vec(any::<u32>(), 0..1500),
            send_every in proptest::option::of(1usize..200),
        ) {
            let (mut ring, mut dp, mem) = ring_setup();
            for (i, word) in words.iter().enumerate() {
                ring.queue(&mem, *word);
                prop_assert!(ring.pending_bytes() < RING_CAPACITY);
                prop_assert!(ring.end >= ring.start);
                if let Some(n) = send_every {
                    if i % n == n - 1 {
                        ring.send(&mut dp, &mem);
                        prop_assert_eq!(ring.pending_bytes(), 0);
                        prop_assert!(ring.end <= RING_CAPACITY - RING_SLACK);
                    }
                }
            }
        }
    }
}
