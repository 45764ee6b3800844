//! Hardware seam for the console's co-processor pair.
//!
//! The rasterizer's command unit (`dp`) and the vector unit's control block
//! (`sp`) are modeled as narrow port traits plus bit-exact register
//! definitions; main memory shared with the co-processors is the [`Rdram`]
//! trait. Driver crates are generic over these seams, so all transport and
//! scheduling logic runs against the in-memory doubles in [`fake`] under
//! `cargo test`. A bare-metal build supplies volatile-MMIO implementations
//! of the same traits.

#![forbid(unsafe_code)]

pub mod dp;
pub mod fake;
pub mod rdram;
pub mod sp;

pub use dp::{DpPort, DpStatus, DpStatusWrite};
pub use fake::{FakeDp, FakeSp, SpDma};
pub use rdram::{uncached, Rdram, RdramError, VecRdram, UNCACHED_BASE};
pub use sp::{SpPort, SpStatus, SpStatusWrite};
