//! Drivers for the console's co-processor pair: the rasterizer command
//! driver, the vector-unit job scheduler, and the register seam they
//! share.

#![forbid(unsafe_code)]

pub use rcp_hw as hw;
pub use rcp_rdp as rdp;
pub use rcp_rsp as rsp;
