//! JESD204B receiver core in the FPGA. Memory mapped, no SPI involved.

use crate::ad9680::BitWidth;
use crate::error::Error;
use crate::port::RegisterPort;

pub const DEFAULT_BASE: u32 = 0x0001_0000;

pub const RESET: u32                 = 0x004;
pub const ILA_SUPPORT: u32           = 0x008;
pub const SCRAMBLING: u32            = 0x00c;
pub const SYSREF_HANDLING: u32       = 0x010;
pub const OCTETS_PER_FRAME: u32      = 0x020;
pub const FRAMES_PER_MULTIFRAME: u32 = 0x024;
pub const LANES_IN_USE: u32          = 0x028;
pub const SUBCLASS_MODE: u32         = 0x02c;

pub fn configure(port: &mut dyn RegisterPort, base: u32, width: BitWidth) -> Result<(), Error> {
    let lanes = width.profile().jesd_lanes;
    info!("JESD204 core initializing for {}-bit samples, lanes {:#x}", width.bits(), lanes);
    port.write32(base.wrapping_add(ILA_SUPPORT), 0x1)?;
    port.write32(base.wrapping_add(SYSREF_HANDLING), 0x0)?;
    port.write32(base.wrapping_add(SCRAMBLING), 0x1)?;
    port.write32(base.wrapping_add(OCTETS_PER_FRAME), 0x0)?;
    port.write32(base.wrapping_add(FRAMES_PER_MULTIFRAME), 0x1f)?;
    port.write32(base.wrapping_add(LANES_IN_USE), lanes)?;
    port.write32(base.wrapping_add(SUBCLASS_MODE), 0x1)?;
    port.write32(base.wrapping_add(RESET), 0x1)?;
    Ok(())
}
