//! Sample transfer engine and the FPGA board-control registers it depends on.

use crate::error::Error;
use crate::port::RegisterPort;

pub const DEFAULT_BASE: u32 = 0x0000_0000;
pub const DEFAULT_FPGA_BASE: u32 = 0x3000_0000;

pub const BITS_PER_SAMPLE: u32 = 0x4;
pub const CONTROL: u32         = 0x8;
pub const FRAME_SIZE: u32      = 0xc;

// FPGA board-control block
pub const BOARD_CONFIG: u32 = 0x8;
pub const JESD_RESET: u32   = 0xc;

const FRAME_BYTES: u32 = 0xfffe;
const SAMPLE_BITS: u32 = 0x80;

pub fn start(port: &mut dyn RegisterPort, base: u32, fpga_base: u32) -> Result<(), Error> {
    port.write32(fpga_base.wrapping_add(BOARD_CONFIG), 0x0000)?;
    port.write32(fpga_base.wrapping_add(JESD_RESET), 0x2000)?;

    port.write32(base.wrapping_add(FRAME_SIZE), FRAME_BYTES)?;
    port.write32(base.wrapping_add(BITS_PER_SAMPLE), SAMPLE_BITS)?;
    port.write32(base.wrapping_add(CONTROL), 0x0)?;
    port.write32(base.wrapping_add(CONTROL), 0x1)?;
    info!("data transfer started");
    Ok(())
}

pub fn stop(port: &mut dyn RegisterPort, base: u32) -> Result<(), Error> {
    port.write32(base.wrapping_add(CONTROL), 0x0)?;
    Ok(())
}

pub fn is_running(port: &mut dyn RegisterPort, base: u32) -> Result<bool, Error> {
    Ok(port.read32(base.wrapping_add(CONTROL))? & 0x1 != 0)
}
