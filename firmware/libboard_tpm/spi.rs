//! Indirect SPI access through the FPGA bridge.
//!
//! The PLL, ADCs and amplifiers are not memory mapped. A transaction is set
//! up by writing the target register address, the data byte, and the chip
//! and clock selects into the bridge, then starting it through the command
//! register and polling the busy bit until the bridge is idle again.

use crate::clock::Clock;
use crate::error::Error;
use crate::port::RegisterPort;
use crate::routing::{self, BoardVariant, DeviceClass, Route, Selection};
use crate::wait::{poll_until, WaitPolicy};

pub const DEFAULT_BASE: u32 = 0x2000_0000;

pub const ADDRESS: u32      = 0x00;
pub const WRITE_DATA: u32   = 0x04;
pub const READ_DATA: u32    = 0x08;
pub const CHIP_SELECT: u32  = 0x0c;
pub const CLOCK_SELECT: u32 = 0x10;
pub const COMMAND: u32      = 0x14;

/// Start on write, busy on read.
pub const START: u32 = 1 << 0;
pub const READ_NOT_WRITE: u32 = 1 << 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Read,
    Write
}

pub struct SpiBridge<'a> {
    port:    &'a mut dyn RegisterPort,
    clock:   &'a dyn Clock,
    base:    u32,
    variant: BoardVariant,
    policy:  WaitPolicy
}

impl<'a> SpiBridge<'a> {
    pub fn new(port: &'a mut dyn RegisterPort, clock: &'a dyn Clock, base: u32,
               variant: BoardVariant, policy: WaitPolicy) -> SpiBridge<'a> {
        SpiBridge {
            port:    port,
            clock:   clock,
            base:    base,
            variant: variant,
            policy:  policy
        }
    }

    pub fn variant(&self) -> BoardVariant {
        self.variant
    }

    pub fn clock(&self) -> &'a dyn Clock {
        self.clock
    }

    pub fn policy(&self) -> WaitPolicy {
        self.policy
    }

    fn wait_idle(&mut self) -> Result<(), Error> {
        let address = self.base.wrapping_add(COMMAND);
        let port = &mut *self.port;
        poll_until(self.clock, self.policy, "SPI bridge idle", || {
            Ok(port.read32(address)? & START == 0)
        })
    }

    /// Run one SPI transaction. Only the low byte of the read-data register
    /// is returned; for writes the result is always zero.
    pub fn transact(&mut self, op: Op, route: Route, address: u16, data: u8) -> Result<u8, Error> {
        self.wait_idle()?;

        let base = self.base;
        self.port.write32(base.wrapping_add(ADDRESS), address as u32)?;
        self.port.write32(base.wrapping_add(WRITE_DATA), (data as u32) << 8)?;
        self.port.write32(base.wrapping_add(READ_DATA), 0)?;
        self.port.write32(base.wrapping_add(CHIP_SELECT), route.enable)?;
        self.port.write32(base.wrapping_add(CLOCK_SELECT), route.clock)?;
        match op {
            Op::Write => self.port.write32(base.wrapping_add(COMMAND), START)?,
            Op::Read => self.port.write32(base.wrapping_add(COMMAND), START | READ_NOT_WRITE)?,
        }

        self.wait_idle()?;

        match op {
            Op::Write => {
                trace!("spi cs={:#x} sclk={:#x} [{:#05x}] <- {:#04x}",
                       route.enable, route.clock, address, data);
                Ok(0)
            }
            Op::Read => {
                let value = (self.port.read32(base.wrapping_add(READ_DATA))? & 0xff) as u8;
                trace!("spi cs={:#x} sclk={:#x} [{:#05x}] -> {:#04x}",
                       route.enable, route.clock, address, value);
                Ok(value)
            }
        }
    }

    pub fn write_device(&mut self, class: DeviceClass, selection: Selection,
                        address: u16, data: u8) -> Result<(), Error> {
        let route = routing::route(self.variant, class, selection)?;
        self.transact(Op::Write, route, address, data)?;
        Ok(())
    }

    /// Read from one chip. Reading from several chips at once would drive
    /// their outputs against each other, so `Selection::All` is refused.
    pub fn read_device(&mut self, class: DeviceClass, selection: Selection,
                       address: u16) -> Result<u8, Error> {
        if selection == Selection::All {
            return Err(Error::InvalidSelection { class: class, selection: selection })
        }
        let route = routing::route(self.variant, class, selection)?;
        self.transact(Op::Read, route, address, 0)
    }

    pub fn write_pll(&mut self, address: u16, data: u8) -> Result<(), Error> {
        self.write_device(DeviceClass::Pll, Selection::Index(0), address, data)
    }

    pub fn read_pll(&mut self, address: u16) -> Result<u8, Error> {
        self.read_device(DeviceClass::Pll, Selection::Index(0), address)
    }

    pub fn write_adc(&mut self, selection: Selection, address: u16, data: u8) -> Result<(), Error> {
        self.write_device(DeviceClass::Adc, selection, address, data)
    }

    pub fn read_adc(&mut self, index: u8, address: u16) -> Result<u8, Error> {
        self.read_device(DeviceClass::Adc, Selection::Index(index), address)
    }
}
