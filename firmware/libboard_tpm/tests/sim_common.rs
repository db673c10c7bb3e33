//! Simulated TPM for the integration tests: decodes SPI bridge transactions
//! into per-chip register files and records every write.
#![allow(dead_code)]

use std::cell::Cell;
use std::collections::HashMap;

use board_tpm::clock::Clock;
use board_tpm::routing::{route, BoardVariant, DeviceClass, Selection};
use board_tpm::spi;
use board_tpm::{RegisterPort, TransportError};

/// Time only moves when somebody looks at it or spins.
pub struct SimClock {
    now: Cell<u64>
}

impl SimClock {
    pub fn new() -> SimClock {
        SimClock { now: Cell::new(0) }
    }
}

impl Clock for SimClock {
    fn get_ms(&self) -> u64 {
        let now = self.now.get();
        self.now.set(now + 1);
        now
    }

    fn spin_ms(&self, interval: u64) {
        self.now.set(self.now.get() + interval)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chip {
    Pll,
    Adc(u8),
    Amplifier(u8)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Memory mapped write outside the SPI bridge.
    Reg { address: u32, value: u32 },
    /// SPI write as seen on the bus.
    Spi { enable: u32, clock: u32, address: u16, data: u8 }
}

pub fn pll_write(variant: BoardVariant, address: u16, data: u8) -> Event {
    let r = route(variant, DeviceClass::Pll, Selection::Index(0)).unwrap();
    Event::Spi { enable: r.enable, clock: r.clock, address: address, data: data }
}

pub fn adc_write(variant: BoardVariant, selection: Selection, address: u16, data: u8) -> Event {
    let r = route(variant, DeviceClass::Adc, selection).unwrap();
    Event::Spi { enable: r.enable, clock: r.clock, address: address, data: data }
}

pub fn reg_write(address: u32, value: u32) -> Event {
    Event::Reg { address: address, value: value }
}

pub struct SimBoard {
    pub variant:        BoardVariant,
    pub events:         Vec<Event>,
    pub spi_reads:      Vec<(Chip, u16)>,
    pub pll_calibrates: bool,
    pub pll_locks:      bool,
    pub adc_pll_locks:  bool,
    /// ADCs whose JESD204B PLL never locks.
    pub unlocked_adcs:  Vec<u8>,
    /// Accesses refused because the link was down.
    pub failed_accesses: usize,
    /// Fail every access once this many writes have gone through.
    pub fail_after:     Option<usize>,
    /// Readback values that override what the ADC register file holds.
    pub adc_overrides:  HashMap<(u8, u16), u8>,
    bridge:             [u32; 6],
    regs:               HashMap<u32, u32>,
    chips:              HashMap<Chip, HashMap<u16, u8>>,
    write_count:        usize
}

impl SimBoard {
    pub fn new(variant: BoardVariant) -> SimBoard {
        SimBoard {
            variant:        variant,
            events:         Vec::new(),
            spi_reads:      Vec::new(),
            pll_calibrates: true,
            pll_locks:      true,
            adc_pll_locks:  true,
            unlocked_adcs:  Vec::new(),
            failed_accesses: 0,
            fail_after:     None,
            adc_overrides:  HashMap::new(),
            bridge:         [0; 6],
            regs:           HashMap::new(),
            chips:          HashMap::new(),
            write_count:    0
        }
    }

    pub fn spi_writes(&self) -> Vec<Event> {
        self.events.iter().cloned().filter(|e| match e {
            &Event::Spi { .. } => true,
            _ => false
        }).collect()
    }

    pub fn reg_writes(&self) -> Vec<Event> {
        self.events.iter().cloned().filter(|e| match e {
            &Event::Reg { .. } => true,
            _ => false
        }).collect()
    }

    pub fn chip_register(&self, chip: Chip, address: u16) -> Option<u8> {
        self.chips.get(&chip).and_then(|regs| regs.get(&address).cloned())
    }

    fn selected(&self, enable: u32, clock: u32) -> Vec<Chip> {
        let mut chips = Vec::new();
        let classes = [DeviceClass::Pll, DeviceClass::Adc, DeviceClass::Amplifier];
        for &class in classes.iter() {
            for index in 0..self.variant.channel_count(class) {
                let r = route(self.variant, class, Selection::Index(index)).unwrap();
                if r.enable & enable != 0 && r.clock & clock != 0 {
                    chips.push(match class {
                        DeviceClass::Pll => Chip::Pll,
                        DeviceClass::Adc => Chip::Adc(index),
                        DeviceClass::Amplifier => Chip::Amplifier(index),
                    });
                }
            }
        }
        chips
    }

    fn chip_read(&mut self, chip: Chip, address: u16) -> u8 {
        self.spi_reads.push((chip, address));
        match (chip, address) {
            (Chip::Pll, 0x509) => if self.pll_calibrates { 0x08 } else { 0x01 },
            (Chip::Pll, 0x508) => if self.pll_locks { 0xf2 } else { 0x32 },
            (Chip::Adc(n), 0x56f) =>
                if self.adc_pll_locks && !self.unlocked_adcs.contains(&n) { 0x81 } else { 0x80 },
            (Chip::Adc(n), _) if self.adc_overrides.contains_key(&(n, address)) =>
                self.adc_overrides[&(n, address)],
            (Chip::Adc(_), 0x58e) => self.chip_register(chip, address).unwrap_or(0x01),
            _ => self.chip_register(chip, address).unwrap_or(0x00)
        }
    }

    fn chip_write(&mut self, chip: Chip, address: u16, data: u8) {
        // soft reset and IO update self-clear immediately
        let stored = match (chip, address) {
            (_, 0x000) => data & !0x01,
            (Chip::Pll, 0x00f) => 0x00,
            _ => data
        };
        self.chips.entry(chip).or_insert_with(HashMap::new).insert(address, stored);
    }

    fn execute(&mut self, command: u32) {
        let address = self.bridge[0] as u16;
        let data = (self.bridge[1] >> 8) as u8;
        let enable = self.bridge[3];
        let clock = self.bridge[4];
        let chips = self.selected(enable, clock);
        if command & spi::READ_NOT_WRITE != 0 {
            assert_eq!(chips.len(), 1, "read must select exactly one chip");
            // garbage in the upper bits, the bridge only drives the low byte
            self.bridge[2] = 0xa5a5_a500 | self.chip_read(chips[0], address) as u32;
        } else {
            assert!(!chips.is_empty(), "write selects no chip");
            for chip in chips {
                self.chip_write(chip, address, data);
            }
            self.events.push(Event::Spi { enable: enable, clock: clock, address: address, data: data });
        }
    }

    fn check_link(&mut self, address: u32) -> Result<(), TransportError> {
        match self.fail_after {
            Some(limit) if self.write_count >= limit => {
                self.failed_accesses += 1;
                Err(TransportError::new(address, "link down"))
            }
            _ => Ok(())
        }
    }
}

fn bridge_index(address: u32) -> Option<usize> {
    if address >= spi::DEFAULT_BASE && address < spi::DEFAULT_BASE + 0x18 {
        Some(((address - spi::DEFAULT_BASE) / 4) as usize)
    } else {
        None
    }
}

impl RegisterPort for SimBoard {
    fn read32(&mut self, address: u32) -> Result<u32, TransportError> {
        self.check_link(address)?;
        match bridge_index(address) {
            // transactions complete instantly, the bridge is never busy
            Some(5) => Ok(0),
            Some(index) => Ok(self.bridge[index]),
            None => Ok(self.regs.get(&address).cloned().unwrap_or(0))
        }
    }

    fn write32(&mut self, address: u32, value: u32) -> Result<(), TransportError> {
        self.check_link(address)?;
        self.write_count += 1;
        match bridge_index(address) {
            Some(5) => {
                if value & spi::START != 0 {
                    self.execute(value);
                }
            }
            Some(index) => self.bridge[index] = value,
            None => {
                self.regs.insert(address, value);
                self.events.push(Event::Reg { address: address, value: value });
            }
        }
        Ok(())
    }
}
