//! Chip-select and SPI clock routing for the bridge.
//!
//! Every SPI chip sits behind one chip-select line and one of the shared
//! SCLK lines driven by the bridge. The tables below give, per board
//! variant and device class, the bit index of both for each logical channel.

use std::fmt;
use std::ops::Range;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoardVariant {
    /// TPM with the two-ADC FMC.
    Standard,
    /// XTPM: 16 ADCs, 32 amplifiers.
    Extended
}

impl Default for BoardVariant {
    fn default() -> BoardVariant {
        BoardVariant::Standard
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    Pll,
    Adc,
    Amplifier
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            &DeviceClass::Pll => write!(f, "PLL"),
            &DeviceClass::Adc => write!(f, "ADC"),
            &DeviceClass::Amplifier => write!(f, "amplifier"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Selection {
    Index(u8),
    /// Every ADC at once; only meaningful for `DeviceClass::Adc`.
    All
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            &Selection::Index(index) => write!(f, "index {}", index),
            &Selection::All => write!(f, "all"),
        }
    }
}

/// Bit indices of a chip's enable line and SCLK line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ChipSelect {
    enable: u8,
    clock:  u8
}

const fn cs(enable: u8, clock: u8) -> ChipSelect {
    ChipSelect { enable: enable, clock: clock }
}

const TPM_PLL: [ChipSelect; 1] = [cs(2, 0)];
const TPM_ADC: [ChipSelect; 2] = [cs(0, 0), cs(1, 0)];
const TPM_AMP: [ChipSelect; 4] = [cs(3, 0), cs(4, 0), cs(5, 0), cs(6, 0)];

const XTPM_PLL: [ChipSelect; 1] = [cs(12, 8)];
const XTPM_ADC: [ChipSelect; 16] = [
    cs(0, 0), cs(1, 0), cs(2, 0), cs(3, 0),
    cs(0, 1), cs(1, 1), cs(2, 1), cs(3, 1),
    cs(0, 2), cs(1, 2), cs(2, 2), cs(3, 2),
    cs(0, 3), cs(1, 3), cs(2, 3), cs(3, 3),
];
const XTPM_AMP: [ChipSelect; 32] = [
    cs(4, 4),  cs(5, 4),  cs(6, 4),  cs(7, 4),
    cs(8, 5),  cs(9, 5),  cs(10, 5), cs(11, 5),
    cs(4, 6),  cs(5, 6),  cs(6, 6),  cs(7, 6),
    cs(8, 7),  cs(9, 7),  cs(10, 7), cs(11, 7),
    cs(4, 4),  cs(5, 4),  cs(6, 4),  cs(7, 4),
    cs(8, 5),  cs(9, 5),  cs(10, 5), cs(11, 5),
    cs(4, 6),  cs(5, 6),  cs(6, 6),  cs(7, 6),
    cs(8, 7),  cs(9, 7),  cs(10, 7), cs(11, 7),
];

fn table(variant: BoardVariant, class: DeviceClass) -> &'static [ChipSelect] {
    match (variant, class) {
        (BoardVariant::Standard, DeviceClass::Pll) => &TPM_PLL,
        (BoardVariant::Standard, DeviceClass::Adc) => &TPM_ADC,
        (BoardVariant::Standard, DeviceClass::Amplifier) => &TPM_AMP,
        (BoardVariant::Extended, DeviceClass::Pll) => &XTPM_PLL,
        (BoardVariant::Extended, DeviceClass::Adc) => &XTPM_ADC,
        (BoardVariant::Extended, DeviceClass::Amplifier) => &XTPM_AMP,
    }
}

impl BoardVariant {
    pub fn channel_count(self, class: DeviceClass) -> u8 {
        table(self, class).len() as u8
    }

    pub fn adc_channels(self) -> Range<u8> {
        0..self.channel_count(DeviceClass::Adc)
    }
}

/// Masks written to the bridge's chip-select and clock-select registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub enable: u32,
    pub clock:  u32
}

pub fn route(variant: BoardVariant, class: DeviceClass, selection: Selection) -> Result<Route, Error> {
    let entries = table(variant, class);
    match selection {
        Selection::Index(index) => {
            match entries.get(index as usize) {
                Some(entry) => Ok(Route { enable: 1 << entry.enable, clock: 1 << entry.clock }),
                None => Err(Error::InvalidSelection { class: class, selection: selection })
            }
        }
        Selection::All if class == DeviceClass::Adc => {
            Ok(entries.iter().fold(Route { enable: 0, clock: 0 }, |acc, entry| Route {
                enable: acc.enable | 1 << entry.enable,
                clock:  acc.clock | 1 << entry.clock
            }))
        }
        Selection::All => Err(Error::InvalidSelection { class: class, selection: selection })
    }
}
