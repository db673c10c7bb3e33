//! AD9680 ADC setup: test patterns, JESD204B framing and link checks.

use crate::error::{Error, Mismatch, Warning};
use crate::routing::Selection;
use crate::spi::SpiBridge;
use crate::wait::poll_until;

pub const SPI_CONFIG_A: u16    = 0x000;
pub const SOFT_RESET: u8       = 1 << 0;
pub const SYSREF_CTRL: u16     = 0x120;
pub const TEST_PATTERN: u16    = 0x550;
pub const USER_PATTERN1: u16   = 0x551;
pub const PLL_STATUS: u16      = 0x56f;
pub const JESD_QUICK_CFG: u16  = 0x570;
pub const LINK_CTRL1: u16      = 0x571;
pub const LINK_CTRL2: u16      = 0x572;
pub const LINK_CTRL3: u16      = 0x573;
pub const JESD_L_SCR: u16      = 0x58b;
pub const JESD_F: u16          = 0x58c;
pub const JESD_K: u16          = 0x58d;
pub const JESD_M: u16          = 0x58e;
pub const JESD_CS_N: u16       = 0x58f;
pub const JESD_NP: u16         = 0x590;
pub const LANE_PD: u16         = 0x5b0;
pub const LANE_ASSIGN1: u16    = 0x5b2;
pub const LANE_ASSIGN2: u16    = 0x5b3;
pub const LANE_ASSIGN3: u16    = 0x5b5;
pub const LANE_ASSIGN4: u16    = 0x5b6;

/// PLL_STATUS while the JESD204B PLL has not locked yet.
pub const PLL_NOT_LOCKED: u8 = 0x80;

const LINK_POWER_DOWN: u8 = 0x15;
const LINK_ENABLE: u8 = 0x14;
/// SYNC~ input as CMOS.
const SYNC_CMOS: u8 = 0x80;
/// Force ILA and user data phase on SYNC~.
pub const SYNC_FORCE_ILA: u8 = 0xc0;

const FRAMES_PER_MULTIFRAME: u8 = 0x1f;

// The user pattern is loaded twice; the second set is the one in use.
const USER_PATTERN: [u8; 16] = [
    0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88,
    0x11, 0x55, 0x33, 0x55, 0x55, 0x55, 0x77, 0x55,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitWidth {
    Eight,
    Fourteen
}

impl BitWidth {
    pub const DEFAULT: BitWidth = BitWidth::Eight;

    pub fn bits(self) -> u8 {
        match self {
            BitWidth::Eight => 8,
            BitWidth::Fourteen => 14,
        }
    }

    /// Map a sample width in bits, falling back to 8 bits with a warning.
    pub fn from_bits(bits: u8) -> (BitWidth, Option<Warning>) {
        match bits {
            8 => (BitWidth::Eight, None),
            14 => (BitWidth::Fourteen, None),
            _ => (BitWidth::DEFAULT, Some(Warning::UnsupportedBitWidth {
                requested: bits,
                substituted: BitWidth::DEFAULT.bits()
            }))
        }
    }

    pub fn profile(self) -> &'static BitWidthProfile {
        match self {
            BitWidth::Eight => &EIGHT_BIT,
            BitWidth::Fourteen => &FOURTEEN_BIT,
        }
    }
}

/// Per-width JESD204B framing: ADC registers and the matching lane mask
/// for the FPGA receiver.
#[derive(Debug)]
pub struct BitWidthProfile {
    /// Writes following the common L/K setup, in order.
    pub framing: &'static [(u16, u8)],
    /// Expected readback of `JESD_L_SCR`.
    pub lanes: u8,
    /// Lanes-in-use mask for the JESD204 receiver core.
    pub jesd_lanes: u32
}

const FOURTEEN_BIT: BitWidthProfile = BitWidthProfile {
    framing: &[
        (JESD_CS_N, 0x0f),
        (JESD_NP, 0x2f),
        (JESD_QUICK_CFG, 0x88),
        (JESD_L_SCR, 0x83),
        (JESD_NP, 0x2f),
        (LANE_ASSIGN1, 0x00),
        (LANE_ASSIGN2, 0x01),
        (LANE_ASSIGN3, 0x02),
        (LANE_ASSIGN4, 0x03),
    ],
    lanes: 0x83,
    jesd_lanes: 0xf
};

const EIGHT_BIT: BitWidthProfile = BitWidthProfile {
    framing: &[
        (JESD_CS_N, 0x07),
        (JESD_NP, 0x27),
        (JESD_QUICK_CFG, 0x48),
        (JESD_L_SCR, 0x81),
        (JESD_NP, 0x27),
        (LANE_ASSIGN1, 0x00),
        (LANE_ASSIGN2, 0x01),
        (LANE_ASSIGN3, 0x00),
        (LANE_ASSIGN4, 0x01),
        (LANE_PD, 0xfa), // unused lanes
    ],
    lanes: 0x81,
    jesd_lanes: 0x3
};

fn write(spi: &mut SpiBridge, adcno: u8, addr: u16, data: u8) -> Result<(), Error> {
    spi.write_adc(Selection::Index(adcno), addr, data)
}

fn read(spi: &mut SpiBridge, adcno: u8, addr: u16) -> Result<u8, Error> {
    spi.read_adc(adcno, addr)
}

fn reset(spi: &mut SpiBridge, adcno: u8) -> Result<(), Error> {
    write(spi, adcno, SPI_CONFIG_A, SOFT_RESET)?;
    write(spi, adcno, SYSREF_CTRL, 0x00)?;
    let (clock, policy) = (spi.clock(), spi.policy());
    poll_until(clock, policy, "AD9680 reset", || {
        Ok(read(spi, adcno, SPI_CONFIG_A)? & SOFT_RESET == 0)
    })
}

fn test_patterns(spi: &mut SpiBridge, adcno: u8) -> Result<(), Error> {
    write(spi, adcno, TEST_PATTERN, 0x00)?;
    write(spi, adcno, LINK_CTRL3, 0x00)?;
    for (i, &pattern) in USER_PATTERN.iter().enumerate() {
        write(spi, adcno, USER_PATTERN1 + (i % 8) as u16, pattern)?;
    }
    Ok(())
}

fn framing(spi: &mut SpiBridge, adcno: u8, width: BitWidth) -> Result<(), Error> {
    write(spi, adcno, LINK_CTRL1, LINK_POWER_DOWN)?;
    write(spi, adcno, LINK_CTRL2, SYNC_CMOS)?;
    debug!("AD9680-{} SYNC~ control {:#04x}", adcno, read(spi, adcno, LINK_CTRL2)?);

    write(spi, adcno, JESD_L_SCR, 0x81)?;
    write(spi, adcno, JESD_K, FRAMES_PER_MULTIFRAME)?;
    for &(addr, data) in width.profile().framing {
        write(spi, adcno, addr, data)?;
        if width == BitWidth::Eight && addr == JESD_L_SCR {
            debug!("AD9680-{} lane config {:#04x}", adcno, read(spi, adcno, JESD_L_SCR)?);
        }
    }

    write(spi, adcno, LINK_CTRL1, LINK_ENABLE)
}

fn check(spi: &mut SpiBridge, adcno: u8, field: &'static str, register: u16,
         expected: u8, mismatches: &mut Vec<Mismatch>) -> Result<(), Error> {
    let actual = read(spi, adcno, register)?;
    if actual != expected {
        let mismatch = Mismatch {
            channel: adcno,
            field: field,
            register: register,
            expected: expected,
            actual: actual
        };
        warn!("{}", mismatch);
        mismatches.push(mismatch);
    }
    Ok(())
}

/// Read back the link parameters. Disagreements are reported, not raised:
/// the link is often usable regardless.
pub fn verify(spi: &mut SpiBridge, adcno: u8, width: BitWidth) -> Result<Vec<Mismatch>, Error> {
    let mut mismatches = Vec::new();
    check(spi, adcno, "lane count", JESD_L_SCR, width.profile().lanes, &mut mismatches)?;
    check(spi, adcno, "octets per frame", JESD_F, 0x00, &mut mismatches)?;
    check(spi, adcno, "frames per multiframe", JESD_K, FRAMES_PER_MULTIFRAME, &mut mismatches)?;
    check(spi, adcno, "virtual converters", JESD_M, 0x01, &mut mismatches)?;
    Ok(mismatches)
}

/// Configure one ADC for `width`-bit samples and wait for its JESD204B PLL.
pub fn setup(spi: &mut SpiBridge, adcno: u8, width: BitWidth) -> Result<Vec<Mismatch>, Error> {
    info!("AD9680-{} initializing for {}-bit samples...", adcno, width.bits());
    reset(spi, adcno)?;
    test_patterns(spi, adcno)?;
    framing(spi, adcno, width)?;

    let (clock, policy) = (spi.clock(), spi.policy());
    poll_until(clock, policy, "AD9680 PLL lock", || {
        Ok(read(spi, adcno, PLL_STATUS)? != PLL_NOT_LOCKED)
    })?;

    let mismatches = verify(spi, adcno, width)?;
    if mismatches.is_empty() {
        info!("  ...done");
    } else {
        info!("  ...done with {} mismatches", mismatches.len());
    }
    Ok(mismatches)
}

/// Configure a single ADC given a width in bits.
pub fn configure(spi: &mut SpiBridge, adcno: u8, bits: u8) -> Result<Vec<Warning>, Error> {
    let (width, substituted) = BitWidth::from_bits(bits);
    let mut warnings = Vec::new();
    if let Some(warning) = substituted {
        warn!("{}", warning);
        warnings.push(warning);
    }
    warnings.extend(setup(spi, adcno, width)?.into_iter().map(Warning::Mismatch));
    Ok(warnings)
}

/// Configure every ADC on the board, stopping at the first error.
///
/// Channels already configured are left as they are. Their mismatches are
/// appended to `mismatches` even when a later channel fails.
pub fn configure_all(spi: &mut SpiBridge, width: BitWidth,
                     mismatches: &mut Vec<Mismatch>) -> Result<(), Error> {
    for adcno in spi.variant().adc_channels() {
        match setup(spi, adcno, width) {
            Ok(found) => mismatches.extend(found),
            Err(err) => {
                error!("AD9680-{} setup failed: {}", adcno, err);
                return Err(err)
            }
        }
    }
    Ok(())
}

/// Force every ADC into ILA and user data phase at once.
pub fn force_sync(spi: &mut SpiBridge) -> Result<(), Error> {
    spi.write_adc(Selection::All, LINK_CTRL2, SYNC_FORCE_ILA)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_width_fallback() {
        assert_eq!(BitWidth::from_bits(8), (BitWidth::Eight, None));
        assert_eq!(BitWidth::from_bits(14), (BitWidth::Fourteen, None));
        assert_eq!(BitWidth::from_bits(12),
                   (BitWidth::Eight, Some(Warning::UnsupportedBitWidth { requested: 12, substituted: 8 })));
    }

    #[test]
    fn profiles_match_receiver_lanes() {
        assert_eq!(BitWidth::Eight.profile().jesd_lanes, 0x3);
        assert_eq!(BitWidth::Fourteen.profile().jesd_lanes, 0xf);
        for &width in [BitWidth::Eight, BitWidth::Fourteen].iter() {
            let profile = width.profile();
            let last_lanes = profile.framing.iter().rev()
                .find(|&&(addr, _)| addr == JESD_L_SCR)
                .map(|&(_, data)| data);
            assert_eq!(last_lanes, Some(profile.lanes));
        }
    }

    #[test]
    fn only_eight_bit_powers_down_lanes() {
        assert!(BitWidth::Eight.profile().framing.contains(&(LANE_PD, 0xfa)));
        assert!(!BitWidth::Fourteen.profile().framing.iter().any(|&(addr, _)| addr == LANE_PD));
    }
}
