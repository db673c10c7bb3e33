/*
 * AD9528 config:
 * PLL1 reference dividers per board: the XTPM block is set up for a 100MHz
 * VCXO, the TPM block for the TPM reference (0x104 = 0x08, 0x108 = 0x2a)
 * PLL2 VCO divided down to the ADC sample clock
 * ADC clock: fs (700, 800 or 1000MHz; 360MHz on XTPM)
 * FPGA clock: fs/4
 * SYSREF: continuous, shared by ADCs and FPGA
 */

use crate::error::{Error, Warning};
use crate::routing::BoardVariant;
use crate::spi::SpiBridge;
use crate::wait::poll_until;

pub const SPI_CONFIG: u16    = 0x000;
pub const SOFT_RESET: u8     = 1 << 0;
pub const IO_UPDATE: u16     = 0x00f;

pub const PLL2_CTRL: u16     = 0x200;
pub const PLL2_VCO_CAL: u16  = 0x203;
pub const OUTPUT_BASE: u16   = 0x300;
pub const SYSREF_REQUEST: u16 = 0x32a;
pub const SYSREF_CTRL0: u16  = 0x400;
pub const SYSREF_CTRL3: u16  = 0x403;
pub const POWER_DOWN: u16    = 0x500;
pub const OUTPUT_PD_LO: u16  = 0x501;
pub const OUTPUT_PD_HI: u16  = 0x502;
pub const STATUS0: u16       = 0x508;
pub const STATUS1: u16       = 0x509;

/// STATUS0 once both PLLs report lock and the references are present.
pub const LOCKED: u8 = 0xf2;
/// STATUS1 once VCO calibration has finished.
pub const CALIBRATED: u8 = 0x08;

pub const DEFAULT_MHZ: u32 = 700;
pub const OUTPUT_COUNT: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputType {
    Clk,
    ClkDiv4,
    Sysref,
    Unused
}

impl OutputType {
    /// Values for the three registers at `0x300 + 3*channel`.
    pub fn registers(self) -> [u8; 3] {
        match self {
            OutputType::Clk     => [0x00, 0x00, 0x00],
            OutputType::ClkDiv4 => [0x00, 0x00, 0x03],
            OutputType::Sysref  => [0x40, 0x00, 0x00],
            OutputType::Unused  => [0x00, 0x00, 0x00],
        }
    }
}

const TPM_OUTPUTS: [OutputType; OUTPUT_COUNT] = [
    OutputType::ClkDiv4, // 0: FPGA0 clock
    OutputType::ClkDiv4, // 1: FPGA1 clock
    OutputType::Sysref,  // 2: FPGA SYSREF
    OutputType::Clk,     // 3: ADC0 clock
    OutputType::Unused,
    OutputType::Unused,
    OutputType::Unused,
    OutputType::Unused,
    OutputType::Clk,     // 8: ADC1 clock
    OutputType::Sysref,  // 9: ADC1 SYSREF
    OutputType::Unused,
    OutputType::Unused,
    OutputType::Unused,
    OutputType::Sysref,  // 13: ADC0 SYSREF
];

const XTPM_OUTPUTS: [OutputType; OUTPUT_COUNT] = [
    OutputType::Sysref,
    OutputType::Unused,
    OutputType::Clk,
    OutputType::Unused,
    OutputType::Sysref,
    OutputType::Unused,
    OutputType::ClkDiv4,
    OutputType::Unused,
    OutputType::ClkDiv4,
    OutputType::Sysref,
    OutputType::Sysref,
    OutputType::Unused,
    OutputType::ClkDiv4,
    OutputType::ClkDiv4,
];

pub fn output_config(variant: BoardVariant) -> &'static [OutputType; OUTPUT_COUNT] {
    match variant {
        BoardVariant::Standard => &TPM_OUTPUTS,
        BoardVariant::Extended => &XTPM_OUTPUTS,
    }
}

/// One bit per output channel that is not driven.
pub fn powerdown_mask(outputs: &[OutputType]) -> u16 {
    outputs.iter().enumerate()
        .filter(|&(_, &output)| output == OutputType::Unused)
        .fold(0, |mask, (channel, _)| mask | 1 << channel)
}

// PLL1: reference and feedback dividers for the VCXO loop
const TPM_PLL1_WRITES: [(u16, u8); 7] = [
    (0x100, 0x01),
    (0x102, 0x01),
    (0x104, 0x08),
    (0x106, 0x14),
    (0x107, 0x13),
    (0x108, 0x2a),
    (0x109, 0x04),
];

const XTPM_PLL1_WRITES: [(u16, u8); 7] = [
    (0x100, 0x01),
    (0x102, 0x01),
    (0x104, 0x0a), // 100MHz VCXO
    (0x106, 0x94), // 100MHz VCXO
    (0x107, 0x13),
    (0x108, 0x00), // 100MHz VCXO
    (0x109, 0x04),
];

const TPM_PLL2_CTRL: u8 = 0xe6;
const XTPM_PLL2_CTRL: u8 = 0xff;

/// PLL2 charge pump, feedback divider, VCO calibration, M1 and N2
/// settings for one output frequency.
#[derive(Debug, PartialEq, Eq)]
pub struct FrequencyProfile {
    pub mhz:    u32,
    pub writes: [(u16, u8); 7]
}

impl FrequencyProfile {
    /// The value written to `PLL2_VCO_CAL` by the profile. Calibration is
    /// triggered by rewriting it and then setting bit 0.
    pub fn vco_cal(&self) -> u8 {
        self.writes.iter()
            .find(|&&(addr, _)| addr == PLL2_VCO_CAL)
            .map(|&(_, data)| data)
            .unwrap_or(0x10)
    }
}

const TPM_PROFILES: [FrequencyProfile; 3] = [
    FrequencyProfile { mhz: 1000, writes: [
        (0x201, 0x19), (0x202, 0x13), (0x203, 0x10), (0x204, 0x04),
        (0x205, 0x02), (0x207, 0x02), (0x208, 0x18)] },
    FrequencyProfile { mhz: 800, writes: [
        (0x201, 0x46), (0x202, 0x33), (0x203, 0x10), (0x204, 0x05),
        (0x205, 0x02), (0x207, 0x01), (0x208, 0x04)] },
    FrequencyProfile { mhz: 700, writes: [
        (0x201, 0xeb), (0x202, 0x13), (0x203, 0x10), (0x204, 0x05),
        (0x205, 0x02), (0x207, 0x04), (0x208, 0x22)] },
];

const XTPM_PROFILES: [FrequencyProfile; 4] = [
    FrequencyProfile { mhz: 1000, writes: [
        (0x201, 0x0a), (0x202, 0x33), (0x203, 0x10), (0x204, 0x04), // M1 = 4
        (0x205, 0x02), (0x207, 0x02), (0x208, 0x09)] },             // N1 = 10
    FrequencyProfile { mhz: 800, writes: [
        (0x201, 0x0a), (0x202, 0x33), (0x203, 0x10), (0x204, 0x05), // M1 = 5
        (0x205, 0x02), (0x207, 0x02), (0x208, 0x07)] },             // N1 = 8
    FrequencyProfile { mhz: 700, writes: [
        (0x201, 0xc8), (0x202, 0x33), (0x203, 0x10), (0x204, 0x05), // M1 = 5
        (0x205, 0x02), (0x207, 0x02), (0x208, 0x06)] },             // N1 = 7
    // The 360MHz dividers come from the TPM sequence, which also retunes the
    // output dividers at that rate. Here they run on the XTPM reference
    // block and the outputs keep their fs/4 dividers.
    FrequencyProfile { mhz: 360, writes: [
        (0x201, 0x4b), (0x202, 0x33), (0x203, 0x00), (0x204, 0x05),
        (0x205, 0x02), (0x207, 0x01), (0x208, 0x08)] },
];

fn profiles(variant: BoardVariant) -> &'static [FrequencyProfile] {
    match variant {
        BoardVariant::Standard => &TPM_PROFILES,
        BoardVariant::Extended => &XTPM_PROFILES,
    }
}

pub fn supported_frequencies(variant: BoardVariant) -> Vec<u32> {
    profiles(variant).iter().map(|profile| profile.mhz).collect()
}

/// Look up the profile for `mhz`, falling back to 700MHz with a warning
/// when the board cannot produce the requested rate.
pub fn frequency_profile(variant: BoardVariant, mhz: u32) -> (&'static FrequencyProfile, Option<Warning>) {
    let table = profiles(variant);
    if let Some(profile) = table.iter().find(|profile| profile.mhz == mhz) {
        return (profile, None)
    }
    let fallback = table.iter()
        .find(|profile| profile.mhz == DEFAULT_MHZ)
        .unwrap_or(&table[0]);
    (fallback, Some(Warning::UnsupportedFrequency { requested: mhz, substituted: fallback.mhz }))
}

fn pll1_writes(variant: BoardVariant) -> &'static [(u16, u8)] {
    match variant {
        BoardVariant::Standard => &TPM_PLL1_WRITES,
        BoardVariant::Extended => &XTPM_PLL1_WRITES,
    }
}

fn pll2_ctrl(variant: BoardVariant) -> u8 {
    match variant {
        BoardVariant::Standard => TPM_PLL2_CTRL,
        BoardVariant::Extended => XTPM_PLL2_CTRL,
    }
}

// Register writes are not read back before being issued: the evaluation
// software does so, but nothing indicates the AD9528 needs it.
fn write(spi: &mut SpiBridge, addr: u16, data: u8) -> Result<(), Error> {
    spi.write_pll(addr, data)
}

fn io_update(spi: &mut SpiBridge) -> Result<(), Error> {
    write(spi, IO_UPDATE, 0x01)
}

/// Wait for the previous IO update to be absorbed, then issue a new one.
fn await_update(spi: &mut SpiBridge) -> Result<(), Error> {
    let (clock, policy) = (spi.clock(), spi.policy());
    poll_until(clock, policy, "AD9528 IO update", || Ok(spi.read_pll(IO_UPDATE)? == 0))?;
    io_update(spi)
}

fn reset(spi: &mut SpiBridge) -> Result<(), Error> {
    write(spi, SPI_CONFIG, SOFT_RESET)?;
    let (clock, policy) = (spi.clock(), spi.policy());
    poll_until(clock, policy, "AD9528 reset", || {
        Ok(spi.read_pll(SPI_CONFIG)? & SOFT_RESET == 0)
    })
}

fn configure_outputs(spi: &mut SpiBridge, outputs: &[OutputType]) -> Result<(), Error> {
    for (channel, output) in outputs.iter().enumerate() {
        let channel_base = OUTPUT_BASE + 3*(channel as u16);
        let regs = output.registers();
        write(spi, channel_base, regs[0])?;
        write(spi, channel_base + 0x1, regs[1])?;
        write(spi, channel_base + 0x2, regs[2])?;
    }
    Ok(())
}

fn calibrate(spi: &mut SpiBridge, vco_cal: u8) -> Result<(), Error> {
    await_update(spi)?;
    write(spi, PLL2_VCO_CAL, vco_cal)?;
    await_update(spi)?;
    write(spi, PLL2_VCO_CAL, vco_cal | 0x01)?;
    await_update(spi)?;

    write(spi, SYSREF_CTRL3, 0x97)?;
    await_update(spi)?;
    write(spi, SYSREF_REQUEST, 0x01)?;
    await_update(spi)?;
    write(spi, SYSREF_REQUEST, 0x00)?;
    await_update(spi)?;

    write(spi, PLL2_VCO_CAL, vco_cal)?;
    io_update(spi)?;
    write(spi, PLL2_VCO_CAL, vco_cal | 0x01)?;
    io_update(spi)
}

/// Bring the AD9528 from reset to lock at `mhz`.
///
/// Steps:
///   - Soft reset, wait for the reset bit to self-clear
///   - PLL1 reference dividers, PLL2 dividers for the requested frequency
///   - 14 output channels, SYSREF generator, power down unused outputs
///   - VCO calibration in two passes, wait for STATUS1 to report it done
///   - Reissue SYSREF, toggle the SYSREF request, wait for lock
pub fn init(spi: &mut SpiBridge, mhz: u32) -> Result<Vec<Warning>, Error> {
    let variant = spi.variant();
    let mut warnings = Vec::new();

    let (profile, substituted) = frequency_profile(variant, mhz);
    if let Some(warning) = substituted {
        warn!("{}", warning);
        warnings.push(warning);
    }
    info!("AD9528 initializing for {} MHz...", profile.mhz);

    reset(spi)?;
    io_update(spi)?;

    for &(addr, data) in pll1_writes(variant) {
        write(spi, addr, data)?;
    }
    write(spi, PLL2_CTRL, pll2_ctrl(variant))?;
    for &(addr, data) in profile.writes.iter() {
        write(spi, addr, data)?;
    }

    info!("  setting outputs");
    let outputs = output_config(variant);
    configure_outputs(spi, outputs)?;

    info!("  setting SYSREF");
    write(spi, SYSREF_CTRL0, 0x14)?;
    write(spi, SYSREF_CTRL3, 0x96)?;

    let pd = powerdown_mask(outputs);
    write(spi, POWER_DOWN, 0x10)?;
    write(spi, OUTPUT_PD_LO, (pd & 0xff) as u8)?;
    write(spi, OUTPUT_PD_HI, (pd >> 8) as u8)?;

    info!("  calibrating");
    calibrate(spi, profile.vco_cal())?;

    let (clock, policy) = (spi.clock(), spi.policy());
    poll_until(clock, policy, "AD9528 calibration", || Ok(spi.read_pll(STATUS1)? == CALIBRATED))?;

    write(spi, SYSREF_CTRL3, 0x97)?;
    io_update(spi)?;
    write(spi, SYSREF_REQUEST, 0x01)?;
    io_update(spi)?;
    write(spi, SYSREF_REQUEST, 0x00)?;
    io_update(spi)?;

    info!("  waiting for lock...");
    poll_until(clock, policy, "AD9528 lock", || Ok(spi.read_pll(STATUS0)? == LOCKED))?;
    info!("  ...locked");

    Ok(warnings)
}

pub fn is_locked(spi: &mut SpiBridge) -> Result<bool, Error> {
    Ok(spi.read_pll(STATUS0)? == LOCKED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_registers() {
        assert_eq!(OutputType::Clk.registers(), [0x00, 0x00, 0x00]);
        assert_eq!(OutputType::ClkDiv4.registers(), [0x00, 0x00, 0x03]);
        assert_eq!(OutputType::Sysref.registers(), [0x40, 0x00, 0x00]);
        assert_eq!(OutputType::Unused.registers(), [0x00, 0x00, 0x00]);
    }

    #[test]
    fn powerdown_mask_bits() {
        let mut outputs = [OutputType::Clk; OUTPUT_COUNT];
        for &channel in [1, 3, 5].iter() {
            outputs[channel] = OutputType::Unused;
        }
        assert_eq!(powerdown_mask(&outputs), 0b0000_0000_0010_1010);
    }

    #[test]
    fn board_powerdown_masks() {
        assert_eq!(powerdown_mask(output_config(BoardVariant::Standard)), 0x1cf0);
        assert_eq!(powerdown_mask(output_config(BoardVariant::Extended)), 0x08aa);
    }

    #[test]
    fn unsupported_frequency_falls_back() {
        let (profile, warning) = frequency_profile(BoardVariant::Standard, 900);
        assert_eq!(profile.mhz, 700);
        assert_eq!(warning, Some(Warning::UnsupportedFrequency { requested: 900, substituted: 700 }));

        let (profile, warning) = frequency_profile(BoardVariant::Standard, 360);
        assert_eq!(profile.mhz, 700);
        assert!(warning.is_some());

        let (profile, warning) = frequency_profile(BoardVariant::Extended, 360);
        assert_eq!(profile.mhz, 360);
        assert_eq!(warning, None);
    }

    #[test]
    fn vco_calibration_value() {
        for &variant in [BoardVariant::Standard, BoardVariant::Extended].iter() {
            for mhz in supported_frequencies(variant) {
                let (profile, _) = frequency_profile(variant, mhz);
                let expected = if mhz == 360 { 0x00 } else { 0x10 };
                assert_eq!(profile.vco_cal(), expected);
            }
        }
    }
}
