//! Bring-up of a whole TPM: PLL, ADCs, JESD204 receiver and the transfer
//! engine, in that order.
//!
//! Nothing here recovers from a partial failure. If any stage errors out the
//! board is left half configured, and the only way forward is to run
//! `bring_up` again from the top.

use crate::ad9528;
use crate::ad9680::{self, BitWidth};
use crate::clock::Clock;
use crate::config::Settings;
use crate::error::{Error, Mismatch, Warning};
use crate::jesd204;
use crate::port::RegisterPort;
use crate::spi::SpiBridge;
use crate::transfer;

/// What the last bring-up left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Status {
    pub pll_locked:   bool,
    pub transferring: bool,
    pub mismatches:   Vec<Mismatch>,
    pub warnings:     Vec<Warning>
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BringUpReport {
    pub width:    BitWidth,
    pub warnings: Vec<Warning>
}

impl BringUpReport {
    pub fn mismatches(&self) -> Vec<&Mismatch> {
        self.warnings.iter()
            .filter_map(|warning| match warning {
                &Warning::Mismatch(ref mismatch) => Some(mismatch),
                _ => None
            })
            .collect()
    }
}

pub struct Tpm<P, C> {
    port:     P,
    clock:    C,
    settings: Settings,
    status:   Status
}

impl<P: RegisterPort, C: Clock> Tpm<P, C> {
    pub fn new(port: P, clock: C, settings: Settings) -> Tpm<P, C> {
        Tpm {
            port:     port,
            clock:    clock,
            settings: settings,
            status:   Status::default()
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn into_parts(self) -> (P, C) {
        (self.port, self.clock)
    }

    fn spi(&mut self) -> SpiBridge {
        let settings = self.settings;
        SpiBridge::new(&mut self.port, &self.clock, settings.map.spi,
                       settings.variant, settings.wait)
    }

    /// Stop any running transfer, then configure the PLL for `mhz`, every
    /// ADC and the JESD204 receiver for `bits`-bit samples, and start the
    /// transfer engine.
    ///
    /// Unsupported frequencies and widths are replaced by their defaults and
    /// reported in the returned warnings, as are link parameter readbacks
    /// that disagree with the expected values.
    pub fn bring_up(&mut self, mhz: u32, bits: u8) -> Result<BringUpReport, Error> {
        info!("bringing up {:?} board at {} MHz, {}-bit samples", self.settings.variant, mhz, bits);
        self.status = Status::default();
        self.stop_transfer()?;

        let mut warnings = Vec::new();
        let (width, substituted) = BitWidth::from_bits(bits);
        if let Some(warning) = substituted {
            warn!("{}", warning);
            warnings.push(warning);
        }

        warnings.extend(ad9528::init(&mut self.spi(), mhz)?);
        self.status.pll_locked = true;

        let mut mismatches = Vec::new();
        let configured = ad9680::configure_all(&mut self.spi(), width, &mut mismatches);
        self.status.mismatches = mismatches.clone();
        configured?;
        warnings.extend(mismatches.into_iter().map(Warning::Mismatch));

        let jesd_base = self.settings.map.jesd;
        jesd204::configure(&mut self.port, jesd_base, width)?;

        self.start_transfer()?;

        self.status.warnings = warnings.clone();
        info!("bring-up done with {} warnings", warnings.len());
        Ok(BringUpReport { width: width, warnings: warnings })
    }

    /// Start the transfer engine, then after the settling delay force all
    /// ADCs into ILA and user data phase together.
    pub fn start_transfer(&mut self) -> Result<(), Error> {
        let map = self.settings.map;
        transfer::start(&mut self.port, map.transfer, map.fpga)?;
        self.status.transferring = true;

        self.clock.spin_ms(self.settings.settle_ms);
        ad9680::force_sync(&mut self.spi())
    }

    pub fn stop_transfer(&mut self) -> Result<(), Error> {
        let base = self.settings.map.transfer;
        transfer::stop(&mut self.port, base)?;
        self.status.transferring = false;
        Ok(())
    }

    /// Configure one ADC outside of a full bring-up.
    pub fn configure_adc(&mut self, adcno: u8, bits: u8) -> Result<Vec<Warning>, Error> {
        ad9680::configure(&mut self.spi(), adcno, bits)
    }

    /// Read the PLL lock status from the chip.
    pub fn check_pll_lock(&mut self) -> Result<bool, Error> {
        let locked = ad9528::is_locked(&mut self.spi())?;
        self.status.pll_locked = locked;
        Ok(locked)
    }

    /// Read the transfer engine's run bit.
    pub fn is_transferring(&mut self) -> Result<bool, Error> {
        let base = self.settings.map.transfer;
        transfer::is_running(&mut self.port, base)
    }
}
