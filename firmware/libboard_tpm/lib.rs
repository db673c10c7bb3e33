//! Bring-up of the TPM digitizer front-end: the AD9528 clock synthesizer,
//! the AD9680 ADCs and the FPGA-resident JESD204B receiver, all reached
//! through a 32-bit register window onto the board.

extern crate failure;
#[macro_use]
extern crate failure_derive;
#[macro_use]
extern crate log;

pub mod port;
pub mod clock;
pub mod wait;
pub mod error;
pub mod config;

pub mod routing;
pub mod spi;

pub mod ad9528;
pub mod ad9680;
pub mod jesd204;
pub mod transfer;

pub mod tpm;

pub use error::{Error, Mismatch, Warning};
pub use port::{RegisterPort, TransportError};
pub use routing::{BoardVariant, DeviceClass, Selection};
pub use tpm::{BringUpReport, Status, Tpm};
