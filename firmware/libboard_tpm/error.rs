use std::fmt;

use crate::port::TransportError;
use crate::routing::{DeviceClass, Selection};

/// Fatal bring-up failures. Any of these aborts the running sequence and
/// leaves the board partially configured.
#[derive(Fail, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[fail(display = "{}", _0)]
    Transport(#[cause] TransportError),
    #[fail(display = "timed out after {} ms waiting for {}", timeout_ms, what)]
    TimedOut { what: &'static str, timeout_ms: u64 },
    #[fail(display = "no {} chip at {}", class, selection)]
    InvalidSelection { class: DeviceClass, selection: Selection }
}

impl From<TransportError> for Error {
    fn from(value: TransportError) -> Error {
        Error::Transport(value)
    }
}

/// A readback that disagreed with the value the sequence expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub channel:  u8,
    pub field:    &'static str,
    pub register: u16,
    pub expected: u8,
    pub actual:   u8
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ADC {}: {} [{:#05x}] is {:#04x}, expected {:#04x}",
               self.channel, self.field, self.register, self.actual, self.expected)
    }
}

/// Conditions that are reported but do not stop the bring-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    UnsupportedFrequency { requested: u32, substituted: u32 },
    UnsupportedBitWidth { requested: u8, substituted: u8 },
    Mismatch(Mismatch)
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            &Warning::UnsupportedFrequency { requested, substituted } =>
                write!(f, "frequency {} MHz is not supported, using {} MHz", requested, substituted),
            &Warning::UnsupportedBitWidth { requested, substituted } =>
                write!(f, "{}-bit samples are not supported, using {} bits", requested, substituted),
            &Warning::Mismatch(ref mismatch) =>
                write!(f, "{}", mismatch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_lifts_into_error() {
        fn fails() -> Result<(), Error> {
            let _: u32 = Err(TransportError::new(0x2000_0014, "socket closed"))?;
            Ok(())
        }
        let err = fails().unwrap_err();
        assert_eq!(err.to_string(), "register access at 0x20000014 failed: socket closed");
    }

    #[test]
    fn mismatch_display() {
        let warning = Warning::Mismatch(Mismatch {
            channel: 1, field: "frames per multiframe", register: 0x58d, expected: 0x1f, actual: 0x0f
        });
        assert_eq!(warning.to_string(),
                   "ADC 1: frames per multiframe [0x58d] is 0x0f, expected 0x1f");
    }
}
