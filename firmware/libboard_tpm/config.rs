use std::collections::BTreeMap;
use std::{fmt, fs, io, str};
use std::path::Path;

use crate::jesd204;
use crate::routing::BoardVariant;
use crate::spi;
use crate::transfer;
use crate::wait::{WaitPolicy, DEFAULT_TIMEOUT_MS};

pub const DEFAULT_SETTLE_MS: u64 = 1_000;

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    MissingSeparator { line: usize },
    EmptyKey { line: usize },
    NotFound
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            &Error::Io(ref err) =>
                write!(f, "{}", err),
            &Error::MissingSeparator { line } =>
                write!(f, "missing separator on line {}", line),
            &Error::EmptyKey { line } =>
                write!(f, "empty key on line {}", line),
            &Error::NotFound =>
                write!(f, "key not found"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Error {
        Error::Io(value)
    }
}

/// Key/value settings, one `key = value` pair per line. Blank lines and
/// lines starting with `#` are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    entries: BTreeMap<String, String>
}

impl Config {
    pub fn new() -> Config {
        Config::default()
    }

    pub fn parse(text: &str) -> Result<Config, Error> {
        let mut config = Config::new();
        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue
            }
            let mut parts = line.splitn(2, '=');
            let key = parts.next().unwrap_or("").trim();
            let value = match parts.next() {
                Some(value) => value.trim(),
                None => return Err(Error::MissingSeparator { line: index + 1 })
            };
            if key.is_empty() {
                return Err(Error::EmptyKey { line: index + 1 })
            }
            config.write(key, value);
        }
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, Error> {
        let text = fs::read_to_string(path)?;
        Config::parse(&text)
    }

    pub fn read_str<F, R>(&self, key: &str, f: F) -> R
        where F: FnOnce(Result<&str, Error>) -> R
    {
        match self.entries.get(key) {
            Some(value) => f(Ok(value.as_str())),
            None => f(Err(Error::NotFound))
        }
    }

    pub fn write(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_owned(), value.to_owned());
    }

    pub fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

impl str::FromStr for Config {
    type Err = Error;

    fn from_str(text: &str) -> Result<Config, Error> {
        Config::parse(text)
    }
}

/// Base addresses of the blocks the bring-up touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterMap {
    pub spi:      u32,
    pub jesd:     u32,
    pub transfer: u32,
    pub fpga:     u32
}

impl Default for RegisterMap {
    fn default() -> RegisterMap {
        RegisterMap {
            spi:      spi::DEFAULT_BASE,
            jesd:     jesd204::DEFAULT_BASE,
            transfer: transfer::DEFAULT_BASE,
            fpga:     transfer::DEFAULT_FPGA_BASE
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub variant:   BoardVariant,
    pub wait:      WaitPolicy,
    /// Delay between starting the transfer engine and forcing the ADCs
    /// into their data phase. The gateware has no ready flag for this.
    pub settle_ms: u64,
    pub map:       RegisterMap
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            variant:   BoardVariant::Standard,
            wait:      WaitPolicy::Bounded { timeout_ms: DEFAULT_TIMEOUT_MS },
            settle_ms: DEFAULT_SETTLE_MS,
            map:       RegisterMap::default()
        }
    }
}

fn parse_u32(value: &str) -> Option<u32> {
    let value = value.replace('_', "");
    if value.starts_with("0x") || value.starts_with("0X") {
        u32::from_str_radix(&value[2..], 16).ok()
    } else {
        value.parse().ok()
    }
}

fn read_address(config: &Config, key: &str, default: u32) -> u32 {
    config.read_str(key, |result| match result {
        Ok(value) => parse_u32(value).unwrap_or_else(|| {
            warn!("{} setting not recognised. Falling back to default.", key);
            default
        }),
        Err(_) => default
    })
}

impl Settings {
    pub fn from_config(config: &Config) -> Settings {
        let default = Settings::default();

        let variant = config.read_str("board", |result| match result {
            Ok("tpm") => BoardVariant::Standard,
            Ok("xtpm") => BoardVariant::Extended,
            Ok(_) => {
                warn!("board setting not recognised. Falling back to default.");
                default.variant
            }
            Err(_) => default.variant
        });

        let wait = config.read_str("wait_timeout_ms", |result| match result {
            Ok("none") => WaitPolicy::Unbounded,
            Ok(value) => match value.parse::<u64>() {
                Ok(timeout_ms) => WaitPolicy::Bounded { timeout_ms: timeout_ms },
                Err(_) => {
                    warn!("wait_timeout_ms setting not recognised. Falling back to default.");
                    default.wait
                }
            },
            Err(_) => default.wait
        });

        let settle_ms = config.read_str("transfer_settle_ms", |result| match result {
            Ok(value) => value.parse::<u64>().unwrap_or_else(|_| {
                warn!("transfer_settle_ms setting not recognised. Falling back to default.");
                default.settle_ms
            }),
            Err(_) => default.settle_ms
        });

        let map = RegisterMap {
            spi:      read_address(config, "spi_base", default.map.spi),
            jesd:     read_address(config, "jesd_base", default.map.jesd),
            transfer: read_address(config, "transfer_base", default.map.transfer),
            fpga:     read_address(config, "fpga_base", default.map.fpga)
        };

        Settings {
            variant:   variant,
            wait:      wait,
            settle_ms: settle_ms,
            map:       map
        }
    }
}
