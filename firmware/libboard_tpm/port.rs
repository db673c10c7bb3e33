/// Failure of the channel carrying register accesses to the board.
#[derive(Fail, Debug, Clone, PartialEq, Eq)]
#[fail(display = "register access at {:#010x} failed: {}", address, reason)]
pub struct TransportError {
    pub address: u32,
    pub reason:  String
}

impl TransportError {
    pub fn new<R: Into<String>>(address: u32, reason: R) -> TransportError {
        TransportError { address: address, reason: reason.into() }
    }
}

/// Atomic 32-bit access to the board's register space.
///
/// How the channel is established (UCP over UDP, PCIe, a simulator) is up to
/// the implementor. Accesses are synchronous and blocking, and nothing here
/// is safe to interleave: the SPI bridge's chip-select and clock-select
/// registers are shared by every chip on the board, so the whole bring-up
/// takes the port by `&mut`.
pub trait RegisterPort {
    fn read32(&mut self, address: u32) -> Result<u32, TransportError>;
    fn write32(&mut self, address: u32, value: u32) -> Result<(), TransportError>;
}

impl<'a, P: RegisterPort + ?Sized> RegisterPort for &'a mut P {
    fn read32(&mut self, address: u32) -> Result<u32, TransportError> {
        (**self).read32(address)
    }

    fn write32(&mut self, address: u32, value: u32) -> Result<(), TransportError> {
        (**self).write32(address, value)
    }
}
