#![no_std]
#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

#[cfg(test)]
extern crate std;

#[macro_use]
mod macros;

pub mod config;
pub mod discovery;
pub mod registry;
pub mod regs;
pub mod ring_buffer;
pub mod transport;
pub mod uart;

pub use config::{BaudRate, DEFAULT_CLOCK, Framing, Parity};
pub use discovery::{Scan, ScanConfig};
pub use registry::{Registry, UartId};
pub use regs::{Mmio, RegisterIo};
pub use ring_buffer::{CircularBuffer, Consumer, Full, Producer, Status};
pub use uart::{Serviced, Uart, UartConfig};

/// Maximum number of UART instances a [`Registry`] holds by default.
///
/// This is also the number of candidate addresses probed by a default
/// [`ScanConfig`]: the X16 I/O window `0x9F60..0xA000` fits exactly twenty
/// 8-register channels.
pub const MAX_UARTS: usize = 20;

/// Default capacity of each per-direction [`CircularBuffer`].
pub const BUFFER_SIZE: usize = 64;

/// Errors reported by the driver.
///
/// A full or empty buffer is not an error, see [`Full`] and
/// [`CircularBuffer::pop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Data bits outside `5..=8`.
    InvalidDataBits(u8),
    /// Stop bits other than 1 or 2.
    InvalidStopBits(u8),
    /// Parity character other than `N`, `O` or `E`.
    InvalidParity(char),
    /// A framing string that is not of the form `8N1`.
    InvalidFraming,
    /// A baud rate of zero was requested.
    ZeroBaudRate,
    /// The divisor computed for the clock and baud rate is zero, or a zero
    /// divisor was supplied.
    ZeroDivisor,
    /// The computed divisor does not fit the 16-bit divisor latch.
    DivisorOverflow(u32),
    /// The registry already holds its maximum number of instances.
    RegistryFull,
    /// A live instance already uses this base address.
    AddressInUse(usize),
    /// No live instance behind this handle.
    NotFound(UartId),
    /// The line status bit did not become ready within the spin budget.
    Timeout,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::InvalidDataBits(bits) => write!(f, "invalid data bits {bits}, expected 5 to 8"),
            Error::InvalidStopBits(bits) => write!(f, "invalid stop bits {bits}, expected 1 or 2"),
            Error::InvalidParity(c) => write!(f, "invalid parity '{c}', expected N, O or E"),
            Error::InvalidFraming => f.write_str("invalid framing, expected e.g. 8N1"),
            Error::ZeroBaudRate => f.write_str("baud rate must be non-zero"),
            Error::ZeroDivisor => f.write_str("divisor is zero, baud rate exceeds clock"),
            Error::DivisorOverflow(d) => write!(f, "divisor {d} does not fit in 16 bits"),
            Error::RegistryFull => f.write_str("no free UART slot"),
            Error::AddressInUse(base) => write!(f, "a UART at {base:#06x} is already registered"),
            Error::NotFound(id) => write!(f, "no UART registered as {id}"),
            Error::Timeout => f.write_str("UART did not become ready in time"),
        }
    }
}

impl core::error::Error for Error {}
