//! Register access and the TL16C2550 register map.
//!
//! Each UART channel occupies eight consecutive byte registers starting at its
//! base address. [`RegisterIo`] is the only way the driver touches the bus.

use core::ptr::{with_exposed_provenance, with_exposed_provenance_mut};

use bitflags::bitflags;

/// Byte-wide access to the I/O bus.
pub trait RegisterIo {
    /// Reads the register at `address`.
    fn read(&mut self, address: usize) -> u8;
    /// Writes `value` to the register at `address`.
    fn write(&mut self, address: usize, value: u8);
}

impl<T: RegisterIo + ?Sized> RegisterIo for &mut T {
    #[inline]
    fn read(&mut self, address: usize) -> u8 {
        (**self).read(address)
    }

    #[inline]
    fn write(&mut self, address: usize, value: u8) {
        (**self).write(address, value)
    }
}

/// Volatile access to the memory-mapped I/O window.
pub struct Mmio {
    _private: (),
}

impl Mmio {
    /// Creates the bus accessor.
    ///
    /// # Safety
    ///
    /// Every address later passed to [`RegisterIo::read`] or
    /// [`RegisterIo::write`] must be a mapped device register. Reads and
    /// writes of UART registers have side effects (popping the receive FIFO,
    /// starting a transmission), so the caller must also make sure no other
    /// code drives the same channel concurrently.
    pub const unsafe fn new() -> Self {
        Mmio { _private: () }
    }
}

impl RegisterIo for Mmio {
    #[inline]
    fn read(&mut self, address: usize) -> u8 {
        let reg = with_exposed_provenance::<u8>(address);
        // SAFETY: The constructor contract guarantees `address` is a mapped register.
        unsafe { reg.read_volatile() }
    }

    #[inline]
    fn write(&mut self, address: usize, value: u8) {
        let reg = with_exposed_provenance_mut::<u8>(address);
        // SAFETY: The constructor contract guarantees `address` is a mapped register.
        unsafe { reg.write_volatile(value) }
    }
}

/// Register offsets from a channel's base address.
pub mod offsets {
    /// Receiver Buffer Register (read, DLAB = 0).
    pub const RBR: usize = 0;
    /// Transmitter Holding Register (write, DLAB = 0).
    pub const THR: usize = 0;
    /// Divisor latch, low byte (DLAB = 1).
    pub const DLL: usize = 0;
    /// Interrupt Enable Register (DLAB = 0).
    pub const IER: usize = 1;
    /// Divisor latch, high byte (DLAB = 1).
    pub const DLM: usize = 1;
    /// Interrupt Identification Register (read).
    pub const IIR: usize = 2;
    /// FIFO Control Register (write).
    pub const FCR: usize = 2;
    /// Line Control Register.
    pub const LCR: usize = 3;
    /// Modem Control Register.
    pub const MCR: usize = 4;
    /// Line Status Register.
    pub const LSR: usize = 5;
    /// Modem Status Register.
    pub const MSR: usize = 6;
    /// Scratch Register.
    pub const SCR: usize = 7;

    /// Number of registers per channel.
    pub const COUNT: usize = 8;
}

bitflags! {
    /// Line Status Register.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Lsr: u8 {
        /// A received byte is waiting in RBR.
        const DATA_READY = 1 << 0;
        /// A received byte was lost.
        const OVERRUN_ERROR = 1 << 1;
        /// Parity error on the byte in RBR.
        const PARITY_ERROR = 1 << 2;
        /// Framing error on the byte in RBR.
        const FRAMING_ERROR = 1 << 3;
        /// Break condition received.
        const BREAK = 1 << 4;
        /// THR can accept a byte.
        const THR_EMPTY = 1 << 5;
        /// THR and the transmit shift register are both empty.
        const TRANSMITTER_EMPTY = 1 << 6;
        /// At least one error in the receive FIFO.
        const FIFO_ERROR = 1 << 7;
    }
}

bitflags! {
    /// Line Control Register bits outside the word format.
    ///
    /// The word length, stop bit and parity fields are produced by
    /// [`crate::config::encode_line_control`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Lcr: u8 {
        /// Drive the line to the spacing state.
        const BREAK = 1 << 6;
        /// Divisor Latch Access Bit: offsets 0 and 1 address DLL and DLM.
        const DLAB = 1 << 7;
    }
}

bitflags! {
    /// FIFO Control Register.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Fcr: u8 {
        /// Enable both FIFOs.
        const ENABLE = 1 << 0;
        /// Clear the receive FIFO.
        const CLEAR_RX = 1 << 1;
        /// Clear the transmit FIFO.
        const CLEAR_TX = 1 << 2;
        /// DMA mode select.
        const DMA_MODE = 1 << 3;
        /// Receive trigger level, low bit.
        const TRIGGER_LSB = 1 << 6;
        /// Receive trigger level, high bit.
        const TRIGGER_MSB = 1 << 7;
    }
}

bitflags! {
    /// Modem Control Register.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Mcr: u8 {
        /// Data Terminal Ready output.
        const DTR = 1 << 0;
        /// Request To Send output.
        const RTS = 1 << 1;
        /// User output 1.
        const OUT1 = 1 << 2;
        /// User output 2, gates the interrupt line on most boards.
        const OUT2 = 1 << 3;
        /// Internal loopback.
        const LOOPBACK = 1 << 4;
    }
}

bitflags! {
    /// Interrupt Enable Register.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Ier: u8 {
        /// Received data available.
        const RX_DATA = 1 << 0;
        /// THR empty.
        const THR_EMPTY = 1 << 1;
        /// Receiver line status.
        const LINE_STATUS = 1 << 2;
        /// Modem status.
        const MODEM_STATUS = 1 << 3;
    }
}

/// Reads the register at `offset` from `base`.
#[inline]
pub fn read_reg<B: RegisterIo + ?Sized>(bus: &mut B, base: usize, offset: usize) -> u8 {
    bus.read(base + offset)
}

/// Writes the register at `offset` from `base`.
#[inline]
pub fn write_reg<B: RegisterIo + ?Sized>(bus: &mut B, base: usize, offset: usize, value: u8) {
    bus.write(base + offset, value)
}

/// Reads the line status of the channel at `base`.
#[inline]
pub fn line_status<B: RegisterIo + ?Sized>(bus: &mut B, base: usize) -> Lsr {
    Lsr::from_bits_retain(read_reg(bus, base, offsets::LSR))
}
