//! A single UART channel and its transport buffers.

use crate::{
    BUFFER_SIZE, Error,
    config::{self, BaudRate, DEFAULT_CLOCK, Framing},
    regs::{Fcr, Lcr, Lsr, Mcr, RegisterIo, line_status, offsets, read_reg, write_reg},
    ring_buffer::{CircularBuffer, Full},
};

/// Parameters for creating a [`Uart`].
///
/// ```
/// use tl16c2550::{UartConfig, Uart};
///
/// let config = UartConfig::new(0x9F60).baud_rate(19_200).framing("7E1".parse()?);
/// let uart: Uart = Uart::new(&config)?;
/// assert_eq!(uart.divisor(), 48);
/// # Ok::<(), tl16c2550::Error>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartConfig {
    /// Bus address of register 0.
    pub base_address: usize,
    /// Crystal frequency already divided by 16.
    pub clock: u32,
    /// Requested baud rate. Ignored when `divisor` is set.
    pub baud_rate: u32,
    /// Word format.
    pub framing: Framing,
    /// Divisor to program instead of deriving one from `baud_rate`.
    pub divisor: Option<u16>,
}

impl UartConfig {
    /// 9600 baud, 8N1, [`DEFAULT_CLOCK`].
    pub const fn new(base_address: usize) -> Self {
        UartConfig {
            base_address,
            clock: DEFAULT_CLOCK,
            baud_rate: 9600,
            framing: Framing::EIGHT_N_ONE,
            divisor: None,
        }
    }

    /// Sets the pre-divided clock.
    pub const fn clock(mut self, clock: u32) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the baud rate.
    pub const fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Sets the word format.
    pub const fn framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    /// Programs `divisor` directly instead of deriving it from the baud rate.
    pub const fn divisor(mut self, divisor: u16) -> Self {
        self.divisor = Some(divisor);
        self
    }
}

/// What one [`Uart::service`] call moved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Serviced {
    /// A byte moved from RBR into the input buffer.
    pub received: bool,
    /// A byte moved from the output buffer into THR.
    pub sent: bool,
    /// Data was waiting in RBR but the input buffer was full.
    pub rx_blocked: bool,
}

/// One serial channel: where it lives, how it is configured, and its input
/// and output buffers.
///
/// Configuration is fixed at construction; there are no setters.
#[derive(Debug)]
pub struct Uart<const N: usize = BUFFER_SIZE> {
    base_address: usize,
    clock: u32,
    divisor: u16,
    baud_rate: BaudRate,
    line_control: u8,
    rx: CircularBuffer<N>,
    tx: CircularBuffer<N>,
}

impl<const N: usize> Uart<N> {
    /// Validates `config` and builds the instance with empty, zeroed buffers.
    ///
    /// All parameters are checked before the buffers are created, so an error
    /// never leaves anything behind.
    pub fn new(config: &UartConfig) -> Result<Self, Error> {
        let line_control = config.framing.line_control()?;
        let (divisor, baud_rate) = match config.divisor {
            Some(0) => return Err(Error::ZeroDivisor),
            Some(d) => (d, BaudRate::from_rate(config.clock / u32::from(d))),
            None => (
                config::divisor(config.clock, config.baud_rate)?,
                BaudRate::from_rate(config.baud_rate),
            ),
        };

        Ok(Uart {
            base_address: config.base_address,
            clock: config.clock,
            divisor,
            baud_rate,
            line_control,
            rx: CircularBuffer::new(),
            tx: CircularBuffer::new(),
        })
    }

    /// Bus address of register 0.
    #[inline]
    pub fn base_address(&self) -> usize {
        self.base_address
    }

    /// Pre-divided clock.
    #[inline]
    pub fn clock(&self) -> u32 {
        self.clock
    }

    /// Divisor latch value, never zero.
    #[inline]
    pub fn divisor(&self) -> u16 {
        self.divisor
    }

    /// Requested baud rate, or the one implied by an explicit divisor.
    #[inline]
    pub fn baud_rate(&self) -> BaudRate {
        self.baud_rate
    }

    /// Line Control Register value (DLAB clear).
    #[inline]
    pub fn line_control(&self) -> u8 {
        self.line_control
    }

    /// Word format decoded from [`line_control`](Self::line_control).
    pub fn framing(&self) -> Framing {
        config::decode_line_control(self.line_control)
    }

    /// Input buffer: filled from the hardware, drained by the application.
    #[inline]
    pub fn rx(&self) -> &CircularBuffer<N> {
        &self.rx
    }

    /// Output buffer: filled by the application, drained to the hardware.
    #[inline]
    pub fn tx(&self) -> &CircularBuffer<N> {
        &self.tx
    }

    /// Both buffers, for splitting into producer and consumer halves.
    ///
    /// The interrupt side must only hold the input [`Producer`] and the output
    /// [`Consumer`]; the application the other two.
    ///
    /// [`Producer`]: crate::Producer
    /// [`Consumer`]: crate::Consumer
    #[inline]
    pub fn buffers_mut(&mut self) -> (&mut CircularBuffer<N>, &mut CircularBuffer<N>) {
        (&mut self.rx, &mut self.tx)
    }

    /// Programs the chip: divisor, word format, FIFOs enabled and reset,
    /// DTR, RTS and OUT2 asserted, interrupts disabled.
    pub fn init<B: RegisterIo + ?Sized>(&self, bus: &mut B) {
        let base = self.base_address;
        let [dll, dlm] = self.divisor.to_le_bytes();

        write_reg(bus, base, offsets::IER, 0);
        write_reg(bus, base, offsets::LCR, Lcr::DLAB.bits());
        write_reg(bus, base, offsets::DLL, dll);
        write_reg(bus, base, offsets::DLM, dlm);
        write_reg(bus, base, offsets::LCR, self.line_control);
        write_reg(
            bus,
            base,
            offsets::FCR,
            (Fcr::ENABLE | Fcr::CLEAR_RX | Fcr::CLEAR_TX).bits(),
        );
        write_reg(bus, base, offsets::MCR, (Mcr::DTR | Mcr::RTS | Mcr::OUT2).bits());

        debug!(
            "uart {=usize:#x}: divisor {=u16}, lcr {=u8:#x}",
            base,
            self.divisor,
            self.line_control
        );
    }

    /// Moves at most one byte in each direction between the chip and the
    /// buffers.
    ///
    /// This is the polling counterpart of an interrupt handler: call it
    /// whenever the hardware may be ready. A received byte stays in the chip
    /// while the input buffer is full.
    pub fn service<B: RegisterIo + ?Sized>(&mut self, bus: &mut B) -> Serviced {
        let base = self.base_address;
        let lsr = line_status(bus, base);
        let mut serviced = Serviced::default();

        if lsr.contains(Lsr::DATA_READY) {
            if self.rx.is_full() {
                serviced.rx_blocked = true;
            } else {
                let byte = read_reg(bus, base, offsets::RBR);
                // Cannot fail: checked above and we are the only producer.
                let _ = self.rx.push(byte);
                serviced.received = true;
            }
        }
        if lsr.intersects(Lsr::OVERRUN_ERROR | Lsr::PARITY_ERROR | Lsr::FRAMING_ERROR) {
            warn!("uart {=usize:#x}: line error {=u8:#x}", base, lsr.bits());
        }

        if lsr.contains(Lsr::THR_EMPTY) {
            if let Some(byte) = self.tx.pop() {
                write_reg(bus, base, offsets::THR, byte);
                serviced.sent = true;
            }
        }
        serviced
    }

    /// Takes the oldest received byte.
    #[inline]
    pub fn read(&mut self) -> Option<u8> {
        self.rx.pop()
    }

    /// Queues one byte for transmission.
    #[inline]
    pub fn write(&mut self, byte: u8) -> Result<(), Full> {
        self.tx.push(byte)
    }

    /// Queues as many of `bytes` as fit, returning how many were taken.
    pub fn queue(&mut self, bytes: &[u8]) -> usize {
        bytes
            .iter()
            .take_while(|&&byte| self.tx.push(byte).is_ok())
            .count()
    }
}
