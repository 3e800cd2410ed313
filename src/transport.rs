//! Blocking byte-at-a-time transfers straight to the registers.
//!
//! These bypass the buffers. Each waits on a line status bit; the `budget`
//! argument bounds the wait. `None` waits forever, which hangs if the chip is
//! absent or unprogrammed. `Some(n)` gives up with [`Error::Timeout`] after
//! `n` further polls.

use crate::{
    Error,
    regs::{Lsr, RegisterIo, line_status, offsets, read_reg, write_reg},
};

/// Returns `true` if a received byte is waiting.
#[inline]
pub fn data_available<B: RegisterIo + ?Sized>(bus: &mut B, base: usize) -> bool {
    line_status(bus, base).contains(Lsr::DATA_READY)
}

/// Returns `true` if the transmitter can take a byte.
#[inline]
pub fn transmit_ready<B: RegisterIo + ?Sized>(bus: &mut B, base: usize) -> bool {
    line_status(bus, base).contains(Lsr::THR_EMPTY)
}

fn wait_for<B: RegisterIo + ?Sized>(
    bus: &mut B,
    base: usize,
    flag: Lsr,
    budget: Option<u32>,
) -> Result<(), Error> {
    let mut remaining = budget;
    loop {
        if line_status(bus, base).contains(flag) {
            return Ok(());
        }
        match remaining.as_mut() {
            Some(0) => {
                warn!("uart {=usize:#x}: timed out", base);
                return Err(Error::Timeout);
            }
            Some(n) => *n -= 1,
            None => {}
        }
        core::hint::spin_loop();
    }
}

/// Waits for THR to empty, then writes `byte`.
pub fn write_byte<B: RegisterIo + ?Sized>(
    bus: &mut B,
    base: usize,
    byte: u8,
    budget: Option<u32>,
) -> Result<(), Error> {
    wait_for(bus, base, Lsr::THR_EMPTY, budget)?;
    write_reg(bus, base, offsets::THR, byte);
    Ok(())
}

/// Waits for a received byte, then reads it.
pub fn read_byte<B: RegisterIo + ?Sized>(
    bus: &mut B,
    base: usize,
    budget: Option<u32>,
) -> Result<u8, Error> {
    wait_for(bus, base, Lsr::DATA_READY, budget)?;
    Ok(read_reg(bus, base, offsets::RBR))
}

/// Writes every byte of `bytes`, each with its own `budget`.
pub fn write_all<B: RegisterIo + ?Sized>(
    bus: &mut B,
    base: usize,
    bytes: &[u8],
    budget: Option<u32>,
) -> Result<(), Error> {
    bytes
        .iter()
        .try_for_each(|&byte| write_byte(bus, base, byte, budget))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::regs::sim::SimBus;

    const BASE: usize = 0x9F68;

    /// Counts line status reads, to check the budget.
    struct Counting<'a> {
        inner: &'a mut SimBus,
        lsr_reads: u32,
    }

    impl RegisterIo for Counting<'_> {
        fn read(&mut self, address: usize) -> u8 {
            if address == BASE + offsets::LSR {
                self.lsr_reads += 1;
            }
            self.inner.read(address)
        }

        fn write(&mut self, address: usize, value: u8) {
            self.inner.write(address, value)
        }
    }

    #[test]
    fn write_and_read_bytes() {
        let mut bus = SimBus::new().with_chip(BASE);
        write_all(&mut bus, BASE, b"Hello, UART!\r\n", None).unwrap();
        assert_eq!(bus.chip(BASE).tx, b"Hello, UART!\r\n");

        assert!(!data_available(&mut bus, BASE));
        bus.chip_mut(BASE).rx.push_back(0x1B);
        assert!(data_available(&mut bus, BASE));
        assert_eq!(read_byte(&mut bus, BASE, None), Ok(0x1B));
        assert!(!data_available(&mut bus, BASE));
    }

    #[test]
    fn stuck_transmitter_times_out() {
        let mut sim = SimBus::new().with_chip(BASE);
        sim.chip_mut(BASE).tx_ready = false;
        let mut bus = Counting {
            inner: &mut sim,
            lsr_reads: 0,
        };
        assert!(!transmit_ready(&mut bus, BASE));
        bus.lsr_reads = 0;

        assert_eq!(write_byte(&mut bus, BASE, b'x', Some(5)), Err(Error::Timeout));
        assert_eq!(bus.lsr_reads, 6);
        assert!(sim.chip(BASE).tx.is_empty());
    }

    #[test]
    fn no_data_times_out() {
        let mut bus = SimBus::new().with_chip(BASE);
        assert_eq!(read_byte(&mut bus, BASE, Some(0)), Err(Error::Timeout));
        assert_eq!(read_byte(&mut bus, BASE, Some(100)), Err(Error::Timeout));
    }

    #[test]
    fn write_all_stops_at_first_timeout() {
        let mut bus = SimBus::new().with_chip(BASE);
        bus.chip_mut(BASE).tx_ready = false;
        assert_eq!(write_all(&mut bus, BASE, b"abc", Some(3)), Err(Error::Timeout));
        assert!(bus.chip(BASE).tx.is_empty());
    }
}
