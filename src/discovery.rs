//! Finding UART channels on the bus.
//!
//! A channel is present when its scratch register echoes what was written to
//! it. The probe writes nothing but the scratch register, so scanning never
//! disturbs a channel that is already running.

use crate::{
    MAX_UARTS,
    regs::{RegisterIo, offsets, read_reg, write_reg},
};

/// First candidate base address: the start of the X16 expansion I/O window.
pub const SCAN_START: usize = 0x9F60;

/// Distance between candidate base addresses: one 8-register channel.
pub const SCAN_STRIDE: usize = offsets::COUNT;

/// Complementary bit patterns, so neither a floating bus nor a stuck data
/// line passes.
const PATTERNS: [u8; 2] = [0x55, 0xAA];

/// Which addresses a scan probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanConfig {
    /// First candidate.
    pub start: usize,
    /// Distance between candidates.
    pub stride: usize,
    /// Number of candidates, capped at [`MAX_UARTS`] since no registry can
    /// hold more.
    pub count: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            start: SCAN_START,
            stride: SCAN_STRIDE,
            count: MAX_UARTS,
        }
    }
}

impl ScanConfig {
    /// Number of candidates actually probed.
    #[inline]
    pub fn len(&self) -> usize {
        self.count.min(MAX_UARTS)
    }

    /// Returns `true` if the scan probes nothing.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `index`th candidate address.
    ///
    /// `None` past the end, or when the candidate's register window would run
    /// past the end of the address space.
    pub fn candidate(&self, index: usize) -> Option<usize> {
        if index >= self.len() {
            return None;
        }
        let base = self
            .stride
            .checked_mul(index)
            .and_then(|offset| self.start.checked_add(offset))?;
        base.checked_add(offsets::COUNT - 1).map(|_| base)
    }
}

/// Returns `true` if a channel answers at `base`.
///
/// Each pattern is written to the scratch register and must read back the
/// same value twice in a row.
pub fn probe<B: RegisterIo + ?Sized>(bus: &mut B, base: usize) -> bool {
    PATTERNS.iter().all(|&pattern| {
        write_reg(bus, base, offsets::SCR, pattern);
        let first = read_reg(bus, base, offsets::SCR);
        let second = read_reg(bus, base, offsets::SCR);
        trace!(
            "probe {=usize:#x}: wrote {=u8:#x}, read {=u8:#x} {=u8:#x}",
            base,
            pattern,
            first,
            second
        );
        first == pattern && second == pattern
    })
}

/// A lazy scan over the candidates of a [`ScanConfig`].
///
/// Each call to [`next`](Iterator::next) probes candidates until one answers.
/// The scan ends after the last candidate and can be started over with
/// [`restart`](Scan::restart), for example to notice hot-plugged cards.
pub struct Scan<'a, B: ?Sized> {
    bus: &'a mut B,
    config: ScanConfig,
    next: usize,
}

impl<B: RegisterIo + ?Sized> Scan<'_, B> {
    /// Goes back to the first candidate.
    pub fn restart(&mut self) {
        self.next = 0;
    }

    /// The configuration being scanned.
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }
}

impl<B: RegisterIo + ?Sized> Iterator for Scan<'_, B> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        while let Some(base) = self.config.candidate(self.next) {
            self.next += 1;
            if probe(&mut *self.bus, base) {
                info!("found uart at {=usize:#x}", base);
                return Some(base);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.config.len().saturating_sub(self.next)))
    }
}

/// Scans the candidates of `config`, yielding each responding base address.
pub fn scan<B: RegisterIo + ?Sized>(bus: &mut B, config: ScanConfig) -> Scan<'_, B> {
    debug!(
        "scanning {=usize} candidates from {=usize:#x}",
        config.len(),
        config.start
    );
    Scan {
        bus,
        config,
        next: 0,
    }
}

/// Scans into a fixed array, returning how many addresses were stored.
///
/// Stops early once `found` is full.
pub fn scan_into<B: RegisterIo + ?Sized>(
    bus: &mut B,
    config: ScanConfig,
    found: &mut [usize],
) -> usize {
    let mut stored = 0;
    for (slot, base) in found.iter_mut().zip(scan(bus, config)) {
        *slot = base;
        stored += 1;
    }
    stored
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::regs::sim::SimBus;
    use std::vec::Vec;

    fn base(i: usize) -> usize {
        SCAN_START + i * SCAN_STRIDE
    }

    #[test]
    fn empty_bus_finds_nothing() {
        let mut bus = SimBus::new();
        assert_eq!(scan(&mut bus, ScanConfig::default()).count(), 0);

        bus.open_bus = 0x00;
        assert_eq!(scan(&mut bus, ScanConfig::default()).count(), 0);
    }

    #[test]
    fn floating_bus_matching_one_pattern_is_rejected() {
        let mut bus = SimBus::new();
        bus.open_bus = 0x55;
        assert!(!probe(&mut bus, base(0)));
        bus.open_bus = 0xAA;
        assert!(!probe(&mut bus, base(0)));
    }

    #[test]
    fn finds_exactly_the_responding_address() {
        let mut bus = SimBus::new().with_chip(base(7));
        let found: Vec<usize> = scan(&mut bus, ScanConfig::default()).collect();
        assert_eq!(found, [base(7)]);
    }

    #[test]
    fn finds_both_channels_in_address_order() {
        let mut bus = SimBus::new().with_chip(base(5)).with_chip(base(4));
        let found: Vec<usize> = scan(&mut bus, ScanConfig::default()).collect();
        assert_eq!(found, [base(4), base(5)]);
    }

    #[test]
    fn probe_only_touches_scratch() {
        let mut bus = SimBus::new().with_chip(base(0));
        {
            let chip = bus.chip_mut(base(0));
            chip.lcr = 0x1B;
            chip.ier = 0x01;
            chip.mcr = 0x0B;
            chip.rx.push_back(b'q');
        }
        for _ in scan(&mut bus, ScanConfig::default()) {}

        assert!(
            bus.writes
                .iter()
                .all(|&(addr, _)| (addr - SCAN_START) % SCAN_STRIDE == offsets::SCR)
        );
        let chip = bus.chip(base(0));
        assert_eq!((chip.lcr, chip.ier, chip.mcr), (0x1B, 0x01, 0x0B));
        assert_eq!(chip.rx.front(), Some(&b'q'));
        assert!(chip.tx.is_empty());
    }

    #[test]
    fn scan_is_lazy_and_restartable() {
        let mut bus = SimBus::new().with_chip(base(1)).with_chip(base(3));
        assert_eq!(scan(&mut bus, ScanConfig::default()).next(), Some(base(1)));
        // Probing stopped right after the first hit.
        assert!(bus.writes.iter().all(|&(a, _)| a <= base(1) + offsets::SCR));

        let mut s = scan(&mut bus, ScanConfig::default());
        assert_eq!(s.next(), Some(base(1)));
        assert_eq!(s.next(), Some(base(3)));
        assert_eq!(s.next(), None);
        assert_eq!(s.next(), None);
        s.restart();
        assert_eq!(s.next(), Some(base(1)));
    }

    #[test]
    fn scan_is_bounded_by_count() {
        let mut bus = SimBus::new().with_chip(base(MAX_UARTS));
        assert_eq!(scan(&mut bus, ScanConfig::default()).count(), 0);

        let wide = ScanConfig {
            count: MAX_UARTS + 1,
            ..ScanConfig::default()
        };
        assert_eq!(wide.len(), MAX_UARTS);
        assert_eq!(wide.candidate(MAX_UARTS), None);
        assert_eq!(scan(&mut bus, wide).count(), 0);

        let shifted = ScanConfig {
            start: base(1),
            ..ScanConfig::default()
        };
        assert_eq!(scan(&mut bus, shifted).count(), 1);
    }

    #[test]
    fn candidates_stop_on_overflow() {
        let config = ScanConfig {
            start: usize::MAX - 4,
            stride: 8,
            count: 3,
        };
        // The register window of the first candidate runs off the end.
        assert_eq!(config.candidate(0), None);
        assert_eq!(config.candidate(1), None);
        assert_eq!(config.candidate(3), None);

        let last = ScanConfig {
            start: usize::MAX - (offsets::COUNT - 1),
            ..config
        };
        assert_eq!(last.candidate(0), Some(usize::MAX - 7));
        assert_eq!(last.candidate(1), None);
    }

    #[test]
    fn scan_near_top_of_address_space_ends_quietly() {
        let mut bus = SimBus::new();
        let config = ScanConfig {
            start: usize::MAX - 4,
            stride: 8,
            count: 3,
        };
        assert_eq!(scan(&mut bus, config).count(), 0);
        assert!(bus.writes.is_empty());

        let last = ScanConfig {
            start: usize::MAX - (offsets::COUNT - 1),
            ..config
        };
        assert_eq!(scan(&mut bus, last).count(), 0);
        // One write to the topmost scratch register, rejected on the first pattern.
        assert_eq!(bus.writes, [(usize::MAX, PATTERNS[0])]);
    }

    #[test]
    fn scan_into_fixed_array() {
        let mut bus = SimBus::new()
            .with_chip(base(0))
            .with_chip(base(2))
            .with_chip(base(9));
        let mut found = [0usize; MAX_UARTS];
        let n = scan_into(&mut bus, ScanConfig::default(), &mut found);
        assert_eq!(&found[..n], &[base(0), base(2), base(9)]);

        let mut two = [0usize; 2];
        assert_eq!(scan_into(&mut bus, ScanConfig::default(), &mut two), 2);
        assert_eq!(two, [base(0), base(2)]);
    }
}
