//! The bounded table of live UART instances.
//!
//! A [`Registry`] is an ordinary value owned by the application, created once
//! at startup with [`Registry::new`] and passed to whatever needs lookups.
//! Instances live in fixed slots and are addressed by [`UartId`] handles;
//! creating and releasing an instance acquires and frees a slot.

use core::fmt;

use crate::{
    BUFFER_SIZE, Error, MAX_UARTS,
    config::{Framing, Parity},
    uart::{Uart, UartConfig},
};

/// Handle to a registered UART: the index of its slot.
///
/// Slot 0 is a valid handle. A handle stays valid until the instance is
/// [released](Registry::release). Freed slots are reused lowest first and
/// handles carry no generation, so a handle kept past its release refers to
/// whichever instance is registered in that slot next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UartId(u8);

impl UartId {
    /// Handle for slot `index`.
    pub const fn from_index(index: u8) -> Self {
        UartId(index)
    }

    /// Slot index.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for UartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uart{}", self.0)
    }
}

/// Owns up to `MAX` [`Uart`] instances with `N`-byte buffers.
pub struct Registry<const N: usize = BUFFER_SIZE, const MAX: usize = MAX_UARTS> {
    slots: [Option<Uart<N>>; MAX],
    len: usize,
    /// Instance currently routed to the interrupt or polling collaborator.
    active: Option<UartId>,
}

impl<const N: usize, const MAX: usize> Registry<N, MAX> {
    /// An empty table with no active instance.
    pub const fn new() -> Self {
        const { assert!(MAX <= u8::MAX as usize + 1) };
        Registry {
            slots: [const { None }; MAX],
            len: 0,
            active: None,
        }
    }

    /// Creates and registers an instance, deriving the divisor from
    /// `baud_rate`.
    ///
    /// Every parameter is validated before the instance is built, and the
    /// table is only touched once construction has succeeded.
    pub fn create(
        &mut self,
        clock: u32,
        baud_rate: u32,
        base_address: usize,
        data_bits: u8,
        parity: Parity,
        stop_bits: u8,
    ) -> Result<UartId, Error> {
        let config = UartConfig::new(base_address)
            .clock(clock)
            .baud_rate(baud_rate)
            .framing(Framing {
                data_bits,
                parity,
                stop_bits,
            });
        self.create_from(&config)
    }

    /// Like [`create`](Self::create) but programs `divisor` as given.
    pub fn create_with_divisor(
        &mut self,
        clock: u32,
        divisor: u16,
        base_address: usize,
        data_bits: u8,
        parity: Parity,
        stop_bits: u8,
    ) -> Result<UartId, Error> {
        let config = UartConfig::new(base_address)
            .clock(clock)
            .divisor(divisor)
            .framing(Framing {
                data_bits,
                parity,
                stop_bits,
            });
        self.create_from(&config)
    }

    /// Creates and registers an instance from a full configuration.
    pub fn create_from(&mut self, config: &UartConfig) -> Result<UartId, Error> {
        self.check_room(config.base_address)?;
        let uart = Uart::new(config).inspect_err(|_e| {
            warn!("uart {=usize:#x}: rejected: {}", config.base_address, _e);
        })?;
        self.register(uart)
    }

    /// Takes ownership of `uart` and assigns it the lowest free slot.
    pub fn register(&mut self, uart: Uart<N>) -> Result<UartId, Error> {
        self.check_room(uart.base_address())?;
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(Error::RegistryFull)?;
        let id = UartId(index as u8);
        debug!(
            "uart {=usize:#x}: registered as {}",
            uart.base_address(),
            id
        );
        self.slots[index] = Some(uart);
        self.len += 1;
        Ok(id)
    }

    fn check_room(&self, base_address: usize) -> Result<(), Error> {
        if self.len >= MAX {
            return Err(Error::RegistryFull);
        }
        if self.find(base_address).is_some() {
            return Err(Error::AddressInUse(base_address));
        }
        Ok(())
    }

    /// Removes an instance and hands it back, buffers included.
    pub fn release(&mut self, id: UartId) -> Result<Uart<N>, Error> {
        let uart = self
            .slots
            .get_mut(id.index())
            .and_then(Option::take)
            .ok_or(Error::NotFound(id))?;
        self.len -= 1;
        if self.active == Some(id) {
            self.active = None;
        }
        debug!("{}: released", id);
        Ok(uart)
    }

    /// Looks up a live instance.
    pub fn get(&self, id: UartId) -> Result<&Uart<N>, Error> {
        self.slots
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(Error::NotFound(id))
    }

    /// Looks up a live instance mutably.
    pub fn get_mut(&mut self, id: UartId) -> Result<&mut Uart<N>, Error> {
        self.slots
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(Error::NotFound(id))
    }

    /// Handle of the live instance at `base_address`, if any.
    pub fn find(&self, base_address: usize) -> Option<UartId> {
        self.iter()
            .find(|(_, uart)| uart.base_address() == base_address)
            .map(|(id, _)| id)
    }

    /// Live instances in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (UartId, &Uart<N>)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|uart| (UartId(i as u8), uart)))
    }

    /// Number of live instances.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no instance is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` if every slot is taken.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == MAX
    }

    /// Routes `id` to the interrupt or polling collaborator.
    pub fn set_active(&mut self, id: UartId) -> Result<(), Error> {
        self.get(id)?;
        self.active = Some(id);
        Ok(())
    }

    /// The instance currently routed to the collaborator.
    #[inline]
    pub fn active(&self) -> Option<UartId> {
        self.active
    }

    /// Stops routing any instance to the collaborator.
    #[inline]
    pub fn clear_active(&mut self) {
        self.active = None;
    }
}

impl<const N: usize, const MAX: usize> Default for Registry<N, MAX> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize, const MAX: usize> fmt::Debug for Registry<N, MAX> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("len", &self.len)
            .field("capacity", &MAX)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}
