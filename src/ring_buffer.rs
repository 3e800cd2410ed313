//! A fixed-capacity, single-producer, single-consumer (SPSC) byte ring.
//!
//! Each UART owns one ring per direction. For the input ring the hardware
//! side (an interrupt handler or [`crate::Uart::service`]) produces and the
//! application consumes; for the output ring the roles are reversed.

use core::{
    cell::UnsafeCell,
    fmt,
    sync::atomic::{AtomicU8, AtomicUsize, Ordering},
};

use bitflags::bitflags;

bitflags! {
    /// Occupancy status of a [`CircularBuffer`].
    ///
    /// When `head == tail` exactly one of `EMPTY` and `FULL` is set. When
    /// they differ neither is.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Status: u8 {
        /// No bytes stored.
        const EMPTY = 1 << 0;
        /// All `N` slots hold a byte.
        const FULL = 1 << 1;
        /// The stored bytes run past the last slot and continue at slot 0.
        const WRAPPED = 1 << 2;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Status {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Status({=u8:#x})", self.bits())
    }
}

/// Returned by a push into a full buffer, carrying the rejected byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Full(pub u8);

impl fmt::Display for Full {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer full, byte {:#04x} not stored", self.0)
    }
}

impl core::error::Error for Full {}

/// A ring of `N` bytes where all `N` slots are usable.
///
/// `N` must be a power of two no larger than 32768; this is checked at
/// compile time.
///
/// With exclusive access use [`push`](Self::push) and [`pop`](Self::pop)
/// directly. To feed the buffer from an interrupt handler while the
/// foreground drains it, [`split`](Self::split) it into a [`Producer`] and a
/// [`Consumer`].
pub struct CircularBuffer<const N: usize> {
    data: [UnsafeCell<u8>; N],
    /// Next slot to produce into. Only the producer stores it.
    head: AtomicUsize,
    /// Next slot to consume from. Only the consumer stores it.
    tail: AtomicUsize,
    /// [`Status`] bits, always written last.
    status: AtomicU8,
}

// SAFETY: Slots are only written by the single producer and only read by the
// single consumer, and a slot changes hands through the Release/Acquire pair on
// `status`. `head` and `tail` each have a single writer.
unsafe impl<const N: usize> Sync for CircularBuffer<N> {}

/// Writes bytes into a [`CircularBuffer`]. Owns `head`.
pub struct Producer<'a, const N: usize> {
    buf: &'a CircularBuffer<N>,
}

/// Reads bytes from a [`CircularBuffer`]. Owns `tail`.
pub struct Consumer<'a, const N: usize> {
    buf: &'a CircularBuffer<N>,
}

// SAFETY: Only one Producer exists per buffer (enforced by `split` taking
// `&mut self`), so moving it into an interrupt context keeps the
// single-producer invariant.
unsafe impl<const N: usize> Send for Producer<'_, N> {}

// SAFETY: As for Producer, `split` hands out exactly one Consumer.
unsafe impl<const N: usize> Send for Consumer<'_, N> {}

impl<const N: usize> CircularBuffer<N> {
    const MASK: usize = N - 1;

    /// Creates an empty, zeroed buffer.
    pub const fn new() -> Self {
        const { assert!(N.is_power_of_two() && N <= 32768) };
        CircularBuffer {
            data: [const { UnsafeCell::new(0) }; N],
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            status: AtomicU8::new(Status::EMPTY.bits()),
        }
    }

    /// Number of slots.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Current status bits.
    #[inline]
    pub fn status(&self) -> Status {
        // Acquire: pairs with the Release store that published the last change.
        Status::from_bits_truncate(self.status.load(Ordering::Acquire))
    }

    /// Returns `true` if no bytes are stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.status().contains(Status::EMPTY)
    }

    /// Returns `true` if all slots are occupied.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.status().contains(Status::FULL)
    }

    /// Number of stored bytes, derived from the indexes and status.
    pub fn len(&self) -> usize {
        // Both halves update the indexes and status inside a critical
        // section, so taking the snapshot inside one sees them agree.
        let (status, head, tail) = critical_section::with(|_| {
            (
                self.status(),
                self.head.load(Ordering::Relaxed),
                self.tail.load(Ordering::Relaxed),
            )
        });
        if status.contains(Status::EMPTY) {
            0
        } else if status.contains(Status::FULL) || head == tail {
            // Equal indexes in a non-empty buffer mean every slot is taken.
            N
        } else {
            head.wrapping_sub(tail) & Self::MASK
        }
    }

    /// Appends a byte, or hands it back if the buffer is full.
    ///
    /// A failed push leaves the buffer unchanged.
    #[inline]
    pub fn push(&mut self, byte: u8) -> Result<(), Full> {
        // SAFETY: `&mut self` guarantees we are the only producer.
        unsafe { self.produce(byte) }
    }

    /// Removes the oldest byte, or returns `None` if the buffer is empty.
    #[inline]
    pub fn pop(&mut self) -> Option<u8> {
        // SAFETY: `&mut self` guarantees we are the only consumer.
        unsafe { self.consume() }
    }

    /// Drops all stored bytes and zeroes the storage.
    pub fn clear(&mut self) {
        for slot in self.data.iter_mut() {
            *slot.get_mut() = 0;
        }
        *self.head.get_mut() = 0;
        *self.tail.get_mut() = 0;
        *self.status.get_mut() = Status::EMPTY.bits();
    }

    /// Splits the buffer into its producer and consumer halves.
    #[inline]
    pub fn split(&mut self) -> (Producer<'_, N>, Consumer<'_, N>) {
        (Producer { buf: self }, Consumer { buf: self })
    }

    /// # Safety
    ///
    /// The caller must be the only producer for the duration of the call.
    unsafe fn produce(&self, byte: u8) -> Result<(), Full> {
        // A stale status can only claim FULL when it no longer is, never the
        // reverse, because only the producer fills the buffer.
        if self.status().contains(Status::FULL) {
            return Err(Full(byte));
        }
        // Relaxed: the producer owns `head`.
        let head = self.head.load(Ordering::Relaxed);
        // SAFETY: The buffer is not full, so the slot at `head` is outside the
        // consumer-owned region and nobody else writes it.
        unsafe { *self.data[head].get() = byte };
        let new_head = (head + 1) & Self::MASK;

        critical_section::with(|_| {
            self.head.store(new_head, Ordering::Relaxed);
            let tail = self.tail.load(Ordering::Relaxed);
            let status = Self::status_for(new_head, tail, new_head == tail);
            // Release: publishes the slot write and the new `head`.
            self.status.store(status.bits(), Ordering::Release);
        });
        Ok(())
    }

    /// # Safety
    ///
    /// The caller must be the only consumer for the duration of the call.
    unsafe fn consume(&self) -> Option<u8> {
        // A stale status can only claim EMPTY when it no longer is.
        if self.status().contains(Status::EMPTY) {
            return None;
        }
        // Relaxed: the consumer owns `tail`.
        let tail = self.tail.load(Ordering::Relaxed);
        // SAFETY: The buffer is not empty, so the slot at `tail` holds a byte
        // published by the producer and is not written until `tail` moves on.
        let byte = unsafe { *self.data[tail].get() };
        let new_tail = (tail + 1) & Self::MASK;

        critical_section::with(|_| {
            self.tail.store(new_tail, Ordering::Relaxed);
            let head = self.head.load(Ordering::Relaxed);
            let status = Self::status_for(head, new_tail, false);
            // Release: hands the slot back to the producer.
            self.status.store(status.bits(), Ordering::Release);
        });
        Some(byte)
    }

    fn status_for(head: usize, tail: usize, full: bool) -> Status {
        if head == tail && !full {
            return Status::EMPTY;
        }
        let mut status = Status::empty();
        if full {
            status |= Status::FULL;
        }
        if head != 0 && head <= tail {
            status |= Status::WRAPPED;
        }
        status
    }
}

impl<const N: usize> Default for CircularBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Debug for CircularBuffer<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircularBuffer")
            .field("capacity", &N)
            .field("len", &self.len())
            .field("head", &self.head.load(Ordering::Relaxed))
            .field("tail", &self.tail.load(Ordering::Relaxed))
            .field("status", &self.status())
            .finish()
    }
}

impl<const N: usize> Producer<'_, N> {
    /// Appends a byte, or hands it back if the buffer is full.
    #[inline]
    pub fn push(&mut self, byte: u8) -> Result<(), Full> {
        // SAFETY: `split` created exactly one Producer and we hold it mutably.
        unsafe { self.buf.produce(byte) }
    }

    /// Returns `true` if a push would currently fail.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.buf.is_full()
    }
}

impl<const N: usize> Consumer<'_, N> {
    /// Removes the oldest byte, or returns `None` if the buffer is empty.
    #[inline]
    pub fn pop(&mut self) -> Option<u8> {
        // SAFETY: `split` created exactly one Consumer and we hold it mutably.
        unsafe { self.buf.consume() }
    }

    /// Returns `true` if a pop would currently fail.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Number of stored bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }
}
