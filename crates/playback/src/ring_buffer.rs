//! Const-generic ring buffer backing the sample store.
//!
//! `RingBuffer<T, N>` holds up to `N` values without heap allocation. Head and
//! tail alone cannot tell "empty" from "full" when they coincide, so a `full`
//! flag disambiguates that case and the whole capacity is usable.
//!
//! # Constraints
//!
//! - Single producer, single consumer, both in the processing task. Not
//!   interrupt-safe; the ISR never touches it.
//! - Never resized after construction.

/// A fixed-capacity FIFO of `Copy` values.
pub struct RingBuffer<T, const N: usize> {
    buf: [T; N],
    /// Next slot to write.
    head: usize,
    /// Next slot to read.
    tail: usize,
    /// `head == tail` and every slot holds data.
    full: bool,
}

impl<T: Copy, const N: usize> RingBuffer<T, N> {
    /// Create an empty ring buffer with every slot set to `fill`.
    ///
    /// `const` so that the store can live in a `static`.
    pub const fn new(fill: T) -> Self {
        Self {
            buf: [fill; N],
            head: 0,
            tail: 0,
            full: false,
        }
    }

    /// Append one value. Returns `false` without mutating anything when full.
    pub fn append(&mut self, value: T) -> bool {
        if self.full {
            return false;
        }
        let Some(slot) = self.buf.get_mut(self.head) else {
            return false;
        };
        *slot = value;
        self.head = Self::advance(self.head);
        self.full = self.head == self.tail;
        true
    }

    /// Remove the oldest value, or `None` when empty.
    pub fn remove(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let value = *self.buf.get(self.tail)?;
        self.tail = Self::advance(self.tail);
        self.full = false;
        Some(value)
    }

    /// Number of values currently held.
    #[allow(clippy::arithmetic_side_effects)] // Safety: head, tail < N; N - tail + head < 2N only when head < tail
    pub fn available(&self) -> usize {
        if self.full {
            N
        } else if self.head >= self.tail {
            self.head - self.tail
        } else {
            N - self.tail + self.head
        }
    }

    /// Free slots.
    pub fn free(&self) -> usize {
        N.saturating_sub(self.available())
    }

    /// Maximum number of values the buffer can hold.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// `true` when no values are present.
    pub fn is_empty(&self) -> bool {
        self.head == self.tail && !self.full
    }

    /// `true` when every slot holds data.
    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Drop all content without touching the backing storage.
    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.full = false;
    }

    /// Append a slice atomically.
    ///
    /// # Errors
    ///
    /// Returns `Err(())` if the slice would not fit; the buffer is unchanged.
    #[allow(clippy::result_unit_err)] // overflow is the only error; () is sufficient
    pub fn write_slice(&mut self, data: &[T]) -> Result<(), ()> {
        if data.len() > self.free() {
            return Err(());
        }
        for &value in data {
            self.append(value);
        }
        Ok(())
    }

    /// Read up to `out.len()` values into `out`, returning how many were read.
    #[allow(clippy::arithmetic_side_effects)] // Safety: n <= out.len()
    pub fn read_slice(&mut self, out: &mut [T]) -> usize {
        let mut n = 0;
        for slot in out.iter_mut() {
            let Some(value) = self.remove() else { break };
            *slot = value;
            n += 1;
        }
        n
    }

    #[allow(clippy::arithmetic_side_effects)] // Safety: index < N, so index + 1 cannot overflow
    fn advance(index: usize) -> usize {
        (index + 1).checked_rem(N).unwrap_or(0)
    }
}

impl<T: Copy + Default, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
