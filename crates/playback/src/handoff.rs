//! Interrupt → task handoff for DMA completion events.
//!
//! The DMA interrupt handler only flips atomics here; all buffer work happens
//! in the processing task. `TransferHandoff::new` is `const` so the handoff
//! can live in a `static` shared by the ISR and the task.
//!
//! ```text
//!  DMA ISR                         processing task
//!  ───────                         ───────────────
//!  signal_complete()  ──────────▶  take_complete() → refill vacated buffer
//!   active ^= 1
//!   complete = true
//! ```

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Flags shared between the transfer-complete interrupt and the task.
#[derive(Debug)]
pub struct TransferHandoff {
    active: AtomicU8,
    complete: AtomicBool,
    half: AtomicBool,
    armed: AtomicBool,
}

impl TransferHandoff {
    /// Disarmed handoff, buffer 0 active.
    pub const fn new() -> Self {
        Self {
            active: AtomicU8::new(0),
            complete: AtomicBool::new(false),
            half: AtomicBool::new(false),
            armed: AtomicBool::new(false),
        }
    }

    /// Start accepting interrupts with `active` as the buffer being drained.
    pub fn arm(&self, active: usize) {
        self.active.store(u8::from(active != 0), Ordering::Release);
        self.complete.store(false, Ordering::Release);
        self.half.store(false, Ordering::Release);
        self.armed.store(true, Ordering::Release);
    }

    /// Ignore interrupts until re-armed. Pending events are discarded.
    pub fn disarm(&self) {
        self.armed.store(false, Ordering::Release);
        self.complete.store(false, Ordering::Release);
        self.half.store(false, Ordering::Release);
    }

    /// Whether interrupts are being accepted.
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// Interrupt context: the active buffer finished draining.
    ///
    /// Toggles the active index and marks a refill as pending. A no-op while
    /// disarmed, so a late interrupt after `stop` cannot flip the index.
    pub fn signal_complete(&self) {
        if !self.is_armed() {
            return;
        }
        self.active.fetch_xor(1, Ordering::AcqRel);
        self.complete.store(true, Ordering::Release);
    }

    /// Interrupt context: the active buffer is half drained.
    pub fn signal_half(&self) {
        if self.is_armed() {
            self.half.store(true, Ordering::Release);
        }
    }

    /// Task context: consume a pending completion.
    pub fn take_complete(&self) -> bool {
        self.complete.swap(false, Ordering::AcqRel)
    }

    /// Task context: consume a pending half-transfer.
    pub fn take_half(&self) -> bool {
        self.half.swap(false, Ordering::AcqRel)
    }

    /// Index of the buffer the hardware is draining (0 or 1).
    pub fn active(&self) -> usize {
        usize::from(self.active.load(Ordering::Acquire) & 1)
    }
}

impl Default for TransferHandoff {
    fn default() -> Self {
        Self::new()
    }
}
