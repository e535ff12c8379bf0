//! Re-entrancy guard for debugger self-calls.
//!
//! The core reads the emulated bus during its own work: classifying an
//! opcode for the shadow call stack, dumping memory for the host, or
//! disassembling. Each such self-call must be wrapped so that watchpoint
//! and protect hooks triggered by *that* read or write are suppressed —
//! otherwise the debugger would trip its own watchpoints.

use std::cell::Cell;

/// Counts nested debugger self-calls.
///
/// Watchpoint and protect hooks early-out while this is above zero. A
/// [`Suspend`] guard increments on construction and decrements on every
/// exit path (including an early return or panic) via `Drop`, so the
/// counter can never get stuck above zero.
#[derive(Debug, Default)]
pub struct SuspendCounter(Cell<u32>);

impl SuspendCounter {
    /// Constructs a counter starting at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self(Cell::new(0))
    }

    /// Returns whether any self-call is currently in flight.
    #[must_use]
    pub fn active(&self) -> bool {
        self.0.get() > 0
    }

    /// Acquires a guard, suppressing watchpoint/protect hooks until it is
    /// dropped.
    pub fn acquire(&self) -> Suspend<'_> {
        self.0.set(self.0.get() + 1);
        Suspend(self)
    }
}

/// RAII guard returned by [`SuspendCounter::acquire`].
#[derive(Debug)]
pub struct Suspend<'a>(&'a SuspendCounter);

impl Drop for Suspend<'_> {
    fn drop(&mut self) {
        let count = &self.0 .0;
        count.set(count.get().saturating_sub(1));
    }
}
