//! The contract the embedding emulator must satisfy for a [`crate::core::DebugCore`]
//! to attach to it.
//!
//! These traits intentionally say nothing about the 68000's own
//! instruction set or timing; they only expose the handful of
//! observation points the debug core's hooks need.

use crate::addr::Size;

/// Read/write access to the emulated address space, as seen by the
/// debugger (i.e. after any mirroring the target applies internally).
pub trait Bus {
    /// Reads `size` bytes at `addr`, zero-extended into a `u32`.
    ///
    /// Implementations should treat this the same as any other bus read:
    /// side effects on I/O registers are expected and not suppressed here.
    /// The debug core suspends its own watchpoint/protect machinery around
    /// calls it makes for its own purposes (see [`crate::reentry`]), but it
    /// cannot suspend effects the target bus itself causes.
    fn read(&mut self, addr: u32, size: Size) -> u32;

    /// Writes `value` truncated to `size` bytes at `addr`.
    fn write(&mut self, addr: u32, size: Size, value: u32);
}

/// CPU-visible register file, as seen by the debugger.
pub trait Registers {
    /// Current program counter.
    fn pc(&self) -> u32;
    /// Moves the program counter, e.g. after a host-directed jump.
    fn set_pc(&mut self, pc: u32);
    /// Reads data register `Dn` (`n` in `0..8`).
    fn data(&self, n: u8) -> u32;
    /// Reads address register `An` (`n` in `0..8`); `A7` is the active
    /// stack pointer.
    fn addr(&self, n: u8) -> u32;
    /// Status register.
    fn sr(&self) -> u16;
    /// Monotone cycle counter, used by the profiler to attribute elapsed
    /// time to the previously-sampled PC.
    fn cycles(&self) -> u64;
}

/// Optional JIT control, implemented by targets that compile hot code;
/// interpreter-only targets need not implement this.
///
/// A [`crate::profiler::Profiler`] that isn't wired to one behaves exactly
/// as if profiling were running against an interpreter: starting and
/// stopping profiling has no side effect on code generation.
pub trait JitControl {
    /// Current JIT code-cache budget, to be restored once profiling ends.
    fn cache_size(&self) -> u32;
    /// Disables code generation and flushes any already-compiled blocks,
    /// so that subsequent execution goes through the interpreter and PCs
    /// the profiler samples are real fetch addresses.
    fn disable_and_flush(&mut self);
    /// Restores code generation with a `size`-sized cache and flushes it.
    fn restore_and_flush(&mut self, size: u32);
}
