//! Permanent and one-shot PC breakpoints.

use indexmap::IndexSet;

/// Default capacity of each breakpoint set.
///
/// A policy decision, not a contract: the reference implementation uses
/// 4096 for both the permanent and one-shot sets.
pub const CAPACITY: usize = 4096;

/// Permanent (`B`) and one-shot (`T`) PC breakpoint sets.
///
/// `T` and `B` may overlap; a hit consumes the one-shot entry regardless
/// of whether the address is also permanently set.
#[derive(Debug, Default)]
pub struct Breakpoints {
    perm: IndexSet<u32>,
    temp: IndexSet<u32>,
}

impl Breakpoints {
    /// Constructs an empty breakpoint table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a permanent breakpoint at `addr`.
    ///
    /// Returns `false` if the table is already at [`CAPACITY`] and `addr`
    /// was not already present.
    pub fn add(&mut self, addr: u32) -> bool {
        let addr = crate::addr::mask_addr(addr);
        if self.perm.contains(&addr) {
            return true;
        }
        if self.perm.len() >= CAPACITY {
            return false;
        }
        self.perm.insert(addr);
        true
    }

    /// Removes a permanent breakpoint. A no-op if `addr` was not set.
    pub fn remove(&mut self, addr: u32) {
        self.perm.shift_remove(&crate::addr::mask_addr(addr));
    }

    /// Installs a one-shot breakpoint at `addr`.
    ///
    /// Returns `false` if the one-shot table is full and `addr` was not
    /// already present.
    pub fn add_temp(&mut self, addr: u32) -> bool {
        let addr = crate::addr::mask_addr(addr);
        if self.temp.contains(&addr) {
            return true;
        }
        if self.temp.len() >= CAPACITY {
            return false;
        }
        self.temp.insert(addr);
        true
    }

    /// Removes a one-shot breakpoint. A no-op if `addr` was not set.
    pub fn remove_temp(&mut self, addr: u32) {
        self.temp.shift_remove(&crate::addr::mask_addr(addr));
    }

    /// Returns whether `addr` carries a permanent breakpoint.
    #[must_use]
    pub fn contains(&self, addr: u32) -> bool {
        self.perm.contains(&crate::addr::mask_addr(addr))
    }

    /// Consumes the one-shot breakpoint at `addr` if present, returning
    /// whether one was removed.
    pub fn consume_temp(&mut self, addr: u32) -> bool {
        self.temp.shift_remove(&crate::addr::mask_addr(addr))
    }

    /// Evaluates whether the instruction hook should break at `addr`,
    /// consuming any matching one-shot breakpoint in the process.
    ///
    /// Matches §4.2 step 7: the one-shot set is checked (and consumed)
    /// before the permanent set, but either one firing breaks.
    pub fn should_break(&mut self, addr: u32) -> bool {
        self.consume_temp(addr) || self.contains(addr)
    }

    /// Number of permanent breakpoints currently installed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.perm.len()
    }

    /// Whether the permanent set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.perm.is_empty()
    }
}
