//! Predicate-matched memory-access watchpoints.

use crate::addr::{mask_addr, Size};

/// Number of watchpoint slots.
pub const COUNT: usize = 64;

/// Kind of memory access that can trigger a watchpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessKind {
    /// A read from the bus.
    Read,
    /// A write to the bus.
    Write,
}

/// One enabled matching clause of a [`Watchpoint`].
///
/// Modeled as a bitset (`op_mask` in the source) folded over an array of
/// clauses rather than a single opaque integer, per the distilled spec's
/// design note on polymorphic match predicates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Clause {
    /// Matches address against `addr_mask` rather than exact equality.
    AddrCompareMask,
    /// Matches only accesses of the configured `size`.
    AccessSize,
    /// Matches when the (truncated) access value equals `value`.
    ValueEq,
    /// Matches when the (truncated, valid) old value equals `old_value`.
    OldValueEq,
    /// Matches when the old value, truncated, differs from `diff`.
    ///
    /// Named `VALUE_NEQ_OLD` in the source despite comparing the old
    /// value against a constant `diff` operand, not against the new
    /// value. Kept under the source's semantics as `OldValueNeqDiff`; see
    /// [`ValueNeqOld`](Clause::ValueNeqOld) for the name-suggested
    /// reading, offered as a second, independent clause instead of
    /// silently picking one (§ DESIGN.md).
    OldValueNeqDiff,
    /// New value differs from the access's old value. The reading the
    /// source's clause name suggests, but does not implement; offered
    /// here as its own clause so callers who want it can ask for it
    /// explicitly.
    ValueNeqOld,
}

/// Bit in a host-supplied `op_mask` selecting reaction to reads.
pub const OP_READ: u32 = 1 << 0;
/// Bit selecting reaction to writes.
pub const OP_WRITE: u32 = 1 << 1;
/// Bit enabling [`Clause::AddrCompareMask`].
pub const OP_ADDR_COMPARE_MASK: u32 = 1 << 2;
/// Bit enabling [`Clause::AccessSize`].
pub const OP_ACCESS_SIZE: u32 = 1 << 3;
/// Bit enabling [`Clause::ValueEq`].
pub const OP_VALUE_EQ: u32 = 1 << 4;
/// Bit enabling [`Clause::OldValueEq`].
pub const OP_OLD_VALUE_EQ: u32 = 1 << 5;
/// Bit enabling [`Clause::OldValueNeqDiff`].
pub const OP_OLD_VALUE_NEQ_DIFF: u32 = 1 << 6;
/// Bit enabling [`Clause::ValueNeqOld`].
pub const OP_VALUE_NEQ_OLD: u32 = 1 << 7;

/// A single watchpoint slot.
#[derive(Clone, Debug, Default)]
pub struct Watchpoint {
    /// Base address to match.
    pub addr: u32,
    /// Whether this slot reacts to reads.
    pub on_read: bool,
    /// Whether this slot reacts to writes.
    pub on_write: bool,
    /// Active matching clauses.
    pub clauses: Vec<Clause>,
    /// Operand for [`Clause::ValueEq`].
    pub value: u32,
    /// Operand for [`Clause::OldValueEq`].
    pub old_value: u32,
    /// Operand for [`Clause::OldValueNeqDiff`] / [`Clause::ValueNeqOld`].
    pub diff: u32,
    /// Operand for [`Clause::AccessSize`].
    pub size: Option<Size>,
    /// Operand for [`Clause::AddrCompareMask`].
    pub addr_mask: u32,
}

impl Watchpoint {
    /// Builds a watchpoint from the host's flat 7-tuple `add` call (§6):
    /// `op_mask` selects both the reacted-to access kinds and the active
    /// clauses, the remaining arguments are the clause operands.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidSize`] if `size_bits` is supplied
    /// (non-zero) but not one of 8/16/32.
    pub fn from_op_mask(
        addr: u32,
        op_mask: u32,
        value: u32,
        old_value: u32,
        diff: u32,
        size_bits: u32,
        addr_mask: u32,
    ) -> Result<Self, crate::Error> {
        let size = if size_bits == 0 {
            None
        } else {
            Some(crate::addr::Size::from_bits(size_bits)?)
        };

        let mut clauses = Vec::new();
        let mut push = |bit: u32, clause: Clause| {
            if op_mask & bit != 0 {
                clauses.push(clause);
            }
        };
        push(OP_ADDR_COMPARE_MASK, Clause::AddrCompareMask);
        push(OP_ACCESS_SIZE, Clause::AccessSize);
        push(OP_VALUE_EQ, Clause::ValueEq);
        push(OP_OLD_VALUE_EQ, Clause::OldValueEq);
        push(OP_OLD_VALUE_NEQ_DIFF, Clause::OldValueNeqDiff);
        push(OP_VALUE_NEQ_OLD, Clause::ValueNeqOld);

        Ok(Self {
            addr: mask_addr(addr),
            on_read: op_mask & OP_READ != 0,
            on_write: op_mask & OP_WRITE != 0,
            clauses,
            value,
            old_value,
            diff,
            size,
            addr_mask,
        })
    }

    /// Reconstructs the host-facing `op_mask` bitset, the inverse of
    /// [`Watchpoint::from_op_mask`]. Used by the `read_all` export so a
    /// host reading a snapshot back gets the same encoding it used to
    /// install the watchpoint.
    #[must_use]
    pub fn op_mask(&self) -> u32 {
        let mut mask = 0;
        if self.on_read {
            mask |= OP_READ;
        }
        if self.on_write {
            mask |= OP_WRITE;
        }
        for &clause in &self.clauses {
            mask |= match clause {
                Clause::AddrCompareMask => OP_ADDR_COMPARE_MASK,
                Clause::AccessSize => OP_ACCESS_SIZE,
                Clause::ValueEq => OP_VALUE_EQ,
                Clause::OldValueEq => OP_OLD_VALUE_EQ,
                Clause::OldValueNeqDiff => OP_OLD_VALUE_NEQ_DIFF,
                Clause::ValueNeqOld => OP_VALUE_NEQ_OLD,
            };
        }
        mask
    }

    /// The configured access size in bits, or `0` if the size clause is
    /// unset (mirrors the host's `size_bits == 0` sentinel).
    #[must_use]
    pub fn size_bits(&self) -> u32 {
        self.size.map_or(0, Size::bits)
    }

    fn has(&self, clause: Clause) -> bool {
        self.clauses.contains(&clause)
    }

    /// Evaluates the matching predicate from §4.3 against one access.
    fn matches(
        &self,
        addr: u32,
        kind: AccessKind,
        size: Size,
        value: u32,
        old_value: u32,
        old_valid: bool,
    ) -> bool {
        match kind {
            AccessKind::Read if !self.on_read => return false,
            AccessKind::Write if !self.on_write => return false,
            _ => {}
        }

        if self.has(Clause::AddrCompareMask) {
            if (addr & self.addr_mask) != (self.addr & self.addr_mask) {
                return false;
            }
        } else if addr != self.addr {
            return false;
        }

        if self.has(Clause::AccessSize) && self.size != Some(size) {
            return false;
        }

        let value = size.truncate(value);
        let old_value = size.truncate(old_value);

        if self.has(Clause::ValueEq) && value != size.truncate(self.value) {
            return false;
        }
        if self.has(Clause::OldValueEq) {
            if !old_valid || old_value != size.truncate(self.old_value) {
                return false;
            }
        }
        if self.has(Clause::OldValueNeqDiff) {
            if !old_valid || old_value == size.truncate(self.diff) {
                return false;
            }
        }
        if self.has(Clause::ValueNeqOld) {
            if !old_valid || value == old_value {
                return false;
            }
        }
        true
    }
}

/// A latched record describing the access that tripped a watchpoint.
#[derive(Clone, Debug)]
pub struct Watchbreak {
    /// Index of the watchpoint that fired.
    pub index: usize,
    /// Snapshot of the watchpoint at the time it fired.
    pub watchpoint: Watchpoint,
    /// Address of the triggering access.
    pub access_addr: u32,
    /// Kind of the triggering access.
    pub access_kind: AccessKind,
    /// Width of the triggering access.
    pub access_size: Size,
    /// Value read or written, truncated to `access_size`.
    pub value: u32,
    /// Prior value at the address, if known.
    pub old_value: Option<u32>,
}

/// Predicate-matched memory-access watchpoints.
///
/// At most one [`Watchbreak`] is latched at a time; later matches are
/// dropped until the host drains the current one.
#[derive(Debug, Default)]
pub struct Watchpoints {
    slots: Vec<Option<Watchpoint>>,
    enabled_mask: u64,
    pending: Option<Watchbreak>,
}

impl Watchpoints {
    /// Constructs an empty, fully disabled watchpoint table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: vec![None; COUNT],
            enabled_mask: 0,
            pending: None,
        }
    }

    /// Clears all watchpoints and the pending watchbreak.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Installs `wp`, returning its slot index, or `None` if every slot
    /// is occupied. Newly added watchpoints are enabled.
    pub fn add(&mut self, wp: Watchpoint) -> Option<usize> {
        let index = self.slots.iter().position(Option::is_none)?;
        self.slots[index] = Some(wp);
        self.enabled_mask |= 1 << index;
        Some(index)
    }

    /// Removes the watchpoint at `index`. A silent no-op if out of range
    /// or already empty.
    pub fn remove(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = None;
            self.enabled_mask &= !(1 << index);
        }
    }

    /// Returns up to `cap` `(index, watchpoint)` pairs for installed
    /// slots, in slot order.
    #[must_use]
    pub fn snapshot(&self, cap: usize) -> Vec<(usize, Watchpoint)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, wp)| wp.clone().map(|wp| (i, wp)))
            .take(cap)
            .collect()
    }

    /// Current enabled-slot bitmask.
    #[must_use]
    pub fn enabled_mask(&self) -> u64 {
        self.enabled_mask
    }

    /// Overwrites the enabled-slot bitmask directly.
    ///
    /// Bits referring to empty slots are tolerated; such a slot simply
    /// never matches.
    pub fn set_enabled_mask(&mut self, mask: u64) {
        self.enabled_mask = mask;
    }

    /// Evaluates all enabled slots against a read access.
    ///
    /// Grounded in `geo_debug_watchpointRead`: for a read, the "old value"
    /// is the value itself and is always valid.
    pub fn after_read(&mut self, addr: u32, size: Size, value: u32) {
        self.check(mask_addr(addr), AccessKind::Read, size, value, value, true);
    }

    /// Evaluates all enabled slots against a write access.
    pub fn after_write(
        &mut self,
        addr: u32,
        size: Size,
        value: u32,
        old_value: u32,
        old_valid: bool,
    ) {
        self.check(
            mask_addr(addr),
            AccessKind::Write,
            size,
            value,
            old_value,
            old_valid,
        );
    }

    fn check(
        &mut self,
        addr: u32,
        kind: AccessKind,
        size: Size,
        value: u32,
        old_value: u32,
        old_valid: bool,
    ) {
        if self.pending.is_some() || self.enabled_mask == 0 {
            return;
        }
        for index in 0..COUNT {
            if self.enabled_mask & (1 << index) == 0 {
                continue;
            }
            let Some(wp) = &self.slots[index] else {
                continue;
            };
            if wp.matches(addr, kind, size, value, old_value, old_valid) {
                log::debug!("watchpoint {index} matched at {addr:#08x}");
                self.pending = Some(Watchbreak {
                    index,
                    watchpoint: wp.clone(),
                    access_addr: addr,
                    access_kind: kind,
                    access_size: size,
                    value: size.truncate(value),
                    old_value: old_valid.then(|| size.truncate(old_value)),
                });
                return;
            }
        }
    }

    /// Returns whether a watchbreak is currently latched.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drains and returns the latched watchbreak, if any. Idempotent: a
    /// second call immediately after returns `None`.
    pub fn consume_watchbreak(&mut self) -> Option<Watchbreak> {
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_eq_write(addr: u32, size: Size, value: u32) -> Watchpoint {
        Watchpoint {
            addr,
            on_write: true,
            clauses: vec![Clause::ValueEq, Clause::AccessSize],
            value,
            size: Some(size),
            ..Watchpoint::default()
        }
    }

    #[test]
    fn write_with_matching_value_latches_once() {
        let mut wps = Watchpoints::new();
        let idx = wps
            .add(value_eq_write(0x10_0004, Size::Word, 0x1234))
            .unwrap();
        wps.after_write(0x10_0004, Size::Word, 0x1234, 0, false);
        assert!(wps.has_pending());
        let brk = wps.consume_watchbreak().unwrap();
        assert_eq!(brk.index, idx);
        assert_eq!(brk.access_kind, AccessKind::Write);
        assert_eq!(brk.value, 0x1234);
        assert!(wps.consume_watchbreak().is_none(), "idempotent drain");
    }

    #[test]
    fn size_mismatch_does_not_latch() {
        let mut wps = Watchpoints::new();
        wps.add(value_eq_write(0x10_0004, Size::Word, 0x1234));
        wps.after_write(0x10_0004, Size::Byte, 0x12, 0, false);
        assert!(!wps.has_pending());
    }

    #[test]
    fn disabled_slot_never_matches() {
        let mut wps = Watchpoints::new();
        let idx = wps
            .add(value_eq_write(0x10_0004, Size::Word, 0x1234))
            .unwrap();
        wps.set_enabled_mask(wps.enabled_mask() & !(1 << idx));
        wps.after_write(0x10_0004, Size::Word, 0x1234, 0, false);
        assert!(!wps.has_pending());
    }

    #[test]
    fn no_predicate_satisfied_means_no_latch() {
        let mut wps = Watchpoints::new();
        wps.add(value_eq_write(0x10_0004, Size::Word, 0x1234));
        wps.after_write(0x20_0000, Size::Word, 0x1234, 0, false);
        assert!(!wps.has_pending());
    }

    #[test]
    fn second_match_is_dropped_until_drained() {
        let mut wps = Watchpoints::new();
        wps.add(value_eq_write(0x10_0004, Size::Word, 0x1234));
        wps.after_write(0x10_0004, Size::Word, 0x1234, 0, false);
        // A second distinct watchpoint also matching must not replace it.
        wps.add(value_eq_write(0x20_0000, Size::Word, 0x5678));
        wps.after_write(0x20_0000, Size::Word, 0x5678, 0, false);
        let brk = wps.consume_watchbreak().unwrap();
        assert_eq!(brk.access_addr, 0x10_0004);
    }

    #[test]
    fn add_returns_none_when_full() {
        let mut wps = Watchpoints::new();
        for i in 0..COUNT as u32 {
            assert!(wps.add(value_eq_write(i, Size::Byte, 0)).is_some());
        }
        assert!(wps.add(value_eq_write(0, Size::Byte, 0)).is_none());
    }

    #[test]
    fn remove_out_of_range_is_noop() {
        let mut wps = Watchpoints::new();
        wps.remove(9999);
    }

    #[test]
    fn addr_compare_mask_uses_mask_not_equality() {
        let mut wps = Watchpoints::new();
        wps.add(Watchpoint {
            addr: 0x10_0000,
            on_write: true,
            clauses: vec![Clause::AddrCompareMask],
            addr_mask: 0x00_ff00,
            ..Watchpoint::default()
        });
        wps.after_write(0x10_0034, Size::Byte, 1, 0, false);
        assert!(wps.has_pending());
    }

    #[test]
    fn old_value_neq_diff_matches_source_semantics() {
        // The clause is checked against the diff operand, not the new
        // value, as the source actually implements it.
        let mut wps = Watchpoints::new();
        wps.add(Watchpoint {
            addr: 0x1000,
            on_write: true,
            clauses: vec![Clause::OldValueNeqDiff],
            diff: 0xff,
            ..Watchpoint::default()
        });
        // old_value (0x01) != diff (0xff) => matches regardless of new value.
        wps.after_write(0x1000, Size::Byte, 0x01, 0x01, true);
        assert!(wps.has_pending());
    }

    #[test]
    fn from_op_mask_decodes_kind_and_clause_bits() {
        let wp = Watchpoint::from_op_mask(
            0x10_0000,
            OP_WRITE | OP_VALUE_EQ | OP_ACCESS_SIZE,
            0x1234,
            0,
            0,
            16,
            0,
        )
        .unwrap();
        assert!(!wp.on_read);
        assert!(wp.on_write);
        assert!(wp.clauses.contains(&Clause::ValueEq));
        assert!(wp.clauses.contains(&Clause::AccessSize));
        assert_eq!(wp.size, Some(Size::Word));
    }

    #[test]
    fn from_op_mask_rejects_invalid_size() {
        assert!(Watchpoint::from_op_mask(0, OP_ACCESS_SIZE, 0, 0, 0, 24, 0).is_err());
    }

    #[test]
    fn op_mask_round_trips_through_from_op_mask() {
        let original = OP_WRITE | OP_VALUE_EQ | OP_ACCESS_SIZE | OP_OLD_VALUE_NEQ_DIFF;
        let wp = Watchpoint::from_op_mask(0x1000, original, 1, 2, 3, 16, 0xff).unwrap();
        assert_eq!(wp.op_mask(), original);
        assert_eq!(wp.size_bits(), 16);
    }

    #[test]
    fn size_bits_is_zero_when_unset() {
        let wp = Watchpoint::from_op_mask(0x1000, OP_WRITE, 0, 0, 0, 0, 0).unwrap();
        assert_eq!(wp.size_bits(), 0);
    }

    #[test]
    fn value_neq_old_is_a_distinct_clause() {
        let mut wps = Watchpoints::new();
        wps.add(Watchpoint {
            addr: 0x1000,
            on_write: true,
            clauses: vec![Clause::ValueNeqOld],
            ..Watchpoint::default()
        });
        wps.after_write(0x1000, Size::Byte, 0x02, 0x01, true);
        assert!(wps.has_pending());
    }
}
