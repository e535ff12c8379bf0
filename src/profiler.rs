//! Low-overhead PC-sampling profiler with an incremental dirty/epoch
//! streaming aggregator.

use std::fmt::Write as _;

use crate::addr::mask_addr;
use crate::bus::JitControl;

/// Profiler table capacity. Must be a power of two.
pub const CAPACITY: usize = 4096;

/// Every `SAMPLE_DIVISOR`-th instruction hook takes a sample.
pub const SAMPLE_DIVISOR: u32 = 64;

const EMPTY_PC: u32 = 0xffff_ffff;

/// One slot of the open-addressed profiler hash table.
#[derive(Clone, Copy, Debug)]
struct Slot {
    pc: u32,
    samples: u64,
    cycles: u64,
    entry_epoch: u32,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            pc: EMPTY_PC,
            samples: 0,
            cycles: 0,
            entry_epoch: 0,
        }
    }
}

/// PC-sampling profiler.
pub struct Profiler {
    slots: Vec<Slot>,
    dirty_idx: Vec<u32>,
    epoch: u32,
    tick: u32,
    last_tick_at_vblank: u32,
    last_valid: bool,
    last_pc: u32,
    last_cycle: u64,
    sample_divisor: u32,
    enabled: bool,
    stream_enabled: bool,
    jit: Option<Box<dyn JitControl>>,
    saved_cache_size: Option<u32>,
}

impl std::fmt::Debug for Profiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profiler")
            .field("enabled", &self.enabled)
            .field("stream_enabled", &self.stream_enabled)
            .field("tick", &self.tick)
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Profiler {
    /// Constructs a stopped profiler with no JIT wired in.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: vec![Slot::default(); CAPACITY],
            dirty_idx: Vec::new(),
            epoch: 1,
            tick: 0,
            last_tick_at_vblank: 0,
            last_valid: false,
            last_pc: 0,
            last_cycle: 0,
            sample_divisor: SAMPLE_DIVISOR,
            enabled: false,
            stream_enabled: false,
            jit: None,
            saved_cache_size: None,
        }
    }

    /// Wires in a JIT controller to be paused while profiling runs.
    #[must_use]
    pub fn with_jit(mut self, jit: Box<dyn JitControl>) -> Self {
        self.jit = Some(jit);
        self
    }

    /// Whether profiling is currently active.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Starts profiling, clearing all prior samples.
    pub fn start(&mut self, stream_enabled: bool) {
        self.reset_table();
        self.stream_enabled = stream_enabled;
        self.enabled = true;
        if let Some(jit) = &mut self.jit {
            if self.saved_cache_size.is_none() {
                self.saved_cache_size = Some(jit.cache_size());
            }
            jit.disable_and_flush();
        }
        log::debug!("profiler started (stream={stream_enabled})");
    }

    /// Stops profiling.
    pub fn stop(&mut self) {
        self.enabled = false;
        self.stream_enabled = false;
        if let (Some(jit), Some(size)) = (&mut self.jit, self.saved_cache_size.take()) {
            jit.restore_and_flush(size);
        }
        log::debug!("profiler stopped");
    }

    fn reset_table(&mut self) {
        self.slots = vec![Slot::default(); CAPACITY];
        self.dirty_idx.clear();
        self.epoch = 1;
        self.tick = 0;
        self.last_tick_at_vblank = 0;
        self.last_valid = false;
        self.last_pc = 0;
        self.last_cycle = 0;
    }

    fn find_slot(&mut self, pc24: u32, create: bool) -> Option<usize> {
        let mask = CAPACITY as u32 - 1;
        let start = pc24.wrapping_mul(0x9e37_79b1) & mask;
        for probe in 0..CAPACITY as u32 {
            let slot = ((start + probe) & mask) as usize;
            if self.slots[slot].pc == pc24 {
                return Some(slot);
            }
            if self.slots[slot].pc == EMPTY_PC {
                if !create {
                    return None;
                }
                self.slots[slot] = Slot {
                    pc: pc24,
                    ..Slot::default()
                };
                return Some(slot);
            }
        }
        None
    }

    fn mark_dirty(&mut self, slot: usize) {
        if self.slots[slot].entry_epoch == self.epoch {
            return;
        }
        self.slots[slot].entry_epoch = self.epoch;
        if self.dirty_idx.len() < CAPACITY {
            self.dirty_idx.push(slot as u32);
        }
    }

    fn account_cycles(&mut self, pc24: u32, cycles: u64) {
        if cycles == 0 {
            return;
        }
        if let Some(slot) = self.find_slot(pc24, true) {
            self.slots[slot].cycles += cycles;
            self.mark_dirty(slot);
        }
    }

    fn sample_pc(&mut self, pc24: u32) {
        if let Some(slot) = self.find_slot(pc24, true) {
            self.slots[slot].samples += 1;
            self.mark_dirty(slot);
        }
    }

    /// Feeds the profiler from the instruction hook.
    ///
    /// `now` is the emulator's monotone cycle counter; `cycle_unit` is the
    /// sub-cycle quantum to normalize it by (raw units are used directly
    /// when `cycle_unit == 0`).
    pub fn instruction_hook(&mut self, pc: u32, now: u64, cycle_unit: u64) {
        if !self.enabled {
            return;
        }
        let pc24 = mask_addr(pc);

        if self.last_valid {
            let delta_units = now.saturating_sub(self.last_cycle);
            let delta_cycles = if cycle_unit > 0 {
                delta_units / cycle_unit
            } else {
                delta_units
            };
            if delta_cycles > 0 {
                self.account_cycles(self.last_pc, delta_cycles);
            }
        }
        self.last_cycle = now;
        self.last_pc = pc24;
        self.last_valid = true;

        self.tick = self.tick.wrapping_add(1);
        if self.tick % self.sample_divisor == 0 {
            self.sample_pc(pc24);
        }
    }

    /// Feeds the profiler from a vertical-blank notification: forces a
    /// sample at `pc` if no instruction hook has advanced `tick` since the
    /// previous vblank.
    pub fn vblank(&mut self, pc: u32) {
        if !self.enabled {
            return;
        }
        if self.tick == self.last_tick_at_vblank {
            self.sample_pc(mask_addr(pc));
        }
        self.last_tick_at_vblank = self.tick;
    }

    /// Drains dirty entries into a JSON stream frame, per §4.6's wire
    /// format. Returns the number of bytes written; `0` if streaming is
    /// disabled or there is nothing dirty.
    pub fn stream_next(&mut self, out: &mut [u8]) -> usize {
        if !self.stream_enabled || self.dirty_idx.is_empty() || out.is_empty() {
            return 0;
        }

        let mut text = String::new();
        let enabled = if self.enabled { "enabled" } else { "disabled" };
        write!(text, r#"{{"stream":"profiler","enabled":"{enabled}","hits":["#).unwrap();

        let dirty = std::mem::take(&mut self.dirty_idx);
        let mut carry_over = Vec::new();
        let mut first = true;
        for slot_idx in dirty {
            let slot = &mut self.slots[slot_idx as usize];
            if slot.pc == EMPTY_PC {
                slot.entry_epoch = 0;
                continue;
            }
            if slot.samples == 0 && slot.cycles == 0 {
                slot.entry_epoch = 0;
                continue;
            }

            let mut entry = String::new();
            write!(
                entry,
                r#"{}{{"pc":"0x{:06X}","samples":{},"cycles":{}}}"#,
                if first { "" } else { "," },
                slot.pc,
                slot.samples,
                slot.cycles,
            )
            .unwrap();

            if text.len() + entry.len() + 2 >= out.len() {
                carry_over.push(slot_idx);
                continue;
            }
            text.push_str(&entry);
            first = false;
            slot.entry_epoch = 0;
        }
        self.dirty_idx = carry_over;

        if text.len() + 2 >= out.len() {
            // Nothing fit at all: leave everything dirty for next call.
            return 0;
        }
        text.push_str("]}");

        if self.dirty_idx.is_empty() {
            self.epoch = self.epoch.wrapping_add(1);
            if self.epoch == 0 {
                for slot in &mut self.slots {
                    slot.entry_epoch = 0;
                }
                self.epoch = 1;
            }
        }

        let bytes = text.as_bytes();
        out[..bytes.len()].copy_from_slice(bytes);
        bytes.len()
    }

    /// Total samples and cycles recorded across every slot, for testing
    /// against what the stream eventually reports.
    #[cfg(test)]
    fn totals(&self) -> (u64, u64) {
        self.slots
            .iter()
            .filter(|s| s.pc != EMPTY_PC)
            .fold((0, 0), |(s, c), slot| (s + slot.samples, c + slot.cycles))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_to_empty_on_second_call_with_no_new_activity() {
        let mut prof = Profiler::new();
        prof.start(true);
        for i in 0..1024u64 {
            prof.instruction_hook(0x400, i * 4, 1);
        }
        let mut buf = [0u8; 4096];
        let n = prof.stream_next(&mut buf);
        assert!(n > 0);
        assert!(String::from_utf8_lossy(&buf[..n]).contains("0x000400"));

        let n = prof.stream_next(&mut buf);
        assert_eq!(n, 0);
    }

    #[test]
    fn reports_both_sampled_pcs() {
        let mut prof = Profiler::new();
        prof.start(true);
        let mut cycle = 0u64;
        for _ in 0..1024 {
            prof.instruction_hook(0x400, cycle, 1);
            cycle += 4;
        }
        for _ in 0..512 {
            prof.instruction_hook(0x500, cycle, 1);
            cycle += 4;
        }
        let mut buf = [0u8; 8192];
        let n = prof.stream_next(&mut buf);
        let text = String::from_utf8_lossy(&buf[..n]);
        assert!(text.contains("0x000400"));
        assert!(text.contains("0x000500"));

        let (samples, cycles) = prof.totals();
        assert!(samples >= 1536 / SAMPLE_DIVISOR as u64);
        assert!(cycles > 0);
    }

    #[test]
    fn cycles_attribute_to_previous_pc_not_current() {
        let mut prof = Profiler::new();
        prof.start(false);
        prof.instruction_hook(0x100, 0, 1);
        prof.instruction_hook(0x200, 100, 1);
        // The 100-unit delta belongs to 0x100, the PC active during it.
        let slot = prof.find_slot(0x100, false).unwrap();
        assert_eq!(prof.slots[slot].cycles, 100);
        assert!(prof.find_slot(0x200, false).is_none() || prof.slots[prof.find_slot(0x200, false).unwrap()].cycles == 0);
    }

    #[test]
    fn vblank_forces_a_sample_when_idle() {
        let mut prof = Profiler::new();
        prof.start(true);
        prof.instruction_hook(0x100, 0, 1); // tick = 1
        prof.vblank(0x100); // tick unchanged since last vblank (0) -> force
        let (samples, _) = prof.totals();
        assert!(samples >= 1);
    }

    #[test]
    fn zero_valued_entries_are_skipped_on_stream() {
        let mut prof = Profiler::new();
        prof.start(true);
        // Mark a slot dirty without ever giving it samples/cycles.
        let slot = prof.find_slot(0x900, true).unwrap();
        prof.mark_dirty(slot);
        let mut buf = [0u8; 256];
        let n = prof.stream_next(&mut buf);
        assert_eq!(n, 0);
    }

    #[test]
    fn empty_frame_writes_nothing() {
        let mut prof = Profiler::new();
        prof.start(true);
        let mut buf = [0u8; 256];
        assert_eq!(prof.stream_next(&mut buf), 0);
    }

    #[test]
    fn disabled_stream_never_writes() {
        let mut prof = Profiler::new();
        prof.start(false);
        for i in 0..200u64 {
            prof.instruction_hook(0x400, i, 1);
        }
        let mut buf = [0u8; 4096];
        assert_eq!(prof.stream_next(&mut buf), 0);
    }
}
