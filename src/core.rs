//! The debug core: one owned aggregate wiring together the Execution
//! Controller, Breakpoint Table, Shadow Call Stack, Watchpoint Engine,
//! Write Protection Filter, and PC-Sampling Profiler.
//!
//! Every table used to live as process-wide statics in the reference
//! implementation; here they're fields of [`DebugCore`], a single value
//! the embedder owns. [`crate::ffi`] supplies the one top-level binding a
//! C-ABI host needs.

use crate::addr::Size;
use crate::breakpoint::Breakpoints;
use crate::bus::{Bus, JitControl, Registers};
use crate::callstack::CallStack;
use crate::cfg::Config;
use crate::disasm::{self, ControlFlow};
use crate::error::Error;
use crate::exec::{ExecState, HookAction};
use crate::profiler::Profiler;
use crate::protect::{MirrorMap, Mode, NoMirrors, Protects};
use crate::reentry::SuspendCounter;
use crate::text::TextRing;
use crate::watch::{Watchbreak, Watchpoint, Watchpoints};

/// Flat, `repr(C)` snapshot of one watchpoint slot, in the same 7-tuple
/// shape `add_watchpoint` accepts (plus its slot index), for copying
/// across the FFI boundary via `read_watchpoints`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct WatchpointRecord {
    pub index: u32,
    pub addr: u32,
    pub op_mask: u32,
    pub value: u32,
    pub old_value: u32,
    pub diff: u32,
    pub size_bits: u32,
    pub addr_mask: u32,
}

/// Flat, `repr(C)` snapshot of one protect entry, for copying across the
/// FFI boundary via `read_protects`. `mode` is `0` for block, `1` for
/// set, matching `e9kdbg_add_protect`'s encoding.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct ProtectRecord {
    pub index: u32,
    pub addr: u32,
    pub addr_mask: u32,
    pub size_bits: u32,
    pub mode: u32,
    pub value: u32,
}

/// Flat, `repr(C)` snapshot of a latched watchbreak, for copying across
/// the FFI boundary via `consume_watchbreak`. `access_kind` is `0` for a
/// read, `1` for a write; `old_valid` tells whether `old_value` is
/// meaningful.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct WatchbreakRecord {
    pub index: u32,
    pub access_addr: u32,
    pub access_kind: u32,
    pub access_size_bits: u32,
    pub value: u32,
    pub old_value: u32,
    pub old_valid: bool,
}

impl From<Watchbreak> for WatchbreakRecord {
    fn from(brk: Watchbreak) -> Self {
        Self {
            index: brk.index as u32,
            access_addr: brk.access_addr,
            access_kind: match brk.access_kind {
                crate::watch::AccessKind::Read => 0,
                crate::watch::AccessKind::Write => 1,
            },
            access_size_bits: brk.access_size.bits(),
            value: brk.value,
            old_value: brk.old_value.unwrap_or(0),
            old_valid: brk.old_value.is_some(),
        }
    }
}

/// The debug core.
pub struct DebugCore {
    config: Config,
    exec: ExecState,
    breakpoints: Breakpoints,
    callstack: CallStack,
    watchpoints: Watchpoints,
    protects: Protects,
    profiler: Profiler,
    text: TextRing,
    suspend: SuspendCounter,
    last_cycles: u64,
    vblank_cb: Option<Box<dyn FnMut()>>,
    debug_base_cb: Option<Box<dyn FnMut(&str, u32)>>,
}

impl std::fmt::Debug for DebugCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugCore")
            .field("config", &self.config)
            .field("exec", &self.exec)
            .field("breakpoints", &self.breakpoints)
            .field("callstack", &self.callstack)
            .field("protects", &self.protects)
            .field("profiler", &self.profiler)
            .field("last_cycles", &self.last_cycles)
            .finish_non_exhaustive()
    }
}

impl Default for DebugCore {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugCore {
    /// Constructs a fresh core, reading configuration from the process
    /// environment and using the default (no mirroring) memory map for
    /// the write protection filter.
    #[must_use]
    pub fn new() -> Self {
        Self::with_mirrors(Box::new(NoMirrors))
    }

    /// Constructs a core using a custom [`MirrorMap`] for the write
    /// protection filter, for targets with mirrored RAM windows.
    #[must_use]
    pub fn with_mirrors(mirrors: Box<dyn MirrorMap>) -> Self {
        Self {
            config: Config::from_env(),
            exec: ExecState::new(),
            breakpoints: Breakpoints::new(),
            callstack: CallStack::new(),
            watchpoints: Watchpoints::new(),
            protects: Protects::with_mirrors(mirrors),
            profiler: Profiler::new(),
            text: TextRing::new(),
            suspend: SuspendCounter::new(),
            last_cycles: 0,
            vblank_cb: None,
            debug_base_cb: None,
        }
    }

    /// Wires a JIT controller into the profiler.
    #[must_use]
    pub fn with_jit(mut self, jit: Box<dyn JitControl>) -> Self {
        self.profiler = Profiler::new().with_jit(jit);
        self
    }

    /// The configuration read at construction time.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    // --- Execution ---------------------------------------------------

    pub fn pause(&mut self) {
        self.exec.pause();
    }

    pub fn resume(&mut self, pc: u32) {
        let at_breakpoint = self.breakpoints.contains(pc);
        self.exec.resume(pc, at_breakpoint);
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.exec.is_paused()
    }

    pub fn step_instruction(&mut self) {
        self.exec.step_instruction();
    }

    /// Source-line stepping. Without a loaded line table (line-table
    /// resolution is the host's job, per §6), this degrades to a plain
    /// instruction step.
    pub fn step_line(&mut self) {
        self.exec.step_instruction();
    }

    pub fn step_over(&mut self, current_pc: u32) {
        self.exec.step_over(current_pc, self.callstack.depth());
    }

    pub fn step_out_optionally(&mut self, current_pc: u32) {
        self.exec
            .step_out_optionally(current_pc, self.callstack.depth());
    }

    /// Drains the frame-end flag the frame loop consumes to notify the
    /// host that a break just happened.
    pub fn take_frame_end(&mut self) -> bool {
        self.exec.take_frame_end()
    }

    // --- Instruction hook ---------------------------------------------

    /// Runs the full §4.2 instruction hook pipeline. `now_cycles` is the
    /// emulator's monotone cycle counter at this fetch.
    pub fn instruction_hook(&mut self, pc: u32, opcode: u16, now_cycles: u64) -> HookAction {
        self.profiler.instruction_hook(pc, now_cycles, 1);
        self.last_cycles = now_cycles;

        if self.exec.is_step_instr_after() {
            return self.exec.instruction_hook(pc, self.callstack.depth(), false, false);
        }

        match disasm::classify(opcode) {
            ControlFlow::Call { .. } | ControlFlow::ShortCall => self.callstack.push(pc),
            ControlFlow::Return => {
                self.callstack.pop();
                self.exec.note_return_decoded();
            }
            ControlFlow::Other => {}
        }

        let depth = self.callstack.depth();
        let breakpoint_hit = self.breakpoints.should_break(pc);
        self.exec.instruction_hook(pc, depth, false, breakpoint_hit)
    }

    /// Notifies the profiler and any registered listener of a
    /// vertical-blank event.
    pub fn vblank_notify(&mut self, pc: u32) {
        self.profiler.vblank(pc);
        if let Some(cb) = &mut self.vblank_cb {
            cb();
        }
    }

    // --- Memory access hooks (§4.7) ------------------------------------

    /// Read hook: evaluates watchpoints against a completed read.
    pub fn after_read(&mut self, addr: u32, size: Size, value: u32) {
        if self.suspend.active() {
            return;
        }
        self.watchpoints.after_read(addr, size, value);
        if self.watchpoints.has_pending() {
            self.exec.pause();
        }
    }

    /// Write-filter hook: rewrites `value` in place per installed protect
    /// entries. Always a no-op while the core is mid self-call.
    pub fn filter_write(&self, addr: u32, size: Size, old_value: u32, old_valid: bool, value: &mut u32) {
        if self.suspend.active() {
            return;
        }
        self.protects.filter_write(addr, size, old_value, old_valid, value);
    }

    /// Write-notify hook: evaluates watchpoints against a completed
    /// write (after filtering).
    pub fn after_write(&mut self, addr: u32, size: Size, value: u32, old_value: u32, old_valid: bool) {
        if self.suspend.active() {
            return;
        }
        self.watchpoints.after_write(addr, size, value, old_value, old_valid);
        if self.watchpoints.has_pending() {
            self.exec.pause();
        }
    }

    // --- Inspection -----------------------------------------------------

    /// Copies up to `out.len()` call-stack entries (innermost first),
    /// returning the count copied.
    pub fn read_callstack(&self, out: &mut [u32]) -> usize {
        self.callstack.read_into(out)
    }

    /// Copies registers in §6's fixed order: 8 data registers, 8 address
    /// registers, the status register, then the program counter.
    pub fn read_registers(&self, regs: &dyn Registers, out: &mut [u32]) -> usize {
        let mut values = [0u32; 18];
        for (i, slot) in values[..8].iter_mut().enumerate() {
            *slot = regs.data(i as u8);
        }
        for (i, slot) in values[8..16].iter_mut().enumerate() {
            *slot = regs.addr(i as u8);
        }
        values[16] = u32::from(regs.sr());
        values[17] = regs.pc();
        let n = values.len().min(out.len());
        out[..n].copy_from_slice(&values[..n]);
        n
    }

    /// Reads `out.len()` bytes starting at `addr` through `bus`, suspended
    /// so the read does not trip the core's own watchpoints.
    pub fn read_memory(&mut self, bus: &mut dyn Bus, addr: u32, out: &mut [u8]) -> usize {
        let _guard = self.suspend.acquire();
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = bus.read(addr.wrapping_add(i as u32), Size::Byte) as u8;
        }
        out.len()
    }

    /// Writes `value` truncated to `size_bytes` (1, 2, or 4) at `addr`
    /// through `bus`, bypassing watchpoints and the protect filter (a
    /// host-initiated poke, per §4.4's suspend-bypass rule).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWriteSize`] if `size_bytes` isn't 1, 2, or 4.
    pub fn write_memory(
        &mut self,
        bus: &mut dyn Bus,
        addr: u32,
        value: u32,
        size_bytes: u32,
    ) -> Result<(), Error> {
        let size = Size::from_bytes(size_bytes)?;
        let _guard = self.suspend.acquire();
        bus.write(addr, size, value);
        Ok(())
    }

    /// Quick-disassembles the opcode at `pc`, returning mnemonic text and
    /// the byte offset of the next instruction. Suspended, since it reads
    /// through `bus` for its own purposes.
    pub fn disassemble_quick(&mut self, bus: &mut dyn Bus, pc: u32) -> (String, u32) {
        let _guard = self.suspend.acquire();
        let opcode = bus.read(pc, Size::Word) as u16;
        disasm::quick(opcode)
    }

    /// The profiler's monotone cycle counter, in emulator-normalized
    /// cycles (not raw time-base units), as of the most recent
    /// instruction hook.
    #[must_use]
    pub fn read_cycle_count(&self) -> u64 {
        self.last_cycles
    }

    // --- Breakpoints ----------------------------------------------------

    pub fn add_breakpoint(&mut self, addr: u32) -> bool {
        self.breakpoints.add(addr)
    }

    pub fn remove_breakpoint(&mut self, addr: u32) {
        self.breakpoints.remove(addr);
    }

    pub fn add_temp_breakpoint(&mut self, addr: u32) -> bool {
        self.breakpoints.add_temp(addr)
    }

    pub fn remove_temp_breakpoint(&mut self, addr: u32) {
        self.breakpoints.remove_temp(addr);
    }

    // --- Watchpoints ----------------------------------------------------

    pub fn reset_watchpoints(&mut self) {
        self.watchpoints.reset();
    }

    /// Installs a watchpoint from the host's flat 7-tuple `add` call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSize`] for a malformed `size_bits`.
    pub fn add_watchpoint(
        &mut self,
        addr: u32,
        op_mask: u32,
        value: u32,
        old_value: u32,
        diff: u32,
        size_bits: u32,
        addr_mask: u32,
    ) -> Result<Option<usize>, Error> {
        let wp = Watchpoint::from_op_mask(addr, op_mask, value, old_value, diff, size_bits, addr_mask)?;
        Ok(self.watchpoints.add(wp))
    }

    pub fn remove_watchpoint(&mut self, index: usize) {
        self.watchpoints.remove(index);
    }

    /// Copies up to `out.len()` installed watchpoints into `out`, in slot
    /// order, returning the count copied.
    pub fn read_watchpoints(&self, out: &mut [WatchpointRecord]) -> usize {
        let snaps = self.watchpoints.snapshot(out.len());
        for (slot, (index, wp)) in out.iter_mut().zip(snaps.iter()) {
            *slot = WatchpointRecord {
                index: *index as u32,
                addr: wp.addr,
                op_mask: wp.op_mask(),
                value: wp.value,
                old_value: wp.old_value,
                diff: wp.diff,
                size_bits: wp.size_bits(),
                addr_mask: wp.addr_mask,
            };
        }
        snaps.len()
    }

    #[must_use]
    pub fn watchpoints_enabled_mask(&self) -> u64 {
        self.watchpoints.enabled_mask()
    }

    pub fn set_watchpoints_enabled_mask(&mut self, mask: u64) {
        self.watchpoints.set_enabled_mask(mask);
    }

    pub fn consume_watchbreak(&mut self) -> Option<Watchbreak> {
        self.watchpoints.consume_watchbreak()
    }

    // --- Write protection -----------------------------------------------

    pub fn reset_protects(&mut self) {
        self.protects.reset();
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidSize`] for a malformed `size_bits`.
    pub fn add_protect(
        &mut self,
        addr: u32,
        size_bits: u32,
        mode: Mode,
        value: u32,
    ) -> Result<Option<usize>, Error> {
        self.protects.add(addr, size_bits, mode, value)
    }

    pub fn remove_protect(&mut self, index: usize) {
        self.protects.remove(index);
    }

    /// Copies up to `out.len()` installed protect entries into `out`, in
    /// slot order, returning the count copied.
    pub fn read_protects(&self, out: &mut [ProtectRecord]) -> usize {
        let snaps = self.protects.snapshot(out.len());
        for (slot, (index, entry)) in out.iter_mut().zip(snaps.iter()) {
            *slot = ProtectRecord {
                index: *index as u32,
                addr: entry.addr(),
                addr_mask: entry.addr_mask(),
                size_bits: entry.size().bits(),
                mode: match entry.mode() {
                    Mode::Block => 0,
                    Mode::Set => 1,
                },
                value: entry.value(),
            };
        }
        snaps.len()
    }

    #[must_use]
    pub fn protects_enabled_mask(&self) -> u64 {
        self.protects.enabled_mask()
    }

    pub fn set_protects_enabled_mask(&mut self, mask: u64) {
        self.protects.set_enabled_mask(mask);
    }

    // --- Profiler ---------------------------------------------------------

    pub fn start_profiler(&mut self, stream_enabled: bool) {
        self.profiler.start(stream_enabled);
    }

    pub fn stop_profiler(&mut self) {
        self.profiler.stop();
    }

    #[must_use]
    pub fn is_profiling(&self) -> bool {
        self.profiler.is_enabled()
    }

    pub fn stream_profiler(&mut self, out: &mut [u8]) -> usize {
        self.profiler.stream_next(out)
    }

    // --- Text -------------------------------------------------------------

    /// Appends target-emitted text to the output ring (the emulator's
    /// side of the text port).
    pub fn push_text(&mut self, bytes: &[u8]) {
        self.text.push(bytes);
    }

    /// Drains up to `out.len()` bytes of target-emitted text.
    pub fn text_read(&mut self, out: &mut [u8]) -> usize {
        self.text.drain_into(out)
    }

    // --- Callbacks ----------------------------------------------------

    pub fn set_vblank_callback(&mut self, cb: Box<dyn FnMut()>) {
        self.vblank_cb = Some(cb);
    }

    pub fn set_debug_base_callback(&mut self, cb: Box<dyn FnMut(&str, u32)>) {
        self.debug_base_cb = Some(cb);
    }

    /// Invokes the registered debug-base callback, if any. Called by the
    /// host's own symbol loader (ELF section resolution is out of scope
    /// for this core) once it has resolved a section's load address.
    pub fn notify_debug_base(&mut self, section: &str, base: u32) {
        if let Some(cb) = &mut self.debug_base_cb {
            cb(section, base);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestBus {
        mem: Vec<u8>,
    }

    impl TestBus {
        fn new() -> Self {
            Self { mem: vec![0; 0x10_0000] }
        }
    }

    impl Bus for TestBus {
        fn read(&mut self, addr: u32, size: Size) -> u32 {
            let addr = addr as usize;
            match size {
                Size::Byte => u32::from(self.mem[addr]),
                Size::Word => u32::from(self.mem[addr]) << 8 | u32::from(self.mem[addr + 1]),
                Size::Long => {
                    (u32::from(self.mem[addr]) << 24)
                        | (u32::from(self.mem[addr + 1]) << 16)
                        | (u32::from(self.mem[addr + 2]) << 8)
                        | u32::from(self.mem[addr + 3])
                }
            }
        }

        fn write(&mut self, addr: u32, size: Size, value: u32) {
            let addr = addr as usize;
            match size {
                Size::Byte => self.mem[addr] = value as u8,
                Size::Word => {
                    self.mem[addr] = (value >> 8) as u8;
                    self.mem[addr + 1] = value as u8;
                }
                Size::Long => {
                    self.mem[addr] = (value >> 24) as u8;
                    self.mem[addr + 1] = (value >> 16) as u8;
                    self.mem[addr + 2] = (value >> 8) as u8;
                    self.mem[addr + 3] = value as u8;
                }
            }
        }
    }

    struct TestRegs {
        d: [u32; 8],
        a: [u32; 8],
        sr: u16,
        pc: u32,
    }

    impl Registers for TestRegs {
        fn pc(&self) -> u32 {
            self.pc
        }
        fn set_pc(&mut self, pc: u32) {
            self.pc = pc;
        }
        fn data(&self, n: u8) -> u32 {
            self.d[n as usize]
        }
        fn addr(&self, n: u8) -> u32 {
            self.a[n as usize]
        }
        fn sr(&self) -> u16 {
            self.sr
        }
        fn cycles(&self) -> u64 {
            0
        }
    }

    #[test]
    fn breakpoint_hit_pauses_the_controller() {
        let mut core = DebugCore::new();
        core.add_breakpoint(0x1000);
        let action = core.instruction_hook(0x1000, 0x4e71, 0);
        assert_eq!(action, HookAction::Break);
        assert!(core.is_paused());
    }

    #[test]
    fn resume_at_breakpoint_skips_once() {
        let mut core = DebugCore::new();
        core.add_breakpoint(0x1000);
        core.instruction_hook(0x1000, 0x4e71, 0);
        core.resume(0x1000);
        assert!(!core.is_paused());
        let action = core.instruction_hook(0x1000, 0x4e71, 4);
        assert_eq!(action, HookAction::Proceed);
    }

    #[test]
    fn call_and_return_opcodes_drive_the_shadow_stack() {
        let mut core = DebugCore::new();
        core.instruction_hook(0x1000, 0x4eb8, 0); // jsr $....w
        let mut out = [0u32; 4];
        assert_eq!(core.read_callstack(&mut out), 1);
        assert_eq!(out[0], 0x1000);

        core.instruction_hook(0x2000, 0x4e75, 4); // rts
        assert_eq!(core.read_callstack(&mut out), 0);
    }

    #[test]
    fn step_instruction_requires_two_hooks_to_break() {
        let mut core = DebugCore::new();
        core.step_instruction();
        let action = core.instruction_hook(0x1000, 0x4e71, 0);
        assert_eq!(action, HookAction::Proceed);
        let action = core.instruction_hook(0x1002, 0x4e71, 4);
        assert_eq!(action, HookAction::Break);
    }

    #[test]
    fn watchpoint_match_pauses_the_controller() {
        let mut core = DebugCore::new();
        core.add_watchpoint(0x2000, crate::watch::OP_WRITE | crate::watch::OP_VALUE_EQ, 0x42, 0, 0, 8, 0)
            .unwrap();
        core.after_write(0x2000, Size::Byte, 0x42, 0, false);
        assert!(core.is_paused());
        assert!(core.consume_watchbreak().is_some());
    }

    #[test]
    fn protect_block_restores_prior_value_through_the_hook() {
        let mut core = DebugCore::new();
        core.add_protect(0x3000, 8, Mode::Block, 0).unwrap();
        let mut value = 0xffu32;
        core.filter_write(0x3000, Size::Byte, 0x11, true, &mut value);
        assert_eq!(value, 0x11);
    }

    #[test]
    fn suspend_guard_bypasses_filter_and_watchpoints() {
        let mut core = DebugCore::new();
        core.add_protect(0x3000, 8, Mode::Block, 0).unwrap();
        core.add_watchpoint(0x3000, crate::watch::OP_WRITE, 0, 0, 0, 0, 0)
            .unwrap();

        let mut bus = TestBus::new();
        // write_memory suspends internally; the raw bus write underneath
        // never routes through filter_write/after_write in this harness,
        // so this just exercises that the call succeeds without panicking
        // and does not itself latch a watchbreak.
        core.write_memory(&mut bus, 0x3000, 0x99, 1).unwrap();
        assert!(!core.is_paused());
    }

    #[test]
    fn read_watchpoints_copies_into_the_caller_buffer() {
        let mut core = DebugCore::new();
        core.add_watchpoint(0x3000, crate::watch::OP_WRITE | crate::watch::OP_VALUE_EQ, 0x42, 0, 0, 8, 0)
            .unwrap();
        let mut out = [WatchpointRecord::default(); 4];
        assert_eq!(core.read_watchpoints(&mut out), 1);
        assert_eq!(out[0].addr, 0x3000);
        assert_eq!(out[0].op_mask, crate::watch::OP_WRITE | crate::watch::OP_VALUE_EQ);
        assert_eq!(out[0].value, 0x42);
        assert_eq!(out[0].size_bits, 8);
    }

    #[test]
    fn read_watchpoints_respects_the_buffer_length() {
        let mut core = DebugCore::new();
        core.add_watchpoint(0x3000, crate::watch::OP_WRITE, 0, 0, 0, 0, 0).unwrap();
        core.add_watchpoint(0x4000, crate::watch::OP_WRITE, 0, 0, 0, 0, 0).unwrap();
        let mut out = [WatchpointRecord::default(); 1];
        assert_eq!(core.read_watchpoints(&mut out), 1);
    }

    #[test]
    fn read_protects_copies_into_the_caller_buffer() {
        let mut core = DebugCore::new();
        core.add_protect(0x5000, 16, Mode::Set, 0xbeef).unwrap();
        let mut out = [ProtectRecord::default(); 4];
        assert_eq!(core.read_protects(&mut out), 1);
        assert_eq!(out[0].addr, 0x5000);
        assert_eq!(out[0].mode, 1);
        assert_eq!(out[0].value, 0xbeef);
        assert_eq!(out[0].size_bits, 16);
    }

    #[test]
    fn consume_watchbreak_reports_access_kind_and_old_value() {
        let mut core = DebugCore::new();
        core.add_watchpoint(0x3000, crate::watch::OP_WRITE, 0, 0, 0, 0, 0)
            .unwrap();
        core.after_write(0x3000, Size::Byte, 0x11, 0x22, true);
        let brk = core.consume_watchbreak().unwrap();
        let record = WatchbreakRecord::from(brk);
        assert_eq!(record.access_addr, 0x3000);
        assert_eq!(record.access_kind, 1);
        assert!(record.old_valid);
        assert_eq!(record.old_value, 0x22);
    }

    #[test]
    fn read_memory_reads_through_the_bus() {
        let mut core = DebugCore::new();
        let mut bus = TestBus::new();
        bus.mem[0x100] = 0xde;
        bus.mem[0x101] = 0xad;
        let mut out = [0u8; 2];
        assert_eq!(core.read_memory(&mut bus, 0x100, &mut out), 2);
        assert_eq!(out, [0xde, 0xad]);
    }

    #[test]
    fn read_registers_uses_the_fixed_order() {
        let core = DebugCore::new();
        let regs = TestRegs {
            d: [1, 2, 3, 4, 5, 6, 7, 8],
            a: [10, 20, 30, 40, 50, 60, 70, 80],
            sr: 0x2700,
            pc: 0x4000,
        };
        let mut out = [0u32; 18];
        assert_eq!(core.read_registers(&regs, &mut out), 18);
        assert_eq!(out[0], 1);
        assert_eq!(out[8], 10);
        assert_eq!(out[16], 0x2700);
        assert_eq!(out[17], 0x4000);
    }

    #[test]
    fn disassemble_quick_reads_and_decodes() {
        let mut core = DebugCore::new();
        let mut bus = TestBus::new();
        bus.mem[0x200] = 0x4e;
        bus.mem[0x201] = 0x75; // rts
        let (text, len) = core.disassemble_quick(&mut bus, 0x200);
        assert_eq!(text, "rts");
        assert_eq!(len, 2);
    }

    #[test]
    fn vblank_callback_fires() {
        use std::cell::Cell;
        use std::rc::Rc;
        let mut core = DebugCore::new();
        let seen = Rc::new(Cell::new(false));
        let seen2 = Rc::clone(&seen);
        core.set_vblank_callback(Box::new(move || seen2.set(true)));
        core.vblank_notify(0x1000);
        assert!(seen.get());
    }

    #[test]
    fn text_round_trips() {
        let mut core = DebugCore::new();
        core.push_text(b"hello");
        let mut out = [0u8; 5];
        assert_eq!(core.text_read(&mut out), 5);
        assert_eq!(&out, b"hello");
    }
}
