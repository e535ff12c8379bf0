//! C-ABI export surface (§6), forwarding to one process-wide
//! [`DebugCore`] held behind a `thread_local!`.
//!
//! This is the thin layer the redesign note in the distilled spec calls
//! for: "the C-ABI export surface then becomes thin stateless functions
//! that forward to the aggregate via a single top-level binding." Every
//! function here is a byte-copying wrapper; the actual logic lives in
//! [`crate::core::DebugCore`].
//!
//! Safety: every exported function dereferences raw pointers supplied by
//! the C caller. Each one documents the preconditions the caller must
//! uphold; none of them are checked at runtime.

use std::cell::RefCell;
use std::os::raw::{c_char, c_int, c_void};
use std::slice;

use crate::addr::Size;
use crate::bus::{Bus, Registers};
use crate::core::{DebugCore, ProtectRecord, WatchbreakRecord, WatchpointRecord};
use crate::exec::HookAction;
use crate::protect::Mode;

thread_local! {
    static CORE: RefCell<DebugCore> = RefCell::new(DebugCore::new());
}

fn with_core<R>(f: impl FnOnce(&mut DebugCore) -> R) -> R {
    CORE.with(|cell| f(&mut cell.borrow_mut()))
}

/// Resets the thread-local core to a fresh instance. Exposed for hosts
/// that need to tear down and reinitialize between emulated sessions;
/// not part of the upstream contract but harmless plumbing for tests
/// driving the FFI layer directly.
#[no_mangle]
pub extern "C" fn e9kdbg_reset_core() {
    CORE.with(|cell| *cell.borrow_mut() = DebugCore::new());
}

#[no_mangle]
pub extern "C" fn e9kdbg_pause() {
    with_core(DebugCore::pause);
}

#[no_mangle]
pub extern "C" fn e9kdbg_resume(pc: u32) {
    with_core(|core| core.resume(pc));
}

#[no_mangle]
pub extern "C" fn e9kdbg_is_paused() -> bool {
    with_core(DebugCore::is_paused)
}

#[no_mangle]
pub extern "C" fn e9kdbg_step_instruction() {
    with_core(DebugCore::step_instruction);
}

#[no_mangle]
pub extern "C" fn e9kdbg_step_line() {
    with_core(DebugCore::step_line);
}

#[no_mangle]
pub extern "C" fn e9kdbg_step_over(current_pc: u32) {
    with_core(|core| core.step_over(current_pc));
}

/// # Safety
///
/// `out` must point to at least `cap` valid `u32` slots.
#[no_mangle]
pub unsafe extern "C" fn e9kdbg_read_callstack(out: *mut u32, cap: usize) -> usize {
    let out = slice::from_raw_parts_mut(out, cap);
    with_core(|core| core.read_callstack(out))
}

// --- Hook entry points (§4.2, §4.7) -------------------------------------
//
// These are the functions the emulator itself drives: one before every
// fetched opcode, three around every bus access. Everything above and
// below this section is control/inspection the host calls on its own
// schedule.

/// Instruction hook: call once before every fetched opcode. Returns
/// whether the emulator should end its timeslice before executing it.
#[no_mangle]
pub extern "C" fn e9kdbg_instruction_hook(pc: u32, opcode: u16, now_cycles: u64) -> bool {
    with_core(|core| core.instruction_hook(pc, opcode, now_cycles) == HookAction::Break)
}

/// Vertical-blank notification, forwarded to the profiler and any
/// registered vblank callback.
#[no_mangle]
pub extern "C" fn e9kdbg_vblank_notify(pc: u32) {
    with_core(|core| core.vblank_notify(pc));
}

/// Read hook: call after a completed bus read. `size_bits` is 8, 16, or
/// 32; an invalid width is silently ignored.
#[no_mangle]
pub extern "C" fn e9kdbg_after_read(addr: u32, size_bits: u32, value: u32) {
    let Ok(size) = Size::from_bits(size_bits) else {
        return;
    };
    with_core(|core| core.after_read(addr, size, value));
}

/// Write-filter hook: call before a write commits, to let installed
/// protect entries rewrite `*value` in place. A no-op for an invalid
/// `size_bits`.
///
/// # Safety
///
/// `value` must point to a valid, writable `u32`.
#[no_mangle]
pub unsafe extern "C" fn e9kdbg_filter_write(
    addr: u32,
    size_bits: u32,
    old_value: u32,
    old_valid: bool,
    value: *mut u32,
) {
    let Ok(size) = Size::from_bits(size_bits) else {
        return;
    };
    let value = &mut *value;
    with_core(|core| core.filter_write(addr, size, old_value, old_valid, value));
}

/// Write-notify hook: call after a write commits (post-filtering), to
/// evaluate watchpoints against it.
#[no_mangle]
pub extern "C" fn e9kdbg_after_write(addr: u32, size_bits: u32, value: u32, old_value: u32, old_valid: bool) {
    let Ok(size) = Size::from_bits(size_bits) else {
        return;
    };
    with_core(|core| core.after_write(addr, size, value, old_value, old_valid));
}

// --- Bus/Registers vtables -----------------------------------------------
//
// The inspection operations below need a live `Bus`/`Registers`
// implementation from the host, and a C caller has no trait to hand
// across the boundary. A vtable of function pointers plus an opaque
// `ctx` plays that role instead; these thin wrapper types adapt a
// vtable back into the safe traits `DebugCore` expects.

/// C-ABI vtable standing in for a [`Bus`] implementation. `size` on
/// `read`/`write` is always 8, 16, or 32.
#[repr(C)]
pub struct FfiBusVtable {
    pub ctx: *mut c_void,
    pub read: extern "C" fn(ctx: *mut c_void, addr: u32, size_bits: u32) -> u32,
    pub write: extern "C" fn(ctx: *mut c_void, addr: u32, size_bits: u32, value: u32),
}

struct VtableBus<'a>(&'a FfiBusVtable);

impl Bus for VtableBus<'_> {
    fn read(&mut self, addr: u32, size: Size) -> u32 {
        (self.0.read)(self.0.ctx, addr, size.bits())
    }

    fn write(&mut self, addr: u32, size: Size, value: u32) {
        (self.0.write)(self.0.ctx, addr, size.bits(), value);
    }
}

/// C-ABI vtable standing in for a [`Registers`] implementation.
#[repr(C)]
pub struct FfiRegistersVtable {
    pub ctx: *mut c_void,
    pub pc: extern "C" fn(ctx: *mut c_void) -> u32,
    pub set_pc: extern "C" fn(ctx: *mut c_void, pc: u32),
    pub data: extern "C" fn(ctx: *mut c_void, n: u8) -> u32,
    pub addr: extern "C" fn(ctx: *mut c_void, n: u8) -> u32,
    pub sr: extern "C" fn(ctx: *mut c_void) -> u16,
    pub cycles: extern "C" fn(ctx: *mut c_void) -> u64,
}

struct VtableRegisters<'a>(&'a FfiRegistersVtable);

impl Registers for VtableRegisters<'_> {
    fn pc(&self) -> u32 {
        (self.0.pc)(self.0.ctx)
    }

    fn set_pc(&mut self, pc: u32) {
        (self.0.set_pc)(self.0.ctx, pc);
    }

    fn data(&self, n: u8) -> u32 {
        (self.0.data)(self.0.ctx, n)
    }

    fn addr(&self, n: u8) -> u32 {
        (self.0.addr)(self.0.ctx, n)
    }

    fn sr(&self) -> u16 {
        (self.0.sr)(self.0.ctx)
    }

    fn cycles(&self) -> u64 {
        (self.0.cycles)(self.0.ctx)
    }
}

/// Copies registers (§6's fixed order) through `regs` into `out`.
///
/// # Safety
///
/// `regs` must point to a valid, fully populated vtable whose function
/// pointers are safe to call. `out` must point to at least `cap` valid
/// `u32` slots.
#[no_mangle]
pub unsafe extern "C" fn e9kdbg_read_registers(
    regs: *const FfiRegistersVtable,
    out: *mut u32,
    cap: usize,
) -> usize {
    let regs = VtableRegisters(&*regs);
    let out = slice::from_raw_parts_mut(out, cap);
    with_core(|core| core.read_registers(&regs, out))
}

/// Reads `cap` bytes starting at `addr` through `bus` into `out`.
///
/// # Safety
///
/// `bus` must point to a valid, fully populated vtable whose function
/// pointers are safe to call. `out` must point to at least `cap` valid
/// bytes.
#[no_mangle]
pub unsafe extern "C" fn e9kdbg_read_memory(bus: *const FfiBusVtable, addr: u32, out: *mut u8, cap: usize) -> usize {
    let mut bus = VtableBus(&*bus);
    let out = slice::from_raw_parts_mut(out, cap);
    with_core(|core| core.read_memory(&mut bus, addr, out))
}

/// Writes `value` truncated to `size_bytes` (1, 2, or 4) at `addr`
/// through `bus`. Returns `0` on success, `-1` for an invalid
/// `size_bytes`.
///
/// # Safety
///
/// `bus` must point to a valid, fully populated vtable whose function
/// pointers are safe to call.
#[no_mangle]
pub unsafe extern "C" fn e9kdbg_write_memory(
    bus: *const FfiBusVtable,
    addr: u32,
    value: u32,
    size_bytes: u32,
) -> c_int {
    let mut bus = VtableBus(&*bus);
    with_core(|core| match core.write_memory(&mut bus, addr, value, size_bytes) {
        Ok(()) => 0,
        Err(_) => -1,
    })
}

/// Quick-disassembles the opcode at `pc`, writing a NUL-terminated
/// mnemonic into `text_out` (truncated to fit `text_cap`, including the
/// terminator) and the instruction's byte length into `*len_out` (if
/// non-null). Returns the number of mnemonic bytes written, excluding
/// the terminator.
///
/// # Safety
///
/// `bus` must point to a valid, fully populated vtable whose function
/// pointers are safe to call. `text_out` must point to at least
/// `text_cap` valid bytes. `len_out`, if non-null, must point to a valid
/// `u32`.
#[no_mangle]
pub unsafe extern "C" fn e9kdbg_disassemble_quick(
    bus: *const FfiBusVtable,
    pc: u32,
    text_out: *mut c_char,
    text_cap: usize,
    len_out: *mut u32,
) -> usize {
    let mut bus = VtableBus(&*bus);
    let (text, len) = with_core(|core| core.disassemble_quick(&mut bus, pc));
    if let Some(len_out) = len_out.as_mut() {
        *len_out = len;
    }
    if text_cap == 0 {
        return 0;
    }
    let bytes = text.as_bytes();
    let n = bytes.len().min(text_cap - 1);
    let out = slice::from_raw_parts_mut(text_out.cast::<u8>(), text_cap);
    out[..n].copy_from_slice(&bytes[..n]);
    out[n] = 0;
    n
}

#[no_mangle]
pub extern "C" fn e9kdbg_add_breakpoint(addr: u32) -> bool {
    with_core(|core| core.add_breakpoint(addr))
}

#[no_mangle]
pub extern "C" fn e9kdbg_remove_breakpoint(addr: u32) {
    with_core(|core| core.remove_breakpoint(addr));
}

#[no_mangle]
pub extern "C" fn e9kdbg_add_temp_breakpoint(addr: u32) -> bool {
    with_core(|core| core.add_temp_breakpoint(addr))
}

#[no_mangle]
pub extern "C" fn e9kdbg_remove_temp_breakpoint(addr: u32) {
    with_core(|core| core.remove_temp_breakpoint(addr));
}

#[no_mangle]
pub extern "C" fn e9kdbg_reset_watchpoints() {
    with_core(DebugCore::reset_watchpoints);
}

/// Returns the new slot index, or `-1` on capacity exhaustion or an
/// invalid `size_bits`.
#[no_mangle]
pub extern "C" fn e9kdbg_add_watchpoint(
    addr: u32,
    op_mask: u32,
    value: u32,
    old_value: u32,
    diff: u32,
    size_bits: u32,
    addr_mask: u32,
) -> c_int {
    with_core(|core| {
        match core.add_watchpoint(addr, op_mask, value, old_value, diff, size_bits, addr_mask) {
            Ok(Some(index)) => index as c_int,
            _ => -1,
        }
    })
}

#[no_mangle]
pub extern "C" fn e9kdbg_remove_watchpoint(index: usize) {
    with_core(|core| core.remove_watchpoint(index));
}

#[no_mangle]
pub extern "C" fn e9kdbg_watchpoints_enabled_mask() -> u64 {
    with_core(DebugCore::watchpoints_enabled_mask)
}

#[no_mangle]
pub extern "C" fn e9kdbg_set_watchpoints_enabled_mask(mask: u64) {
    with_core(|core| core.set_watchpoints_enabled_mask(mask));
}

/// Copies up to `cap` installed watchpoints into `out`, returning the
/// count copied.
///
/// # Safety
///
/// `out` must point to at least `cap` valid [`WatchpointRecord`] slots.
#[no_mangle]
pub unsafe extern "C" fn e9kdbg_read_watchpoints(out: *mut WatchpointRecord, cap: usize) -> usize {
    let out = slice::from_raw_parts_mut(out, cap);
    with_core(|core| core.read_watchpoints(out))
}

/// Drains the latched watchbreak, if any, into `*out`. Returns `true` if
/// one was present.
///
/// # Safety
///
/// `out` must point to a valid, writable [`WatchbreakRecord`].
#[no_mangle]
pub unsafe extern "C" fn e9kdbg_consume_watchbreak(out: *mut WatchbreakRecord) -> bool {
    with_core(|core| {
        core.consume_watchbreak().is_some_and(|brk| {
            *out = brk.into();
            true
        })
    })
}

#[no_mangle]
pub extern "C" fn e9kdbg_reset_protects() {
    with_core(DebugCore::reset_protects);
}

/// `mode` is `0` for block, `1` for set. Returns the new slot index, or
/// `-1` on capacity exhaustion or invalid parameters.
#[no_mangle]
pub extern "C" fn e9kdbg_add_protect(addr: u32, size_bits: u32, mode: c_int, value: u32) -> c_int {
    let mode = match mode {
        0 => Mode::Block,
        1 => Mode::Set,
        _ => return -1,
    };
    with_core(
        |core| match core.add_protect(addr, size_bits, mode, value) {
            Ok(Some(index)) => index as c_int,
            _ => -1,
        },
    )
}

#[no_mangle]
pub extern "C" fn e9kdbg_remove_protect(index: usize) {
    with_core(|core| core.remove_protect(index));
}

#[no_mangle]
pub extern "C" fn e9kdbg_protects_enabled_mask() -> u64 {
    with_core(DebugCore::protects_enabled_mask)
}

#[no_mangle]
pub extern "C" fn e9kdbg_set_protects_enabled_mask(mask: u64) {
    with_core(|core| core.set_protects_enabled_mask(mask));
}

/// Copies up to `cap` installed protect entries into `out`, returning the
/// count copied.
///
/// # Safety
///
/// `out` must point to at least `cap` valid [`ProtectRecord`] slots.
#[no_mangle]
pub unsafe extern "C" fn e9kdbg_read_protects(out: *mut ProtectRecord, cap: usize) -> usize {
    let out = slice::from_raw_parts_mut(out, cap);
    with_core(|core| core.read_protects(out))
}

#[no_mangle]
pub extern "C" fn e9kdbg_start_profiler(stream_enabled: bool) {
    with_core(|core| core.start_profiler(stream_enabled));
}

#[no_mangle]
pub extern "C" fn e9kdbg_stop_profiler() {
    with_core(DebugCore::stop_profiler);
}

#[no_mangle]
pub extern "C" fn e9kdbg_is_profiling() -> bool {
    with_core(DebugCore::is_profiling)
}

/// # Safety
///
/// `out` must point to at least `cap` valid bytes.
#[no_mangle]
pub unsafe extern "C" fn e9kdbg_stream_profiler(out: *mut u8, cap: usize) -> usize {
    let out = slice::from_raw_parts_mut(out, cap);
    with_core(|core| core.stream_profiler(out))
}

/// # Safety
///
/// `out` must point to at least `cap` valid bytes.
#[no_mangle]
pub unsafe extern "C" fn e9kdbg_text_read(out: *mut u8, cap: usize) -> usize {
    let out = slice::from_raw_parts_mut(out, cap);
    with_core(|core| core.text_read(out))
}

#[no_mangle]
pub extern "C" fn e9kdbg_read_cycle_count() -> u64 {
    with_core(DebugCore::read_cycle_count)
}

/// Reports a resolved debug section base address to the core, forwarding
/// to any callback the host registered out-of-band. `section` must be a
/// valid, NUL-terminated, UTF-8 C string.
///
/// # Safety
///
/// `section` must point to a valid NUL-terminated C string for the
/// duration of the call.
#[no_mangle]
pub unsafe extern "C" fn e9kdbg_notify_debug_base(section: *const c_char, base: u32) {
    let section = std::ffi::CStr::from_ptr(section).to_string_lossy();
    with_core(|core| core.notify_debug_base(&section, base));
}

/// Registers a vblank callback. `call` is invoked with `ctx` on every
/// [`e9kdbg_vblank_notify`]. Replaces any previously registered callback.
#[no_mangle]
pub extern "C" fn e9kdbg_set_vblank_callback(ctx: *mut c_void, call: extern "C" fn(*mut c_void)) {
    with_core(|core| {
        core.set_vblank_callback(Box::new(move || call(ctx)));
    });
}

/// Registers a debug-base callback. `call` is invoked with `ctx`, the
/// section name, and its resolved base address on every
/// [`e9kdbg_notify_debug_base`]. Replaces any previously registered
/// callback. A section name that isn't representable as a C string is
/// silently dropped rather than passed through.
#[no_mangle]
pub extern "C" fn e9kdbg_set_debug_base_callback(
    ctx: *mut c_void,
    call: extern "C" fn(*mut c_void, *const c_char, u32),
) {
    with_core(|core| {
        core.set_debug_base_callback(Box::new(move |section: &str, base: u32| {
            if let Ok(section) = std::ffi::CString::new(section) {
                call(ctx, section.as_ptr(), base);
            }
        }));
    });
}
