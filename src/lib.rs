//! An in-process debug core for a cycle-accurate 68000-family emulator.
//!
//! Embed a [`DebugCore`] in the emulator process and drive it from two
//! callback points: the **instruction hook**, called once before every
//! fetched opcode, and the **memory access hooks**, called around every
//! bus read and write. Everything else — breakpoints, stepping, the
//! shadow call stack, watchpoints, write protection, and the sampling
//! profiler — falls out of those two entry points plus the host-facing
//! export operations on [`DebugCore`] itself.
//!
//! The emulator's own contract is kept at arm's length behind the
//! [`bus::Bus`] and [`bus::Registers`] traits; this crate never assumes
//! anything about the CPU core, the cartridge format, or how the host
//! resolves addresses to source lines.
//!
//! [`ffi`] exposes the same surface as a flat `extern "C"` API for hosts
//! that embed this crate across a language boundary.

#![warn(clippy::pedantic)]

pub mod addr;
pub mod aggregator;
pub mod breakpoint;
pub mod bus;
pub mod callstack;
pub mod cfg;
pub mod core;
pub mod disasm;
pub mod error;
pub mod exec;
pub mod ffi;
pub mod profiler;
pub mod protect;
pub mod reentry;
pub mod text;
pub mod watch;

pub use crate::core::DebugCore;
pub use crate::error::{Error, Result};
