//! Just enough 68000 opcode classification to drive the shadow call stack
//! and `disassemble_quick`.
//!
//! Full disassembly is out of scope (the host resolves symbols and source
//! lines itself); this module only recognizes the small family of
//! call/return opcodes the debug core itself must react to, per §4.2.

/// What an opcode word means to the shadow call stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlFlow {
    /// `JSR`-family: a long call through an effective address. Carries the
    /// number of extension words following the opcode.
    Call { ext_words: u16 },
    /// `BSR.B`: a one-word relative call.
    ShortCall,
    /// One of `RTS`/`RTR`/`RTE`/`RTD`: a return.
    Return,
    /// Anything else, as far as call-stack tracking is concerned.
    Other,
}

/// Classifies `opcode` per §4.2 step 3.
#[must_use]
pub fn classify(opcode: u16) -> ControlFlow {
    if (opcode & 0xffc0) == 0x4e80 {
        if let Some(ext_words) = jsr_ext_words(opcode) {
            return ControlFlow::Call { ext_words };
        }
        return ControlFlow::Other;
    }
    if (opcode & 0xff00) == 0x6100 {
        return ControlFlow::ShortCall;
    }
    if matches!(opcode, 0x4e75 | 0x4e74 | 0x4e73 | 0x4e77) {
        return ControlFlow::Return;
    }
    ControlFlow::Other
}

/// Number of extension words consumed by a `JSR`'s effective address, or
/// `None` if `mode`/`reg` do not form a valid control-flow addressing mode
/// (register-direct and address-register-direct cannot be used with
/// `JSR`).
fn jsr_ext_words(opcode: u16) -> Option<u16> {
    let mode = (opcode >> 3) & 7;
    let reg = opcode & 7;
    match mode {
        0 | 1 => None,
        5 | 6 => Some(2),
        7 => match reg {
            0 | 2 | 3 => Some(2),
            1 => Some(4),
            _ => None,
        },
        _ => Some(0),
    }
}

/// Best-effort quick disassembly used by the `disassemble_quick` export.
///
/// Recognized call/return opcodes get a short mnemonic; everything else
/// is rendered as a raw opcode word. Returns the formatted text and the
/// byte offset of the next instruction.
#[must_use]
pub fn quick(opcode: u16) -> (String, u32) {
    match classify(opcode) {
        ControlFlow::Call { ext_words } => {
            let len = 2 + u32::from(ext_words) * 2;
            (format!("jsr     ; ${opcode:04x}"), len)
        }
        ControlFlow::ShortCall => {
            let disp = opcode & 0xff;
            if disp == 0 {
                (format!("bsr.w   ; ${opcode:04x}"), 4)
            } else {
                (format!("bsr.b   ${disp:02x}"), 2)
            }
        }
        ControlFlow::Return => (mnemonic_for_return(opcode).to_owned(), 2),
        ControlFlow::Other => (format!(".word   ${opcode:04x}"), 2),
    }
}

fn mnemonic_for_return(opcode: u16) -> &'static str {
    match opcode {
        0x4e75 => "rts",
        0x4e74 => "rtd",
        0x4e73 => "rte",
        0x4e77 => "rtr",
        _ => unreachable!("caller already classified as a return"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_jsr_indirect() {
        // jsr (a0)
        assert_eq!(classify(0x4e90), ControlFlow::Call { ext_words: 0 });
        // jsr $1234.w
        assert_eq!(classify(0x4eb8), ControlFlow::Call { ext_words: 2 });
        // jsr $12345678.l
        assert_eq!(classify(0x4eb9), ControlFlow::Call { ext_words: 4 });
    }

    #[test]
    fn rejects_invalid_jsr_modes() {
        // Register-direct and address-register-direct are not valid JSR
        // effective addresses.
        assert_eq!(classify(0x4e80), ControlFlow::Other);
        assert_eq!(classify(0x4e88), ControlFlow::Other);
    }

    #[test]
    fn classifies_bsr_byte_family() {
        assert_eq!(classify(0x6101), ControlFlow::ShortCall);
        assert_eq!(classify(0x61ff), ControlFlow::ShortCall);
    }

    #[test]
    fn classifies_returns() {
        for op in [0x4e75u16, 0x4e74, 0x4e73, 0x4e77] {
            assert_eq!(classify(op), ControlFlow::Return);
        }
    }

    #[test]
    fn unrelated_opcodes_are_other() {
        assert_eq!(classify(0x0000), ControlFlow::Other);
        assert_eq!(classify(0x4e71), ControlFlow::Other); // nop
    }

    #[test]
    fn quick_reports_instruction_length() {
        let (_, len) = quick(0x4e75);
        assert_eq!(len, 2);
        let (_, len) = quick(0x4eb9);
        assert_eq!(len, 10);
    }
}
