//! Execution Controller: the run/pause/step state machine that decides,
//! on every instruction hook, whether to request an emulator break.
//!
//! The two-phase `step_instr`/`step_instr_after` handshake exists because
//! the instruction hook fires *before* the fetched opcode executes; a
//! single-instruction step has to let that instruction run and then stop
//! on the fetch that follows it.

/// One instruction hook's verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookAction {
    /// Let the fetched instruction execute normally.
    Proceed,
    /// Ask the emulator to end its timeslice before executing the fetched
    /// instruction.
    Break,
}

/// Run/pause/step state machine.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExecState {
    paused: bool,
    step_instr: bool,
    step_instr_after: bool,
    step_next: bool,
    step_next_depth: usize,
    step_start_pc: u32,
    step_next_skip_once: bool,
    skip_once: bool,
    skip_pc: u32,
    frame_end: bool,
}

impl ExecState {
    /// Constructs a fresh, running (unpaused) controller.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether the next instruction hook is already committed to breaking
    /// (the second half of a `step_instruction` handshake). A caller
    /// orchestrating the full instruction hook pipeline needs this to
    /// decide whether to run call-stack decoding at all (§4.2 step 2
    /// precedes step 3).
    #[must_use]
    pub fn is_step_instr_after(&self) -> bool {
        self.step_instr_after
    }

    /// Clears and returns the frame-end flag the frame loop consumes to
    /// notify the host that a break just happened.
    pub fn take_frame_end(&mut self) -> bool {
        std::mem::take(&mut self.frame_end)
    }

    fn request_break(&mut self) {
        self.paused = true;
        self.step_instr = false;
        self.step_instr_after = false;
        self.step_next = false;
        self.frame_end = true;
    }

    /// Pauses execution, requesting an immediate break.
    pub fn pause(&mut self) {
        self.request_break();
    }

    /// Resumes execution. If `pc` currently sits on a breakpoint, arms a
    /// skip-once so the very next instruction hook doesn't immediately
    /// re-trigger it.
    pub fn resume(&mut self, pc: u32, at_breakpoint: bool) {
        self.paused = false;
        self.step_instr = false;
        self.step_instr_after = false;
        self.step_next = false;
        if at_breakpoint {
            self.skip_once = true;
            self.skip_pc = pc;
        }
    }

    /// Arms a single-instruction step.
    pub fn step_instruction(&mut self) {
        self.paused = false;
        self.step_instr = true;
        self.step_instr_after = false;
    }

    /// Arms a step-over: breaks once `depth` returns to at most
    /// `current_depth` at a PC other than `current_pc`.
    pub fn step_over(&mut self, current_pc: u32, current_depth: usize) {
        self.paused = false;
        self.step_next = true;
        self.step_next_depth = current_depth;
        self.step_start_pc = current_pc;
        self.step_next_skip_once = false;
    }

    /// Arms a step-out: breaks when the current frame returns to its
    /// caller, or immediately if there is no frame to step out of.
    pub fn step_out_optionally(&mut self, current_pc: u32, current_depth: usize) {
        if current_depth == 0 {
            self.request_break();
            return;
        }
        self.paused = false;
        self.step_next = true;
        self.step_next_depth = current_depth - 1;
        self.step_start_pc = current_pc;
        self.step_next_skip_once = false;
    }

    /// Called by the call-stack decoder when a return opcode is decoded,
    /// to avoid breaking on the instruction right after a call site
    /// before step-over's depth bookkeeping has caught up.
    pub fn note_return_decoded(&mut self) {
        if self.step_next {
            self.step_next_skip_once = true;
        }
    }

    /// Runs the instruction hook's decision steps 2 and 4-7 of the
    /// pipeline (profiler sampling and call-stack decode happen
    /// elsewhere, in the core's hook orchestration). `depth` is the
    /// shadow call stack's depth *after* any push/pop this PC performed.
    pub fn instruction_hook(
        &mut self,
        pc: u32,
        depth: usize,
        in_temp: bool,
        in_perm: bool,
    ) -> HookAction {
        if self.step_instr_after {
            self.request_break();
            return HookAction::Break;
        }

        if self.step_instr {
            self.step_instr = false;
            self.step_instr_after = true;
            return HookAction::Proceed;
        }

        if self.step_next {
            if self.step_next_skip_once {
                self.step_next_skip_once = false;
            } else if pc != self.step_start_pc && depth <= self.step_next_depth {
                self.request_break();
                return HookAction::Break;
            }
        }

        if self.skip_once && pc == self.skip_pc {
            self.skip_once = false;
            return HookAction::Proceed;
        }

        if in_temp || in_perm {
            self.request_break();
            return HookAction::Break;
        }

        HookAction::Proceed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_requests_an_immediate_break() {
        let mut st = ExecState::new();
        st.pause();
        assert!(st.is_paused());
        assert!(st.take_frame_end());
    }

    #[test]
    fn resume_at_a_breakpoint_arms_skip_once() {
        let mut st = ExecState::new();
        st.pause();
        st.resume(0x1000, true);
        assert!(!st.is_paused());
        // First hook at the landing PC should proceed, not re-break.
        let action = st.instruction_hook(0x1000, 0, false, true);
        assert_eq!(action, HookAction::Proceed);
    }

    #[test]
    fn resume_without_a_breakpoint_does_not_arm_skip_once() {
        let mut st = ExecState::new();
        st.pause();
        st.resume(0x1000, false);
        let action = st.instruction_hook(0x1000, 0, false, true);
        assert_eq!(action, HookAction::Break);
    }

    #[test]
    fn step_instruction_is_a_two_phase_handshake() {
        let mut st = ExecState::new();
        st.step_instruction();
        // First hook: arms step_instr_after, lets the instruction run.
        let action = st.instruction_hook(0x1000, 0, false, false);
        assert_eq!(action, HookAction::Proceed);
        assert!(!st.is_paused());
        // Second hook: breaks before the following instruction.
        let action = st.instruction_hook(0x1002, 0, false, false);
        assert_eq!(action, HookAction::Break);
        assert!(st.is_paused());
    }

    #[test]
    fn step_over_breaks_only_once_depth_returns() {
        let mut st = ExecState::new();
        st.step_over(0x1000, 0);
        // Still inside the call (deeper): proceed.
        let action = st.instruction_hook(0x2000, 1, false, false);
        assert_eq!(action, HookAction::Proceed);
        // Back at depth 0 but a different PC: break.
        let action = st.instruction_hook(0x1002, 0, false, false);
        assert_eq!(action, HookAction::Break);
    }

    #[test]
    fn step_over_return_skip_once_suppresses_immediate_break() {
        let mut st = ExecState::new();
        st.step_over(0x1000, 0);
        st.note_return_decoded();
        // Depth has unwound to 0 already, but this is the skip-once hook.
        let action = st.instruction_hook(0x1004, 0, false, false);
        assert_eq!(action, HookAction::Proceed);
        // Next hook resumes normal step-over evaluation.
        let action = st.instruction_hook(0x1006, 0, false, false);
        assert_eq!(action, HookAction::Break);
    }

    #[test]
    fn step_out_with_empty_stack_breaks_immediately() {
        let mut st = ExecState::new();
        st.step_out_optionally(0x1000, 0);
        assert!(st.is_paused());
    }

    #[test]
    fn breakpoint_hit_requests_break() {
        let mut st = ExecState::new();
        let action = st.instruction_hook(0x4000, 0, false, true);
        assert_eq!(action, HookAction::Break);
    }

    #[test]
    fn no_flags_set_proceeds() {
        let mut st = ExecState::new();
        let action = st.instruction_hook(0x4000, 0, false, false);
        assert_eq!(action, HookAction::Proceed);
        assert!(!st.is_paused());
    }

    #[test]
    fn resume_is_idempotent() {
        let mut st = ExecState::new();
        st.resume(0x1000, false);
        st.resume(0x1000, false);
        assert!(!st.is_paused());
    }
}
