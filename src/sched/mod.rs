//! PIT-driven round-robin scheduler — spec §4.6.
//!
//! One quantum per terminal slot. The scheduler only ever advances through
//! [`context::switch_to`] / [`paging::switch_address_space`] /
//! [`tss::set_kernel_stack`] / [`terminal::on_schedule`] — it never touches
//! `esp`/`ebp` or page-table entries directly, per spec §9's design note.

use spin::Mutex;

use crate::arch::x86::{context, paging, tss};
use crate::process::table;
use crate::terminal::{self, TerminalId};

struct SchedState {
    /// pid currently bound to each terminal slot; 0 means that terminal has
    /// never run a shell yet.
    sched_pid: [u8; terminal::NUM_TERMINALS],
    /// Terminal slot of the process presently executing.
    curr_process: TerminalId,
}

static STATE: Mutex<SchedState> = Mutex::new(SchedState {
    sched_pid: [0; terminal::NUM_TERMINALS],
    curr_process: 0,
});

pub fn init() {
    *STATE.lock() = SchedState {
        sched_pid: [0; terminal::NUM_TERMINALS],
        curr_process: 0,
    };
}

/// Terminal slot of whoever is presently scheduled — used by the keyboard
/// driver to know which terminal's video window to re-home after an
/// Alt+Fn switch.
pub fn current_terminal() -> TerminalId {
    STATE.lock().curr_process
}

/// PIT IRQ0 handler body. Spec §4.6: "On each tick: save the current
/// process's esp/ebp ... advance to the next terminal slot in round-robin
/// order ... rewrite the 4 MiB user page for the incoming process's pid ...
/// remap video pages ... update the TSS esp0 ... resume".
///
/// # Safety
/// Must run with interrupts disabled, directly from the PIT interrupt
/// handler, on the outgoing process's own kernel stack.
pub unsafe fn on_tick() {
    let mut st = STATE.lock();

    if st.sched_pid == [0; terminal::NUM_TERMINALS] {
        // First tick ever: lazily boot terminal 0's shell.
        st.sched_pid[0] = table::peek_next_pid().unwrap_or(1);
        st.curr_process = 0;
        drop(st);
        terminal::on_schedule(0);
        let _ = crate::syscall::execute(b"shell");
        return;
    }

    let cur_terminal = st.curr_process;
    let cur_pid = st.sched_pid[cur_terminal];
    let next_terminal = (cur_terminal + 1) % terminal::NUM_TERMINALS;
    let booting = st.sched_pid[next_terminal] == 0;

    if booting {
        st.sched_pid[next_terminal] = table::peek_next_pid().unwrap_or(cur_pid + 1);
    }
    st.curr_process = next_terminal;
    let next_pid = st.sched_pid[next_terminal];
    drop(st);

    terminal::on_schedule(next_terminal);

    let cur_pcb = table::pcb_mut(cur_pid);

    if booting {
        // This terminal has never run: jump straight onto the new process's
        // fresh kernel stack and let `execute` finish setting it up.
        let new_stack_top = kernel_stack_top_for(next_pid);
        context::switch_to(
            &mut cur_pcb.saved_esp,
            &mut cur_pcb.saved_ebp,
            new_stack_top - 4,
            new_stack_top - 4,
        );
        let _ = crate::syscall::execute(b"shell");
        return;
    }

    paging::switch_address_space(next_pid);
    let next_pcb = table::pcb_mut(next_pid);
    tss::set_kernel_stack(next_pcb.kernel_stack_top);
    context::switch_to(
        &mut cur_pcb.saved_esp,
        &mut cur_pcb.saved_ebp,
        next_pcb.saved_esp,
        next_pcb.saved_ebp,
    );
}

/// Mirrors `process::table`'s stack-slot formula for a pid that is about to
/// be allocated but doesn't have a PCB yet.
fn kernel_stack_top_for(pid: u8) -> u32 {
    const KERNEL_STACK_SIZE: u32 = 8 * 1024;
    const KERNEL_STACK_REGION_TOP: u32 = 2 * paging::PAGE_SIZE_4M;
    KERNEL_STACK_REGION_TOP - (pid as u32 - 1) * KERNEL_STACK_SIZE
}

/// Called by `halt` when the process exiting is a terminal's base shell —
/// spec §4.4: shells never halt in the original either, but re-arming the
/// slot keeps the invariant explicit rather than silently wrong if one
/// ever does.
pub fn clear_terminal_slot(terminal: TerminalId) {
    STATE.lock().sched_pid[terminal] = 0;
}

/// Rebind a terminal's scheduled pid — called by `execute`/`halt` as a
/// process replaces or returns control to its parent within the same
/// terminal slot.
pub fn rebind_terminal(terminal: TerminalId, pid: u8) {
    STATE.lock().sched_pid[terminal] = pid;
}

pub fn pid_for_terminal(terminal: TerminalId) -> u8 {
    STATE.lock().sched_pid[terminal]
}
