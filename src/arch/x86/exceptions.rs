//! Fatal CPU exception handling — spec §7: "clear the screen, print the
//! exception name, halt the CPU in a busy loop. The kernel does not attempt
//! recovery." Linking these bodies to IDT vectors 0..31 is part of the
//! out-of-scope GDT/IDT stub (spec §1); this module is only the handler
//! logic itself, named so the stub can reference it.
//!
//! Spec §9 Open Question: the reference kernel installs the same handler on
//! vectors 20..31, which Intel reserves. That behavior (treat as fatal,
//! uniformly) is preserved here rather than second-guessed, since no
//! reimplementer-supplied evidence says otherwise.

use crate::terminal;

/// Name of every exception vector this kernel treats as fatal. Index is the
/// interrupt vector number; entries past 19 are Intel-reserved and are
/// handled identically to the named ones (see module doc).
const EXCEPTION_NAMES: [&str; 20] = [
    "Divide Error",
    "Debug",
    "NMI Interrupt",
    "Breakpoint",
    "Overflow",
    "BOUND Range Exceeded",
    "Invalid Opcode",
    "Device Not Available",
    "Double Fault",
    "Coprocessor Segment Overrun",
    "Invalid TSS",
    "Segment Not Present",
    "Stack-Segment Fault",
    "General Protection",
    "Page Fault",
    "Reserved",
    "x87 FPU Floating-Point Error",
    "Alignment Check",
    "Machine Check",
    "SIMD Floating-Point Exception",
];

/// The common body every fatal exception vector's stub calls into.
///
/// # Safety
/// Must be called with interrupts disabled; never returns.
pub unsafe fn fatal(vector: u8) -> ! {
    let name = EXCEPTION_NAMES
        .get(vector as usize)
        .copied()
        .unwrap_or("Reserved");
    terminal::clear_foreground();
    let fg = terminal::current_foreground();
    terminal::terminal_write(fg, true, b"\n");
    terminal::terminal_write(fg, true, name.as_bytes());
    log::error!("fatal exception: {} (vector {})", name, vector);
    halt_forever();
}

/// Busy-loop with interrupts disabled — the kernel's only response to a
/// condition it cannot recover from (spec §7).
pub fn halt_forever() -> ! {
    loop {
        unsafe {
            core::arch::asm!("cli", "hlt", options(nomem, nostack));
        }
    }
}
