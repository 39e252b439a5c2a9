//! Hand-written context switch and ring-3 entry.
//!
//! Spec §9: "the context switch (save/restore stack pointers, reload
//! page-directory root, interrupt-return to ring 3) must remain as
//! hand-written machine instructions; abstract its contract as
//! `switch_to(pcb)` and `enter_user(entry, user_stack)`." Everything above
//! this file (the scheduler, `execute`) only ever calls these two
//! functions; nothing else touches `esp`/`ebp` directly.

use core::arch::asm;

/// Save the caller's `esp`/`ebp` into `*save_esp`/`*save_ebp`, then load
/// `esp`/`ebp` from `next_esp`/`next_ebp` and return into whatever called
/// `switch_to` for the process being resumed.
///
/// This is the kernel-to-kernel half of a context switch: it does not
/// touch CR3 or re-enter user mode on its own. The scheduler calls
/// [`super::paging::switch_address_space`] and
/// [`super::tss::set_kernel_stack`] around this, exactly mirroring spec
/// §4.6's tick sequence.
///
/// # Safety
/// `save_esp`/`save_ebp` must point at the current process's PCB fields;
/// `next_esp`/`next_ebp` must be valid, previously-saved stack pointers
/// belonging to a process that was itself suspended by a prior call to
/// this same function (or freshly constructed by [`enter_user`]'s caller
/// for a never-yet-run process).
#[inline(never)]
pub unsafe fn switch_to(save_esp: *mut u32, save_ebp: *mut u32, next_esp: u32, next_ebp: u32) {
    asm!(
        "mov [{save_esp}], esp",
        "mov [{save_ebp}], ebp",
        "mov esp, {next_esp}",
        "mov ebp, {next_ebp}",
        save_esp = in(reg) save_esp,
        save_ebp = in(reg) save_ebp,
        next_esp = in(reg) next_esp,
        next_ebp = in(reg) next_ebp,
        options(nostack),
    );
}

/// Build an `iret` frame on the current kernel stack and drop to ring 3 at
/// `entry`, running on `user_stack`. Used once per process, at the tail of
/// `execute` (spec §4.4).
///
/// # Safety
/// - `entry` must be a valid, mapped, executable user-space address.
/// - `user_stack` must be a valid, mapped, writable user-space address.
/// - The user page directory entry for this process must already be
///   installed (`paging::switch_address_space` called first).
/// - Interrupts must be enabled in the pushed `eflags` so the scheduler can
///   still preempt this process.
/// Save the outgoing process's `esp`/`ebp`, then jump onto a fresh kernel
/// stack and `call entry` there — used once per terminal slot to launch its
/// first shell (spec §4.6's lazy-boot path). Unlike [`switch_to`], the
/// target is a brand-new, never-suspended stack: landing on it via a plain
/// `call` (rather than loading a previously-saved pointer and falling into
/// this function's own `ret`) is what makes that safe, mirroring the
/// source's raw `movl esp/ebp; call execute(...)` sequence.
///
/// # Safety
/// `entry` must never return — same caveat the source carries: if `shell`
/// is not on the file-system image, there is nothing to fall back to.
/// `save_esp`/`save_ebp` must point at the currently-running process's PCB
/// fields, or at scratch storage when nothing was running yet (the very
/// first tick).
#[inline(never)]
pub unsafe fn bootstrap_call(
    save_esp: *mut u32,
    save_ebp: *mut u32,
    stack_top: u32,
    entry: unsafe extern "C" fn() -> !,
) -> ! {
    asm!(
        "mov [{save_esp}], esp",
        "mov [{save_ebp}], ebp",
        "mov esp, {stack_top}",
        "mov ebp, {stack_top}",
        "call {entry}",
        save_esp = in(reg) save_esp,
        save_ebp = in(reg) save_ebp,
        stack_top = in(reg) stack_top,
        entry = in(reg) entry,
        options(noreturn),
    );
}

/// Capture the caller's `esp`/`ebp` as a resume point, without transferring
/// control — execution continues normally in the caller right after this
/// call. [`resume_return_point`] later jumps back to exactly this point and
/// makes the call appear to return `true` instead of `false`, the same way
/// `setjmp`/`longjmp` distinguish the initial call from a later jump back in.
///
/// This is `execute`'s half of the source's parent/child control transfer:
/// the source captures the parent's registers with a bare `asm volatile`
/// inside `execute_handler` and later restores them with `leave; ret` inside
/// `halt_handler`, making the parent's call to `execute` appear to return
/// with the child's exit status. Splitting that into an explicit save/resume
/// pair, rather than relying on a raw stack-frame-shaped `leave;ret`, is the
/// Rust-expressible version of the same trick.
///
/// # Safety
/// `save_esp`/`save_ebp` must point at fields that stay valid (i.e. belong
/// to a PCB, not a transient) until a matching [`resume_return_point`] call.
#[inline(never)]
pub unsafe fn save_return_point(save_esp: *mut u32, save_ebp: *mut u32) -> bool {
    let resumed: u32;
    asm!(
        "mov [{save_esp}], esp",
        "mov [{save_ebp}], ebp",
        "mov {resumed:e}, 0",
        save_esp = in(reg) save_esp,
        save_ebp = in(reg) save_ebp,
        resumed = out(reg) resumed,
        options(nostack, preserves_flags),
    );
    resumed != 0
}

/// Jump back into a point captured by [`save_return_point`], making that
/// earlier call return `true`. Used by `halt` to hand a child's exit status
/// back to the parent's still-suspended `execute` call.
///
/// # Safety
/// `esp`/`ebp` must be a pair most recently written by `save_return_point`,
/// and the stack memory they point into must not have been reused since.
pub unsafe fn resume_return_point(esp: u32, ebp: u32) -> ! {
    asm!(
        "mov esp, {esp}",
        "mov ebp, {ebp}",
        "mov eax, 1",
        "ret",
        esp = in(reg) esp,
        ebp = in(reg) ebp,
        options(noreturn),
    );
}

pub unsafe fn enter_user(entry: u32, user_stack: u32) -> ! {
    const USER_CS: u32 = 0x33; // ring-3 code selector, RPL 3
    const USER_DS: u32 = 0x2b; // ring-3 data selector, RPL 3
    const EFLAGS_IF: u32 = 0x202; // reserved bit 1 + interrupt flag

    asm!(
        "mov ax, {user_ds:x}",
        "mov ds, ax",
        "mov es, ax",
        "mov fs, ax",
        "mov gs, ax",
        "push {user_ds}",
        "push {user_stack}",
        "push {eflags}",
        "push {user_cs}",
        "push {entry}",
        "iretd",
        user_ds = in(reg) USER_DS,
        user_stack = in(reg) user_stack,
        eflags = in(reg) EFLAGS_IF,
        user_cs = in(reg) USER_CS,
        entry = in(reg) entry,
        options(noreturn),
    );
}
