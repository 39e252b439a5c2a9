//! Task-State Segment kernel-stack field, mutated by the scheduler every
//! context switch (spec §4.6: "update the TSS kernel stack pointer to the
//! target's kernel stack"). Construction of the GDT entry that makes this
//! TSS live is part of the out-of-scope GDT/IDT boot stub (spec §1); this
//! module only owns the `esp0` field the stub's TSS descriptor points at.

use core::sync::atomic::{AtomicU32, Ordering};

/// The kernel stack pointer (`esp0`) used on every ring3→ring0 transition.
/// A plain atomic stands in for the real TSS structure's `esp0` field: the
/// boot stub is assumed to have pointed a GDT TSS descriptor at a structure
/// containing this value at the ABI-defined offset.
static KERNEL_STACK_ESP0: AtomicU32 = AtomicU32::new(0);

/// Set the kernel stack used for the next ring3→ring0 transition.
///
/// Must be called with interrupts disabled (spec §5).
pub fn set_kernel_stack(esp0: u32) {
    KERNEL_STACK_ESP0.store(esp0, Ordering::Relaxed);
}

/// Read the kernel stack currently installed in the TSS.
pub fn get_kernel_stack() -> u32 {
    KERNEL_STACK_ESP0.load(Ordering::Relaxed)
}
