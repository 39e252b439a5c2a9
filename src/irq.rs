//! Named bodies for the three IRQ vectors this kernel cares about.
//!
//! Spec §1: "the GDT/IDT stub code and assembly linkage that parks
//! registers and dispatches to named handlers" is an out-of-scope external
//! collaborator. This module is the other half of that contract — the
//! functions such a stub is assumed to call once it has parked registers
//! for IRQ0 (PIT), IRQ1 (keyboard) and IRQ8 (RTC) respectively.

use crate::arch::x86::pic::{self, PIT_VECTOR, RTC_VECTOR};
use crate::{keyboard, rtc, sched};

/// Spec §4.6: "the handler sends EOI and calls the scheduler" — in that
/// order, so a long-running scheduler tick never holds IRQ0 masked longer
/// than necessary.
///
/// # Safety
/// Must be called with interrupts disabled, directly from the IRQ0 stub.
pub unsafe fn pit(vector: u8) {
    debug_assert_eq!(vector, PIT_VECTOR);
    pic::PICS.lock().notify_end_of_interrupt(PIT_VECTOR);
    sched::on_tick();
}

/// # Safety
/// Must be called with interrupts disabled, directly from the IRQ1 stub.
pub unsafe fn keyboard() {
    keyboard::on_interrupt();
    pic::PICS.lock().notify_end_of_interrupt(pic::KEYBOARD_VECTOR);
}

/// # Safety
/// Must be called with interrupts disabled, directly from the IRQ8 stub.
pub unsafe fn rtc(vector: u8) {
    debug_assert_eq!(vector, RTC_VECTOR);
    rtc::on_tick();
    pic::PICS.lock().notify_end_of_interrupt(RTC_VECTOR);
}
