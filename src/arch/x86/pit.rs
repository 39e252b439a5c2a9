//! Programmable Interval Timer: channel 0, rate-generator mode, ~100 Hz.
//!
//! Spec §4.6: "PIT is programmed to ≈100 Hz (divisor = 1 193 180 / 100) in
//! rate-generator mode." Register programming beyond rate selection is out
//! of scope (spec §1 Non-goals), so this is the whole of the PIT driver.

use super::ports::outb;

const PIT_FREQUENCY_HZ: u32 = 1_193_180;
const PIT_COMMAND: u16 = 0x43;
const PIT_CHANNEL0: u16 = 0x40;

/// Mode 2 (rate generator), channel 0, lobyte/hibyte access.
const CMD_CHANNEL0_RATE_GENERATOR: u8 = 0b0011_0100;

pub const TARGET_HZ: u32 = 100;

/// Program PIT channel 0 to fire at [`TARGET_HZ`].
///
/// # Safety
/// Must run once at boot with interrupts disabled, before IRQ0 is unmasked.
pub unsafe fn init() {
    let divisor = PIT_FREQUENCY_HZ / TARGET_HZ;
    outb(PIT_COMMAND, CMD_CHANNEL0_RATE_GENERATOR);
    outb(PIT_CHANNEL0, (divisor & 0xff) as u8);
    outb(PIT_CHANNEL0, ((divisor >> 8) & 0xff) as u8);
}
