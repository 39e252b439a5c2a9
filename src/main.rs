//! Binary entry point.
//!
//! `_start` and `kernel_main` live in the library crate
//! (`arch::x86::multiboot`, `lib.rs`) so that the `#[cfg(test)]` modules
//! scattered through the library can be exercised with `cargo test` against
//! a host target without dragging a second copy of the boot assembly along.
//! This crate only needs to force the linker to keep that symbol and supply
//! the one thing a binary crate provides that a library can't: a panic
//! handler.
#![no_std]
#![no_main]

use trios_kernel as _;

#[cfg(target_os = "none")]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    trios_kernel::panic_body(info)
}
