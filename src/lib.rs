//! trios-kernel: a small x86 protected-mode teaching kernel.
//!
//! Boots a single processor, multiplexes three text terminals over one
//! physical console, and runs user programs under preemptive round-robin
//! scheduling against a POSIX-flavored syscall surface backed by a
//! read-only file system, a PIT, an RTC, an 8259 PIC pair and a PS/2
//! keyboard.
//!
//! `#![no_std]` throughout; on host builds (`cargo test`, not
//! `target_os = "none"`) `std` is linked in so the `#[cfg(test)]` modules
//! colocated with each subsystem can use ordinary `std::vec`/`assert!`
//! machinery. There is no global allocator and nothing here depends on
//! `alloc`: every data structure in the kernel (FS dentries, PCBs, fd
//! tables, terminal buffers) has a small, fixed maximum cardinality.
#![no_std]

#[cfg(not(target_os = "none"))]
extern crate std;

pub mod arch;
pub mod error;
pub mod fd;
pub mod fs;
pub mod irq;
pub mod keyboard;
pub mod process;
pub mod rtc;
pub mod sched;
pub mod serial;
pub mod syscall;
pub mod terminal;

/// Boot entry point, called by [`arch::x86::multiboot`]'s `_start` once
/// GRUB has handed off control. Brings every subsystem in §2's component
/// table up in leaf-first order, then idles: from here on, all forward
/// progress is driven by the PIT/keyboard/RTC interrupt handlers in
/// [`irq`] and the syscall dispatcher in [`syscall`], both of which this
/// function never calls directly again.
///
/// # Safety
/// Must be called exactly once, as `_start`'s only action, before paging is
/// enabled and before any IRQ line is unmasked.
#[no_mangle]
pub unsafe extern "C" fn kernel_main(magic: u32, multiboot_info_addr: u32) -> ! {
    serial::init();
    log::info!("trios-kernel booting, multiboot magic 0x{:x}", magic);

    if magic != arch::x86::multiboot::MULTIBOOT_BOOTLOADER_MAGIC {
        log::warn!(
            "multiboot magic 0x{:x} does not match the expected 0x{:x}; continuing anyway",
            magic,
            arch::x86::multiboot::MULTIBOOT_BOOTLOADER_MAGIC
        );
    }

    match arch::x86::multiboot::first_module(multiboot_info_addr) {
        Some((start, end)) if end > start => {
            let image = core::slice::from_raw_parts(start as *const u8, (end - start) as usize);
            if let Err(e) = fs::install_image(image) {
                log::error!("boot module rejected as a file-system image: {:?}", e);
            }
        }
        _ => log::error!("no boot module reported; file-system image unavailable"),
    }

    arch::x86::paging::init();
    arch::x86::pic::PICS.lock().initialize();
    arch::x86::pit::init();
    rtc::init();
    keyboard::init();
    terminal::init();
    process::init();
    sched::init();

    arch::x86::pic::PICS.lock().clear_mask(arch::x86::pic::IRQ_PIT);

    log::info!("subsystems initialized; entering idle loop with interrupts enabled");
    loop {
        arch::x86::enable_interrupts_and_halt_once();
    }
}

/// Shared panic body for the bare-metal target — spec §7's fatal-exception
/// handling, reused for Rust-level panics (array bounds, integer overflow
/// in debug builds) that have no CPU exception vector of their own. Only
/// linked on `target_os = "none"`: host test builds use `std`'s own panic
/// runtime instead.
#[cfg(target_os = "none")]
pub fn panic_body(info: &core::panic::PanicInfo) -> ! {
    terminal::clear_foreground();
    log::error!("kernel panic: {}", info);
    arch::x86::exceptions::halt_forever()
}
