//! Multiboot1 header, so GRUB/QEMU `-kernel` can load this image directly.
//!
//! Bootloader/kernel-entry machinery is out of scope (spec §1) — this file
//! is the minimum needed to produce a bootable artifact at all, kept as
//! thin as the teacher crate's own `multiboot.rs`.

use core::arch::global_asm;

#[cfg(target_arch = "x86")]
global_asm!(
    r#"
.section .multiboot_header, "a"
.align 4
multiboot_header_start:
    .long 0x1BADB002                // magic
    .long 0x0000_0003                // flags: align modules, provide mem info
    .long -(0x1BADB002 + 0x0000_0003) // checksum
multiboot_header_end:

.section .text
.global _start
_start:
    mov esp, offset boot_stack_top
    push 0
    push ebx                         // multiboot info pointer
    push eax                         // multiboot magic
    call kernel_main
.hang:
    hlt
    jmp .hang

.section .bss
.align 16
boot_stack_bottom:
    .skip 16384
boot_stack_top:
"#
);

/// Value the bootloader leaves in `eax`, and that `_start` forwards to
/// `kernel_main` as `magic`, on a well-formed multiboot1 boot.
pub const MULTIBOOT_BOOTLOADER_MAGIC: u32 = 0x2BADB002;

/// Bit 3 of the multiboot1 info `flags` field: "mods_count and mods_addr
/// are valid". The GRUB config that boots this kernel is assumed to load
/// the read-only file-system image as the first (and only) boot module,
/// since this kernel has no driver for any other way to get the image off
/// disk (the read-only FS itself is purely an in-memory-image reader —
/// spec §4.2 / §6).
const FLAG_MODS: u32 = 1 << 3;

#[repr(C)]
struct RawInfo {
    flags: u32,
    mem_lower: u32,
    mem_upper: u32,
    boot_device: u32,
    cmdline: u32,
    mods_count: u32,
    mods_addr: u32,
    // Remaining fields (syms, mmap, drives, config_table, ...) are not
    // needed by this kernel and are left unread.
}

#[repr(C)]
struct RawModule {
    mod_start: u32,
    mod_end: u32,
    // string, reserved — unused.
}

/// The physical byte range of the first multiboot module, if the
/// bootloader reported one. Interpreted as the read-only FS image.
///
/// # Safety
/// `info_addr` must be the physical address the bootloader left in `ebx`
/// on entry, per the multiboot1 spec, and must still be mapped (true of
/// low memory under this kernel's identity mapping).
pub unsafe fn first_module(info_addr: u32) -> Option<(u32, u32)> {
    let info = &*(info_addr as *const RawInfo);
    if info.flags & FLAG_MODS == 0 || info.mods_count == 0 {
        return None;
    }
    let module = &*(info.mods_addr as *const RawModule);
    Some((module.mod_start, module.mod_end))
}
