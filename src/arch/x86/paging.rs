//! Paging and address-space layout — spec §4.1.
//!
//! A single, static page directory:
//!
//! - `[0, 4 MiB)`: 4 KiB pages through one page table. Only the page
//!   containing the VGA text buffer and the three off-screen terminal
//!   pages are ever present.
//! - `[4 MiB, 8 MiB)`: one 4 MiB PSE page mapping the kernel identity.
//! - `[128 MiB, 132 MiB)`: one 4 MiB PSE page mapped to the physical slot
//!   of the process currently running; rewritten every context switch.
//! - `[1 GiB, 1 GiB+4 KiB)`: the vidmap window, installed lazily by
//!   `vidmap()`.
//!
//! Page-directory/table entries are raw bit-packed `u32`s (the flag layout
//! every 32-bit x86 kernel in this corpus uses — see DESIGN.md): bit 0
//! present, bit 1 read/write, bit 2 user/supervisor, bit 7 page size (PSE,
//! page-directory entries only).

use core::arch::asm;

use bitflags::bitflags;

pub const PAGE_SIZE: u32 = 4096;
pub const PAGE_SIZE_4M: u32 = 4 * 1024 * 1024;

bitflags! {
    /// Page-directory/table entry flag bits (Intel SDM 32-bit paging
    /// layout): present, read/write, user/supervisor, and page-size
    /// (PSE, page-directory entries only).
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    struct EntryFlags: u32 {
        const PRESENT = 1 << 0;
        const READ_WRITE = 1 << 1;
        const USER = 1 << 2;
        const PAGE_SIZE_PSE = 1 << 7;
    }
}

/// Index of the low 4 KiB-granularity page-directory entry (covers
/// `[0, 4 MiB)`).
const PDE_LOW: usize = 0;
/// Index of the kernel identity 4 MiB page (covers `[4 MiB, 8 MiB)`).
const PDE_KERNEL: usize = 1;
/// Index of the user program's 4 MiB page (covers `[128 MiB, 132 MiB)`).
const PDE_USER: usize = 32;
/// Index of the vidmap window's page-directory entry (covers
/// `[1 GiB, 1 GiB+4 MiB)`; only its first 4 KiB page table entry is used).
const PDE_VIDMAP: usize = 256;

/// Physical address of the real VGA text buffer.
pub const VGA_PHYS_ADDR: u32 = 0xb_8000;
/// Virtual address the kernel always uses to reach "whichever physical page
/// backs the current terminal" — rewritten by `remap_terminal_video` on every
/// scheduler tick and foreground switch.
pub const VGA_WINDOW_VIRT_ADDR: u32 = 0x0;
/// Virtual address of the vidmap window handed back to user code.
pub const VIDMAP_VIRT_ADDR: u32 = 0x4000_0000;
/// Virtual address a user program image is loaded at.
pub const USER_IMAGE_VIRT_ADDR: u32 = 0x0804_8000;
/// Virtual address of the top of the user stack.
pub const USER_STACK_TOP: u32 = 0x083f_fffc;
/// Physical base of the per-pid 4 MiB program slots.
pub const USER_PHYS_BASE: u32 = 8 * 1024 * 1024;

#[repr(C, align(4096))]
pub struct PageDirectory {
    entries: [u32; 1024],
}

#[repr(C, align(4096))]
pub struct PageTable {
    entries: [u32; 1024],
}

impl PageDirectory {
    const fn new() -> Self {
        Self { entries: [0; 1024] }
    }
}

impl PageTable {
    const fn new() -> Self {
        Self { entries: [0; 1024] }
    }
}

static mut PAGE_DIRECTORY: PageDirectory = PageDirectory::new();
static mut LOW_PAGE_TABLE: PageTable = PageTable::new();

fn pde_4m(phys_base: u32, user: bool) -> u32 {
    let mut flags = EntryFlags::PRESENT | EntryFlags::READ_WRITE | EntryFlags::PAGE_SIZE_PSE;
    if user {
        flags |= EntryFlags::USER;
    }
    (phys_base & 0xffc0_0000) | flags.bits()
}

fn pde_table(table_phys: u32) -> u32 {
    let flags = EntryFlags::PRESENT | EntryFlags::READ_WRITE | EntryFlags::USER;
    (table_phys & 0xffff_f000) | flags.bits()
}

fn pte(phys: u32) -> u32 {
    let flags = EntryFlags::PRESENT | EntryFlags::READ_WRITE | EntryFlags::USER;
    (phys & 0xffff_f000) | flags.bits()
}

/// Low page-table slot for the VGA-visible virtual page (first page of
/// `[0, 4 MiB)`).
const LOW_PT_VGA_SLOT: usize = 0;

/// Build the static directory: kernel identity at `[4 MiB, 8 MiB)`, the low
/// page table installed (with no entries present yet — `remap_terminal_video`
/// fills in the VGA slot), and the vidmap entry left absent until `vidmap()`
/// installs it.
///
/// # Safety
/// Must run once at boot, before paging is enabled, on the bootstrap stack.
pub unsafe fn init() {
    let pd = core::ptr::addr_of_mut!(PAGE_DIRECTORY);
    let low_pt = core::ptr::addr_of_mut!(LOW_PAGE_TABLE);

    (*pd).entries[PDE_LOW] = pde_table(low_pt as u32);
    (*pd).entries[PDE_KERNEL] = pde_4m(PAGE_SIZE_4M, false);

    load_cr3(pd as u32);
    enable_paging_and_pse();
}

/// # Safety
/// `phys` must be a valid, owned page frame (the VGA buffer or an
/// off-screen terminal page).
unsafe fn enable_paging_and_pse() {
    let mut cr4: u32;
    asm!("mov {0}, cr4", out(reg) cr4, options(nomem, nostack, preserves_flags));
    cr4 |= 1 << 4; // PSE
    asm!("mov cr4, {0}", in(reg) cr4, options(nomem, nostack, preserves_flags));

    let mut cr0: u32;
    asm!("mov {0}, cr0", out(reg) cr0, options(nomem, nostack, preserves_flags));
    cr0 |= 1 << 31; // PG
    asm!("mov cr0, {0}", in(reg) cr0, options(nomem, nostack, preserves_flags));
}

/// # Safety
/// `phys_dir` must point at a valid, live `PageDirectory`.
unsafe fn load_cr3(phys_dir: u32) {
    asm!("mov cr3, {0}", in(reg) phys_dir, options(nomem, nostack, preserves_flags));
}

/// # Safety
/// Caller must ensure the current page directory is the live one.
unsafe fn flush_tlb() {
    let pd = core::ptr::addr_of!(PAGE_DIRECTORY) as u32;
    load_cr3(pd);
}

/// Rewrite the `[128 MiB, 132 MiB)` user slot to `8 MiB + (pid-1)*4 MiB`,
/// marked user/read-write, and flush the TLB — spec §4.1.
///
/// # Safety
/// `pid` must be a currently-live process with a properly loaded program
/// image at the corresponding physical slot.
pub unsafe fn switch_address_space(pid: u8) {
    let phys_base = USER_PHYS_BASE + (pid as u32 - 1) * PAGE_SIZE_4M;
    let pd = core::ptr::addr_of_mut!(PAGE_DIRECTORY);
    (*pd).entries[PDE_USER] = pde_4m(phys_base, true);
    flush_tlb();
}

/// Map the VGA-visible virtual page to `phys_page` (the physical buffer
/// backing the given terminal — the real VGA buffer for the foreground
/// terminal, or that terminal's off-screen page otherwise), and update the
/// vidmap window the same way if it has been installed — spec §4.1 /
/// §4.5.
///
/// # Safety
/// `phys_page` must be exactly 4 KiB and owned by the kernel/terminal
/// subsystem for the duration this mapping is live.
pub unsafe fn remap_terminal_video(phys_page: u32, vidmap_installed: bool) {
    let low_pt = core::ptr::addr_of_mut!(LOW_PAGE_TABLE);
    (*low_pt).entries[LOW_PT_VGA_SLOT] = pte(phys_page);

    if vidmap_installed {
        let pd = core::ptr::addr_of_mut!(PAGE_DIRECTORY);
        // The vidmap page table reuses the low page table's single entry
        // convention: index 0 holds the currently exposed video page.
        (*pd).entries[PDE_VIDMAP] = pde_4m(phys_page & 0xffc0_0000, true);
    }
    flush_tlb();
}

/// Install the vidmap window at `VIDMAP_VIRT_ADDR`, pointing at `phys_page`.
/// Spec §4.4 `vidmap()`.
///
/// # Safety
/// `phys_page` must be a live terminal video page.
pub unsafe fn install_vidmap(phys_page: u32) {
    remap_terminal_video_vidmap_only(phys_page);
}

/// # Safety
/// See [`install_vidmap`].
unsafe fn remap_terminal_video_vidmap_only(phys_page: u32) {
    let pd = core::ptr::addr_of_mut!(PAGE_DIRECTORY);
    (*pd).entries[PDE_VIDMAP] = pde_4m(phys_page & 0xffc0_0000, true);
    flush_tlb();
}

/// True iff `addr` falls inside the kernel's own 4 MiB identity mapping
/// (used by `vidmap()` to reject an out-pointer that aliases kernel space).
pub fn is_kernel_address(addr: u32) -> bool {
    (PAGE_SIZE_4M..2 * PAGE_SIZE_4M).contains(&addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pde_4m_sets_pse_and_present() {
        let entry = pde_4m(PAGE_SIZE_4M, false);
        let flags = EntryFlags::from_bits_truncate(entry);
        assert!(flags.contains(EntryFlags::PRESENT));
        assert!(flags.contains(EntryFlags::PAGE_SIZE_PSE));
        assert!(!flags.contains(EntryFlags::USER));
        assert_eq!(entry & 0xffc0_0000, PAGE_SIZE_4M);
    }

    #[test]
    fn pde_4m_user_sets_user_bit() {
        let entry = pde_4m(USER_PHYS_BASE, true);
        assert!(EntryFlags::from_bits_truncate(entry).contains(EntryFlags::USER));
    }

    #[test]
    fn user_slot_addresses_are_pid_indexed() {
        for pid in 1u8..=6 {
            let expected = USER_PHYS_BASE + (pid as u32 - 1) * PAGE_SIZE_4M;
            assert_eq!(expected % PAGE_SIZE_4M, 0);
        }
    }

    #[test]
    fn kernel_address_check() {
        assert!(is_kernel_address(PAGE_SIZE_4M));
        assert!(is_kernel_address(PAGE_SIZE_4M + 0x1000));
        assert!(!is_kernel_address(USER_IMAGE_VIRT_ADDR));
        assert!(!is_kernel_address(VIDMAP_VIRT_ADDR));
    }
}
