//! System-call layer — spec §4.4.
//!
//! `dispatch` is the single entry point the (out-of-scope, spec §1) IDT
//! stub for vector 0x80 calls into, with the trapped register frame. Every
//! handler body here runs with interrupts disabled (spec §4.4: "All
//! handlers treat their bodies as critical sections with respect to the
//! timer") via [`crate::arch::x86::without_interrupts`], except for the two
//! that explicitly re-enable interrupts to block (`read` on a terminal or
//! RTC fd — spec §5).

use crate::arch::x86::paging::{self, USER_IMAGE_VIRT_ADDR, USER_STACK_TOP};
use crate::arch::x86::{context, tss, without_interrupts};
use crate::error::{to_abi, KernelError, SyscallResult};
use crate::fd::{self, FileKind, STDIN_FD, STDOUT_FD};
use crate::fs::{self, FileType};
use crate::process::pcb::NO_PARENT;
use crate::process::table;
use crate::rtc;
use crate::sched;
use crate::terminal::{self, NUM_TERMINALS};

/// Executable magic required at file offset 0 — spec §6.
const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
/// File offset of the little-endian 32-bit entry point — spec §6.
const ENTRY_POINT_OFFSET: u32 = 24;
/// Upper bound on how far `execute`'s user-pointer argument scanning looks
/// for a terminating NUL before giving up — the command line this kernel
/// ever sees comes from a 127-byte terminal input buffer, so anything past
/// that is not a command this kernel produced itself.
const MAX_CMD_LEN: usize = 1024;

pub const SYS_HALT: u32 = 1;
pub const SYS_EXECUTE: u32 = 2;
pub const SYS_READ: u32 = 3;
pub const SYS_WRITE: u32 = 4;
pub const SYS_OPEN: u32 = 5;
pub const SYS_CLOSE: u32 = 6;
pub const SYS_GETARGS: u32 = 7;
pub const SYS_VIDMAP: u32 = 8;

/// The register frame the (out-of-scope) `int 0x80` stub is assumed to
/// have built on the kernel stack before calling [`dispatch`]: call number
/// in `eax`, up to three arguments in `ebx`/`ecx`/`edx` — spec §6.
#[repr(C)]
pub struct Registers {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
}

/// `int 0x80` entry point. Writes the syscall's return value back into
/// `regs.eax`, the only channel the ABI defines for it.
///
/// # Safety
/// Must be called only from the out-of-scope trap stub, with `regs`
/// pointing at a register frame captured from ring 3.
pub unsafe fn dispatch(regs: &mut Registers) {
    match regs.eax {
        SYS_HALT => {
            // Never returns: control lands either in a freshly re-executed
            // shell (ring 3) or back in the parent's suspended `execute`
            // call via `context::resume_return_point`.
            halt(regs.ebx as u8);
        }
        SYS_EXECUTE => {
            let cmd = user_cstr(regs.ebx, MAX_CMD_LEN);
            regs.eax = execute(cmd) as u32;
        }
        SYS_READ => {
            regs.eax = read(regs.ebx as i32, regs.ecx, regs.edx as i32) as u32;
        }
        SYS_WRITE => {
            regs.eax = write(regs.ebx as i32, regs.ecx, regs.edx as i32) as u32;
        }
        SYS_OPEN => {
            let name = user_cstr(regs.ebx, fs::FILENAME_LEN);
            regs.eax = open(name) as u32;
        }
        SYS_CLOSE => {
            regs.eax = close(regs.ebx as i32) as u32;
        }
        SYS_GETARGS => {
            regs.eax = getargs(regs.ebx, regs.ecx as i32) as u32;
        }
        SYS_VIDMAP => {
            regs.eax = vidmap(regs.ebx) as u32;
        }
        _ => {
            regs.eax = KernelError::InvalidArgument.to_abi() as u32;
        }
    }
}

/// Read up to `max` bytes starting at a user-space pointer, stopping at the
/// first NUL. No page-table walk is performed: this kernel's relaxed
/// user/kernel boundary (spec §9's "ELF check... keep this relaxed
/// contract" extends in spirit to every other raw user pointer here) trusts
/// that `ptr` is a valid address in the calling process's mapped region.
///
/// # Safety
/// `ptr` must point at readable memory for at least `max` bytes, or carry
/// a NUL terminator before that.
unsafe fn user_cstr(ptr: u32, max: usize) -> &'static [u8] {
    let base = ptr as *const u8;
    let mut len = 0usize;
    while len < max && *base.add(len) != 0 {
        len += 1;
    }
    core::slice::from_raw_parts(base, len)
}

/// # Safety
/// `ptr` must point at `len` bytes of readable user memory.
unsafe fn user_slice(ptr: u32, len: u32) -> &'static [u8] {
    core::slice::from_raw_parts(ptr as *const u8, len as usize)
}

/// # Safety
/// `ptr` must point at `len` bytes of writable user memory.
unsafe fn user_slice_mut(ptr: u32, len: u32) -> &'static mut [u8] {
    core::slice::from_raw_parts_mut(ptr as *mut u8, len as usize)
}

/// Split `cmd` into an executable name and its argument string on the first
/// run of whitespace — spec §4.4: "parse cmd into an executable name and
/// argument string (whitespace-separated)."
fn parse_cmd(cmd: &[u8]) -> Result<(&[u8], &[u8]), KernelError> {
    let cmd = trim(cmd);
    if cmd.is_empty() {
        return Err(KernelError::InvalidArgument);
    }
    match cmd.iter().position(|b| b.is_ascii_whitespace()) {
        Some(split) => {
            let name = &cmd[..split];
            let args = trim(&cmd[split + 1..]);
            Ok((name, args))
        }
        None => Ok((cmd, &[])),
    }
}

fn trim(mut s: &[u8]) -> &[u8] {
    while let [b' ', rest @ ..] = s {
        s = rest;
    }
    while let [rest @ .., b' '] = s {
        s = rest;
    }
    s
}

/// spec §4.4 `execute`. Two very different callers reach this:
///
/// - The scheduler's lazy-boot path (spec §4.6), launching a terminal's
///   first shell. There is no suspended parent to resume into later, so
///   this diverges straight into ring 3.
/// - An ordinary user syscall (or a relaunch from [`halt`]), where the
///   calling process's kernel context is preserved via
///   [`context::save_return_point`] so the later matching `halt` can hand
///   its exit status back here.
pub fn execute(cmd: &[u8]) -> i32 {
    to_abi(without_interrupts(|| execute_inner(cmd)))
}

fn execute_inner(cmd: &[u8]) -> SyscallResult {
    let (name, args) = parse_cmd(cmd)?;

    let (inode_num, file_type) =
        fs::with_image(|image| image.lookup_by_name(name).map(|d| (d.inode_num, d.file_type)))
            .map_err(|_| KernelError::InvalidArgument)?;
    if file_type != FileType::Regular {
        return Err(KernelError::BadExecutable);
    }

    let mut header = [0u8; 4];
    let read = fs::with_image(|image| image.read_inode(inode_num, 0, &mut header))
        .map_err(|_| KernelError::BadExecutable)?;
    if read < 4 || header != ELF_MAGIC {
        return Err(KernelError::BadExecutable);
    }

    let mut entry_bytes = [0u8; 4];
    fs::with_image(|image| image.read_inode(inode_num, ENTRY_POINT_OFFSET, &mut entry_bytes))
        .map_err(|_| KernelError::BadExecutable)?;
    let entry = u32::from_le_bytes(entry_bytes);

    // Spec §4.4/§9: the first process ever created for each terminal is
    // that terminal's immortal base shell (no parent); everything after is
    // an ordinary child of whoever called `execute`.
    let is_base_shell = table::live_count() < NUM_TERMINALS;
    let (terminal, parent_pid) = if is_base_shell {
        (sched::current_terminal(), NO_PARENT)
    } else {
        // SAFETY: not the lazy-boot path, so we are running on the calling
        // process's own kernel stack.
        let parent = unsafe { table::current_pcb() };
        (parent.terminal, parent.pid)
    };

    let pid = table::alloc_pid(parent_pid, terminal).ok_or(KernelError::ResourceExhausted)?;

    // SAFETY: pid was just allocated and owns a dedicated physical slot.
    let copy_result = unsafe {
        paging::switch_address_space(pid);
        copy_program_image(inode_num)
    };
    // Spec §7: a bad executable frees any partially-allocated pid rather
    // than leaving a half-initialized process table slot behind.
    if let Err(e) = copy_result {
        table::free_pid(pid);
        return Err(e);
    }

    let pcb = unsafe { table::pcb_mut(pid) };
    pcb.set_args(args);
    sched::rebind_terminal(terminal, pid);
    tss::set_kernel_stack(pcb.kernel_stack_top);

    if is_base_shell {
        // SAFETY: the user 4 MiB slot and stack for `pid` are mapped; the
        // scheduler already parked the previous occupant's kernel context.
        unsafe { context::enter_user(entry, USER_STACK_TOP) }
    } else {
        // SAFETY: `parent_pid` is still live; its PCB fields are valid.
        let parent = unsafe { table::pcb_mut(parent_pid) };
        let resumed = unsafe { context::save_return_point(&mut parent.saved_esp, &mut parent.saved_ebp) };
        if resumed {
            return Ok(parent.child_exit_status);
        }
        // SAFETY: same as above.
        unsafe { context::enter_user(entry, USER_STACK_TOP) }
    }
}

/// Copy the entire program image to [`USER_IMAGE_VIRT_ADDR`] in 512-byte
/// chunks — spec §4.4: "copy the entire program image to virtual
/// 0x08048000."
///
/// # Safety
/// The caller's 4 MiB user slot must already be mapped via
/// `paging::switch_address_space`.
unsafe fn copy_program_image(inode_num: u32) -> Result<(), KernelError> {
    let mut offset = 0u32;
    let mut chunk = [0u8; 512];
    loop {
        let n = fs::with_image(|image| image.read_inode(inode_num, offset, &mut chunk))?;
        if n == 0 {
            return Ok(());
        }
        let dst = (USER_IMAGE_VIRT_ADDR + offset) as *mut u8;
        core::ptr::copy_nonoverlapping(chunk.as_ptr(), dst, n);
        offset += n as u32;
    }
}

/// spec §4.4 `halt`. Diverges: base shells relaunch `shell` in their
/// terminal slot (never truly exiting), everything else frees its
/// resources and long-jumps back into the parent's suspended `execute`
/// call.
pub fn halt(status: u8) -> ! {
    without_interrupts(|| halt_inner(status))
}

fn halt_inner(status: u8) -> ! {
    // SAFETY: halt is only ever reached from a running process's own trap
    // frame, on its own kernel stack.
    let pcb = unsafe { table::current_pcb() };
    let pid = pcb.pid;
    let terminal = pcb.terminal;
    pcb.fd_table.close_all_opened();
    table::free_pid(pid);

    if pid <= 3 {
        // Base shells never truly exit — spec §4.4. Freeing the pid above
        // drops `live_count()` below `NUM_TERMINALS` again, so the next
        // `execute` naturally re-takes the base-shell branch.
        sched::clear_terminal_slot(terminal);
        // SAFETY: `execute_inner`'s base-shell branch never returns to us.
        match execute_inner(b"shell") {
            Ok(_) | Err(_) => unreachable!("base-shell execute always diverges into ring 3"),
        }
    }

    let parent_pid = pcb.parent_pid;
    // SAFETY: a non-base-shell process always has a live parent; `execute`
    // never frees the parent's slot while a child is still running.
    let parent = unsafe { table::pcb_mut(parent_pid) };
    parent.child_exit_status = status as i32;
    sched::rebind_terminal(terminal, parent_pid);

    unsafe {
        paging::switch_address_space(parent_pid);
        tss::set_kernel_stack(parent.kernel_stack_top);
        // Never returns here: this lands back inside the parent's
        // suspended `execute_inner` call, at its `save_return_point` site.
        context::resume_return_point(parent.saved_esp, parent.saved_ebp)
    }
}

/// spec §4.4 `read`.
pub fn read(fd: i32, buf_ptr: u32, n: i32) -> i32 {
    if !(0..fd::NUM_FDS as i32).contains(&fd) || buf_ptr == 0 || n < 0 {
        return KernelError::InvalidArgument.to_abi();
    }
    if fd as usize == STDOUT_FD {
        return KernelError::InvalidArgument.to_abi();
    }
    // SAFETY: buf_ptr/n are validated non-null/non-negative above; the
    // kernel trusts the calling process's own pointer, per this crate's
    // relaxed user-pointer contract (module doc).
    let buf = unsafe { user_slice_mut(buf_ptr, n as u32) };
    to_abi(without_interrupts(|| read_inner(fd as usize, buf)))
}

fn read_inner(fd: usize, buf: &mut [u8]) -> SyscallResult {
    // SAFETY: read is only ever reached on the calling process's own stack.
    let pcb = unsafe { table::current_pcb() };
    let terminal = pcb.terminal;
    let descriptor = pcb.fd_table.get_mut(fd).ok_or(KernelError::InvalidArgument)?;
    let kind = descriptor.kind;
    let n = fs::with_image(|image| fd::read(descriptor, image, terminal, buf))?;
    if kind == FileKind::Regular {
        descriptor.file_position += n as u32;
    }
    Ok(n as i32)
}

/// spec §4.4 `write`.
pub fn write(fd: i32, buf_ptr: u32, n: i32) -> i32 {
    if !(0..fd::NUM_FDS as i32).contains(&fd) || buf_ptr == 0 || n < 0 {
        return KernelError::InvalidArgument.to_abi();
    }
    if fd as usize == STDIN_FD {
        return KernelError::InvalidArgument.to_abi();
    }
    // SAFETY: see `read`'s note on this crate's relaxed user-pointer contract.
    let buf = unsafe { user_slice(buf_ptr, n as u32) };
    to_abi(without_interrupts(|| write_inner(fd as usize, buf)))
}

fn write_inner(fd: usize, buf: &[u8]) -> SyscallResult {
    // SAFETY: write is only ever reached on the calling process's own stack.
    let pcb = unsafe { table::current_pcb() };
    let terminal = pcb.terminal;
    let is_fg = terminal::is_foreground(terminal);
    let descriptor = pcb.fd_table.get(fd).ok_or(KernelError::InvalidArgument)?;
    let n = fd::write(descriptor, terminal, is_fg, buf)?;
    Ok(n as i32)
}

/// spec §4.3/§4.4 `open`.
pub fn open(name: &[u8]) -> i32 {
    to_abi(without_interrupts(|| open_inner(name)))
}

fn open_inner(name: &[u8]) -> SyscallResult {
    let (file_type, inode_num) = fs::with_image(|image| {
        image
            .lookup_by_name(name)
            .map(|d| (d.file_type, d.inode_num))
    })
    .map_err(|_| KernelError::InvalidArgument)?;

    let kind = match file_type {
        FileType::Regular => FileKind::Regular,
        FileType::Directory => FileKind::Directory,
        FileType::Rtc => FileKind::Rtc,
    };

    // SAFETY: open is only ever reached on the calling process's own stack.
    let pcb = unsafe { table::current_pcb() };
    let fd = pcb.fd_table.alloc(kind, inode_num)?;
    if kind == FileKind::Rtc {
        rtc::reset_to_default_rate();
        pcb.rtc_in_use = true;
    }
    Ok(fd as i32)
}

/// spec §4.3/§4.4 `close`.
pub fn close(fd: i32) -> i32 {
    if !(0..fd::NUM_FDS as i32).contains(&fd) {
        return KernelError::InvalidArgument.to_abi();
    }
    to_abi(without_interrupts(|| {
        // SAFETY: close is only ever reached on the calling process's own stack.
        let pcb = unsafe { table::current_pcb() };
        pcb.fd_table.close(fd as usize)?;
        Ok(0)
    }))
}

/// spec §4.4 `getargs`.
pub fn getargs(buf_ptr: u32, n: i32) -> i32 {
    if buf_ptr == 0 || n < 0 {
        return KernelError::InvalidArgument.to_abi();
    }
    // SAFETY: see `read`'s note on this crate's relaxed user-pointer contract.
    let buf = unsafe { user_slice_mut(buf_ptr, n as u32) };
    to_abi(without_interrupts(|| {
        // SAFETY: getargs is only ever reached on the calling process's own stack.
        let pcb = unsafe { table::current_pcb() };
        pcb.copy_args_into(buf)?;
        Ok(0)
    }))
}

/// spec §4.4 `vidmap`.
pub fn vidmap(out_ptr: u32) -> i32 {
    if out_ptr == 0 || paging::is_kernel_address(out_ptr) {
        return KernelError::InvalidArgument.to_abi();
    }
    to_abi(without_interrupts(|| vidmap_inner(out_ptr)))
}

fn vidmap_inner(out_ptr: u32) -> SyscallResult {
    // SAFETY: vidmap is only ever reached on the calling process's own stack.
    let pcb = unsafe { table::current_pcb() };
    let phys = terminal::phys_page_for(pcb.terminal);
    // SAFETY: `phys` is a live terminal video page.
    unsafe {
        paging::install_vidmap(phys);
    }
    terminal::mark_vidmap_installed();
    pcb.vidmap_installed = true;
    // SAFETY: `out_ptr` was checked above to lie outside the kernel's own
    // identity mapping; writing the vidmap window's fixed virtual address
    // through it is this crate's only interaction with user memory here.
    unsafe {
        core::ptr::write_unaligned(out_ptr as *mut u32, paging::VIDMAP_VIRT_ADDR);
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cmd_splits_on_whitespace() {
        let (name, args) = parse_cmd(b"grep -n foo").unwrap();
        assert_eq!(name, b"grep");
        assert_eq!(args, b"-n foo");
    }

    #[test]
    fn parse_cmd_handles_bare_name() {
        let (name, args) = parse_cmd(b"shell").unwrap();
        assert_eq!(name, b"shell");
        assert_eq!(args, b"");
    }

    #[test]
    fn parse_cmd_trims_surrounding_whitespace() {
        let (name, args) = parse_cmd(b"  ls  -l  ").unwrap();
        assert_eq!(name, b"ls");
        assert_eq!(args, b"-l");
    }

    #[test]
    fn parse_cmd_rejects_empty() {
        assert!(parse_cmd(b"").is_err());
        assert!(parse_cmd(b"   ").is_err());
    }
}
