//! PID allocation and PCB placement — spec §3, §9.
//!
//! Each PCB lives at the low address of its process's 8 KiB kernel stack
//! slot, a fixed window at the top of the kernel's 4 MiB identity mapping.
//! There is no separate heap-allocated table to look a PCB up in: a running
//! process finds its own by masking `esp` down to the enclosing 8 KiB
//! boundary.

use spin::Mutex;

use super::pcb::Pcb;
use crate::arch::x86::paging::PAGE_SIZE_4M;

pub const MAX_PROCESSES: usize = 6;
pub const KERNEL_STACK_SIZE: u32 = 8 * 1024;

/// Top of the region kernel stacks are carved from — the end of the 4 MiB
/// kernel identity mapping at `[4 MiB, 8 MiB)`.
const KERNEL_STACK_REGION_TOP: u32 = 2 * PAGE_SIZE_4M;

/// `pid_slot` bitmap — spec §3. Bit `n` set means pid `n+1` is in use.
static PID_SLOTS: Mutex<[bool; MAX_PROCESSES]> = Mutex::new([false; MAX_PROCESSES]);

pub fn init() {
    *PID_SLOTS.lock() = [false; MAX_PROCESSES];
}

fn stack_bottom(pid: u8) -> u32 {
    KERNEL_STACK_REGION_TOP - pid as u32 * KERNEL_STACK_SIZE
}

/// On the bare-metal target, a PCB's address really is the base of its 8
/// KiB kernel stack slot. Host test builds have no such physical memory to
/// point into, so they fall back to a plain static array indexed by pid —
/// the addressing trick itself is covered by `current_pcb`'s masking logic,
/// not by these tests.
#[cfg(target_arch = "x86")]
unsafe fn pcb_ptr(pid: u8) -> *mut Pcb {
    stack_bottom(pid) as *mut Pcb
}

#[cfg(not(target_arch = "x86"))]
static mut HOST_TEST_PCBS: [Pcb; MAX_PROCESSES] = [const { Pcb::empty() }; MAX_PROCESSES];

#[cfg(not(target_arch = "x86"))]
unsafe fn pcb_ptr(pid: u8) -> *mut Pcb {
    core::ptr::addr_of_mut!(HOST_TEST_PCBS[pid as usize - 1])
}

/// The pid the next [`alloc_pid`] call will hand out, without claiming it.
/// Used by the scheduler to switch onto a new process's kernel stack before
/// that process's PCB technically exists — spec §4.6's lazy first-run path.
pub fn peek_next_pid() -> Option<u8> {
    let slots = PID_SLOTS.lock();
    (0..MAX_PROCESSES).find(|&i| !slots[i]).map(|i| (i + 1) as u8)
}

/// Count of currently-live pids. `execute` uses this to tell the three base
/// shells (the first process ever allocated for each terminal) apart from
/// ordinary children — spec §4.4: "parent is ... the terminal's base shell
/// (when the slot has < 3 active processes) or the current PCB."
pub fn live_count() -> usize {
    PID_SLOTS.lock().iter().filter(|&&s| s).count()
}

/// Claim the lowest free pid in `1..=6`, initializing its PCB in place.
/// Spec §4.4 `execute`: "Fails ... if six processes are already active."
pub fn alloc_pid(parent_pid: u8, terminal: crate::terminal::TerminalId) -> Option<u8> {
    let mut slots = PID_SLOTS.lock();
    for i in 0..MAX_PROCESSES {
        if !slots[i] {
            slots[i] = true;
            let pid = (i + 1) as u8;
            unsafe {
                let pcb = pcb_ptr(pid);
                core::ptr::write(pcb, Pcb::empty());
                (*pcb).pid = pid;
                (*pcb).parent_pid = parent_pid;
                (*pcb).terminal = terminal;
                (*pcb).kernel_stack_top = stack_bottom(pid) + KERNEL_STACK_SIZE;
                (*pcb).fd_table.install_std_fds();
                (*pcb).active = true;
            }
            return Some(pid);
        }
    }
    None
}

/// Release `pid`'s slot. Does not zero the stack memory; the next
/// `alloc_pid` to reuse it re-initializes the PCB in place.
pub fn free_pid(pid: u8) {
    if pid == 0 || pid as usize > MAX_PROCESSES {
        return;
    }
    PID_SLOTS.lock()[pid as usize - 1] = false;
}

/// # Safety
/// `pid` must currently be allocated.
pub unsafe fn pcb_mut(pid: u8) -> &'static mut Pcb {
    &mut *pcb_ptr(pid)
}

/// The PCB of whichever process is executing on the current kernel stack,
/// found by masking `esp` to its enclosing 8 KiB slot — spec §9.
///
/// # Safety
/// Must be called from kernel code running on a process's own kernel stack
/// (i.e. not the boot stack, and not mid context-switch).
#[cfg(target_arch = "x86")]
pub unsafe fn current_pcb() -> &'static mut Pcb {
    let esp: u32;
    core::arch::asm!("mov {0}, esp", out(reg) esp, options(nomem, nostack, preserves_flags));
    let stack_bottom = esp & !(KERNEL_STACK_SIZE - 1);
    &mut *(stack_bottom as *mut Pcb)
}

/// Host test builds have no real per-process stack; callers must not reach
/// this path in `#[cfg(test)]`.
#[cfg(not(target_arch = "x86"))]
pub unsafe fn current_pcb() -> &'static mut Pcb {
    unreachable!("current_pcb is only meaningful on the bare-metal target")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pid_allocation_is_lowest_free_first() {
        let _ = PID_SLOTS.lock().iter_mut().for_each(|s| *s = false);
        let a = alloc_pid(0, 0).unwrap();
        let b = alloc_pid(a, 0).unwrap();
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        free_pid(a);
        let c = alloc_pid(0, 0).unwrap();
        assert_eq!(c, 1);
        free_pid(b);
        free_pid(c);
    }

    #[test]
    fn exhausts_after_six() {
        for s in PID_SLOTS.lock().iter_mut() {
            *s = false;
        }
        let mut pids = std::vec::Vec::new();
        for _ in 0..MAX_PROCESSES {
            pids.push(alloc_pid(0, 0).unwrap());
        }
        assert!(alloc_pid(0, 0).is_none());
        for pid in pids {
            free_pid(pid);
        }
    }
}
