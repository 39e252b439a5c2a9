//! The per-process control block — spec §3.
//!
//! Laid out `#[repr(C)]` and placed by [`super::table`] at the low address
//! of each process's 8 KiB kernel stack slot, so a running process can find
//! its own PCB by masking `esp` rather than through a separate lookup —
//! spec §9's explicit design note.

use crate::fd::FdTable;
use crate::terminal::TerminalId;

pub const MAX_ARGS_LEN: usize = 128;

/// No parent — used for the three base shells.
pub const NO_PARENT: u8 = 0;

#[repr(C)]
pub struct Pcb {
    pub pid: u8,
    pub parent_pid: u8,
    pub terminal: TerminalId,
    pub fd_table: FdTable,
    pub args: [u8; MAX_ARGS_LEN],
    pub args_len: u8,
    /// Set by `execute` iff the command line carried a non-empty argument
    /// string — spec §3: "a flag indicating whether arguments are present".
    /// Distinct from `args_len == 0`, since a present-but-empty argument
    /// string is not the same as no arguments at all.
    pub args_present: bool,
    /// esp/ebp captured by `context::switch_to` the last time this process
    /// was scheduled out; used to resume it.
    pub saved_esp: u32,
    pub saved_ebp: u32,
    /// esp the PCB's own kernel stack started at — written into the TSS's
    /// esp0 field whenever this process is dispatched.
    pub kernel_stack_top: u32,
    pub vidmap_installed: bool,
    pub rtc_in_use: bool,
    pub active: bool,
    /// Set by `halt` on this process's parent right before jumping back into
    /// its suspended `execute` call — spec §4.4: "Returns the status passed
    /// by the child's halt (0..255) to the parent."
    pub child_exit_status: i32,
}

impl Pcb {
    pub const fn empty() -> Self {
        Self {
            pid: 0,
            parent_pid: NO_PARENT,
            terminal: 0,
            fd_table: FdTable::new(),
            args: [0; MAX_ARGS_LEN],
            args_len: 0,
            args_present: false,
            saved_esp: 0,
            saved_ebp: 0,
            kernel_stack_top: 0,
            vidmap_installed: false,
            rtc_in_use: false,
            active: false,
            child_exit_status: 0,
        }
    }

    /// spec §4.4: `getargs` must "fail if absent, truncated at 128 bytes".
    /// An argument string that fills the whole 128-byte buffer leaves no
    /// room for `copy_args_into`'s terminating NUL, so it is treated as
    /// though no arguments were given at all rather than silently
    /// truncated and accepted.
    pub fn set_args(&mut self, args: &[u8]) {
        if args.len() >= MAX_ARGS_LEN {
            self.args_len = 0;
            self.args_present = false;
            return;
        }
        let n = args.len();
        self.args[..n].copy_from_slice(&args[..n]);
        self.args_len = n as u8;
        self.args_present = !args.is_empty();
    }

    /// spec §4.4 `getargs`: fails if no arguments were supplied at
    /// `execute`-time, or if the buffer can't hold the stored argument
    /// string plus its terminating NUL.
    pub fn copy_args_into(&self, buf: &mut [u8]) -> Result<(), crate::error::KernelError> {
        if !self.args_present {
            return Err(crate::error::KernelError::InvalidArgument);
        }
        let n = self.args_len as usize;
        if n + 1 > buf.len() {
            return Err(crate::error::KernelError::InvalidArgument);
        }
        buf[..n].copy_from_slice(&self.args[..n]);
        buf[n] = 0;
        Ok(())
    }
}
