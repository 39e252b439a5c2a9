//! Crate-wide error type and the `-1`-on-failure syscall convention.
//!
//! Every syscall handler in `syscall/` returns `SyscallResult` internally;
//! `syscall::dispatch` collapses it to the raw `i32` the ABI requires
//! (spec §7: "each syscall returns a signed 32-bit status and -1 on
//! failure"). Partial reads are not modeled as errors — they are plain
//! `Ok(n)` with `n` less than requested.

/// Reasons a kernel operation can fail, independent of the ABI's flat `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// Null buffer, out-of-range fd, unknown name, bad RTC rate, etc.
    InvalidArgument,
    /// PCB table or fd table is full.
    ResourceExhausted,
    /// Magic mismatch or unreadable executable image.
    BadExecutable,
    /// Inode index outside `inode_count`, or data block outside `data_count`.
    CorruptFilesystem,
    /// Write attempted on a read-only surface (regular files, directories).
    ReadOnly,
}

pub type SyscallResult = Result<i32, KernelError>;

impl KernelError {
    /// The flat ABI encoding: every error is `-1`, per spec §7.
    pub const fn to_abi(self) -> i32 {
        -1
    }
}

/// Collapse a `SyscallResult` to the raw return value handed back to user
/// code in the accumulator register.
pub fn to_abi(result: SyscallResult) -> i32 {
    match result {
        Ok(v) => v,
        Err(e) => e.to_abi(),
    }
}
