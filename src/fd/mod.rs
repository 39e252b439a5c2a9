//! Per-PCB file descriptor table with polymorphic file ops — spec §4.3,
//! §9 ("re-express [function-pointer vectors] as a tagged variant with a
//! matching method set").

use crate::error::KernelError;
use crate::fs::FileSystem;
use crate::rtc;
use crate::terminal::TerminalId;

pub const NUM_FDS: usize = 8;
pub const STDIN_FD: usize = 0;
pub const STDOUT_FD: usize = 1;

/// Which kind of file a descriptor refers to, and the state its `read`
/// needs (spec §3: "a file-ops vector ... an inode index ... a file
/// position ... a flag").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Regular,
    Directory,
    Rtc,
    Terminal,
}

#[derive(Debug, Clone, Copy)]
pub struct FileDescriptor {
    pub kind: FileKind,
    pub inode_num: u32,
    pub file_position: u32,
    pub in_use: bool,
}

impl FileDescriptor {
    const fn closed() -> Self {
        Self {
            kind: FileKind::Terminal,
            inode_num: 0,
            file_position: 0,
            in_use: false,
        }
    }
}

/// The 8-entry table living in each PCB.
pub struct FdTable {
    slots: [FileDescriptor; NUM_FDS],
}

impl FdTable {
    pub const fn new() -> Self {
        Self {
            slots: [FileDescriptor::closed(); NUM_FDS],
        }
    }

    /// Installed by `execute`: fd 0 is stdin (terminal read), fd 1 is
    /// stdout (terminal write) — spec §3.
    pub fn install_std_fds(&mut self) {
        self.slots[STDIN_FD] = FileDescriptor {
            kind: FileKind::Terminal,
            inode_num: 0,
            file_position: 0,
            in_use: true,
        };
        self.slots[STDOUT_FD] = FileDescriptor {
            kind: FileKind::Terminal,
            inode_num: 0,
            file_position: 0,
            in_use: true,
        };
    }

    /// Scan fds 2..7 for the first free slot. Spec §4.3.
    pub fn alloc(&mut self, kind: FileKind, inode_num: u32) -> Result<usize, KernelError> {
        for (fd, slot) in self.slots.iter_mut().enumerate().skip(2) {
            if !slot.in_use {
                *slot = FileDescriptor {
                    kind,
                    inode_num,
                    file_position: 0,
                    in_use: true,
                };
                return Ok(fd);
            }
        }
        Err(KernelError::ResourceExhausted)
    }

    /// Refuses fd 0, fd 1, out-of-range, or already-free — spec §4.3.
    pub fn close(&mut self, fd: usize) -> Result<(), KernelError> {
        if fd < 2 || fd >= NUM_FDS {
            return Err(KernelError::InvalidArgument);
        }
        if !self.slots[fd].in_use {
            return Err(KernelError::InvalidArgument);
        }
        self.slots[fd] = FileDescriptor::closed();
        Ok(())
    }

    /// Free fds 2..7, called implicitly by `halt` — spec §4.4.
    pub fn close_all_opened(&mut self) {
        for slot in self.slots.iter_mut().skip(2) {
            *slot = FileDescriptor::closed();
        }
    }

    pub fn get(&self, fd: usize) -> Option<&FileDescriptor> {
        self.slots.get(fd).filter(|d| d.in_use)
    }

    pub fn get_mut(&mut self, fd: usize) -> Option<&mut FileDescriptor> {
        self.slots.get_mut(fd).filter(|d| d.in_use)
    }
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Dispatch a `read` through the descriptor's `kind`. Spec §4.3: directory
/// reads yield one filename per call; regular files forward to the inode
/// reader; RTC blocks until the next tick; terminal reads the foreground
/// line buffer.
pub fn read(
    descriptor: &mut FileDescriptor,
    fs: &FileSystem,
    terminal: TerminalId,
    buf: &mut [u8],
) -> Result<usize, KernelError> {
    match descriptor.kind {
        FileKind::Regular => {
            let n = fs.read_inode(descriptor.inode_num, descriptor.file_position, buf)?;
            Ok(n)
        }
        FileKind::Directory => read_directory_entry(descriptor, fs, buf),
        FileKind::Rtc => {
            rtc::blocking_read();
            Ok(0)
        }
        FileKind::Terminal => crate::terminal::terminal_read(terminal, buf),
    }
}

fn read_directory_entry(
    descriptor: &mut FileDescriptor,
    fs: &FileSystem,
    buf: &mut [u8],
) -> Result<usize, KernelError> {
    if descriptor.file_position >= fs.dir_count() {
        return Ok(0);
    }
    let dentry = fs.lookup_by_index(descriptor.file_position)?;
    let name = dentry.name();
    let n = name.len().min(buf.len());
    buf[..n].copy_from_slice(&name[..n]);
    descriptor.file_position += 1;
    Ok(n)
}

/// Dispatch a `write`. Spec §4.3: RTC reprograms the rate from a 4-byte
/// integer; terminal writes to the process's video page; regular files and
/// directories are read-only.
pub fn write(
    descriptor: &FileDescriptor,
    terminal: TerminalId,
    is_foreground: bool,
    buf: &[u8],
) -> Result<usize, KernelError> {
    match descriptor.kind {
        FileKind::Regular | FileKind::Directory => Err(KernelError::ReadOnly),
        FileKind::Rtc => {
            if buf.len() < 4 {
                return Err(KernelError::InvalidArgument);
            }
            let rate = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
            rtc::set_rate(rate)?;
            Ok(4)
        }
        FileKind::Terminal => {
            crate::terminal::terminal_write(terminal, is_foreground, buf);
            Ok(buf.len())
        }
    }
}
