//! Terminal multiplexer — spec §4.5, §3.
//!
//! Three logical terminals share one physical VGA console. Each owns a
//! private 4 KiB off-screen buffer; whichever is foreground instead has its
//! content live in the real hardware buffer. [`arch::x86::paging::remap_terminal_video`]
//! keeps the shared low virtual window pointed at the right one of the four,
//! so [`vga`] never has to know which terminal it's drawing for.

pub mod vga;

use spin::Mutex;

use crate::arch::x86::paging::{self, VGA_PHYS_ADDR};
use crate::error::KernelError;

pub const NUM_TERMINALS: usize = 3;
pub const INPUT_BUF_LEN: usize = 127;
/// Keyboard echo auto-wraps after this many columns — spec §4.5, distinct
/// from the VGA grid's full 80-column width.
pub const ECHO_WRAP_COLS: usize = 73;

pub type TerminalId = usize;

/// Off-screen backing pages for terminals 1 and 2 (terminal 0 starts
/// foreground and so starts out backed by the real VGA buffer instead).
/// Lives in the kernel's own identity-mapped region; its link-time address
/// doubles as the physical page handed to `paging::remap_terminal_video`.
static mut OFFSCREEN_PAGES: [[u16; vga::COLS * vga::ROWS]; NUM_TERMINALS] =
    [[0; vga::COLS * vga::ROWS]; NUM_TERMINALS];

struct Terminal {
    cursor_row: usize,
    cursor_col: usize,
    /// Physical page currently backing this terminal: `VGA_PHYS_ADDR` while
    /// foreground, this terminal's own off-screen page otherwise.
    phys_page: u32,
    visible: bool,
    input: [u8; INPUT_BUF_LEN],
    input_len: usize,
    /// Set by the keyboard handler on Enter, cleared once `terminal_read`
    /// consumes the line — spec §3 "enter flag".
    line_ready: bool,
    /// True if the write cursor is sitting just past a wrap, so a
    /// subsequent backspace knows to step back up a row.
    at_wrap: bool,
}

impl Terminal {
    const fn new(phys_page: u32, visible: bool) -> Self {
        Self {
            cursor_row: 0,
            cursor_col: 0,
            phys_page,
            visible,
            input: [0; INPUT_BUF_LEN],
            input_len: 0,
            line_ready: false,
            at_wrap: false,
        }
    }

    fn offscreen_addr(id: TerminalId) -> u32 {
        unsafe { core::ptr::addr_of!(OFFSCREEN_PAGES[id]) as u32 }
    }
}

struct Manager {
    terminals: [Terminal; NUM_TERMINALS],
    foreground: TerminalId,
    vidmap_installed: bool,
}

static MANAGER: Mutex<Manager> = Mutex::new(Manager {
    terminals: [
        Terminal::new(VGA_PHYS_ADDR, true),
        // Placeholder phys_page; `init()` fixes these up to each
        // terminal's real off-screen buffer address, which isn't known at
        // const-eval time.
        Terminal::new(0, false),
        Terminal::new(0, false),
    ],
    foreground: 0,
    vidmap_installed: false,
});

/// # Safety
/// Must run once at boot, after `arch::x86::paging::init`.
pub unsafe fn init() {
    let mut mgr = MANAGER.lock();
    for id in 1..NUM_TERMINALS {
        mgr.terminals[id].phys_page = Terminal::offscreen_addr(id);
    }
    vga::clear(vga::DEFAULT_ATTR);
    paging::remap_terminal_video(VGA_PHYS_ADDR, mgr.vidmap_installed);
}

/// Called once per scheduler tick with the terminal slot of the process
/// about to run, so the shared VGA window follows whoever is executing —
/// spec §4.6.
///
/// # Safety
/// Must run with interrupts disabled, as part of the scheduler's critical
/// section.
pub unsafe fn on_schedule(running: TerminalId) {
    let mgr = MANAGER.lock();
    paging::remap_terminal_video(mgr.terminals[running].phys_page, mgr.vidmap_installed);
}

pub fn current_foreground() -> TerminalId {
    MANAGER.lock().foreground
}

pub fn is_foreground(id: TerminalId) -> bool {
    MANAGER.lock().foreground == id
}

/// The physical page a fresh `vidmap()` call should expose — spec §4.4.
pub fn phys_page_for(id: TerminalId) -> u32 {
    MANAGER.lock().terminals[id].phys_page
}

pub fn mark_vidmap_installed() {
    MANAGER.lock().vidmap_installed = true;
}

/// Alt+F1/F2/F3 — spec §4.5. Blits the outgoing terminal's on-screen content
/// into its own off-screen page, restores the incoming terminal's saved
/// content onto the real VGA buffer, and re-homes the shared video window.
///
/// # Safety
/// Must run with interrupts disabled; `running` must be the terminal slot of
/// whichever process is currently scheduled, so the window is left correct
/// for it.
pub unsafe fn switch_foreground(new_id: TerminalId, running: TerminalId) {
    let mut mgr = MANAGER.lock();
    let old_id = mgr.foreground;
    if old_id == new_id {
        return;
    }

    let old_dst = Terminal::offscreen_addr(old_id) as *mut u16;
    vga::blit(old_dst, VGA_PHYS_ADDR as *const u16);

    let new_src = Terminal::offscreen_addr(new_id) as *const u16;
    vga::blit(VGA_PHYS_ADDR as *mut u16, new_src);

    mgr.terminals[old_id].visible = false;
    mgr.terminals[old_id].phys_page = Terminal::offscreen_addr(old_id);
    mgr.terminals[new_id].visible = true;
    mgr.terminals[new_id].phys_page = VGA_PHYS_ADDR;
    mgr.foreground = new_id;

    vga::set_hardware_cursor(
        mgr.terminals[new_id].cursor_row,
        mgr.terminals[new_id].cursor_col,
    );

    paging::remap_terminal_video(mgr.terminals[running].phys_page, mgr.vidmap_installed);
}

/// Ctrl+L target, fatal-exception handling and panic cleanup — spec §4.5,
/// §7. Clears the foreground terminal's content and resets its cursor.
pub fn clear_foreground() {
    let mut mgr = MANAGER.lock();
    let fg = mgr.foreground;
    vga::clear(vga::DEFAULT_ATTR);
    mgr.terminals[fg].cursor_row = 0;
    mgr.terminals[fg].cursor_col = 0;
    mgr.terminals[fg].at_wrap = false;
    vga::set_hardware_cursor(0, 0);
}

/// Append one echoed character to `id`'s line buffer and advance its
/// cursor, wrapping at [`ECHO_WRAP_COLS`] — called by the keyboard driver on
/// every printable key. Drops the byte once the buffer holds 127
/// characters, per spec §3.
pub fn push_input_char(id: TerminalId, byte: u8) {
    let mut mgr = MANAGER.lock();
    if mgr.terminals[id].input_len >= INPUT_BUF_LEN {
        return;
    }
    let idx = mgr.terminals[id].input_len;
    mgr.terminals[id].input[idx] = byte;
    mgr.terminals[id].input_len += 1;
    echo_and_advance(&mut mgr.terminals[id], byte, id == mgr.foreground);
}

/// Backspace: drop the last buffered character (including a trailing
/// newline) and move the cursor back one cell — spec §4.5.
pub fn backspace(id: TerminalId) {
    let mut mgr = MANAGER.lock();
    if mgr.terminals[id].input_len == 0 {
        return;
    }
    mgr.terminals[id].input_len -= 1;
    let foreground = id == mgr.foreground;
    let term = &mut mgr.terminals[id];
    if term.cursor_col == 0 {
        if term.cursor_row > 0 {
            term.cursor_row -= 1;
            term.cursor_col = vga::COLS - 1;
        }
    } else {
        term.cursor_col -= 1;
    }
    vga::put_cell(term.cursor_row, term.cursor_col, b' ', vga::DEFAULT_ATTR);
    if foreground {
        vga::set_hardware_cursor(term.cursor_row, term.cursor_col);
    }
}

/// Enter: append `\n` to the line buffer and mark it ready for the next
/// `terminal_read` — spec §4.5, §3.
pub fn commit_line(id: TerminalId) {
    let mut mgr = MANAGER.lock();
    if mgr.terminals[id].input_len < INPUT_BUF_LEN {
        let idx = mgr.terminals[id].input_len;
        mgr.terminals[id].input[idx] = b'\n';
        mgr.terminals[id].input_len += 1;
    }
    let foreground = id == mgr.foreground;
    echo_and_advance(&mut mgr.terminals[id], b'\n', foreground);
    mgr.terminals[id].line_ready = true;
}

/// Ctrl+L: clear the foreground terminal and discard its in-progress line —
/// spec §4.5.
pub fn clear_and_reset_input(id: TerminalId) {
    {
        let mut mgr = MANAGER.lock();
        mgr.terminals[id].input_len = 0;
        mgr.terminals[id].line_ready = false;
    }
    clear_foreground();
}

// `vga::*` always targets the shared window, which the scheduler and
// `switch_foreground` keep pointed at `term`'s own physical page whether or
// not it is foreground — so cells are written unconditionally here.
// `foreground` only gates the single shared hardware cursor register.
fn echo_and_advance(term: &mut Terminal, byte: u8, foreground: bool) {
    if byte == b'\n' {
        term.cursor_row += 1;
        term.cursor_col = 0;
        term.at_wrap = false;
    } else {
        vga::put_cell(term.cursor_row, term.cursor_col, byte, vga::DEFAULT_ATTR);
        term.cursor_col += 1;
        if term.cursor_col >= ECHO_WRAP_COLS {
            term.cursor_col = 0;
            term.cursor_row += 1;
            term.at_wrap = true;
        }
    }
    if term.cursor_row >= vga::ROWS {
        vga::scroll_up(vga::DEFAULT_ATTR);
        term.cursor_row = vga::ROWS - 1;
    }
    if foreground {
        vga::set_hardware_cursor(term.cursor_row, term.cursor_col);
    }
}

/// `read` on a terminal fd (stdin) — blocks until Enter has been pressed
/// AND this terminal is the foreground one, then copies the completed line
/// (including its trailing `\n`) out and resets the line buffer. Spec
/// §4.5: "blocks ... until the current process's terminal has `enterFlag`
/// set AND the buffer is non-empty AND the process is running on the
/// foreground terminal." Without the foreground check, a background
/// terminal whose line became ready just before an Alt+Fn switch away from
/// it would wrongly complete the read instead of continuing to block until
/// it is foreground again.
pub fn terminal_read(id: TerminalId, buf: &mut [u8]) -> Result<usize, KernelError> {
    loop {
        {
            let mut mgr = MANAGER.lock();
            if mgr.terminals[id].line_ready && mgr.foreground == id {
                let len = mgr.terminals[id].input_len.min(buf.len());
                buf[..len].copy_from_slice(&mgr.terminals[id].input[..len]);
                mgr.terminals[id].input_len = 0;
                mgr.terminals[id].line_ready = false;
                return Ok(len);
            }
        }
        crate::arch::x86::enable_interrupts_and_halt_once();
    }
}

/// `write` on a terminal fd (stdout) — spec §4.3: "writes from background
/// processes land in the off-screen page; writes from the foreground
/// process update the real VGA buffer and the cursor." Both cases write
/// through the same shared virtual window, which the scheduler/switch code
/// keeps pointed at the right physical page for `id`.
pub fn terminal_write(id: TerminalId, is_foreground: bool, buf: &[u8]) {
    let mut mgr = MANAGER.lock();
    for &byte in buf {
        echo_and_advance(&mut mgr.terminals[id], byte, is_foreground);
    }
}
