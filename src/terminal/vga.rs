//! Raw VGA text-mode cell grid — spec §4.5, §6.
//!
//! Every read/write goes through [`arch::x86::paging::VGA_WINDOW_VIRT_ADDR`],
//! a single virtual window the paging layer keeps pointed at the right
//! physical 4 KiB page (real hardware for the foreground terminal, an
//! off-screen buffer otherwise). This module never knows which one it is.

use crate::arch::x86::paging::VGA_WINDOW_VIRT_ADDR;
use crate::arch::x86::ports::outb;

pub const COLS: usize = 80;
pub const ROWS: usize = 25;
pub const DEFAULT_ATTR: u8 = 0x07;

const CRTC_INDEX_PORT: u16 = 0x3d4;
const CRTC_DATA_PORT: u16 = 0x3d5;
const CRTC_CURSOR_HIGH: u8 = 0x0e;
const CRTC_CURSOR_LOW: u8 = 0x0f;

fn window() -> *mut u16 {
    VGA_WINDOW_VIRT_ADDR as *mut u16
}

/// Write one cell. No bounds enforcement beyond the grid size — callers
/// (terminal write logic) are responsible for row/col bookkeeping.
pub fn put_cell(row: usize, col: usize, byte: u8, attr: u8) {
    let offset = row * COLS + col;
    let cell = (attr as u16) << 8 | byte as u16;
    unsafe {
        core::ptr::write_volatile(window().add(offset), cell);
    }
}

pub fn clear(attr: u8) {
    for row in 0..ROWS {
        for col in 0..COLS {
            put_cell(row, col, b' ', attr);
        }
    }
}

/// Shift every row up by one, blanking the last row. Called when a write
/// advances past the last row.
pub fn scroll_up(attr: u8) {
    unsafe {
        let base = window();
        for row in 1..ROWS {
            for col in 0..COLS {
                let cell = core::ptr::read_volatile(base.add(row * COLS + col));
                core::ptr::write_volatile(base.add((row - 1) * COLS + col), cell);
            }
        }
    }
    for col in 0..COLS {
        put_cell(ROWS - 1, col, b' ', attr);
    }
}

/// Copy the entire 80x25 grid between two physical/virtual 4 KiB buffers.
/// Used by the terminal switch to blit content in and out of the real VGA
/// buffer — spec §4.5: "its saved cursor position and visible video page are
/// restored".
///
/// # Safety
/// `dst` and `src` must each point at a live, owned 4 KiB buffer (the real
/// VGA buffer or a terminal's off-screen page).
pub unsafe fn blit(dst: *mut u16, src: *const u16) {
    core::ptr::copy_nonoverlapping(src, dst, COLS * ROWS);
}

/// Push the hardware text-mode cursor to `(row, col)`. Only meaningful while
/// the caller's terminal is actually foreground.
pub fn set_hardware_cursor(row: usize, col: usize) {
    let pos = (row * COLS + col) as u16;
    unsafe {
        outb(CRTC_INDEX_PORT, CRTC_CURSOR_HIGH);
        outb(CRTC_DATA_PORT, (pos >> 8) as u8);
        outb(CRTC_INDEX_PORT, CRTC_CURSOR_LOW);
        outb(CRTC_DATA_PORT, (pos & 0xff) as u8);
    }
}
