//! PS/2 keyboard driver — spec §4.5, §9.
//!
//! Scancodes from I/O port 0x60 are decoded with `pc_keyboard`'s scan-code
//! set 1 state machine (the same crate and pattern the ambient stack's
//! keyboard driver uses for modifier tracking and multi-byte sequences);
//! the resulting key identity is then run through a deliberately
//! hand-rolled 4-mode ASCII table (regular/caps/shift/caps+shift) instead of
//! trusting the crate's own Unicode mapping, because the source this
//! subsystem is modeled on inverts letter case under caps+shift — preserved
//! here rather than "fixed", per spec §9.

use core::sync::atomic::{AtomicBool, Ordering};

use pc_keyboard::{KeyCode, KeyEvent, KeyState, Keyboard, ScancodeSet1};
use spin::Mutex;

use crate::arch::x86::ports::inb;
use crate::terminal::{self, TerminalId};

const DATA_PORT: u16 = 0x60;

static SHIFT: AtomicBool = AtomicBool::new(false);
static CTRL: AtomicBool = AtomicBool::new(false);
static ALT: AtomicBool = AtomicBool::new(false);
static CAPS_LOCK: AtomicBool = AtomicBool::new(false);

static KEYBOARD: Mutex<Option<Keyboard<pc_keyboard::layouts::Us104Key, ScancodeSet1>>> =
    Mutex::new(None);

/// # Safety
/// Must run once at boot, after `arch::x86::pic::PICS` has been initialized.
pub unsafe fn init() {
    *KEYBOARD.lock() = Some(Keyboard::new(
        ScancodeSet1::new(),
        pc_keyboard::layouts::Us104Key,
        pc_keyboard::HandleControl::Ignore,
    ));
    crate::arch::x86::pic::PICS
        .lock()
        .clear_mask(crate::arch::x86::pic::IRQ_KEYBOARD);
}

/// IRQ1 handler body — spec §4.5.
pub fn on_interrupt() {
    let scancode = unsafe { inb(DATA_PORT) };
    let mut guard = KEYBOARD.lock();
    let event = guard.as_mut().and_then(|kb| kb.add_byte(scancode).ok().flatten());
    drop(guard);
    if let Some(event) = event {
        handle_event(event);
    }
}

fn handle_event(event: KeyEvent) {
    let down = event.state == KeyState::Down;
    match event.code {
        KeyCode::LShift | KeyCode::RShift => {
            SHIFT.store(down, Ordering::Relaxed);
            return;
        }
        KeyCode::LControl | KeyCode::RControl => {
            CTRL.store(down, Ordering::Relaxed);
            return;
        }
        KeyCode::LAlt => {
            ALT.store(down, Ordering::Relaxed);
            return;
        }
        KeyCode::CapsLock if down => {
            let prev = CAPS_LOCK.load(Ordering::Relaxed);
            CAPS_LOCK.store(!prev, Ordering::Relaxed);
            return;
        }
        _ => {}
    }

    if !down {
        return;
    }

    let fg = terminal::current_foreground();

    if ALT.load(Ordering::Relaxed) {
        match event.code {
            KeyCode::F1 => return switch_and_remap(fg, 0),
            KeyCode::F2 => return switch_and_remap(fg, 1),
            KeyCode::F3 => return switch_and_remap(fg, 2),
            _ => {}
        }
    }

    if CTRL.load(Ordering::Relaxed) {
        if matches!(event.code, KeyCode::L) {
            terminal::clear_and_reset_input(fg);
        }
        return;
    }

    match event.code {
        KeyCode::Backspace => terminal::backspace(fg),
        KeyCode::Return => terminal::commit_line(fg),
        KeyCode::Tab => terminal::push_input_char(fg, b'\t'),
        _ => {
            if let Some(byte) = resolve_ascii(event.code) {
                terminal::push_input_char(fg, byte);
            }
        }
    }
}

/// Alt+F1/F2/F3 — spec §4.5. The running process's terminal may or may not
/// be the one that just became foreground, so the video window is
/// re-homed for whichever is actually scheduled right now.
fn switch_and_remap(_old_fg: TerminalId, new_fg: TerminalId) {
    let running = crate::sched::current_terminal();
    unsafe {
        terminal::switch_foreground(new_fg, running);
    }
}

/// `mode` index: 0 regular, 1 caps, 2 shift, 3 caps+shift — spec §9.
fn current_mode() -> usize {
    let shift = SHIFT.load(Ordering::Relaxed);
    let caps = CAPS_LOCK.load(Ordering::Relaxed);
    match (caps, shift) {
        (false, false) => 0,
        (true, false) => 1,
        (false, true) => 2,
        (true, true) => 3,
    }
}

/// Resolve a decoded key to the ASCII byte the given mode produces.
/// Letters under mode 3 (caps+shift) deliberately come out lowercase,
/// matching mode 0 rather than producing uppercase — spec §9 Open
/// Question, preserved rather than corrected.
fn resolve_ascii(code: KeyCode) -> Option<u8> {
    let mode = current_mode();
    if let Some(letter) = letter_base(code) {
        return Some(match mode {
            1 | 2 => letter.to_ascii_uppercase(),
            _ => letter.to_ascii_lowercase(),
        });
    }
    symbol_for_mode(code, mode)
}

fn letter_base(code: KeyCode) -> Option<u8> {
    let ch = match code {
        KeyCode::A => b'a',
        KeyCode::B => b'b',
        KeyCode::C => b'c',
        KeyCode::D => b'd',
        KeyCode::E => b'e',
        KeyCode::F => b'f',
        KeyCode::G => b'g',
        KeyCode::H => b'h',
        KeyCode::I => b'i',
        KeyCode::J => b'j',
        KeyCode::K => b'k',
        KeyCode::L => b'l',
        KeyCode::M => b'm',
        KeyCode::N => b'n',
        KeyCode::O => b'o',
        KeyCode::P => b'p',
        KeyCode::Q => b'q',
        KeyCode::R => b'r',
        KeyCode::S => b's',
        KeyCode::T => b't',
        KeyCode::U => b'u',
        KeyCode::V => b'v',
        KeyCode::W => b'w',
        KeyCode::X => b'x',
        KeyCode::Y => b'y',
        KeyCode::Z => b'z',
        _ => return None,
    };
    Some(ch)
}

/// Non-letter printable keys: mode 2/3 (shift held) gives the shifted
/// glyph, mode 0/1 the bare one — caps lock has no effect on symbols,
/// matching the source table's "caps" and "regular" rows being identical
/// outside the alphabet.
fn symbol_for_mode(code: KeyCode, mode: usize) -> Option<u8> {
    let shifted = mode == 2 || mode == 3;
    let pair = match code {
        KeyCode::Key1 => (b'1', b'!'),
        KeyCode::Key2 => (b'2', b'@'),
        KeyCode::Key3 => (b'3', b'#'),
        KeyCode::Key4 => (b'4', b'$'),
        KeyCode::Key5 => (b'5', b'%'),
        KeyCode::Key6 => (b'6', b'^'),
        KeyCode::Key7 => (b'7', b'&'),
        KeyCode::Key8 => (b'8', b'*'),
        KeyCode::Key9 => (b'9', b'('),
        KeyCode::Key0 => (b'0', b')'),
        KeyCode::Minus => (b'-', b'_'),
        KeyCode::Equals => (b'=', b'+'),
        KeyCode::LBracket => (b'[', b'{'),
        KeyCode::RBracket => (b']', b'}'),
        KeyCode::Semicolon => (b';', b':'),
        KeyCode::Quote => (b'\'', b'"'),
        KeyCode::Backtick => (b'`', b'~'),
        KeyCode::BackSlash => (b'\\', b'|'),
        KeyCode::Comma => (b',', b'<'),
        KeyCode::Fullstop => (b'.', b'>'),
        KeyCode::Slash => (b'/', b'?'),
        KeyCode::Spacebar => (b' ', b' '),
        _ => return None,
    };
    Some(if shifted { pair.1 } else { pair.0 })
}
