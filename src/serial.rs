//! COM1 16550 UART backend for kernel diagnostics.
//!
//! Separate from the three user-facing VGA terminals in `terminal/`: this
//! is where the kernel logs its own misbehavior (PCB exhaustion, FS parse
//! errors, unexpected scheduler states), never anything a process wrote.

use core::fmt;

use log::{Level, LevelFilter, Log, Metadata, Record};
use spin::Mutex;

use crate::arch::x86::ports::{inb, outb};

const COM1: u16 = 0x3f8;

struct SerialPort;

impl SerialPort {
    /// Program the UART for 38400 baud, 8 data bits, no parity, one stop bit.
    fn init(&self) {
        unsafe {
            outb(COM1 + 1, 0x00); // disable interrupts
            outb(COM1 + 3, 0x80); // enable DLAB
            outb(COM1, 0x03); // divisor low byte: 38400 baud
            outb(COM1 + 1, 0x00); // divisor high byte
            outb(COM1 + 3, 0x03); // 8N1, DLAB off
            outb(COM1 + 2, 0xc7); // enable FIFO, clear, 14-byte threshold
            outb(COM1 + 4, 0x0b); // IRQs enabled, RTS/DSR set
        }
    }

    fn write_byte(&mut self, byte: u8) {
        unsafe {
            while inb(COM1 + 5) & 0x20 == 0 {
                core::hint::spin_loop();
            }
            outb(COM1, byte);
        }
    }
}

impl fmt::Write for SerialPort {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            self.write_byte(byte);
        }
        Ok(())
    }
}

static PORT: Mutex<SerialPort> = Mutex::new(SerialPort);

pub fn init() {
    PORT.lock().init();
    // SAFETY: called exactly once at boot, before any other CPU activity
    // that could log concurrently (single core, interrupts not yet enabled).
    unsafe {
        log::set_logger_racy(&SerialLogger).expect("logger already installed");
    }
    log::set_max_level(LevelFilter::Trace);
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    use core::fmt::Write;
    PORT.lock().write_fmt(args).expect("serial write failed");
}

#[macro_export]
macro_rules! serial_print {
    ($($arg:tt)*) => ($crate::serial::_print(format_args!($($arg)*)));
}

#[macro_export]
macro_rules! serial_println {
    () => ($crate::serial_print!("\n"));
    ($($arg:tt)*) => ($crate::serial_print!("{}\n", format_args!($($arg)*)));
}

struct SerialLogger;

impl Log for SerialLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let level = match record.level() {
            Level::Error => "ERROR",
            Level::Warn => "WARN ",
            Level::Info => "INFO ",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        };
        serial_println!("[{}] {}", level, record.args());
    }

    fn flush(&self) {}
}
