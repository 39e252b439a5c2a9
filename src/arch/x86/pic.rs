//! Master/slave 8259 PIC driver: mask/unmask IRQ lines and send EOI.
//!
//! Re-implemented against [`super::ports`] rather than depending on the
//! `pic8259` crate directly — see DESIGN.md for why (that crate pins a
//! dependency on the 64-bit `x86_64` register types, incompatible with this
//! kernel's 32-bit protected-mode target). The public shape (`ChainedPics`,
//! `initialize`, `notify_end_of_interrupt`) mirrors that crate's API so the
//! rest of the kernel reads the same as it would against the real
//! dependency.

use super::ports::{inb, outb};

const CMD_INIT: u8 = 0x11;
const CMD_EOI: u8 = 0x20;
const MODE_8086: u8 = 0x01;

/// Command/data port pair for one 8259.
struct Pic {
    command: u16,
    data: u16,
}

impl Pic {
    fn handles_interrupt(&self, offset: u8, interrupt_id: u8) -> bool {
        (offset..offset + 8).contains(&interrupt_id)
    }

    unsafe fn end_of_interrupt(&self) {
        outb(self.command, CMD_EOI);
    }

    unsafe fn read_mask(&self) -> u8 {
        inb(self.data)
    }

    unsafe fn write_mask(&self, mask: u8) {
        outb(self.data, mask);
    }
}

/// A master+slave 8259 pair remapped to `offset1`/`offset2`.
pub struct ChainedPics {
    master: Pic,
    slave: Pic,
    master_offset: u8,
    slave_offset: u8,
}

impl ChainedPics {
    pub const fn new(master_offset: u8, slave_offset: u8) -> Self {
        Self {
            master: Pic {
                command: 0x20,
                data: 0x21,
            },
            slave: Pic {
                command: 0xa0,
                data: 0xa1,
            },
            master_offset,
            slave_offset,
        }
    }

    /// Remap IRQ0..15 to vectors `master_offset..master_offset+16` and cascade
    /// the slave onto the master's IRQ2, per spec §6: "master/slave 8259 at
    /// 0x20/0xA0 and 0x21/0xA1".
    ///
    /// # Safety
    /// Must run once at boot, with interrupts disabled, before any IRQ line
    /// is unmasked.
    pub unsafe fn initialize(&mut self) {
        let saved_master_mask = self.master.read_mask();
        let saved_slave_mask = self.slave.read_mask();

        outb(self.master.command, CMD_INIT);
        io_wait();
        outb(self.slave.command, CMD_INIT);
        io_wait();

        outb(self.master.data, self.master_offset);
        io_wait();
        outb(self.slave.data, self.slave_offset);
        io_wait();

        outb(self.master.data, 4); // slave attached to master's IRQ2
        io_wait();
        outb(self.slave.data, 2); // slave's cascade identity
        io_wait();

        outb(self.master.data, MODE_8086);
        io_wait();
        outb(self.slave.data, MODE_8086);
        io_wait();

        self.master.write_mask(saved_master_mask);
        self.slave.write_mask(saved_slave_mask);
    }

    /// # Safety
    /// `interrupt_id` must be a vector this PIC pair actually owns.
    pub unsafe fn notify_end_of_interrupt(&mut self, interrupt_id: u8) {
        if self.slave.handles_interrupt(self.slave_offset, interrupt_id) {
            self.slave.end_of_interrupt();
        }
        // Cascaded slave interrupts still require a master EOI.
        self.master.end_of_interrupt();
    }

    /// # Safety
    /// Must only be called with interrupts disabled (spec §5: shared PIC
    /// state is accessed only with IF clear).
    pub unsafe fn set_mask(&mut self, irq_line: u8) {
        if irq_line < 8 {
            let mask = self.master.read_mask() | (1 << irq_line);
            self.master.write_mask(mask);
        } else if irq_line < 16 {
            let mask = self.slave.read_mask() | (1 << (irq_line - 8));
            self.slave.write_mask(mask);
        }
        // IRQ numbers outside 0..15 are silently ignored, per spec §7.
    }

    /// # Safety
    /// Must only be called with interrupts disabled.
    pub unsafe fn clear_mask(&mut self, irq_line: u8) {
        if irq_line < 8 {
            let mask = self.master.read_mask() & !(1 << irq_line);
            self.master.write_mask(mask);
        } else if irq_line < 16 {
            let mask = self.slave.read_mask() & !(1 << (irq_line - 8));
            self.slave.write_mask(mask);
        }
    }
}

/// A throwaway write to an unused port, used to give the PIC time to react
/// to the previous command on real hardware.
unsafe fn io_wait() {
    outb(0x80, 0);
}

pub static PICS: spin::Mutex<ChainedPics> = spin::Mutex::new(ChainedPics::new(0x20, 0x28));

/// PIT is IRQ0, keyboard is IRQ1, RTC is IRQ8 (through the slave) — spec §5.
pub const IRQ_PIT: u8 = 0;
pub const IRQ_KEYBOARD: u8 = 1;
pub const IRQ_RTC: u8 = 8;

pub const PIT_VECTOR: u8 = 0x20 + IRQ_PIT;
pub const KEYBOARD_VECTOR: u8 = 0x20 + IRQ_KEYBOARD;
pub const RTC_VECTOR: u8 = 0x28 + (IRQ_RTC - 8);
