//! Process model — spec §3, §4.1.
//!
//! No-alloc analogue of the ambient stack's process table
//! (`doublegate-VeridianOS`'s `process::table::ProcessTable` over a fixed
//! array when its `alloc` feature is off): six PCBs, each living at the
//! base of its own 8 KiB kernel stack slot rather than in a heap-allocated
//! table, since this kernel carries no allocator at all.

pub mod pcb;
pub mod table;

pub use pcb::Pcb;
pub use table::{alloc_pid, current_pcb, free_pid, pcb_mut, MAX_PROCESSES};

pub fn init() {
    table::init();
}
