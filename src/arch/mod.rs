//! Architecture layer. Only `x86` (32-bit protected mode) is implemented;
//! the module split mirrors the teacher crate's `arch::<target>` layout so a
//! second backend could be added the same way without disturbing callers.

pub mod x86;
