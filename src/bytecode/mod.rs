//! Bytecode instruction encoding on top of regions.
//!
//! The interpreter reads a compact variable-length instruction set. The first byte of every
//! instruction carries a 4-bit primary [`Opcode`] in its high nibble; the low nibble is either
//! a small inline operand or, for the three extended pages, a sub-opcode:
//!
//! | Page          | Sub-opcodes    | Payload after the first byte |
//! |---------------|----------------|------------------------------|
//! | `Extended1`   | [`OpcodeEx1`]  | none                         |
//! | `Extended2`   | [`OpcodeEx2`]  | 8 bits                       |
//! | `Extended3`   | [`OpcodeEx3`]  | 16 bits, little-endian       |
//!
//! # Key Components
//!
//! - [`InstructionWriter`] - Emits instructions, relative branches and calls into a region
//! - [`ShortCallTable`] - Table of `(function, argc)` entries called by small index
//! - [`Opcode`], [`OpcodeEx1`], [`OpcodeEx2`], [`OpcodeEx3`], [`NumOp`], [`BitOp`] - The
//!   instruction set
//!
//! # Forward References
//!
//! Branch targets and call targets are [`crate::Resolvable`] offsets. A target that is placed
//! later in the region is written as a placeholder and patched during flattening, so code is
//! emitted in a single pass without knowing where jumps land.
//!
//! Instruction *selection* is the caller's concern. The writer does not pick between the
//! 8-bit and 16-bit branch forms; a branch whose distance does not fit fails loud.

mod opcodes;
mod shortcall;
mod writer;

pub use opcodes::{BitOp, Nibble, NumOp, Opcode, OpcodeEx1, OpcodeEx2, OpcodeEx3};
pub use shortcall::{ShortCallTable, SHORT_CALL_ENTRY_SIZE};
pub use writer::InstructionWriter;
