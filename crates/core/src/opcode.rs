//! Instruction lengths over the unified `eot` opcode table.
//!
//! The identifier never executes code, it only needs to know how far to advance over each
//! instruction. Every byte value is accepted: bytes `eot` does not assign decode as
//! `UNKNOWN` and count as one-byte instructions, which is what a disassembler does with trailing
//! data such as the CBOR metadata blob.

use crate::Opcode;

/// The `PUSH20` that opens deployed library code, carrying the library's own address.
pub const LIBRARY_ADDRESS_PUSH: Opcode = Opcode::PUSH(20);

/// Number of immediate bytes that follow `op` in code.
#[inline]
pub fn immediate_len(op: Opcode) -> usize {
    match op {
        Opcode::PUSH(n) => n as usize,
        _ => 0,
    }
}

/// Encoded length of the instruction starting with `byte`: `1 + N` for `PUSHN`, 1 otherwise.
#[inline]
pub fn opcode_length(byte: u8) -> usize {
    1 + immediate_len(Opcode::from(byte))
}
