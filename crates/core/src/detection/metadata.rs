//! Locates the boundary between executable code and the compiler-appended metadata blob.
//!
//! Solidity always emits `REVERT INVALID` (`0xfd 0xfe`) right before the CBOR metadata it appends
//! to every contract. Finding that pair at or before the point where two bytecodes diverge is
//! taken as evidence that they differ only in their metadata hash.
//!
//! This is a heuristic. Hand-written bytecode may contain a bare `REVERT INVALID` pair anywhere.

use crate::Opcode;
use crate::decoder::decode;

/// Returns true if a `REVERT` immediately followed by `INVALID` starts before `position`.
///
/// Instructions are walked from offset 0 so `PUSH` immediates are never mistaken for opcodes.
/// The `INVALID` byte itself may lie at `position`. Any byte sequence is accepted.
///
/// # Arguments
/// * `code` - Raw or normalized bytecode.
/// * `position` - Byte offset where the comparison stopped matching.
pub fn is_matching_metadata_boundary(code: &[u8], position: usize) -> bool {
    decode(code)
        .take_while(|instruction| instruction.pc < position)
        .any(|instruction| is_revert_invalid(code, instruction.pc, instruction.op))
}

/// Returns the byte offset immediately after the first `REVERT INVALID` pair, i.e. where the
/// metadata is expected to start.
pub fn find_metadata_boundary(code: &[u8]) -> Option<usize> {
    decode(code)
        .find(|instruction| is_revert_invalid(code, instruction.pc, instruction.op))
        .map(|instruction| {
            tracing::trace!("metadata boundary found at pc {}", instruction.pc);
            instruction.pc + 2
        })
}

fn is_revert_invalid(code: &[u8], pc: usize, op: Opcode) -> bool {
    op == Opcode::REVERT
        && code
            .get(pc + 1)
            .is_some_and(|&next| Opcode::from(next) == Opcode::INVALID)
}
