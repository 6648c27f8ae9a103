//! Linear instruction walker over raw bytecode.
//!
//! Walking is purely syntactic: every byte starts an instruction unless it is the immediate of a
//! preceding `PUSH`. Nothing is rejected, so metadata blobs, constructor arguments or outright
//! garbage decode into a stream of (mostly `UNKNOWN`) one-byte instructions.

use crate::Opcode;
use crate::opcode::immediate_len;
use std::fmt;
use std::iter::FusedIterator;

/// Single decoded EVM instruction borrowing its immediate data from the code.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Instruction<'a> {
    /// Program counter (byte offset)
    pub pc: usize,
    /// Parsed opcode
    pub op: Opcode,
    /// Immediate bytes; shorter than the opcode demands if the code ends mid-`PUSH`
    pub imm: &'a [u8],
}

impl Instruction<'_> {
    /// Returns the byte size of this instruction as encoded in the code (1 for most opcodes,
    /// 1+N for PUSH(N), less if truncated).
    #[inline]
    pub fn byte_size(&self) -> usize {
        1 + self.imm.len()
    }
}

impl fmt::Display for Instruction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // pc: six-digit hex, opcode left-padded to 8 chars, then optional imm
        if self.imm.is_empty() {
            write!(f, "{:06x}  {}", self.pc, self.op)
        } else {
            let op = self.op.to_string();
            write!(f, "{:06x}  {:<8} {}", self.pc, op, hex::encode(self.imm))
        }
    }
}

/// Iterator over the instructions of a byte slice.
#[derive(Clone, Debug)]
pub struct Instructions<'a> {
    code: &'a [u8],
    pc: usize,
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Instruction<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let pc = self.pc;
        let op = Opcode::from(*self.code.get(pc)?);
        let imm_start = pc + 1;
        let imm_end = (imm_start + immediate_len(op)).min(self.code.len());
        self.pc = imm_start + immediate_len(op);

        Some(Instruction {
            pc,
            op,
            imm: &self.code[imm_start..imm_end],
        })
    }
}

impl FusedIterator for Instructions<'_> {}

/// Decodes `code` into an instruction iterator starting at offset 0.
pub fn decode(code: &[u8]) -> Instructions<'_> {
    Instructions { code, pc: 0 }
}
