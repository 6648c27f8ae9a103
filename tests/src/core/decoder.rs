use sleuth_core::Opcode;
use sleuth_core::decoder::decode;
use sleuth_core::opcode::opcode_length;

// Fixture: PUSH1 0x01, PUSH1 0x02, ADD, PUSH1 0x00, JUMPI
const BYTECODE: &str = "0x6001600201600057";

#[test]
fn test_decode_fixture() {
    let bytes = hex::decode(BYTECODE.trim_start_matches("0x")).unwrap();
    let instructions: Vec<_> = decode(&bytes).collect();
    for instruction in &instructions {
        tracing::debug!("{}", instruction);
    }

    assert_eq!(instructions.len(), 5);
    assert!(matches!(instructions[2].op, Opcode::ADD));
    assert!(matches!(instructions[4].op, Opcode::JUMPI));
    assert_eq!(instructions[4].pc, 7);

    let total: usize = instructions.iter().map(|i| i.byte_size()).sum();
    assert_eq!(total, bytes.len());
}

#[test]
fn test_opcode_lengths() {
    assert_eq!(opcode_length(0x00), 1);
    assert_eq!(opcode_length(0x5f), 1);
    assert_eq!(opcode_length(0x60), 2);
    assert_eq!(opcode_length(0x73), 21);
    assert_eq!(opcode_length(0x7f), 33);
    assert_eq!(opcode_length(0x80), 1);
    assert_eq!(opcode_length(0xef), 1);
}

#[test]
fn test_every_byte_decodes() {
    let all: Vec<u8> = (0..=255).collect();
    let mut pc = 0;
    for instruction in decode(&all) {
        assert_eq!(instruction.pc, pc);
        assert!(instruction.byte_size() >= 1);
        pc += instruction.byte_size();
    }
    assert_eq!(pc, all.len());
}

#[test]
fn test_marker_bytes_decode_to_unified_opcodes() {
    let code = [0x73, 0xfd, 0xfe];
    let instructions: Vec<_> = decode(&code).collect();

    // PUSH20 swallows both markers as its (truncated) immediate
    assert_eq!(instructions.len(), 1);
    assert!(matches!(instructions[0].op, Opcode::PUSH(20)));
    assert_eq!(instructions[0].imm, &[0xfd, 0xfe]);

    let ops: Vec<_> = decode(&code[1..]).map(|i| i.op).collect();
    assert!(matches!(ops[..], [Opcode::REVERT, Opcode::INVALID]));
    assert_eq!(ops[0].to_byte(), 0xfd);
    assert_eq!(ops[1].to_byte(), 0xfe);
}
