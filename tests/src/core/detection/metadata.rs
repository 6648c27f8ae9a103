use sleuth_core::detection::{find_metadata_boundary, is_matching_metadata_boundary};

// Runtime code tail emitted by solc: `PUSH1 0 DUP1 REVERT INVALID` then the CBOR trailer
const CODE: &str = "6080604052600080fdfea2646970667358221220";

fn code() -> Vec<u8> {
    hex::decode(CODE).unwrap()
}

#[test]
fn test_boundary_found_after_revert_invalid() {
    let code = code();
    assert_eq!(find_metadata_boundary(&code), Some(10));
    assert!(is_matching_metadata_boundary(&code, 10));
    assert!(is_matching_metadata_boundary(&code, code.len()));
}

#[test]
fn test_position_before_revert() {
    let code = code();
    assert!(!is_matching_metadata_boundary(&code, 8));
    assert!(is_matching_metadata_boundary(&code, 9));
}

#[test]
fn test_position_past_end_is_accepted() {
    assert!(is_matching_metadata_boundary(&code(), usize::MAX));
    assert!(!is_matching_metadata_boundary(&[], usize::MAX));
}

#[test]
fn test_garbage_input_never_panics() {
    let garbage: Vec<u8> = (0..=255u8).rev().collect();
    let _ = is_matching_metadata_boundary(&garbage, garbage.len());
    let _ = find_metadata_boundary(&garbage);

    // Trailing PUSH32 with no immediates
    assert!(!is_matching_metadata_boundary(&[0x7f], 100));
}
