//! Bytecode normalization.
//!
//! Compiled code and the code observed on chain differ in regions that are filled in after
//! compilation: linked library addresses, immutable values and, for libraries, the library's own
//! address pushed by its call protection. Zeroing those regions on both sides makes structurally
//! identical code compare equal.

use crate::Opcode;
use crate::opcode::LIBRARY_ADDRESS_PUSH;
use crate::result::{Error, Result};
use serde::{Deserialize, Serialize};

/// Byte length of an address embedded in code.
pub const ADDRESS_LENGTH_BYTES: usize = 20;

/// Hex length of a solc link placeholder (`__$<34 hex chars>$__` or `__<path:name padded>__`).
pub const LINK_PLACEHOLDER_HEX_LENGTH: usize = 2 * ADDRESS_LENGTH_BYTES;

/// A byte range in code holding the value of an immutable variable.
///
/// Deserializes from solc's `immutableReferences` entries (`{ "start": .., "length": .. }`).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImmutableReference {
    /// Byte offset of the slot.
    #[serde(alias = "start")]
    pub offset: usize,
    /// Byte length of the slot.
    pub length: usize,
}

impl ImmutableReference {
    pub fn new(offset: usize, length: usize) -> Self {
        Self { offset, length }
    }

    /// One past the last byte of the slot.
    pub fn end(self) -> usize {
        self.offset + self.length
    }
}

/// Zeroes the 20-byte address at each of `positions`.
///
/// Regions are clamped to the code length.
pub fn zero_out_addresses(code: &[u8], positions: &[usize]) -> Vec<u8> {
    let mut out = code.to_vec();
    for &position in positions {
        zero_region(&mut out, position, ADDRESS_LENGTH_BYTES);
    }
    out
}

/// Zeroes each of the `slices`.
///
/// Regions are clamped to the code length.
pub fn zero_out_slices(code: &[u8], slices: &[ImmutableReference]) -> Vec<u8> {
    let mut out = code.to_vec();
    for slice in slices {
        zero_region(&mut out, slice.offset, slice.length);
    }
    out
}

/// Canonicalizes library runtime code.
///
/// Since solc 0.4.20 a deployed library starts with `PUSH20 <its own address>` to reject calls
/// that are not delegate calls. That address is only known at deployment, so it is zeroed.
/// Code not starting with `PUSH20` is returned unchanged.
pub fn normalize_library_runtime_bytecode_if_necessary(code: &[u8]) -> Vec<u8> {
    if code.first().map(|&byte| Opcode::from(byte)) == Some(LIBRARY_ADDRESS_PUSH) {
        zero_out_addresses(code, &[1])
    } else {
        code.to_vec()
    }
}

/// Checks that every declared region fits inside `code_len` bytes.
pub fn validate_regions(
    code_len: usize,
    library_address_positions: &[usize],
    immutable_references: &[ImmutableReference],
) -> Result<()> {
    let regions = library_address_positions
        .iter()
        .map(|&offset| (offset, ADDRESS_LENGTH_BYTES))
        .chain(immutable_references.iter().map(|r| (r.offset, r.length)));

    for (offset, length) in regions {
        if offset.checked_add(length).is_none_or(|end| end > code_len) {
            return Err(Error::RegionOutOfBounds {
                offset,
                length,
                code_len,
            });
        }
    }
    Ok(())
}

/// Returns the byte offsets of all link placeholders in an unlinked hex object.
///
/// A placeholder is any 40-character run starting and ending with `__`. Its contents are not
/// interpreted, which covers both the legacy `__path:Name____` and the hashed `__$..$__` forms.
pub fn link_placeholder_positions(unlinked_hex: &str) -> Result<Vec<usize>> {
    let hex = unlinked_hex.strip_prefix("0x").unwrap_or(unlinked_hex);
    let bytes = hex.as_bytes();
    let mut positions = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'_' {
            i += 1;
            continue;
        }

        let end = i + LINK_PLACEHOLDER_HEX_LENGTH;
        let well_formed = i % 2 == 0
            && end <= bytes.len()
            && bytes[i + 1] == b'_'
            && bytes[end - 2..end] == *b"__";
        if !well_formed {
            return Err(Error::InvalidLinkPlaceholder(i));
        }

        positions.push(i / 2);
        i = end;
    }

    Ok(positions)
}

/// Decodes an unlinked hex object, replacing every link placeholder with a zero address.
///
/// Returns the decoded bytes together with the byte offsets of the placeholders.
pub fn zero_link_placeholders(unlinked_hex: &str) -> Result<(Vec<u8>, Vec<usize>)> {
    let hex = unlinked_hex.strip_prefix("0x").unwrap_or(unlinked_hex);
    let positions = link_placeholder_positions(hex)?;

    let mut linked = hex.to_string();
    for &position in &positions {
        let start = position * 2;
        linked.replace_range(
            start..start + LINK_PLACEHOLDER_HEX_LENGTH,
            &"0".repeat(LINK_PLACEHOLDER_HEX_LENGTH),
        );
    }

    let code = hex::decode(crate::normalize_hex_string(&linked)?)?;
    Ok((code, positions))
}

fn zero_region(code: &mut [u8], offset: usize, length: usize) {
    let start = offset.min(code.len());
    let end = offset.saturating_add(length).min(code.len());
    code[start..end].fill(0);
}
