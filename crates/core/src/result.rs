//! Core results and error types

use thiserror::Error;

/// Core error type encompassing all core module errors.
///
/// An unmatched bytecode is not an error: lookups report it as `Ok(None)`.
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to decode hex string.
    #[error("hex decode failed: {0}")]
    HexDecode(#[from] hex::FromHexError),

    /// The trie reported a registered word at a node that carries no bytecode.
    ///
    /// Indicates a bug in the identifier, not bad input.
    #[error("internal consistency fault: present trie node after {prefix_len} hex chars has no bytecode")]
    InternalConsistency {
        /// Hex digits consumed before the offending node's edge.
        prefix_len: usize,
    },

    /// A link placeholder in an unlinked compiler object is truncated or malformed.
    #[error("malformed link placeholder at hex offset {0}")]
    InvalidLinkPlaceholder(usize),

    /// A declared library or immutable region does not fit inside the registered code.
    #[error("region at offset {offset} (len {length}) exceeds code length {code_len}")]
    RegionOutOfBounds {
        /// Byte offset of the region.
        offset: usize,
        /// Byte length of the region.
        length: usize,
        /// Length of the code the region was declared for.
        code_len: usize,
    },
}

/// Core result type
pub type Result<T> = std::result::Result<T, Error>;
