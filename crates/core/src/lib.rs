pub mod bytecode;
pub mod decoder;
pub mod detection;
pub mod hex_bytes;
pub mod identifier;
pub mod normalize;
pub mod opcode;
pub mod radix;
pub mod result;
pub mod trace;

pub use eot::UnifiedOpcode as Opcode;

pub use bytecode::{Bytecode, BytecodeKind, ContractIdentity};
pub use hex_bytes::HexBytes;
pub use identifier::{ContractsIdentifier, IdentifierConfig, MetadataScanBound, MetadataTieBreak};
pub use normalize::ImmutableReference;
pub use result::{Error, Result};
pub use trace::{EvmMessageTrace, TraceKind};

use std::sync::Arc;

/// Strips an optional `0x` prefix and lowercases a hex string.
///
/// Fails on odd length, since every byte takes two digits.
pub fn normalize_hex_string(input: &str) -> std::result::Result<String, hex::FromHexError> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.len() % 2 != 0 {
        return Err(hex::FromHexError::OddLength);
    }
    Ok(digits.to_ascii_lowercase())
}

/// Builds an identifier and registers `bytecodes` in order.
///
/// # Example
/// ```
/// use sleuth_core::{
///     Bytecode, BytecodeKind, ContractIdentity, EvmMessageTrace, IdentifierConfig,
///     index_bytecodes,
/// };
/// use std::sync::Arc;
///
/// let token = Bytecode::from_unlinked_hex(
///     ContractIdentity::new("contracts/Token.sol", "Token"),
///     BytecodeKind::Runtime,
///     "0x6001",
///     vec![],
/// )
/// .unwrap();
/// let identifier = index_bytecodes(IdentifierConfig::default(), [Arc::new(token)]);
///
/// let found = identifier.identify(&EvmMessageTrace::call(vec![0x60, 0x01])).unwrap();
/// assert_eq!(found.unwrap().identity().name, "Token");
/// ```
pub fn index_bytecodes<I>(config: IdentifierConfig, bytecodes: I) -> ContractsIdentifier
where
    I: IntoIterator<Item = Arc<Bytecode>>,
{
    let mut identifier = ContractsIdentifier::new(config);
    for bytecode in bytecodes {
        identifier.add_bytecode(bytecode);
    }
    identifier
}
