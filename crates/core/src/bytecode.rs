//! Compiled contract artifacts as registered with the identifier.

use crate::hex_bytes::HexBytes;
use crate::normalize::{
    ImmutableReference, normalize_library_runtime_bytecode_if_necessary, validate_regions,
    zero_link_placeholders, zero_out_addresses, zero_out_slices,
};
use crate::result::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Names a compiled contract. Carried through the identifier without being inspected.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractIdentity {
    /// Path of the source unit, e.g. `contracts/Token.sol`.
    pub source_name: String,
    /// Contract name within the source unit.
    pub name: String,
}

impl ContractIdentity {
    pub fn new(source_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ContractIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source_name, self.name)
    }
}

/// Which of a contract's two code objects a [`Bytecode`] holds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BytecodeKind {
    /// Creation code, run once by the deploying transaction. Observed followed by ABI-encoded
    /// constructor arguments.
    Deployment,
    /// Code stored at the contract's address.
    Runtime,
}

/// A compiled code object with every post-compilation region zeroed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BytecodeRecord")]
pub struct Bytecode {
    identity: ContractIdentity,
    kind: BytecodeKind,
    normalized_code: HexBytes,
    library_address_positions: Vec<usize>,
    immutable_references: Vec<ImmutableReference>,
}

impl Bytecode {
    /// Builds a record from compiler output, zeroing the declared regions.
    ///
    /// Fails with [`Error::RegionOutOfBounds`] if a region does not fit inside `code`.
    pub fn new(
        identity: ContractIdentity,
        kind: BytecodeKind,
        code: &[u8],
        library_address_positions: Vec<usize>,
        immutable_references: Vec<ImmutableReference>,
    ) -> Result<Self> {
        validate_regions(code.len(), &library_address_positions, &immutable_references)?;

        let code = zero_out_addresses(code, &library_address_positions);
        let code = zero_out_slices(&code, &immutable_references);
        let normalized_code = normalize_library_runtime_bytecode_if_necessary(&code);

        Ok(Self {
            identity,
            kind,
            normalized_code: normalized_code.into(),
            library_address_positions,
            immutable_references,
        })
    }

    /// Builds a record from an unlinked compiler hex object.
    ///
    /// Every `__…__` link placeholder becomes a zero address whose offset is recorded as a
    /// library address position. Fully linked hex is accepted too.
    pub fn from_unlinked_hex(
        identity: ContractIdentity,
        kind: BytecodeKind,
        unlinked_hex: &str,
        immutable_references: Vec<ImmutableReference>,
    ) -> Result<Self> {
        let (code, positions) = zero_link_placeholders(unlinked_hex)?;
        Self::new(identity, kind, &code, positions, immutable_references)
    }

    pub fn identity(&self) -> &ContractIdentity {
        &self.identity
    }

    pub fn kind(&self) -> BytecodeKind {
        self.kind
    }

    pub fn is_deployment(&self) -> bool {
        self.kind == BytecodeKind::Deployment
    }

    pub fn normalized_code(&self) -> &HexBytes {
        &self.normalized_code
    }

    pub fn library_address_positions(&self) -> &[usize] {
        &self.library_address_positions
    }

    pub fn immutable_references(&self) -> &[ImmutableReference] {
        &self.immutable_references
    }

    /// True if any part of the code is filled in after compilation.
    pub fn has_variable_regions(&self) -> bool {
        !self.library_address_positions.is_empty() || !self.immutable_references.is_empty()
    }

    /// Zeroes this record's variable regions in some other code.
    pub fn zero_variable_regions(&self, code: &[u8]) -> Vec<u8> {
        let code = zero_out_addresses(code, &self.library_address_positions);
        zero_out_slices(&code, &self.immutable_references)
    }
}

/// Serialized shape of [`Bytecode`]. Code is normalized again on the way in.
#[derive(Deserialize)]
struct BytecodeRecord {
    identity: ContractIdentity,
    kind: BytecodeKind,
    #[serde(alias = "code")]
    normalized_code: HexBytes,
    #[serde(default)]
    library_address_positions: Vec<usize>,
    #[serde(default)]
    immutable_references: Vec<ImmutableReference>,
}

impl TryFrom<BytecodeRecord> for Bytecode {
    type Error = Error;

    fn try_from(record: BytecodeRecord) -> Result<Self> {
        Self::new(
            record.identity,
            record.kind,
            &record.normalized_code,
            record.library_address_positions,
            record.immutable_references,
        )
    }
}
