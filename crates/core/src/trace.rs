//! Captured execution frames, as handed to the identifier.

use crate::hex_bytes::HexBytes;
use serde::{Deserialize, Serialize};

/// How the captured frame was entered.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    /// `CREATE`/`CREATE2` or a deploying transaction: code is creation code plus arguments.
    Create,
    /// Message call: code is the callee's runtime code.
    Call,
}

/// The code executed by one EVM message frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmMessageTrace {
    pub code: HexBytes,
    pub kind: TraceKind,
}

impl EvmMessageTrace {
    pub fn new(kind: TraceKind, code: impl Into<HexBytes>) -> Self {
        Self {
            code: code.into(),
            kind,
        }
    }

    pub fn create(code: impl Into<HexBytes>) -> Self {
        Self::new(TraceKind::Create, code)
    }

    pub fn call(code: impl Into<HexBytes>) -> Self {
        Self::new(TraceKind::Call, code)
    }

    pub fn is_create_trace(&self) -> bool {
        self.kind == TraceKind::Create
    }
}
