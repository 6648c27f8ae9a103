//! The detection module is responsible for recognising compiler-emitted regions of bytecode that
//! identification has to look past.

pub mod metadata;

pub use metadata::{find_metadata_boundary, is_matching_metadata_boundary};
