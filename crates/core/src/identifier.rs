//! Resolves observed EVM code to the registered artifact it was compiled from.
//!
//! Registered bytecodes are indexed by the hex encoding of their normalized code in a
//! [`RadixTree`]. A lookup follows the observed code down the tree as far as it matches and, when
//! it falls short of a registered word, tries the ways the observed code legitimately differs from
//! compiler output:
//!
//! 1. Creation code followed by constructor arguments: a registered deployment bytecode that is
//!    a strict prefix of the observed code.
//! 2. Linked libraries and immutables: the observed code is normalized with each candidate's
//!    declared regions and searched again.
//! 3. Metadata drift: code that already matched past a `REVERT, INVALID` pair differs only in the
//!    metadata trailer, and one of the registered words below the match is taken.
//!
//! Results are cached by the MD5 digest of the normalized observed code. Registering a bytecode
//! drops the whole cache.

use crate::bytecode::Bytecode;
use crate::detection::{find_metadata_boundary, is_matching_metadata_boundary};
use crate::normalize::normalize_library_runtime_bytecode_if_necessary;
use crate::radix::{NodeId, RadixTree};
use crate::result::{Error, Result};
use crate::trace::EvmMessageTrace;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Which candidate the metadata fallback picks when several registered words share the matched
/// prefix.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataTieBreak {
    /// The candidate registered last.
    #[default]
    MostRecentlyRegistered,
    /// The last candidate in depth-first trie order. Deterministic, but unrelated to
    /// registration order.
    LastEnumerated,
}

/// How far into the observed code the metadata fallback looks for the `REVERT, INVALID` pair.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataScanBound {
    /// The matched hex-char count, used as a byte offset. Reaches up to twice as far into the
    /// code as the match itself.
    #[default]
    MatchedChars,
    /// Only the bytes fully covered by the match.
    MatchedBytes,
}

impl MetadataScanBound {
    /// Byte offset the scan stops before, for a match of `matched_chars` hex chars.
    pub fn byte_bound(self, matched_chars: usize) -> usize {
        match self {
            Self::MatchedChars => matched_chars,
            Self::MatchedBytes => matched_chars / 2,
        }
    }
}

/// Identifier settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifierConfig {
    /// Keep lookup results keyed by a digest of the normalized code.
    pub enable_cache: bool,
    /// Candidate choice for the metadata fallback.
    pub metadata_tie_break: MetadataTieBreak,
    /// Extent of the metadata boundary scan.
    pub metadata_scan_bound: MetadataScanBound,
}

impl Default for IdentifierConfig {
    fn default() -> Self {
        Self {
            enable_cache: true,
            metadata_tie_break: MetadataTieBreak::default(),
            metadata_scan_bound: MetadataScanBound::default(),
        }
    }
}

impl IdentifierConfig {
    pub fn with_cache(mut self, enable_cache: bool) -> Self {
        self.enable_cache = enable_cache;
        self
    }

    pub fn with_tie_break(mut self, metadata_tie_break: MetadataTieBreak) -> Self {
        self.metadata_tie_break = metadata_tie_break;
        self
    }

    pub fn with_scan_bound(mut self, metadata_scan_bound: MetadataScanBound) -> Self {
        self.metadata_scan_bound = metadata_scan_bound;
        self
    }
}

/// MD5 digest of normalized code.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 16]);

impl CacheKey {
    pub fn of(code: &[u8]) -> Self {
        let mut hasher = Md5::new();
        hasher.update(code);
        let mut key = [0u8; 16];
        key.copy_from_slice(&hasher.finalize());
        Self(key)
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Payload of a present trie node.
#[derive(Clone, Debug)]
struct Entry {
    bytecode: Arc<Bytecode>,
    /// Registration order, starting at zero.
    sequence: u64,
}

/// Index of registered bytecodes.
///
/// Registration needs `&mut self`; lookups only need `&self` and may run concurrently.
#[derive(Debug)]
pub struct ContractsIdentifier {
    config: IdentifierConfig,
    trie: RadixTree<Entry>,
    next_sequence: u64,
    cache: RwLock<HashMap<CacheKey, Arc<Bytecode>>>,
}

impl Default for ContractsIdentifier {
    fn default() -> Self {
        Self::new(IdentifierConfig::default())
    }
}

impl ContractsIdentifier {
    pub fn new(config: IdentifierConfig) -> Self {
        Self {
            config,
            trie: RadixTree::new(),
            next_sequence: 0,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &IdentifierConfig {
        &self.config
    }

    /// Number of distinct registered codes.
    pub fn len(&self) -> usize {
        self.trie.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trie.is_empty()
    }

    /// Number of cached lookup results.
    pub fn cached_len(&self) -> usize {
        self.read_cache().len()
    }

    /// Registers `bytecode`. A bytecode with the same normalized code as an earlier one replaces
    /// it.
    pub fn add_bytecode(&mut self, bytecode: Arc<Bytecode>) {
        let word = bytecode.normalized_code().to_hex();
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let identity = bytecode.identity().to_string();
        let kind = bytecode.kind();
        let replaced = self.trie.insert(&word, Entry { bytecode, sequence });

        debug!(
            "registered {} ({:?}, {} hex chars, seq {}{}); {} codes, {} nodes",
            identity,
            kind,
            word.len(),
            sequence,
            if replaced.is_some() { ", replaced" } else { "" },
            self.trie.len(),
            self.trie.node_count()
        );

        self.cache
            .get_mut()
            .unwrap_or_else(|p| p.into_inner())
            .clear();
    }

    /// Finds the registered bytecode `trace` was produced from.
    ///
    /// `Ok(None)` means nothing matched. An error means the index is corrupt.
    pub fn identify(&self, trace: &EvmMessageTrace) -> Result<Option<Arc<Bytecode>>> {
        let normalized = normalize_library_runtime_bytecode_if_necessary(&trace.code);

        let key = self.config.enable_cache.then(|| CacheKey::of(&normalized));
        if let Some(key) = key
            && let Some(hit) = self.read_cache().get(&key)
        {
            debug!("cache hit for {:?}", key);
            return Ok(Some(Arc::clone(hit)));
        }

        let result = self.search(trace, &normalized, true, self.trie.root())?;

        if let (Some(key), Some(bytecode)) = (key, &result) {
            // Keyed partly by constructor arguments; the same key will not come back
            let with_arguments =
                bytecode.is_deployment() && bytecode.normalized_code().len() < normalized.len();
            if with_arguments {
                debug!("not caching deployment matched with arguments");
            } else {
                self.write_cache().insert(key, Arc::clone(bytecode));
            }
        }

        Ok(result)
    }

    fn search(
        &self,
        trace: &EvmMessageTrace,
        code: &[u8],
        normalize_libraries: bool,
        start: NodeId,
    ) -> Result<Option<Arc<Bytecode>>> {
        let word = hex::encode(code);
        let max_match = self.trie.get_max_match(&word, start);

        if max_match.found {
            return Ok(Some(self.bytecode_at(max_match.node)?));
        }

        debug!(
            "max match {} of {} hex chars (libraries {})",
            max_match.matched_chars,
            word.len(),
            if normalize_libraries { "pending" } else { "normalized" }
        );

        // A registered code extends the query
        if max_match.matched_chars == word.len() {
            return Ok(None);
        }

        let node = self.trie.node(max_match.node);

        // Creation code followed by constructor arguments
        if trace.is_create_trace()
            && max_match.matched_chars == node.chars_matched_through()
            && node.is_present()
        {
            let bytecode = self.bytecode_at(max_match.node)?;
            if bytecode.is_deployment() {
                debug!(
                    "deployment {} matched with {} bytes of arguments",
                    bytecode.identity(),
                    code.len() - bytecode.normalized_code().len()
                );
                return Ok(Some(bytecode));
            }
        }

        if normalize_libraries {
            for descendant in self.trie.descendants(max_match.node) {
                let candidate = self.bytecode_at(descendant.node)?;
                if !candidate.has_variable_regions() {
                    continue;
                }

                debug!("retrying with regions of {}", candidate.identity());
                let normalized = candidate.zero_variable_regions(code);
                if let Some(found) = self.search(trace, &normalized, false, max_match.node)? {
                    return Ok(Some(found));
                }
            }
        }

        let bound = self
            .config
            .metadata_scan_bound
            .byte_bound(max_match.matched_chars);
        if is_matching_metadata_boundary(code, bound) {
            let mut best: Option<&Entry> = None;
            for descendant in self.trie.descendants(max_match.node) {
                let entry = self.entry_at(descendant.node)?;
                let take = match self.config.metadata_tie_break {
                    MetadataTieBreak::MostRecentlyRegistered => {
                        best.is_none_or(|b| entry.sequence > b.sequence)
                    }
                    MetadataTieBreak::LastEnumerated => true,
                };
                if take {
                    best = Some(entry);
                }
            }

            if let Some(entry) = best {
                debug!(
                    "metadata fallback picked {} (seq {}), metadata at {:?}",
                    entry.bytecode.identity(),
                    entry.sequence,
                    find_metadata_boundary(code)
                );
                return Ok(Some(Arc::clone(&entry.bytecode)));
            }
        }

        Ok(None)
    }

    fn entry_at(&self, id: NodeId) -> Result<&Entry> {
        self.trie
            .value(id)
            .ok_or_else(|| Error::InternalConsistency {
                prefix_len: self.trie.node(id).chars_matched_before(),
            })
    }

    fn bytecode_at(&self, id: NodeId) -> Result<Arc<Bytecode>> {
        self.entry_at(id).map(|entry| Arc::clone(&entry.bytecode))
    }

    fn read_cache(&self) -> RwLockReadGuard<'_, HashMap<CacheKey, Arc<Bytecode>>> {
        match self.cache.read() {
            Ok(guard) => guard,
            Err(p) => p.into_inner(),
        }
    }

    fn write_cache(&self) -> RwLockWriteGuard<'_, HashMap<CacheKey, Arc<Bytecode>>> {
        match self.cache.write() {
            Ok(guard) => guard,
            Err(p) => p.into_inner(),
        }
    }
}
