//! Deterministic rename map construction
//!
//! Candidates are the union of project rename candidates and project
//! attribute names, minus everything external or dunder. Tokens come from a
//! base-26 generator starting at the two-letter range (`aa`, `ab`, …) and
//! skip anything that collides with an identifier already present in the
//! project, a Python keyword or builtin, or a previously emitted token.

use log::{debug, info};
use ruff_python_stdlib::{builtins, identifiers};

use crate::{
    error::{ObfuscateError, ObfuscateResult},
    indexer::ProjectIndex,
    types::{FxIndexMap, FxIndexSet, Provenance, is_dunder},
};

/// First counter value of the two-letter token range.
const TOKEN_COUNTER_START: u64 = 26;

/// A generated token longer than this means allocation cannot progress.
const MAX_TOKEN_LEN: usize = 6;

/// The immutable global mapping from original names to obfuscated tokens.
#[derive(Debug, Default)]
pub struct RenameMap {
    mapping: FxIndexMap<String, String>,
    provenance: FxIndexMap<String, Provenance>,
    likely_local_symbols: FxIndexSet<String>,
    reverse: FxIndexMap<String, String>,
}

impl RenameMap {
    /// Resolve the obfuscated token for a name, honoring the dunder bar.
    pub fn get(&self, name: &str) -> Option<&str> {
        if is_dunder(name) {
            return None;
        }
        self.mapping.get(name).map(String::as_str)
    }

    /// Resolve the original name for an obfuscated token.
    pub fn original_of(&self, token: &str) -> Option<&str> {
        self.reverse.get(token).map(String::as_str)
    }

    /// Whether a name is an emitted token.
    pub fn is_token(&self, name: &str) -> bool {
        self.reverse.contains_key(name)
    }

    /// Provenance of a mapped name.
    pub fn provenance(&self, name: &str) -> Option<Provenance> {
        self.provenance.get(name).copied()
    }

    /// Dynamic attribute names mapped on the likely-local policy.
    pub fn likely_local_symbols(&self) -> &FxIndexSet<String> {
        &self.likely_local_symbols
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Iterate (original, token) pairs in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.mapping
            .iter()
            .map(|(original, token)| (original.as_str(), token.as_str()))
    }
}

/// Build the deterministic rename map from a project index.
pub fn build_rename_map(index: &ProjectIndex) -> ObfuscateResult<RenameMap> {
    let mut targets: Vec<&str> = index
        .rename_candidates
        .iter()
        .chain(index.project_attributes.iter())
        .chain(index.likely_local_attribute_names.iter())
        .map(String::as_str)
        .filter(|name| is_eligible(name) && !index.external_names.contains(*name))
        .collect();
    targets.sort_unstable();
    targets.dedup();

    let mut blocked: FxIndexSet<&str> = FxIndexSet::default();
    blocked.extend(index.observed_identifiers.iter().map(String::as_str));
    blocked.extend(index.external_names.iter().map(String::as_str));
    blocked.extend(index.type_hints.iter().map(String::as_str));
    blocked.extend(builtins::python_builtins(u8::MAX, false));

    let mut generator = TokenGenerator::new();
    let mut map = RenameMap::default();
    for symbol in targets {
        let token = generator.next_token(&blocked, &map.reverse)?;
        let provenance = if index.is_declared(symbol) {
            Provenance::ResolvedLocal
        } else {
            Provenance::LikelyLocal
        };
        debug!("mapping {symbol} -> {token} ({provenance})");
        map.reverse.insert(token.clone(), symbol.to_string());
        map.provenance.insert(symbol.to_string(), provenance);
        map.mapping.insert(symbol.to_string(), token);
    }

    for name in &index.likely_local_dynamic_attributes {
        if map.mapping.contains_key(name) {
            map.likely_local_symbols.insert(name.clone());
        }
    }
    if !map.likely_local_symbols.is_empty() {
        info!(
            "mapped {} likely-local dynamic attribute(s)",
            map.likely_local_symbols.len()
        );
    }

    Ok(map)
}

/// Check whether a symbol is eligible for rename-map generation.
fn is_eligible(name: &str) -> bool {
    identifiers::is_identifier(name) && !is_dunder(name)
}

/// Deterministic base-26 lowercase token source.
struct TokenGenerator {
    counter: u64,
    allocated: usize,
}

impl TokenGenerator {
    fn new() -> Self {
        Self {
            counter: TOKEN_COUNTER_START,
            allocated: 0,
        }
    }

    fn next_token(
        &mut self,
        blocked: &FxIndexSet<&str>,
        emitted: &FxIndexMap<String, String>,
    ) -> ObfuscateResult<String> {
        loop {
            let candidate = alphabetic_name(self.counter);
            self.counter += 1;
            if candidate.len() > MAX_TOKEN_LEN {
                return Err(ObfuscateError::TokenSpaceExhausted {
                    allocated: self.allocated,
                });
            }
            // is_identifier also rejects Python keywords such as `if`/`in`.
            if !identifiers::is_identifier(&candidate) {
                continue;
            }
            if blocked.contains(candidate.as_str()) || emitted.contains_key(&candidate) {
                continue;
            }
            self.allocated += 1;
            return Ok(candidate);
        }
    }
}

/// Generate the deterministic alphabetic identifier for a counter value.
///
/// The sequence is `a, b, …, z, aa, ab, …`; mapping starts the counter at
/// [`TOKEN_COUNTER_START`] so emitted tokens begin at `aa`.
fn alphabetic_name(counter: u64) -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
    let mut index = counter as i64;
    let mut chars: Vec<u8> = Vec::new();
    loop {
        chars.push(ALPHABET[(index % 26) as usize]);
        index = index / 26 - 1;
        if index < 0 {
            break;
        }
    }
    chars.reverse();
    String::from_utf8(chars).expect("alphabet is ASCII")
}
