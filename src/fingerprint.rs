// Collection structure fingerprinting.
//
// The fingerprint hashes the sorted set of top-level deck-name prefixes, so
// two exports of the same source material hash identically regardless of how
// the deeper hierarchy shifted between them.

use std::collections::BTreeSet;

use sha2::{Digest, Sha256};

use crate::hierarchy::{DEFAULT_DECK_NAME, HIERARCHY_SEPARATOR};

const FINGERPRINT_LEN: usize = 16;

pub const GENERIC_COLLECTION_NAME: &str = "Imported Collection";

#[derive(Debug, Clone, PartialEq)]
pub struct StructureFingerprint {
    /// Truncated hex digest over the sorted prefix set.
    pub hash: String,
    pub main_prefixes: Vec<String>,
    pub total_prefixes: usize,
}

/// Fingerprint a set of deck names. Derived purely from the names; the same
/// top-level prefixes always produce the same hash.
pub fn fingerprint(deck_names: &[String]) -> StructureFingerprint {
    let prefixes = main_prefixes(deck_names);
    let joined = prefixes.iter().cloned().collect::<Vec<_>>().join("\n");

    let digest = Sha256::digest(joined.as_bytes());
    let hash = hex::encode(digest)[..FINGERPRINT_LEN].to_string();

    StructureFingerprint {
        hash,
        total_prefixes: prefixes.len(),
        main_prefixes: prefixes.into_iter().collect(),
    }
}

/// Distinct top-level prefixes. When no deck name is multi-level, the full
/// names of the top-level (non-default) decks stand in for prefixes.
fn main_prefixes(deck_names: &[String]) -> BTreeSet<String> {
    let mut prefixes: BTreeSet<String> = deck_names
        .iter()
        .filter_map(|name| name.split_once(HIERARCHY_SEPARATOR).map(|(prefix, _)| prefix.trim().to_string()))
        .filter(|prefix| !prefix.is_empty())
        .collect();

    if prefixes.is_empty() {
        prefixes = root_deck_names(deck_names).into_iter().collect();
    }
    prefixes
}

fn root_deck_names(deck_names: &[String]) -> Vec<String> {
    let mut roots: Vec<String> = deck_names
        .iter()
        .filter(|name| !name.contains(HIERARCHY_SEPARATOR) && name.as_str() != DEFAULT_DECK_NAME)
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();
    roots.sort();
    roots.dedup();
    roots
}

/// Suggest a collection name from the deck names: a single prefix is used
/// directly, a small prefix set is joined, a large one falls back to the most
/// frequent prefix.
pub fn suggest_collection_name(deck_names: &[String]) -> String {
    let prefixes: BTreeSet<String> = deck_names
        .iter()
        .filter_map(|name| name.split_once(HIERARCHY_SEPARATOR).map(|(prefix, _)| prefix.trim().to_string()))
        .filter(|prefix| !prefix.is_empty())
        .collect();

    match prefixes.len() {
        0 => root_deck_names(deck_names)
            .first()
            .cloned()
            .unwrap_or_else(|| GENERIC_COLLECTION_NAME.to_string()),
        1 => prefixes.into_iter().next().unwrap_or_default(),
        2..=3 => prefixes.into_iter().collect::<Vec<_>>().join(" + "),
        _ => most_frequent_prefix(deck_names).unwrap_or_else(|| GENERIC_COLLECTION_NAME.to_string()),
    }
}

fn most_frequent_prefix(deck_names: &[String]) -> Option<String> {
    let mut counts: std::collections::BTreeMap<String, usize> = std::collections::BTreeMap::new();
    for name in deck_names {
        if let Some((prefix, _)) = name.split_once(HIERARCHY_SEPARATOR) {
            let prefix = prefix.trim();
            if !prefix.is_empty() {
                *counts.entry(prefix.to_string()).or_default() += 1;
            }
        }
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(prefix, _)| prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn same_prefixes_same_hash_regardless_of_subdecks() {
        let a = fingerprint(&names(&["Cardio::Arrhythmia", "Cardio::Valves", "Neuro::Stroke"]));
        let b = fingerprint(&names(&["Cardio::X", "Cardio::Y", "Neuro::Z"]));
        assert_eq!(a.hash, b.hash);
        assert_eq!(a.main_prefixes, vec!["Cardio", "Neuro"]);
        assert_eq!(a.total_prefixes, 2);
    }

    #[test]
    fn different_prefixes_different_hash() {
        let a = fingerprint(&names(&["Cardio::A", "Pulm::B"]));
        let b = fingerprint(&names(&["Cardio::A", "Neuro::B"]));
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn hash_is_short_and_stable() {
        let a = fingerprint(&names(&["Cardio::A"]));
        let b = fingerprint(&names(&["Cardio::B"]));
        assert_eq!(a.hash.len(), FINGERPRINT_LEN);
        assert_eq!(a.hash, b.hash);
    }

    #[test]
    fn flat_names_fall_back_to_root_decks() {
        let a = fingerprint(&names(&["Pharmacology", "Default"]));
        assert_eq!(a.main_prefixes, vec!["Pharmacology"]);
    }

    #[test]
    fn suggests_single_prefix_directly() {
        assert_eq!(suggest_collection_name(&names(&["Cardio::A", "Cardio::B"])), "Cardio");
    }

    #[test]
    fn suggests_first_root_deck_when_no_prefixes() {
        assert_eq!(suggest_collection_name(&names(&["Biochem", "Default"])), "Biochem");
    }

    #[test]
    fn joins_up_to_three_prefixes() {
        assert_eq!(
            suggest_collection_name(&names(&["Cardio::A", "Neuro::B", "Pulm::C"])),
            "Cardio + Neuro + Pulm"
        );
    }

    #[test]
    fn picks_most_frequent_prefix_when_many() {
        let list = names(&[
            "Cardio::A", "Cardio::B", "Cardio::C",
            "Neuro::A", "Pulm::A", "Renal::A", "Endo::A",
        ]);
        assert_eq!(suggest_collection_name(&list), "Cardio");
    }

    #[test]
    fn empty_input_gets_generic_name() {
        assert_eq!(suggest_collection_name(&[]), GENERIC_COLLECTION_NAME);
    }
}
