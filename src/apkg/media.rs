// Media filename reconciliation.
//
// The compressed package format truncates declared filenames in its manifest.
// This module recovers the true names by fuzzy-matching each manifest entry
// against the filenames actually referenced inside note text, and tags every
// resolution with the rule that produced it.

use std::collections::BTreeSet;

use regex::Regex;
use tracing::{debug, warn};

use crate::apkg::archive::{ApkgArchive, ApkgFormat};
use crate::models::{MimeCategory, NoteRecord};

/// Which reconciliation rule produced a resolved filename, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaMatchRule {
    /// Manifest name taken as-is (legacy format, no truncation possible).
    Declared,
    /// Exact equality with a referenced filename.
    Exact,
    /// Candidate base name contains the manifest base name after stripping a
    /// numeric-prefix artifact.
    StrippedPrefix,
    /// At least half of the manifest name's tokens appear in the candidate.
    TokenOverlap,
    /// Same extension plus at least one shared token.
    ExtensionToken,
    /// Single unmatched entry paired with the single candidate (last resort).
    SoleCandidate,
    /// No candidate matched; the possibly-truncated manifest name is kept.
    Unmatched,
}

/// One media entry with its payload and reconciled filename. The resolved
/// filename is not guaranteed unique and may still be the truncated manifest
/// name when reconciliation stayed ambiguous.
#[derive(Debug, Clone)]
pub struct MediaAsset {
    pub archive_key: String,
    pub resolved_filename: String,
    pub bytes: Vec<u8>,
    pub mime_category: MimeCategory,
    pub match_rule: MediaMatchRule,
}

#[derive(Debug, Default)]
pub struct ReconciledMedia {
    pub assets: Vec<MediaAsset>,
    /// Entries whose manifest name could not be matched to any reference.
    pub unresolved: usize,
}

/// Reconcile all media entries of an archive. Never fails: ambiguity degrades
/// to keeping the manifest name and is surfaced only through `unresolved`.
pub fn reconcile(archive: &ApkgArchive, notes: &[NoteRecord]) -> ReconciledMedia {
    let manifest = archive.media_manifest();
    if manifest.is_empty() {
        return ReconciledMedia::default();
    }

    let mut entries: Vec<(String, String)> = manifest.into_iter().collect();
    entries.sort_by(|a, b| numeric_key(&a.0).cmp(&numeric_key(&b.0)).then(a.0.cmp(&b.0)));

    let resolved = match archive.format() {
        ApkgFormat::Legacy => entries
            .into_iter()
            .map(|(key, name)| (key, name, MediaMatchRule::Declared))
            .collect(),
        ApkgFormat::Compressed => {
            let candidates = referenced_filenames(notes);
            resolve_truncated(entries, &candidates)
        }
    };

    let mut reconciled = ReconciledMedia::default();
    for (key, filename, rule) in resolved {
        let bytes = match archive.media_payload(&key) {
            Some(bytes) => bytes,
            None => {
                warn!("media entry {} ({}) has no payload in archive", key, filename);
                continue;
            }
        };
        if rule == MediaMatchRule::Unmatched {
            reconciled.unresolved += 1;
        }
        reconciled.assets.push(MediaAsset {
            archive_key: key,
            mime_category: MimeCategory::from_filename(&filename),
            resolved_filename: filename,
            bytes,
            match_rule: rule,
        });
    }

    debug!(
        "reconciled {} media assets ({} unresolved)",
        reconciled.assets.len(),
        reconciled.unresolved
    );
    reconciled
}

fn resolve_truncated(
    entries: Vec<(String, String)>,
    candidates: &BTreeSet<String>,
) -> Vec<(String, String, MediaMatchRule)> {
    let single_entry = entries.len() == 1;

    let mut resolved: Vec<(String, String, MediaMatchRule)> = entries
        .into_iter()
        .map(|(key, truncated)| match match_candidate(&truncated, candidates) {
            Some((name, rule)) => (key, name, rule),
            None => (key, truncated, MediaMatchRule::Unmatched),
        })
        .collect();

    // Last resort: one entry, one candidate, nothing matched. Assume they
    // correspond even with zero token overlap.
    if single_entry && candidates.len() == 1 {
        if let Some(entry) = resolved.first_mut() {
            if entry.2 == MediaMatchRule::Unmatched {
                if let Some(candidate) = candidates.iter().next() {
                    entry.1 = candidate.clone();
                    entry.2 = MediaMatchRule::SoleCandidate;
                }
            }
        }
    }

    resolved
}

/// Try the match ladder for one truncated manifest name. Rules are tried in
/// priority order across all candidates before falling to the next rule.
fn match_candidate(truncated: &str, candidates: &BTreeSet<String>) -> Option<(String, MediaMatchRule)> {
    if candidates.contains(truncated) {
        return Some((truncated.to_string(), MediaMatchRule::Exact));
    }

    let stripped_base = base_name(&strip_numeric_prefix(truncated));
    if !stripped_base.is_empty() {
        for candidate in candidates {
            if base_name(candidate).contains(&stripped_base) {
                return Some((candidate.clone(), MediaMatchRule::StrippedPrefix));
            }
        }
    }

    let tokens = tokenize(truncated);
    if !tokens.is_empty() {
        for candidate in candidates {
            let candidate_tokens = tokenize(candidate);
            let shared = tokens.intersection(&candidate_tokens).count();
            if shared * 2 >= tokens.len() {
                return Some((candidate.clone(), MediaMatchRule::TokenOverlap));
            }
        }

        let ext = extension(truncated);
        if !ext.is_empty() {
            for candidate in candidates {
                if extension(candidate) == ext {
                    let candidate_tokens = tokenize(candidate);
                    if tokens.intersection(&candidate_tokens).next().is_some() {
                        return Some((candidate.clone(), MediaMatchRule::ExtensionToken));
                    }
                }
            }
        }
    }

    None
}

/// Filenames referenced inside note text, via `src="..."` attributes and
/// bracketed sound references.
pub fn referenced_filenames(notes: &[NoteRecord]) -> BTreeSet<String> {
    let src = Regex::new(r#"src="([^"]+)""#).unwrap();
    let sound = Regex::new(r"\[sound:([^\]]+)\]").unwrap();

    let mut names = BTreeSet::new();
    for note in notes {
        for text in [&note.front, &note.back] {
            for capture in src.captures_iter(text) {
                names.insert(capture[1].to_string());
            }
            for capture in sound.captures_iter(text) {
                names.insert(capture[1].to_string());
            }
        }
    }
    names
}

fn numeric_key(key: &str) -> i64 {
    key.parse().unwrap_or(i64::MAX)
}

/// Strip the leading numeric artifact the compressed manifest prepends to
/// truncated names (e.g. "12-heart.png" -> "heart.png").
fn strip_numeric_prefix(name: &str) -> String {
    let rest = name.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() == name.len() {
        return name.to_string();
    }
    rest.trim_start_matches(['-', '_', '.', ' ']).to_string()
}

fn base_name(name: &str) -> String {
    let base = name.rsplit_once('.').map(|(base, _)| base).unwrap_or(name);
    base.to_ascii_lowercase()
}

fn extension(name: &str) -> String {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

fn tokenize(name: &str) -> BTreeSet<String> {
    let separator = Regex::new(r"[^A-Za-z0-9]+").unwrap();
    separator
        .split(&name.to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}
