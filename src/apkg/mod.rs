// # Apkg Module
//
// Archive parsing and extraction for Anki packages:
//
// - **ApkgArchive**: zip container, compressed-format detection, media manifest
// - **segmenter**: front/back field segmentation heuristics
// - **extractor**: embedded-database note/card extraction with local fallbacks
// - **media**: truncated-filename reconciliation against note references

pub mod archive;
pub mod extractor;
pub mod media;
pub mod segmenter;

pub use archive::{ApkgArchive, ApkgFormat, ArchiveError};
pub use extractor::{extract, ExtractError, ExtractedCollection};
pub use media::{reconcile, MediaAsset, MediaMatchRule, ReconciledMedia};
pub use segmenter::{segment, SegmentRule, SegmentedNote};
