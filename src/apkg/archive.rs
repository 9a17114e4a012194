use std::collections::HashMap;
use std::io::{Cursor, Read};

use thiserror::Error;
use tracing::{debug, warn};

/// Zstandard frame magic. The newer package format compresses the collection
/// database, the media manifest, and individual media payloads with it.
pub const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

const SQLITE_MAGIC: &[u8] = b"SQLite format 3\0";

const DB_COMPRESSED: &str = "collection.anki21b";
const DB_MODERN: &str = "collection.anki21";
const DB_LEGACY: &str = "collection.anki2";
const MEDIA_MANIFEST: &str = "media";

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("corrupt archive: {0}")]
    Corrupt(String),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no recognizable collection database in archive")]
    MissingDatabase,
}

/// Which package encoding the archive uses. The compressed format is the one
/// whose media manifest may carry truncated filenames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApkgFormat {
    Legacy,
    Compressed,
}

/// Opened Anki package: the extracted file table, the (decompressed) embedded
/// collection database, and the detected format.
pub struct ApkgArchive {
    files: HashMap<String, Vec<u8>>,
    format: ApkgFormat,
    database: Vec<u8>,
}

impl ApkgArchive {
    /// Open a package from raw bytes. Fails fast when the container cannot be
    /// read or no recognizable collection database is found after both raw
    /// and decompressed attempts.
    pub fn open(bytes: &[u8]) -> Result<Self, ArchiveError> {
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes))?;

        let mut files = HashMap::with_capacity(zip.len());
        for index in 0..zip.len() {
            let mut entry = zip.by_index(index)?;
            if entry.is_dir() {
                continue;
            }
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data)?;
            files.insert(entry.name().to_string(), data);
        }

        let (format, database) = locate_database(&files)?;
        debug!(
            "opened apkg: {} entries, format {:?}, database {} bytes",
            files.len(),
            format,
            database.len()
        );

        Ok(ApkgArchive {
            files,
            format,
            database,
        })
    }

    pub fn format(&self) -> ApkgFormat {
        self.format
    }

    /// The embedded collection database as a raw SQLite image.
    pub fn database(&self) -> &[u8] {
        &self.database
    }

    /// The media manifest: opaque archive key -> declared filename.
    ///
    /// In the compressed format the manifest itself may be compressed and its
    /// declared filenames may be truncated; manifest problems degrade to an
    /// empty or partial map rather than failing the import.
    pub fn media_manifest(&self) -> HashMap<String, String> {
        let raw = match self.files.get(MEDIA_MANIFEST) {
            Some(raw) => raw,
            None => return HashMap::new(),
        };

        let payload = if raw.starts_with(&ZSTD_MAGIC) {
            match zstd::stream::decode_all(&raw[..]) {
                Ok(decoded) => decoded,
                Err(e) => {
                    warn!("media manifest failed to decompress: {}", e);
                    return HashMap::new();
                }
            }
        } else {
            raw.clone()
        };

        match serde_json::from_slice::<HashMap<String, String>>(&payload) {
            Ok(manifest) => manifest,
            Err(e) => {
                if self.format == ApkgFormat::Compressed {
                    debug!("media manifest is not JSON, scanning for filenames: {}", e);
                    self.scan_manifest_strings(&payload)
                } else {
                    warn!("media manifest unreadable, continuing without media: {}", e);
                    HashMap::new()
                }
            }
        }
    }

    /// Raw payload for one media entry, individually decompressed when it
    /// carries the compressed signature.
    pub fn media_payload(&self, key: &str) -> Option<Vec<u8>> {
        let raw = self.files.get(key)?;
        if raw.starts_with(&ZSTD_MAGIC) {
            match zstd::stream::decode_all(&raw[..]) {
                Ok(decoded) => Some(decoded),
                Err(e) => {
                    warn!("media payload {} failed to decompress, keeping raw bytes: {}", key, e);
                    Some(raw.clone())
                }
            }
        } else {
            Some(raw.clone())
        }
    }

    /// Recover filename-looking strings from a binary manifest and pair them,
    /// in order, with the archive's numeric media entries. The recovered names
    /// are what the reconciler later fuzzy-matches against note text.
    fn scan_manifest_strings(&self, payload: &[u8]) -> HashMap<String, String> {
        let names = scan_filename_strings(payload);

        let mut keys: Vec<i64> = self
            .files
            .keys()
            .filter_map(|name| name.parse::<i64>().ok())
            .collect();
        keys.sort_unstable();

        keys.into_iter()
            .zip(names)
            .map(|(key, name)| (key.to_string(), name))
            .collect()
    }
}

fn locate_database(files: &HashMap<String, Vec<u8>>) -> Result<(ApkgFormat, Vec<u8>), ArchiveError> {
    if let Some(raw) = files.get(DB_COMPRESSED) {
        let decoded = zstd::stream::decode_all(&raw[..])
            .map_err(|e| ArchiveError::Corrupt(format!("compressed database: {}", e)))?;
        if decoded.starts_with(SQLITE_MAGIC) {
            return Ok((ApkgFormat::Compressed, decoded));
        }
        return Err(ArchiveError::MissingDatabase);
    }

    for name in [DB_MODERN, DB_LEGACY] {
        if let Some(raw) = files.get(name) {
            if raw.starts_with(SQLITE_MAGIC) {
                return Ok((ApkgFormat::Legacy, raw.clone()));
            }
            // Some exporters compress without renaming; try the signature.
            if raw.starts_with(&ZSTD_MAGIC) {
                if let Ok(decoded) = zstd::stream::decode_all(&raw[..]) {
                    if decoded.starts_with(SQLITE_MAGIC) {
                        return Ok((ApkgFormat::Compressed, decoded));
                    }
                }
            }
        }
    }

    Err(ArchiveError::MissingDatabase)
}

/// Maximal runs of printable bytes that look like filenames (contain a dot,
/// minimum length). Binary manifests interleave length/tag bytes with the
/// declared names, so this recovers truncated approximations of them.
fn scan_filename_strings(payload: &[u8]) -> Vec<String> {
    let mut names = Vec::new();
    let mut current = Vec::new();

    for &byte in payload {
        if (0x20..0x7f).contains(&byte) {
            current.push(byte);
        } else {
            flush_candidate(&mut current, &mut names);
        }
    }
    flush_candidate(&mut current, &mut names);

    names
}

fn flush_candidate(current: &mut Vec<u8>, names: &mut Vec<String>) {
    if current.len() >= 4 {
        if let Ok(text) = std::str::from_utf8(current) {
            if text.contains('.') {
                names.push(text.to_string());
            }
        }
    }
    current.clear();
}
