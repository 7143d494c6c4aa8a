//! On-disk layout of persisted usage records.
//!
//! One report file per device identity, named after the identity with
//! characters that are invalid in file names removed.

use crate::ledger::store::StoreError;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Extension of every record file.
pub const RECORD_EXTENSION: &str = "html";

/// Characters no mainstream file system accepts in a file name.
const RESERVED: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Strip characters that cannot appear in a file name.
///
/// Control characters and the Windows reserved set are dropped, along with
/// trailing dots and spaces, which Windows silently discards.
pub fn sanitize_file_stem(identity: &str) -> String {
    let stripped: String = identity
        .chars()
        .filter(|c| !c.is_control() && !RESERVED.contains(c))
        .collect();
    stripped.trim_end_matches(['.', ' ']).to_string()
}

/// File name for `identity`.
///
/// Identities that lose characters to sanitizing get a short hash of the raw
/// identity appended, so two devices that sanitize alike keep separate files.
pub fn file_name_for(identity: &str) -> String {
    let stem = sanitize_file_stem(identity);
    if stem == identity && !stem.is_empty() {
        return format!("{stem}.{RECORD_EXTENSION}");
    }
    hashed_file_name(&stem, identity, 4)
}

/// Fallback file name for `identity` when its usual file is taken by another
/// device, e.g. one differing only in case on a case-insensitive volume.
pub fn alternate_file_name_for(identity: &str) -> String {
    hashed_file_name(&sanitize_file_stem(identity), identity, 8)
}

fn hashed_file_name(stem: &str, identity: &str, digest_bytes: usize) -> String {
    let digest = Sha256::digest(identity.as_bytes());
    let suffix = hex::encode(&digest[..digest_bytes]);
    if stem.is_empty() {
        format!("device-{suffix}.{RECORD_EXTENSION}")
    } else {
        format!("{stem}-{suffix}.{RECORD_EXTENSION}")
    }
}

/// Directory holding one report per device.
#[derive(Debug, Clone)]
pub struct RecordFiles {
    dir: PathBuf,
}

impl RecordFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the report for `identity`.
    pub fn path_for(&self, identity: &str) -> PathBuf {
        self.dir.join(file_name_for(identity))
    }

    /// Path used for `identity` when its usual file belongs to another device.
    pub fn alternate_path_for(&self, identity: &str) -> PathBuf {
        self.dir.join(alternate_file_name_for(identity))
    }

    /// Read the report at `path`, or `None` if there is none yet.
    ///
    /// Bytes that are not valid UTF-8 become U+FFFD instead of failing the
    /// read, so a report saved in another encoding still loads.
    pub fn read_at(&self, path: &Path) -> Result<Option<String>, StoreError> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Read {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Replace the report at `path` with `contents`.
    ///
    /// The text is written to a sibling temp file first and renamed over the
    /// old report, so a crash mid-write leaves the previous version intact.
    pub fn write_at(&self, path: &Path, contents: &str) -> Result<(), StoreError> {
        let write_err = |message: String| StoreError::Write {
            path: path.to_path_buf(),
            message,
        };

        fs::create_dir_all(&self.dir).map_err(|e| write_err(e.to_string()))?;

        let tmp_path = path.with_extension(format!("{RECORD_EXTENSION}.tmp"));
        let result = (|| -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(contents.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp_path, path)
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp_path);
            return Err(write_err(e.to_string()));
        }
        Ok(())
    }

    /// All reports currently in the directory, sorted by path.
    pub fn read_all(&self) -> Result<Vec<(PathBuf, String)>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::Read {
                    path: self.dir.clone(),
                    message: e.to_string(),
                })
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .map(|e| e == RECORD_EXTENSION)
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        let mut reports = Vec::with_capacity(paths.len());
        for path in paths {
            match self.read_at(&path) {
                Ok(Some(text)) => reports.push((path, text)),
                Ok(None) => {}
                Err(e) => tracing::warn!("Skipping {e}"),
            }
        }
        Ok(reports)
    }
}
