//! Persistence of the processed-hash set.
//!
//! Plain text, one content hash per line, sorted. Saves go through a
//! sibling temp file that is fsynced and renamed over the target, so a
//! reader sees either the old set or the new one.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use facility_rag_core::dedup::ProcessedHashSet;
use facility_rag_core::RagError;

/// What was found on disk.
#[derive(Debug)]
pub enum LoadedHashes {
    Missing,
    /// The file exists but cannot be parsed; carries the parse error.
    Corrupt(RagError),
    Loaded(ProcessedHashSet),
}

pub struct HashFile {
    path: PathBuf,
}

impl HashFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<LoadedHashes, RagError> {
        let text = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LoadedHashes::Missing),
            Err(e) => return Err(e.into()),
        };
        let Ok(text) = String::from_utf8(text) else {
            return Ok(LoadedHashes::Corrupt(RagError::Consistency(format!(
                "{} is not valid UTF-8",
                self.path.display()
            ))));
        };
        Ok(match ProcessedHashSet::parse_lines(&text) {
            Ok(set) => LoadedHashes::Loaded(set),
            Err(e) => LoadedHashes::Corrupt(e),
        })
    }

    pub fn save(&self, hashes: &ProcessedHashSet) -> Result<(), RagError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.tmp_path();
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(hashes.to_lines().as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        tracing::debug!(path = %self.path.display(), hashes = hashes.len(), "saved processed hashes");
        Ok(())
    }

    pub fn remove(&self) -> Result<(), RagError> {
        for path in [self.path.clone(), self.tmp_path()] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
