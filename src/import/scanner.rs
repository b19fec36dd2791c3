//! Enumeration and parsing of topic-export files.

use crate::error::{ImportError, ImportResult};
use crate::models::ArchiveDocument;
use std::collections::VecDeque;
use std::path::PathBuf;

/// Filename prefixes of export side-files that never hold topic messages.
const EXCLUDED_PREFIXES: [&str; 3] = ["message_metadata", "retrieved", "unretrievable"];

/// Whether a directory entry is a topic-export file worth opening.
pub fn is_topic_export(file_name: &str) -> bool {
    file_name.ends_with(".json")
        && !EXCLUDED_PREFIXES
            .iter()
            .any(|prefix| file_name.starts_with(prefix))
}

/// A topic-export file that was read and parsed successfully.
#[derive(Debug, Clone)]
pub struct ArchiveFile {
    pub file_name: String,
    pub document: ArchiveDocument,
}

pub struct ArchiveScanner {
    directory: PathBuf,
}

impl ArchiveScanner {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// List the directory and return a scan over its eligible files.
    ///
    /// Only names are collected up front; file contents are read one at a
    /// time as the scan advances. Candidates come back in filename order.
    pub async fn scan(&self) -> ImportResult<ArchiveScan> {
        let read_dir_err = |source| ImportError::ReadDirectory {
            path: self.directory.clone(),
            source,
        };

        let mut entries = tokio::fs::read_dir(&self.directory)
            .await
            .map_err(read_dir_err)?;

        let mut candidates = Vec::new();
        let mut excluded = 0usize;
        while let Some(entry) = entries.next_entry().await.map_err(read_dir_err)? {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if is_topic_export(&file_name) {
                candidates.push(file_name);
            } else {
                excluded += 1;
            }
        }
        candidates.sort();

        log::info!(
            "found {} topic files in {} ({} entries ignored)",
            candidates.len(),
            self.directory.display(),
            excluded
        );

        Ok(ArchiveScan {
            directory: self.directory.clone(),
            pending: candidates.into(),
        })
    }
}

/// In-progress pass over one directory listing. Not restartable: call
/// [`ArchiveScanner::scan`] again for a fresh listing.
#[derive(Debug)]
pub struct ArchiveScan {
    directory: PathBuf,
    pending: VecDeque<String>,
}

impl ArchiveScan {
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Read and parse the next candidate file.
    ///
    /// A file that cannot be read or parsed comes back as an `Err` so the
    /// caller can report it and move on; the scan itself keeps going.
    pub async fn next_file(&mut self) -> Option<ImportResult<ArchiveFile>> {
        let file_name = self.pending.pop_front()?;
        let path = self.directory.join(&file_name);
        Some(load_file(file_name, path).await)
    }
}

async fn load_file(file_name: String, path: PathBuf) -> ImportResult<ArchiveFile> {
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(source) => {
            return Err(ImportError::ReadFile {
                file: file_name,
                source,
            });
        }
    };

    match serde_json::from_slice::<ArchiveDocument>(&bytes) {
        Ok(document) => Ok(ArchiveFile {
            file_name,
            document,
        }),
        Err(source) => Err(ImportError::ParseFile {
            file: file_name,
            source,
        }),
    }
}
