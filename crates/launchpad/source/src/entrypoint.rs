use crate::SourceError;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Find the single file named `file_name` under `root`, skipping `.git`.
///
/// Fails when the file is absent or when several candidates exist.
pub fn verify_entrypoint(root: &Path, file_name: &str) -> Result<PathBuf, SourceError> {
    let mut candidates = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_entry(|entry| entry.file_name() != ".git") {
        let entry = entry.map_err(|err| SourceError::Io(err.into()))?;
        if entry.file_type().is_file() && entry.file_name() == file_name {
            candidates.push(entry.into_path());
        }
    }

    match candidates.len() {
        0 => Err(SourceError::EntrypointNotFound {
            file_name: file_name.to_owned(),
            root: root.to_path_buf(),
        }),
        1 => Ok(candidates.remove(0)),
        _ => {
            candidates.sort();
            Err(SourceError::AmbiguousEntrypoint { file_name: file_name.to_owned(), candidates })
        }
    }
}
