use crate::error::PipelineError;
use crate::models::PipelineOptions;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["txt", "md", "pdf"];

pub fn discover_documents(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        if has_supported_extension(entry.path()) {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
}

pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Fail-fast intake checks. Returns the file size so callers stat only once.
pub fn validate_source(path: &Path, options: &PipelineOptions) -> Result<u64, PipelineError> {
    if !has_supported_extension(path) {
        return Err(PipelineError::Validation(format!(
            "unsupported extension: {}",
            path.display()
        )));
    }

    let metadata = std::fs::metadata(path).map_err(|error| {
        PipelineError::Validation(format!("unreadable file {}: {error}", path.display()))
    })?;

    if metadata.len() == 0 {
        return Err(PipelineError::Validation(format!(
            "empty file: {}",
            path.display()
        )));
    }

    if metadata.len() > options.max_file_bytes {
        return Err(PipelineError::Validation(format!(
            "file exceeds {} bytes: {}",
            options.max_file_bytes,
            path.display()
        )));
    }

    Ok(metadata.len())
}

#[cfg(test)]
mod tests {
    use super::{digest_bytes, discover_documents, validate_source};
    use crate::models::PipelineOptions;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn discovery_is_recursive_and_extension_filtered() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        File::create(base.join("a.txt")).and_then(|mut file| file.write_all(b"alpha"))?;
        File::create(nested.join("b.MD")).and_then(|mut file| file.write_all(b"beta"))?;
        File::create(nested.join("ignored.docx")).and_then(|mut file| file.write_all(b"x"))?;

        let files = discover_documents(base);
        assert_eq!(files.len(), 2);
        Ok(())
    }

    #[test]
    fn digest_is_reproducible() {
        assert_eq!(digest_bytes(b"abc"), digest_bytes(b"abc"));
        assert_ne!(digest_bytes(b"abc"), digest_bytes(b"abd"));
    }

    #[test]
    fn validation_rejects_empty_and_unsupported() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let options = PipelineOptions::default();

        let empty = dir.path().join("empty.txt");
        fs::write(&empty, b"")?;
        assert!(validate_source(&empty, &options).is_err());

        let unsupported = dir.path().join("a.docx");
        fs::write(&unsupported, b"content")?;
        assert!(validate_source(&unsupported, &options).is_err());

        let good = dir.path().join("ok.txt");
        fs::write(&good, b"content")?;
        assert_eq!(validate_source(&good, &options)?, 7);
        Ok(())
    }
}
