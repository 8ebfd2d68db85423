use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::WorkerError;

/// Audio container extensions accepted for upload, without the dot.
pub const ALLOWED_EXTENSIONS: [&str; 7] = ["mp3", "wav", "webm", "ogg", "flac", "m4a", "mp4"];

/// Check an uploaded filename against [`ALLOWED_EXTENSIONS`] and return its
/// lowercased extension.
pub fn validate_extension(filename: Option<&str>) -> Result<String, WorkerError> {
    let ext = filename
        .and_then(|name| Path::new(name).extension())
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        let allowed: Vec<String> = ALLOWED_EXTENSIONS.iter().map(|e| format!(".{}", e)).collect();
        Err(WorkerError::InvalidInput(format!(
            "Invalid file type. Allowed extensions: {}",
            allowed.join(", ")
        )))
    }
}

/// An uploaded body persisted to a temp file for the duration of one request.
///
/// The file is removed when this value drops, whichever way the request
/// ends. Removal failures are logged and otherwise ignored.
#[derive(Debug)]
pub struct ScratchUpload {
    file: Option<NamedTempFile>,
}

impl ScratchUpload {
    pub fn persist(data: &[u8], extension: &str) -> std::io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("whisper-upload-")
            .suffix(&format!(".{}", extension))
            .tempfile()?;
        file.write_all(data)?;
        file.flush()?;
        Ok(Self { file: Some(file) })
    }

    pub fn path(&self) -> &Path {
        match &self.file {
            Some(file) => file.path(),
            None => Path::new(""),
        }
    }
}

impl Drop for ScratchUpload {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let path = file.path().to_path_buf();
            if let Err(e) = file.close() {
                tracing::warn!("Failed to delete temp file {}: {}", path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_every_allowed_extension() {
        for ext in ALLOWED_EXTENSIONS {
            let name = format!("clip.{}", ext);
            assert_eq!(validate_extension(Some(&name)).unwrap(), ext);
        }
    }

    #[test]
    fn test_extension_check_is_case_insensitive() {
        assert_eq!(validate_extension(Some("Meeting.WAV")).unwrap(), "wav");
    }

    #[test]
    fn test_rejects_mov_and_names_allowed_set() {
        let err = validate_extension(Some("clip.mov")).unwrap_err();
        assert!(matches!(err, WorkerError::InvalidInput(_)));
        let msg = err.to_string();
        for ext in ALLOWED_EXTENSIONS {
            assert!(msg.contains(&format!(".{}", ext)), "missing {} in {}", ext, msg);
        }
    }

    #[test]
    fn test_rejects_missing_filename_or_extension() {
        assert!(validate_extension(None).is_err());
        assert!(validate_extension(Some("noext")).is_err());
        assert!(validate_extension(Some(".wav")).is_err());
    }

    #[test]
    fn test_scratch_file_removed_on_drop() {
        let scratch = ScratchUpload::persist(b"RIFF....", "wav").unwrap();
        let path = scratch.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(path.extension().unwrap(), "wav");
        assert_eq!(std::fs::read(&path).unwrap(), b"RIFF....");
        drop(scratch);
        assert!(!path.exists());
    }

    #[test]
    fn test_scratch_drop_tolerates_already_deleted_file() {
        let scratch = ScratchUpload::persist(b"abc", "mp3").unwrap();
        std::fs::remove_file(scratch.path()).unwrap();
        drop(scratch);
    }
}
