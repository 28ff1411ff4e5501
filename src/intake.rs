//! File intake: candidate files from the picker or a drop, and the
//! validation that turns them into a `SelectedFile`.
//!
//! Acceptance is decided by the *declared* media type and the byte size only.
//! The bytes are never decoded here.

use anyhow::{Context, Result};
use std::fmt;
use std::path::Path;

/// Largest accepted upload (10 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Media types the prediction service accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaType {
    Jpeg,
    Jpg,
    Png,
}

impl MediaType {
    /// Maps a declared MIME type onto an accepted media type.
    ///
    /// Matching is exact, like the browser `File.type` comparison it mirrors.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "image/jpeg" => Some(Self::Jpeg),
            "image/jpg" => Some(Self::Jpg),
            "image/png" => Some(Self::Png),
            _ => None,
        }
    }

    pub fn as_mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Jpg => "image/jpg",
            Self::Png => "image/png",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_mime())
    }
}

/// An unvalidated file as handed over by the file picker or a drop.
#[derive(Clone, Debug)]
pub struct CandidateFile {
    pub name: String,
    /// Declared MIME type; empty when unknown.
    pub declared_type: String,
    pub bytes: Vec<u8>,
}

impl CandidateFile {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            bytes,
        }
    }

    /// Reads a file from disk, declaring its type from the extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("read image file {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());
        let declared_type = mime_guess::from_path(path)
            .first()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_default();
        Ok(Self {
            name,
            declared_type,
            bytes,
        })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Why a candidate was refused.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IntakeRejection {
    UnsupportedType { declared: String },
    TooLarge { size: u64 },
}

impl IntakeRejection {
    /// Text shown in the status banner.
    pub fn message(&self) -> &'static str {
        match self {
            Self::UnsupportedType { .. } => "Please select a valid image file (JPEG, JPG, or PNG)",
            Self::TooLarge { .. } => "File size must be less than 10MB",
        }
    }
}

impl fmt::Display for IntakeRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// A file that passed validation.
///
/// Fields are private; the only way to obtain one is [`validate`]:
///
/// ```compile_fail
/// use detection_console::intake::{MediaType, SelectedFile};
///
/// let file = SelectedFile {
///     name: "x.png".to_string(),
///     media_type: MediaType::Png,
///     bytes: vec![0u8; 64],
/// };
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectedFile {
    name: String,
    media_type: MediaType,
    bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Checks the declared type first, then the size.
pub fn validate(candidate: CandidateFile) -> Result<SelectedFile, IntakeRejection> {
    let Some(media_type) = MediaType::from_mime(&candidate.declared_type) else {
        return Err(IntakeRejection::UnsupportedType {
            declared: candidate.declared_type,
        });
    };
    let size = candidate.size();
    if size > MAX_UPLOAD_BYTES {
        return Err(IntakeRejection::TooLarge { size });
    }
    Ok(SelectedFile {
        name: candidate.name,
        media_type,
        bytes: candidate.bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_all_allowed_types() {
        for mime in ["image/jpeg", "image/jpg", "image/png"] {
            let file = validate(CandidateFile::new("a", mime, vec![1, 2, 3])).unwrap();
            assert_eq!(file.media_type().as_mime(), mime);
            assert_eq!(file.size(), 3);
        }
    }

    #[test]
    fn rejects_other_types_before_size() {
        let big = vec![0u8; (MAX_UPLOAD_BYTES + 1) as usize];
        let err = validate(CandidateFile::new("a.gif", "image/gif", big)).unwrap_err();
        assert_eq!(
            err.message(),
            "Please select a valid image file (JPEG, JPG, or PNG)"
        );
    }

    #[test]
    fn size_limit_is_inclusive() {
        let exact = vec![0u8; MAX_UPLOAD_BYTES as usize];
        assert!(validate(CandidateFile::new("a.png", "image/png", exact)).is_ok());

        let over = vec![0u8; (MAX_UPLOAD_BYTES + 1) as usize];
        let err = validate(CandidateFile::new("a.png", "image/png", over)).unwrap_err();
        assert_eq!(err, IntakeRejection::TooLarge { size: MAX_UPLOAD_BYTES + 1 });
        assert_eq!(err.message(), "File size must be less than 10MB");
    }

    #[test]
    fn mime_match_is_exact() {
        assert_eq!(MediaType::from_mime("IMAGE/PNG"), None);
        assert_eq!(MediaType::from_mime(""), None);
    }

    #[test]
    fn from_path_declares_type_from_extension() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("shot.JPG");
        std::fs::write(&path, b"\xFF\xD8\xFF\xD9")?;

        let candidate = CandidateFile::from_path(&path)?;
        assert_eq!(candidate.name, "shot.JPG");
        assert_eq!(candidate.declared_type, "image/jpeg");
        assert_eq!(candidate.size(), 4);

        let txt = dir.path().join("notes.txt");
        std::fs::write(&txt, b"hi")?;
        assert_eq!(CandidateFile::from_path(&txt)?.declared_type, "text/plain");
        Ok(())
    }
}
