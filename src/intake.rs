//! File intake: validate an upload and hold it as a base64 `data:` URI.
//!
//! The accepted set is fixed to PDF, JPEG and PNG. Validation runs before any
//! bytes are read. The 20 MB ceiling is only guidance; the remote service is
//! the one that enforces it, so oversized files are logged and passed on.

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;

use crate::error::NoteError;
use crate::models::{MimeType, UploadedFile};

/// Size guidance shown to the user. Not enforced here.
pub const SOFT_SIZE_LIMIT_BYTES: usize = 20 * 1024 * 1024;

/// Value for an HTML `accept` attribute covering every accepted type.
pub const ACCEPT_ATTR: &str = ".pdf,image/jpeg,image/png";

/// Check a declared MIME type against the accepted set.
pub fn validate_mime(declared: &str) -> Result<MimeType, NoteError> {
    MimeType::parse(declared)
}

/// Guess the MIME type of a path from its extension.
///
/// Returns `application/octet-stream` when nothing is known so that
/// validation rejects it with the declared value visible in logs.
pub fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string()
}

impl UploadedFile {
    /// Encode raw bytes as an upload.
    pub fn from_bytes(name: impl Into<String>, mime_type: MimeType, bytes: &[u8]) -> Self {
        let name = name.into();
        if bytes.len() > SOFT_SIZE_LIMIT_BYTES {
            tracing::warn!(
                file = %name,
                size = bytes.len(),
                "upload exceeds the 20MB guidance; sending anyway"
            );
        }
        let encoded_content = format!(
            "data:{};base64,{}",
            mime_type.as_str(),
            BASE64_STANDARD.encode(bytes)
        );
        Self {
            name,
            mime_type,
            encoded_content,
        }
    }

    /// The bare base64 payload, without the `data:...;base64,` prefix.
    ///
    /// Content stored without a prefix is returned unchanged.
    pub fn payload(&self) -> &str {
        match self.encoded_content.split_once(";base64,") {
            Some((prefix, data)) if prefix.starts_with("data:") => data,
            _ => &self.encoded_content,
        }
    }

    /// The original file bytes.
    pub fn decoded_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64_STANDARD.decode(self.payload())
    }
}

/// Read a file from disk into an [`UploadedFile`].
///
/// When `declared_mime` is `None` the type is guessed from the extension.
/// An unsupported type fails before the file is opened.
pub async fn read_upload(path: &Path, declared_mime: Option<&str>) -> Result<UploadedFile, NoteError> {
    let declared = match declared_mime {
        Some(m) => m.to_string(),
        None => guess_mime(path),
    };
    let mime_type = validate_mime(&declared)?;

    let bytes = tokio::fs::read(path).await.map_err(|e| NoteError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    tracing::debug!(file = %name, mime = %mime_type, size = bytes.len(), "read upload");
    Ok(UploadedFile::from_bytes(name, mime_type, &bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_as_data_uri() {
        let file = UploadedFile::from_bytes("a.pdf", MimeType::Pdf, b"%PDF-1.4");
        assert_eq!(file.encoded_content, "data:application/pdf;base64,JVBERi0xLjQ=");
        assert_eq!(file.payload(), "JVBERi0xLjQ=");
        assert_eq!(file.decoded_bytes().unwrap(), b"%PDF-1.4");
    }

    #[test]
    fn payload_without_prefix_is_returned_whole() {
        let file = UploadedFile {
            name: "x.png".into(),
            mime_type: MimeType::Png,
            encoded_content: "iVBORw0=".into(),
        };
        assert_eq!(file.payload(), "iVBORw0=");
    }

    #[test]
    fn empty_file_has_empty_payload() {
        let file = UploadedFile::from_bytes("empty.pdf", MimeType::Pdf, b"");
        assert_eq!(file.encoded_content, "data:application/pdf;base64,");
        assert_eq!(file.payload(), "");
        assert!(file.decoded_bytes().unwrap().is_empty());
    }

    #[test]
    fn guesses_from_extension() {
        assert_eq!(guess_mime(Path::new("notes.PDF")), "application/pdf");
        assert_eq!(guess_mime(Path::new("scan.jpg")), "image/jpeg");
        assert_eq!(guess_mime(Path::new("scan.png")), "image/png");
        assert_eq!(guess_mime(Path::new("README")), "application/octet-stream");
    }

    #[tokio::test]
    async fn reads_accepted_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, b"pdf bytes").unwrap();

        let file = read_upload(&path, None).await.unwrap();
        assert_eq!(file.name, "report.pdf");
        assert_eq!(file.mime_type, MimeType::Pdf);
        assert_eq!(file.decoded_bytes().unwrap(), b"pdf bytes");
    }

    #[tokio::test]
    async fn rejects_type_before_reading() {
        // The path does not exist; validation must fail first.
        let err = read_upload(Path::new("/nonexistent/notes.txt"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, NoteError::Validation(_)));
    }

    #[tokio::test]
    async fn missing_file_is_read_error() {
        let err = read_upload(Path::new("/nonexistent/notes.pdf"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, NoteError::Read { .. }));
    }

    #[tokio::test]
    async fn declared_type_overrides_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.bin");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();

        let file = read_upload(&path, Some("image/png")).await.unwrap();
        assert_eq!(file.mime_type, MimeType::Png);
    }
}
