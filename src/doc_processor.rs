use crate::api::UploadFile;
use std::fs;
use std::path::Path;

pub const DEFAULT_MAX_UPLOAD_MB: u64 = 50;

/// Local rejection of a file before any network call.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Please upload a valid PDF file (max {max_mb}MB)")]
    NotPdf { name: String, max_mb: u64 },
    #[error("Please upload a valid PDF file (max {max_mb}MB)")]
    TooLarge { size: u64, max_mb: u64 },
    #[error("{name} is empty")]
    Empty { name: String },
    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Checks type and size, then reads the file for upload.
pub fn load_upload(path: &Path, max_mb: u64) -> Result<UploadFile, ValidationError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();
    let io_err = |source: std::io::Error| ValidationError::Io {
        path: path.display().to_string(),
        source,
    };

    let size = fs::metadata(path).map_err(io_err)?.len();
    check_upload(&name, size, max_mb)?;

    let bytes = fs::read(path).map_err(io_err)?;
    Ok(UploadFile { name, bytes })
}

/// Type is judged by extension, the same way the browser file picker does.
pub fn check_upload(name: &str, size: u64, max_mb: u64) -> Result<(), ValidationError> {
    let is_pdf = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        return Err(ValidationError::NotPdf {
            name: name.to_string(),
            max_mb,
        });
    }
    if size > max_mb.saturating_mul(1024 * 1024) {
        return Err(ValidationError::TooLarge { size, max_mb });
    }
    if size == 0 {
        return Err(ValidationError::Empty {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Human-readable size, e.g. `2 MB` or `1.5 KB`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".into();
    }
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let mut i = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && i < UNITS.len() - 1 {
        value /= 1024.0;
        i += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[i])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_check_upload_accepts_pdf_under_limit() {
        assert!(check_upload("paper.pdf", 2_097_152, 50).is_ok());
        assert!(check_upload("PAPER.PDF", 1, 50).is_ok());
    }

    #[test]
    fn test_check_upload_rejects_large_file() {
        let err = check_upload("big.pdf", 60 * 1024 * 1024, 50).unwrap_err();
        assert!(matches!(err, ValidationError::TooLarge { .. }));
        assert_eq!(err.to_string(), "Please upload a valid PDF file (max 50MB)");
    }

    #[test]
    fn test_check_upload_rejects_other_types() {
        let err = check_upload("notes.txt", 10, 50).unwrap_err();
        assert!(matches!(err, ValidationError::NotPdf { .. }));
        assert!(check_upload("pdf", 10, 50).is_err());
    }

    #[test]
    fn test_exact_limit_is_allowed() {
        assert!(check_upload("a.pdf", 50 * 1024 * 1024, 50).is_ok());
    }

    #[test]
    fn test_huge_limit_does_not_overflow() {
        assert!(check_upload("paper.pdf", u64::MAX, u64::MAX).is_ok());
        assert!(check_upload("paper.pdf", 1 << 40, u64::MAX / 1024).is_ok());
        assert!(matches!(
            check_upload("paper.pdf", u64::MAX, 50),
            Err(ValidationError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_load_upload_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paper.pdf");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"%PDF-1.4 test").unwrap();

        let upload = load_upload(&path, 50).unwrap();
        assert_eq!(upload.name, "paper.pdf");
        assert_eq!(upload.bytes, b"%PDF-1.4 test");
    }

    #[test]
    fn test_load_upload_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_upload(&dir.path().join("gone.pdf"), 50).unwrap_err();
        assert!(matches!(err, ValidationError::Io { .. }));
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(2_097_152), "2 MB");
    }
}
