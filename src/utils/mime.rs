//! Media type detection for submitted documents.

use std::path::Path;

const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

/// Detect a document's media type: magic bytes first, then the file extension.
pub fn detect_media_type(path: &Path, content: &[u8]) -> String {
    infer::get(content)
        .map(|t| t.mime_type().to_string())
        .or_else(|| mime_guess::from_path(path).first().map(|m| m.essence_str().to_string()))
        .unwrap_or_else(|| FALLBACK_MEDIA_TYPE.to_string())
}

/// Whether multimodal models can read this media type directly.
pub fn is_supported_media_type(media_type: &str) -> bool {
    matches!(
        media_type.to_lowercase().as_str(),
        "application/pdf"
            | "image/jpeg"
            | "image/png"
            | "image/webp"
            | "image/heic"
            | "image/heif"
            | "image/tiff"
            | "image/gif"
    )
}

/// Map a media type to the file extension used in the raw store.
pub fn extension_for(media_type: &str) -> &'static str {
    match media_type.to_lowercase().as_str() {
        "application/pdf" => "pdf",
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/tiff" => "tif",
        "image/heic" => "heic",
        "image/heif" => "heif",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_from_magic_bytes() {
        let png = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
        assert_eq!(detect_media_type(Path::new("scan.dat"), png), "image/png");
        let pdf = b"%PDF-1.7\n";
        assert_eq!(detect_media_type(Path::new("noext"), pdf), "application/pdf");
    }

    #[test]
    fn test_detect_falls_back_to_extension() {
        assert_eq!(
            detect_media_type(Path::new("receipt.jpeg"), b"not really"),
            "image/jpeg"
        );
        assert_eq!(
            detect_media_type(Path::new("mystery"), b"???"),
            FALLBACK_MEDIA_TYPE
        );
    }

    #[test]
    fn test_supported_media_types() {
        assert!(is_supported_media_type("image/jpeg"));
        assert!(is_supported_media_type("Application/PDF"));
        assert!(!is_supported_media_type("text/plain"));
        assert!(!is_supported_media_type(FALLBACK_MEDIA_TYPE));
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("application/pdf"), "pdf");
        assert_eq!(extension_for("text/plain"), "bin");
    }
}
