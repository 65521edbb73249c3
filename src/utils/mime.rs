use std::path::Path;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Guesses an image MIME type from the file extension.
/// Unknown or missing extensions map to `application/octet-stream`.
pub fn mime_from_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => OCTET_STREAM,
    }
}

/// File extension for an image returned by the generation model.
pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_from_path() {
        assert_eq!(mime_from_path(Path::new("hero.jpg")), "image/jpeg");
        assert_eq!(mime_from_path(Path::new("hero.JPEG")), "image/jpeg");
        assert_eq!(mime_from_path(Path::new("/tmp/ref.png")), "image/png");
        assert_eq!(mime_from_path(Path::new("ref.webp")), "image/webp");
        assert_eq!(mime_from_path(Path::new("scan.tiff")), OCTET_STREAM);
        assert_eq!(mime_from_path(Path::new("no_extension")), OCTET_STREAM);
    }

    #[test]
    fn test_extension_for_mime() {
        assert_eq!(extension_for_mime("image/jpeg"), "jpg");
        assert_eq!(extension_for_mime("image/png"), "png");
        assert_eq!(extension_for_mime("application/octet-stream"), "png");
    }
}
