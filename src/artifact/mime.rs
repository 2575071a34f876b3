/// MIME detection for stored blobs
///
/// Detection order: magic bytes, then a trusted caller hint (any specific
/// type other than the generic octet-stream), then the file extension,
/// then `application/octet-stream`.

/// Generic fallback type.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Leading-byte signatures. RIFF containers need a second look at
/// bytes 8..12 to distinguish WAVE from WEBP.
const SIGNATURES: &[(&[u8], &str)] = &[
    (&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A], "image/png"),
    (&[0xFF, 0xD8, 0xFF], "image/jpeg"),
    (&[0x47, 0x49, 0x46, 0x38], "image/gif"),
    (&[0x25, 0x50, 0x44, 0x46], "application/pdf"),
];

const RIFF: &[u8] = &[0x52, 0x49, 0x46, 0x46];

/// Detect the MIME type of a blob.
pub fn detect(blob: &[u8], hint: Option<&str>, filename: Option<&str>) -> String {
    if let Some(mime) = sniff(blob) {
        return mime.to_string();
    }
    if let Some(hint) = hint {
        if !hint.is_empty() && hint != OCTET_STREAM {
            return hint.to_string();
        }
    }
    if let Some(mime) = filename.and_then(extension_mime) {
        return mime.to_string();
    }
    OCTET_STREAM.to_string()
}

/// Match the leading bytes against the signature table.
fn sniff(blob: &[u8]) -> Option<&'static str> {
    for (signature, mime) in SIGNATURES {
        if blob.starts_with(signature) {
            return Some(mime);
        }
    }
    if blob.starts_with(RIFF) && blob.len() >= 12 {
        return match &blob[8..12] {
            b"WAVE" => Some("audio/wav"),
            b"WEBP" => Some("image/webp"),
            _ => None,
        };
    }
    None
}

/// Map a filename extension to a MIME type.
fn extension_mime(filename: &str) -> Option<&'static str> {
    let ext = filename.rsplit('.').next()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "pdf" => Some("application/pdf"),
        "wav" => Some("audio/wav"),
        "json" => Some("application/json"),
        "txt" => Some("text/plain"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_bytes_win_over_hint() {
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00];
        assert_eq!(detect(&png, Some("text/plain"), None), "image/png");
    }

    #[test]
    fn riff_containers_are_disambiguated() {
        let mut wav = Vec::from(*b"RIFF\x24\x00\x00\x00WAVEfmt ");
        assert_eq!(detect(&wav, None, None), "audio/wav");
        wav[8..12].copy_from_slice(b"WEBP");
        assert_eq!(detect(&wav, None, None), "image/webp");
    }

    #[test]
    fn specific_hint_is_trusted_when_unsniffable() {
        assert_eq!(detect(b"hello", Some("application/json"), None), "application/json");
        assert_eq!(detect(b"hello", Some(OCTET_STREAM), None), OCTET_STREAM);
    }

    #[test]
    fn extension_fallback() {
        assert_eq!(detect(b"hello", None, Some("notes.txt")), "text/plain");
        assert_eq!(detect(b"hello", None, Some("mystery.bin")), OCTET_STREAM);
    }
}
