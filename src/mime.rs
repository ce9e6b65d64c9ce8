//! MIME type detection for new attachments

/// Fallback when neither an explicit type nor a known extension is available
pub const UNKNOWN_MIME: &str = "application/unknown";

const EXT_TO_MIME: &[(&str, &str)] = &[
    (".json", "application/json"),
    (".pdf", "application/pdf"),
    (".txt", "text/plain"),
    (".md", "text/markdown"),
    (".html", "text/html"),
    (".png", "image/png"),
    (".jpg", "image/jpeg"),
    (".jpeg", "image/jpeg"),
    (".gif", "image/gif"),
    (".svg", "image/svg+xml"),
];

/// Resolve the content type of an attachment
///
/// An explicit MIME always wins. Otherwise the extension of `hint` (the text
/// from its last `.`, which must not be the first character) is looked up in
/// a static table.
pub fn detect(explicit: Option<&str>, hint: Option<&str>) -> String {
    if let Some(mime) = explicit.filter(|m| !m.is_empty()) {
        return mime.to_string();
    }

    hint.and_then(extension)
        .and_then(|ext| {
            EXT_TO_MIME
                .iter()
                .find(|(known, _)| known.eq_ignore_ascii_case(ext))
                .map(|(_, mime)| *mime)
        })
        .unwrap_or(UNKNOWN_MIME)
        .to_string()
}

fn extension(hint: &str) -> Option<&str> {
    match hint.rfind('.') {
        Some(n) if n > 0 => Some(&hint[n..]),
        _ => None,
    }
}
