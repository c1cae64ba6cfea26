//! Extension and mimetype derivation.

/// Fallback mimetype for unknown binary content.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Lowercase extension of a file name without the dot.
///
/// Leading-dot names such as `.profile` have no extension.
pub fn extension(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Guess a mimetype from a lowercase extension.
pub fn from_extension(ext: &str) -> Option<&'static str> {
    mime_guess::from_ext(ext).first_raw()
}

/// Sniff a mimetype from content bytes. Unrecognized UTF-8 is plain text.
pub fn sniff(data: &[u8]) -> &'static str {
    match infer::get(data) {
        Some(kind) => kind.mime_type(),
        None if std::str::from_utf8(data).is_ok() => "text/plain",
        None => OCTET_STREAM,
    }
}

/// Resolve the mimetype of a file from its name, falling back to a
/// previously sniffed value, then to `application/octet-stream`.
pub fn resolve(name: &str, sniffed: Option<&str>) -> String {
    extension(name)
        .as_deref()
        .and_then(from_extension)
        .or(sniffed)
        .unwrap_or(OCTET_STREAM)
        .to_string()
}
