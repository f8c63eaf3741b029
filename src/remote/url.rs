use anyhow::{Context, Result};
use reqwest::Url;

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'~')
}

fn encode_segment(segment: &str, escape_dots: bool) -> String {
    let mut out = String::with_capacity(segment.len());
    for b in segment.bytes() {
        if is_unreserved(b) || (b == b'.' && !escape_dots) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

/// Encode a repository path as a single URL path component
///
/// Separators become `%2F`. A `.` in any segment but the last becomes `%2E`
/// so directory names never read as file extensions to the API router.
pub fn encode_path(path: &str) -> String {
    let path = path.trim_matches('/');
    let segments: Vec<&str> = path.split('/').collect();
    let last = segments.len().saturating_sub(1);
    segments
        .iter()
        .enumerate()
        .map(|(i, s)| encode_segment(s, i != last))
        .collect::<Vec<_>>()
        .join("%2F")
}

/// Decode a percent-encoded path component
pub fn decode_path(encoded: &str) -> String {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let decoded = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(b) = decoded {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Build `base` with the given query parameters, form-encoding every value
pub fn with_query(base: &str, params: &[(&str, String)]) -> Result<Url> {
    Url::parse_with_params(base, params.iter().map(|(k, v)| (*k, v.as_str())))
        .with_context(|| format!("Invalid URL: {base}"))
}
