//! Validation of untrusted template names and search-path roots.
//!
//! Pure checks, no normalization: callers get back the input they passed in
//! or a typed failure. Both the resolver (for base paths) and the renderer
//! (for template names) route through here before touching the filesystem.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::EngineError;

/// `../` or `..\` anywhere in the input (even mid-segment, e.g. `a../b`),
/// plus `..` as a trailing full segment.
static TRAVERSAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.\.[/\\]|(^|[/\\])\.\.$").expect("traversal pattern is valid"));

/// Windows drive prefix, e.g. `C:`.
static DRIVE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]:").expect("drive pattern is valid"));

/// Validate a template name supplied by a caller (possibly request-derived).
///
/// Rejects traversal sequences (`../`, `..\`), NUL bytes, inputs that decode
/// to either of those after percent-decoding, and absolute paths (leading
/// `/`, `\`, or a drive prefix). Template names are always relative to a
/// registered search root.
pub fn sanitize_template_name(input: &str) -> Result<(), EngineError> {
    check_relative(input)?;
    check_traversal(input)
}

/// Validate a search-path root registered at setup time.
///
/// Roots are trusted locations so absolute paths are allowed, but traversal
/// sequences and NUL bytes are still rejected.
pub fn sanitize_base_path(input: &str) -> Result<(), EngineError> {
    check_traversal(input)
}

fn check_relative(input: &str) -> Result<(), EngineError> {
    if input.starts_with('/') || input.starts_with('\\') || DRIVE_PREFIX.is_match(input) {
        return Err(EngineError::PathTraversal(format!(
            "absolute path not allowed as template name: {input:?}"
        )));
    }
    Ok(())
}

fn check_traversal(input: &str) -> Result<(), EngineError> {
    if input.contains('\0') {
        return Err(EngineError::PathTraversal(
            "NUL byte in path".to_string(),
        ));
    }
    if TRAVERSAL.is_match(input) {
        return Err(EngineError::PathTraversal(format!(
            "traversal sequence in path: {input:?}"
        )));
    }
    let decoded = percent_decode(input);
    if decoded.contains('\0') || TRAVERSAL.is_match(&decoded) {
        return Err(EngineError::PathTraversal(format!(
            "traversal sequence after percent-decoding: {input:?}"
        )));
    }
    Ok(())
}

/// Single-pass percent-decoding. Malformed escapes are passed through
/// untouched; decoding exists only so encoded traversal cannot slip past
/// the literal checks above.
fn percent_decode(input: &str) -> String {
    fn hex_val(b: u8) -> Option<u8> {
        match b {
            b'0'..=b'9' => Some(b - b'0'),
            b'a'..=b'f' => Some(b - b'a' + 10),
            b'A'..=b'F' => Some(b - b'A' + 10),
            _ => None,
        }
    }

    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                out.push((hi << 4) | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        plain_traversal = { "../../etc/passwd" },
        embedded_traversal = { "page/../../secret" },
        backslash_traversal = { r"page\..\secret" },
        nul_byte = { "page\0.html" },
        encoded_dots = { "%2e%2e/etc/passwd" },
        encoded_slash = { "..%2fetc/passwd" },
        fully_encoded = { "%2e%2e%2fsecret" },
        encoded_nul = { "page%00.html" },
        trailing_dotdot = { "pages/.." },
        mid_segment_dots = { "a../b" },
        dots_inside_name = { "notes../draft" },
        stacked_dots = { "....//x" },
        absolute_unix = { "/etc/passwd" },
        absolute_backslash = { r"\windows\system32" },
        drive_letter = { r"C:\windows" },
    )]
    fn rejects_template_name(input: &str) {
        assert!(matches!(
            sanitize_template_name(input),
            Err(EngineError::PathTraversal(_))
        ));
    }

    #[parameterized(
        simple = { "index" },
        nested = { "admin/users" },
        with_extension = { "page.html" },
        dotted_name = { "user.profile" },
        double_dot_in_name = { "notes..draft" },
        percent_literal = { "100%25done" },
    )]
    fn accepts_template_name(input: &str) {
        assert!(sanitize_template_name(input).is_ok());
    }

    #[test]
    fn base_paths_may_be_absolute() {
        assert!(sanitize_base_path("/srv/app/templates").is_ok());
    }

    #[test]
    fn base_paths_still_reject_traversal() {
        assert!(matches!(
            sanitize_base_path("/srv/app/../secret"),
            Err(EngineError::PathTraversal(_))
        ));
    }

    #[test]
    fn percent_decode_leaves_malformed_escapes() {
        assert_eq!(percent_decode("50%"), "50%");
        assert_eq!(percent_decode("a%2fb"), "a/b");
        assert_eq!(percent_decode("%zz"), "%zz");
    }
}
