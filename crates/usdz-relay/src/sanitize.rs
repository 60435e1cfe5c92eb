//! Helpers for sanitizing paths before they enter log lines, span attributes
//! or the public download tree.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

static RE_UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_.-]").unwrap());

/// Returns only the filename component of a path (no directory).
///
/// Safe for span fields: reveals the file name without exposing the upload
/// location.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Turns an arbitrary name into a single safe directory component.
///
/// Non-ASCII characters are dropped, whitespace becomes `_`, anything outside
/// `[A-Za-z0-9_.-]` is removed and leading/trailing `.` and `_` are trimmed so
/// the result can never be `..` or a hidden directory. Returns `None` when
/// nothing usable remains.
pub fn secure_dir_name(name: &str) -> Option<String> {
    let ascii: String = name
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c.is_ascii_whitespace() { '_' } else { c })
        .collect();
    let cleaned = RE_UNSAFE_CHARS.replace_all(&ascii, "");
    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');

    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_path_returns_filename() {
        assert_eq!(
            redact_path(Path::new("/srv/uploads/up_42/robot.abc")),
            "robot.abc"
        );
    }

    #[test]
    fn test_redact_path_no_filename() {
        assert_eq!(redact_path(Path::new("/")), "<unknown>");
    }

    #[test]
    fn test_secure_dir_name_keeps_safe_names() {
        assert_eq!(secure_dir_name("up_42").as_deref(), Some("up_42"));
        assert_eq!(secure_dir_name("scene-v1.2").as_deref(), Some("scene-v1.2"));
    }

    #[test]
    fn test_secure_dir_name_replaces_whitespace_and_strips_symbols() {
        assert_eq!(
            secure_dir_name("my upload (2)").as_deref(),
            Some("my_upload_2")
        );
        assert_eq!(secure_dir_name("../../etc").as_deref(), Some("etc"));
    }

    #[test]
    fn test_secure_dir_name_rejects_empty_results() {
        assert_eq!(secure_dir_name(""), None);
        assert_eq!(secure_dir_name(".."), None);
        assert_eq!(secure_dir_name("äöü"), None);
    }
}
