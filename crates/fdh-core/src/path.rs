// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Lexical path normalization
//!
//! Paths are only rewritten, never resolved: separators are collapsed and the
//! result is anchored as either absolute (`/...`) or explicitly relative
//! (`./...`). `.` and `..` segments after the first one are kept verbatim.

/// Canonical form of `path`.
///
/// An empty input stays empty, which callers treat as "no path" rather than
/// the current directory.
pub fn normalize(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }

    let mut segments = path.split('/');
    let mut out = String::with_capacity(path.len() + 2);

    match segments.next() {
        Some("") => out.push('/'),
        Some(".") => out.push('.'),
        Some(first) => {
            out.push_str("./");
            out.push_str(first);
        }
        None => {}
    }

    for segment in segments.filter(|s| !s.is_empty()) {
        if !out.ends_with('/') {
            out.push('/');
        }
        out.push_str(segment);
    }

    out
}

/// Lexical parent of an already canonical path.
///
/// Returns `None` for the empty path and for `.`, whose parent depends on the
/// working directory. The root is its own parent.
pub fn parent_of(canonical: &str) -> Option<String> {
    if canonical.is_empty() || canonical == "." {
        return None;
    }
    if canonical == "/" {
        return Some("/".to_string());
    }

    let (head, last) = canonical.rsplit_once('/')?;
    if last == "." || last == ".." {
        return Some(format!("{canonical}/.."));
    }
    if head.is_empty() {
        Some("/".to_string())
    } else {
        Some(head.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization_table() {
        let cases = [
            ("", ""),
            ("./", "."),
            ("..", "./.."),
            ("a", "./a"),
            ("a//b/", "./a/b"),
            ("/", "/"),
            ("//a", "/a"),
        ];
        for (input, expected) in cases {
            assert_eq!(normalize(input), expected, "normalize({input:?})");
        }
    }

    #[test]
    fn test_dot_segments_pass_through() {
        assert_eq!(normalize("a/../b"), "./a/../b");
        assert_eq!(normalize("/usr/./lib/"), "/usr/./lib");
        assert_eq!(normalize("./."), "./.");
        assert_eq!(normalize("."), ".");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for input in ["a//b", "/x///y/", "./q", "..//..", "/"] {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "input {input:?}");
        }
    }

    #[test]
    fn test_parent_of_absolute_paths() {
        assert_eq!(parent_of("/"), Some("/".to_string()));
        assert_eq!(parent_of("/etc"), Some("/".to_string()));
        assert_eq!(parent_of("/etc/ssl/certs"), Some("/etc/ssl".to_string()));
    }

    #[test]
    fn test_parent_of_relative_paths() {
        assert_eq!(parent_of("./a"), Some(".".to_string()));
        assert_eq!(parent_of("./a/b"), Some("./a".to_string()));
        assert_eq!(parent_of("./.."), Some("./../..".to_string()));
        assert_eq!(parent_of("/tmp/."), Some("/tmp/./..".to_string()));
    }

    #[test]
    fn test_parent_of_needs_working_directory() {
        assert_eq!(parent_of("."), None);
        assert_eq!(parent_of(""), None);
    }
}
