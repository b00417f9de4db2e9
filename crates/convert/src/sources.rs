//! Source resolution for kelp
//!
//! Turns command-line arguments into the list of files a batch converts:
//! glob patterns are expanded, directories are walked for image files and
//! anything else is taken literally.

use crate::codec::SOURCE_EXTENSIONS;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// Characters that make an argument a glob pattern
const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// Checks if an argument should be expanded as a glob pattern.
pub fn is_glob_pattern(arg: &str) -> bool {
    arg.contains(GLOB_META)
}

/// Checks if a file has a decodable image extension (case-insensitive).
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SOURCE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Expands `{a,b}` alternatives into one pattern per alternative.
///
/// Braces nest; an unbalanced `{` is kept literally.
/// For example: `img/*.{png,jp{e,}g}` -> `img/*.png`, `img/*.jpeg`, `img/*.jpg`
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let Some(open) = pattern.find('{') else {
        return vec![pattern.to_string()];
    };

    let mut depth = 0usize;
    let mut close = None;
    let mut commas = Vec::new();
    for (offset, c) in pattern[open..].char_indices() {
        let index = open + offset;
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(index);
                    break;
                }
            }
            ',' if depth == 1 => commas.push(index),
            _ => {}
        }
    }

    let Some(close) = close else {
        return vec![pattern.to_string()];
    };

    let prefix = &pattern[..open];
    let suffix = &pattern[close + 1..];
    let mut start = open + 1;
    let mut expanded = Vec::new();
    for end in commas.into_iter().chain(std::iter::once(close)) {
        let alternative = &pattern[start..end];
        expanded.extend(expand_braces(&format!("{}{}{}", prefix, alternative, suffix)));
        start = end + 1;
    }
    expanded
}

/// Expands one glob pattern (with `{}` alternatives and recursive `**`) to the files it matches.
///
/// Invalid patterns and unreadable entries are logged and skipped.
pub fn expand_pattern(pattern: &str) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for candidate in expand_braces(pattern) {
        let paths = match glob::glob(&candidate) {
            Ok(paths) => paths,
            Err(e) => {
                warn!(pattern = %candidate, "invalid pattern: {}", e);
                continue;
            }
        };

        for entry in paths {
            match entry {
                Ok(path) if path.is_file() => files.push(path),
                Ok(_) => {}
                Err(e) => warn!(pattern = %candidate, "{}", e),
            }
        }
    }

    files
}

/// Recursively collects image files under `root`.
///
/// This function:
/// - Skips hidden directories (names starting with `.`) below the root
/// - Keeps only files with a decodable image extension (case-insensitive)
/// - Returns files in a stable, name-sorted order
pub fn scan_directory(root: &Path) -> Vec<PathBuf> {
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.file_type().is_dir() && entry.depth() > 0 {
                if let Some(name) = entry.file_name().to_str() {
                    return !name.starts_with('.');
                }
            }
            true
        });

    let mut files = Vec::new();
    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() && is_image_file(entry.path()) => {
                files.push(entry.into_path());
            }
            Ok(_) => {}
            Err(e) => warn!(root = %root.display(), "{}", e),
        }
    }
    files
}

/// Resolves command-line arguments to source files.
///
/// - Directories are walked recursively for image files
/// - Existing files are kept as given, even if their names contain `*?[{`
/// - Other glob patterns are expanded; a pattern with no match contributes nothing
/// - Anything else is kept as given, so a missing file fails later as a per-file error
///
/// Argument order is preserved and duplicates are dropped.
pub fn resolve_sources<S: AsRef<str>>(args: &[S]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut sources = Vec::new();

    for arg in args {
        let arg = arg.as_ref();
        let path = Path::new(arg);
        // An existing path is never a pattern, whatever characters its name contains
        let resolved = if path.is_dir() {
            scan_directory(path)
        } else if path.exists() || !is_glob_pattern(arg) {
            vec![PathBuf::from(arg)]
        } else {
            let matches = expand_pattern(arg);
            if matches.is_empty() {
                warn!(pattern = %arg, "no files match pattern");
            }
            matches
        };

        for path in resolved {
            if seen.insert(path.clone()) {
                sources.push(path);
            }
        }
    }

    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fs::{self, File};
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        File::create(path).unwrap();
    }

    fn pattern_in(dir: &TempDir, pattern: &str) -> String {
        format!("{}/{}", dir.path().display(), pattern)
    }

    #[test]
    fn test_is_glob_pattern() {
        assert!(is_glob_pattern("testdata/*.tmp"));
        assert!(is_glob_pattern("testdata/**/*.tmp"));
        assert!(is_glob_pattern("img?.png"));
        assert!(is_glob_pattern("img[0-9].png"));
        assert!(is_glob_pattern("*.{png,jpg}"));
        assert!(!is_glob_pattern("testdata/plain.png"));
    }

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file(Path::new("a/photo.png")));
        assert!(is_image_file(Path::new("a/photo.JPEG")));
        assert!(is_image_file(Path::new("a/photo.Tif")));
        assert!(!is_image_file(Path::new("a/notes.txt")));
        assert!(!is_image_file(Path::new("a/photo"))); // no extension
    }

    #[test]
    fn test_expand_braces() {
        assert_eq!(expand_braces("a/*.png"), vec!["a/*.png"]);
        assert_eq!(expand_braces("*.{tmp,tmp2}"), vec!["*.tmp", "*.tmp2"]);
        assert_eq!(
            expand_braces("{a,b}/{c,d}"),
            vec!["a/c", "a/d", "b/c", "b/d"]
        );
        assert_eq!(
            expand_braces("img/*.{png,jp{e,}g}"),
            vec!["img/*.png", "img/*.jpeg", "img/*.jpg"]
        );
        assert_eq!(expand_braces("x{y"), vec!["x{y"]);
        assert_eq!(expand_braces("x{}y"), vec!["xy"]);
    }

    #[test]
    fn test_glob_single_level() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("one.tmp"));
        touch(&dir.path().join("two.tmp"));
        touch(&dir.path().join("sub/three.tmp"));

        let found = resolve_sources(&[pattern_in(&dir, "*.tmp")]);

        assert_eq!(
            found,
            vec![dir.path().join("one.tmp"), dir.path().join("two.tmp")]
        );
    }

    #[test]
    fn test_glob_recursive_with_braces() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a.tmp"));
        touch(&dir.path().join("b.tmp2"));
        touch(&dir.path().join("dir1/c.tmp"));
        touch(&dir.path().join("dir1/dir2/d.tmp2"));
        touch(&dir.path().join("dir1/dir2/ignored.txt"));

        let found: HashSet<PathBuf> = resolve_sources(&[pattern_in(&dir, "**/*.{tmp,tmp2}")])
            .into_iter()
            .collect();

        let expected: HashSet<PathBuf> = ["a.tmp", "b.tmp2", "dir1/c.tmp", "dir1/dir2/d.tmp2"]
            .iter()
            .map(|p| dir.path().join(p))
            .collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn test_directory_walk_filters_and_skips_hidden() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("b.png"));
        touch(&dir.path().join("a.JPG"));
        touch(&dir.path().join("notes.txt"));
        touch(&dir.path().join("nested/c.webp"));
        touch(&dir.path().join(".cache/d.png"));

        let found = resolve_sources(&[dir.path().to_string_lossy().to_string()]);

        assert_eq!(
            found,
            vec![
                dir.path().join("a.JPG"),
                dir.path().join("b.png"),
                dir.path().join("nested/c.webp"),
            ]
        );
    }

    #[test]
    fn test_literal_paths_kept_even_if_missing() {
        let found = resolve_sources(&["does/not/exist.png", "other.tmp"]);
        assert_eq!(
            found,
            vec![PathBuf::from("does/not/exist.png"), PathBuf::from("other.tmp")]
        );
    }

    #[test]
    fn test_unmatched_pattern_contributes_nothing() {
        let dir = TempDir::new().unwrap();
        assert!(resolve_sources(&[pattern_in(&dir, "*.nothing")]).is_empty());
    }

    #[test]
    fn test_existing_files_with_pattern_characters_taken_literally() {
        let dir = TempDir::new().unwrap();
        let bracket = dir.path().join("photo[1].png");
        let brace = dir.path().join("shot{a}.png");
        touch(&bracket);
        touch(&brace);
        // what the patterns would match if expanded
        touch(&dir.path().join("photo1.png"));
        touch(&dir.path().join("shota.png"));

        let args: Vec<String> = [&bracket, &brace]
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect();
        let found = resolve_sources(&args);

        assert_eq!(found, vec![bracket, brace]);
    }

    #[test]
    fn test_missing_name_with_brackets_still_expands() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("photo1.png"));

        let found = resolve_sources(&[pattern_in(&dir, "photo[1].png")]);
        assert_eq!(found, vec![dir.path().join("photo1.png")]);
    }

    #[test]
    fn test_duplicates_removed_keeping_first() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("x.png");
        touch(&file);
        let literal = file.to_string_lossy().to_string();

        let found = resolve_sources(&[literal.clone(), pattern_in(&dir, "*.png"), literal]);
        assert_eq!(found, vec![file]);
    }

    // **Property: brace expansion yields one pattern per alternative**
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_brace_alternatives(
            prefix in "[a-z/]{0,8}",
            alternatives in prop::collection::vec("[a-z0-9]{1,5}", 1..6),
            suffix in "[a-z.]{0,6}",
        ) {
            let pattern = format!("{}{{{}}}{}", prefix, alternatives.join(","), suffix);
            let expanded = expand_braces(&pattern);

            let expected: Vec<String> = alternatives
                .iter()
                .map(|alt| format!("{}{}{}", prefix, alt, suffix))
                .collect();
            prop_assert_eq!(expanded, expected);
        }
    }
}
