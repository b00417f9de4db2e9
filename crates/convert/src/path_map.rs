//! Destination path mapping.
//!
//! Maps a source image path to the path its converted output is written to.
//! Pure functions only: nothing here touches the filesystem.

use std::ffi::{OsStr, OsString};
use std::path::{Component, Path, PathBuf};

/// Computes the destination path for `source` converted to `extension`.
///
/// The source extension is replaced by `extension`. Without an output root
/// (`None` or an empty path) the destination sits next to the source. With
/// one, the source's directory is normalised lexically and joined under it:
/// - root and prefix components are dropped, so absolute sources are re-rooted
/// - `.` components are dropped
/// - `..` removes the preceding normal component, or is discarded if there is none
///
/// The result therefore never escapes `output_dir`, whatever the number of
/// leading `..` segments.
///
/// # Example
///
/// ```
/// use std::path::{Path, PathBuf};
/// use kelp::path_map::destination_path;
///
/// let dest = destination_path(Path::new("a/b/c.tmp"), "png", Some(Path::new("out")));
/// assert_eq!(dest, PathBuf::from("out/a/b/c.png"));
/// ```
pub fn destination_path(source: &Path, extension: &str, output_dir: Option<&Path>) -> PathBuf {
    let file_name = destination_file_name(source, extension);
    let parent = source.parent().unwrap_or_else(|| Path::new(""));

    match output_dir.filter(|dir| !dir.as_os_str().is_empty()) {
        None => parent.join(file_name),
        Some(root) => root.join(contained_relative(parent)).join(file_name),
    }
}

/// `<stem>.<extension>`; a path without a file name yields an empty stem.
fn destination_file_name(source: &Path, extension: &str) -> OsString {
    let mut name = source
        .file_stem()
        .map(OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".");
    name.push(extension);
    name
}

/// Lexically normalised relative form of `dir` that cannot climb above its start.
fn contained_relative(dir: &Path) -> PathBuf {
    let mut parts: Vec<&OsStr> = Vec::new();
    for component in dir.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::ParentDir => {
                parts.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    parts.into_iter().collect()
}
