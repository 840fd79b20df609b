//! Song name validation and path containment.
//!
//! Two independent checks guard every filesystem join: [`is_valid_song_name`]
//! on the raw name, then [`contained_path`] on the composed path.

use std::path::{Component, Path, PathBuf};

/// Maximum song name length, in characters.
pub const MAX_SONG_NAME_LEN: usize = 120;

/// Whether `name` has a chart extension (`.pro` / `.cho`, any case).
pub fn has_chart_extension(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.ends_with(".pro") || lower.ends_with(".cho")
}

/// Whether `name` is an acceptable chart file name.
///
/// Must end in `.pro` / `.cho` (any case), contain no `..`, `/` or `\`, and
/// be at most [`MAX_SONG_NAME_LEN`] characters.
pub fn is_valid_song_name(name: &str) -> bool {
    has_chart_extension(name)
        && !name.contains("..")
        && !name.contains('/')
        && !name.contains('\\')
        && name.chars().count() <= MAX_SONG_NAME_LEN
}

/// Join `name` onto `root` and return the result only if it stays strictly
/// inside `root`.
///
/// The check is lexical: `.` and `..` components are resolved without
/// touching the filesystem. `root` must already be absolute.
pub fn contained_path(root: &Path, name: &str) -> Option<PathBuf> {
    let candidate = normalize(&root.join(name));
    let root = normalize(root);
    (candidate != root && candidate.starts_with(&root)).then_some(candidate)
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let _ = out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
