//! Cache file naming for downloaded images.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use url::Url;

/// Derives the cache file name for `url` from its final path segment.
///
/// The segment is percent-decoded and sanitized. Returns `None` when the URL
/// does not parse or has no usable final segment (`http://h/dir/`).
pub(crate) fn cache_file_name(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    if last.is_empty() {
        return None;
    }

    let decoded = urlencoding::decode(last).map_or_else(|_| last.to_string(), |d| d.into_owned());
    let sanitized = sanitize_file_name(&decoded);
    if sanitized.trim_matches('_').is_empty() {
        return None;
    }
    Some(sanitized)
}

/// Replaces characters that are invalid on common filesystems:
/// / \ : * ? " < > |
pub(crate) fn sanitize_file_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_plain_segment(&sanitized) {
        sanitized
    } else {
        sanitized.replace('.', "_")
    }
}

/// Picks a path in `dir` for `file_name` that is not reserved yet.
///
/// `x.png` is tried first, then `x_2.png`, `x_3.png`, ... The chosen name is
/// inserted into `reserved`. Only `reserved` is consulted, never the disk:
/// `dir` belongs to one registry and starts empty.
pub(crate) fn reserve_unique_path(
    dir: &Path,
    file_name: &str,
    reserved: &mut HashSet<String>,
) -> PathBuf {
    let (stem, ext) = match file_name.rfind('.') {
        Some(pos) if pos > 0 => (&file_name[..pos], &file_name[pos..]),
        _ => (file_name, ""),
    };

    let mut candidate = file_name.to_string();
    let mut suffix = 2usize;
    while reserved.contains(&candidate) {
        candidate = format!("{stem}_{suffix}{ext}");
        suffix += 1;
    }

    let path = dir.join(&candidate);
    reserved.insert(candidate);
    path
}

fn is_plain_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}
