//! Image sets backed by a local directory.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use super::cursor::Cursor;
use super::{ImageResource, ResourceError};
use crate::scrape::ImageExtensions;

/// The image files of one directory, sorted by name.
#[derive(Debug, Clone)]
pub struct LocalImageSet {
    target: String,
    dir: PathBuf,
    files: Vec<String>,
    cursor: Cursor,
}

/// Opens a directory, or the directory containing an image file.
///
/// A directory starts at its first image. A file starts at that file; when
/// the file is not itself an image the cursor starts at the first image.
///
/// # Errors
///
/// Returns [`ResourceError::NotFound`] if `target` does not exist and
/// [`ResourceError::Io`] if the directory cannot be listed.
#[instrument(skip(target), fields(path = %target.as_ref().display()))]
pub fn open_local(target: impl AsRef<Path>) -> Result<LocalImageSet, ResourceError> {
    let target = target.as_ref();
    if !target.exists() {
        return Err(ResourceError::not_found(target));
    }

    let (dir, selected) = if target.is_dir() {
        (target.to_path_buf(), None)
    } else {
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let name = target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        (dir, name)
    };

    let files = list_images(&dir, &ImageExtensions::default())?;
    let position = selected
        .and_then(|name| files.iter().position(|file| *file == name))
        .unwrap_or(0);
    debug!(dir = %dir.display(), count = files.len(), position, "opened local image set");

    Ok(LocalImageSet {
        target: target.display().to_string(),
        cursor: Cursor::new(files.len(), position),
        dir,
        files,
    })
}

/// Sorted names of the regular files in `dir` with an image extension.
fn list_images(dir: &Path, extensions: &ImageExtensions) -> Result<Vec<String>, ResourceError> {
    let entries = fs::read_dir(dir).map_err(|e| ResourceError::io(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ResourceError::io(dir, e))?;
        if !entry.file_type().is_ok_and(|kind| kind.is_file()) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if extensions.matches(&name) {
            files.push(name);
        }
    }
    files.sort();
    Ok(files)
}

impl LocalImageSet {
    /// The directory being browsed.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Image file names in navigation order.
    #[must_use]
    pub fn files(&self) -> &[String] {
        &self.files
    }

    fn path_at(&self, index: Option<usize>) -> Option<PathBuf> {
        index
            .and_then(|i| self.files.get(i))
            .map(|name| self.dir.join(name))
    }
}

impl ImageResource for LocalImageSet {
    fn target(&self) -> &str {
        &self.target
    }

    fn current(&self) -> Option<PathBuf> {
        self.path_at(self.cursor.get())
    }

    fn prev(&mut self) -> Option<PathBuf> {
        let index = self.cursor.retreat();
        self.path_at(index)
    }

    fn next(&mut self) -> Option<PathBuf> {
        let index = self.cursor.advance();
        self.path_at(index)
    }

    fn len(&self) -> usize {
        self.cursor.len()
    }

    fn index(&self) -> usize {
        self.cursor.position()
    }

    fn current_id(&self) -> Option<String> {
        self.current().map(|path| path.display().to_string())
    }
}
