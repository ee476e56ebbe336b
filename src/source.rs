// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Input sources for pose inference.
//!
//! A [`Source`] names where person crops come from. [`SourceIterator`] resolves it to a
//! fixed, sorted list of pending items up front and decodes one image per step, so the
//! total is known before the first image is loaded.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use ndarray::Array3;

use crate::error::{InferenceError, Result};
use crate::preprocessing::array_to_image;

/// Image file extensions recognized when scanning directories.
pub const IMAGE_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "bmp", "gif", "webp", "tiff", "tif"];

/// Where images come from.
#[derive(Debug, Clone)]
pub enum Source {
    /// One image file.
    File(PathBuf),
    /// Explicit list of image files, kept in the given order.
    Files(Vec<PathBuf>),
    /// Every image file directly inside a directory.
    Directory(PathBuf),
    /// Single-level wildcard such as `people/*.jpg` or `crops/person_*`.
    Glob(String),
    /// Decoded image held in memory.
    Memory(DynamicImage),
}

impl Source {
    /// Build an in-memory source from an HWC RGB array.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::ImageError`] if the array is not `(H, W, 3)`.
    pub fn from_array(array: &Array3<u8>) -> Result<Self> {
        array_to_image(array).map(Self::Memory)
    }

    /// True when the source names exactly one image.
    #[must_use]
    pub const fn is_single(&self) -> bool {
        matches!(self, Self::File(_) | Self::Memory(_))
    }

    /// Filesystem location, for file and directory sources.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File(p) | Self::Directory(p) => Some(p),
            _ => None,
        }
    }
}

/// Classify a command-line style source string.
impl From<&str> for Source {
    fn from(s: &str) -> Self {
        if s.contains('*') {
            Self::Glob(s.to_owned())
        } else if Path::new(s).is_dir() {
            Self::Directory(PathBuf::from(s))
        } else {
            Self::File(PathBuf::from(s))
        }
    }
}

impl From<String> for Source {
    fn from(s: String) -> Self {
        s.as_str().into()
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        path.to_string_lossy().as_ref().into()
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        path.as_path().into()
    }
}

impl From<Vec<PathBuf>> for Source {
    fn from(paths: Vec<PathBuf>) -> Self {
        Self::Files(paths)
    }
}

impl From<DynamicImage> for Source {
    fn from(image: DynamicImage) -> Self {
        Self::Memory(image)
    }
}

/// Position of an image within its source.
#[derive(Debug, Clone)]
pub struct SourceMeta {
    /// Zero-based position.
    pub index: usize,
    /// Number of images the source resolved to.
    pub total: usize,
    /// File path, or empty for in-memory images.
    pub path: String,
}

impl Default for SourceMeta {
    fn default() -> Self {
        Self {
            index: 0,
            total: 1,
            path: String::new(),
        }
    }
}

enum Pending {
    Path(PathBuf),
    Image(DynamicImage),
}

/// Iterator decoding the images of a [`Source`] in order.
pub struct SourceIterator {
    pending: VecDeque<Pending>,
    total: usize,
    index: usize,
}

impl SourceIterator {
    /// Resolve a source into its pending images.
    ///
    /// Directory and glob matches are sorted by path.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory (or a glob's directory) is missing or unreadable.
    pub fn new(source: Source) -> Result<Self> {
        let pending: VecDeque<Pending> = match source {
            Source::File(path) => VecDeque::from([Pending::Path(path)]),
            Source::Files(paths) => paths.into_iter().map(Pending::Path).collect(),
            Source::Directory(dir) => list_dir(&dir, is_image_file)?
                .into_iter()
                .map(Pending::Path)
                .collect(),
            Source::Glob(pattern) => expand_glob(&pattern)?.into_iter().map(Pending::Path).collect(),
            Source::Memory(image) => VecDeque::from([Pending::Image(image)]),
        };

        Ok(Self {
            total: pending.len(),
            pending,
            index: 0,
        })
    }

    /// Number of images the source resolved to.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.total
    }

    /// True when the source resolved to no images.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.total == 0
    }
}

impl Iterator for SourceIterator {
    type Item = Result<(DynamicImage, SourceMeta)>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.pending.pop_front()?;
        let index = self.index;
        self.index += 1;

        let (image, path) = match item {
            Pending::Image(image) => (Ok(image), String::new()),
            Pending::Path(path) => {
                let image = image::open(&path).map_err(|e| {
                    InferenceError::ImageError(format!("Failed to load {}: {e}", path.display()))
                });
                (image, path.to_string_lossy().into_owned())
            }
        };
        let meta = SourceMeta {
            index,
            total: self.total,
            path,
        };
        Some(image.map(|image| (image, meta)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.pending.len(), Some(self.pending.len()))
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Sorted entries of `dir` accepted by `keep`.
fn list_dir(dir: &Path, keep: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(InferenceError::ImageError(format!(
            "Directory not found: {}",
            dir.display()
        )));
    }
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && keep(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Expand a wildcard in the final path component, e.g. `crops/person_*.png`.
///
/// A bare `*` (or `*.*`) keeps image files only; anything more specific matches the
/// file name literally around the star, ignoring case.
fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let pattern_path = Path::new(pattern);
    let file_pattern = pattern_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let Some((prefix, suffix)) = file_pattern.split_once('*') else {
        return Ok(vec![PathBuf::from(pattern)]);
    };
    let dir = match pattern_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let (prefix, suffix) = (prefix.to_lowercase(), suffix.to_lowercase());
    let any_image = prefix.is_empty() && (suffix.is_empty() || suffix == ".*");
    list_dir(dir, |path| {
        if any_image {
            return is_image_file(path);
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        name.len() >= prefix.len() + suffix.len() && name.starts_with(&prefix) && name.ends_with(&suffix)
    })
}
