//! Distributed filesystem paths
//!
//! A [`Path`] is an immutable ordered sequence of non-empty components. Its
//! string form joins the components with `/` and always starts with `/`; the
//! empty sequence is the root. The characters `/` and `:` never appear inside
//! a component, and `.` and `..` are not components.

use crate::error::DfsError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, PathBuf};
use std::str::FromStr;
use tracing::warn;
use walkdir::WalkDir;

/// Path separator
pub const SEPARATOR: char = '/';

/// Reserved for application use, never valid inside a path
pub const RESERVED: char = ':';

/// Hierarchical path shared by every filesystem interface
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Path {
    components: Vec<String>,
}

impl Path {
    /// The root directory.
    pub fn root() -> Self {
        Path {
            components: Vec::new(),
        }
    }

    /// Parse a path string.
    ///
    /// Runs of `/` collapse to one and a trailing `/` is dropped. Fails when the
    /// string is empty, does not start with `/`, contains `:`, or has a `.` or
    /// `..` component.
    pub fn parse(s: &str) -> Result<Self, DfsError> {
        if s.is_empty() {
            return Err(DfsError::InvalidPath("empty path string".to_string()));
        }
        if !s.starts_with(SEPARATOR) {
            return Err(DfsError::InvalidPath(format!(
                "path must start with '/': {}",
                s
            )));
        }
        if s.contains(RESERVED) {
            return Err(DfsError::InvalidPath(format!(
                "path may not contain ':': {}",
                s
            )));
        }
        let mut components = Vec::new();
        for component in s.split(SEPARATOR).filter(|c| !c.is_empty()) {
            validate_component(component)?;
            components.push(component.to_string());
        }
        Ok(Path { components })
    }

    /// Return a new path with `component` appended.
    pub fn join(&self, component: &str) -> Result<Self, DfsError> {
        validate_component(component)?;
        let mut components = self.components.clone();
        components.push(component.to_string());
        Ok(Path { components })
    }

    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// The path with its last component removed. Fails on the root.
    pub fn parent(&self) -> Result<Self, DfsError> {
        match self.components.split_last() {
            Some((_, rest)) => Ok(Path {
                components: rest.to_vec(),
            }),
            None => Err(DfsError::InvalidPath(
                "the root directory has no parent".to_string(),
            )),
        }
    }

    /// The final component. Fails on the root.
    pub fn last(&self) -> Result<&str, DfsError> {
        self.components.last().map(String::as_str).ok_or_else(|| {
            DfsError::InvalidPath("the root directory has no last component".to_string())
        })
    }

    /// Ordered view over the components; each call starts a fresh iteration.
    pub fn components(&self) -> impl Iterator<Item = &str> + '_ {
        self.components.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Whether `other` is a prefix of this path. Every path is a subpath of itself.
    pub fn is_subpath(&self, other: &Path) -> bool {
        self.components.starts_with(&other.components)
    }

    /// Map this path under a local directory.
    ///
    /// Every component must be a single plain file name, so the result never
    /// leaves `root`.
    pub fn to_local(&self, root: &std::path::Path) -> Result<PathBuf, DfsError> {
        let mut local = root.to_path_buf();
        for component in &self.components {
            let mut parts = std::path::Path::new(component).components();
            match (parts.next(), parts.next()) {
                (Some(Component::Normal(_)), None) => local.push(component),
                _ => {
                    return Err(DfsError::InvalidPath(format!(
                        "{} does not map under {}",
                        self,
                        root.display()
                    )))
                }
            }
        }
        Ok(local)
    }
}

fn validate_component(component: &str) -> Result<(), DfsError> {
    if component.is_empty() {
        return Err(DfsError::InvalidPath("empty path component".to_string()));
    }
    if component.contains(SEPARATOR) || component.contains(RESERVED) {
        return Err(DfsError::InvalidPath(format!(
            "component may not contain '/' or ':': {}",
            component
        )));
    }
    if component == "." || component == ".." {
        return Err(DfsError::InvalidPath(format!(
            "'{}' is not a valid path component",
            component
        )));
    }
    Ok(())
}

impl TryFrom<Vec<String>> for Path {
    type Error = DfsError;

    fn try_from(components: Vec<String>) -> Result<Self, Self::Error> {
        for component in &components {
            validate_component(component)?;
        }
        Ok(Path { components })
    }
}

impl From<Path> for Vec<String> {
    fn from(path: Path) -> Self {
        path.components
    }
}

impl Default for Path {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "{}", SEPARATOR);
        }
        for component in &self.components {
            write!(f, "{}{}", SEPARATOR, component)?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = DfsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a str;
    type IntoIter = std::iter::Map<std::slice::Iter<'a, String>, fn(&'a String) -> &'a str>;

    fn into_iter(self) -> Self::IntoIter {
        self.components
            .iter()
            .map(String::as_str as fn(&'a String) -> &'a str)
    }
}

/// List every regular file beneath `root`, as paths relative to it.
///
/// Entries are returned in depth-first order with siblings sorted by name.
/// Files whose names cannot be expressed as path components are skipped.
pub fn enumerate_local_files(root: &std::path::Path) -> Result<Vec<Path>, DfsError> {
    if !root.exists() {
        return Err(DfsError::NotFound(format!(
            "local directory {} does not exist",
            root.display()
        )));
    }
    if !root.is_dir() {
        return Err(DfsError::NotADirectory(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| DfsError::Io(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = match entry.path().strip_prefix(root) {
            Ok(relative) => relative,
            Err(_) => continue,
        };
        match relative_to_path(relative) {
            Ok(path) => paths.push(path),
            Err(e) => {
                warn!(file = %entry.path().display(), error = %e, "Skipping unnameable local file");
            }
        }
    }
    Ok(paths)
}

fn relative_to_path(relative: &std::path::Path) -> Result<Path, DfsError> {
    let mut path = Path::root();
    for component in relative.components() {
        let name = component.as_os_str().to_str().ok_or_else(|| {
            DfsError::InvalidPath(format!("non UTF-8 file name: {}", relative.display()))
        })?;
        path = path.join(name)?;
    }
    Ok(path)
}
