//! Directory tree node types
//!
//! The naming server's view of the filesystem. Directories exist only here;
//! files additionally carry the storage servers that hold them.

use crate::error::DfsError;
use crate::path::Path;
use crate::types::{CommandStub, StorageStub};
use std::collections::BTreeMap;

/// A storage server as seen by the naming server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageBinding {
    pub storage: StorageStub,
    pub command: CommandStub,
}

/// File node representation
#[derive(Debug, Clone)]
pub struct FileNode {
    pub primary: StorageBinding,
    /// Additional copies, never containing `primary`
    pub replicas: Vec<StorageBinding>,
}

impl FileNode {
    pub fn new(primary: StorageBinding) -> Self {
        Self {
            primary,
            replicas: Vec::new(),
        }
    }

    /// Primary first, then replicas.
    pub fn holders(&self) -> impl Iterator<Item = &StorageBinding> {
        std::iter::once(&self.primary).chain(self.replicas.iter())
    }
}

/// Directory node representation
#[derive(Debug, Clone, Default)]
pub struct DirectoryNode {
    pub children: BTreeMap<String, Node>,
}

/// Tree node type
#[derive(Debug, Clone)]
pub enum Node {
    File(FileNode),
    Directory(DirectoryNode),
}

impl Node {
    pub fn is_directory(&self) -> bool {
        matches!(self, Node::Directory(_))
    }
}

/// Outcome of grafting one registered file into the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Graft {
    Added,
    /// The path, or a file on the way to it, already exists
    Duplicate,
    /// The root cannot be a file
    Skipped,
}

/// The whole namespace, rooted at an always-present directory
#[derive(Debug, Clone, Default)]
pub struct DirectoryTree {
    root: DirectoryNode,
}

impl DirectoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Node at `path`. Always `None` for the root, which has no node of its
    /// own; use [`DirectoryTree::directory`] for it.
    pub fn lookup(&self, path: &Path) -> Option<&Node> {
        let parent = path.parent().ok()?;
        let name = path.last().ok()?;
        self.walk(&parent).ok()?.children.get(name)
    }

    pub fn exists(&self, path: &Path) -> bool {
        path.is_root() || self.lookup(path).is_some()
    }

    pub fn is_directory(&self, path: &Path) -> Result<bool, DfsError> {
        if path.is_root() {
            return Ok(true);
        }
        self.lookup(path)
            .map(Node::is_directory)
            .ok_or_else(|| DfsError::NotFound(format!("{} does not exist", path)))
    }

    /// Directory at `path`. `NotFound` when missing or a file.
    pub fn directory(&self, path: &Path) -> Result<&DirectoryNode, DfsError> {
        self.walk(path)
    }

    /// File at `path`. `NotFound` when missing or a directory.
    pub fn file(&self, path: &Path) -> Result<&FileNode, DfsError> {
        match self.lookup(path) {
            Some(Node::File(file)) => Ok(file),
            Some(Node::Directory(_)) => {
                Err(DfsError::NotFound(format!("{} is a directory", path)))
            }
            None => Err(DfsError::NotFound(format!("{} does not exist", path))),
        }
    }

    fn walk(&self, path: &Path) -> Result<&DirectoryNode, DfsError> {
        let mut dir = &self.root;
        for component in path.components() {
            dir = match dir.children.get(component) {
                Some(Node::Directory(child)) => child,
                Some(Node::File(_)) => {
                    return Err(DfsError::NotFound(format!(
                        "{} is not a directory (at {})",
                        path, component
                    )))
                }
                None => return Err(DfsError::NotFound(format!("{} does not exist", path))),
            };
        }
        Ok(dir)
    }

    fn walk_mut(&mut self, path: &Path) -> Result<&mut DirectoryNode, DfsError> {
        let mut dir = &mut self.root;
        for component in path.components() {
            dir = match dir.children.get_mut(component) {
                Some(Node::Directory(child)) => child,
                Some(Node::File(_)) => {
                    return Err(DfsError::NotFound(format!(
                        "{} is not a directory (at {})",
                        path, component
                    )))
                }
                None => return Err(DfsError::NotFound(format!("{} does not exist", path))),
            };
        }
        Ok(dir)
    }

    /// Insert `node` at `path`. The parent must be an existing directory.
    /// Returns `false` if something already occupies the name.
    pub fn insert(&mut self, path: &Path, node: Node) -> Result<bool, DfsError> {
        let name = path.last()?.to_string();
        let parent = self.walk_mut(&path.parent()?)?;
        if parent.children.contains_key(&name) {
            return Ok(false);
        }
        parent.children.insert(name, node);
        Ok(true)
    }

    /// Detach and return the node at `path`.
    pub fn remove(&mut self, path: &Path) -> Option<Node> {
        let parent = path.parent().ok()?;
        let name = path.last().ok()?;
        self.walk_mut(&parent).ok()?.children.remove(name)
    }

    /// Add a registered file, creating missing directories on the way.
    pub fn graft(&mut self, path: &Path, binding: &StorageBinding) -> Graft {
        let (parent, name) = match (path.parent(), path.last()) {
            (Ok(parent), Ok(name)) => (parent, name),
            _ => return Graft::Skipped,
        };

        let mut dir = &mut self.root;
        for component in parent.components() {
            let child = dir
                .children
                .entry(component.to_string())
                .or_insert_with(|| Node::Directory(DirectoryNode::default()));
            dir = match child {
                Node::Directory(child) => child,
                Node::File(_) => return Graft::Duplicate,
            };
        }

        if dir.children.contains_key(name) {
            return Graft::Duplicate;
        }
        dir.children
            .insert(name.to_string(), Node::File(FileNode::new(binding.clone())));
        Graft::Added
    }

    /// Record `binding` as a replica of the file at `path`. Returns `false`
    /// if it already holds the file.
    pub fn add_replica(&mut self, path: &Path, binding: StorageBinding) -> Result<bool, DfsError> {
        let parent = self.walk_mut(&path.parent()?)?;
        let name = path.last()?;
        match parent.children.get_mut(name) {
            Some(Node::File(file)) => {
                if file.holders().any(|holder| *holder == binding) {
                    return Ok(false);
                }
                file.replicas.push(binding);
                Ok(true)
            }
            Some(Node::Directory(_)) => {
                Err(DfsError::NotFound(format!("{} is a directory", path)))
            }
            None => Err(DfsError::NotFound(format!("{} does not exist", path))),
        }
    }

    /// Number of files in the tree.
    pub fn file_count(&self) -> usize {
        fn count(dir: &DirectoryNode) -> usize {
            dir.children
                .values()
                .map(|child| match child {
                    Node::File(_) => 1,
                    Node::Directory(sub) => count(sub),
                })
                .sum()
        }
        count(&self.root)
    }
}

/// Every file at or beneath `node`, with its full path.
pub fn collect_files(path: &Path, node: &Node, out: &mut Vec<(Path, FileNode)>) {
    match node {
        Node::File(file) => out.push((path.clone(), file.clone())),
        Node::Directory(dir) => {
            for (name, child) in &dir.children {
                if let Ok(child_path) = path.join(name) {
                    collect_files(&child_path, child, out);
                }
            }
        }
    }
}
