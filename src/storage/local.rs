//! Local file store
//!
//! Implements `Storage` and `Command` against a directory on the local
//! filesystem. Path `/a/b` maps to `<root>/a/b`; nothing outside the root is
//! ever touched and there is no in-memory index.

use crate::api::{Command, Storage};
use crate::concurrency::PathLockManager;
use crate::error::DfsError;
use crate::path::Path;
use crate::types::{StorageStub, COPY_CHUNK_BYTES};
use parking_lot::RwLock;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind as IoErrorKind, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Storage backed by a local directory tree
pub struct LocalStore {
    root: PathBuf,
    /// Shared by size/read/write, exclusive for create/delete
    structure: RwLock<()>,
    locks: PathLockManager,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            structure: RwLock::new(()),
            locks: PathLockManager::new(),
        }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    /// Fail unless the root exists and is a directory.
    pub fn check_root(&self) -> Result<(), DfsError> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(DfsError::NotFound(format!(
                "storage root {} does not exist or is not a directory",
                self.root.display()
            )))
        }
    }

    /// Local metadata of a regular file, `NotFound` for anything else.
    fn file_metadata(&self, file: &Path) -> Result<fs::Metadata, DfsError> {
        let local = file.to_local(&self.root)?;
        match fs::metadata(&local) {
            Ok(meta) if meta.is_file() => Ok(meta),
            Ok(_) => Err(DfsError::NotFound(format!("{} is a directory", file))),
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                Err(DfsError::NotFound(format!("{} does not exist", file)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Per-path lock of an existing regular file.
    ///
    /// The caller holds the structure lock, so the file cannot vanish before
    /// the lock is registered. Missing paths never get an entry.
    fn file_lock(&self, file: &Path) -> Result<Arc<RwLock<()>>, DfsError> {
        self.file_metadata(file)?;
        Ok(self.locks.get_lock(file))
    }

    /// Create `file` with the structure lock already held exclusively.
    fn create_locked(&self, file: &Path) -> Result<bool, DfsError> {
        let local = file.to_local(&self.root)?;
        if fs::symlink_metadata(&local).is_ok() {
            return Ok(false);
        }

        // first directory this call created, removed again on failure
        let mut created: Option<PathBuf> = None;
        let mut dir = self.root.clone();
        let parent = file.parent()?;
        for component in parent.components() {
            dir.push(component);
            match fs::metadata(&dir) {
                Ok(meta) if meta.is_dir() => continue,
                Ok(_) => {
                    debug!(path = %file, blocker = %dir.display(), "Parent component is a file");
                    self.rollback(created.as_deref());
                    return Ok(false);
                }
                Err(_) => {}
            }
            if let Err(e) = fs::create_dir(&dir) {
                self.rollback(created.as_deref());
                return Err(e.into());
            }
            if created.is_none() {
                created = Some(dir.clone());
            }
        }

        match OpenOptions::new().write(true).create_new(true).open(&local) {
            Ok(_) => Ok(true),
            Err(e) => {
                self.rollback(created.as_deref());
                Err(e.into())
            }
        }
    }

    fn rollback(&self, created: Option<&std::path::Path>) {
        if let Some(dir) = created {
            if let Err(e) = fs::remove_dir_all(dir) {
                warn!(dir = %dir.display(), error = %e, "Failed to roll back created directories");
            }
        }
    }

    /// Delete a duplicate reported by the naming server, then remove every
    /// ancestor directory left empty. The root itself is never removed.
    pub fn prune(&self, file: &Path) -> Result<(), DfsError> {
        if file.is_root() {
            return Ok(());
        }
        self.delete(file)?;

        let _structure = self.structure.write();
        let mut current = file.parent()?;
        while !current.is_root() {
            let local = current.to_local(&self.root)?;
            let empty = match fs::read_dir(&local) {
                Ok(mut entries) => entries.next().is_none(),
                Err(_) => false,
            };
            if !empty {
                break;
            }
            fs::remove_dir(&local)?;
            debug!(dir = %current, "Pruned empty directory");
            current = current.parent()?;
        }
        Ok(())
    }

    /// Make `file` an existing, empty regular file.
    fn reset_for_copy(&self, file: &Path) -> Result<(), DfsError> {
        let _structure = self.structure.write();
        let local = file.to_local(&self.root)?;
        match fs::metadata(&local) {
            Ok(meta) if meta.is_dir() => Err(DfsError::NotADirectory(format!(
                "cannot copy over directory {}",
                file
            ))),
            Ok(_) => {
                OpenOptions::new().write(true).truncate(true).open(&local)?;
                Ok(())
            }
            Err(_) => {
                if self.create_locked(file)? {
                    Ok(())
                } else {
                    Err(DfsError::NotFound(format!(
                        "cannot create {}: a parent is a file",
                        file
                    )))
                }
            }
        }
    }
}

impl Storage for LocalStore {
    fn size(&self, file: &Path) -> Result<i64, DfsError> {
        let _structure = self.structure.read();
        let lock = self.file_lock(file)?;
        let _guard = lock.read();
        let meta = self.file_metadata(file)?;
        Ok(meta.len() as i64)
    }

    fn read(&self, file: &Path, offset: i64, length: i32) -> Result<Vec<u8>, DfsError> {
        let _structure = self.structure.read();
        let lock = self.file_lock(file)?;
        let _guard = lock.read();

        let size = self.file_metadata(file)?.len() as i64;
        let end = offset.checked_add(length as i64);
        if length < 0 || offset < 0 || end.map_or(true, |end| end > size) {
            return Err(DfsError::OutOfBounds(format!(
                "read of {} bytes at {} from {} ({} bytes)",
                length, offset, file, size
            )));
        }

        let mut handle = fs::File::open(file.to_local(&self.root)?)?;
        handle.seek(SeekFrom::Start(offset as u64))?;
        let mut buf = vec![0u8; length as usize];
        handle.read_exact(&mut buf).map_err(|e| {
            DfsError::Io(format!("short read from {}: {}", file, e))
        })?;
        Ok(buf)
    }

    fn write(&self, file: &Path, offset: i64, data: &[u8]) -> Result<(), DfsError> {
        if offset < 0 {
            return Err(DfsError::OutOfBounds(format!(
                "negative write offset {} for {}",
                offset, file
            )));
        }
        let _structure = self.structure.read();
        let lock = self.file_lock(file)?;
        let _guard = lock.write();

        let size = self.file_metadata(file)?.len();
        let mut handle = OpenOptions::new().write(true).open(file.to_local(&self.root)?)?;
        let offset = offset as u64;
        if offset > size {
            // zero-fill the gap
            handle.set_len(offset)?;
        }
        handle.seek(SeekFrom::Start(offset))?;
        handle.write_all(data)?;
        handle.flush()?;
        Ok(())
    }
}

impl Command for LocalStore {
    fn create(&self, file: &Path) -> Result<bool, DfsError> {
        if file.is_root() {
            return Err(DfsError::NotFound(
                "the root directory always exists".to_string(),
            ));
        }
        let _structure = self.structure.write();
        let created = self.create_locked(file)?;
        if created {
            info!(path = %file, "Created file");
        }
        Ok(created)
    }

    fn delete(&self, path: &Path) -> Result<bool, DfsError> {
        if path.is_root() {
            return Err(DfsError::NotFound(
                "the root directory cannot be deleted".to_string(),
            ));
        }
        let _structure = self.structure.write();
        let local = path.to_local(&self.root)?;
        let meta = match fs::symlink_metadata(&local) {
            Ok(meta) => meta,
            Err(_) => return Ok(false),
        };
        if meta.is_dir() {
            fs::remove_dir_all(&local)?;
        } else {
            fs::remove_file(&local)?;
        }
        self.locks.forget_under(path);
        info!(path = %path, "Deleted");
        Ok(true)
    }

    fn copy(&self, file: &Path, source: &StorageStub) -> Result<bool, DfsError> {
        if file.is_root() {
            return Err(DfsError::NotFound("cannot copy the root directory".to_string()));
        }
        // size is sampled once; concurrent writers on the source may be missed
        let size = source.size(file)?;
        self.reset_for_copy(file)?;

        let mut offset = 0i64;
        while offset < size {
            let chunk = (size - offset).min(COPY_CHUNK_BYTES as i64) as i32;
            let data = source.read(file, offset, chunk)?;
            self.write(file, offset, &data)?;
            offset += chunk as i64;
        }
        info!(path = %file, bytes = size, source = %source, "Copied file");
        Ok(true)
    }
}
