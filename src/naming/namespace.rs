//! The naming server's directory tree and its remote operations
//!
//! One mutex guards the tree and the registered storages, so every call sees
//! a serial order. Only `create_file` releases it before talking to a storage
//! server; `delete` keeps it until every holder has been told.

use super::tree::{
    collect_files, DirectoryNode, DirectoryTree, FileNode, Graft, Node, StorageBinding,
};
use crate::api::{Command, Registration, Service};
use crate::error::DfsError;
use crate::path::Path;
use crate::types::{CommandStub, StorageStub};
use parking_lot::Mutex;
use std::fmt;
use tracing::{debug, info, warn};

#[derive(Default)]
struct State {
    tree: DirectoryTree,
    /// In registration order; the first one receives new files
    storages: Vec<StorageBinding>,
}

/// Namespace shared by the `Service` and `Registration` skeletons
#[derive(Default)]
pub struct Namespace {
    state: Mutex<State>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered storage servers.
    pub fn storage_count(&self) -> usize {
        self.state.lock().storages.len()
    }

    /// Number of files in the tree.
    pub fn file_count(&self) -> usize {
        self.state.lock().tree.file_count()
    }

    /// Every storage server holding `file`, primary first.
    pub fn holders(&self, file: &Path) -> Result<Vec<StorageBinding>, DfsError> {
        let state = self.state.lock();
        Ok(state.tree.file(file)?.holders().cloned().collect())
    }

    /// Record that `storage`/`command` also hold a copy of `file`.
    ///
    /// Returns `false` if that server is already the primary or a replica.
    /// No data is moved.
    pub fn add_replica(
        &self,
        file: &Path,
        storage: StorageStub,
        command: CommandStub,
    ) -> Result<bool, DfsError> {
        let mut state = self.state.lock();
        let added = state
            .tree
            .add_replica(file, StorageBinding { storage, command })?;
        if added {
            debug!(path = %file, "Recorded replica");
        }
        Ok(added)
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Namespace")
            .field("storages", &state.storages.len())
            .field("files", &state.tree.file_count())
            .finish()
    }
}

fn as_remote_failure(context: String, err: DfsError) -> DfsError {
    if err.is_remote_failure() {
        err
    } else {
        DfsError::remote(context, err)
    }
}

impl Service for Namespace {
    fn is_directory(&self, path: &Path) -> Result<bool, DfsError> {
        self.state.lock().tree.is_directory(path)
    }

    fn list(&self, directory: &Path) -> Result<Vec<String>, DfsError> {
        let state = self.state.lock();
        let dir = state.tree.directory(directory)?;
        Ok(dir.children.keys().cloned().collect())
    }

    fn create_file(&self, file: &Path) -> Result<bool, DfsError> {
        if file.is_root() {
            return Ok(false);
        }

        let binding = {
            let mut state = self.state.lock();
            let parent = file.parent()?;
            let name = file.last()?;
            let siblings = state.tree.directory(&parent)?;
            if siblings.children.contains_key(name) {
                return Ok(false);
            }
            let binding = state.storages.first().cloned().ok_or_else(|| {
                DfsError::IllegalState("no storage servers are registered".to_string())
            })?;
            state
                .tree
                .insert(file, Node::File(FileNode::new(binding.clone())))?;
            binding
        };

        match binding.command.create(file) {
            Ok(_) => {
                info!(path = %file, storage = %binding.storage, "Created file");
                Ok(true)
            }
            Err(err) => {
                let mut state = self.state.lock();
                let still_ours = matches!(
                    state.tree.file(file),
                    Ok(node) if node.primary == binding
                );
                if still_ours {
                    state.tree.remove(file);
                }
                warn!(path = %file, storage = %binding.storage, error = %err, "Storage create failed, rolled back");
                Err(as_remote_failure(
                    format!("create {} on {}", file, binding.command),
                    err,
                ))
            }
        }
    }

    fn create_directory(&self, directory: &Path) -> Result<bool, DfsError> {
        if directory.is_root() {
            return Ok(false);
        }
        let mut state = self.state.lock();
        let created = state
            .tree
            .insert(directory, Node::Directory(DirectoryNode::default()))?;
        if created {
            debug!(path = %directory, "Created directory");
        }
        Ok(created)
    }

    fn delete(&self, path: &Path) -> Result<bool, DfsError> {
        // held until the storage deletes finish, so nothing can be created
        // under `path` and then wiped by a late recursive delete
        let mut state = self.state.lock();
        if !state.tree.exists(path) {
            return Err(DfsError::NotFound(format!("{} does not exist", path)));
        }
        if path.is_root() {
            return Ok(false);
        }
        let removed = match state.tree.remove(path) {
            Some(node) => node,
            None => return Err(DfsError::NotFound(format!("{} does not exist", path))),
        };

        let mut files = Vec::new();
        collect_files(path, &removed, &mut files);

        // one delete per holding server: the file itself, or the whole
        // directory for every server holding something beneath it
        let mut targets: Vec<CommandStub> = Vec::new();
        for (_, file) in &files {
            for holder in file.holders() {
                if !targets.contains(&holder.command) {
                    targets.push(holder.command.clone());
                }
            }
        }
        for command in &targets {
            if let Err(err) = command.delete(path) {
                warn!(path = %path, command = %command, error = %err, "Storage delete failed");
            }
        }

        drop(state);

        info!(path = %path, files = files.len(), servers = targets.len(), "Deleted");
        Ok(true)
    }

    fn get_storage(&self, file: &Path) -> Result<StorageStub, DfsError> {
        let state = self.state.lock();
        Ok(state.tree.file(file)?.primary.storage.clone())
    }
}

impl Registration for Namespace {
    fn register(
        &self,
        storage: StorageStub,
        command: CommandStub,
        files: Vec<Path>,
    ) -> Result<Vec<Path>, DfsError> {
        let mut state = self.state.lock();
        if state.storages.iter().any(|known| known.storage == storage) {
            return Err(DfsError::AlreadyRegistered(format!(
                "storage server {} is already registered",
                storage
            )));
        }

        let binding = StorageBinding { storage, command };
        let mut duplicates = Vec::new();
        let mut added = 0usize;
        for file in files {
            match state.tree.graft(&file, &binding) {
                Graft::Added => added += 1,
                Graft::Duplicate => duplicates.push(file),
                Graft::Skipped => debug!("Ignoring registration of the root directory"),
            }
        }

        info!(
            storage = %binding.storage,
            added,
            duplicates = duplicates.len(),
            "Storage server registered"
        );
        state.storages.push(binding);
        Ok(duplicates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rmi::{RemoteAddress, Skeleton, Stub};
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn path(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    /// Stubs at an address nothing listens on
    fn dead_binding(port: u16) -> (StorageStub, CommandStub) {
        (
            Stub::new(RemoteAddress::new("127.0.0.1", port)).unwrap(),
            Stub::new(RemoteAddress::new("127.0.0.1", port)).unwrap(),
        )
    }

    fn names(mut list: Vec<String>) -> Vec<String> {
        list.sort();
        list
    }

    #[test]
    fn test_register_builds_tree() {
        let namespace = Namespace::new();
        let (storage, command) = dead_binding(1);
        let duplicates = namespace
            .register(storage, command, vec![path("/a/b.txt"), path("/c.txt"), Path::root()])
            .unwrap();
        assert!(duplicates.is_empty());
        assert_eq!(names(namespace.list(&Path::root()).unwrap()), vec!["a", "c.txt"]);
        assert_eq!(namespace.list(&path("/a")).unwrap(), vec!["b.txt"]);
        assert!(namespace.is_directory(&path("/a")).unwrap());
        assert!(!namespace.is_directory(&path("/a/b.txt")).unwrap());
    }

    #[test]
    fn test_register_reports_duplicates_and_rejects_repeat() {
        let namespace = Namespace::new();
        let (s1, c1) = dead_binding(1);
        let (s2, c2) = dead_binding(2);
        namespace
            .register(s1.clone(), c1.clone(), vec![path("/a/b.txt")])
            .unwrap();
        let duplicates = namespace
            .register(s2.clone(), c2, vec![path("/a/b.txt"), path("/d.txt"), path("/a/b.txt/x")])
            .unwrap();
        assert_eq!(duplicates, vec![path("/a/b.txt"), path("/a/b.txt/x")]);
        assert_eq!(namespace.get_storage(&path("/a/b.txt")).unwrap(), s1);
        assert_eq!(namespace.get_storage(&path("/d.txt")).unwrap(), s2);

        assert!(matches!(
            namespace.register(s1, c1, vec![]),
            Err(DfsError::AlreadyRegistered(_))
        ));
        assert_eq!(namespace.storage_count(), 2);
    }

    #[test]
    fn test_lookup_errors() {
        let namespace = Namespace::new();
        let (storage, command) = dead_binding(1);
        namespace.register(storage, command, vec![path("/f")]).unwrap();
        assert!(matches!(namespace.list(&path("/f")), Err(DfsError::NotFound(_))));
        assert!(matches!(namespace.list(&path("/x")), Err(DfsError::NotFound(_))));
        assert!(matches!(namespace.get_storage(&Path::root()), Err(DfsError::NotFound(_))));
        assert!(matches!(
            namespace.is_directory(&path("/x/y")),
            Err(DfsError::NotFound(_))
        ));
    }

    #[test]
    fn test_create_directory_is_local() {
        let namespace = Namespace::new();
        assert!(!namespace.create_directory(&Path::root()).unwrap());
        assert!(namespace.create_directory(&path("/d")).unwrap());
        assert!(!namespace.create_directory(&path("/d")).unwrap());
        assert!(matches!(
            namespace.create_directory(&path("/missing/d")),
            Err(DfsError::NotFound(_))
        ));
    }

    #[test]
    fn test_create_file_without_storage_is_illegal_state() {
        let namespace = Namespace::new();
        assert!(!namespace.create_file(&Path::root()).unwrap());
        assert!(matches!(
            namespace.create_file(&path("/x")),
            Err(DfsError::IllegalState(_))
        ));
        assert!(matches!(
            namespace.create_file(&path("/missing/x")),
            Err(DfsError::NotFound(_))
        ));
    }

    #[test]
    fn test_create_file_rolls_back_on_unreachable_storage() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let namespace = Namespace::new();
        let (storage, command) = dead_binding(port);
        namespace.register(storage, command, vec![]).unwrap();
        let err = namespace.create_file(&path("/x")).unwrap_err();
        assert!(err.is_remote_failure());
        assert!(matches!(namespace.is_directory(&path("/x")), Err(DfsError::NotFound(_))));
    }

    #[test]
    fn test_delete_tolerates_unreachable_storage() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let namespace = Namespace::new();
        let (storage, command) = dead_binding(port);
        namespace
            .register(storage, command, vec![path("/d/x"), path("/d/e/y")])
            .unwrap();
        assert!(!namespace.delete(&Path::root()).unwrap());
        assert!(namespace.delete(&path("/d")).unwrap());
        assert!(matches!(namespace.delete(&path("/d")), Err(DfsError::NotFound(_))));
        assert_eq!(namespace.file_count(), 0);
    }

    /// Command server that records calls and answers `delete` slowly
    #[derive(Default)]
    struct SlowCommand {
        calls: Mutex<Vec<String>>,
    }

    impl Command for SlowCommand {
        fn create(&self, file: &Path) -> Result<bool, DfsError> {
            self.calls.lock().push(format!("create {}", file));
            Ok(true)
        }

        fn delete(&self, path: &Path) -> Result<bool, DfsError> {
            thread::sleep(Duration::from_millis(300));
            self.calls.lock().push(format!("delete {}", path));
            Ok(true)
        }

        fn copy(&self, _file: &Path, _source: &StorageStub) -> Result<bool, DfsError> {
            Ok(false)
        }
    }

    #[test]
    fn test_delete_excludes_creates_until_storage_is_done() {
        let command = Arc::new(SlowCommand::default());
        let server: Arc<dyn Command> = command.clone();
        let skeleton = Skeleton::new(server).unwrap();
        skeleton.start().unwrap();
        let (storage, _) = dead_binding(1);
        let command_stub: CommandStub = Stub::for_skeleton(&skeleton).unwrap();

        let namespace = Arc::new(Namespace::new());
        namespace
            .register(storage, command_stub, vec![path("/d/old")])
            .unwrap();

        let deleting = {
            let namespace = namespace.clone();
            thread::spawn(move || namespace.delete(&path("/d")))
        };
        thread::sleep(Duration::from_millis(100));

        // these wait for the delete above to reach the storage server
        assert!(namespace.create_directory(&path("/d")).unwrap());
        assert!(namespace.create_file(&path("/d/x")).unwrap());
        assert!(deleting.join().unwrap().unwrap());

        assert_eq!(
            *command.calls.lock(),
            vec!["delete /d".to_string(), "create /d/x".to_string()]
        );
        assert!(namespace.get_storage(&path("/d/x")).is_ok());
        assert_eq!(namespace.list(&path("/d")).unwrap(), vec!["x".to_string()]);
        skeleton.stop();
    }

    #[test]
    fn test_add_replica_never_duplicates_primary() {
        let namespace = Namespace::new();
        let (s1, c1) = dead_binding(1);
        let (s2, c2) = dead_binding(2);
        namespace
            .register(s1.clone(), c1.clone(), vec![path("/f")])
            .unwrap();
        assert!(!namespace.add_replica(&path("/f"), s1, c1).unwrap());
        assert!(namespace.add_replica(&path("/f"), s2.clone(), c2.clone()).unwrap());
        assert!(!namespace.add_replica(&path("/f"), s2, c2).unwrap());
        assert_eq!(namespace.holders(&path("/f")).unwrap().len(), 2);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Mkdir(Path),
        Delete(Path),
    }

    fn path_strategy() -> impl Strategy<Value = Path> {
        prop::collection::vec(prop::sample::select(vec!["a", "b"]), 1..4)
            .prop_map(|parts| Path::parse(&format!("/{}", parts.join("/"))).unwrap())
    }

    proptest! {
        #[test]
        fn prop_listing_matches_children(
            ops in prop::collection::vec(
                prop_oneof![
                    path_strategy().prop_map(Op::Mkdir),
                    path_strategy().prop_map(Op::Delete),
                ],
                0..30,
            )
        ) {
            let namespace = Namespace::new();
            for op in ops {
                match op {
                    Op::Mkdir(p) => {
                        let existed = namespace.is_directory(&p).is_ok();
                        match namespace.create_directory(&p) {
                            Ok(created) => prop_assert_eq!(created, !existed),
                            Err(e) => prop_assert!(matches!(e, DfsError::NotFound(_))),
                        }
                    }
                    Op::Delete(p) => {
                        let existed = namespace.is_directory(&p).is_ok();
                        prop_assert_eq!(namespace.delete(&p).is_ok(), existed);
                    }
                }
                // children are unique and every listed child resolves
                let listed = namespace.list(&Path::root()).unwrap();
                let unique: HashSet<_> = listed.iter().collect();
                prop_assert_eq!(unique.len(), listed.len());
                for name in &listed {
                    let child = Path::root().join(name).unwrap();
                    prop_assert!(namespace.is_directory(&child).is_ok());
                }
            }
        }
    }
}
