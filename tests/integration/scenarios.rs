//! Client-visible behaviour of a naming server with storage servers.

use super::support::{naming_server, path, sorted, storage_server};
use meshfs::api::{Registration, Service, Storage};
use meshfs::error::DfsError;
use meshfs::path::Path;

#[test]
fn register_and_list() {
    let naming = naming_server();
    let (_root, storage) = storage_server(&naming, &[("/a/b.txt", b"b"), ("/c.txt", b"c")]);
    let service = naming.service_stub().unwrap();

    assert_eq!(sorted(service.list(&Path::root()).unwrap()), vec!["a", "c.txt"]);
    assert_eq!(service.list(&path("/a")).unwrap(), vec!["b.txt"]);
    assert!(service.is_directory(&path("/a")).unwrap());
    assert!(!service.is_directory(&path("/a/b.txt")).unwrap());

    storage.stop();
    naming.stop();
}

#[test]
fn duplicate_files_are_pruned_from_later_servers() {
    let naming = naming_server();
    let (_first_root, first) = storage_server(&naming, &[("/a/b.txt", b"b"), ("/c.txt", b"c")]);
    let (second_root, second) =
        storage_server(&naming, &[("/a/b.txt", b"other"), ("/d.txt", b"d")]);

    assert!(!second_root.path().join("a").exists());
    assert!(second_root.path().join("d.txt").is_file());

    let service = naming.service_stub().unwrap();
    assert_eq!(
        service.get_storage(&path("/a/b.txt")).unwrap(),
        first.storage_stub().unwrap()
    );
    assert_eq!(
        service.get_storage(&path("/d.txt")).unwrap(),
        second.storage_stub().unwrap()
    );

    second.stop();
    first.stop();
    naming.stop();
}

#[test]
fn repeated_registration_is_rejected() {
    let naming = naming_server();
    let (_root, storage) = storage_server(&naming, &[]);
    let registration = naming.registration_stub().unwrap();

    let err = registration
        .register(
            storage.storage_stub().unwrap(),
            storage.command_stub().unwrap(),
            vec![],
        )
        .unwrap_err();
    assert!(matches!(err, DfsError::AlreadyRegistered(_)));

    storage.stop();
    naming.stop();
}

#[test]
fn create_write_read() {
    let naming = naming_server();
    let (root, server) = storage_server(&naming, &[]);
    let service = naming.service_stub().unwrap();

    let x = path("/x");
    assert!(service.create_file(&x).unwrap());
    assert!(!service.create_file(&x).unwrap());
    assert!(root.path().join("x").is_file());

    let storage = service.get_storage(&x).unwrap();
    storage.write(&x, 0, &[0x41, 0x42, 0x43]).unwrap();
    assert_eq!(storage.read(&x, 1, 2).unwrap(), vec![0x42, 0x43]);
    assert_eq!(storage.size(&x).unwrap(), 3);

    server.stop();
    naming.stop();
}

#[test]
fn write_past_end_zero_fills() {
    let naming = naming_server();
    let (_root, server) = storage_server(&naming, &[]);
    let service = naming.service_stub().unwrap();

    let y = path("/y");
    assert!(service.create_file(&y).unwrap());
    let storage = service.get_storage(&y).unwrap();
    storage.write(&y, 4, &[0xFF]).unwrap();
    assert_eq!(storage.read(&y, 0, 5).unwrap(), vec![0, 0, 0, 0, 0xFF]);
    assert_eq!(storage.size(&y).unwrap(), 5);

    server.stop();
    naming.stop();
}

#[test]
fn delete_reaches_storage() {
    let naming = naming_server();
    let (root, server) = storage_server(&naming, &[("/d/e/f.txt", b"f")]);
    let service = naming.service_stub().unwrap();

    let x = path("/x");
    service.create_file(&x).unwrap();
    assert!(service.delete(&x).unwrap());
    assert!(matches!(service.get_storage(&x), Err(DfsError::NotFound(_))));
    assert!(!root.path().join("x").exists());

    assert!(service.delete(&path("/d")).unwrap());
    assert!(!root.path().join("d").exists());
    assert!(matches!(service.delete(&path("/d")), Err(DfsError::NotFound(_))));
    assert!(!service.delete(&Path::root()).unwrap());

    server.stop();
    naming.stop();
}

#[test]
fn create_file_in_new_directory_creates_parents_on_storage() {
    let naming = naming_server();
    let (root, server) = storage_server(&naming, &[]);
    let service = naming.service_stub().unwrap();

    assert!(matches!(
        service.create_file(&path("/docs/readme")),
        Err(DfsError::NotFound(_))
    ));
    assert!(service.create_directory(&path("/docs")).unwrap());
    assert!(service.create_file(&path("/docs/readme")).unwrap());
    assert!(root.path().join("docs/readme").is_file());

    server.stop();
    naming.stop();
}

#[test]
fn create_file_without_storage_servers() {
    let naming = naming_server();
    let service = naming.service_stub().unwrap();
    assert!(matches!(
        service.create_file(&path("/x")),
        Err(DfsError::IllegalState(_))
    ));
    naming.stop();
}

#[test]
fn create_file_rolls_back_when_storage_is_gone() {
    let naming = naming_server();
    let (_root, server) = storage_server(&naming, &[]);
    let service = naming.service_stub().unwrap();

    server.stop();
    let err = service.create_file(&path("/x")).unwrap_err();
    assert!(err.is_remote_failure());
    assert!(matches!(
        service.is_directory(&path("/x")),
        Err(DfsError::NotFound(_))
    ));

    naming.stop();
}
