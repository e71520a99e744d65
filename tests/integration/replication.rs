//! Copying between storage servers and replica bookkeeping.

use super::support::{naming_server, path, storage_server};
use meshfs::api::{Command, Service, Storage};
use meshfs::error::DfsError;
use std::fs;

#[test]
fn copy_pulls_whole_file_across_chunks() {
    let naming = naming_server();
    let contents: Vec<u8> = (0..150_000u32).map(|i| (i % 251) as u8).collect();
    let (_source_root, source) = storage_server(&naming, &[("/big/blob", &contents)]);
    let (target_root, target) = storage_server(&naming, &[("/other", b"o")]);

    let command = target.command_stub().unwrap();
    assert!(command
        .copy(&path("/big/blob"), &source.storage_stub().unwrap())
        .unwrap());
    assert_eq!(fs::read(target_root.path().join("big/blob")).unwrap(), contents);

    target.stop();
    source.stop();
    naming.stop();
}

#[test]
fn copy_truncates_existing_file() {
    let naming = naming_server();
    let (_source_root, source) = storage_server(&naming, &[("/f", b"new")]);
    let (target_root, target) = storage_server(&naming, &[]);
    fs::write(target_root.path().join("f"), b"much longer old contents").unwrap();

    let command = target.command_stub().unwrap();
    command.copy(&path("/f"), &source.storage_stub().unwrap()).unwrap();
    assert_eq!(fs::read(target_root.path().join("f")).unwrap(), b"new");

    assert!(matches!(
        command.copy(&path("/missing"), &source.storage_stub().unwrap()),
        Err(DfsError::NotFound(_))
    ));

    target.stop();
    source.stop();
    naming.stop();
}

#[test]
fn delete_reaches_every_replica() {
    let naming = naming_server();
    let (primary_root, primary) = storage_server(&naming, &[("/f", b"data")]);
    let (replica_root, replica) = storage_server(&naming, &[]);
    let f = path("/f");

    replica
        .command_stub()
        .unwrap()
        .copy(&f, &primary.storage_stub().unwrap())
        .unwrap();
    assert!(naming
        .add_replica(&f, replica.storage_stub().unwrap(), replica.command_stub().unwrap())
        .unwrap());
    assert!(!naming
        .add_replica(&f, primary.storage_stub().unwrap(), primary.command_stub().unwrap())
        .unwrap());
    assert!(replica_root.path().join("f").is_file());

    let service = naming.service_stub().unwrap();
    assert!(service.delete(&f).unwrap());
    assert!(!primary_root.path().join("f").exists());
    assert!(!replica_root.path().join("f").exists());

    replica.stop();
    primary.stop();
    naming.stop();
}

#[test]
fn delete_continues_past_dead_replica() {
    let naming = naming_server();
    let (primary_root, primary) = storage_server(&naming, &[("/f", b"data")]);
    let (_replica_root, replica) = storage_server(&naming, &[]);
    let f = path("/f");
    naming
        .add_replica(&f, replica.storage_stub().unwrap(), replica.command_stub().unwrap())
        .unwrap();
    replica.stop();

    let service = naming.service_stub().unwrap();
    assert!(service.delete(&f).unwrap());
    assert!(!primary_root.path().join("f").exists());

    primary.stop();
    naming.stop();
}
