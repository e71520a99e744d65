//! How errors and shutdown surface through stubs.

use super::support::{naming_server, path, storage_server};
use meshfs::api::{Service, Storage};
use meshfs::error::DfsError;
use meshfs::rmi::{wire, RemoteAddress, Reply, Stub, Value};
use meshfs::types::StorageStub;
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::net::TcpStream;
use std::thread;

#[test]
fn domain_errors_cross_verbatim_and_transport_errors_do_not() {
    let naming = naming_server();
    let (_root, server) = storage_server(&naming, &[("/f", b"abc")]);
    let storage = server.storage_stub().unwrap();

    assert!(matches!(
        storage.read(&path("/nope"), 0, 1),
        Err(DfsError::NotFound(_))
    ));
    assert!(matches!(
        storage.read(&path("/f"), 2, 2),
        Err(DfsError::OutOfBounds(_))
    ));

    server.stop();
    let err = storage.read(&path("/f"), 0, 1).unwrap_err();
    assert!(err.is_remote_failure(), "got {:?}", err);

    naming.stop();
}

#[test]
fn stubs_survive_the_wire() {
    let naming = naming_server();
    let (_root, server) = storage_server(&naming, &[("/f", b"abc")]);
    let service = naming.service_stub().unwrap();

    let returned = service.get_storage(&path("/f")).unwrap();
    let local = server.storage_stub().unwrap();
    assert_eq!(returned, local);
    assert_eq!(returned.to_string(), local.to_string());
    assert_eq!(returned.size(&path("/f")).unwrap(), 3);

    server.stop();
    naming.stop();
}

#[test]
fn unreachable_host_is_remote_failure() {
    let stub: StorageStub =
        Stub::new(RemoteAddress::new("no-such-host.invalid", 9)).unwrap();
    assert!(stub.size(&path("/f")).unwrap_err().is_remote_failure());
}

#[test]
fn concurrent_clients_on_distinct_files() {
    let naming = naming_server();
    let (_root, server) = storage_server(&naming, &[]);
    let service = naming.service_stub().unwrap();
    for i in 0..8 {
        assert!(service.create_file(&path(&format!("/f{}", i))).unwrap());
    }

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = service.clone();
            thread::spawn(move || {
                let file = path(&format!("/f{}", i));
                let storage = service.get_storage(&file).unwrap();
                let data = vec![i as u8; 1000];
                for chunk in 0..4 {
                    storage.write(&file, chunk * 1000, &data).unwrap();
                }
                storage.size(&file).unwrap()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 4000);
    }

    server.stop();
    naming.stop();
}

/// Send one raw call frame and read the reply, bypassing the typed stubs.
fn raw_call(address: &RemoteAddress, method: &str, args: Vec<Value>, params: &[&str]) -> Reply {
    let stream = TcpStream::connect((address.host.as_str(), address.port)).unwrap();
    let mut writer = BufWriter::new(&stream);
    wire::send(&mut writer, method).unwrap();
    wire::send(&mut writer, &args).unwrap();
    let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
    wire::send(&mut writer, &params).unwrap();
    writer.flush().unwrap();
    drop(writer);
    wire::receive(&mut BufReader::new(&stream)).unwrap()
}

#[test]
fn hand_built_paths_cannot_leave_the_storage_root() {
    let naming = naming_server();
    let (root, server) = storage_server(&naming, &[("/f", b"abc")]);
    let parent = root.path().parent().unwrap();
    let tag = root.path().file_name().unwrap().to_str().unwrap().to_string();
    let sibling = format!("{}-sibling.txt", tag);
    let escaped = format!("{}-escaped", tag);
    let outside = parent.join(&sibling);
    fs::write(&outside, b"secret").unwrap();

    let escaping = |name: &str| Value::Texts(vec!["..".to_string(), name.to_string()]);
    let command = server.command_stub().unwrap();
    let reply = raw_call(command.address(), "create", vec![escaping(&escaped)], &["path"]);
    assert!(matches!(reply, Reply::Raised(DfsError::InvalidPath(_))), "got {:?}", reply);
    assert!(!parent.join(&escaped).exists());

    let reply = raw_call(
        command.address(),
        "delete",
        vec![Value::Texts(vec!["..".to_string()])],
        &["path"],
    );
    assert!(matches!(reply, Reply::Raised(DfsError::InvalidPath(_))), "got {:?}", reply);
    assert!(root.path().join("f").is_file());

    let storage = server.storage_stub().unwrap();
    let reply = raw_call(
        storage.address(),
        "read",
        vec![escaping(&sibling), Value::Long(0), Value::Int(6)],
        &["path", "long", "int"],
    );
    assert!(matches!(reply, Reply::Raised(DfsError::InvalidPath(_))), "got {:?}", reply);

    fs::remove_file(outside).unwrap();
    server.stop();
    naming.stop();
}
