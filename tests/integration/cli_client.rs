//! Client commands run through the CLI context against live servers.

use super::support::{naming_server, storage_server};
use meshfs::config::MeshConfig;
use meshfs::error::DfsError;
use meshfs::tooling::{CliContext, Commands};

fn context_for(naming: &meshfs::NamingServer) -> CliContext {
    let mut config = MeshConfig::default();
    config.naming.host = "127.0.0.1".to_string();
    config.naming.service_port = naming.service_address().unwrap().port();
    config.naming.registration_port = naming.registration_address().unwrap().port();
    CliContext::from_config(config)
}

fn text(path: &str) -> (String, String) {
    (path.to_string(), "text".to_string())
}

#[test]
fn client_commands_round_trip() {
    let naming = naming_server();
    let (_root, storage) = storage_server(&naming, &[("/notes/todo", b"milk")]);
    let context = context_for(&naming);

    let (path, format) = text("/docs");
    assert_eq!(
        context.execute(&Commands::Mkdir { path, format }).unwrap(),
        "mkdir: /docs"
    );

    let put = Commands::Put {
        path: "/docs/hello".to_string(),
        data: "hi there".to_string(),
        offset: 0,
        format: "text".to_string(),
    };
    assert_eq!(
        context.execute(&put).unwrap(),
        "wrote 8 bytes to /docs/hello at 0 (size 8)"
    );

    let cat = Commands::Cat {
        path: "/docs/hello".to_string(),
        hex: false,
        format: "text".to_string(),
    };
    assert_eq!(context.execute(&cat).unwrap(), "hi there");

    let cat_hex = Commands::Cat {
        path: "/notes/todo".to_string(),
        hex: true,
        format: "text".to_string(),
    };
    assert_eq!(context.execute(&cat_hex).unwrap(), hex_of(b"milk"));

    let (path, format) = text("/");
    assert_eq!(
        context.execute(&Commands::Ls { path, format }).unwrap(),
        "docs\nnotes"
    );

    let stat = Commands::Stat {
        path: "/docs/hello".to_string(),
        format: "json".to_string(),
    };
    let json: serde_json::Value = serde_json::from_str(&context.execute(&stat).unwrap()).unwrap();
    assert_eq!(json["type"], "file");
    assert_eq!(json["size"], 8);

    let (path, format) = text("/docs");
    assert_eq!(
        context.execute(&Commands::Rm { path, format }).unwrap(),
        "rm: /docs"
    );
    let (path, format) = text("/docs");
    assert!(matches!(
        context.execute(&Commands::Stat { path, format }),
        Err(DfsError::NotFound(_))
    ));

    storage.stop();
    naming.stop();
}

#[test]
fn client_without_naming_server_fails_as_remote_call() {
    let naming = naming_server();
    let context = context_for(&naming);
    naming.stop();

    let (path, format) = text("/");
    let err = context.execute(&Commands::Ls { path, format }).unwrap_err();
    assert!(err.is_remote_failure());
}

fn hex_of(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
