//! CLI Tooling
//!
//! Command-line interface for running the naming and storage servers and for
//! browsing and editing the filesystem as a client.

use crate::api::{Service, Storage};
use crate::config::{ConfigLoader, MeshConfig};
use crate::error::DfsError;
use crate::logging::{resolve_log_file_path, LoggingConfig};
use crate::naming::NamingServer;
use crate::path::Path;
use crate::rmi::Stub;
use crate::storage::StorageServer;
use crate::types::{ServiceStub, COPY_CHUNK_BYTES};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::io::BufRead;
use std::path::PathBuf;
use tracing::info;

/// meshfs - distributed filesystem over RMI
#[derive(Parser)]
#[command(name = "meshfs")]
#[command(about = "Distributed filesystem with a naming server and storage servers")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Hostname of the naming server (overrides config)
    #[arg(long, global = true)]
    pub naming_host: Option<String>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the naming server until stdin closes or reads "quit"
    Naming {
        /// Interface to bind (overrides config)
        #[arg(long)]
        bind_host: Option<String>,
        /// Ignore stdin and run until killed
        #[arg(long)]
        no_stdin: bool,
    },
    /// Run a storage server and register it with the naming server
    Storage {
        /// Local directory to serve (overrides config)
        #[arg(long)]
        root: Option<PathBuf>,
        /// Hostname advertised to clients (overrides config)
        #[arg(long)]
        hostname: Option<String>,
        /// Port for client access, 0 for any
        #[arg(long)]
        client_port: Option<u16>,
        /// Port for naming server commands, 0 for any
        #[arg(long)]
        command_port: Option<u16>,
        /// Ignore stdin and run until killed
        #[arg(long)]
        no_stdin: bool,
    },
    /// List a directory
    Ls {
        path: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show whether a path is a file or a directory
    Stat {
        path: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Create a directory
    Mkdir {
        path: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Create an empty file
    Touch {
        path: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Delete a file or directory
    Rm {
        path: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Print a file's contents
    Cat {
        path: String,
        /// Print contents as hex
        #[arg(long)]
        hex: bool,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Write DATA into a file, creating it if needed
    Put {
        path: String,
        data: String,
        /// Byte offset to write at
        #[arg(long, default_value = "0")]
        offset: i64,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

impl Commands {
    /// Log file segment for long-running server commands.
    pub fn log_instance(&self) -> Option<&'static str> {
        match self {
            Commands::Naming { .. } => Some("naming"),
            Commands::Storage { .. } => Some("storage"),
            _ => None,
        }
    }
}

impl Cli {
    /// Logging configuration with CLI flags applied over `base`.
    pub fn logging_config(&self, base: &LoggingConfig) -> Result<LoggingConfig, DfsError> {
        let mut config = base.clone();
        if let Some(level) = &self.log_level {
            config.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            config.output = output.clone();
        }
        // an unresolvable default is reported by init_logging if a file is needed
        if let Ok(path) = resolve_log_file_path(
            self.log_file.clone(),
            config.file.clone(),
            self.command.log_instance(),
        ) {
            config.file = Some(path);
        }
        Ok(config)
    }
}

/// Loaded configuration plus command execution
pub struct CliContext {
    config: MeshConfig,
}

impl CliContext {
    /// Load configuration from `config_path`, or the user config file and
    /// environment when none is given.
    pub fn new(config_path: Option<PathBuf>, naming_host: Option<String>) -> Result<Self, DfsError> {
        let mut config = match &config_path {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load()?,
        };
        if let Some(host) = naming_host {
            config.naming.host = host;
        }
        Ok(Self::from_config(config))
    }

    pub fn from_config(config: MeshConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    /// Execute a command and return its output.
    ///
    /// Server commands block until shutdown.
    pub fn execute(&self, command: &Commands) -> Result<String, DfsError> {
        match command {
            Commands::Naming {
                bind_host,
                no_stdin,
            } => {
                let mut naming = self.config.naming.clone();
                if let Some(host) = bind_host {
                    naming.bind_host = host.clone();
                }
                let server = NamingServer::from_config(&naming)?;
                server.start()?;
                wait_for_shutdown(*no_stdin);
                server.stop();
                Ok("naming server stopped".to_string())
            }
            Commands::Storage {
                root,
                hostname,
                client_port,
                command_port,
                no_stdin,
            } => {
                let mut storage = self.config.storage.clone();
                if let Some(root) = root {
                    storage.root = root.clone();
                }
                if let Some(hostname) = hostname {
                    storage.hostname = hostname.clone();
                }
                if let Some(port) = client_port {
                    storage.client_port = *port;
                }
                if let Some(port) = command_port {
                    storage.command_port = *port;
                }
                // absolute, without the \\?\ prefix on Windows
                if let Ok(canonical) = dunce::canonicalize(&storage.root) {
                    storage.root = canonical;
                }
                let registration = Stub::new(self.config.naming.registration_address())?;
                let server = StorageServer::from_config(&storage)?;
                server.start(&storage.hostname, &registration)?;
                info!(root = %storage.root.display(), "Storage server running");
                wait_for_shutdown(*no_stdin);
                server.stop();
                Ok("storage server stopped".to_string())
            }
            Commands::Ls { path, format } => self.handle_ls(path, format),
            Commands::Stat { path, format } => self.handle_stat(path, format),
            Commands::Mkdir { path, format } => {
                let path = Path::parse(path)?;
                let created = self.service()?.create_directory(&path)?;
                render_change(format, "mkdir", &path, created)
            }
            Commands::Touch { path, format } => {
                let path = Path::parse(path)?;
                let created = self.service()?.create_file(&path)?;
                render_change(format, "touch", &path, created)
            }
            Commands::Rm { path, format } => {
                let path = Path::parse(path)?;
                let deleted = self.service()?.delete(&path)?;
                render_change(format, "rm", &path, deleted)
            }
            Commands::Cat { path, hex, format } => self.handle_cat(path, *hex, format),
            Commands::Put {
                path,
                data,
                offset,
                format,
            } => self.handle_put(path, data.as_bytes(), *offset, format),
        }
    }

    fn service(&self) -> Result<ServiceStub, DfsError> {
        Stub::new(self.config.naming.service_address())
    }

    fn handle_ls(&self, path: &str, format: &str) -> Result<String, DfsError> {
        let path = Path::parse(path)?;
        let mut entries = self.service()?.list(&path)?;
        entries.sort();
        match output_format(format)? {
            OutputFormat::Json => {
                Ok(json!({ "path": path.to_string(), "entries": entries }).to_string())
            }
            OutputFormat::Text => Ok(entries.join("\n")),
        }
    }

    fn handle_stat(&self, path: &str, format: &str) -> Result<String, DfsError> {
        let path = Path::parse(path)?;
        let service = self.service()?;
        if service.is_directory(&path)? {
            return match output_format(format)? {
                OutputFormat::Json => {
                    Ok(json!({ "path": path.to_string(), "type": "directory" }).to_string())
                }
                OutputFormat::Text => Ok(format!("{}: directory", path)),
            };
        }
        let storage = service.get_storage(&path)?;
        let size = storage.size(&path)?;
        match output_format(format)? {
            OutputFormat::Json => Ok(json!({
                "path": path.to_string(),
                "type": "file",
                "size": size,
                "storage": storage.address().to_string(),
            })
            .to_string()),
            OutputFormat::Text => Ok(format!(
                "{}: file, {} bytes on {}",
                path,
                size,
                storage.address()
            )),
        }
    }

    fn handle_cat(&self, path: &str, as_hex: bool, format: &str) -> Result<String, DfsError> {
        let path = Path::parse(path)?;
        let storage = self.service()?.get_storage(&path)?;
        let size = storage.size(&path)?;
        let mut contents = Vec::with_capacity(size.max(0) as usize);
        let mut offset = 0i64;
        while offset < size {
            let chunk = (size - offset).min(COPY_CHUNK_BYTES as i64) as i32;
            contents.extend(storage.read(&path, offset, chunk)?);
            offset += chunk as i64;
        }
        match output_format(format)? {
            OutputFormat::Json => Ok(json!({
                "path": path.to_string(),
                "size": size,
                "hex": hex::encode(&contents),
            })
            .to_string()),
            OutputFormat::Text if as_hex => Ok(hex::encode(&contents)),
            OutputFormat::Text => Ok(String::from_utf8_lossy(&contents).into_owned()),
        }
    }

    fn handle_put(
        &self,
        path: &str,
        data: &[u8],
        offset: i64,
        format: &str,
    ) -> Result<String, DfsError> {
        let path = Path::parse(path)?;
        let service = self.service()?;
        let created = service.create_file(&path)?;
        let storage = service.get_storage(&path)?;
        storage.write(&path, offset, data)?;
        let size = storage.size(&path)?;
        match output_format(format)? {
            OutputFormat::Json => Ok(json!({
                "path": path.to_string(),
                "created": created,
                "written": data.len(),
                "size": size,
            })
            .to_string()),
            OutputFormat::Text => Ok(format!(
                "wrote {} bytes to {} at {} (size {})",
                data.len(),
                path,
                offset,
                size
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

fn output_format(format: &str) -> Result<OutputFormat, DfsError> {
    match format {
        "text" => Ok(OutputFormat::Text),
        "json" => Ok(OutputFormat::Json),
        other => Err(DfsError::Config(format!(
            "Invalid output format: {} (must be 'text' or 'json')",
            other
        ))),
    }
}

fn render_change(format: &str, action: &str, path: &Path, changed: bool) -> Result<String, DfsError> {
    match output_format(format)? {
        OutputFormat::Json => Ok(json!({
            "action": action,
            "path": path.to_string(),
            "changed": changed,
        })
        .to_string()),
        OutputFormat::Text if changed => Ok(format!("{}: {}", action, path)),
        OutputFormat::Text => Ok(format!("{}: {} unchanged", action, path)),
    }
}

/// Block until stdin reaches EOF or a line reading `quit`. With `ignore_stdin`
/// the thread parks forever.
fn wait_for_shutdown(ignore_stdin: bool) {
    if ignore_stdin {
        loop {
            std::thread::park();
        }
    }
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        match line {
            Ok(line) if line.trim() == "quit" => break,
            Ok(_) => continue,
            Err(_) => break,
        }
    }
    info!("Shutdown requested");
}
