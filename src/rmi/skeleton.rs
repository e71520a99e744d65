//! RMI skeletons
//!
//! A [`Skeleton`] is a multithreaded TCP server exporting one remote interface.
//! An acceptor thread hands every connection to its own service thread, which
//! reads one call, dispatches it on the backing object and writes one reply.
//!
//! Lifecycle: unbound, then listening after [`Skeleton::start`], then stopped
//! after [`Skeleton::stop`]. A stopped skeleton cannot be restarted.

use super::interface::{check_remote_interface, resolve, Remote};
use super::wire::{self, Args, Reply, Value};
use crate::error::DfsError;
use parking_lot::Mutex;
use std::io::{BufReader, BufWriter, Write};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Address used when a skeleton is started without an explicit one
pub const DEFAULT_BIND: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);

const WAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// Callbacks into a skeleton's acceptor and service threads.
///
/// All methods have defaults, so implementors override only what they need.
/// `stopped` runs on the acceptor thread; calling [`Skeleton::stop`] from it
/// deadlocks.
pub trait SkeletonHooks: Send + Sync + 'static {
    /// An error occurred while accepting. Return `true` to keep accepting.
    fn on_listen_error(&self, _error: &std::io::Error) -> bool {
        false
    }

    /// An error occurred while servicing a connection. Informational only.
    fn on_service_error(&self, _error: &DfsError) {}

    /// The acceptor has exited. `cause` is `None` after a requested stop.
    fn stopped(&self, _cause: Option<&DfsError>) {}
}

/// Default hooks: log everything, shut down on listen errors.
pub struct LoggingHooks {
    interface: &'static str,
}

impl LoggingHooks {
    pub fn new(interface: &'static str) -> Self {
        Self { interface }
    }
}

impl SkeletonHooks for LoggingHooks {
    fn on_listen_error(&self, error: &std::io::Error) -> bool {
        error!(interface = self.interface, error = %error, "Listen error, shutting down");
        false
    }

    fn on_service_error(&self, error: &DfsError) {
        warn!(interface = self.interface, error = %error, "Service error");
    }

    fn stopped(&self, cause: Option<&DfsError>) {
        match cause {
            Some(cause) => error!(interface = self.interface, cause = %cause, "Skeleton stopped"),
            None => info!(interface = self.interface, "Skeleton stopped"),
        }
    }
}

enum State {
    Unbound,
    Listening {
        address: SocketAddr,
        shutdown: Arc<AtomicBool>,
        acceptor: JoinHandle<()>,
    },
    Stopped {
        address: Option<SocketAddr>,
    },
}

/// Server side of the remote interface `T`
pub struct Skeleton<T: Remote + ?Sized> {
    server: Arc<T>,
    requested: Option<SocketAddr>,
    hooks: Arc<dyn SkeletonHooks>,
    state: Mutex<State>,
}

impl<T: Remote + ?Sized> Skeleton<T> {
    /// Skeleton with a system-chosen loopback address.
    pub fn new(server: Arc<T>) -> Result<Self, DfsError> {
        Self::build(server, None)
    }

    /// Skeleton bound to a fixed address, for well-known ports.
    pub fn with_address(server: Arc<T>, address: SocketAddr) -> Result<Self, DfsError> {
        Self::build(server, Some(address))
    }

    fn build(server: Arc<T>, requested: Option<SocketAddr>) -> Result<Self, DfsError> {
        check_remote_interface::<T>()?;
        Ok(Self {
            server,
            requested,
            hooks: Arc::new(LoggingHooks::new(T::INTERFACE)),
            state: Mutex::new(State::Unbound),
        })
    }

    /// Replace the default logging hooks.
    pub fn with_hooks(mut self, hooks: Arc<dyn SkeletonHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// The bound address while listening or after stopping, otherwise the
    /// explicit address given at construction.
    pub fn address(&self) -> Option<SocketAddr> {
        match &*self.state.lock() {
            State::Listening { address, .. } => Some(*address),
            State::Stopped { address } => address.or(self.requested),
            State::Unbound => self.requested,
        }
    }

    /// Whether the acceptor is running.
    pub fn is_listening(&self) -> bool {
        match &*self.state.lock() {
            State::Listening { acceptor, .. } => !acceptor.is_finished(),
            _ => false,
        }
    }

    /// Bind the listening socket and start the acceptor thread.
    pub fn start(&self) -> Result<(), DfsError> {
        let mut state = self.state.lock();
        match &*state {
            State::Unbound => {}
            State::Listening { address, .. } => {
                return Err(DfsError::remote(
                    format!("start {}", T::INTERFACE),
                    format!("already listening on {}", address),
                ));
            }
            State::Stopped { .. } => {
                return Err(DfsError::IllegalState(format!(
                    "{} skeleton has been stopped and cannot be restarted",
                    T::INTERFACE
                )));
            }
        }

        let bind = self.requested.unwrap_or(DEFAULT_BIND);
        let listener = TcpListener::bind(bind)
            .map_err(|e| DfsError::remote(format!("bind {} for {}", bind, T::INTERFACE), e))?;
        let address = listener
            .local_addr()
            .map_err(|e| DfsError::remote(format!("bind {} for {}", bind, T::INTERFACE), e))?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let acceptor = {
            let server = Arc::clone(&self.server);
            let hooks = Arc::clone(&self.hooks);
            let shutdown = Arc::clone(&shutdown);
            thread::Builder::new()
                .name(format!("{}-acceptor", T::INTERFACE))
                .spawn(move || accept_loop(listener, server, hooks, shutdown))
                .map_err(|e| DfsError::remote(format!("spawn acceptor for {}", T::INTERFACE), e))?
        };

        info!(interface = T::INTERFACE, %address, "Skeleton listening");
        *state = State::Listening {
            address,
            shutdown,
            acceptor,
        };
        Ok(())
    }

    /// Close the listening socket and wait for the acceptor to exit.
    ///
    /// Connections already accepted finish on their own threads. The
    /// `stopped` hook fires exactly once over the skeleton's lifetime.
    pub fn stop(&self) {
        let previous = {
            let mut state = self.state.lock();
            let address = match &*state {
                State::Listening { address, .. } => Some(*address),
                State::Stopped { .. } => return,
                State::Unbound => None,
            };
            std::mem::replace(&mut *state, State::Stopped { address })
        };

        match previous {
            State::Listening {
                address,
                shutdown,
                acceptor,
            } => {
                shutdown.store(true, Ordering::SeqCst);
                if !acceptor.is_finished() {
                    // unblock accept()
                    let _ = TcpStream::connect_timeout(&wake_address(address), WAKE_TIMEOUT);
                }
                if acceptor.join().is_err() {
                    error!(interface = T::INTERFACE, "Acceptor thread panicked");
                }
            }
            _ => self.hooks.stopped(None),
        }
    }
}

impl<T: Remote + ?Sized> Drop for Skeleton<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn wake_address(address: SocketAddr) -> SocketAddr {
    match address.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), address.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), address.port())
        }
        _ => address,
    }
}

fn accept_loop<T: Remote + ?Sized>(
    listener: TcpListener,
    server: Arc<T>,
    hooks: Arc<dyn SkeletonHooks>,
    shutdown: Arc<AtomicBool>,
) {
    let cause = loop {
        match listener.accept() {
            Ok((stream, peer)) => {
                if shutdown.load(Ordering::SeqCst) {
                    break None;
                }
                debug!(interface = T::INTERFACE, %peer, "Accepted connection");
                let server = Arc::clone(&server);
                let service_hooks = Arc::clone(&hooks);
                let spawned = thread::Builder::new()
                    .name(format!("{}-service", T::INTERFACE))
                    .spawn(move || serve_connection(&*server, &*service_hooks, stream));
                if let Err(e) = spawned {
                    hooks.on_service_error(&DfsError::remote("spawn service thread", e));
                }
            }
            Err(e) => {
                if shutdown.load(Ordering::SeqCst) {
                    break None;
                }
                if hooks.on_listen_error(&e) {
                    continue;
                }
                break Some(DfsError::remote(format!("accept on {}", T::INTERFACE), e));
            }
        }
    };
    drop(listener);
    hooks.stopped(cause.as_ref());
}

fn serve_connection<T: Remote + ?Sized>(server: &T, hooks: &dyn SkeletonHooks, stream: TcpStream) {
    let reply = match read_call(server, &stream) {
        Ok(reply) => reply,
        Err(e) => {
            hooks.on_service_error(&e);
            Reply::Failed(e.to_string())
        }
    };
    if let Err(e) = write_reply(&stream, &reply) {
        hooks.on_service_error(&e);
    }
}

fn read_call<T: Remote + ?Sized>(server: &T, stream: &TcpStream) -> Result<Reply, DfsError> {
    let mut reader = BufReader::new(stream);
    let method: String = wire::receive(&mut reader)?;
    let args: Vec<Value> = wire::receive(&mut reader)?;
    let params: Vec<String> = wire::receive(&mut reader)?;

    let signature = match resolve::<T>(&method, &params) {
        Some(signature) => signature,
        None => {
            return Ok(Reply::Failed(format!(
                "{} has no method {}({})",
                T::INTERFACE,
                method,
                params.join(", ")
            )));
        }
    };

    Ok(match server.dispatch(signature, Args::new(args)) {
        Ok(value) => Reply::Return(value),
        Err(err) => {
            debug!(interface = T::INTERFACE, method = %method, error = %err, "Method raised");
            Reply::Raised(err)
        }
    })
}

fn write_reply(stream: &TcpStream, reply: &Reply) -> Result<(), DfsError> {
    let mut writer = BufWriter::new(stream);
    wire::send(&mut writer, reply)?;
    writer
        .flush()
        .map_err(|e| DfsError::remote("flush reply", e))
}
