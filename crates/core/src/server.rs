use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crate::error::{Result, RtspError};
use crate::protocol::controller::Controller;
use crate::protocol::header_map::DEFAULT_HEADER_CAPACITY;
use crate::protocol::parser::ParserLimits;
use crate::transport::tcp;

/// Creates the [`Controller`] for each accepted connection.
pub type ControllerFactory = dyn Fn(SocketAddr) -> Box<dyn Controller> + Send + Sync;

/// Server-level configuration applied to every connection.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Token and body bounds for the request parser.
    pub limits: ParserLimits,
    /// Distinct headers accepted per request before `413`.
    pub header_capacity: usize,
    /// Size of each socket read.
    pub read_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            limits: ParserLimits::default(),
            header_capacity: DEFAULT_HEADER_CAPACITY,
            read_buffer_size: 4096,
        }
    }
}

/// Thread-per-connection RTSP server.
///
/// Accepts connections, parses requests with a
/// [`RequestParser`](crate::protocol::RequestParser) per connection and
/// hands each complete request to that connection's [`Controller`].
pub struct Server {
    running: Arc<AtomicBool>,
    bind_addr: String,
    local_addr: Option<SocketAddr>,
    config: Arc<ServerConfig>,
}

impl Server {
    pub fn new(bind_addr: &str) -> Self {
        Self::with_config(bind_addr, ServerConfig::default())
    }

    pub fn with_config(bind_addr: &str, config: ServerConfig) -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            bind_addr: bind_addr.to_string(),
            local_addr: None,
            config: Arc::new(config),
        }
    }

    /// Bind and start accepting. Returns the bound address, which differs
    /// from the requested one when port 0 was asked for.
    pub fn start<F>(&mut self, factory: F) -> Result<SocketAddr>
    where
        F: Fn(SocketAddr) -> Box<dyn Controller> + Send + Sync + 'static,
    {
        if self.running.load(Ordering::SeqCst) {
            return Err(RtspError::AlreadyRunning);
        }

        let listener = TcpListener::bind(&self.bind_addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        self.running.store(true, Ordering::SeqCst);
        self.local_addr = Some(local_addr);

        let running = self.running.clone();
        let config = self.config.clone();
        let factory: Arc<ControllerFactory> = Arc::new(factory);

        tracing::info!(addr = %local_addr, "RTSP server listening");

        thread::spawn(move || {
            tcp::accept_loop(listener, factory, config, running);
        });

        Ok(local_addr)
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        tracing::info!("server stopping");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.local_addr.ok_or(RtspError::NotStarted)
    }

    pub fn config(&self) -> Arc<ServerConfig> {
        self.config.clone()
    }
}
