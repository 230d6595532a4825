//! tinyftp Server Binary
//!
//! Serves a directory over TCP or UDP.

use std::path::PathBuf;

use clap::Parser;
use tinyftp::network::Server;
use tinyftp::{Config, TransportKind};
use tracing_subscriber::{fmt, EnvFilter};

/// tinyftp Server
#[derive(Parser, Debug)]
#[command(name = "tinyftp-server")]
#[command(about = "Minimal remote file-access server")]
#[command(version)]
struct Args {
    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:2121")]
    listen: String,

    /// Transport: tcp or udp
    #[arg(short, long, default_value = "tcp")]
    transport: TransportKind,

    /// Bulk transfer chunk size in bytes
    #[arg(short = 'b', long, default_value = "1024")]
    chunk_size: usize,

    /// Directory to serve
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Per-operation receive timeout in milliseconds (0 = none)
    #[arg(long, default_value = "10000")]
    timeout_ms: u64,

    /// Close a TCP session after this long without a command (0 = never)
    #[arg(long, default_value = "0")]
    idle_timeout_ms: u64,

    /// Exit after the first session ends
    #[arg(long)]
    once: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let args = Args::parse();

    // Initialize tracing/logging
    let default_filter = if args.quiet { "warn" } else { "info,tinyftp=debug" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    tracing::info!("tinyftp server v{}", tinyftp::VERSION);

    // Build config from args
    let config = Config::builder()
        .addr(&args.listen)
        .transport(args.transport)
        .chunk_size(args.chunk_size)
        .root_dir(&args.root)
        .read_timeout_ms(args.timeout_ms)
        .idle_timeout_ms(args.idle_timeout_ms)
        .quiet(args.quiet)
        .once(args.once)
        .build();
    let grace = config.shutdown_grace();

    let mut server = match Server::bind(config) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    // Set up Ctrl+C handler
    let shutdown = server.shutdown_handle();
    let installed = ctrlc::set_handler(move || {
        tracing::info!("Received Ctrl+C, initiating shutdown...");
        shutdown.shutdown();
        // An operation blocked on a silent peer may not notice; bound the wait.
        std::thread::sleep(grace);
        std::process::exit(130);
    });
    if let Err(e) = installed {
        tracing::warn!("Could not install Ctrl+C handler: {}", e);
    }

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
