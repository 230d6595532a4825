//! tinyftp Client Binary
//!
//! Interactive prompt for storing, retrieving, deleting and listing files on
//! a tinyftp server.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;
use tinyftp::{Config, Console, Dispatcher, DispatcherState, Session, TransportKind};
use tracing_subscriber::{fmt, EnvFilter};

/// tinyftp Client
#[derive(Parser, Debug)]
#[command(name = "tinyftp-client")]
#[command(about = "Interactive client for a tinyftp server")]
#[command(version)]
struct Args {
    /// Server address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:2121")]
    server: String,

    /// Transport: tcp or udp
    #[arg(short, long, default_value = "tcp")]
    transport: TransportKind,

    /// Chunk size for UDP transfers; over TCP the server decides
    #[arg(short = 'b', long, default_value = "1024")]
    chunk_size: usize,

    /// Directory files are uploaded from and downloaded into
    #[arg(short, long, default_value = ".")]
    local_dir: PathBuf,

    /// Receive timeout in milliseconds (0 = none)
    #[arg(long, default_value = "10000")]
    timeout_ms: u64,

    /// Only print failures
    #[arg(short, long)]
    quiet: bool,
}

/// Ask the operator to confirm a delete, repeating until the answer is clear
fn confirm_on_stdin(name: &str) -> bool {
    let stdin = io::stdin();
    loop {
        print!("Delete {name} from the server? (Y/N): ");
        let _ = io::stdout().flush();

        let mut answer = String::new();
        match stdin.lock().read_line(&mut answer) {
            Ok(0) | Err(_) => return false,
            Ok(_) => {}
        }
        match answer.trim().to_ascii_uppercase().as_str() {
            "Y" | "YES" => return true,
            "N" | "NO" => return false,
            _ => println!("Please answer Y or N"),
        }
    }
}

fn main() {
    let args = Args::parse();

    // Logs go to stderr so they never interleave with the prompt
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let config = Config::builder()
        .addr(&args.server)
        .transport(args.transport)
        .chunk_size(args.chunk_size)
        .local_dir(&args.local_dir)
        .read_timeout_ms(args.timeout_ms)
        .quiet(args.quiet)
        .build();

    let session = match Session::connect(&config) {
        Ok(session) => session,
        Err(e) => {
            tracing::error!("Failed to connect to {}: {}", config.addr, e);
            std::process::exit(1);
        }
    };

    // Set up Ctrl+C handler
    match session.interrupt_handle() {
        Ok(handle) => {
            let grace = config.shutdown_grace();
            let installed = ctrlc::set_handler(move || {
                handle.terminate(grace);
                std::process::exit(130);
            });
            if let Err(e) = installed {
                tracing::warn!("Could not install Ctrl+C handler: {}", e);
            }
        }
        Err(e) => tracing::warn!("Interrupts will not notify the server: {}", e),
    }

    let mut dispatcher = Dispatcher::new(session, Console::stdout(config.quiet), confirm_on_stdin);
    dispatcher.print_help();

    let stdin = io::stdin();
    loop {
        dispatcher.prompt();
        let mut line = String::new();
        let state = match stdin.lock().read_line(&mut line) {
            Ok(0) => dispatcher.close(),
            Ok(_) => dispatcher.execute_line(&line),
            Err(e) => {
                tracing::error!("Failed to read input: {}", e);
                dispatcher.close()
            }
        };
        if state == DispatcherState::Closed {
            break;
        }
    }
}
