//! docstream relay binary
//!
//! Starts the relay HTTP server in front of the generation service.

use docstream_relay::{config::RelayConfig, start_server, RelayError};
use std::env;
use std::process;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run() -> Result<(), RelayError> {
    let args: Vec<String> = env::args().collect();

    let config = if args.len() > 2 && args[1] == "--config" {
        RelayConfig::from_file(&args[2])?
    } else if args.len() > 1 && args[1] == "--help" {
        print_help();
        process::exit(0);
    } else {
        eprintln!("Warning: No config file specified, using default test configuration");
        eprintln!("Usage: docstream-relay --config <path-to-config.toml>");
        eprintln!();
        RelayConfig::default_test_config()
            .with_api_key_override(env::var(docstream_relay::config::API_KEY_ENV).ok())
    };

    start_server(config).await
}

fn print_help() {
    println!("docstream-relay - Streaming analysis relay");
    println!();
    println!("USAGE:");
    println!("    docstream-relay --config <path-to-config.toml>");
    println!();
    println!("OPTIONS:");
    println!("    --config <file>    Load configuration from TOML file");
    println!("    --help             Print this help message");
    println!();
    println!("CONFIGURATION:");
    println!("    bind_address       IP address to bind (e.g., '127.0.0.1')");
    println!("    bind_port          Port number (e.g., 8090)");
    println!("    default_user       User id sent upstream when the caller names none");
    println!("    max_tracked_tasks  Upper bound on remembered upstream task ids");
    println!("    [upstream]         base_url, api_key, query, connect_timeout_secs,");
    println!("                       request_timeout_secs");
    println!();
    println!("ENVIRONMENT:");
    println!("    DOCSTREAM_API_KEY  Overrides upstream.api_key");
    println!("    RUST_LOG           Log filter (default: info)");
    println!();
}
