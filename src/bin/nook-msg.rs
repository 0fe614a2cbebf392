//! Command-line tool to send commands to a running nook instance

use std::env;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;

fn socket_path() -> PathBuf {
    let runtime_dir = env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(runtime_dir).join("nook.sock")
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    if args.is_empty() {
        eprintln!("Usage: nook-msg <command>");
        eprintln!();
        eprintln!("Commands:");
        eprintln!("  status     Get engine status (JSON)");
        eprintln!("  enable     Resume repositioning");
        eprintln!("  disable    Stop repositioning (in-flight overlays finish)");
        eprintln!("  reload     Reload configuration from disk");
        std::process::exit(1);
    }

    let command = args.join(" ");
    let socket = socket_path();

    match UnixStream::connect(&socket) {
        Ok(mut stream) => {
            if let Err(e) = writeln!(stream, "{}", command) {
                eprintln!("Failed to send command: {}", e);
                std::process::exit(1);
            }

            let mut reader = BufReader::new(stream);
            let mut response = String::new();
            if let Err(e) = reader.read_line(&mut response) {
                eprintln!("Failed to read response: {}", e);
                std::process::exit(1);
            }

            println!("{}", response.trim());
        }
        Err(e) => {
            eprintln!("Failed to connect to nook at {:?}: {}", socket, e);
            eprintln!("Is nook running?");
            std::process::exit(1);
        }
    }
}
