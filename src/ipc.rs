//! Diagnostics IPC: line-oriented commands over a Unix socket.
//!
//! `nook` exposes a tiny query/control surface for tooling: engine status
//! as JSON, and runtime enable/disable (flips the shared config's flag
//! without persisting it). The socket doubles as the single-instance
//! guard.

use std::sync::{Arc, OnceLock};

use crate::config::SharedConfig;
use crate::engine::EngineStats;

struct IpcShared {
    config: SharedConfig,
    stats: Arc<EngineStats>,
}

static IPC_SHARED: OnceLock<IpcShared> = OnceLock::new();

/// Wires the command handlers to the running engine's state. Called once
/// at startup, before the listener starts.
pub fn register(config: SharedConfig, stats: Arc<EngineStats>) {
    let _ = IPC_SHARED.set(IpcShared { config, stats });
}

pub fn socket_path() -> std::path::PathBuf {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".to_string());
    std::path::PathBuf::from(runtime_dir).join("nook.sock")
}

/// Parses and dispatches a single IPC command string, returning a response.
pub fn handle_ipc_command(command: &str) -> String {
    match command.trim() {
        "status" => handle_status(),
        "enable" => set_enabled(true),
        "disable" => set_enabled(false),
        "reload" => handle_reload(),
        "" => "ERR: empty command".to_string(),
        other => format!("ERR: unknown command '{}'", other),
    }
}

fn handle_status() -> String {
    let Some(shared) = IPC_SHARED.get() else {
        return serde_json::json!({
            "version": crate::VERSION,
            "running": false,
        })
        .to_string();
    };

    let enabled = shared
        .config
        .read()
        .map(|c| c.position.enabled)
        .unwrap_or(false);

    serde_json::json!({
        "version": crate::VERSION,
        "running": true,
        "enabled": enabled,
        "halted": shared.stats.is_halted(),
        "tracked": shared.stats.tracked_count(),
    })
    .to_string()
}

fn set_enabled(enabled: bool) -> String {
    let Some(shared) = IPC_SHARED.get() else {
        return "ERR: engine not running".to_string();
    };
    match shared.config.write() {
        Ok(mut config) => {
            config.position.enabled = enabled;
            log::info!(
                "engine {} via ipc",
                if enabled { "enabled" } else { "disabled" }
            );
            format!("OK: {}", if enabled { "enabled" } else { "disabled" })
        }
        Err(_) => "ERR: config lock poisoned".to_string(),
    }
}

fn handle_reload() -> String {
    let Some(shared) = IPC_SHARED.get() else {
        return "ERR: engine not running".to_string();
    };
    let new_config = crate::config::load_config();
    match shared.config.write() {
        Ok(mut config) => {
            *config = new_config;
            "OK: config reloaded".to_string()
        }
        Err(_) => "ERR: config lock poisoned".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Unix socket listener
// ---------------------------------------------------------------------------

/// Starts the IPC listener on a Unix socket, spawning a background thread.
pub fn start_ipc_listener(socket_path: &std::path::Path) -> std::io::Result<()> {
    use std::io::{BufRead, BufReader, Write};
    use std::os::unix::net::{UnixListener, UnixStream};

    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let listener = match UnixListener::bind(socket_path) {
        Ok(listener) => listener,
        Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
            if UnixStream::connect(socket_path).is_ok() {
                eprintln!("nook is already running.");
                std::process::exit(0);
            }
            let _ = std::fs::remove_file(socket_path);
            UnixListener::bind(socket_path)?
        }
        Err(err) => return Err(err),
    };

    std::thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            let _ = reader.read_line(&mut line);
            let response = handle_ipc_command(&line);
            if let Ok(mut stream) = reader.into_inner().try_clone() {
                let _ = writeln!(stream, "{}", response);
            }
        }
    });

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::RwLock;

    use super::*;
    use crate::config::Config;

    // The OnceLock is shared across the test binary, so every test goes
    // through this helper and tolerates earlier registrations.
    fn ensure_registered() -> &'static IpcShared {
        if IPC_SHARED.get().is_none() {
            register(
                Arc::new(RwLock::new(Config::default())),
                Arc::new(EngineStats::default()),
            );
        }
        IPC_SHARED.get().unwrap()
    }

    #[test]
    fn unknown_command_is_an_error() {
        let resp = handle_ipc_command("frobnicate");
        assert!(resp.starts_with("ERR:"));
        assert!(resp.contains("frobnicate"));
    }

    #[test]
    fn empty_command_is_an_error() {
        assert!(handle_ipc_command("  \n").starts_with("ERR:"));
    }

    #[test]
    fn status_returns_json_with_engine_fields() {
        ensure_registered();
        let resp = handle_ipc_command("status");
        let parsed: serde_json::Value = serde_json::from_str(&resp).unwrap();
        assert_eq!(parsed["running"], true);
        assert!(parsed["enabled"].is_boolean());
        assert!(parsed["tracked"].is_number());
        assert!(parsed["halted"].is_boolean());
    }

    #[test]
    fn enable_and_disable_flip_the_shared_flag() {
        let shared = ensure_registered();

        let resp = handle_ipc_command("disable");
        assert!(resp.starts_with("OK"));
        assert!(!shared.config.read().unwrap().position.enabled);

        let resp = handle_ipc_command("enable");
        assert!(resp.starts_with("OK"));
        assert!(shared.config.read().unwrap().position.enabled);
    }

    #[test]
    fn commands_are_trimmed() {
        ensure_registered();
        assert!(handle_ipc_command(" status \n").starts_with('{'));
    }
}
