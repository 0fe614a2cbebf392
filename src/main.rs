#![cfg_attr(not(target_os = "macos"), allow(dead_code))]

mod bridge;
mod classify;
mod config;
mod engine;
mod geometry;
mod ipc;
#[cfg(target_os = "macos")]
mod macos;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_help() {
    println!(
        "nook {}
Pins macOS notification banners and widget panels to a chosen screen corner

USAGE:
    nook [OPTIONS]

OPTIONS:
    -h, --help       Print this help message
    -v, --version    Print version information

ENVIRONMENT:
    RUST_LOG         Set log level (error, warn, info, debug, trace)

CONFIG:
    ~/.config/nook/config.toml

EXAMPLES:
    nook                    Run with default config
    RUST_LOG=debug nook     Run with debug logging

Requires accessibility access (System Settings > Privacy & Security).",
        VERSION
    );
}

fn main() {
    // Handle CLI arguments
    let args: Vec<String> = std::env::args().skip(1).collect();

    if !args.is_empty() {
        // Only the first argument is processed (flags don't combine)
        match args[0].as_str() {
            "-h" | "--help" => {
                print_help();
                return;
            }
            "-v" | "--version" => {
                println!("nook {}", VERSION);
                return;
            }
            _ => {
                eprintln!("Unknown argument: {}", args[0]);
                eprintln!("Try 'nook --help' for more information.");
                std::process::exit(1);
            }
        }
    }

    // Initialize logging (flush each line for interactive debugging).
    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    logger
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {:>5} {}] {}",
                chrono::Utc::now().to_rfc3339(),
                record.level(),
                record.target(),
                record.args()
            )?;
            buf.flush()
        })
        .init();

    log::info!("Starting nook v{}", VERSION);
    run();
}

#[cfg(target_os = "macos")]
fn run() {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, RwLock};
    use std::time::Duration;

    use objc2::MainThreadMarker;
    use objc2_foundation::{NSProcessInfo, NSRunLoop};

    use crate::config::ConfigWatcher;
    use crate::engine::Engine;
    use crate::macos::ax::{overlay_host_pid, AxBridge};
    use crate::macos::{permission, screen};

    let Some(mtm) = MainThreadMarker::new() else {
        eprintln!("nook must start on the main thread");
        std::process::exit(1);
    };

    // Nothing works without accessibility trust. Prompt once, then wait for
    // the user to flip the switch in System Settings.
    if !permission::check_and_prompt() {
        log::warn!("Waiting for accessibility access to be granted...");
        while !permission::is_trusted() {
            std::thread::sleep(Duration::from_secs(1));
        }
        log::info!("Accessibility access granted");
    }

    let shared_config = Arc::new(RwLock::new(config::load_config()));

    let os_major = unsafe { NSProcessInfo::processInfo().operatingSystemVersion() }.majorVersion;
    let profile = classify::ClassifierProfile::for_os(os_major);

    let pid = overlay_host_pid();
    match pid {
        Some(pid) => log::info!("Notification Center is pid {}", pid),
        None => log::warn!("Notification Center not found yet; will resolve on first poll"),
    }
    let bridge = AxBridge::new(pid);

    let topology: screen::SharedTopology = Arc::new(RwLock::new(screen::snapshot(mtm)));
    let topology_for_engine = topology.clone();

    let (engine, events) = Engine::new(
        bridge,
        profile,
        shared_config.clone(),
        Box::new(move || {
            topology_for_engine
                .read()
                .map(|t| t.clone())
                .unwrap_or_default()
        }),
        Box::new(permission::is_trusted),
    );

    ipc::register(shared_config.clone(), engine.stats());
    if let Err(err) = ipc::start_ipc_listener(&ipc::socket_path()) {
        log::warn!("Failed to start IPC listener: {}", err);
    }

    let stop = Arc::new(AtomicBool::new(false));
    let stop_for_signal = stop.clone();
    let socket = ipc::socket_path();
    if let Err(e) = ctrlc::set_handler(move || {
        stop_for_signal.store(true, Ordering::SeqCst);
        let _ = std::fs::remove_file(&socket);
        std::process::exit(0);
    }) {
        log::warn!("Failed to install signal handler: {}", e);
    }

    // The engine already logs placements at info; this drain keeps the
    // channel from backing up and gives debug builds a full event trace.
    std::thread::spawn(move || {
        for event in events {
            log::debug!("engine event: {:?}", event);
        }
    });

    let engine_stop = stop.clone();
    std::thread::spawn(move || {
        engine.run(engine_stop);
    });

    // Main thread: keep the screen topology fresh and pick up config file
    // changes, then park in the run loop.
    let config_watcher = match ConfigWatcher::new(shared_config) {
        Ok(watcher) => Some(watcher),
        Err(err) => {
            log::warn!("Config watching disabled: {}", err);
            None
        }
    };
    let _timer = screen::start_refresh_timer(mtm, topology, move || {
        if let Some(watcher) = &config_watcher {
            watcher.check_and_reload();
        }
    });

    unsafe { NSRunLoop::currentRunLoop().run() };
}

#[cfg(not(target_os = "macos"))]
fn run() {
    eprintln!("nook only runs on macOS; it drives the Accessibility API.");
    std::process::exit(1);
}
