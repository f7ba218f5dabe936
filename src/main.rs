//! Binary entrypoint, grounded on the original `main.cpp`: read a config
//! file, validate it, print the startup banner, init logging, then run
//! the server until it's killed.

use std::sync::Arc;

use webreactor::auth::InMemoryAuthBackend;
use webreactor::config::{display_config, validate_config, AppConfig, FromYaml};
use webreactor::error::Result;
use webreactor::log::{AsyncLog, Level};
use webreactor::reactor::Reactor;
use webreactor::{error, info};

const DEFAULT_CONFIG_PATH: &str = "webreactor.yaml";

fn load_config() -> AppConfig {
    let path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    match std::fs::read_to_string(&path) {
        Ok(text) => match AppConfig::from_str(&text) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{e}");
                eprintln!("falling back to defaults");
                AppConfig::default()
            }
        },
        Err(_) => AppConfig::default(),
    }
}

fn log_level(level: u8) -> Level {
    match level {
        0 => Level::Error,
        1 => Level::Warn,
        2 => Level::Info,
        3 => Level::Debug,
        _ => Level::Trace,
    }
}

fn run(config: AppConfig) -> Result<()> {
    if config.open_log {
        AsyncLog::init(log_level(config.log_level), "./log", config.log_queue_size);
    }

    if let Err(problems) = validate_config(&config) {
        for problem in &problems {
            error!("{problem}");
        }
        return Err("invalid configuration".into());
    }

    display_config(&config);
    info!("========== Server init ==========");
    info!(
        "Port:{}, OpenLinger: {}",
        config.port, config.opt_linger
    );
    info!(
        "Listen Mode: {}, OpenConn Mode: {}",
        if config.listener_edge_triggered() { "ET" } else { "LT" },
        if config.connection_edge_triggered() { "ET" } else { "LT" }
    );
    info!("srcDir: {}", config.src_dir);
    info!("ThreadPool num: {}", config.thread_num);

    let auth = Arc::new(InMemoryAuthBackend::new());
    let reactor = Reactor::new(&config, auth)?;
    reactor.run()
}

fn main() {
    let config = load_config();
    if let Err(e) = run(config) {
        eprintln!("{e}");
        AsyncLog::flush_and_stop();
        std::process::exit(1);
    }
    AsyncLog::flush_and_stop();
}
