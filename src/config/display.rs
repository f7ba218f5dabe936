//! Startup banner, grounded on the teacher's `config/display.rs`
//! (ANSI-colored section banner), re-pointed at `AppConfig`'s fields.

use std::fmt;

use crate::config::AppConfig;

impl fmt::Display for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "  \x1b[38;5;244m───────────────────────────────────────────────\x1b[0m"
        )?;
        writeln!(
            f,
            "  \x1b[1;34m⦿\x1b[0m \x1b[1;37mPort:\x1b[0m        \x1b[32m{}\x1b[0m",
            self.port
        )?;
        writeln!(
            f,
            "  \x1b[1;34m⦿\x1b[0m \x1b[1;37mLinger:\x1b[0m      \x1b[{}m{}\x1b[0m",
            if self.opt_linger { "32" } else { "31" },
            if self.opt_linger { "ON" } else { "OFF" }
        )?;
        writeln!(
            f,
            "  \x1b[1;34m⦿\x1b[0m \x1b[1;37mListen Mode:\x1b[0m \x1b[36m{}\x1b[0m",
            if self.listener_edge_triggered() { "ET" } else { "LT" }
        )?;
        writeln!(
            f,
            "  \x1b[1;34m⦿\x1b[0m \x1b[1;37mConn Mode:\x1b[0m   \x1b[36m{}\x1b[0m",
            if self.connection_edge_triggered() { "ET" } else { "LT" }
        )?;
        writeln!(
            f,
            "  \x1b[1;34m⦿\x1b[0m \x1b[1;37mThreads:\x1b[0m     \x1b[33m{}\x1b[0m",
            self.thread_num
        )?;
        writeln!(
            f,
            "  \x1b[1;34m⦿\x1b[0m \x1b[1;37mConn Pool:\x1b[0m   \x1b[33m{}\x1b[0m (db {}@{}:{})",
            self.conn_pool_size, self.db_name, self.sql_user, self.sql_port
        )?;
        writeln!(
            f,
            "  \x1b[1;34m⦿\x1b[0m \x1b[1;37mLogging:\x1b[0m     \x1b[{}m{}\x1b[0m (level {}, queue {})",
            if self.open_log { "32" } else { "31" },
            if self.open_log { "ON" } else { "OFF" },
            self.log_level,
            self.log_queue_size
        )?;
        writeln!(
            f,
            "  \x1b[1;34m⦿\x1b[0m \x1b[1;37mSrc Dir:\x1b[0m     \x1b[32m{}\x1b[0m",
            self.src_dir
        )?;
        writeln!(
            f,
            "  \x1b[38;5;244m───────────────────────────────────────────────\x1b[0m"
        )
    }
}

pub fn display_config(config: &AppConfig) {
    println!("\n\x1b[1;35m 🌐 SERVER CONFIGURATION\x1b[0m");
    println!(
        "\x1b[38;5;240m ════════════════════════════════════════════════════════════════\x1b[0m"
    );
    print!("{config}");
    println!(
        "\x1b[38;5;240m ════════════════════════════════════════════════════════════════\x1b[0m"
    );
    println!(" \x1b[1;32m✔\x1b[0m Configuration loaded successfully - Ready for requests!\n");
}
