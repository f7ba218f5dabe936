use derive_yaml::FromYaml;

use crate::config::parser::FromYaml; // the trait, brought in for the derive's generated impl

// --- Defaults, mirroring the constructor defaults of the original WebServer ---
pub const DEFAULT_PORT: u16 = 1316;
pub const DEFAULT_TRIG_MODE: u8 = 3;
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_SQL_PORT: u16 = 3306;
pub const DEFAULT_SQL_USER: &str = "root";
pub const DEFAULT_SQL_PWD: &str = "";
pub const DEFAULT_DB_NAME: &str = "webreactor";
pub const DEFAULT_CONN_POOL_SIZE: usize = 12;
pub const DEFAULT_THREAD_NUM: usize = 6;
pub const DEFAULT_LOG_LEVEL: u8 = 1;
pub const DEFAULT_LOG_QUEUE_SIZE: usize = 1024;
pub const DEFAULT_SRC_DIR: &str = "./resources";

/// Startup configuration, mirroring the original `WebServer` constructor's
/// parameter list one field at a time. `sql_port`/`sql_user`/`sql_pwd`/
/// `db_name`/`conn_pool_size` size and name the connection pool a real
/// `AuthBackend` would open; this crate's `InMemoryAuthBackend` ignores
/// them (see DESIGN.md), but the fields stay on the config surface since
/// any database-backed `AuthBackend` would need them at construction time.
#[derive(Debug, Clone, FromYaml)]
pub struct AppConfig {
    pub port: u16,
    pub trig_mode: u8,
    pub timeout_ms: u64,
    pub opt_linger: bool,
    pub sql_port: u16,
    pub sql_user: String,
    pub sql_pwd: String,
    pub db_name: String,
    pub conn_pool_size: usize,
    pub thread_num: usize,
    pub open_log: bool,
    pub log_level: u8,
    pub log_queue_size: usize,
    pub src_dir: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            trig_mode: DEFAULT_TRIG_MODE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            opt_linger: false,
            sql_port: DEFAULT_SQL_PORT,
            sql_user: DEFAULT_SQL_USER.to_string(),
            sql_pwd: DEFAULT_SQL_PWD.to_string(),
            db_name: DEFAULT_DB_NAME.to_string(),
            conn_pool_size: DEFAULT_CONN_POOL_SIZE,
            thread_num: DEFAULT_THREAD_NUM,
            open_log: true,
            log_level: DEFAULT_LOG_LEVEL,
            log_queue_size: DEFAULT_LOG_QUEUE_SIZE,
            src_dir: DEFAULT_SRC_DIR.to_string(),
        }
    }
}

impl AppConfig {
    /// Listen-mode ET flag derived the same way `InitEventMode_` derives
    /// `listenEvent_`/`connEvent_` from `trigMode`.
    pub fn listener_edge_triggered(&self) -> bool {
        matches!(self.trig_mode, 2 | 3) || self.trig_mode > 3
    }

    pub fn connection_edge_triggered(&self) -> bool {
        matches!(self.trig_mode, 1 | 3) || self.trig_mode > 3
    }
}

impl FromYaml for u8 {
    fn from_yaml(
        parser: &mut crate::config::ConfigParser,
        min_indent: usize,
    ) -> crate::config::ParseResult<Self> {
        let n = <usize as FromYaml>::from_yaml(parser, min_indent)?;
        Ok(n as u8)
    }
}

impl FromYaml for u64 {
    fn from_yaml(
        parser: &mut crate::config::ConfigParser,
        min_indent: usize,
    ) -> crate::config::ParseResult<Self> {
        let n = <usize as FromYaml>::from_yaml(parser, min_indent)?;
        Ok(n as u64)
    }
}
