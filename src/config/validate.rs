//! Startup validation, grounded on the teacher's `config/validate.rs`
//! (drop-and-diagnose conflict checking) but re-pointed at this crate's
//! single-server `AppConfig`: port range, thread/queue sizing, and the
//! on-disk presence of `src_dir` and the three error pages.

use std::fs;
use std::path::Path;

use crate::config::AppConfig;

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<String>> {
    let mut problems = Vec::new();

    if config.port <= 1024 || config.port > 65535 {
        problems.push(format!(
            "port {} is out of range (must be in (1024, 65535])",
            config.port
        ));
    }

    if config.thread_num == 0 {
        problems.push("thread_num must be at least 1".to_string());
    }

    if config.log_queue_size == 0 {
        problems.push("log_queue_size must be at least 1".to_string());
    }

    let src_dir = Path::new(&config.src_dir);
    if fs::read_dir(src_dir).is_err() {
        problems.push(format!("src_dir '{}' does not exist", config.src_dir));
    } else {
        for page in ["400.html", "403.html", "404.html"] {
            if fs::File::open(src_dir.join(page)).is_err() {
                problems.push(format!("missing error page '{page}' under src_dir"));
            }
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        for p in &problems {
            println!("  \x1b[1;31m✘\x1b[0m {p}");
        }
        Err(problems)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn make_config(src_dir: &str) -> AppConfig {
        AppConfig {
            src_dir: src_dir.to_string(),
            ..AppConfig::default()
        }
    }

    fn write_pages(dir: &Path) {
        for page in ["400.html", "403.html", "404.html"] {
            let mut f = fs::File::create(dir.join(page)).unwrap();
            writeln!(f, "ok").unwrap();
        }
    }

    #[test]
    fn valid_config_passes() {
        let dir = std::env::temp_dir().join("webreactor_validate_ok");
        fs::create_dir_all(&dir).unwrap();
        write_pages(&dir);
        let cfg = make_config(dir.to_str().unwrap());
        assert!(validate_config(&cfg).is_ok());
    }

    #[test]
    fn missing_src_dir_fails() {
        let cfg = make_config("/nonexistent/webreactor/path");
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn missing_error_page_fails() {
        let dir = std::env::temp_dir().join("webreactor_validate_missing_page");
        fs::create_dir_all(&dir).unwrap();
        let cfg = make_config(dir.to_str().unwrap());
        let err = validate_config(&cfg).unwrap_err();
        assert!(err.iter().any(|p| p.contains("400.html")));
    }

    #[test]
    fn bad_port_fails() {
        let dir = std::env::temp_dir().join("webreactor_validate_port");
        fs::create_dir_all(&dir).unwrap();
        write_pages(&dir);
        let mut cfg = make_config(dir.to_str().unwrap());
        cfg.port = 80;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn zero_threads_fails() {
        let dir = std::env::temp_dir().join("webreactor_validate_threads");
        fs::create_dir_all(&dir).unwrap();
        write_pages(&dir);
        let mut cfg = make_config(dir.to_str().unwrap());
        cfg.thread_num = 0;
        assert!(validate_config(&cfg).is_err());
    }
}
