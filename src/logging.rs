use std::path::Path;
use std::sync::Mutex;

/// Mirror target for `tlog!`. `None` means stderr only.
pub(crate) static LOG_FILE: Mutex<Option<std::fs::File>> = Mutex::new(None);

/// Start mirroring `tlog!` output into a new file under `log_dir`.
///
/// The file is named after the start time. On Unix, `scalelink.log` in the same
/// directory is pointed at the newest file.
pub fn init_file_logging(log_dir: &Path) -> Result<(), String> {
    std::fs::create_dir_all(log_dir)
        .map_err(|e| format!("Failed to create log dir: {}", e))?;

    let filename = chrono::Local::now()
        .format("%Y%m%d-%H%M%S-scalelink.log")
        .to_string();
    let log_path = log_dir.join(&filename);

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| format!("Failed to create log file: {}", e))?;

    // Unix only
    #[cfg(unix)]
    {
        let symlink_path = log_dir.join("scalelink.log");
        let _ = std::fs::remove_file(&symlink_path);
        if let Err(e) = std::os::unix::fs::symlink(&filename, &symlink_path) {
            eprintln!(
                "{} [logging] Failed to create scalelink.log symlink: {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                e
            );
        }
    }

    if let Ok(mut guard) = LOG_FILE.lock() {
        *guard = Some(file);
    }

    // Not tlog!: LOG_FILE is still being set up
    eprintln!(
        "{} [logging] File logging started: {}",
        chrono::Local::now().format("%H:%M:%S%.3f"),
        log_path.display()
    );

    Ok(())
}

/// Close the mirror file, if any.
pub fn stop_file_logging() {
    if let Ok(mut guard) = LOG_FILE.lock() {
        if guard.is_some() {
            *guard = None;
            eprintln!(
                "{} [logging] File logging stopped",
                chrono::Local::now().format("%H:%M:%S%.3f")
            );
        }
    }
}

/// `eprintln!` with an `HH:MM:SS.mmm` prefix, mirrored to the log file when one
/// is open. Messages carry a `[component]` tag by convention.
macro_rules! tlog {
    ($($arg:tt)*) => {{
        use std::io::Write as _;
        let msg = format!("{} {}", chrono::Local::now().format("%H:%M:%S%.3f"), format_args!($($arg)*));
        eprintln!("{}", msg);
        if let Ok(mut guard) = $crate::logging::LOG_FILE.lock() {
            if let Some(ref mut f) = *guard {
                let _ = writeln!(f, "{}", msg);
            }
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_logging_writes_tlog_lines() {
        let dir = tempfile::tempdir().unwrap();
        init_file_logging(dir.path()).unwrap();
        tlog!("[test] hello from {}", "tlog");
        stop_file_logging();

        let logs: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.ends_with("-scalelink.log"))
                    .unwrap_or(false)
            })
            .collect();
        assert_eq!(logs.len(), 1);
        let content = std::fs::read_to_string(&logs[0]).unwrap();
        assert!(content.contains("[test] hello from tlog"));
    }
}
