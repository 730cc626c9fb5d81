//! PID-file handling and signalling a running instance.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, warn};

/// The daemon's PID file. Created at startup; removed on drop, but only
/// when the file still belongs to this process.
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Write the current PID to `path`.
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        fs::write(&path, format!("{}\n", std::process::id()))?;
        debug!(path = %path.display(), "pid file written");
        Ok(Self { path })
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        // another instance may have replaced the file in the meantime
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim() == std::process::id().to_string() => {
                if let Err(e) = fs::remove_file(&self.path) {
                    warn!(path = %self.path.display(), error = %e, "failed to remove pid file");
                }
            }
            Ok(_) => debug!(
                path = %self.path.display(),
                "pid file belongs to another process, leaving it"
            ),
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to read pid file"),
        }
    }
}

/// Send SIGTERM to the instance recorded in the PID file.
pub fn signal_running(path: &Path) -> anyhow::Result<()> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("no running instance found ({} unreadable)", path.display()))?;
    let pid: i32 = content
        .trim()
        .parse()
        .with_context(|| format!("malformed pid file {}", path.display()))?;
    let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
    if rc != 0 {
        return Err(io::Error::last_os_error())
            .with_context(|| format!("failed to signal pid {pid}"));
    }
    println!("sent quit command to running instance (pid {pid})");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("fanet-bridge-test-{tag}-{}.pid", std::process::id()))
    }

    #[test]
    fn create_writes_own_pid_and_drop_removes() {
        let path = temp_path("own");
        let pidfile = PidFile::create(&path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.trim(), std::process::id().to_string());
        drop(pidfile);
        assert!(!path.exists());
    }

    #[test]
    fn drop_leaves_foreign_pid_file() {
        let path = temp_path("foreign");
        let pidfile = PidFile::create(&path).unwrap();
        fs::write(&path, "999999\n").unwrap();
        drop(pidfile);
        assert!(path.exists());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn signal_running_rejects_missing_file() {
        assert!(signal_running(&temp_path("missing")).is_err());
    }

    #[test]
    fn signal_running_rejects_garbage() {
        let path = temp_path("garbage");
        fs::write(&path, "not a pid\n").unwrap();
        assert!(signal_running(&path).is_err());
        fs::remove_file(&path).unwrap();
    }
}
