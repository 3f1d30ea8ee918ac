//! Single instance lock per sensor using a Unix socket.
//!
//! Two bridges reconciling the same physical sensor would publish conflicting
//! occupancy. The lock is keyed by sensor name. A Unix socket is cleaned up by
//! the OS when the process dies, so there are no stale lock files.

use std::io;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error types for instance lock operations.
#[derive(Debug, Error)]
pub enum InstanceLockError {
    /// Another instance already reconciles this sensor.
    #[error("another instance is already running for sensor {0}")]
    AlreadyRunning(String),

    /// I/O error during lock acquisition.
    #[error("failed to acquire instance lock: {0}")]
    Io(#[from] io::Error),
}

/// Single instance lock using a Unix socket.
///
/// The lock is held as long as this struct exists. When dropped, the socket
/// file is removed.
pub struct InstanceLock {
    _listener: UnixListener,
    path: PathBuf,
}

impl InstanceLock {
    /// Acquire the lock for `sensor` in the runtime directory.
    pub fn acquire(sensor: &str) -> Result<Self, InstanceLockError> {
        Self::acquire_in(&runtime_dir(), sensor)
    }

    /// Acquire the lock for `sensor` with the socket placed in `dir`.
    pub fn acquire_in(dir: &Path, sensor: &str) -> Result<Self, InstanceLockError> {
        let path = dir.join(socket_name(sensor));

        // A socket nobody answers on was left by a SIGKILL'd process
        if path.exists() {
            match UnixStream::connect(&path) {
                Ok(_) => return Err(InstanceLockError::AlreadyRunning(sensor.to_string())),
                Err(_) => {
                    let _ = std::fs::remove_file(&path);
                }
            }
        }

        match UnixListener::bind(&path) {
            Ok(listener) => Ok(Self {
                _listener: listener,
                path,
            }),
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                // Another instance bound between our check and bind
                Err(InstanceLockError::AlreadyRunning(sensor.to_string()))
            }
            Err(e) => Err(InstanceLockError::Io(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        // Clean up the socket file on normal exit
        let _ = std::fs::remove_file(&self.path);
    }
}

/// XDG_RUNTIME_DIR if available (auto-cleaned on logout), else /tmp.
fn runtime_dir() -> PathBuf {
    std::env::var("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

fn socket_name(sensor: &str) -> String {
    let sanitized: String = sensor
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("motion-occupancy-bridge-{}.sock", sanitized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "motion-occupancy-bridge-test-{}-{}",
            name,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_socket_name_is_sanitized() {
        assert_eq!(
            socket_name("Hall/Motion 1"),
            "motion-occupancy-bridge-Hall_Motion_1.sock"
        );
    }

    #[test]
    fn test_second_lock_for_same_sensor_fails() {
        let dir = test_dir("same");
        let lock = InstanceLock::acquire_in(&dir, "hallway").unwrap();

        assert!(matches!(
            InstanceLock::acquire_in(&dir, "hallway"),
            Err(InstanceLockError::AlreadyRunning(_))
        ));
        // A different sensor is independent
        let other = InstanceLock::acquire_in(&dir, "kitchen").unwrap();

        drop(other);
        drop(lock);
        assert!(InstanceLock::acquire_in(&dir, "hallway").is_ok());
    }

    #[test]
    fn test_drop_removes_socket() {
        let dir = test_dir("drop");
        let lock = InstanceLock::acquire_in(&dir, "porch").unwrap();
        let path = lock.path().to_path_buf();
        assert!(path.exists());

        drop(lock);
        assert!(!path.exists());
    }
}
