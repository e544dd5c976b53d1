//! File-backed channels between the vessel daemon and its operator.
//!
//! Every JSON file is replaced wholesale through a temp file and rename, so a
//! reader sees either the previous or the next version. Readers still retry:
//! some platforms briefly report the target missing during the swap.

pub mod journal;
pub mod mailbox;
pub mod paths;

use std::io;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

pub use journal::Journal;
pub use mailbox::{Mailbox, MailboxError};
pub use paths::AvatarPaths;

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, value).map_err(io::Error::other)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Read and parse a JSON file, retrying transient failures.
///
/// Returns the last error once `attempts` are exhausted.
pub async fn read_json_retry<T: DeserializeOwned>(
    path: &Path,
    attempts: usize,
    delay: Duration,
) -> io::Result<T> {
    let mut last_err = io::Error::new(io::ErrorKind::NotFound, "no read attempted");
    for attempt in 0..attempts.max(1) {
        if attempt > 0 {
            tokio::time::sleep(delay).await;
        }
        match tokio::fs::read(path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(v) => return Ok(v),
                Err(e) => last_err = io::Error::new(io::ErrorKind::InvalidData, e),
            },
            Err(e) => last_err = e,
        }
        tracing::trace!(path = %path.display(), attempt, "json read failed, retrying");
    }
    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_replaces_content() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("status.json");
        write_json_atomic(&path, &serde_json::json!({"state": "idle"})).unwrap();
        write_json_atomic(&path, &serde_json::json!({"state": "executing"})).unwrap();
        let v: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(v["state"], "executing");
        // No temp files left behind.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn read_retry_recovers_once_file_appears() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("outbox.json");
        let writer_path = path.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            write_json_atomic(&writer_path, &serde_json::json!({"ok": true})).unwrap();
        });
        let v: serde_json::Value = read_json_retry(&path, 50, Duration::from_millis(10)).await.unwrap();
        assert_eq!(v["ok"], true);
    }

    #[tokio::test]
    async fn read_retry_gives_up() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = read_json_retry::<serde_json::Value>(&dir.path().join("nope.json"), 2, Duration::from_millis(1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
