use std::io::{self, Write};
use std::path::PathBuf;

use crate::io::AvatarPaths;
use crate::types::Command;

#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("consume inbox: {0}")]
    Take(io::Error),
    #[error("read last action: {0}")]
    Read(io::Error),
    #[error("a command is already pending")]
    Pending,
    #[error("submit command: {0}")]
    Submit(io::Error),
}

/// Single-slot command channel backed by the `inbox` file.
///
/// Taking renames `inbox` onto `last-action` before reading it. The rename is
/// the only point where two takers can collide, and the filesystem lets
/// exactly one of them win; the loser sees the slot as empty.
#[derive(Debug, Clone)]
pub struct Mailbox {
    dir: PathBuf,
    inbox: PathBuf,
    last_action: PathBuf,
}

impl Mailbox {
    pub fn new(paths: &AvatarPaths) -> Self {
        Self {
            dir: paths.dir().to_path_buf(),
            inbox: paths.inbox(),
            last_action: paths.last_action(),
        }
    }

    /// Take the pending command, if any. `Ok(None)` is the normal idle result.
    pub fn try_take(&self) -> Result<Option<Command>, MailboxError> {
        match std::fs::rename(&self.inbox, &self.last_action) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(MailboxError::Take(e)),
        }
        let raw = std::fs::read_to_string(&self.last_action).map_err(MailboxError::Read)?;
        let script = raw.trim();
        if script.is_empty() {
            tracing::debug!("inbox held an empty command, ignoring");
            return Ok(None);
        }
        Ok(Some(Command::new(script)))
    }

    pub fn is_pending(&self) -> bool {
        self.inbox.exists()
    }

    /// Operator side: publish a command. The slot appears fully written.
    /// Refuses to overwrite a pending command unless `force` is set.
    pub fn submit(&self, script: &str, force: bool) -> Result<(), MailboxError> {
        if !force && self.is_pending() {
            return Err(MailboxError::Pending);
        }
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(MailboxError::Submit)?;
        tmp.write_all(script.as_bytes()).map_err(MailboxError::Submit)?;
        tmp.persist(&self.inbox).map_err(|e| MailboxError::Submit(e.error))?;
        Ok(())
    }

    /// The most recently consumed command text.
    pub fn last_action(&self) -> io::Result<Option<String>> {
        match std::fs::read_to_string(&self.last_action) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}
