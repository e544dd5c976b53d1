//! Hot reload of the avatar tool tier.
//!
//! A `notify` watcher on `<avatar>/tools` forwards changed paths over a
//! channel; a task applies each one to the registry.

use std::path::PathBuf;
use std::sync::Arc;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::ToolRegistry;

/// Keeps the filesystem watch alive; dropping it stops reloads.
pub struct ReloadWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl ReloadWatcher {
    /// Start watching the registry's avatar tier. Must be called inside a
    /// tokio runtime.
    pub fn spawn(registry: Arc<ToolRegistry>, cancel: CancellationToken) -> notify::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for path in changed_paths(event) {
                        // Receiver gone means the runtime is shutting down.
                        let _ = tx.send(path);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "tool watcher error"),
            },
            Config::default(),
        )?;
        watcher.watch(registry.avatar_dir(), RecursiveMode::NonRecursive)?;
        tracing::info!(dir = %registry.avatar_dir().display(), "watching avatar tools");

        let task = tokio::spawn(apply_changes(registry, rx, cancel));
        Ok(Self { _watcher: watcher, task })
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for ReloadWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn changed_paths(event: Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => event.paths,
        _ => Vec::new(),
    }
}

async fn apply_changes(
    registry: Arc<ToolRegistry>,
    mut rx: mpsc::UnboundedReceiver<PathBuf>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            path = rx.recv() => {
                let Some(path) = path else { break };
                if let Some(name) = registry.reload_avatar_file(&path) {
                    tracing::debug!(tool = %name, path = %path.display(), "tool change applied");
                }
            }
        }
    }
    tracing::debug!("tool reload task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Binding, Tier};
    use crate::io::AvatarPaths;
    use std::time::Duration;

    #[test]
    fn only_content_events_carry_paths() {
        let path = PathBuf::from("/t/a.yaml");
        let create = Event::new(EventKind::Create(notify::event::CreateKind::File)).add_path(path.clone());
        assert_eq!(changed_paths(create), vec![path.clone()]);
        let access = Event::new(EventKind::Access(notify::event::AccessKind::Any)).add_path(path);
        assert!(changed_paths(access).is_empty());
    }

    #[tokio::test]
    async fn new_file_appears_in_registry() {
        let dir = tempfile::TempDir::new().unwrap();
        let paths = AvatarPaths::new(dir.path(), "bob");
        paths.ensure().unwrap();
        let registry = Arc::new(ToolRegistry::new(&paths, 8));
        registry.load();
        let cancel = CancellationToken::new();
        let watcher = ReloadWatcher::spawn(registry.clone(), cancel.clone()).unwrap();

        std::fs::write(paths.tools_dir().join("wave.yaml"), "script: say {}\n").unwrap();

        let mut seen = false;
        for _ in 0..100 {
            if registry.snapshot().get("wave").map(Binding::tier) == Some(Tier::Avatar) {
                seen = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(seen, "reload did not pick up the new file");
        assert!(watcher.is_running());
        cancel.cancel();
    }
}
