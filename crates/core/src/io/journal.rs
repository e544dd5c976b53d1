use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::io::{AvatarPaths, write_json_atomic};
use crate::types::{ChatEntry, EventEntry, EventKind, clock_stamp};

const WHISPER_PREFIX: &str = "[whisper] ";

/// Bounded history persisted as a JSON array after every push.
#[derive(Debug)]
struct RingLog<T> {
    entries: VecDeque<T>,
    capacity: usize,
    path: PathBuf,
}

impl<T: Serialize + DeserializeOwned> RingLog<T> {
    /// Resume from an existing file. Unreadable history starts empty.
    fn open(path: &Path, capacity: usize) -> Self {
        let mut entries: VecDeque<T> = match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "discarding unreadable log");
                VecDeque::new()
            }),
            Err(_) => VecDeque::new(),
        };
        while entries.len() > capacity {
            entries.pop_front();
        }
        Self {
            entries,
            capacity,
            path: path.to_path_buf(),
        }
    }

    fn push(&mut self, entry: T) -> std::io::Result<()> {
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        write_json_atomic(&self.path, &self.entries)
    }
}

#[derive(Debug)]
struct JournalState {
    events: RingLog<EventEntry>,
    chat: RingLog<ChatEntry>,
}

/// Event and chat histories the operator reads from `events.json` and
/// `chat.json`. Cheap to clone; all clones append to the same buffers.
#[derive(Debug, Clone)]
pub struct Journal {
    inner: Arc<Mutex<JournalState>>,
}

impl Journal {
    pub fn open(paths: &AvatarPaths, capacity: usize) -> Self {
        let state = JournalState {
            events: RingLog::open(&paths.events(), capacity),
            chat: RingLog::open(&paths.chat(), capacity),
        };
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, JournalState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append to the event log. Persistence failures are logged, not raised.
    pub fn record(&self, kind: EventKind) {
        let entry = EventEntry { kind, time: clock_stamp() };
        if let Err(e) = self.lock().events.push(entry) {
            tracing::warn!(error = %e, "failed to persist event log");
        }
    }

    /// Append an inbound chat line and mirror it into the event log.
    pub fn record_chat(&self, from: &str, message: &str, whisper: bool) {
        let prefix = if whisper { WHISPER_PREFIX } else { "" };
        let entry = ChatEntry {
            from: from.to_string(),
            message: format!("{prefix}{message}"),
            time: clock_stamp(),
        };
        if let Err(e) = self.lock().chat.push(entry) {
            tracing::warn!(error = %e, "failed to persist chat log");
        }
        let (from, message) = (from.to_string(), message.to_string());
        self.record(if whisper {
            EventKind::Whisper { from, message }
        } else {
            EventKind::Chat { from, message }
        });
    }

    pub fn events(&self) -> Vec<EventEntry> {
        self.lock().events.entries.iter().cloned().collect()
    }

    pub fn chat(&self) -> Vec<ChatEntry> {
        self.lock().chat.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn journal(capacity: usize) -> (tempfile::TempDir, AvatarPaths, Journal) {
        let tmp = tempfile::TempDir::new().unwrap();
        let paths = AvatarPaths::new(tmp.path(), "bob");
        paths.ensure().unwrap();
        let journal = Journal::open(&paths, capacity);
        (tmp, paths, journal)
    }

    fn hurt(n: u32) -> EventKind {
        EventKind::Hurt { by: format!("mob{n}"), health: n as f32 }
    }

    #[test]
    fn keeps_most_recent_entries_in_order() {
        let (_tmp, paths, journal) = journal(20);
        for n in 0..57 {
            journal.record(hurt(n));
        }
        let events = journal.events();
        assert_eq!(events.len(), 20);
        let expected: Vec<EventKind> = (37..57).map(hurt).collect();
        let got: Vec<EventKind> = events.into_iter().map(|e| e.kind).collect();
        assert_eq!(got, expected);

        let on_disk: Vec<EventEntry> =
            serde_json::from_str(&std::fs::read_to_string(paths.events()).unwrap()).unwrap();
        assert_eq!(on_disk.len(), 20);
        assert_eq!(on_disk.last().unwrap().kind, hurt(56));
    }

    #[test]
    fn whisper_is_prefixed_and_mirrored() {
        let (_tmp, _paths, journal) = journal(20);
        journal.record_chat("alice", "meet at spawn", true);
        journal.record_chat("carol", "hello", false);

        let chat = journal.chat();
        assert_eq!(chat[0].message, "[whisper] meet at spawn");
        assert_eq!(chat[1].message, "hello");

        let events = journal.events();
        assert_eq!(
            events[0].kind,
            EventKind::Whisper { from: "alice".into(), message: "meet at spawn".into() }
        );
        assert_eq!(events[1].kind, EventKind::Chat { from: "carol".into(), message: "hello".into() });
    }

    #[test]
    fn reopen_resumes_history() {
        let (_tmp, paths, journal) = journal(3);
        for n in 0..3 {
            journal.record(hurt(n));
        }
        drop(journal);
        let reopened = Journal::open(&paths, 3);
        reopened.record(EventKind::Death);
        let kinds: Vec<EventKind> = reopened.events().into_iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![hurt(1), hurt(2), EventKind::Death]);
    }

    #[test]
    fn every_event_kind_survives_reopen() {
        use crate::types::ReflexAction;

        let kinds = vec![
            EventKind::Chat { from: "alice".into(), message: "hi".into() },
            EventKind::Whisper { from: "carol".into(), message: "psst".into() },
            EventKind::Reflex {
                action: ReflexAction::Fight,
                target: Some("zombie".into()),
                weapon: Some("iron_sword".into()),
                from: None,
                health: None,
            },
            EventKind::Reflex {
                action: ReflexAction::Flee,
                target: None,
                weapon: None,
                from: Some("creeper".into()),
                health: Some(4.0),
            },
            EventKind::AutoEat { item: "bread".into(), food: 17 },
            EventKind::AutoShelter { health: 8.0, world_time: 18_000 },
            hurt(12),
            EventKind::Death,
        ];
        let (_tmp, paths, journal) = journal(20);
        for kind in &kinds {
            journal.record(kind.clone());
        }
        drop(journal);

        let reopened = Journal::open(&paths, 20);
        let got: Vec<EventKind> = reopened.events().into_iter().map(|e| e.kind).collect();
        assert_eq!(got, kinds);
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let (_tmp, paths, _journal) = journal(20);
        std::fs::write(paths.events(), "{ not an array").unwrap();
        let reopened = Journal::open(&paths, 20);
        assert!(reopened.events().is_empty());
    }
}
