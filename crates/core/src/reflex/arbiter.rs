use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// Who may drive the avatar. At most one kind is held at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Executor,
    Combat,
    Hunger,
    Shelter,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Executor => "executor",
            Self::Combat => "combat",
            Self::Hunger => "hunger",
            Self::Shelter => "shelter",
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Holding {
    kind: TokenKind,
    id: u64,
    since: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    slot: Mutex<Option<Holding>>,
    next_id: AtomicU64,
}

/// Single-holder exclusivity between the executor and the reflexes.
///
/// `try_acquire` never waits: a contender that finds the slot taken gets
/// `None` and tries again on its next cycle.
#[derive(Debug, Clone, Default)]
pub struct Arbiter {
    inner: Arc<Inner>,
}

impl Arbiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<Holding>> {
        self.inner.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn try_acquire(&self, kind: TokenKind) -> Option<TokenGuard> {
        let mut slot = self.slot();
        if let Some(holding) = *slot {
            tracing::trace!(wanted = %kind, held = %holding.kind, "token busy");
            return None;
        }
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        *slot = Some(Holding { kind, id, since: Instant::now() });
        tracing::debug!(token = %kind, "token acquired");
        Some(TokenGuard { arbiter: self.clone(), kind, id })
    }

    pub fn held(&self) -> Option<TokenKind> {
        self.slot().map(|h| h.kind)
    }

    pub fn is_free(&self) -> bool {
        self.slot().is_none()
    }

    fn release(&self, id: u64) {
        let mut slot = self.slot();
        if let Some(holding) = *slot
            && holding.id == id
        {
            *slot = None;
            tracing::debug!(
                token = %holding.kind,
                held_ms = holding.since.elapsed().as_millis() as u64,
                "token released"
            );
        }
    }
}

/// Proof of holding the token. Dropping it releases the token.
#[derive(Debug)]
pub struct TokenGuard {
    arbiter: Arbiter,
    kind: TokenKind,
    id: u64,
}

impl TokenGuard {
    pub fn kind(&self) -> TokenKind {
        self.kind
    }
}

impl Drop for TokenGuard {
    fn drop(&mut self) {
        self.arbiter.release(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn second_contender_is_refused() {
        let arbiter = Arbiter::new();
        let guard = arbiter.try_acquire(TokenKind::Hunger).unwrap();
        assert_eq!(arbiter.held(), Some(TokenKind::Hunger));
        assert!(arbiter.try_acquire(TokenKind::Executor).is_none());
        assert!(arbiter.try_acquire(TokenKind::Hunger).is_none());
        drop(guard);
        assert!(arbiter.is_free());
        assert_eq!(arbiter.try_acquire(TokenKind::Executor).unwrap().kind(), TokenKind::Executor);
    }

    #[test]
    fn stale_release_does_not_free_new_holder() {
        let arbiter = Arbiter::new();
        let first = arbiter.try_acquire(TokenKind::Combat).unwrap();
        let stale_id = first.id;
        drop(first);
        let _second = arbiter.try_acquire(TokenKind::Shelter).unwrap();
        arbiter.release(stale_id);
        assert_eq!(arbiter.held(), Some(TokenKind::Shelter));
    }

    #[test]
    fn at_most_one_holder_across_threads() {
        let arbiter = Arbiter::new();
        let holders = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let kinds = [TokenKind::Executor, TokenKind::Combat, TokenKind::Hunger, TokenKind::Shelter];

        let threads: Vec<_> = (0..8)
            .map(|i| {
                let arbiter = arbiter.clone();
                let holders = holders.clone();
                let max_seen = max_seen.clone();
                let kind = kinds[i % kinds.len()];
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        if let Some(guard) = arbiter.try_acquire(kind) {
                            let now = holders.fetch_add(1, Ordering::SeqCst) + 1;
                            max_seen.fetch_max(now, Ordering::SeqCst);
                            std::thread::sleep(Duration::from_micros(50));
                            holders.fetch_sub(1, Ordering::SeqCst);
                            drop(guard);
                        }
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert!(arbiter.is_free());
    }
}
