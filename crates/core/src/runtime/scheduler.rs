use std::sync::Arc;
use std::time::Duration;

use serde_json::Map;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use vessel_world::{World, WorldEvent};

use super::shutdown::ShutdownGuard;
use crate::capability::ToolRegistry;
use crate::capability::reload::ReloadWatcher;
use crate::config::VesselCfg;
use crate::executor::TaskExecutor;
use crate::io::{AvatarPaths, Journal, Mailbox};
use crate::reflex::arbiter::Arbiter;
use crate::reflex::{Perception, ReflexCtx, Reflexes, combat};
use crate::report::Reporter;
use crate::types::{AvatarState, EventKind};

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The session is gone; an outside supervisor has to reconnect.
    #[error("connection lost: {0}")]
    FatalConnection(String),
    #[error("prepare avatar directory: {0}")]
    Setup(#[from] std::io::Error),
}

/// Wires one avatar: mailbox executor, reflexes, tool reload and the world
/// event loop. Runs until shutdown or a fatal disconnect.
pub struct Runtime {
    cfg: Arc<VesselCfg>,
    paths: AvatarPaths,
    world: Arc<dyn World>,
    shutdown: ShutdownGuard,
}

/// Handles shared by the event loop.
struct Wiring {
    journal: Journal,
    reporter: Reporter,
    reflexes: Reflexes,
}

impl Runtime {
    pub fn new(cfg: Arc<VesselCfg>, paths: AvatarPaths, world: Arc<dyn World>) -> Self {
        Self {
            cfg,
            paths,
            world,
            shutdown: ShutdownGuard::new(),
        }
    }

    /// The cancellation token for stopping the runtime from outside.
    pub fn token(&self) -> CancellationToken {
        self.shutdown.token()
    }

    pub async fn run(self) -> Result<(), RuntimeError> {
        self.paths.ensure()?;
        self.shutdown.spawn_signal_listener();
        let token = self.shutdown.token();

        let registry = Arc::new(ToolRegistry::new(&self.paths, self.cfg.max_tool_depth));
        registry.load();
        let reload = match ReloadWatcher::spawn(Arc::clone(&registry), token.clone()) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::warn!(error = %e, "tool hot reload unavailable");
                None
            }
        };

        let journal = Journal::open(&self.paths, self.cfg.log_capacity);
        let reporter = Reporter::new(self.paths.clone(), Arc::clone(&self.world), &self.cfg);
        let arbiter = Arbiter::new();
        // Subscribe before anything can act so no event is missed.
        let mut events = self.world.subscribe();
        reporter.publish_status(AvatarState::Idle);

        let executor = TaskExecutor::new(
            Arc::clone(&self.world),
            registry,
            Mailbox::new(&self.paths),
            reporter.clone(),
            arbiter.clone(),
            &self.cfg,
        );
        let mut tasks = vec![tokio::spawn(executor.run(token.clone()))];
        let reflex_ctx = ReflexCtx::new(
            Arc::clone(&self.world),
            journal.clone(),
            arbiter,
            Arc::clone(&self.cfg),
        );
        let (reflexes, watchers) = Reflexes::spawn(Arc::new(reflex_ctx), token.clone());
        tasks.extend(watchers);

        tracing::info!(avatar = %self.paths.name(), "vessel runtime started");
        let wiring = Wiring { journal, reporter, reflexes };
        let result = self.event_loop(&mut events, &wiring, &token).await;

        token.cancel();
        drain(tasks, Duration::from_secs(self.cfg.shutdown_timeout_secs)).await;
        drop(reload);
        match &result {
            Ok(()) => tracing::info!("vessel runtime stopped"),
            Err(e) => tracing::error!(error = %e, "vessel runtime stopped"),
        }
        result
    }

    async fn event_loop(
        &self,
        events: &mut broadcast::Receiver<WorldEvent>,
        wiring: &Wiring,
        token: &CancellationToken,
    ) -> Result<(), RuntimeError> {
        loop {
            let received = tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("shutdown signal received, exiting event loop");
                    return Ok(());
                }
                received = events.recv() => received,
            };
            match received {
                Ok(event) => self.handle_event(event, wiring).await?,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "world events dropped");
                }
                Err(RecvError::Closed) => {
                    let reason = "event stream closed".to_string();
                    wiring.reporter.publish_status_with(AvatarState::Disconnected, reason_field(&reason));
                    return Err(RuntimeError::FatalConnection(reason));
                }
            }
        }
    }

    async fn handle_event(&self, event: WorldEvent, wiring: &Wiring) -> Result<(), RuntimeError> {
        match event {
            WorldEvent::Spawned => tracing::info!("spawned"),
            WorldEvent::Chat { from, message } => {
                if from != self.world.username() {
                    wiring.journal.record_chat(&from, &message, false);
                }
            }
            WorldEvent::Whisper { from, message } => {
                if from != self.world.username() {
                    wiring.journal.record_chat(&from, &message, true);
                }
            }
            WorldEvent::Hurt => {
                let perception = Perception::observe(self.world.as_ref());
                let by = combat::attacker(&perception, &self.cfg)
                    .map(|e| e.name.clone())
                    .unwrap_or_else(|| "unknown".into());
                tracing::debug!(by = %by, health = perception.health, "hurt");
                wiring.journal.record(EventKind::Hurt { by, health: perception.health });
                wiring.reflexes.on_hurt(&perception);
            }
            WorldEvent::Death => {
                tracing::warn!("avatar died");
                wiring.reporter.publish_status(AvatarState::Dead);
                wiring.journal.record(EventKind::Death);
                tokio::time::sleep(Duration::from_millis(self.cfg.respawn_delay_ms)).await;
                if let Err(e) = self.world.respawn().await {
                    tracing::warn!(error = %e, "respawn failed");
                }
                wiring.reporter.publish_status(AvatarState::Idle);
            }
            WorldEvent::Error(message) => {
                tracing::warn!(error = %message, "world error");
                let mut extra = Map::new();
                extra.insert("error".into(), message.into());
                wiring.reporter.publish_status_with(AvatarState::Error, extra);
            }
            WorldEvent::Kicked(reason) | WorldEvent::Ended(reason) => {
                wiring.reporter.publish_status_with(AvatarState::Disconnected, reason_field(&reason));
                return Err(RuntimeError::FatalConnection(reason));
            }
        }
        Ok(())
    }
}

fn reason_field(reason: &str) -> Map<String, serde_json::Value> {
    let mut extra = Map::new();
    extra.insert("reason".into(), reason.into());
    extra
}

/// Wait for tasks to observe cancellation, aborting any still running when
/// the grace period ends.
async fn drain(tasks: Vec<JoinHandle<()>>, grace: Duration) {
    let deadline = tokio::time::Instant::now() + grace;
    for task in tasks {
        let abort = task.abort_handle();
        if tokio::time::timeout_at(deadline, task).await.is_err() {
            tracing::warn!("task did not stop in time, aborting");
            abort.abort();
        }
    }
}
