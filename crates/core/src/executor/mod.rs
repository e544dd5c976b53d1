//! Runs operator commands taken from the mailbox.
//!
//! One command at a time, only while holding the executor token, bounded by
//! the action timeout. Every run ends with an outcome record, success or not.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use vessel_world::World;

use crate::capability::{Script, ScriptError, ToolContext, ToolError, ToolRegistry, ToolTable};
use crate::config::VesselCfg;
use crate::io::Mailbox;
use crate::reflex::arbiter::{Arbiter, TokenKind};
use crate::report::{Reporter, build_outcome};
use crate::types::{ActionOutcome, AvatarState, Command};

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),
    #[error("{0}")]
    ToolResolution(String),
    #[error("{tool}: {reason}")]
    Capability { tool: String, reason: String },
    #[error("script error: {0}")]
    Script(#[from] ScriptError),
    #[error("panicked: {0}")]
    Panicked(String),
    #[error("tool nesting exceeded {0} levels")]
    DepthExceeded(usize),
}

impl From<ToolError> for ExecutionError {
    fn from(e: ToolError) -> Self {
        match e {
            ToolError::Unresolved(_) | ToolError::Broken { .. } => Self::ToolResolution(e.to_string()),
            ToolError::Args { tool, reason } => Self::Capability { tool, reason },
            ToolError::Capability { tool, source } => Self::Capability { tool, reason: source.to_string() },
            ToolError::Script(e) => Self::Script(e),
            ToolError::DepthExceeded(n) => Self::DepthExceeded(n),
        }
    }
}

/// Text form of a script's final value: `null` reads as "done".
pub fn render_result(value: Value) -> String {
    match value {
        Value::Null => "done".into(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

pub struct TaskExecutor {
    world: Arc<dyn World>,
    registry: Arc<ToolRegistry>,
    mailbox: Mailbox,
    reporter: Reporter,
    arbiter: Arbiter,
    poll: Duration,
    timeout: Duration,
    settle: Duration,
}

impl TaskExecutor {
    pub fn new(
        world: Arc<dyn World>,
        registry: Arc<ToolRegistry>,
        mailbox: Mailbox,
        reporter: Reporter,
        arbiter: Arbiter,
        cfg: &VesselCfg,
    ) -> Self {
        Self {
            world,
            registry,
            mailbox,
            reporter,
            arbiter,
            poll: cfg.mailbox_poll(),
            timeout: cfg.action_timeout(),
            settle: cfg.settle_delay(),
        }
    }

    /// Poll the mailbox every interval until cancelled.
    pub async fn run(self, cancel: CancellationToken) {
        let mut tick = tokio::time::interval(self.poll);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(poll_ms = self.poll.as_millis() as u64, "executor started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {
                    self.poll_once().await;
                }
            }
        }
        tracing::info!("executor stopped");
    }

    /// One poll cycle. Does nothing, and leaves the mailbox alone, while any
    /// token is held.
    pub async fn poll_once(&self) -> Option<ActionOutcome> {
        let guard = self.arbiter.try_acquire(TokenKind::Executor)?;
        let command = match self.mailbox.try_take() {
            Ok(Some(command)) => command,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "mailbox take failed");
                return None;
            }
        };
        let outcome = self.execute(&command).await;
        drop(guard);
        Some(outcome)
    }

    /// Run one command and publish its outcome. The caller holds the token.
    pub async fn execute(&self, command: &Command) -> ActionOutcome {
        tracing::info!(id = %command.id, first_line = %command.preview(), "executing command");
        self.reporter.publish_status(AvatarState::Executing);

        let before = self.reporter.snapshot();
        let table = self.registry.snapshot();
        let started = Instant::now();
        let run = self.run_body(&command.script, table).await;
        if run.is_ok() {
            tokio::time::sleep(self.settle).await;
        }
        let after = self.reporter.snapshot();

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let run = match run {
            Ok(value) => {
                tracing::info!(id = %command.id, elapsed_ms, "command finished");
                Ok(render_result(value))
            }
            Err(e) => {
                tracing::warn!(id = %command.id, elapsed_ms, error = %e, "command failed");
                Err(e.to_string())
            }
        };
        let outcome = build_outcome(run, &before, &after);
        self.reporter.publish_outcome(&outcome);
        self.reporter.publish_status(AvatarState::Idle);
        outcome
    }

    async fn run_body(&self, source: &str, table: Arc<ToolTable>) -> Result<Value, ExecutionError> {
        let script = Script::parse(source)?;
        let ctx = ToolContext::new(Arc::clone(&self.world), table, self.registry.max_depth());
        let mut body = tokio::spawn(async move { script.run(&ctx, Map::new()).await });

        match tokio::time::timeout(self.timeout, &mut body).await {
            Ok(Ok(result)) => result.map_err(ExecutionError::from),
            Ok(Err(join)) => Err(ExecutionError::Panicked(panic_message(join))),
            Err(_) => {
                body.abort();
                self.world.set_goal(None);
                Err(ExecutionError::Timeout(self.timeout))
            }
        }
    }
}

fn panic_message(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return "body task cancelled".into();
    }
    let payload = err.into_panic();
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Tool, ToolMeta};
    use crate::io::AvatarPaths;
    use serde_json::json;
    use vessel_world::sim::SimWorld;

    struct Boom;

    #[async_trait::async_trait]
    impl Tool for Boom {
        fn meta(&self) -> ToolMeta {
            ToolMeta::new("boom", "panics")
        }

        async fn call(&self, _ctx: &ToolContext, _args: Value) -> Result<Value, ToolError> {
            panic!("kaboom");
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        paths: AvatarPaths,
        world: Arc<SimWorld>,
        arbiter: Arbiter,
        executor: TaskExecutor,
    }

    fn harness(cfg: VesselCfg) -> Harness {
        let dir = tempfile::TempDir::new().unwrap();
        let paths = AvatarPaths::new(dir.path(), "bob");
        paths.ensure().unwrap();
        let world = Arc::new(SimWorld::new("bob"));
        let mut builtins = crate::capability::builtin::all();
        builtins.push(Arc::new(Boom));
        let registry = Arc::new(ToolRegistry::with_builtins(
            paths.shared_tools_dir(),
            paths.tools_dir(),
            builtins,
            cfg.max_tool_depth,
        ));
        let arbiter = Arbiter::new();
        let reporter = Reporter::new(paths.clone(), world.clone(), &cfg);
        let executor = TaskExecutor::new(
            world.clone(),
            registry,
            Mailbox::new(&paths),
            reporter,
            arbiter.clone(),
            &cfg,
        );
        Harness { _dir: dir, paths, world, arbiter, executor }
    }

    fn fast_cfg() -> VesselCfg {
        VesselCfg { settle_ms: 0, ..VesselCfg::default() }
    }

    #[tokio::test]
    async fn successful_command_reports_diff() {
        let h = harness(fast_cfg());
        let outcome = h
            .executor
            .execute(&Command::new("move_near {\"x\": 12.8, \"y\": 64, \"z\": 0.5}\ndig {\"x\": 12, \"y\": 63, \"z\": 0}"))
            .await;
        assert!(outcome.ok, "{outcome:?}");
        assert_eq!(outcome.result.as_deref(), Some("done"));
        assert_eq!(outcome.moved, "12 blocks");
        assert!(outcome.inventory_changed);
        assert_eq!(outcome.inventory, vec!["dirt x1"]);
    }

    #[tokio::test]
    async fn return_value_becomes_result_text() {
        let h = harness(fast_cfg());
        h.world.give("oak_log", 3);
        let outcome = h
            .executor
            .execute(&Command::new("let n = count {\"item\": \"oak_log\"}\nreturn {\"logs\": \"$n\"}"))
            .await;
        assert_eq!(outcome.result.as_deref(), Some(r#"{"logs":3}"#));
    }

    #[tokio::test]
    async fn unknown_tool_fails_with_state_attached() {
        let h = harness(fast_cfg());
        let outcome = h.executor.execute(&Command::new("fly {}")).await;
        assert!(!outcome.ok);
        assert_eq!(outcome.error.as_deref(), Some("unknown tool: fly"));
        assert_eq!(outcome.moved, "no");
        assert_eq!(outcome.health, "20/20");
    }

    #[tokio::test]
    async fn parse_error_fails_without_running() {
        let h = harness(fast_cfg());
        let outcome = h.executor.execute(&Command::new("say {\"message\": \"hi\"}\nsay {broken")).await;
        assert!(!outcome.ok);
        assert!(outcome.error.unwrap().starts_with("script error: line 2"));
        assert!(h.world.said().is_empty());
    }

    #[tokio::test]
    async fn panic_in_body_is_contained() {
        let h = harness(fast_cfg());
        let outcome = h.executor.execute(&Command::new("boom")).await;
        assert_eq!(outcome.error.as_deref(), Some("panicked: kaboom"));
        // The executor still works afterwards.
        assert!(h.executor.execute(&Command::new("position")).await.ok);
    }

    #[tokio::test]
    async fn timeout_clears_goal_and_fails() {
        let h = harness(VesselCfg { action_timeout_ms: 100, ..fast_cfg() });
        h.world.set_action_latency(Duration::from_secs(5));
        let started = Instant::now();
        let outcome = h.executor.execute(&Command::new("move_near {\"x\": 30, \"y\": 64, \"z\": 0}")).await;
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(!outcome.ok);
        assert!(outcome.error.unwrap().starts_with("timed out"));
        assert_eq!(h.world.goal(), None);
    }

    #[tokio::test]
    async fn poll_skips_while_token_held() {
        let h = harness(fast_cfg());
        Mailbox::new(&h.paths).submit("say {\"message\": \"hi\"}", false).unwrap();

        let reflex = h.arbiter.try_acquire(TokenKind::Hunger).unwrap();
        assert!(h.executor.poll_once().await.is_none());
        assert!(h.paths.inbox().exists());
        drop(reflex);

        let outcome = h.executor.poll_once().await.unwrap();
        assert!(outcome.ok);
        assert!(!h.paths.inbox().exists());
        assert!(h.arbiter.is_free());
        assert_eq!(h.world.said(), vec!["hi"]);
    }

    #[test]
    fn result_rendering() {
        assert_eq!(render_result(Value::Null), "done");
        assert_eq!(render_result(json!("ok")), "ok");
        assert_eq!(render_result(json!(3)), "3");
    }
}
