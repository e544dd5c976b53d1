//! Status and outcome publication.
//!
//! `status.json` is rewritten on every state transition and `outbox.json`
//! once per executed command. Both are replaced atomically so a reader never
//! sees a partial document.

mod snapshot;

pub use snapshot::{AvatarSnapshot, DiffSet, describe_gauge, describe_moved, diff, nearby_summary};

use std::sync::Arc;

use serde_json::{Map, Value};
use vessel_world::World;

use crate::config::VesselCfg;
use crate::io::{AvatarPaths, write_json_atomic};
use crate::types::{ActionOutcome, AvatarState, StatusReport};

#[derive(Clone)]
pub struct Reporter {
    paths: AvatarPaths,
    world: Arc<dyn World>,
    nearby_radius: f64,
    nearby_limit: usize,
}

impl Reporter {
    pub fn new(paths: AvatarPaths, world: Arc<dyn World>, cfg: &VesselCfg) -> Self {
        Self {
            paths,
            world,
            nearby_radius: cfg.nearby_radius,
            nearby_limit: cfg.nearby_limit,
        }
    }

    pub fn snapshot(&self) -> AvatarSnapshot {
        AvatarSnapshot::capture(self.world.as_ref(), self.nearby_radius, self.nearby_limit)
    }

    pub fn status(&self, state: AvatarState, extra: Map<String, Value>) -> StatusReport {
        StatusReport {
            state,
            health: self.world.health(),
            food: self.world.food(),
            position: self.world.position(),
            time: self.world.time_of_day(),
            extra,
        }
    }

    pub fn publish_status(&self, state: AvatarState) {
        self.publish_status_with(state, Map::new());
    }

    /// Publish a status with extra fields merged into the top-level object.
    pub fn publish_status_with(&self, state: AvatarState, extra: Map<String, Value>) {
        let report = self.status(state, extra);
        match write_json_atomic(&self.paths.status(), &report) {
            Ok(()) => tracing::debug!(state = %state, "status published"),
            Err(e) => tracing::warn!(state = %state, error = %e, "status write failed"),
        }
    }

    pub fn publish_outcome(&self, outcome: &ActionOutcome) {
        match write_json_atomic(&self.paths.outbox(), outcome) {
            Ok(()) => tracing::debug!(ok = outcome.ok, "outcome published"),
            Err(e) => tracing::warn!(error = %e, "outcome write failed"),
        }
    }
}

/// Build the outcome record from a run result and the snapshots around it.
pub fn build_outcome(
    run: Result<String, String>,
    before: &AvatarSnapshot,
    after: &AvatarSnapshot,
) -> ActionOutcome {
    let d = diff(before, after);
    let (ok, result, error) = match run {
        Ok(r) => (true, Some(r), None),
        Err(e) => (false, None, Some(e)),
    };
    ActionOutcome {
        ok,
        result,
        error,
        position: after.position,
        health: d.health,
        food: d.food,
        moved: d.moved,
        inventory: after.inventory_lines(),
        inventory_changed: d.inventory_changed,
        time: after.time,
        nearby_entities: after.nearby.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vessel_world::sim::SimWorld;
    use vessel_world::{ItemStack, Vec3};

    #[test]
    fn failed_run_carries_error_and_state() {
        let before = AvatarSnapshot {
            position: Vec3::new(0.0, 64.0, 0.0),
            health: 20.0,
            food: 20,
            time: 1000,
            inventory: vec![ItemStack::new("dirt", 2)],
            nearby: vec![],
        };
        let mut after = before.clone();
        after.health = 17.0;
        let outcome = build_outcome(Err("target unreachable".into()), &before, &after);
        assert!(!outcome.ok);
        assert_eq!(outcome.error.as_deref(), Some("target unreachable"));
        assert_eq!(outcome.health, "17/20 (was 20)");
        assert_eq!(outcome.inventory, vec!["dirt x2"]);
        assert!(!outcome.inventory_changed);
    }

    #[test]
    fn publish_writes_status_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let paths = AvatarPaths::new(dir.path(), "bob");
        paths.ensure().unwrap();
        let world = Arc::new(SimWorld::new("bob"));
        let reporter = Reporter::new(paths.clone(), world, &VesselCfg::default());

        let mut extra = Map::new();
        extra.insert("reason".into(), "kicked".into());
        reporter.publish_status_with(AvatarState::Disconnected, extra);

        let raw = std::fs::read_to_string(paths.status()).unwrap();
        let report: StatusReport = serde_json::from_str(&raw).unwrap();
        assert_eq!(report.state, AvatarState::Disconnected);
        assert_eq!(report.extra["reason"], "kicked");
        assert_eq!(report.health, 20.0);
    }
}
