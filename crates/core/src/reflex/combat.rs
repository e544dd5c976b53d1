use std::time::Duration;

use vessel_world::{Entity, EntityKind, EquipSlot, Goal, Vec3};

use super::{Perception, ReflexCtx, ReflexError, Trigger, best_weapon, is_hostile};
use crate::config::VesselCfg;
use crate::types::{EventKind, ReflexAction};

/// Arrival tolerance of the flee goal.
const FLEE_TOLERANCE: f64 = 3.0;

#[derive(Debug, Clone, PartialEq)]
pub enum CombatPlan {
    Fight { weapon: String },
    Flee { goal: Vec3 },
}

/// Fight with the best weapon while healthy enough, otherwise run.
pub fn plan(perception: &Perception, threat: &Entity, cfg: &VesselCfg) -> CombatPlan {
    match best_weapon(&perception.inventory) {
        Some(weapon) if perception.health > cfg.combat_health_floor => {
            CombatPlan::Fight { weapon: weapon.to_string() }
        }
        _ => CombatPlan::Flee {
            goal: flee_goal(perception.position, threat.position, cfg.flee_distance),
        },
    }
}

/// `distance` blocks from `from`, directly away from `threat`.
pub fn flee_goal(from: Vec3, threat: Vec3, distance: f64) -> Vec3 {
    from.plus(from.minus(threat).normalize().scaled(distance))
}

/// Proximity check: the nearest hostile inside the engagement radius.
pub fn evaluate(perception: &Perception, cfg: &VesselCfg) -> Option<Trigger> {
    let threat = perception.nearest(cfg.combat_radius, is_hostile)?;
    Some(Trigger::Combat {
        threat: threat.clone(),
        plan: plan(perception, threat, cfg),
    })
}

/// The mob most likely to have dealt damage. Players never count.
pub fn attacker<'a>(perception: &'a Perception, cfg: &VesselCfg) -> Option<&'a Entity> {
    perception.nearest(cfg.hurt_attacker_radius, |e| e.kind == EntityKind::Mob)
}

pub fn on_hurt(perception: &Perception, cfg: &VesselCfg) -> Option<Trigger> {
    let threat = attacker(perception, cfg)?;
    Some(Trigger::Combat {
        threat: threat.clone(),
        plan: plan(perception, threat, cfg),
    })
}

pub async fn respond(ctx: &ReflexCtx, threat: &Entity, plan: &CombatPlan) -> Result<(), ReflexError> {
    let world = ctx.world.as_ref();
    match plan {
        CombatPlan::Fight { weapon } => {
            world.equip(weapon, EquipSlot::Hand).await.map_err(ReflexError::at("equip"))?;
            world.attack(threat.id).await.map_err(ReflexError::at("attack"))?;
            tracing::info!(mob = %threat.name, weapon = %weapon, "fighting");
            ctx.journal.record(EventKind::Reflex {
                action: ReflexAction::Fight,
                target: Some(threat.name.clone()),
                weapon: Some(weapon.clone()),
                from: None,
                health: None,
            });
        }
        CombatPlan::Flee { goal } => {
            world.set_goal(Some(Goal { target: *goal, tolerance: FLEE_TOLERANCE }));
            world.set_sprint(true);
            let sprint_for = Duration::from_millis(ctx.cfg.flee_sprint_ms);
            let runner = ctx.world.clone();
            tokio::spawn(async move {
                tokio::time::sleep(sprint_for).await;
                runner.set_sprint(false);
            });
            let health = world.health();
            tracing::info!(from = %threat.name, health, "fleeing");
            ctx.journal.record(EventKind::Reflex {
                action: ReflexAction::Flee,
                target: None,
                weapon: None,
                from: Some(threat.name.clone()),
                health: Some(health),
            });
        }
    }
    Ok(())
}
