//! Survival reflexes.
//!
//! Each watcher polls on its own interval, skips its cycle while any token
//! is held, and otherwise turns a [`Perception`] into an optional
//! [`Trigger`]. Triggers go to a single arbitration task that owns every
//! token transition: it acquires, spawns the bounded response, and releases
//! after the cooldown. A trigger that finds the token taken is dropped.

pub mod arbiter;
pub mod combat;
pub mod hunger;
pub mod shelter;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use vessel_world::{CapabilityError, Entity, EntityKind, ItemStack, Vec3, World};

use crate::config::VesselCfg;
use crate::io::Journal;
use arbiter::{Arbiter, TokenGuard, TokenKind};
use combat::CombatPlan;

const TRIGGER_QUEUE: usize = 8;

/// Creatures that provoke the combat and shelter reflexes.
pub const HOSTILE_MOBS: &[&str] = &[
    "zombie", "skeleton", "creeper", "spider", "cave_spider", "enderman", "witch", "pillager",
    "vindicator", "phantom", "drowned", "husk", "stray", "slime", "magma_cube", "blaze", "ghast",
    "ravager", "evoker", "vex", "warden", "elder_guardian", "guardian", "silverfish",
    "zombie_villager",
];

/// Best first.
pub const WEAPON_RANKING: &[&str] = &[
    "diamond_sword", "diamond_axe", "iron_sword", "iron_axe", "stone_sword", "stone_axe",
    "wooden_sword", "wooden_axe",
];

pub fn is_hostile(entity: &Entity) -> bool {
    entity.kind == EntityKind::Mob && HOSTILE_MOBS.contains(&entity.name.as_str())
}

pub fn best_weapon(inventory: &[ItemStack]) -> Option<&'static str> {
    WEAPON_RANKING
        .iter()
        .copied()
        .find(|w| inventory.iter().any(|s| s.name == *w))
}

/// What a watcher sees in one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Perception {
    pub position: Vec3,
    pub health: f32,
    pub food: u32,
    pub time: u32,
    pub inventory: Vec<ItemStack>,
    pub entities: Vec<Entity>,
}

impl Perception {
    pub fn observe(world: &dyn World) -> Self {
        Self {
            position: world.position(),
            health: world.health(),
            food: world.food(),
            time: world.time_of_day(),
            inventory: world.inventory(),
            entities: world.entities(),
        }
    }

    /// Closest entity matching `filter` strictly within `radius`.
    pub fn nearest(&self, radius: f64, filter: impl Fn(&Entity) -> bool) -> Option<&Entity> {
        self.entities
            .iter()
            .filter(|e| filter(e))
            .map(|e| (e.position.distance_to(self.position), e))
            .filter(|(d, _)| *d < radius)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, e)| e)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    Combat { threat: Entity, plan: CombatPlan },
    Hunger { item: String },
    Shelter { health: f32, time: u32 },
}

impl Trigger {
    pub fn token(&self) -> TokenKind {
        match self {
            Self::Combat { .. } => TokenKind::Combat,
            Self::Hunger { .. } => TokenKind::Hunger,
            Self::Shelter { .. } => TokenKind::Shelter,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReflexError {
    #[error("{step}: {source}")]
    Capability {
        step: &'static str,
        source: CapabilityError,
    },
    #[error("no neighbouring block to seal against")]
    SealFailed,
}

impl ReflexError {
    fn at(step: &'static str) -> impl FnOnce(CapabilityError) -> Self {
        move |source| Self::Capability { step, source }
    }
}

/// Everything a reflex response touches.
pub struct ReflexCtx {
    pub world: Arc<dyn World>,
    pub journal: Journal,
    pub arbiter: Arbiter,
    pub cfg: Arc<VesselCfg>,
    last_meal: watch::Sender<Option<Instant>>,
}

impl ReflexCtx {
    pub fn new(world: Arc<dyn World>, journal: Journal, arbiter: Arbiter, cfg: Arc<VesselCfg>) -> Self {
        let (last_meal, _) = watch::channel(None);
        Self { world, journal, arbiter, cfg, last_meal }
    }

    /// When the hunger reflex last ate successfully.
    pub fn last_meal(&self) -> Option<Instant> {
        *self.last_meal.borrow()
    }

    pub(crate) fn record_meal(&self, at: Instant) {
        self.last_meal.send_replace(Some(at));
    }

    fn cooldown(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Combat => Duration::from_millis(self.cfg.combat_cooldown_ms),
            _ => Duration::from_millis(self.cfg.reflex_cooldown_ms),
        }
    }
}

/// Handle to the running reflex system.
#[derive(Clone)]
pub struct Reflexes {
    ctx: Arc<ReflexCtx>,
    tx: mpsc::Sender<Trigger>,
}

impl Reflexes {
    /// Spawn the arbitration task and the three watchers.
    pub fn spawn(ctx: Arc<ReflexCtx>, cancel: CancellationToken) -> (Self, Vec<JoinHandle<()>>) {
        let (tx, rx) = mpsc::channel(TRIGGER_QUEUE);
        let cfg = Arc::clone(&ctx.cfg);
        let handles = vec![
            tokio::spawn(arbitrate(Arc::clone(&ctx), rx, cancel.clone())),
            spawn_watcher("combat", cfg.combat_poll_ms, Arc::clone(&ctx), tx.clone(), cancel.clone(), |ctx, p| {
                combat::evaluate(p, &ctx.cfg)
            }),
            spawn_watcher("hunger", cfg.hunger_poll_ms, Arc::clone(&ctx), tx.clone(), cancel.clone(), |ctx, p| {
                hunger::evaluate(p, ctx.last_meal(), Instant::now(), &ctx.cfg)
            }),
            spawn_watcher("shelter", cfg.shelter_poll_ms, Arc::clone(&ctx), tx.clone(), cancel, |ctx, p| {
                shelter::evaluate(p, &ctx.cfg)
            }),
        ];
        (Self { ctx, tx }, handles)
    }

    pub fn ctx(&self) -> &Arc<ReflexCtx> {
        &self.ctx
    }

    /// The avatar was hurt: fight or flee the nearest mob in reach, if any.
    /// Returns whether a trigger was sent.
    pub fn on_hurt(&self, perception: &Perception) -> bool {
        match combat::on_hurt(perception, &self.ctx.cfg) {
            Some(trigger) => offer(&self.tx, trigger),
            None => false,
        }
    }
}

fn offer(tx: &mpsc::Sender<Trigger>, trigger: Trigger) -> bool {
    match tx.try_send(trigger) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(error = %e, "trigger dropped");
            false
        }
    }
}

fn spawn_watcher<F>(
    name: &'static str,
    poll_ms: u64,
    ctx: Arc<ReflexCtx>,
    tx: mpsc::Sender<Trigger>,
    cancel: CancellationToken,
    evaluate: F,
) -> JoinHandle<()>
where
    F: Fn(&ReflexCtx, &Perception) -> Option<Trigger> + Send + 'static,
{
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_millis(poll_ms));
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {
                    if !ctx.arbiter.is_free() {
                        continue;
                    }
                    let perception = Perception::observe(ctx.world.as_ref());
                    if let Some(trigger) = evaluate(&ctx, &perception) {
                        tracing::debug!(watcher = name, ?trigger, "reflex triggered");
                        offer(&tx, trigger);
                    }
                }
            }
        }
        tracing::debug!(watcher = name, "watcher stopped");
    })
}

async fn arbitrate(ctx: Arc<ReflexCtx>, mut rx: mpsc::Receiver<Trigger>, cancel: CancellationToken) {
    loop {
        let trigger = tokio::select! {
            _ = cancel.cancelled() => break,
            trigger = rx.recv() => match trigger {
                Some(trigger) => trigger,
                None => break,
            },
        };
        let kind = trigger.token();
        let Some(guard) = ctx.arbiter.try_acquire(kind) else {
            tracing::debug!(token = %kind, "token busy, trigger dropped");
            continue;
        };
        tokio::spawn(respond(Arc::clone(&ctx), trigger, guard));
    }
}

/// Run one response under the action deadline, then hold the token for the
/// cooldown whatever the result.
pub async fn respond(ctx: Arc<ReflexCtx>, trigger: Trigger, guard: TokenGuard) {
    let kind = guard.kind();
    let deadline = Duration::from_millis(ctx.cfg.reflex_action_timeout_ms);
    let result = tokio::time::timeout(deadline, act(&ctx, &trigger)).await;
    match result {
        Ok(Ok(())) => tracing::info!(token = %kind, "reflex done"),
        Ok(Err(e)) => tracing::warn!(token = %kind, error = %e, "reflex failed"),
        Err(_) => {
            ctx.world.set_goal(None);
            tracing::warn!(token = %kind, deadline_ms = deadline.as_millis() as u64, "reflex timed out");
        }
    }
    tokio::time::sleep(ctx.cooldown(kind)).await;
    drop(guard);
}

async fn act(ctx: &ReflexCtx, trigger: &Trigger) -> Result<(), ReflexError> {
    match trigger {
        Trigger::Combat { threat, plan } => combat::respond(ctx, threat, plan).await,
        Trigger::Hunger { item } => hunger::respond(ctx, item).await,
        Trigger::Shelter { health, time } => shelter::respond(ctx, *health, *time).await,
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{quick_cfg, rig};
    use super::*;

    fn mob(name: &str, kind: EntityKind, x: f64) -> Entity {
        Entity { id: 1, name: name.into(), kind, position: Vec3::new(x, 64.0, 0.0) }
    }

    #[test]
    fn hostility_needs_mob_kind() {
        assert!(is_hostile(&mob("zombie", EntityKind::Mob, 0.0)));
        assert!(!is_hostile(&mob("zombie", EntityKind::Player, 0.0)));
        assert!(!is_hostile(&mob("cow", EntityKind::Mob, 0.0)));
    }

    #[test]
    fn weapon_ranking_prefers_material_then_sword() {
        let inv = vec![ItemStack::new("stone_sword", 1), ItemStack::new("iron_axe", 1)];
        assert_eq!(best_weapon(&inv), Some("iron_axe"));
        let inv = vec![ItemStack::new("iron_axe", 1), ItemStack::new("iron_sword", 1)];
        assert_eq!(best_weapon(&inv), Some("iron_sword"));
        assert_eq!(best_weapon(&[ItemStack::new("stick", 1)]), None);
    }

    #[tokio::test]
    async fn failed_reflex_still_releases_after_cooldown() {
        let r = rig(quick_cfg());
        let guard = r.ctx.arbiter.try_acquire(TokenKind::Hunger).unwrap();
        // Nothing to eat: equip fails.
        let started = Instant::now();
        respond(r.ctx.clone(), Trigger::Hunger { item: "bread".into() }, guard).await;
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert!(r.ctx.arbiter.is_free());
        assert!(r.ctx.last_meal().is_none());
    }

    #[tokio::test]
    async fn stuck_reflex_is_cut_off_by_deadline() {
        let r = rig(VesselCfg { reflex_action_timeout_ms: 50, ..quick_cfg() });
        r.world.give("bread", 1);
        r.world.set_action_latency(Duration::from_secs(5));
        let guard = r.ctx.arbiter.try_acquire(TokenKind::Hunger).unwrap();
        let started = Instant::now();
        respond(r.ctx.clone(), Trigger::Hunger { item: "bread".into() }, guard).await;
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(r.ctx.arbiter.is_free());
    }

    #[tokio::test]
    async fn watchers_fight_nearby_hostile() {
        let r = rig(VesselCfg { combat_poll_ms: 10, ..quick_cfg() });
        r.world.give("iron_sword", 1);
        let zombie = r.world.spawn_entity("zombie", EntityKind::Mob, Vec3::new(3.0, 64.0, 0.5));
        let cancel = CancellationToken::new();
        let (reflexes, _handles) = Reflexes::spawn(r.ctx.clone(), cancel.clone());

        for _ in 0..100 {
            if !r.world.entity_alive(zombie) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        cancel.cancel();
        assert!(!r.world.entity_alive(zombie));
        assert_eq!(r.world.held().as_deref(), Some("iron_sword"));
        let events = reflexes.ctx().journal.events();
        assert!(events.iter().any(|e| matches!(
            &e.kind,
            crate::types::EventKind::Reflex { action: crate::types::ReflexAction::Fight, .. }
        )));
    }

    #[tokio::test]
    async fn watchers_skip_while_executor_holds_token() {
        let r = rig(VesselCfg { hunger_poll_ms: 10, ..quick_cfg() });
        r.world.give("bread", 1);
        r.world.set_food(5);
        let arbiter = r.ctx.arbiter.clone();
        let busy = arbiter.try_acquire(TokenKind::Executor).unwrap();
        let cancel = CancellationToken::new();
        let (_reflexes, _handles) = Reflexes::spawn(r.ctx.clone(), cancel.clone());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(r.world.food(), 5);

        drop(busy);
        for _ in 0..100 {
            if r.world.food() > 5 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        cancel.cancel();
        assert_eq!(r.world.food(), 10);
    }
}
