use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::broadcast;

use crate::engine::{
    Block, BlockPos, CapabilityError, Entity, EntityId, EntityKind, EquipSlot, Goal, ItemStack,
    Vec3, World, WorldEvent,
};

/// Surface height of the flat terrain.
const GROUND_LEVEL: i32 = 64;
/// Blocks below this depth are stone rather than dirt.
const DIRT_DEPTH: i32 = 4;
const MAX_HEALTH: f32 = 20.0;
const MAX_FOOD: u32 = 20;
/// How far a fall is traced before giving up.
const MAX_FALL: i32 = 64;

/// Food points restored per edible item. Anything else cannot be consumed.
const FOOD_VALUES: &[(&str, u32)] = &[
    ("cooked_beef", 8),
    ("cooked_porkchop", 8),
    ("cooked_mutton", 6),
    ("cooked_chicken", 6),
    ("cooked_salmon", 6),
    ("cooked_cod", 5),
    ("bread", 5),
    ("baked_potato", 5),
    ("carrot", 3),
    ("apple", 4),
    ("melon_slice", 2),
    ("potato", 1),
    ("beetroot", 1),
    ("cookie", 2),
    ("pumpkin_pie", 8),
    ("golden_carrot", 6),
    ("golden_apple", 4),
];

fn weapon_damage(item: Option<&str>) -> f32 {
    match item {
        Some(name) if name.starts_with("diamond_") => 7.0,
        Some(name) if name.starts_with("iron_") => 6.0,
        Some(name) if name.starts_with("stone_") => 5.0,
        Some(name) if name.starts_with("wooden_") => 4.0,
        _ => 1.0,
    }
}

#[derive(Debug)]
struct SimEntity {
    entity: Entity,
    health: f32,
}

#[derive(Debug)]
struct SimState {
    position: Vec3,
    spawn: Vec3,
    health: f32,
    food: u32,
    time_of_day: u32,
    inventory: Vec<ItemStack>,
    held: Option<String>,
    entities: Vec<SimEntity>,
    next_entity_id: EntityId,
    blocks: HashMap<BlockPos, String>,
    goal: Option<Goal>,
    sprinting: bool,
    action_latency: Duration,
    connected: bool,
    said: Vec<String>,
}

impl SimState {
    fn block_name(&self, pos: BlockPos) -> String {
        if let Some(name) = self.blocks.get(&pos) {
            return name.clone();
        }
        if pos.y >= GROUND_LEVEL {
            "air".into()
        } else if pos.y >= GROUND_LEVEL - DIRT_DEPTH {
            "dirt".into()
        } else {
            "stone".into()
        }
    }

    fn block(&self, pos: BlockPos) -> Block {
        let name = self.block_name(pos);
        let diggable = name != "bedrock";
        Block { name, pos, diggable }
    }

    fn add_item(&mut self, name: &str, count: u32) {
        if let Some(stack) = self.inventory.iter_mut().find(|s| s.name == name) {
            stack.count += count;
        } else {
            self.inventory.push(ItemStack::new(name, count));
        }
    }

    /// Remove one of `name`; returns false when none are held.
    fn take_one(&mut self, name: &str) -> bool {
        let Some(idx) = self.inventory.iter().position(|s| s.name == name) else {
            return false;
        };
        self.inventory[idx].count -= 1;
        if self.inventory[idx].count == 0 {
            self.inventory.remove(idx);
            if self.held.as_deref() == Some(name) {
                self.held = None;
            }
        }
        true
    }

    /// Drop the avatar onto the first solid block beneath it.
    fn settle(&mut self) {
        let feet = self.position.floored();
        for depth in 1..=MAX_FALL {
            let below = feet.offset(0, -depth, 0);
            if self.block(below).is_solid() {
                self.position.y = f64::from(below.y + 1);
                return;
            }
        }
    }

    fn ensure_connected(&self) -> Result<(), CapabilityError> {
        if self.connected {
            Ok(())
        } else {
            Err(CapabilityError::Disconnected)
        }
    }
}

/// In-memory world on flat terrain. Actions complete instantly unless an
/// action latency is configured; movement teleports to the goal.
pub struct SimWorld {
    username: String,
    state: Mutex<SimState>,
    events: broadcast::Sender<WorldEvent>,
}

impl SimWorld {
    pub fn new(username: impl Into<String>) -> Self {
        let spawn = Vec3::new(0.5, f64::from(GROUND_LEVEL), 0.5);
        let (events, _) = broadcast::channel(64);
        Self {
            username: username.into(),
            state: Mutex::new(SimState {
                position: spawn,
                spawn,
                health: MAX_HEALTH,
                food: MAX_FOOD,
                time_of_day: 1000,
                inventory: Vec::new(),
                held: None,
                entities: Vec::new(),
                next_entity_id: 1,
                blocks: HashMap::new(),
                goal: None,
                sprinting: false,
                action_latency: Duration::ZERO,
                connected: true,
                said: Vec::new(),
            }),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        // A poisoned lock only means a test panicked mid-update; the state is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn pause(&self) {
        let latency = self.lock().action_latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    // ── Scenario controls ──

    pub fn set_health(&self, health: f32) {
        self.lock().health = health.clamp(0.0, MAX_HEALTH);
    }

    pub fn set_food(&self, food: u32) {
        self.lock().food = food.min(MAX_FOOD);
    }

    pub fn set_time_of_day(&self, time: u32) {
        self.lock().time_of_day = time % 24_000;
    }

    pub fn teleport(&self, position: Vec3) {
        self.lock().position = position;
    }

    pub fn give(&self, item: &str, count: u32) {
        self.lock().add_item(item, count);
    }

    pub fn set_block(&self, pos: BlockPos, name: &str) {
        self.lock().blocks.insert(pos, name.to_string());
    }

    /// Every action call sleeps this long before taking effect.
    pub fn set_action_latency(&self, latency: Duration) {
        self.lock().action_latency = latency;
    }

    pub fn spawn_entity(&self, name: &str, kind: EntityKind, position: Vec3) -> EntityId {
        let mut state = self.lock();
        let id = state.next_entity_id;
        state.next_entity_id += 1;
        state.entities.push(SimEntity {
            entity: Entity { id, name: name.to_string(), kind, position },
            health: 20.0,
        });
        id
    }

    pub fn despawn_entity(&self, id: EntityId) {
        self.lock().entities.retain(|e| e.entity.id != id);
    }

    /// Apply damage to the avatar and emit the matching events.
    pub fn hurt(&self, amount: f32) {
        let died = {
            let mut state = self.lock();
            state.health = (state.health - amount).max(0.0);
            state.health == 0.0
        };
        self.emit(WorldEvent::Hurt);
        if died {
            self.emit(WorldEvent::Death);
        }
    }

    pub fn emit(&self, event: WorldEvent) {
        if let WorldEvent::Kicked(reason) | WorldEvent::Ended(reason) = &event {
            tracing::debug!(reason = %reason, "simulated session closed");
            self.lock().connected = false;
        }
        // No subscribers is fine: nobody is listening yet.
        let _ = self.events.send(event);
    }

    // ── Inspection ──

    pub fn held(&self) -> Option<String> {
        self.lock().held.clone()
    }

    pub fn goal(&self) -> Option<Goal> {
        self.lock().goal
    }

    pub fn is_sprinting(&self) -> bool {
        self.lock().sprinting
    }

    pub fn entity_alive(&self, id: EntityId) -> bool {
        self.lock().entities.iter().any(|e| e.entity.id == id)
    }

    pub fn said(&self) -> Vec<String> {
        self.lock().said.clone()
    }
}

#[async_trait::async_trait]
impl World for SimWorld {
    fn username(&self) -> &str {
        &self.username
    }

    fn position(&self) -> Vec3 {
        self.lock().position
    }

    fn health(&self) -> f32 {
        self.lock().health
    }

    fn food(&self) -> u32 {
        self.lock().food
    }

    fn time_of_day(&self) -> u32 {
        self.lock().time_of_day
    }

    fn inventory(&self) -> Vec<ItemStack> {
        self.lock().inventory.clone()
    }

    fn entities(&self) -> Vec<Entity> {
        self.lock().entities.iter().map(|e| e.entity.clone()).collect()
    }

    fn block_at(&self, pos: BlockPos) -> Option<Block> {
        Some(self.lock().block(pos))
    }

    fn light_level(&self, pos: BlockPos) -> Option<u8> {
        let state = self.lock();
        let daytime = state.time_of_day < 13_000 || state.time_of_day > 23_000;
        Some(if pos.y >= GROUND_LEVEL && daytime { 15 } else { 0 })
    }

    fn set_goal(&self, goal: Option<Goal>) {
        self.lock().goal = goal;
    }

    fn set_sprint(&self, on: bool) {
        self.lock().sprinting = on;
    }

    async fn move_near(&self, target: Vec3, tolerance: f64) -> Result<(), CapabilityError> {
        {
            let mut state = self.lock();
            state.ensure_connected()?;
            state.goal = Some(Goal { target, tolerance });
        }
        self.pause().await;
        let mut state = self.lock();
        if state.goal.is_none() {
            return Err(CapabilityError::Rejected("navigation cancelled".into()));
        }
        if state.block(target.floored()).is_solid() {
            state.goal = None;
            return Err(CapabilityError::Unreachable(format!(
                "({:.0}, {:.0}, {:.0}) is inside a block",
                target.x, target.y, target.z
            )));
        }
        state.position = target;
        state.goal = None;
        state.settle();
        Ok(())
    }

    async fn dig(&self, pos: BlockPos) -> Result<(), CapabilityError> {
        self.lock().ensure_connected()?;
        self.pause().await;
        let mut state = self.lock();
        let block = state.block(pos);
        if block.is_air() {
            return Err(CapabilityError::InvalidTarget(format!("nothing to dig at {pos:?}")));
        }
        if !block.diggable {
            return Err(CapabilityError::Rejected(format!("{} cannot be dug", block.name)));
        }
        state.blocks.insert(pos, "air".into());
        state.add_item(&block.name, 1);
        state.settle();
        Ok(())
    }

    async fn place(&self, reference: BlockPos, face: BlockPos) -> Result<(), CapabilityError> {
        self.lock().ensure_connected()?;
        self.pause().await;
        let mut state = self.lock();
        if !state.block(reference).is_solid() {
            return Err(CapabilityError::InvalidTarget(format!("no solid block at {reference:?}")));
        }
        let target = reference.offset(face.x, face.y, face.z);
        if !state.block(target).is_air() {
            return Err(CapabilityError::InvalidTarget(format!("{target:?} is occupied")));
        }
        let Some(held) = state.held.clone() else {
            return Err(CapabilityError::MissingItem("nothing in hand".into()));
        };
        if !state.take_one(&held) {
            return Err(CapabilityError::MissingItem(held));
        }
        state.blocks.insert(target, held);
        Ok(())
    }

    async fn equip(&self, item: &str, slot: EquipSlot) -> Result<(), CapabilityError> {
        self.lock().ensure_connected()?;
        self.pause().await;
        let mut state = self.lock();
        if !state.inventory.iter().any(|s| s.name == item) {
            return Err(CapabilityError::MissingItem(item.to_string()));
        }
        if slot == EquipSlot::Hand {
            state.held = Some(item.to_string());
        }
        Ok(())
    }

    async fn attack(&self, entity: EntityId) -> Result<(), CapabilityError> {
        self.lock().ensure_connected()?;
        self.pause().await;
        let mut state = self.lock();
        let damage = weapon_damage(state.held.as_deref());
        let Some(idx) = state.entities.iter().position(|e| e.entity.id == entity) else {
            return Err(CapabilityError::InvalidTarget(format!("entity {entity} is gone")));
        };
        state.entities[idx].health -= damage;
        if state.entities[idx].health <= 0.0 {
            state.entities.remove(idx);
        }
        Ok(())
    }

    async fn consume(&self) -> Result<(), CapabilityError> {
        self.lock().ensure_connected()?;
        self.pause().await;
        let mut state = self.lock();
        let Some(held) = state.held.clone() else {
            return Err(CapabilityError::MissingItem("nothing in hand".into()));
        };
        let Some(&(_, points)) = FOOD_VALUES.iter().find(|(name, _)| *name == held) else {
            return Err(CapabilityError::Rejected(format!("{held} is not edible")));
        };
        if !state.take_one(&held) {
            return Err(CapabilityError::MissingItem(held));
        }
        state.food = (state.food + points).min(MAX_FOOD);
        Ok(())
    }

    async fn look_at(&self, _point: Vec3) -> Result<(), CapabilityError> {
        self.lock().ensure_connected()
    }

    async fn chat(&self, message: &str) -> Result<(), CapabilityError> {
        let mut state = self.lock();
        state.ensure_connected()?;
        state.said.push(message.to_string());
        Ok(())
    }

    async fn respawn(&self) -> Result<(), CapabilityError> {
        let mut state = self.lock();
        state.ensure_connected()?;
        state.health = MAX_HEALTH;
        state.food = MAX_FOOD;
        state.position = state.spawn;
        state.held = None;
        tracing::debug!(username = %self.username, "respawned at spawn point");
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<WorldEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dig_under_feet_drops_avatar() {
        let world = SimWorld::new("bob");
        let start = world.position().floored();
        world.dig(start.offset(0, -1, 0)).await.unwrap();
        world.dig(start.offset(0, -2, 0)).await.unwrap();
        assert_eq!(world.position().floored().y, start.y - 2);
        assert_eq!(world.inventory(), vec![ItemStack::new("dirt", 2)]);
    }

    #[tokio::test]
    async fn consume_requires_edible_in_hand() {
        let world = SimWorld::new("bob");
        world.give("bread", 1);
        world.give("dirt", 1);
        world.set_food(10);

        world.equip("dirt", EquipSlot::Hand).await.unwrap();
        assert!(world.consume().await.is_err());

        world.equip("bread", EquipSlot::Hand).await.unwrap();
        world.consume().await.unwrap();
        assert_eq!(world.food(), 15);
        assert_eq!(world.held(), None);
    }

    #[tokio::test]
    async fn place_needs_solid_reference_and_free_target() {
        let world = SimWorld::new("bob");
        world.give("cobblestone", 2);
        world.equip("cobblestone", EquipSlot::Hand).await.unwrap();
        let ground = BlockPos::new(3, 63, 3);

        world.place(ground, BlockPos::new(0, 1, 0)).await.unwrap();
        assert_eq!(world.block_at(ground.offset(0, 1, 0)).unwrap().name, "cobblestone");
        // Same face again is now occupied.
        assert!(world.place(ground, BlockPos::new(0, 1, 0)).await.is_err());
        // Air cannot be a reference.
        assert!(world.place(ground.offset(0, 5, 0), BlockPos::new(0, 1, 0)).await.is_err());
    }

    #[tokio::test]
    async fn attack_kills_entity_eventually() {
        let world = SimWorld::new("bob");
        let id = world.spawn_entity("zombie", EntityKind::Mob, Vec3::new(2.0, 64.0, 0.0));
        for _ in 0..20 {
            if world.attack(id).await.is_err() {
                break;
            }
        }
        assert!(!world.entity_alive(id));
    }

    #[tokio::test]
    async fn kicked_disconnects_actions() {
        let world = SimWorld::new("bob");
        let mut rx = world.subscribe();
        world.emit(WorldEvent::Kicked("bye".into()));
        assert_eq!(rx.recv().await.unwrap(), WorldEvent::Kicked("bye".into()));
        assert_eq!(world.look_at(Vec3::default()).await, Err(CapabilityError::Disconnected));
    }
}
