use std::time::{Duration, Instant};

use vessel_world::{EquipSlot, ItemStack};

use super::{Perception, ReflexCtx, ReflexError, Trigger};
use crate::config::VesselCfg;
use crate::types::EventKind;

/// Most preferred first.
pub const FOOD_PRIORITY: &[&str] = &[
    "cooked_beef", "cooked_porkchop", "cooked_mutton", "cooked_chicken", "cooked_salmon",
    "cooked_cod", "bread", "baked_potato", "carrot", "apple", "melon_slice", "potato", "beetroot",
    "cookie", "pumpkin_pie", "golden_carrot", "golden_apple",
];

pub fn choose_food(inventory: &[ItemStack]) -> Option<&'static str> {
    FOOD_PRIORITY
        .iter()
        .copied()
        .find(|f| inventory.iter().any(|s| s.name == *f))
}

pub fn evaluate(
    perception: &Perception,
    last_meal: Option<Instant>,
    now: Instant,
    cfg: &VesselCfg,
) -> Option<Trigger> {
    if perception.food >= cfg.hunger_threshold {
        return None;
    }
    let cooldown = Duration::from_millis(cfg.meal_cooldown_ms);
    if let Some(at) = last_meal
        && now.saturating_duration_since(at) < cooldown
    {
        return None;
    }
    let item = choose_food(&perception.inventory)?;
    Some(Trigger::Hunger { item: item.to_string() })
}

pub async fn respond(ctx: &ReflexCtx, item: &str) -> Result<(), ReflexError> {
    let world = ctx.world.as_ref();
    world.equip(item, EquipSlot::Hand).await.map_err(ReflexError::at("equip"))?;
    world.consume().await.map_err(ReflexError::at("consume"))?;
    ctx.record_meal(Instant::now());
    let food = world.food();
    tracing::info!(item, food, "ate");
    ctx.journal.record(EventKind::AutoEat { item: item.to_string(), food });
    Ok(())
}
