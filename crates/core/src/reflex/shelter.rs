use std::time::Duration;

use vessel_world::{BlockPos, EquipSlot, ItemStack};

use super::{Perception, ReflexCtx, ReflexError, Trigger, best_weapon, is_hostile};
use crate::config::VesselCfg;
use crate::types::EventKind;

/// Blocks usable to plug the shelter entrance.
pub const SEAL_MATERIALS: &[&str] = &[
    "dirt", "cobblestone", "stone", "gravel", "sand", "oak_planks", "spruce_planks", "birch_planks",
];

/// Horizontal neighbours of the entrance tried as placement references, in order.
const SEAL_NEIGHBOURS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

pub fn is_night(time: u32, cfg: &VesselCfg) -> bool {
    time > cfg.night_start && time < cfg.night_end
}

/// First sealing block in inventory order.
pub fn seal_material(inventory: &[ItemStack]) -> Option<String> {
    inventory
        .iter()
        .find(|s| SEAL_MATERIALS.contains(&s.name.as_str()))
        .map(|s| s.name.clone())
}

/// Night, wounded, a hostile close by and nothing to fight with.
pub fn evaluate(perception: &Perception, cfg: &VesselCfg) -> Option<Trigger> {
    if !is_night(perception.time, cfg) || perception.health >= cfg.shelter_health_floor {
        return None;
    }
    perception.nearest(cfg.shelter_hostile_radius, is_hostile)?;
    if best_weapon(&perception.inventory).is_some() {
        return None;
    }
    Some(Trigger::Shelter { health: perception.health, time: perception.time })
}

pub async fn respond(ctx: &ReflexCtx, health: f32, time: u32) -> Result<(), ReflexError> {
    tracing::info!(health, time, "digging emergency shelter");
    ctx.journal.record(EventKind::AutoShelter { health, world_time: time });

    let world = ctx.world.as_ref();
    let start = world.position().floored();
    let pause = Duration::from_millis(ctx.cfg.dig_pause_ms);
    for depth in 1..=ctx.cfg.shelter_depth {
        let pos = start.offset(0, -depth, 0);
        let Some(block) = world.block_at(pos) else { continue };
        if block.is_air() || !block.diggable {
            continue;
        }
        if let Err(e) = world.dig(pos).await {
            tracing::debug!(?pos, error = %e, "shelter dig failed");
        }
        tokio::time::sleep(pause).await;
    }

    let Some(material) = seal_material(&world.inventory()) else {
        tracing::warn!("nothing to seal the shelter with");
        return Ok(());
    };
    world.equip(&material, EquipSlot::Hand).await.map_err(ReflexError::at("equip"))?;
    for (dx, dz) in SEAL_NEIGHBOURS {
        let reference = start.offset(dx, 0, dz);
        let Some(block) = world.block_at(reference) else { continue };
        if !block.is_solid() {
            continue;
        }
        match world.place(reference, BlockPos::new(-dx, 0, -dz)).await {
            Ok(()) => {
                tracing::info!(material = %material, "shelter sealed");
                return Ok(());
            }
            Err(e) => tracing::debug!(?reference, error = %e, "seal attempt failed"),
        }
    }
    Err(ReflexError::SealFailed)
}
