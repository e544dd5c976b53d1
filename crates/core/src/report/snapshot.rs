use vessel_world::{Entity, ItemStack, Vec3, World};

/// Displacement at or below this reads as "no" movement.
const MOVE_THRESHOLD: f64 = 1.0;
const MAX_GAUGE: u32 = 20;

/// Avatar state captured around a command.
#[derive(Debug, Clone, PartialEq)]
pub struct AvatarSnapshot {
    pub position: Vec3,
    pub health: f32,
    pub food: u32,
    pub time: u32,
    pub inventory: Vec<ItemStack>,
    pub nearby: Vec<String>,
}

impl AvatarSnapshot {
    pub fn capture(world: &dyn World, radius: f64, limit: usize) -> Self {
        let position = world.position();
        Self {
            position,
            health: world.health(),
            food: world.food(),
            time: world.time_of_day(),
            inventory: world.inventory(),
            nearby: nearby_summary(position, &world.entities(), radius, limit),
        }
    }

    /// Inventory as `"name xN"` lines, in inventory order.
    pub fn inventory_lines(&self) -> Vec<String> {
        self.inventory
            .iter()
            .map(|s| format!("{} x{}", s.name, s.count))
            .collect()
    }
}

/// Differences between two snapshots, rendered for the outcome record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffSet {
    pub moved: String,
    pub health: String,
    pub food: String,
    pub inventory_changed: bool,
}

pub fn diff(before: &AvatarSnapshot, after: &AvatarSnapshot) -> DiffSet {
    DiffSet {
        moved: describe_moved(before.position.distance_to(after.position)),
        health: describe_gauge(before.health, after.health),
        food: describe_gauge(before.food as f32, after.food as f32),
        inventory_changed: before.inventory != after.inventory,
    }
}

pub fn describe_moved(distance: f64) -> String {
    if distance > MOVE_THRESHOLD {
        format!("{} blocks", distance.round())
    } else {
        "no".into()
    }
}

/// `"15/20"`, or `"15/20 (was 18)"` when the value changed.
pub fn describe_gauge(before: f32, after: f32) -> String {
    if before == after {
        format!("{after}/{MAX_GAUGE}")
    } else {
        format!("{after}/{MAX_GAUGE} (was {before})")
    }
}

/// The `limit` closest entities within `radius`, as `"name (kind) Nm"`.
pub fn nearby_summary(origin: Vec3, entities: &[Entity], radius: f64, limit: usize) -> Vec<String> {
    let mut close: Vec<(f64, &Entity)> = entities
        .iter()
        .map(|e| (e.position.distance_to(origin), e))
        .filter(|(d, _)| *d < radius)
        .collect();
    close.sort_by(|a, b| a.0.total_cmp(&b.0));
    close
        .into_iter()
        .take(limit)
        .map(|(d, e)| format!("{} ({}) {}m", e.name, e.kind, d.round()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vessel_world::EntityKind;

    fn snap(position: Vec3, inventory: Vec<ItemStack>) -> AvatarSnapshot {
        AvatarSnapshot {
            position,
            health: 20.0,
            food: 20,
            time: 0,
            inventory,
            nearby: vec![],
        }
    }

    #[test]
    fn crafting_changes_inventory() {
        let before = snap(Vec3::default(), vec![ItemStack::new("wood", 3)]);
        let after = snap(
            Vec3::default(),
            vec![ItemStack::new("wood", 1), ItemStack::new("planks", 8)],
        );
        assert!(diff(&before, &after).inventory_changed);
        assert_eq!(after.inventory_lines(), vec!["wood x1", "planks x8"]);
    }

    #[test]
    fn same_inventory_is_unchanged() {
        let inv = vec![ItemStack::new("wood", 3)];
        assert!(!diff(&snap(Vec3::default(), inv.clone()), &snap(Vec3::default(), inv)).inventory_changed);
    }

    #[test]
    fn small_displacement_is_no_movement() {
        let before = snap(Vec3::new(0.0, 64.0, 0.0), vec![]);
        let after = snap(Vec3::new(0.4, 64.0, 0.0), vec![]);
        assert_eq!(diff(&before, &after).moved, "no");
    }

    #[test]
    fn large_displacement_is_rounded() {
        let before = snap(Vec3::new(0.0, 64.0, 0.0), vec![]);
        let after = snap(Vec3::new(12.3, 64.0, 0.0), vec![]);
        assert_eq!(diff(&before, &after).moved, "12 blocks");
    }

    #[test]
    fn half_block_distances_round_up() {
        assert_eq!(describe_moved(12.5), "13 blocks");
        assert_eq!(describe_moved(2.5), "3 blocks");
        let wolf = Entity { id: 1, name: "wolf".into(), kind: EntityKind::Mob, position: Vec3::new(4.5, 64.0, 0.0) };
        assert_eq!(nearby_summary(Vec3::new(0.0, 64.0, 0.0), &[wolf], 16.0, 5), vec!["wolf (mob) 5m"]);
    }

    #[test]
    fn gauge_mentions_previous_value_only_on_change() {
        assert_eq!(describe_gauge(20.0, 20.0), "20/20");
        assert_eq!(describe_gauge(18.0, 15.0), "15/20 (was 18)");
        assert_eq!(describe_gauge(20.0, 12.5), "12.5/20 (was 20)");
    }

    #[test]
    fn nearby_keeps_five_closest_within_radius() {
        let origin = Vec3::new(0.0, 64.0, 0.0);
        let entities: Vec<Entity> = (0..8)
            .map(|i| Entity {
                id: i,
                name: format!("cow{i}"),
                kind: EntityKind::Mob,
                position: Vec3::new((8 - i) as f64 * 2.0 + 1.0, 64.0, 0.0),
            })
            .collect();
        let summary = nearby_summary(origin, &entities, 16.0, 5);
        // cow0 at 17 is out of range
        assert_eq!(
            summary,
            vec!["cow7 (mob) 3m", "cow6 (mob) 5m", "cow5 (mob) 7m", "cow4 (mob) 9m", "cow3 (mob) 11m"]
        );
    }
}
