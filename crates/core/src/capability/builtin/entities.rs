use serde_json::{Value, json};
use vessel_world::Entity;

use super::{num_or, text};
use crate::capability::{Tool, ToolContext, ToolError, ToolMeta};

pub struct Attack;

#[async_trait::async_trait]
impl Tool for Attack {
    fn meta(&self) -> ToolMeta {
        ToolMeta::new("attack", "Hit an entity once, by id or by nearest matching name")
            .param("id", "entity id")
            .param("name", "entity name, used when no id is given")
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
        let world = ctx.world();
        let id = match args.get("id").and_then(Value::as_u64) {
            Some(id) => id,
            None => {
                let name = text("attack", &args, "name")?;
                let here = world.position();
                world
                    .entities()
                    .into_iter()
                    .filter(|e| e.name == name)
                    .min_by(|a, b| a.position.distance_to(here).total_cmp(&b.position.distance_to(here)))
                    .map(|e| e.id)
                    .ok_or_else(|| ToolError::args("attack", format!("no {name} in sight")))?
            }
        };
        world.attack(id).await.map_err(ToolError::capability("attack"))?;
        Ok(json!(id))
    }
}

pub struct Nearby;

#[async_trait::async_trait]
impl Tool for Nearby {
    fn meta(&self) -> ToolMeta {
        ToolMeta::new("nearby", "Entities within a radius, closest first")
            .param("radius", "search radius, default 16")
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
        let radius = num_or(&args, "radius", 16.0);
        let here = ctx.world().position();
        let mut found: Vec<(f64, Entity)> = ctx
            .world()
            .entities()
            .into_iter()
            .map(|e| (e.position.distance_to(here), e))
            .filter(|(d, _)| *d <= radius)
            .collect();
        found.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(Value::Array(
            found
                .into_iter()
                .map(|(d, e)| json!({"id": e.id, "name": e.name, "kind": e.kind, "distance": d}))
                .collect(),
        ))
    }
}

pub struct Say;

#[async_trait::async_trait]
impl Tool for Say {
    fn meta(&self) -> ToolMeta {
        ToolMeta::new("say", "Send a chat message").param("message", "text to say")
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
        let message = text("say", &args, "message")?;
        ctx.world().chat(message).await.map_err(ToolError::capability("say"))?;
        Ok(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::ToolTable;
    use std::sync::Arc;
    use vessel_world::sim::SimWorld;
    use vessel_world::{EntityKind, Vec3};

    fn setup() -> (Arc<SimWorld>, ToolContext) {
        let world = Arc::new(SimWorld::new("bob"));
        let ctx = ToolContext::new(world.clone(), Arc::new(ToolTable::default()), 8);
        (world, ctx)
    }

    #[tokio::test]
    async fn attack_by_name_picks_nearest() {
        let (world, ctx) = setup();
        let _far = world.spawn_entity("zombie", EntityKind::Mob, Vec3::new(9.0, 64.0, 0.0));
        let near = world.spawn_entity("zombie", EntityKind::Mob, Vec3::new(2.0, 64.0, 0.0));
        let hit = Attack.call(&ctx, json!({"name": "zombie"})).await.unwrap();
        assert_eq!(hit, json!(near));
    }

    #[tokio::test]
    async fn nearby_filters_by_radius() {
        let (world, ctx) = setup();
        world.spawn_entity("cow", EntityKind::Mob, Vec3::new(3.5, 64.0, 0.5));
        world.spawn_entity("alice", EntityKind::Player, Vec3::new(40.0, 64.0, 0.0));
        let found = Nearby.call(&ctx, json!({"radius": 10})).await.unwrap();
        let found = found.as_array().unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["name"], "cow");
        assert_eq!(found[0]["kind"], "mob");
    }

    #[tokio::test]
    async fn say_needs_message() {
        let (world, ctx) = setup();
        assert!(Say.call(&ctx, json!({})).await.is_err());
        Say.call(&ctx, json!({"message": "hello"})).await.unwrap();
        assert_eq!(world.said(), vec!["hello"]);
    }
}
