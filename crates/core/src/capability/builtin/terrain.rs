use serde_json::Value;
use vessel_world::BlockPos;

use super::block;
use crate::capability::{Tool, ToolContext, ToolError, ToolMeta};

pub struct Dig;

#[async_trait::async_trait]
impl Tool for Dig {
    fn meta(&self) -> ToolMeta {
        ToolMeta::new("dig", "Break the block at a position")
            .param("x", "block x")
            .param("y", "block y")
            .param("z", "block z")
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
        let pos = block("dig", &args)?;
        ctx.world().dig(pos).await.map_err(ToolError::capability("dig"))?;
        Ok(Value::Null)
    }
}

pub struct Place;

/// Face offset from a name; `up` when absent.
fn face(args: &Value) -> Result<BlockPos, ToolError> {
    let name = args.get("face").and_then(Value::as_str).unwrap_or("up");
    Ok(match name {
        "up" => BlockPos::new(0, 1, 0),
        "down" => BlockPos::new(0, -1, 0),
        "north" => BlockPos::new(0, 0, -1),
        "south" => BlockPos::new(0, 0, 1),
        "east" => BlockPos::new(1, 0, 0),
        "west" => BlockPos::new(-1, 0, 0),
        other => return Err(ToolError::args("place", format!("unknown face `{other}`"))),
    })
}

#[async_trait::async_trait]
impl Tool for Place {
    fn meta(&self) -> ToolMeta {
        ToolMeta::new("place", "Place the held block against a reference block")
            .param("x", "reference block x")
            .param("y", "reference block y")
            .param("z", "reference block z")
            .param("face", "up, down, north, south, east or west; default up")
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
        let reference = block("place", &args)?;
        let face = face(&args)?;
        ctx.world().place(reference, face).await.map_err(ToolError::capability("place"))?;
        Ok(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::ToolTable;
    use serde_json::json;
    use std::sync::Arc;
    use vessel_world::sim::SimWorld;
    use vessel_world::{EquipSlot, World};

    #[tokio::test]
    async fn dig_then_place_back() {
        let world = Arc::new(SimWorld::new("bob"));
        let ctx = ToolContext::new(world.clone(), Arc::new(ToolTable::default()), 8);

        Dig.call(&ctx, json!({"x": 5, "y": 63, "z": 5})).await.unwrap();
        assert!(world.block_at(BlockPos::new(5, 63, 5)).unwrap().is_air());

        world.equip("dirt", EquipSlot::Hand).await.unwrap();
        Place.call(&ctx, json!({"x": 5, "y": 62, "z": 5})).await.unwrap();
        assert_eq!(world.block_at(BlockPos::new(5, 63, 5)).unwrap().name, "dirt");
    }

    #[test]
    fn unknown_face_is_rejected() {
        assert!(face(&json!({"face": "sideways"})).is_err());
        assert_eq!(face(&json!({"face": "west"})).unwrap(), BlockPos::new(-1, 0, 0));
    }
}
